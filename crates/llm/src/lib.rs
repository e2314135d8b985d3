pub mod openai;
pub mod translate;

pub use openai::OpenAiProvider;
