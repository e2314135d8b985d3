use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const USER_PROMPT: Color = Color::Green;
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const TOOL_CALL: Color = Color::Yellow;
    const TOOL_RESULT: Color = Color::DarkGreen;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

fn wants_exit(input: &str) -> bool {
    matches!(input, "exit" | "quit" | "/exit" | "/quit")
}

/// Manages terminal I/O for the interactive REPL.
///
/// Input goes through tokio's stdin so the main loop can race it
/// against Ctrl+C and still tear the gateway down on the way out.
pub struct Terminal {
    input: Lines<BufReader<Stdin>>,
}

impl Terminal {
    /// Create a new terminal handler.
    pub fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print the startup banner.
    pub fn print_banner(&self, model: &str, server: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("sqlpilot"),
            ResetColor,
            Print(" - SQL assistant ready. Ask me anything about the database.\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!("Model: {} | Server: {}\n", model, server)),
            Print("Type 'exit' or 'quit' to end. Ctrl+C also quits.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Read a line of user input with prompt.
    /// Returns None when the user wants to exit or stdin closes.
    pub async fn read_input(&mut self) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::USER_PROMPT),
            Print("User > "),
            ResetColor,
        )?;
        stdout.flush()?;

        let Some(line) = self.input.next_line().await? else {
            return Ok(None);
        };
        let trimmed = line.trim().to_string();

        if wants_exit(&trimmed) {
            return Ok(None);
        }

        Ok(Some(trimmed))
    }

    /// Print the assistant's reply.
    pub fn print_assistant(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ASSISTANT_TEXT),
            Print(format!("Assistant > {}\n", text)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Announce a tool invocation with its raw arguments.
    pub fn print_executing(&self, name: &str, arguments: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::TOOL_CALL),
            Print(format!("▪ Executing {}({})\n", name, arguments)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print pre-rendered trace lines for one tool result.
    pub fn print_trace(&self, lines: &[String], is_error: bool) -> Result<()> {
        let color = if is_error {
            Colors::ERROR
        } else {
            Colors::TOOL_RESULT
        };
        let mut stdout = io::stdout();
        execute!(stdout, SetForegroundColor(color))?;
        for line in lines {
            execute!(stdout, Print(format!("{}\n", line)))?;
        }
        execute!(stdout, ResetColor)?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print the farewell line.
    pub fn print_farewell(&self) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::DIM),
            Print("Bye!\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}
