//! Interactive operator prompts
//!
//! Bad input here never ends the program. A bad port choice is asked again;
//! a bad baud rate falls back to the default with a warning.

use console::style;
use ferry_link::{DEFAULT_BAUD_RATE, PortInfo};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Input the operator has to correct or that falls back to a default
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// Not a number at all
    #[error("invalid input, enter a number: {0:?}")]
    NotANumber(String),

    /// A port number outside the listed range
    #[error("invalid choice {choice}, pick 1 to {count}")]
    OutOfRange {
        /// What was entered
        choice: usize,
        /// How many ports were listed
        count: usize,
    },

    /// A baud rate that is not a positive integer
    #[error("invalid baud rate {0:?}")]
    InvalidBaud(String),

    /// A required path left blank
    #[error("file path cannot be empty")]
    EmptyPath,
}

/// Parse a 1-based choice from a list of `count` entries into a 0-based index.
pub fn parse_port_choice(input: &str, count: usize) -> Result<usize, InputError> {
    let trimmed = input.trim();
    let choice: usize = trimmed
        .parse()
        .map_err(|_| InputError::NotANumber(trimmed.to_string()))?;
    if choice == 0 || choice > count {
        return Err(InputError::OutOfRange { choice, count });
    }
    Ok(choice - 1)
}

/// Parse a baud rate. Blank input is `None`.
pub fn parse_baud(input: &str) -> Result<Option<u32>, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u32>() {
        Ok(baud) if baud > 0 => Ok(Some(baud)),
        _ => Err(InputError::InvalidBaud(trimmed.to_string())),
    }
}

/// Baud rate for `input`, with blank meaning `default` and anything invalid
/// meaning [`DEFAULT_BAUD_RATE`].
pub fn resolve_baud(input: &str, default: u32) -> (u32, Option<InputError>) {
    match parse_baud(input) {
        Ok(Some(baud)) => (baud, None),
        Ok(None) => (default, None),
        Err(e) => (DEFAULT_BAUD_RATE, Some(e)),
    }
}

/// Only `y` and `yes`, in any case, accept.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Print the numbered port list the selection prompt refers to.
pub fn print_ports<W: Write>(out: &mut W, ports: &[PortInfo]) -> io::Result<()> {
    writeln!(out, "Available serial ports:")?;
    for (i, port) in ports.iter().enumerate() {
        writeln!(out, "{}: {} - {}", i + 1, port.device, port.description)?;
        writeln!(out, "  {}", port.identity())?;
        writeln!(out)?;
    }
    Ok(())
}

/// Somewhere answers come from, one line at a time.
pub trait LineSource {
    /// Append the next line to `buf`, returning the bytes read; 0 at EOF.
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

impl<R: BufRead> LineSource for R {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, buf)
    }
}

/// Standard input, locked only while a line is being read so the stop
/// listener can watch it between prompts.
pub struct StdinLines(io::Stdin);

impl LineSource for StdinLines {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        self.0.read_line(buf)
    }
}

/// Line-oriented prompts over any line source and writer.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLines, io::Stdout> {
    /// Prompts on the terminal.
    pub fn stdio() -> Self {
        Self::new(StdinLines(io::stdin()), io::stdout())
    }
}

impl<R: LineSource, W: Write> Prompter<R, W> {
    /// Prompts reading from `input` and writing to `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one line. EOF is an error: there is no one
    /// left to answer.
    pub fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }
        Ok(line.trim().to_string())
    }

    /// Print a line.
    pub fn say(&mut self, message: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }

    fn warn(&mut self, message: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.output, "{}", style(message).yellow())
    }

    /// List `ports` and ask until a valid one is picked.
    pub fn select_port(&mut self, ports: &[PortInfo]) -> io::Result<PortInfo> {
        print_ports(&mut self.output, ports)?;
        loop {
            let answer = self.ask("Select a serial port (number): ")?;
            match parse_port_choice(&answer, ports.len()) {
                Ok(index) => return Ok(ports[index].clone()),
                Err(e) => self.warn(e)?,
            }
        }
    }

    /// Ask for a baud rate, falling back to `default`.
    pub fn baud_rate(&mut self, default: u32) -> io::Result<u32> {
        let answer = self.ask(&format!("Baud rate (default {default}): "))?;
        let (baud, error) = resolve_baud(&answer, default);
        if let Some(e) = error {
            self.warn(format!("{e}, using {baud}"))?;
        }
        Ok(baud)
    }

    /// Ask where to save a capture. Blank means the generated default.
    pub fn receive_path(&mut self) -> io::Result<Option<PathBuf>> {
        let answer = self.ask("Save capture to (blank for an automatic name): ")?;
        Ok((!answer.is_empty()).then(|| PathBuf::from(answer)))
    }

    /// Ask for the file to send. Blank is rejected.
    pub fn send_path(&mut self) -> io::Result<Result<PathBuf, InputError>> {
        let answer = self.ask("File to send: ")?;
        if answer.is_empty() {
            return Ok(Err(InputError::EmptyPath));
        }
        Ok(Ok(PathBuf::from(answer)))
    }

    /// Yes/no question; anything but `y` or `yes` is no.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{question} (y/n): "))?;
        Ok(is_affirmative(&answer))
    }
}
