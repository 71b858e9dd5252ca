//! The human at the console.

use std::io::{self, BufRead, Write};

/// Blocking interaction with whoever resolves escalations.
pub trait Operator {
    /// Show `message` and wait until the operator acknowledges it.
    fn pause(&mut self, message: &str);

    /// Show `prompt` and return the line typed back, without the newline.
    fn ask(&mut self, prompt: &str) -> String;
}

/// Operator on stdin/stdout.
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self) -> String {
        let mut line = String::new();
        // EOF or a closed stdin reads as an empty answer
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            tracing::warn!("failed to read from console: {e}");
        }
        line.trim_end_matches(['\r', '\n']).to_string()
    }
}

impl Operator for ConsoleOperator {
    fn pause(&mut self, message: &str) {
        println!("{message}");
        let _ = io::stdout().flush();
        self.read_line();
    }

    fn ask(&mut self, prompt: &str) -> String {
        print!("{prompt}");
        let _ = io::stdout().flush();
        self.read_line()
    }
}
