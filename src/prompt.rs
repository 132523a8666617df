//! Operator interaction channel.
//!
//! Prompts block until the operator answers. Components receive a
//! `&dyn Prompter`, so tests script the answers.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Errors while talking to the operator.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Reading or writing the terminal failed.
    #[error("prompt I/O failed: {0}")]
    Io(#[from] io::Error),
    /// Input closed before an answer was given.
    #[error("input closed while waiting for an answer")]
    Closed,
}

/// Blocking question/answer channel to the operator.
pub trait Prompter: Send + Sync {
    /// Yes/no question.
    fn confirm(&self, question: &str) -> Result<bool, PromptError>;

    /// Free-form answer, trimmed. May be empty.
    fn ask_line(&self, question: &str) -> Result<String, PromptError>;
}

/// Prompts on stderr and reads answers from stdin.
///
/// Empty answers to [`Prompter::confirm`] take `default_yes`.
#[derive(Debug)]
pub struct TerminalPrompter {
    default_yes: bool,
    // Serializes prompts from concurrent callers.
    lock: Mutex<()>,
}

impl TerminalPrompter {
    #[must_use]
    pub fn new(default_yes: bool) -> Self {
        Self {
            default_yes,
            lock: Mutex::new(()),
        }
    }

    fn read_answer(&self, prompt: &str) -> Result<String, PromptError> {
        off_runtime(|| self.read_answer_blocking(prompt))
    }

    fn read_answer_blocking(&self, prompt: &str) -> Result<String, PromptError> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stderr = io::stderr().lock();
        write!(stderr, "{prompt}")?;
        stderr.flush()?;
        drop(stderr);

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(PromptError::Closed);
        }
        Ok(line.trim().to_string())
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> Result<bool, PromptError> {
        let hint = if self.default_yes { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.read_answer(&format!("{question} {hint} "))?;
            if let Some(value) = parse_yes_no(&answer, self.default_yes) {
                return Ok(value);
            }
        }
    }

    fn ask_line(&self, question: &str) -> Result<String, PromptError> {
        self.read_answer(&format!("{question} "))
    }
}

/// Runs blocking terminal I/O without stalling other tasks on a
/// multi-threaded runtime. Current-thread runtimes cannot hand off the
/// worker, so `f` runs inline there.
fn off_runtime<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Interprets a yes/no answer; `None` means ask again.
fn parse_yes_no(answer: &str, default_yes: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default_yes),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
