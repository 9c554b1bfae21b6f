//! Operator selection of a recorded session.

use std::io::{self, BufRead, Write};

use log::warn;

use crate::error::{ReplayError, ReplayResult};

/// Asks an operator to pick one of several sessions.
pub trait SessionPrompt {
    /// Show `labels` and return the raw answer, or `None` when input has
    /// ended.
    fn ask(&mut self, labels: &[String]) -> ReplayResult<Option<String>>;

    /// Tell the operator `answer` was not a number in `1..=choices`.
    fn reject(&mut self, answer: &str, choices: usize) -> ReplayResult<()>;
}

/// Numbered menu on a text stream, stdin/stdout by default.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> SessionPrompt for ConsolePrompt<R, W> {
    fn ask(&mut self, labels: &[String]) -> ReplayResult<Option<String>> {
        writeln!(self.output, "Recorded sessions:")?;
        for (i, label) in labels.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, label)?;
        }
        write!(self.output, "Select a session [1-{}]: ", labels.len())?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn reject(&mut self, answer: &str, choices: usize) -> ReplayResult<()> {
        writeln!(self.output, "'{}' is not a number between 1 and {}", answer, choices)?;
        Ok(())
    }
}

/// Zero-based index for a 1-based `answer`, if it names one of `choices`.
pub fn parse_choice(answer: &str, choices: usize) -> Option<usize> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=choices).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Prompt until a valid choice is made, giving up after `attempts` invalid
/// answers or at end of input.
pub fn choose_session(
    prompt: &mut dyn SessionPrompt,
    labels: &[String],
    attempts: u32,
) -> ReplayResult<usize> {
    for attempt in 1..=attempts {
        let Some(answer) = prompt.ask(labels)? else {
            warn!("Input ended before a session was chosen");
            return Err(ReplayError::SelectionAborted(attempt - 1));
        };
        if let Some(index) = parse_choice(&answer, labels.len()) {
            return Ok(index);
        }
        prompt.reject(&answer, labels.len())?;
    }
    Err(ReplayError::SelectionAborted(attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn labels() -> Vec<String> {
        vec!["first".to_string(), "second".to_string()]
    }

    #[test]
    fn test_parse_choice_is_one_based() {
        assert_eq!(parse_choice("1", 2), Some(0));
        assert_eq!(parse_choice(" 2 ", 2), Some(1));
        assert_eq!(parse_choice("0", 2), None);
        assert_eq!(parse_choice("3", 2), None);
        assert_eq!(parse_choice("two", 2), None);
    }

    #[test]
    fn test_reprompts_after_invalid_answer() {
        let mut output = Vec::new();
        let mut prompt = ConsolePrompt::new(Cursor::new("9\n2\n"), &mut output);
        assert_eq!(choose_session(&mut prompt, &labels(), 3).unwrap(), 1);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("1) first"));
        assert!(shown.contains("'9' is not a number between 1 and 2"));
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let mut prompt = ConsolePrompt::new(Cursor::new("x\ny\nz\n1\n"), Vec::new());
        let err = choose_session(&mut prompt, &labels(), 3).unwrap_err();
        assert!(matches!(err, ReplayError::SelectionAborted(3)));
    }

    #[test]
    fn test_end_of_input_aborts() {
        let mut prompt = ConsolePrompt::new(Cursor::new(""), Vec::new());
        let err = choose_session(&mut prompt, &labels(), 3).unwrap_err();
        assert!(matches!(err, ReplayError::SelectionAborted(0)));
    }
}
