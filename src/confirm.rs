#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    fmt::Display,
    io::{self, BufRead, Write},
    str::FromStr,
};

use colored::Colorize;

use crate::{
    constants::CLEAR_COMMENT,
    types::{Grade, GradingResult, Student, Submission},
};

/// How proposed grades are confirmed before they are written. Fixed for a
/// run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationMode {
    /// Commit every grade immediately.
    Full,
    /// Ask a reviewer to accept, edit or skip each grade.
    #[default]
    Prompt,
    /// Never commit; only show what would be written.
    DryRun,
}

impl FromStr for ConfirmationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(ConfirmationMode::Full),
            "prompt" => Ok(ConfirmationMode::Prompt),
            "dry-run" | "dry_run" | "dryrun" => Ok(ConfirmationMode::DryRun),
            other => Err(format!("unknown confirmation mode `{other}`, expected full, prompt or dry-run")),
        }
    }
}

impl Display for ConfirmationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConfirmationMode::Full => "full",
            ConfirmationMode::Prompt => "prompt",
            ConfirmationMode::DryRun => "dry-run",
        })
    }
}

/// Why a proposed grade was not committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// The reviewer chose to skip it, or input ended.
    Skipped,
    /// The run is a dry run.
    DryRun,
}

/// What to do with a proposed grade.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Write this result (possibly edited).
    Commit(GradingResult),
    /// Leave the submission untouched.
    Discard(Discard),
}

/// Applies a confirmation mode, talking to a reviewer through `input` and
/// `output` when needed.
pub struct ConfirmationPolicy<R, W> {
    /// The fixed mode.
    mode:   ConfirmationMode,
    /// Reviewer input.
    input:  R,
    /// Where results and questions are shown.
    output: W,
}

impl ConfirmationPolicy<io::StdinLock<'static>, io::Stdout> {
    /// A policy that talks to the terminal.
    pub fn stdio(mode: ConfirmationMode) -> Self {
        Self::new(mode, io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConfirmationPolicy<R, W> {
    /// Creates a policy over arbitrary reviewer input and output.
    pub fn new(mode: ConfirmationMode, input: R, output: W) -> Self {
        Self {
            mode,
            input,
            output,
        }
    }

    /// Returns the mode.
    pub fn mode(&self) -> ConfirmationMode {
        self.mode
    }

    /// Consumes the policy and returns its output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Decides what happens to `result` for `student`.
    pub fn resolve(
        &mut self,
        student: &Student,
        submission: &Submission,
        result: GradingResult,
    ) -> io::Result<Decision> {
        match self.mode {
            ConfirmationMode::Full => Ok(Decision::Commit(result)),
            ConfirmationMode::DryRun => {
                writeln!(
                    self.output,
                    "[dry-run] {student}: would post grade {} with comment: {}",
                    result.grade, result.comment
                )?;
                Ok(Decision::Discard(Discard::DryRun))
            }
            ConfirmationMode::Prompt => self.ask(student, submission, result),
        }
    }

    /// Reads one trimmed line; `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }

    /// Shows `question` and reads the answer.
    fn question(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        self.read_line()
    }

    /// Runs the accept/edit/skip dialogue.
    fn ask(
        &mut self,
        student: &Student,
        submission: &Submission,
        result: GradingResult,
    ) -> io::Result<Decision> {
        writeln!(self.output)?;
        writeln!(self.output, "{}", format!("== {student} ==").bold())?;
        writeln!(self.output, "{}", "Answer:".underline())?;
        writeln!(self.output, "{}", submission.answer_text().unwrap_or_default())?;
        if let Some(existing) = submission.comment.as_deref() {
            writeln!(self.output, "{} {existing}", "Existing comment:".underline())?;
        }
        writeln!(self.output, "{} {}", "Proposed grade:".green().bold(), result.grade)?;
        writeln!(self.output, "{} {}", "Proposed comment:".green().bold(), result.comment)?;

        loop {
            let Some(answer) = self.question("[a]ccept / [e]dit / [s]kip? ")? else {
                return Ok(Decision::Discard(Discard::Skipped));
            };
            match answer.to_ascii_lowercase().as_str() {
                "a" | "accept" | "y" | "yes" => return Ok(Decision::Commit(result)),
                "s" | "skip" | "n" | "no" => return Ok(Decision::Discard(Discard::Skipped)),
                "e" | "edit" => {
                    return Ok(match self.edit(result)? {
                        Some(edited) => Decision::Commit(edited),
                        None => Decision::Discard(Discard::Skipped),
                    });
                }
                _ => writeln!(self.output, "{}", "Please answer a, e or s.".yellow())?,
            }
        }
    }

    /// Asks for a replacement grade and comment. Empty answers keep the
    /// proposed values. `None` when input ends.
    fn edit(&mut self, result: GradingResult) -> io::Result<Option<GradingResult>> {
        let grade = loop {
            let Some(answer) = self.question(&format!("Grade [{}]: ", result.grade))? else {
                return Ok(None);
            };
            if answer.is_empty() {
                break result.grade.clone();
            }
            match Grade::parse(&answer) {
                Some(grade) => break grade,
                None => writeln!(self.output, "{}", "Not a usable grade.".yellow())?,
            }
        };

        let Some(comment) = self.question(&format!(
            "Comment [{}] ({CLEAR_COMMENT} to clear): ",
            result.comment
        ))?
        else {
            return Ok(None);
        };
        let comment = match comment.as_str() {
            "" => result.comment,
            CLEAR_COMMENT => String::new(),
            _ => comment,
        };

        Ok(Some(GradingResult::new(grade, comment)))
    }
}
