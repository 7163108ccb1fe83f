#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashMap,
    fmt::Display,
    io::{BufRead, Write},
};

use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};
use tracing::{error, info, warn};

use crate::{
    canvas::Gradebook,
    completion::{CompletionError, Grader, GradingRequest},
    config::RunConfig,
    confirm::{ConfirmationPolicy, Decision, Discard},
    types::{Grade, Student, Submission},
};

/// What the loop does with a submission before any API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    /// No answer text.
    SkipEmpty,
    /// Canvas already holds a grade.
    SkipGraded,
    /// Send this answer to the model.
    Grade(&'a str),
}

/// Applies the skip rules.
pub fn classify(submission: &Submission) -> Action<'_> {
    match submission.answer_text() {
        None => Action::SkipEmpty,
        Some(_) if submission.is_graded() => Action::SkipGraded,
        Some(answer) => Action::Grade(answer),
    }
}

/// How one student's turn through the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A grade was written to Canvas.
    Graded(Grade),
    /// Dry run: the grade was shown but not written.
    Previewed(Grade),
    /// Nothing to grade.
    SkippedEmpty,
    /// Already graded in Canvas.
    SkippedGraded,
    /// The reviewer skipped the proposed grade.
    SkippedByReviewer,
    /// An API call failed or the model reply was unusable.
    Failed(String),
}

impl Outcome {
    /// Whether this outcome counts as skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Outcome::SkippedEmpty | Outcome::SkippedGraded | Outcome::SkippedByReviewer
        )
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Graded(grade) => write!(f, "graded {grade}"),
            Outcome::Previewed(grade) => write!(f, "would grade {grade}"),
            Outcome::SkippedEmpty => f.write_str("skipped: empty answer"),
            Outcome::SkippedGraded => f.write_str("skipped: already graded"),
            Outcome::SkippedByReviewer => f.write_str("skipped by reviewer"),
            Outcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// One line of the summary table.
#[derive(Tabled)]
struct SummaryRow {
    /// Student display name and id.
    #[tabled(rename = "Student")]
    student: String,
    /// Outcome text.
    #[tabled(rename = "Outcome")]
    outcome: String,
}

/// Per-student outcomes of a run, in grading order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Student and outcome pairs.
    outcomes: Vec<(Student, Outcome)>,
}

impl RunSummary {
    /// Records an outcome.
    pub fn push(&mut self, student: Student, outcome: Outcome) {
        self.outcomes.push((student, outcome));
    }

    /// Returns every recorded outcome.
    pub fn outcomes(&self) -> &[(Student, Outcome)] {
        &self.outcomes
    }

    /// Number of grades written.
    pub fn graded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Graded(_)))
    }

    /// Number of grades shown in a dry run.
    pub fn previewed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Previewed(_)))
    }

    /// Number of skipped students, for any reason.
    pub fn skipped(&self) -> usize {
        self.count(Outcome::is_skipped)
    }

    /// Number of failed students.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// Counts outcomes satisfying `pred`.
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    /// One-line totals.
    pub fn totals(&self) -> String {
        format!(
            "Graded: {}, Previewed: {}, Skipped: {}, Failed: {}",
            self.graded(),
            self.previewed(),
            self.skipped(),
            self.failed()
        )
    }

    /// Renders the per-student table with a totals footer.
    pub fn table(&self) -> String {
        let rows = self.outcomes.iter().map(|(student, outcome)| SummaryRow {
            student: student.to_string(),
            outcome: outcome.to_string(),
        });

        Table::new(rows)
            .with(Panel::header("Grading Summary"))
            .with(Panel::footer(self.totals()))
            .with(Modify::new(Rows::new(1..)).with(Width::wrap(48).keep_words(true)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(
                Modify::new(Rows::last())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }
}

/// Renders an error with its source chain.
fn describe(err: CompletionError) -> String {
    if let CompletionError::Malformed { content, .. } = &err {
        warn!("Unusable model reply: {content}");
    }
    format!("{:#}", anyhow::Error::new(err))
}

/// The per-student grading loop.
pub struct GradingLoop<'a, B, G, R, W> {
    /// Canvas side.
    gradebook: &'a B,
    /// Model side.
    grader:    &'a G,
    /// Run settings.
    config:    &'a RunConfig,
    /// Confirmation policy for the run.
    policy:    ConfirmationPolicy<R, W>,
}

impl<'a, B, G, R, W> GradingLoop<'a, B, G, R, W>
where
    B: Gradebook,
    G: Grader,
    R: BufRead,
    W: Write,
{
    /// Creates a loop over the given collaborators.
    pub fn new(
        gradebook: &'a B,
        grader: &'a G,
        config: &'a RunConfig,
        policy: ConfirmationPolicy<R, W>,
    ) -> Self {
        Self {
            gradebook,
            grader,
            config,
            policy,
        }
    }

    /// Resolves which students are in scope, in Canvas order.
    async fn students_in_scope(&self) -> Result<Vec<Student>> {
        let students = self
            .gradebook
            .students()
            .await
            .context("Could not list the course's students")?;

        Ok(match self.config.roster() {
            Some(roster) => roster.restrict(students),
            None => students,
        })
    }

    /// Grades every student in scope. Per-student API failures are recorded
    /// and the loop moves on; only setup failures and reviewer I/O errors
    /// abort the run.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let assignment_id = self.config.assignment_id();
        let students = self.students_in_scope().await?;
        let mut submissions: HashMap<u64, Submission> = self
            .gradebook
            .submissions(assignment_id)
            .await
            .with_context(|| format!("Could not fetch submissions for assignment {assignment_id}"))?
            .into_iter()
            .map(|s| (s.user_id, s))
            .collect();

        info!(
            "Grading assignment {assignment_id} for {} students ({} mode)",
            students.len(),
            self.policy.mode()
        );

        let mut summary = RunSummary::default();
        for student in students {
            let submission = submissions
                .remove(&student.id)
                .unwrap_or_else(|| Submission::missing(student.id));
            let outcome = self.grade_one(&student, &submission).await?;

            match &outcome {
                Outcome::Failed(reason) => error!("{student}: {reason}"),
                other => info!("{student}: {other}"),
            }
            summary.push(student, outcome);
        }

        Ok(summary)
    }

    /// Runs one student through skip rules, model, confirmation and write.
    pub async fn grade_one(&mut self, student: &Student, submission: &Submission) -> Result<Outcome> {
        let answer = match classify(submission) {
            Action::SkipEmpty => return Ok(Outcome::SkippedEmpty),
            Action::SkipGraded => return Ok(Outcome::SkippedGraded),
            Action::Grade(answer) => answer,
        };

        let request = GradingRequest {
            prompt: self.config.prompt(),
            rubric: self.config.rubric(),
            answer,
        };
        let result = match self.grader.grade(&request).await {
            Ok(result) => result,
            Err(err) => return Ok(Outcome::Failed(describe(err))),
        };

        let proposed = result.grade.clone();
        let decision = self
            .policy
            .resolve(student, submission, result)
            .context("Could not read the reviewer's answer")?;

        let result = match decision {
            Decision::Commit(result) => result,
            Decision::Discard(Discard::DryRun) => return Ok(Outcome::Previewed(proposed)),
            Decision::Discard(Discard::Skipped) => return Ok(Outcome::SkippedByReviewer),
        };

        let assignment_id = self.config.assignment_id();
        match self.gradebook.submission(assignment_id, student.id).await {
            Ok(current) if current.is_graded() => {
                warn!("{student} was graded while waiting for confirmation; leaving it as is");
                return Ok(Outcome::SkippedGraded);
            }
            Ok(_) => {}
            Err(err) => return Ok(Outcome::Failed(format!("{:#}", anyhow::Error::new(err)))),
        }

        match self
            .gradebook
            .post_grade(assignment_id, student.id, &result)
            .await
        {
            Ok(()) => Ok(Outcome::Graded(result.grade)),
            Err(err) => Ok(Outcome::Failed(format!("{:#}", anyhow::Error::new(err)))),
        }
    }
}
