//! # gradebot
//!
//! Grades Canvas assignment submissions with an OpenAI-compatible model and
//! records the grade and comment back in Canvas, optionally after a human has
//! confirmed each one.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Canvas REST client and the `Gradebook` seam used by the grading loop
pub mod canvas;
/// Chat completion client, request building and reply parsing
pub mod completion;
/// Confirmation modes and the interactive review dialogue
pub mod confirm;
/// Environment and run configuration
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// The per-student grading loop and run summary
pub mod grading;
/// Optional roster restricting which students are graded
pub mod roster;
/// Students, submissions and grades
pub mod types;

use anyhow::{Context, Result};
use canvas::{CanvasClient, Gradebook};
use completion::OpenAiGrader;
use config::{CanvasEnv, OpenAiEnv, RunConfig};
use confirm::ConfirmationPolicy;
use grading::{GradingLoop, RunSummary};
use types::Student;

/// Runs a full grading pass against Canvas and the configured model, talking
/// to the reviewer on the terminal when the mode asks for it.
pub async fn grade(config: &RunConfig, canvas: &CanvasEnv, openai: OpenAiEnv) -> Result<RunSummary> {
    let gradebook = CanvasClient::new(canvas).context("Could not create the Canvas client")?;
    let grader = OpenAiGrader::new(openai);
    let policy = ConfirmationPolicy::stdio(config.mode());

    GradingLoop::new(&gradebook, &grader, config, policy)
        .run()
        .await
}

/// Lists the students enrolled in the configured course.
pub async fn list_students(canvas: &CanvasEnv) -> Result<Vec<Student>> {
    let gradebook = CanvasClient::new(canvas).context("Could not create the Canvas client")?;
    gradebook
        .students()
        .await
        .with_context(|| format!("Could not list students of course {}", canvas.course_id()))
}
