#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # gradebot
//! ## Introduction
//!
//! Grades a Canvas assignment with a language model.
//!
//! ## Setup
//!
//! Put `CANVAS_API_KEY`, `CANVAS_COURSE_ID` and `OPENAI_API_KEY` (plus the
//! optional `CANVAS_API_URL`, `OPENAI_BASE_URL` and `OPENAI_MODEL`) in the
//! environment or in a `.env` file, then run
//! `gradebot --prompt prompt.txt --task rubric.txt --task-num 12345`.

use std::path::PathBuf;

use anyhow::Result;
use bpaf::*;
use dotenvy::dotenv;
use gradebot::{
    config::{CanvasEnv, OpenAiEnv, RunConfig},
    confirm::ConfirmationMode,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Arguments of a grading run.
#[derive(Debug, Clone)]
struct GradeArgs {
    /// Prompt template file
    prompt:       PathBuf,
    /// Rubric file
    task:         PathBuf,
    /// Canvas assignment id
    task_num:     u64,
    /// Optional roster CSV
    students:     Option<PathBuf>,
    /// Confirmation mode
    confirmation: ConfirmationMode,
    /// Force dry-run
    dry_run:      bool,
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade an assignment
    Grade(GradeArgs),
    /// Print the course's students
    ListStudents,
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    let prompt = long("prompt")
        .help("Prompt template sent to the model as the system message")
        .argument::<PathBuf>("PATH");
    let task = long("task")
        .help("Rubric for the task being graded")
        .argument::<PathBuf>("PATH");
    let task_num = long("task-num")
        .help("Canvas assignment id to grade")
        .argument::<u64>("ID");
    let students = long("students")
        .help("CSV roster of student names or ids to restrict grading to")
        .argument::<PathBuf>("PATH")
        .optional();
    let confirmation = long("confirmation")
        .help("How grades are confirmed: full, prompt or dry-run")
        .argument::<ConfirmationMode>("MODE")
        .fallback(ConfirmationMode::Prompt)
        .display_fallback();
    let dry_run = long("dry-run")
        .help("Show what would be graded without writing to Canvas")
        .switch();

    let grade = construct!(GradeArgs {
        prompt,
        task,
        task_num,
        students,
        confirmation,
        dry_run
    })
    .map(Cmd::Grade);

    let list = long("list-students")
        .help("Print the students enrolled in the course and exit")
        .req_flag(Cmd::ListStudents);

    let cmd = construct!([list, grade]);

    cmd.to_options()
        .descr("Grade Canvas submissions with a language model")
        .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let cmd = options();

    match cmd {
        Cmd::ListStudents => {
            let canvas = CanvasEnv::from_env()?;
            let students = gradebot::list_students(&canvas).await?;
            println!("Enrolled users in course {}:", canvas.course_id());
            for student in students {
                println!("{}", student.name);
            }
        }
        Cmd::Grade(args) => {
            let canvas = CanvasEnv::from_env()?;
            let openai = OpenAiEnv::from_env()?;
            let config = RunConfig::load(
                &args.prompt,
                &args.task,
                args.task_num,
                args.students.as_deref(),
                args.confirmation,
                args.dry_run,
            )?;

            let summary = gradebot::grade(&config, &canvas, openai).await?;
            eprintln!("{}", summary.table());
        }
    };

    Ok(())
}
