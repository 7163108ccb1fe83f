use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A student enrolled in the course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Student {
    /// Canvas user id.
    pub id:   u64,
    /// Display name as Canvas shows it.
    pub name: String,
}

impl Student {
    /// Creates a student.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Display for Student {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// One student's recorded answer for the selected assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    /// Canvas user id of the author.
    pub user_id: u64,
    /// Raw answer text, as Canvas stores it.
    pub answer:  Option<String>,
    /// Grade already recorded in Canvas.
    pub grade:   Option<String>,
    /// Most recent submission comment.
    pub comment: Option<String>,
    /// Excused by the instructor; counts as graded.
    pub excused: bool,
}

impl Submission {
    /// A placeholder for an enrolled student with no submission record.
    pub fn missing(user_id: u64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Returns the answer text when it has anything besides whitespace.
    pub fn answer_text(&self) -> Option<&str> {
        self.answer.as_deref().filter(|a| !a.trim().is_empty())
    }

    /// Whether Canvas already holds a non-empty grade for this submission, or
    /// the student was excused.
    pub fn is_graded(&self) -> bool {
        self.excused || self.grade.as_deref().is_some_and(|g| !g.trim().is_empty())
    }
}

/// A grade as written to Canvas' `posted_grade`.
#[derive(Debug, Clone, PartialEq)]
pub enum Grade {
    /// Numeric points.
    Points(f64),
    /// Letter grade or other categorical label, e.g. `A-` or `complete`.
    Label(String),
}

impl Grade {
    /// Parses user or model supplied text. Numbers become points, anything
    /// else non-empty becomes a label.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match text.parse::<f64>() {
            Ok(points) if points.is_finite() => Some(Grade::Points(points)),
            Ok(_) => None,
            Err(_) => Some(Grade::Label(text.to_owned())),
        }
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::Points(points) => write!(f, "{points}"),
            Grade::Label(label) => f.write_str(label),
        }
    }
}

/// Grade and comment proposed for a submission, held until it is committed or
/// discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingResult {
    /// The grade.
    pub grade:   Grade,
    /// Feedback for the student; may be empty.
    pub comment: String,
}

impl GradingResult {
    /// Creates a grading result.
    pub fn new(grade: Grade, comment: impl Into<String>) -> Self {
        Self {
            grade,
            comment: comment.into(),
        }
    }
}
