#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{io::Read, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::warn;

use crate::types::Student;

/// One row of the roster file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEntry {
    /// A numeric Canvas user id.
    Id(u64),
    /// A display name, stored normalized.
    Name(String),
}

impl RosterEntry {
    /// Interprets a roster cell. Returns `None` for blank cells.
    fn parse(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        Some(match cell.parse::<u64>() {
            Ok(id) => RosterEntry::Id(id),
            Err(_) => RosterEntry::Name(normalize(cell)),
        })
    }

    /// Whether this entry refers to `student`.
    pub fn matches(&self, student: &Student) -> bool {
        match self {
            RosterEntry::Id(id) => *id == student.id,
            RosterEntry::Name(name) => *name == normalize(&student.name),
        }
    }
}

/// Lowercases and collapses runs of whitespace.
fn normalize(name: &str) -> String {
    name.split_whitespace().join(" ").to_lowercase()
}

/// Header cells recognised on the first row.
const HEADER_CELLS: [&str; 2] = ["name", "student"];

/// An optional restriction of which students are graded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    /// Entries in file order.
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Reads a roster CSV from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Could not open roster {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Could not parse roster {}", path.display()))
    }

    /// Reads a roster CSV. Only the first column is used; an optional
    /// `name`/`student` header row and blank rows are ignored.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (index, record) in rows.records().enumerate() {
            let record = record.with_context(|| format!("Malformed roster row {}", index + 1))?;
            let Some(cell) = record.get(0) else {
                continue;
            };
            if index == 0 && HEADER_CELLS.iter().any(|h| cell.eq_ignore_ascii_case(h)) {
                continue;
            }
            if let Some(entry) = RosterEntry::parse(cell) {
                entries.push(entry);
            }
        }

        Ok(Self { entries })
    }

    /// Returns the roster entries.
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    /// Whether the roster has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `student` is listed.
    pub fn contains(&self, student: &Student) -> bool {
        self.entries.iter().any(|entry| entry.matches(student))
    }

    /// Keeps the students listed in the roster, preserving the order of
    /// `students`. Entries that match nobody are logged.
    pub fn restrict(&self, students: Vec<Student>) -> Vec<Student> {
        for entry in &self.entries {
            if !students.iter().any(|s| entry.matches(s)) {
                match entry {
                    RosterEntry::Id(id) => warn!("Roster id {id} is not enrolled in the course"),
                    RosterEntry::Name(name) => {
                        warn!("Roster name `{name}` is not enrolled in the course")
                    }
                }
            }
        }

        students.into_iter().filter(|s| self.contains(s)).collect()
    }
}
