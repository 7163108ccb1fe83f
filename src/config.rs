#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use typed_builder::TypedBuilder;

use crate::{
    confirm::ConfirmationMode,
    constants::{
        DEFAULT_CANVAS_TIMEOUT_SECS, DEFAULT_CANVAS_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
        DEFAULT_OPENAI_BASE_URL, DEFAULT_TEMPERATURE,
    },
    roster::Roster,
};

/// Reads a required variable, treating blank values as missing.
fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    match lookup(key).map(|v| v.trim().to_owned()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("{key} must be set (environment or .env file)"),
    }
}

/// Reads an optional variable, falling back to `default` when unset or blank.
fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

/// Parses an optional variable, falling back to `default` when it is missing
/// or does not parse.
fn parsed_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Canvas credentials and course selection sourced from the environment.
#[derive(Clone, Debug)]
pub struct CanvasEnv {
    /// Base URL of the Canvas instance, without a trailing slash.
    api_url:   String,
    /// Personal access token used as a bearer token.
    api_key:   String,
    /// Course whose assignments are graded.
    course_id: u64,
    /// Per-request timeout.
    timeout:   Duration,
}

impl CanvasEnv {
    /// Builds the Canvas configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the Canvas configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = required(&lookup, "CANVAS_API_KEY")?;
        let course_id = required(&lookup, "CANVAS_COURSE_ID")?;
        let course_id = course_id
            .parse::<u64>()
            .with_context(|| format!("CANVAS_COURSE_ID must be a number, got `{course_id}`"))?;
        let api_url = optional(&lookup, "CANVAS_API_URL", DEFAULT_CANVAS_URL)
            .trim_end_matches('/')
            .to_owned();
        let timeout = Duration::from_secs(parsed_or(
            &lookup,
            "CANVAS_TIMEOUT_SECS",
            DEFAULT_CANVAS_TIMEOUT_SECS,
        ));

        Ok(Self {
            api_url,
            api_key,
            course_id,
            timeout,
        })
    }

    /// Returns the Canvas base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the Canvas access token.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the course id.
    pub fn course_id(&self) -> u64 {
        self.course_id
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// OpenAI credentials and tuning parameters sourced from the environment.
#[derive(Clone, Debug)]
pub struct OpenAiEnv {
    /// Base URL for the OpenAI-compatible API endpoint.
    api_base:    String,
    /// API key used to authenticate requests.
    api_key:     String,
    /// Model identifier for chat completions.
    model:       String,
    /// Sampling temperature.
    temperature: f32,
    /// Upper bound on completion tokens.
    max_tokens:  u32,
}

impl OpenAiEnv {
    /// Builds the OpenAI configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the OpenAI configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_key:     required(&lookup, "OPENAI_API_KEY")?,
            api_base:    optional(&lookup, "OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_owned(),
            model:       optional(&lookup, "OPENAI_MODEL", DEFAULT_MODEL),
            temperature: parsed_or(&lookup, "OPENAI_TEMPERATURE", DEFAULT_TEMPERATURE),
            max_tokens:  parsed_or(&lookup, "OPENAI_MAX_TOKENS", DEFAULT_MAX_TOKENS),
        })
    }

    /// Returns the API base URL used for completion requests.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the API key used for completion requests.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the completion token cap.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Everything the grading loop needs to know about one run. Read-only once
/// built.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RunConfig {
    /// Prompt template sent as the first system message.
    #[builder(setter(into))]
    prompt:        String,
    /// Rubric text for the graded task.
    #[builder(setter(into))]
    rubric:        String,
    /// Canvas assignment id selected with `--task-num`.
    assignment_id: u64,
    /// Optional restriction of the students in scope.
    #[builder(default)]
    roster:        Option<Roster>,
    /// How grades are confirmed before they are written.
    #[builder(default = ConfirmationMode::Prompt)]
    mode:          ConfirmationMode,
}

impl RunConfig {
    /// Loads prompt, rubric and roster files and resolves the effective
    /// confirmation mode (`dry_run` wins over `mode`).
    pub fn load(
        prompt_path: &Path,
        rubric_path: &Path,
        assignment_id: u64,
        roster_path: Option<&Path>,
        mode: ConfirmationMode,
        dry_run: bool,
    ) -> Result<Self> {
        let prompt = read_text(prompt_path, "prompt template")?;
        let rubric = read_text(rubric_path, "rubric")?;
        let roster = roster_path.map(Roster::from_path).transpose()?;
        if let (Some(path), Some(roster)) = (roster_path, roster.as_ref())
            && roster.is_empty()
        {
            bail!("The roster {} lists no students", path.display());
        }
        let mode = if dry_run {
            ConfirmationMode::DryRun
        } else {
            mode
        };

        Ok(Self::builder()
            .prompt(prompt)
            .rubric(rubric)
            .assignment_id(assignment_id)
            .roster(roster)
            .mode(mode)
            .build())
    }

    /// Returns the prompt template.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the rubric text.
    pub fn rubric(&self) -> &str {
        &self.rubric
    }

    /// Returns the selected assignment id.
    pub fn assignment_id(&self) -> u64 {
        self.assignment_id
    }

    /// Returns the roster, if one was given.
    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    /// Returns the confirmation mode.
    pub fn mode(&self) -> ConfirmationMode {
        self.mode
    }
}

/// Reads a non-empty text input file.
fn read_text(path: &Path, what: &str) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {what} from {}", path.display()))?;
    if text.trim().is_empty() {
        bail!("The {what} file {} is empty", path.display());
    }
    Ok(text)
}
