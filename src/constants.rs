#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Canvas instance used when `CANVAS_API_URL` is not set
pub const DEFAULT_CANVAS_URL: &str = "https://canvas.instructure.com";

/// OpenAI-compatible endpoint used when `OPENAI_BASE_URL` is not set
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when `OPENAI_MODEL` is not set
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Sampling temperature used when `OPENAI_TEMPERATURE` is not set
pub const DEFAULT_TEMPERATURE: f32 = 1.3;

/// Completion token cap used when `OPENAI_MAX_TOKENS` is not set
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Canvas request timeout used when `CANVAS_TIMEOUT_SECS` is not set
pub const DEFAULT_CANVAS_TIMEOUT_SECS: u64 = 30;

/// Page size requested from Canvas list endpoints (Canvas caps this at 100)
pub const CANVAS_PAGE_SIZE: u32 = 100;

/// Prefix of the system message carrying the rubric
pub const TASK_PREFIX: &str = "Task: ";

/// Reviewer input that clears the proposed comment while editing
pub const CLEAR_COMMENT: &str = "-";
