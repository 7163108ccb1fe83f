#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CompletionUsage, CreateChatCompletionRequest,
        ResponseFormat,
    },
};
use backoff::ExponentialBackoffBuilder;
use serde_json::Value;
use tracing::info;

use crate::{
    config::OpenAiEnv,
    constants::TASK_PREFIX,
    types::{Grade, GradingResult},
};

/// Reasons a model reply does not follow the grading schema.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ResponseError {
    /// The content is not JSON.
    #[error("Model reply is not valid JSON: {0}")]
    NotJson(String),
    /// The JSON is not an object.
    #[error("Model reply is not a JSON object")]
    NotAnObject,
    /// `grade` is absent or null.
    #[error("Model reply has no `grade`")]
    MissingGrade,
    /// `grade` is neither a finite number nor a non-empty string.
    #[error("Model reply has an unusable `grade`: {0}")]
    InvalidGrade(String),
    /// `comment` is present but not a string.
    #[error("Model reply has a non-string `comment`: {0}")]
    InvalidComment(String),
}

/// Errors produced while asking the model for a grade.
#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    /// The API call failed.
    #[error("Completion request failed")]
    Api(#[from] OpenAIError),
    /// The API answered without any message content.
    #[error("Model returned nothing")]
    Empty,
    /// The content did not match the grading schema.
    #[error("Malformed model response")]
    Malformed {
        /// What was wrong with it.
        #[source]
        reason:  ResponseError,
        /// The raw content, for the log.
        content: String,
    },
}

/// Parses model output into a grading result.
///
/// The content must be a JSON object with a required `grade` (a finite
/// number, or a non-empty string; numeric strings count as points) and an
/// optional string `comment`.
pub fn parse_grading_response(content: &str) -> Result<GradingResult, ResponseError> {
    let value: Value =
        serde_json::from_str(content.trim()).map_err(|e| ResponseError::NotJson(e.to_string()))?;
    let object = value.as_object().ok_or(ResponseError::NotAnObject)?;

    let grade = match object.get("grade") {
        None | Some(Value::Null) => return Err(ResponseError::MissingGrade),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|p| p.is_finite())
            .map(Grade::Points)
            .ok_or_else(|| ResponseError::InvalidGrade(n.to_string()))?,
        Some(Value::String(s)) => {
            Grade::parse(s).ok_or_else(|| ResponseError::InvalidGrade(format!("{s:?}")))?
        }
        Some(other) => return Err(ResponseError::InvalidGrade(other.to_string())),
    };

    let comment = match object.get("comment") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(ResponseError::InvalidComment(other.to_string())),
    };

    Ok(GradingResult::new(grade, comment))
}

/// What is sent to the model for one submission.
#[derive(Debug, Clone, Copy)]
pub struct GradingRequest<'a> {
    /// Prompt template.
    pub prompt: &'a str,
    /// Rubric for the task.
    pub rubric: &'a str,
    /// The student's answer.
    pub answer: &'a str,
}

impl GradingRequest<'_> {
    /// Builds the chat messages: prompt and rubric as system messages, the
    /// answer as the user message.
    pub fn messages(&self) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompt.to_owned())
                .build()?
                .into(),
            ChatCompletionRequestSystemMessageArgs::default()
                .content(format!("{TASK_PREFIX}{}", self.rubric))
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(self.answer.to_owned())
                .build()?
                .into(),
        ])
    }
}

/// The model side of a grading run.
#[allow(async_fn_in_trait)]
pub trait Grader {
    /// Asks for a grade and comment for one submission.
    async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult, CompletionError>;
}

/// Logs token usage and, when the provider reports it, the prompt-cache hit
/// ratio.
fn log_usage(usage: &CompletionUsage) {
    info!(
        "API usage: prompt_tokens={}, completion_tokens={}, total_tokens={}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );

    let cached = usage
        .prompt_tokens_details
        .as_ref()
        .and_then(|d| d.cached_tokens)
        .unwrap_or(0);
    if cached > 0 && usage.prompt_tokens > 0 {
        info!("Cache ratio: {:.2}", f64::from(cached) * 100.0 / f64::from(usage.prompt_tokens));
    }
}

/// Grades submissions through an OpenAI-compatible chat completion API.
pub struct OpenAiGrader {
    /// API client.
    client: OpenAIClient<OpenAIConfig>,
    /// Model and sampling settings.
    env:    OpenAiEnv,
}

impl OpenAiGrader {
    /// Creates a grader from environment configuration. Failed requests are
    /// never retried; rate limits and server errors surface immediately.
    pub fn new(env: OpenAiEnv) -> Self {
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        let client = OpenAIClient::with_config(
            OpenAIConfig::new()
                .with_api_base(env.api_base().to_owned())
                .with_api_key(env.api_key().to_owned()),
        )
        .with_backoff(no_retry);
        Self { client, env }
    }
}

impl Grader for OpenAiGrader {
    // Several compatible servers ignore `max_completion_tokens`.
    #[allow(deprecated)]
    async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult, CompletionError> {
        let response = self
            .client
            .chat()
            .create(CreateChatCompletionRequest {
                model: self.env.model().to_owned(),
                messages: request.messages()?,
                temperature: Some(self.env.temperature()),
                max_tokens: Some(self.env.max_tokens()),
                response_format: Some(ResponseFormat::JsonObject),
                n: Some(1),
                stream: Some(false),
                ..Default::default()
            })
            .await?;

        if let Some(usage) = response.usage.as_ref() {
            log_usage(usage);
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::Empty)?;

        parse_grading_response(&content)
            .map_err(|reason| CompletionError::Malformed { reason, content })
    }
}
