#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::{HeaderMap, LINK},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::debug;

use crate::{
    config::CanvasEnv,
    constants::CANVAS_PAGE_SIZE,
    types::{GradingResult, Student, Submission},
};

/// Errors produced while talking to Canvas.
#[derive(thiserror::Error, Debug)]
pub enum CanvasError {
    /// The request could not be sent or its body could not be read.
    #[error("Canvas request failed")]
    Request(#[from] reqwest::Error),
    /// Canvas answered with a non-success status.
    #[error("Canvas returned {status} for {url}: {body}")]
    Status {
        /// HTTP status returned.
        status: StatusCode,
        /// URL that was requested.
        url:    String,
        /// Response body, for diagnostics.
        body:   String,
    },
    /// Canvas answered with something that is not the expected JSON.
    #[error("Could not decode Canvas response from {url}")]
    Decode {
        /// URL that was requested.
        url:    String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// The learning-management side of a grading run.
#[allow(async_fn_in_trait)]
pub trait Gradebook {
    /// Lists students enrolled in the course.
    async fn students(&self) -> Result<Vec<Student>, CanvasError>;

    /// Fetches every submission for an assignment.
    async fn submissions(&self, assignment_id: u64) -> Result<Vec<Submission>, CanvasError>;

    /// Fetches one student's submission, including its current grade and
    /// latest comment.
    async fn submission(
        &self,
        assignment_id: u64,
        user_id: u64,
    ) -> Result<Submission, CanvasError>;

    /// Writes a grade and, when non-empty, a comment for one student.
    async fn post_grade(
        &self,
        assignment_id: u64,
        user_id: u64,
        result: &GradingResult,
    ) -> Result<(), CanvasError>;
}

/// A Canvas user as returned by the course users endpoint.
#[derive(Deserialize)]
struct CanvasUser {
    /// User id.
    id:   u64,
    /// Display name.
    name: String,
}

/// A submission comment.
#[derive(Deserialize)]
struct CanvasComment {
    /// Comment text.
    comment: String,
}

/// A submission as returned by the submissions endpoints.
#[derive(Deserialize)]
struct CanvasSubmission {
    /// Author's user id.
    user_id:             u64,
    /// Text entry body, HTML.
    body:                Option<String>,
    /// Current grade.
    grade:               Option<String>,
    /// Set when the instructor excused the student; may be `null`.
    #[serde(default)]
    excused:             Option<bool>,
    /// Comments in chronological order.
    #[serde(default)]
    submission_comments: Vec<CanvasComment>,
}

impl From<CanvasSubmission> for Submission {
    fn from(raw: CanvasSubmission) -> Self {
        Submission {
            user_id: raw.user_id,
            answer:  raw.body,
            grade:   raw.grade,
            comment: raw.submission_comments.into_iter().next_back().map(|c| c.comment),
            excused: raw.excused.unwrap_or(false),
        }
    }
}

/// Returns the `rel="next"` target of a Canvas `Link` header, if any.
pub fn next_page_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().replace(' ', "") == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_owned)
    })
}

/// Thin Canvas REST client scoped to one course.
#[derive(Clone)]
pub struct CanvasClient {
    /// Shared HTTP client.
    http:      Client,
    /// Base URL of the Canvas instance.
    base:      String,
    /// Access token.
    token:     String,
    /// Course id.
    course_id: u64,
}

impl CanvasClient {
    /// Creates a client from environment configuration.
    pub fn new(env: &CanvasEnv) -> Result<Self, CanvasError> {
        let http = Client::builder().timeout(env.timeout()).build()?;
        Ok(Self {
            http,
            base: env.api_url().to_owned(),
            token: env.api_key().to_owned(),
            course_id: env.course_id(),
        })
    }

    /// Builds a course-scoped API URL.
    fn course_url(&self, path: &str) -> String {
        format!("{}/api/v1/courses/{}/{}", self.base, self.course_id, path)
    }

    /// Sends a request and turns non-success statuses into errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response, CanvasError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        debug!("{} {}", status, response.url());
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(CanvasError::Status { status, url, body })
    }

    /// Decodes a JSON body.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CanvasError> {
        let url = response.url().to_string();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| CanvasError::Decode { url, source })
    }

    /// Fetches every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, CanvasError> {
        let mut items = Vec::new();
        let mut request = self.http.get(self.course_url(path)).query(query);

        loop {
            let response = self.send(request).await?;
            let next = next_page_link(response.headers());
            let page: Vec<T> = Self::decode(response).await?;
            items.extend(page);

            match next {
                Some(url) => request = self.http.get(url),
                None => break,
            }
        }

        Ok(items)
    }
}

impl Gradebook for CanvasClient {
    async fn students(&self) -> Result<Vec<Student>, CanvasError> {
        let users: Vec<CanvasUser> = self
            .get_all("users", &[
                ("enrollment_type[]", "student".to_string()),
                ("per_page", CANVAS_PAGE_SIZE.to_string()),
            ])
            .await?;

        Ok(users
            .into_iter()
            .map(|u| Student::new(u.id, u.name))
            .collect())
    }

    async fn submissions(&self, assignment_id: u64) -> Result<Vec<Submission>, CanvasError> {
        let raw: Vec<CanvasSubmission> = self
            .get_all(&format!("assignments/{assignment_id}/submissions"), &[
                ("include[]", "submission_comments".to_string()),
                ("per_page", CANVAS_PAGE_SIZE.to_string()),
            ])
            .await?;

        Ok(raw.into_iter().map(Submission::from).collect())
    }

    async fn submission(
        &self,
        assignment_id: u64,
        user_id: u64,
    ) -> Result<Submission, CanvasError> {
        let url = self.course_url(&format!("assignments/{assignment_id}/submissions/{user_id}"));
        let request = self
            .http
            .get(url)
            .query(&[("include[]", "submission_comments")]);
        let raw: CanvasSubmission = Self::decode(self.send(request).await?).await?;

        Ok(raw.into())
    }

    async fn post_grade(
        &self,
        assignment_id: u64,
        user_id: u64,
        result: &GradingResult,
    ) -> Result<(), CanvasError> {
        let mut body = json!({
            "submission": { "posted_grade": result.grade.to_string() }
        });
        if !result.comment.trim().is_empty() {
            body["comment"] = json!({ "text_comment": result.comment });
        }

        let url = self.course_url(&format!("assignments/{assignment_id}/submissions/{user_id}"));
        self.send(self.http.put(url).json(&body)).await?;

        Ok(())
    }
}
