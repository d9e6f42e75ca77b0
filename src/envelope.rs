use schemars::JsonSchema;
use serde::Serialize;

use crate::api::ApiError;

/// Uniform outcome wrapper for every tool operation.
///
/// Success carries the payload fields flattened next to `success: true`;
/// failure carries a human-readable `error` plus optional diagnostic
/// `details` (remote status body) and a remediation `suggestion`. No tool
/// ever surfaces an error to the transport layer in any other shape.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum ToolResult<T> {
    Success {
        success: bool,
        #[serde(flatten)]
        payload: T,
    },
    Failure {
        success: bool,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
}

impl<T> ToolResult<T> {
    pub fn ok(payload: T) -> Self {
        ToolResult::Success {
            success: true,
            payload,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        ToolResult::Failure {
            success: false,
            error: error.into(),
            details: None,
            suggestion: None,
        }
    }

    pub fn local_fault(description: impl Into<String>) -> Self {
        ToolResult::Failure {
            success: false,
            error: format!("Unexpected local fault: {}", description.into()),
            details: None,
            suggestion: None,
        }
    }

    /// Normalize an [`ApiError`] into the failure shape, distinguishing
    /// the three diagnostic origins: missing authentication, remote non-2xx
    /// responses, and local faults.
    pub fn from_api_error(err: &ApiError) -> Self {
        let (error, details, suggestion) = match err {
            ApiError::NotAuthenticated => (
                err.to_string(),
                None,
                Some(
                    "Configure BITBUCKET_EMAIL and BITBUCKET_TOKEN, or call the \
                     authenticate tool with an explicit email"
                    .to_string(),
                ),
            ),
            ApiError::AuthenticationFailed { body, .. } => (
                err.to_string(),
                non_empty(body),
                Some(
                    "Verify the account email and that the API token grants read \
                     access to account, repositories and pull requests"
                    .to_string(),
                ),
            ),
            ApiError::RemoteApi { body, .. } => (err.to_string(), non_empty(body), None),
            ApiError::NotFound(_) => (err.to_string(), None, None),
            ApiError::AmbiguousRepository { candidates, .. } => (
                err.to_string(),
                None,
                Some(format!(
                    "Specify the workspace explicitly; candidates: {}",
                    candidates.join(", ")
                )),
            ),
            ApiError::Transport(source) => (
                "Unexpected local fault while calling the Bitbucket API".to_string(),
                Some(source.to_string()),
                None,
            ),
        };
        ToolResult::Failure {
            success: false,
            error,
            details,
            suggestion,
        }
    }

    /// Attach a remediation hint to a failure; success values pass through.
    pub fn with_suggestion(self, hint: impl Into<String>) -> Self {
        match self {
            ToolResult::Failure {
                success,
                error,
                details,
                ..
            } => ToolResult::Failure {
                success,
                error,
                details,
                suggestion: Some(hint.into()),
            },
            success => success,
        }
    }
}

fn non_empty(body: &str) -> Option<String> {
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}
