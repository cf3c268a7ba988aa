//! Verdict interpretation.
//!
//! # State Machine
//! ```text
//! 200                 → Allow (AllowWithHeaders when a relay manifest is present)
//! 301, 302, 401, 403  → Block, rewrite to the `url` from the JSON body
//! 400                 → AuthError, our own key was rejected
//! anything else       → FailOpen
//! timeout / transport → FailOpen
//! ```
//!
//! # Design Decisions
//! - `STATUS_TABLE` is the single source of truth for the status mapping
//! - A blocking status with an unparseable body, or no usable `url`, fails
//!   open: we cannot send the user anywhere, and refusing the request on a
//!   service-side defect would turn it into an outage

use axum::http::StatusCode;
use serde::Deserialize;
use std::fmt;

use crate::validation::client::{DecisionResponse, ValidatorError};
use crate::validation::RESPONSE_MANIFEST_HEADER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Allow,
    Block,
    AuthError,
}

const STATUS_TABLE: &[(u16, StatusClass)] = &[
    (200, StatusClass::Allow),
    (301, StatusClass::Block),
    (302, StatusClass::Block),
    (401, StatusClass::Block),
    (403, StatusClass::Block),
    (400, StatusClass::AuthError),
];

fn classify(status: StatusCode) -> Option<StatusClass> {
    STATUS_TABLE
        .iter()
        .find(|(code, _)| *code == status.as_u16())
        .map(|(_, class)| *class)
}

/// Where a blocked request is rewritten to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTarget {
    pub url: String,
}

/// Why the gateway let a request through without a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOpenReason {
    Timeout,
    Transport(String),
    UnrecognizedStatus(u16),
    MalformedBody(String),
}

impl fmt::Display for FailOpenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailOpenReason::Timeout => f.write_str("timeout"),
            FailOpenReason::Transport(e) => write!(f, "transport failure: {}", e),
            FailOpenReason::UnrecognizedStatus(code) => write!(f, "unrecognized status {}", code),
            FailOpenReason::MalformedBody(e) => write!(f, "malformed verdict body: {}", e),
        }
    }
}

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    AllowWithHeaders,
    Block {
        status: StatusCode,
        target: RewriteTarget,
    },
    AuthError,
    FailOpen(FailOpenReason),
}

impl Verdict {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::AllowWithHeaders => "allow_with_headers",
            Verdict::Block { .. } => "block",
            Verdict::AuthError => "auth_error",
            Verdict::FailOpen(FailOpenReason::Timeout) => "fail_open_timeout",
            Verdict::FailOpen(FailOpenReason::Transport(_)) => "fail_open_transport",
            Verdict::FailOpen(FailOpenReason::UnrecognizedStatus(_)) => "fail_open_status",
            Verdict::FailOpen(FailOpenReason::MalformedBody(_)) => "fail_open_malformed",
        }
    }

    /// True when the decision-service headers should be relayed.
    pub fn relays_headers(&self) -> bool {
        matches!(
            self,
            Verdict::Allow | Verdict::AllowWithHeaders | Verdict::Block { .. }
        )
    }
}

#[derive(Debug, Deserialize)]
struct VerdictBody {
    url: Option<String>,
}

/// Map the validator outcome to a verdict.
pub fn interpret(outcome: &Result<DecisionResponse, ValidatorError>) -> Verdict {
    let response = match outcome {
        Ok(response) => response,
        Err(ValidatorError::Timeout(_)) => return Verdict::FailOpen(FailOpenReason::Timeout),
        Err(ValidatorError::Transport(e)) | Err(ValidatorError::Aborted(e)) => {
            return Verdict::FailOpen(FailOpenReason::Transport(e.clone()))
        }
    };

    match classify(response.status) {
        Some(StatusClass::Allow) if response.headers.contains_key(RESPONSE_MANIFEST_HEADER) => {
            Verdict::AllowWithHeaders
        }
        Some(StatusClass::Allow) => Verdict::Allow,
        Some(StatusClass::Block) => match rewrite_target(&response.body) {
            Ok(target) => Verdict::Block {
                status: response.status,
                target,
            },
            Err(reason) => Verdict::FailOpen(FailOpenReason::MalformedBody(reason)),
        },
        Some(StatusClass::AuthError) => Verdict::AuthError,
        None => Verdict::FailOpen(FailOpenReason::UnrecognizedStatus(response.status.as_u16())),
    }
}

fn rewrite_target(body: &[u8]) -> Result<RewriteTarget, String> {
    let parsed: VerdictBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let raw = parsed
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| "missing url".to_string())?;
    let url = url::Url::parse(raw.trim()).map_err(|e| format!("invalid url: {}", e))?;

    Ok(RewriteTarget {
        url: url.to_string(),
    })
}
