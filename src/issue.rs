//! Validation issues and validation results.
//!
//! An [`Issue`] is the unit of validation feedback: a message and an optional path into the
//! form state.  Issues without a path belong to the form as a whole.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::{PathSegment, format_path};

/// Message of the issue synthesized when a custom validator rejects the form outright.
pub const VALIDATION_FAILED_MESSAGE: &str = "Validation failed";

/// Message of the issue synthesized when a submit callback fails.
pub const SUBMISSION_FAILED_MESSAGE: &str = "An unexpected error occurred during submission";

//////////////////////////////////////////// IssueSegment ////////////////////////////////////////////

/// A segment of an issue path as reported by a validator.
///
/// Validators either report bare keys and indices or wrap them in a `{ "key": ... }` object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssueSegment {
    /// A bare key or index.
    Plain(PathSegment),
    /// A structured segment exposing its key.
    Keyed {
        /// The key this segment refers to.
        key: PathSegment,
    },
}

impl IssueSegment {
    /// Unwraps structured segments to the key they carry.
    pub fn key(&self) -> &PathSegment {
        match self {
            IssueSegment::Plain(segment) => segment,
            IssueSegment::Keyed { key } => key,
        }
    }
}

impl From<PathSegment> for IssueSegment {
    fn from(segment: PathSegment) -> Self {
        IssueSegment::Plain(segment)
    }
}

impl From<&str> for IssueSegment {
    fn from(key: &str) -> Self {
        IssueSegment::Plain(PathSegment::from(key))
    }
}

impl From<usize> for IssueSegment {
    fn from(index: usize) -> Self {
        IssueSegment::Plain(PathSegment::Index(index))
    }
}

/////////////////////////////////////////////// Issue ///////////////////////////////////////////////

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    /// Human readable description of the problem.
    pub message: String,
    /// Where the problem is; `None` marks an issue that no field owns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<IssueSegment>>,
}

impl Issue {
    /// Creates an issue at the given path.
    pub fn new<I, S>(message: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<IssueSegment>,
    {
        Issue {
            message: message.into(),
            path: Some(path.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates a form-level issue, reported with an empty path.
    pub fn form_level(message: impl Into<String>) -> Self {
        Issue {
            message: message.into(),
            path: Some(Vec::new()),
        }
    }

    /// Creates an issue that carries no path at all.
    pub fn without_path(message: impl Into<String>) -> Self {
        Issue {
            message: message.into(),
            path: None,
        }
    }

    /// Returns the path with structured segments unwrapped, formatted as `users[0].name`.
    pub fn path_string(&self) -> Option<String> {
        self.path.as_ref().map(|path| {
            let segments: Vec<PathSegment> = path.iter().map(|s| s.key().clone()).collect();
            format_path(&segments)
        })
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.path_string() {
            Some(path) if !path.is_empty() => write!(f, "{}: {}", path, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

///////////////////////////////////////// ValidationOutcome /////////////////////////////////////////

/// The result of running a schema: either the parsed value or the issues found.
///
/// Serializes as `{"value": ...}` or `{"issues": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationOutcome {
    /// Validation passed and produced this output.
    Value(Value),
    /// Validation failed with these issues.
    Issues(Vec<Issue>),
}

impl ValidationOutcome {
    /// True for [`ValidationOutcome::Value`].
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Value(_))
    }

    /// The parsed value of a passing outcome.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ValidationOutcome::Value(value) => Some(value),
            ValidationOutcome::Issues(_) => None,
        }
    }

    /// The issues of a failing outcome.
    pub fn issues(&self) -> Option<&[Issue]> {
        match self {
            ValidationOutcome::Value(_) => None,
            ValidationOutcome::Issues(issues) => Some(issues),
        }
    }
}

///////////////////////////////////////// CustomValidation /////////////////////////////////////////

/// What a custom `on_validate` hook concluded after the schema passed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CustomValidation {
    /// The data is acceptable.
    #[default]
    Pass,
    /// The data is rejected as a whole.
    Fail,
    /// The data is rejected with field-level issues; an empty list counts as a pass.
    Issues(Vec<Issue>),
}

impl From<bool> for CustomValidation {
    fn from(ok: bool) -> Self {
        if ok {
            CustomValidation::Pass
        } else {
            CustomValidation::Fail
        }
    }
}

impl From<()> for CustomValidation {
    fn from(_: ()) -> Self {
        CustomValidation::Pass
    }
}

impl From<Vec<Issue>> for CustomValidation {
    fn from(issues: Vec<Issue>) -> Self {
        CustomValidation::Issues(issues)
    }
}
