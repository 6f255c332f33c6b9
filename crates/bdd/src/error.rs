use std::borrow::Cow;
use std::fmt::{self, Display};

use teamflow_core::ErrorKind as EngineErrorKind;

/// The kind of error that occurred while testing a workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine failed to advance the workflow.
    Engine(EngineErrorKind),
    /// The workflow ended in a failed state.
    WorkflowFailed,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Engine(kind) => write!(f, "Engine error ({kind})"),
            ErrorKind::WorkflowFailed => {
                write!(f, "Workflow did not finish successfully")
            }
        }
    }
}

/// Describes a testing error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates a new error with the `WorkflowFailed` kind.
    #[inline]
    pub fn workflow_failed<S: Into<String>>(reason: S) -> Self {
        Self {
            kind: ErrorKind::WorkflowFailed,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl From<teamflow_core::Error> for Error {
    fn from(err: teamflow_core::Error) -> Self {
        Self {
            kind: ErrorKind::Engine(err.kind()),
            reason: Some(err.reason().into_owned()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.kind, reason),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}
