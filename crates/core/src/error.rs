use std::borrow::Cow;
use std::fmt::{self, Display};

use teamflow_model::{ErrorKind as ModelErrorKind, ModelProviderError};

/// The kind of error that occurred while advancing a workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The model provider failed to answer.
    Provider(ModelErrorKind),
    /// The model answered with something the request didn't ask for.
    MalformedResponse,
    /// An agent identity that is not part of the roster.
    UnknownAgent,
    /// A terminal state without any message to return.
    EmptyTranscript,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Provider(kind) => write!(f, "Provider error ({kind})"),
            ErrorKind::MalformedResponse => write!(f, "Malformed response"),
            ErrorKind::UnknownAgent => write!(f, "Unknown agent"),
            ErrorKind::EmptyTranscript => write!(f, "Empty transcript"),
        }
    }
}

/// Describes an engine error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates a new error from a provider failure.
    pub fn provider(err: &dyn ModelProviderError) -> Self {
        Self {
            kind: ErrorKind::Provider(err.kind()),
            reason: Some(err.to_string()),
        }
    }

    /// Creates a new error with the `MalformedResponse` kind.
    #[inline]
    pub fn malformed_response() -> Self {
        Self {
            kind: ErrorKind::MalformedResponse,
            reason: None,
        }
    }

    /// Creates a new error with the `UnknownAgent` kind.
    #[inline]
    pub fn unknown_agent<S: Into<String>>(name: S) -> Self {
        Self {
            kind: ErrorKind::UnknownAgent,
            reason: Some(name.into()),
        }
    }

    /// Creates a new error with the `EmptyTranscript` kind.
    #[inline]
    pub fn empty_transcript() -> Self {
        Self {
            kind: ErrorKind::EmptyTranscript,
            reason: None,
        }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
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

    /// Returns `true` if the error came out of a model round-trip.
    ///
    /// Such errors are recorded in the transcript and fail the current
    /// state, instead of aborting the step.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Provider(_) | ErrorKind::MalformedResponse
        )
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
