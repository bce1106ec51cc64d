//! Request failure captured at the pipeline boundary.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::pool::{BoxError, PoolError};

/// Which part of the request lifecycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No pooled instance could be checked out.
    PoolExhausted,
    /// A checked-out resource is broken and must not be reused.
    ResourceFault,
    /// Handler logic failed.
    DispatchFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::PoolExhausted => "PoolExhausted",
            FailureKind::ResourceFault => "ResourceFault",
            FailureKind::DispatchFailure => "DispatchFailure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed dynamic request, with where it was raised.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Failure {
    kind: FailureKind,
    message: String,
    code: u16,
    resource: Option<String>,
    location: &'static Location<'static>,
    trace: String,
    #[source]
    source: Option<BoxError>,
}

impl Failure {
    #[track_caller]
    fn new(kind: FailureKind, message: String, code: u16) -> Self {
        let location = Location::caller();
        Self {
            kind,
            message,
            code,
            resource: None,
            location,
            trace: capture_trace(location),
            source: None,
        }
    }

    /// Handler logic failed.
    #[track_caller]
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DispatchFailure, message.into(), 500)
    }

    /// Handler logic failed because of `err`.
    #[track_caller]
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut failure = Self::new(FailureKind::DispatchFailure, err.to_string(), 500);
        failure.source = Some(Box::new(err));
        failure
    }

    /// The resource checked out under `resource` is broken.
    #[track_caller]
    pub fn resource_fault(resource: impl Into<String>, message: impl Into<String>) -> Self {
        let mut failure = Self::new(FailureKind::ResourceFault, message.into(), 500);
        failure.resource = Some(resource.into());
        failure
    }

    /// Checkout from a pool failed.
    #[track_caller]
    pub fn pool(err: PoolError) -> Self {
        let mut failure = Self::new(FailureKind::PoolExhausted, err.to_string(), 503);
        failure.source = Some(Box::new(err));
        failure
    }

    /// Override the error code carried into diagnostics.
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Name of the resource to discard instead of release, if any.
    pub fn faulted_resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    pub fn line(&self) -> u32 {
        self.location.line()
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }
}

impl From<PoolError> for Failure {
    #[track_caller]
    fn from(err: PoolError) -> Self {
        Failure::pool(err)
    }
}

fn capture_trace(location: &Location<'_>) -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        _ => format!("at {}:{}", location.file(), location.line()),
    }
}
