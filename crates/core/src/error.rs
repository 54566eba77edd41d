//! The RPC-boundary error vocabulary (spec.md §6/§7).
//!
//! Every crate in this workspace defines its own `thiserror` enum scoped to
//! its own concerns; `Status` is the shared, flattened shape those errors
//! collapse into at the point they cross into an RPC response. Internal
//! code should propagate its own error type with `?` and only convert to
//! `Status` at that boundary (the server's dispatch loop).

use thiserror::Error;

/// One of the error codes in spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
  NotFound,
  AlreadyExists,
  FailedPrecondition,
  InvalidArgument,
  ResourceExhausted,
  PermissionDenied,
  Unavailable,
  Internal,
}

impl Code {
  pub fn as_str(&self) -> &'static str {
    match self {
      Code::NotFound => "NOT_FOUND",
      Code::AlreadyExists => "ALREADY_EXISTS",
      Code::FailedPrecondition => "FAILED_PRECONDITION",
      Code::InvalidArgument => "INVALID_ARGUMENT",
      Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
      Code::PermissionDenied => "PERMISSION_DENIED",
      Code::Unavailable => "UNAVAILABLE",
      Code::Internal => "INTERNAL",
    }
  }
}

/// A `(code, message)` pair carried over the RPC boundary.
#[derive(Error, Debug, Clone)]
#[error("{code:?}: {message}")]
pub struct Status {
  pub code: Code,
  pub message: String,
}

impl Status {
  pub fn new(code: Code, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
    }
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::new(Code::NotFound, message)
  }

  pub fn already_exists(message: impl Into<String>) -> Self {
    Self::new(Code::AlreadyExists, message)
  }

  pub fn failed_precondition(message: impl Into<String>) -> Self {
    Self::new(Code::FailedPrecondition, message)
  }

  pub fn invalid_argument(message: impl Into<String>) -> Self {
    Self::new(Code::InvalidArgument, message)
  }

  pub fn resource_exhausted(message: impl Into<String>) -> Self {
    Self::new(Code::ResourceExhausted, message)
  }

  pub fn permission_denied(message: impl Into<String>) -> Self {
    Self::new(Code::PermissionDenied, message)
  }

  pub fn unavailable(message: impl Into<String>) -> Self {
    Self::new(Code::Unavailable, message)
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::new(Code::Internal, message)
  }
}

pub type Result<T> = std::result::Result<T, Status>;
