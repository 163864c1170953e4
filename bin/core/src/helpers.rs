//! Error plumbing between the core components, the build
//! record and the HTTP layer.

use axum::http::StatusCode;
use burndler_client::entities::error::ErrorKind;
use serror::AddStatusCode;

/// A structured core error: the stable [ErrorKind] plus the
/// underlying cause. The kind is what failed builds persist and
/// what the HTTP layer maps to a status code.
#[derive(Debug)]
pub struct CoreError {
  pub kind: ErrorKind,
  pub error: anyhow::Error,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
  pub fn new(
    kind: ErrorKind,
    msg: impl std::fmt::Display,
  ) -> CoreError {
    CoreError {
      kind,
      error: anyhow::anyhow!("{msg}"),
    }
  }
}

impl std::fmt::Display for CoreError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {:#}", self.kind, self.error)
  }
}

impl std::error::Error for CoreError {}

impl From<anyhow::Error> for CoreError {
  fn from(error: anyhow::Error) -> CoreError {
    CoreError {
      kind: ErrorKind::Internal,
      error,
    }
  }
}

pub fn err(
  kind: ErrorKind,
  msg: impl std::fmt::Display,
) -> CoreError {
  CoreError::new(kind, msg)
}

/// Tag an untyped result with a stable error kind.
pub trait AddErrorKind<T> {
  fn error_kind(self, kind: ErrorKind) -> CoreResult<T>;
}

impl<T, E: Into<anyhow::Error>> AddErrorKind<T> for Result<T, E> {
  fn error_kind(self, kind: ErrorKind) -> CoreResult<T> {
    self.map_err(|e| CoreError {
      kind,
      error: e.into(),
    })
  }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::InvalidRequest
    | ErrorKind::TemplateParseError
    | ErrorKind::TemplateExecError
    | ErrorKind::PostRenderStructureError
    | ErrorKind::DependencyValidationFailed
    | ErrorKind::NamespaceCollision
    | ErrorKind::LintFailed
    | ErrorKind::PathCollision
    | ErrorKind::InvalidSetupToken => StatusCode::BAD_REQUEST,
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::Conflict | ErrorKind::SetupAlreadyCompleted => {
      StatusCode::CONFLICT
    }
    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
    ErrorKind::Cancelled
    | ErrorKind::StorageUnavailable
    | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

/// Lift a [CoreResult] to the HTTP layer: kind-prefixed message,
/// status code per [status_for].
pub fn respond<T>(result: CoreResult<T>) -> serror::Result<T> {
  match result {
    Ok(value) => Ok(value),
    Err(e) => {
      let status = status_for(e.kind);
      Err::<T, anyhow::Error>(
        e.error.context(e.kind.to_string()),
      )
      .status_code(status)
    }
  }
}
