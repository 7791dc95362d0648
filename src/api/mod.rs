pub mod handlers;
pub mod wire;

pub use handlers::{generate_processing_routes, generate_system_routes};

use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::ProcessingMetrics;
use crate::operations::OpError;

/// Error responder for the processing endpoints.
///
/// The HTTP status follows the operation taxonomy: invalid arguments
/// (malformed DTOs, rejected request invariants) answer 400, anything else
/// that escapes before task submission answers 500. Failures after submission
/// never surface here; they are folded into operation outcomes.
#[derive(Debug)]
pub struct AppError {
    status: Status,
    error: anyhow::Error,
}

/// Wire shape of an error response: the outermost message plus the rest of
/// the cause chain, so a client can tell a rejected request from a fault.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    causes: Vec<String>,
}

impl AppError {
    pub fn bad_request(error: anyhow::Error) -> Self {
        Self {
            status: Status::BadRequest,
            error,
        }
    }

    pub fn internal(error: anyhow::Error) -> Self {
        Self {
            status: Status::InternalServerError,
            error,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error)
    }
}

impl From<OpError> for AppError {
    fn from(error: OpError) -> Self {
        let status = if error.is_invalid_argument() {
            Status::BadRequest
        } else {
            Status::InternalServerError
        };
        Self {
            status,
            error: anyhow::Error::from(error),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'o> {
        let message = self.error.to_string();
        let causes = self
            .error
            .chain()
            .skip(1)
            .map(|cause| cause.to_string())
            .collect();
        (self.status, Json(ErrorBody { message, causes })).respond_to(request)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Tracks one request in the metrics registry.
///
/// Created at the top of a handler; the drop records duration and releases
/// the active gauge, so every exit path (including streamed responses that
/// finish long after the handler returned) is covered.
pub struct RequestGuard {
    metrics: Arc<ProcessingMetrics>,
    start: Instant,
}

impl RequestGuard {
    pub fn begin(metrics: Arc<ProcessingMetrics>) -> Self {
        metrics.increment_active_requests();
        Self {
            metrics,
            start: Instant::now(),
        }
    }

    pub fn fail(&self) {
        self.metrics.increment_failed_requests();
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.metrics.decrement_active_requests();
        self.metrics
            .record_request_completion(self.start.elapsed().as_millis() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_error_taxonomy_decides_the_status() {
        let invalid = AppError::from(OpError::invalid("bad file name"));
        assert_eq!(invalid.status(), Status::BadRequest);

        let unsupported = AppError::from(OpError::unsupported("no OCR for txt"));
        assert_eq!(unsupported.status(), Status::InternalServerError);

        let io = AppError::from(OpError::io(
            "write failed".to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        ));
        assert_eq!(io.status(), Status::InternalServerError);

        let internal: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(internal.status(), Status::InternalServerError);
    }

    #[test]
    fn request_guard_records_on_every_path() {
        let metrics = Arc::new(ProcessingMetrics::new());
        {
            let guard = RequestGuard::begin(Arc::clone(&metrics));
            assert_eq!(metrics.active_requests(), 1);
            guard.fail();
        }
        assert_eq!(metrics.active_requests(), 0);
        assert_eq!(metrics.completed_requests(), 1);
        assert_eq!(metrics.failed_requests(), 1);
    }
}
