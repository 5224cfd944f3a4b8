// Error mapping for Azure REST calls

use doctrans_core::error::AppError;
use reqwest::Response;

/// Longest response body echoed into an error message
const MAX_ERROR_BODY: usize = 512;

/// Which AppError variant a failing call maps to
#[derive(Debug, Clone, Copy)]
pub(crate) enum Service {
    Blob,
    Queue,
    Drive,
}

impl Service {
    pub(crate) fn error(self, message: String) -> AppError {
        match self {
            Service::Blob => AppError::Storage(message),
            Service::Queue => AppError::Queue(message),
            Service::Drive => AppError::Drive(message),
        }
    }
}

pub(crate) fn transport_error(service: Service, context: &str, err: reqwest::Error) -> AppError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "request"
    };
    service.error(format!("{} failed ({}): {}", context, kind, err))
}

/// Turn a non-success response into an error, keeping the service error code
pub(crate) async fn status_error(service: Service, context: &str, response: Response) -> AppError {
    let status = response.status();
    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(|c| format!(" {}", c))
        .unwrap_or_default();
    let body = response.text().await.unwrap_or_default();
    service.error(format!(
        "{} failed ({}{}): {}",
        context,
        status.as_u16(),
        code,
        clip(&body)
    ))
}

pub(crate) fn clip(body: &str) -> String {
    doctrans_core::domain::job::truncate_chars(body.trim(), MAX_ERROR_BODY)
}
