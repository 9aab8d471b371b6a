// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Uploading assembled payloads.
//!
//! Uploads happen on a dedicated thread. [`spawn_upload`] returns an [`UploadHandle`] that the
//! caller may [`wait`](UploadHandle::wait) on, or drop to let the upload finish in the background
//! for as long as the process lives.

use crate::errors::{DisplayErrorChain, TransportError};
use debug_ignore::DebugIgnore;
use serde::Deserialize;
use std::{sync::Arc, thread::JoinHandle, time::Duration};
use tesults_payload::Payload;
use tracing::{info, warn};

/// The default results endpoint.
pub static DEFAULT_API_URL: &str = "https://www.tesults.com/results";

/// Sends a payload to the results service.
pub trait Transport: Send + Sync {
    /// Uploads the payload, returning the service's response.
    fn upload(&self, payload: &Payload) -> Result<UploadResponse, TransportError>;
}

/// The outcome of an upload, as reported by the service.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UploadResponse {
    /// Whether the results were accepted.
    pub success: bool,

    /// A human-readable message.
    pub message: String,

    /// Warnings produced while processing the results.
    pub warnings: Vec<String>,

    /// Errors produced while processing the results.
    pub errors: Vec<String>,
}

impl UploadResponse {
    /// Parses a service response body.
    pub fn from_body(status: u16, body: ResponseBody) -> Self {
        match body {
            ResponseBody {
                data: Some(data), ..
            } => Self {
                success: (200..300).contains(&data.code.unwrap_or(status)),
                message: data.message,
                warnings: data.warnings,
                errors: data.errors,
            },
            ResponseBody {
                error: Some(error), ..
            } => Self {
                success: false,
                errors: vec![error.message.clone()],
                message: error.message,
                warnings: Vec::new(),
            },
            ResponseBody {
                data: None,
                error: None,
            } => Self {
                success: false,
                message: format!("empty response (HTTP {status})"),
                warnings: Vec::new(),
                errors: Vec::new(),
            },
        }
    }
}

/// The JSON body returned by the results service.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    data: Option<ResponseData>,
    #[serde(default)]
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(default)]
    message: String,
}

/// A [`Transport`] that posts payloads over HTTPS.
#[derive(Debug)]
pub struct UreqTransport {
    api_url: String,
    agent: DebugIgnore<ureq::Agent>,
}

impl UreqTransport {
    /// The overall timeout for a single upload.
    pub const TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates a new transport posting to `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        let agent = ureq::config::Config::builder()
            .timeout_global(Some(Self::TIMEOUT))
            // Error statuses still carry a JSON body describing the problem.
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            api_url: api_url.into(),
            agent: DebugIgnore(agent),
        }
    }

    /// Returns the URL payloads are posted to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl Transport for UreqTransport {
    fn upload(&self, payload: &Payload) -> Result<UploadResponse, TransportError> {
        let body = payload.to_string()?;
        let mut response = self
            .agent
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|error| TransportError::Request {
                url: self.api_url.clone(),
                error: Box::new(error),
            })?;

        let status = response.status().as_u16();
        let body: ResponseBody =
            response
                .body_mut()
                .read_json()
                .map_err(|error| TransportError::InvalidResponse {
                    url: self.api_url.clone(),
                    status,
                    error: Box::new(error),
                })?;
        Ok(UploadResponse::from_body(status, body))
    }
}

/// A handle to an upload running in the background.
///
/// Dropping the handle detaches the upload.
#[derive(Debug)]
#[must_use = "dropping the handle detaches the upload; call `wait` to block until it finishes"]
pub struct UploadHandle {
    handle: JoinHandle<Result<UploadResponse, TransportError>>,
}

impl UploadHandle {
    /// Blocks until the upload finishes, returning its outcome.
    pub fn wait(self) -> Result<UploadResponse, TransportError> {
        self.handle.join().unwrap_or(Err(TransportError::Panicked))
    }

    /// Returns true if the upload has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Uploads `payload` on a new thread, logging the outcome when it completes.
pub fn spawn_upload(transport: Arc<dyn Transport>, payload: Payload) -> UploadHandle {
    info!("results upload...");
    let handle = std::thread::spawn(move || {
        let result = transport.upload(&payload);
        log_outcome(&result);
        result
    });
    UploadHandle { handle }
}

fn log_outcome(result: &Result<UploadResponse, TransportError>) {
    match result {
        Ok(response) => {
            info!("Success: {}", response.success);
            info!("Message: {}", response.message);
            info!("Warnings: {}", response.warnings.len());
            info!("Errors: {}", response.errors.len());
        }
        Err(error) => {
            warn!(
                "failed to upload results\n{}",
                DisplayErrorChain::new(error)
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use std::sync::Mutex;

    /// A transport that records every payload it is given.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) uploads: Mutex<Vec<Payload>>,
        pub(crate) fail: bool,
    }

    impl RecordingTransport {
        pub(crate) fn failing() -> Self {
            Self {
                uploads: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub(crate) fn uploads(&self) -> Vec<Payload> {
            self.uploads.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn upload(&self, payload: &Payload) -> Result<UploadResponse, TransportError> {
            self.uploads.lock().unwrap().push(payload.clone());
            if self.fail {
                return Err(TransportError::Request {
                    url: DEFAULT_API_URL.to_owned(),
                    error: Box::new(ureq::Error::ConnectionFailed),
                });
            }
            Ok(UploadResponse {
                success: true,
                message: "Success".to_owned(),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_helpers::RecordingTransport, *};
    use pretty_assertions::assert_eq;
    use tesults_payload::PayloadMetadata;
    use test_case::test_case;

    fn parse(status: u16, body: &str) -> UploadResponse {
        UploadResponse::from_body(status, serde_json::from_str(body).unwrap())
    }

    #[test_case(
        200,
        r#"{"data": {"code": 200, "message": "Success"}}"#,
        UploadResponse { success: true, message: "Success".to_owned(), ..Default::default() };
        "success"
    )]
    #[test_case(
        200,
        r#"{"data": {"message": "Success", "warnings": ["w1", "w2"]}}"#,
        UploadResponse {
            success: true,
            message: "Success".to_owned(),
            warnings: vec!["w1".to_owned(), "w2".to_owned()],
            errors: vec![],
        };
        "success with warnings and no code"
    )]
    #[test_case(
        400,
        r#"{"error": {"code": 400, "message": "Invalid target"}}"#,
        UploadResponse {
            success: false,
            message: "Invalid target".to_owned(),
            warnings: vec![],
            errors: vec!["Invalid target".to_owned()],
        };
        "error"
    )]
    #[test_case(
        502,
        r#"{}"#,
        UploadResponse { success: false, message: "empty response (HTTP 502)".to_owned(), ..Default::default() };
        "empty body"
    )]
    fn response_parsing(status: u16, body: &str, expected: UploadResponse) {
        assert_eq!(parse(status, body), expected);
    }

    fn payload() -> Payload {
        Payload::new("T", PayloadMetadata::new("cargo-tesults", "0.1.0", "cargo-test"))
    }

    #[test]
    fn spawn_upload_wait() {
        let transport = Arc::new(RecordingTransport::default());
        let handle = spawn_upload(transport.clone(), payload());
        while !handle.is_finished() {
            std::thread::sleep(Duration::from_millis(10));
        }
        let response = handle.wait().expect("upload succeeds");
        assert!(response.success);
        assert_eq!(transport.uploads().len(), 1);
        assert_eq!(transport.uploads()[0].target, "T");
    }

    #[test]
    fn spawn_upload_failure_is_returned() {
        let transport = Arc::new(RecordingTransport::failing());
        let handle = spawn_upload(transport.clone(), payload());
        assert!(matches!(handle.wait(), Err(TransportError::Request { .. })));
        assert_eq!(transport.uploads().len(), 1);
    }
}
