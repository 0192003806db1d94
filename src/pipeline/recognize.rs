//! Text recognition: send the conditioned image to OCR.space and interpret the reply.
//!
//! The module is split in two so each half can be tested alone:
//!
//! 1. [`TextRecognizer::recognize`] performs the network call and returns the
//!    service's raw report as a [`RecognitionOutcome`]. It only fails when the
//!    call itself cannot complete (transport failure, non-2xx status).
//! 2. [`accept_outcome`] applies the service contract to that report and
//!    either yields the recognised text or the failure the caller should see.
//!
//! Transport failures are reported, never retried here; whether to retry is
//! the caller's decision.

use crate::config::ExtractionConfig;
use crate::error::{FailureKind, IdOcrError};
use crate::pipeline::encode::ConditionedImage;
use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// `OCRExitCode`: every page parsed.
pub const OCR_EXIT_SUCCESS: i32 = 1;
/// `OCRExitCode`: some pages parsed, with warnings.
pub const OCR_EXIT_PARTIAL: i32 = 2;
/// `FileParseExitCode`: this file parsed.
pub const FILE_PARSE_SUCCESS: i32 = 1;

/// The remote service's report for one image, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionOutcome {
    /// `ParsedText` of the first parsed result, empty when there is none.
    pub parsed_text: String,
    /// `IsErroredOnProcessing`.
    pub service_errored: bool,
    /// `OCRExitCode`.
    pub exit_code: i32,
    /// `FileParseExitCode` of the first parsed result, if any result was returned.
    pub parse_exit_code: Option<i32>,
    /// First entry of the top-level `ErrorMessage`, if any.
    pub error_message: Option<String>,
    /// `ErrorMessage` of the first parsed result, if non-empty.
    pub parse_error_message: Option<String>,
    /// `ProcessingTimeInMilliseconds` as reported.
    pub processing_time_ms: Option<String>,
}

/// Something that can turn a conditioned image into a recognition report.
///
/// [`OcrSpaceClient`] is the production implementation; tests substitute
/// their own to count calls or script responses.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &ConditionedImage) -> Result<RecognitionOutcome, IdOcrError>;
}

/// Apply the service contract to a report.
///
/// Checks run in this order, and the first that fails decides the outcome:
/// processing error flag, top-level exit code, first parsed result.
pub fn accept_outcome(outcome: RecognitionOutcome) -> Result<String, (FailureKind, String)> {
    if outcome.service_errored {
        let message = outcome
            .error_message
            .unwrap_or_else(|| "OCR processing failed".to_string());
        return Err((FailureKind::ServiceProcessingError, message));
    }

    if outcome.exit_code != OCR_EXIT_SUCCESS && outcome.exit_code != OCR_EXIT_PARTIAL {
        return Err((
            FailureKind::ServiceProcessingError,
            "OCR failed to process the image properly".to_string(),
        ));
    }

    if outcome.parse_exit_code != Some(FILE_PARSE_SUCCESS) {
        let message = outcome
            .parse_error_message
            .unwrap_or_else(|| "Failed to parse the image".to_string());
        return Err((FailureKind::ParseFailure, message));
    }

    Ok(outcome.parsed_text)
}

// ── OCR.space wire format ────────────────────────────────────────────────

/// `ErrorMessage` arrives as a string, a list of strings, or null.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServiceMessage {
    One(String),
    Many(Vec<String>),
}

impl ServiceMessage {
    fn first(self) -> Option<String> {
        match self {
            ServiceMessage::One(s) => Some(s),
            ServiceMessage::Many(v) => v.into_iter().next(),
        }
        .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
    #[serde(default)]
    error_message: Option<ServiceMessage>,
    #[serde(default)]
    file_parse_exit_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(rename = "OCRExitCode", default)]
    ocr_exit_code: i32,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ServiceMessage>,
    #[serde(default)]
    processing_time_in_milliseconds: Option<serde_json::Value>,
}

impl From<OcrSpaceResponse> for RecognitionOutcome {
    fn from(r: OcrSpaceResponse) -> Self {
        let first = r.parsed_results.and_then(|v| v.into_iter().next());
        let (parsed_text, parse_exit_code, parse_error_message) = match first {
            Some(p) => (
                p.parsed_text.unwrap_or_default(),
                p.file_parse_exit_code,
                p.error_message.and_then(ServiceMessage::first),
            ),
            None => (String::new(), None, None),
        };
        RecognitionOutcome {
            parsed_text,
            service_errored: r.is_errored_on_processing,
            exit_code: r.ocr_exit_code,
            parse_exit_code,
            error_message: r.error_message.and_then(ServiceMessage::first),
            parse_error_message,
            processing_time_ms: r.processing_time_in_milliseconds.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
        }
    }
}

// ── HTTP client ──────────────────────────────────────────────────────────

/// OCR.space `parse/image` client.
#[derive(Debug, Clone)]
pub struct OcrSpaceClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
    ocr_engine: u8,
    detect_orientation: bool,
    scale: bool,
    overlay_required: bool,
    is_table: bool,
    timeout_secs: u64,
}

impl OcrSpaceClient {
    /// Build a client from the extraction config. Requires a non-empty API key.
    pub fn new(config: &ExtractionConfig) -> Result<Self, IdOcrError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(IdOcrError::MissingApiKey)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| IdOcrError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            language: config.language.clone(),
            ocr_engine: config.ocr_engine,
            detect_orientation: config.detect_orientation,
            scale: config.scale,
            overlay_required: config.overlay_required,
            is_table: config.is_table,
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn build_form(&self, image: &ConditionedImage) -> Form {
        Form::new()
            .text("base64Image", image.data_url())
            .text("language", self.language.clone())
            .text("isOverlayRequired", self.overlay_required.to_string())
            .text("OCREngine", self.ocr_engine.to_string())
            .text("scale", self.scale.to_string())
            .text("detectOrientation", self.detect_orientation.to_string())
            .text("isTable", self.is_table.to_string())
    }
}

#[async_trait]
impl TextRecognizer for OcrSpaceClient {
    async fn recognize(&self, image: &ConditionedImage) -> Result<RecognitionOutcome, IdOcrError> {
        let start = Instant::now();
        debug!(
            "Sending {}KB image to {}",
            image.estimated_byte_size() / 1024,
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .multipart(self.build_form(image))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IdOcrError::RecognitionTimeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    IdOcrError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("OCR API returned HTTP {}", status);
            return Err(IdOcrError::Transport {
                message: format!("OCR API request failed (HTTP {status})"),
            });
        }

        let body: OcrSpaceResponse = response
            .json()
            .await
            .map_err(|e| IdOcrError::MalformedResponse {
                detail: e.to_string(),
            })?;

        let outcome = RecognitionOutcome::from(body);
        debug!(
            "OCR exit code {}, parse exit code {:?}, errored={}, {} chars in {:?}",
            outcome.exit_code,
            outcome.parse_exit_code,
            outcome.service_errored,
            outcome.parsed_text.len(),
            start.elapsed()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image() -> ConditionedImage {
        ConditionedImage {
            base64: "/9j/AAAA".into(),
            width: 1800,
            height: 1125,
            quality: 70,
            attempts: 1,
        }
    }

    fn parse(v: serde_json::Value) -> RecognitionOutcome {
        RecognitionOutcome::from(serde_json::from_value::<OcrSpaceResponse>(v).unwrap())
    }

    async fn client_for(server: &MockServer) -> OcrSpaceClient {
        let config = ExtractionConfig::builder()
            .api_key("test-key")
            .endpoint(format!("{}/parse/image", server.uri()))
            .api_timeout_secs(5)
            .build()
            .unwrap();
        OcrSpaceClient::new(&config).unwrap()
    }

    #[test]
    fn processing_error_uses_first_message() {
        let outcome = parse(json!({
            "ParsedResults": null,
            "OCRExitCode": 3,
            "IsErroredOnProcessing": true,
            "ErrorMessage": ["bad format", "second"],
            "ErrorDetails": null
        }));
        assert_eq!(
            accept_outcome(outcome),
            Err((FailureKind::ServiceProcessingError, "bad format".to_string()))
        );
    }

    #[test]
    fn processing_error_with_string_or_missing_message() {
        let outcome = parse(json!({
            "OCRExitCode": 4,
            "IsErroredOnProcessing": true,
            "ErrorMessage": "E101: timed out"
        }));
        assert_eq!(
            accept_outcome(outcome).unwrap_err().1,
            "E101: timed out"
        );

        let outcome = parse(json!({
            "OCRExitCode": 4,
            "IsErroredOnProcessing": true,
            "ErrorMessage": []
        }));
        assert_eq!(accept_outcome(outcome).unwrap_err().1, "OCR processing failed");
    }

    #[test]
    fn unexpected_exit_code_is_service_error() {
        let outcome = parse(json!({
            "ParsedResults": [{"ParsedText": "x", "ErrorMessage": "", "FileParseExitCode": 1}],
            "OCRExitCode": 3,
            "IsErroredOnProcessing": false
        }));
        assert_eq!(
            accept_outcome(outcome),
            Err((
                FailureKind::ServiceProcessingError,
                "OCR failed to process the image properly".to_string()
            ))
        );
    }

    #[test]
    fn failed_file_parse_is_parse_failure() {
        let outcome = parse(json!({
            "ParsedResults": [{"ParsedText": "", "ErrorMessage": "Unable to recognize", "FileParseExitCode": -10}],
            "OCRExitCode": 2,
            "IsErroredOnProcessing": false
        }));
        assert_eq!(
            accept_outcome(outcome),
            Err((FailureKind::ParseFailure, "Unable to recognize".to_string()))
        );

        let outcome = parse(json!({
            "ParsedResults": [],
            "OCRExitCode": 1,
            "IsErroredOnProcessing": false
        }));
        assert_eq!(
            accept_outcome(outcome),
            Err((FailureKind::ParseFailure, "Failed to parse the image".to_string()))
        );
    }

    #[test]
    fn partial_success_is_accepted() {
        let outcome = parse(json!({
            "ParsedResults": [{"ParsedText": "Name: Sarah Khan", "ErrorMessage": "", "FileParseExitCode": 1}],
            "OCRExitCode": 2,
            "IsErroredOnProcessing": false,
            "ProcessingTimeInMilliseconds": "412"
        }));
        assert_eq!(outcome.processing_time_ms.as_deref(), Some("412"));
        assert_eq!(accept_outcome(outcome).unwrap(), "Name: Sarah Khan");
    }

    #[test]
    fn missing_api_key_rejected() {
        let config = ExtractionConfig::builder().api_key("   ").build().unwrap();
        assert!(matches!(
            OcrSpaceClient::new(&config),
            Err(IdOcrError::MissingApiKey)
        ));
        assert!(matches!(
            OcrSpaceClient::new(&ExtractionConfig::default()),
            Err(IdOcrError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn posts_form_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse/image"))
            .and(header("apikey", "test-key"))
            .and(body_string_contains("data:image/jpeg;base64,/9j/AAAA"))
            .and(body_string_contains("OCREngine"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ParsedResults": [{
                    "ParsedText": "Identity Number 42201-8345146-7",
                    "ErrorMessage": "",
                    "FileParseExitCode": 1
                }],
                "OCRExitCode": 1,
                "IsErroredOnProcessing": false,
                "ErrorMessage": null,
                "ProcessingTimeInMilliseconds": "250"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let outcome = client.recognize(&image()).await.unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.parse_exit_code, Some(1));
        assert_eq!(
            accept_outcome(outcome).unwrap(),
            "Identity Number 42201-8345146-7"
        );
    }

    #[tokio::test]
    async fn http_error_status_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse/image"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.recognize(&image()).await.unwrap_err();
        assert!(matches!(err, IdOcrError::Transport { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse/image"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>quota</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.recognize(&image()).await.unwrap_err();
        assert!(matches!(err, IdOcrError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport() {
        let config = ExtractionConfig::builder()
            .api_key("test-key")
            .endpoint("http://127.0.0.1:9/parse/image")
            .api_timeout_secs(2)
            .build()
            .unwrap();
        let client = OcrSpaceClient::new(&config).unwrap();
        let err = client.recognize(&image()).await.unwrap_err();
        assert!(matches!(
            err,
            IdOcrError::Transport { .. } | IdOcrError::RecognitionTimeout { .. }
        ));
    }
}
