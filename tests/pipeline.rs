//! Orchestrator tests with a scripted recognizer.
//!
//! Every test builds a real image on disk and drives
//! [`ExtractionPipeline::extract_document_details`] end to end; only the
//! network call is replaced. The mock counts how often it is invoked so
//! tests can assert that early stages short-circuit the service.

use async_trait::async_trait;
use idcard_ocr::{
    ConditionedImage, ExtractionConfig, ExtractionPipeline, ExtractionProgressCallback,
    ExtractionResult, FailureKind, Gender, IdOcrError, RecognitionOutcome, Stage,
    SubmissionRecord, TextRecognizer,
};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;

const CARD_TEXT: &str = "PAKISTAN National Identity Card\n\
    Name: Sarah Khan\n\
    Father's Name: Imran Khan\n\
    Identity Number 42201-8345146-7\n\
    Date of Birth 14.03.1990\n\
    Date of Expiry 14.03.2030\n\
    Gender: Female";

// ── Test helpers ─────────────────────────────────────────────────────────────

enum Script {
    Text(String),
    Outcome(RecognitionOutcome),
    Fail(fn() -> IdOcrError),
    Hang(Duration),
}

struct MockRecognizer {
    script: Script,
    calls: AtomicUsize,
    last_image: Mutex<Option<(u32, u32, usize)>>,
}

impl MockRecognizer {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for MockRecognizer {
    async fn recognize(&self, image: &ConditionedImage) -> Result<RecognitionOutcome, IdOcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() =
            Some((image.width, image.height, image.estimated_byte_size()));

        match &self.script {
            Script::Text(t) => Ok(RecognitionOutcome {
                parsed_text: t.clone(),
                exit_code: 1,
                parse_exit_code: Some(1),
                ..Default::default()
            }),
            Script::Outcome(o) => Ok(o.clone()),
            Script::Fail(make) => Err(make()),
            Script::Hang(d) => {
                tokio::time::sleep(*d).await;
                Ok(RecognitionOutcome::default())
            }
        }
    }
}

fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(w, h, |x, y| {
        let v = ((x / 8 + y / 8) % 2 * 180 + 40) as u8;
        Rgb([v, v, v])
    })
    .save(&path)
    .unwrap();
    path
}

fn pipeline(mock: &Arc<MockRecognizer>, config: ExtractionConfig) -> ExtractionPipeline {
    ExtractionPipeline::with_recognizer(config, mock.clone() as Arc<dyn TextRecognizer>).unwrap()
}

fn input(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

// ── Size gate ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn small_image_never_reaches_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let small = write_png(dir.path(), "thumb.png", 640, 480);
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&small))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::InputTooSmall));
    assert!(result.reason().unwrap().contains("resolution too low"));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn floor_dimensions_pass_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let exact = write_png(dir.path(), "exact.png", 800, 500);
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&exact))
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn missing_file_is_unreadable_image() {
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));
    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details("/no/such/card.jpg")
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::UnreadableImage));
    assert_eq!(mock.calls(), 0);
}

// ── Recognition outcomes ─────────────────────────────────────────────────────

#[tokio::test]
async fn service_error_skips_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let mock = MockRecognizer::new(Script::Outcome(RecognitionOutcome {
        service_errored: true,
        error_message: Some("bad format".into()),
        exit_code: 3,
        ..Default::default()
    }));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&card))
        .await;

    match result {
        ExtractionResult::Failure {
            kind,
            reason,
            raw_text,
            partial_details,
        } => {
            assert_eq!(kind, FailureKind::ServiceProcessingError);
            assert!(reason.contains("bad format"), "got: {reason}");
            assert!(raw_text.is_none());
            assert!(partial_details.is_none());
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn parse_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let mock = MockRecognizer::new(Script::Outcome(RecognitionOutcome {
        exit_code: 1,
        parse_exit_code: Some(-10),
        ..Default::default()
    }));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&card))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::ParseFailure));
    assert_eq!(result.reason(), Some("Failed to parse the image"));
}

#[tokio::test]
async fn transport_error_is_retriable() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let mock = MockRecognizer::new(Script::Fail(|| IdOcrError::Transport {
        message: "connection reset".into(),
    }));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&card))
        .await;

    let kind = result.failure_kind().unwrap();
    assert_eq!(kind, FailureKind::TransportError);
    assert!(kind.is_retriable_immediately());
    assert_eq!(mock.calls(), 1, "no internal retry");
}

#[tokio::test]
async fn slow_service_times_out_as_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let mock = MockRecognizer::new(Script::Hang(Duration::from_secs(10)));
    let config = ExtractionConfig::builder()
        .api_timeout_secs(1)
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let result = pipeline(&mock, config)
        .extract_document_details(input(&card))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::TransportError));
    assert!(started.elapsed() < Duration::from_secs(8));
}

// ── Extraction and validation ────────────────────────────────────────────────

#[tokio::test]
async fn complete_card_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 2400, 1500);
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&card))
        .await;

    let details = result.details().cloned().expect("details on success");
    assert!(result.is_success());
    assert_eq!(details.identity_number.as_deref(), Some("42201-8345146-7"));
    assert_eq!(details.name.as_deref(), Some("Sarah Khan"));
    assert_eq!(details.father_name.as_deref(), Some("Imran Khan"));
    assert_eq!(details.date_of_birth.as_deref(), Some("14.03.1990"));
    assert_eq!(details.date_of_expiry.as_deref(), Some("14.03.2030"));
    assert_eq!(details.gender, Some(Gender::Female));
    assert_eq!(result.raw_text(), Some(CARD_TEXT));

    // The upload was downscaled to the conditioner's starting width.
    let (w, _, bytes) = mock.last_image.lock().unwrap().unwrap();
    assert_eq!(w, 1800);
    assert!(bytes <= 1024 * 1024);

    let record = assert_ok!(SubmissionRecord::try_from(&details));
    assert_eq!(record.date_of_birth, "1990-03-14");
}

#[tokio::test]
async fn missing_father_is_a_validation_failure_with_partial_details() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let text = "Name: Sarah Khan Identity Number 42201-8345146-7 \
                Date of Birth 14.03.1990 Date of Expiry 14.03.2030";
    let mock = MockRecognizer::new(Script::Text(text.into()));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&card))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::ValidationFailure));
    assert_eq!(
        result.reason(),
        Some("Could not extract all required CNIC details")
    );
    assert_eq!(result.raw_text(), Some(text));
    let partial = result.details().expect("partial details");
    assert_eq!(partial.father_name, None);
    assert_eq!(partial.name.as_deref(), Some("Sarah Khan"));
}

#[tokio::test]
async fn blank_name_is_not_filled_from_the_father_label() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let text = "Name:\nFather's Name: Imran Khan\nIdentity Number 42201-8345146-7\n\
                Date of Birth 14.03.1990\nDate of Expiry 14.03.2030";
    let mock = MockRecognizer::new(Script::Text(text.into()));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_document_details(input(&card))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::ValidationFailure));
    let partial = result.details().expect("partial details");
    assert_eq!(partial.name, None);
    assert_eq!(partial.father_name.as_deref(), Some("Imran Khan"));
}

// ── Configuration ────────────────────────────────────────────────────────────

#[test]
fn hand_built_config_with_zero_step_is_rejected() {
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));
    let mut config = ExtractionConfig::default();
    config.conditioning.quality_step = 0;

    let err = ExtractionPipeline::with_recognizer(config, mock.clone() as Arc<dyn TextRecognizer>)
        .unwrap_err();

    assert!(matches!(err, IdOcrError::InvalidConfig(_)), "{err}");
    assert_eq!(mock.calls(), 0);
}

// ── Progress and batch ───────────────────────────────────────────────────────

#[derive(Default)]
struct StageLog {
    stages: Mutex<Vec<Stage>>,
    completed: AtomicUsize,
}

impl ExtractionProgressCallback for StageLog {
    fn on_stage(&self, _input: &str, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_extraction_complete(&self, _input: &str, _result: &ExtractionResult) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn stages_are_reported_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));
    let log = Arc::new(StageLog::default());
    let config = ExtractionConfig::builder()
        .progress_callback(log.clone() as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();

    let result = pipeline(&mock, config)
        .extract_document_details(input(&card))
        .await;

    assert!(result.is_success());
    assert_eq!(
        *log.stages.lock().unwrap(),
        vec![
            Stage::Idle,
            Stage::SizeChecked,
            Stage::Conditioned,
            Stage::Recognized,
            Stage::Extracted,
            Stage::Validated
        ]
    );
    assert_eq!(log.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn gate_failure_reports_only_idle() {
    let dir = tempfile::tempdir().unwrap();
    let thumb = write_png(dir.path(), "thumb.png", 300, 200);
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));
    let log = Arc::new(StageLog::default());
    let config = ExtractionConfig::builder()
        .progress_callback(log.clone() as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();

    let result = pipeline(&mock, config)
        .extract_document_details(input(&thumb))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::InputTooSmall));
    assert_eq!(*log.stages.lock().unwrap(), vec![Stage::Idle]);
    assert_eq!(log.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn extract_many_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let front = write_png(dir.path(), "front.png", 1000, 640);
    let thumb = write_png(dir.path(), "thumb.png", 300, 200);
    let back = write_png(dir.path(), "back.png", 1200, 760);
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));

    let inputs = vec![input(&front), input(&thumb), input(&back)];
    let results = pipeline(&mock, ExtractionConfig::default())
        .extract_many(&inputs, 3)
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert_eq!(results[1].failure_kind(), Some(FailureKind::InputTooSmall));
    assert!(results[2].is_success());
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn bytes_input_runs_the_same_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_png(dir.path(), "card.png", 1000, 640);
    let bytes = std::fs::read(&card).unwrap();
    let mock = MockRecognizer::new(Script::Text(CARD_TEXT.into()));

    let result = pipeline(&mock, ExtractionConfig::default())
        .extract_from_bytes(&bytes)
        .await
        .unwrap();

    assert!(result.is_success());
}
