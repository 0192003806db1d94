//! Configuration types for identity-card extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The API key, size ceiling and
//! resolution floor live here rather than in process-wide constants so a
//! test can run the whole pipeline against a mock service with a 2 KiB
//! ceiling without touching the environment.

use crate::error::IdOcrError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default OCR.space endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// Default byte ceiling for the encoded image (1 MiB, the free-tier upload limit).
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

/// Configuration for an identity-card extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use idcard_ocr::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_key("K0000000000000")
///     .max_bytes(512 * 1024)
///     .api_timeout_secs(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.min_width, 800);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// OCR.space API key, sent in the `apikey` header.
    pub api_key: Option<String>,

    /// Recognition endpoint. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// OCR language code. Default: `eng`.
    pub language: String,

    /// OCR.space engine number. Default: 2.
    ///
    /// Engine 2 handles mixed fonts and low-contrast laminate noticeably
    /// better than engine 1 on identity cards.
    pub ocr_engine: u8,

    /// Ask the service to auto-rotate the image. Default: true.
    pub detect_orientation: bool,

    /// Ask the service to upscale internally before recognition. Default: true.
    pub scale: bool,

    /// Request word overlay coordinates. Default: true.
    pub overlay_required: bool,

    /// Enable table-mode line ordering. Default: false.
    pub is_table: bool,

    /// Ceiling for the estimated decoded size of the encoded image. Default: 1 MiB.
    pub max_bytes: usize,

    /// Minimum source width in pixels. Default: 800.
    pub min_width: u32,

    /// Minimum source height in pixels. Default: 500.
    pub min_height: u32,

    /// Width and JPEG-quality schedule for the conditioner.
    pub conditioning: ConditioningConfig,

    /// Bound on the recognition call in seconds. Default: 30.
    ///
    /// An unbounded network wait is the dominant way an attempt can hang;
    /// exceeding this maps to a transport failure.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Optional observer notified as the pipeline moves between stages.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: "eng".to_string(),
            ocr_engine: 2,
            detect_orientation: true,
            scale: true,
            overlay_required: true,
            is_table: false,
            max_bytes: DEFAULT_MAX_BYTES,
            min_width: 800,
            min_height: 500,
            conditioning: ConditioningConfig::default(),
            api_timeout_secs: 30,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("language", &self.language)
            .field("ocr_engine", &self.ocr_engine)
            .field("detect_orientation", &self.detect_orientation)
            .field("scale", &self.scale)
            .field("overlay_required", &self.overlay_required)
            .field("is_table", &self.is_table)
            .field("max_bytes", &self.max_bytes)
            .field("min_width", &self.min_width)
            .field("min_height", &self.min_height)
            .field("conditioning", &self.conditioning)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints [`ExtractionConfigBuilder::build`] enforces.
    ///
    /// The fields are public, so a config assembled by hand is re-checked
    /// wherever a pipeline is constructed from one.
    pub fn validate(&self) -> Result<(), IdOcrError> {
        if self.max_bytes == 0 {
            return Err(IdOcrError::InvalidConfig("max_bytes must be ≥ 1".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(IdOcrError::InvalidConfig("endpoint must not be empty".into()));
        }
        if self.api_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err(IdOcrError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        self.conditioning.validate()
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.config.language = code.into();
        self
    }

    pub fn ocr_engine(mut self, engine: u8) -> Self {
        self.config.ocr_engine = engine;
        self
    }

    pub fn detect_orientation(mut self, v: bool) -> Self {
        self.config.detect_orientation = v;
        self
    }

    pub fn scale(mut self, v: bool) -> Self {
        self.config.scale = v;
        self
    }

    pub fn overlay_required(mut self, v: bool) -> Self {
        self.config.overlay_required = v;
        self
    }

    pub fn is_table(mut self, v: bool) -> Self {
        self.config.is_table = v;
        self
    }

    pub fn max_bytes(mut self, n: usize) -> Self {
        self.config.max_bytes = n;
        self
    }

    pub fn min_width(mut self, px: u32) -> Self {
        self.config.min_width = px;
        self
    }

    pub fn min_height(mut self, px: u32) -> Self {
        self.config.min_height = px;
        self
    }

    pub fn conditioning(mut self, c: ConditioningConfig) -> Self {
        self.config.conditioning = c;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, IdOcrError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The width/quality schedule walked by the image conditioner.
///
/// Quality is a JPEG percentage; a compression factor of 0.7 is `70`.
/// Integer steps keep the schedule exact: the conditioner visits
/// `start_quality, start_quality - quality_step, …, floor_quality` at each
/// width from `start_width` down to `floor_width`. A step that would pass a
/// floor lands on the floor instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditioningConfig {
    /// First target width in pixels. Default: 1800.
    pub start_width: u32,
    /// Narrowest width the conditioner will try. Default: 800.
    pub floor_width: u32,
    /// Width reduction once quality bottoms out. Default: 200.
    pub width_step: u32,
    /// JPEG quality at each new width. Default: 70.
    pub start_quality: u8,
    /// Lowest JPEG quality tried. Default: 10.
    pub floor_quality: u8,
    /// Quality reduction per attempt. Default: 10.
    pub quality_step: u8,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            start_width: 1800,
            floor_width: 800,
            width_step: 200,
            start_quality: 70,
            floor_quality: 10,
            quality_step: 10,
        }
    }
}

impl ConditioningConfig {
    /// Number of distinct widths the schedule visits.
    ///
    /// An inverted range counts as a single width; a zero step is treated as 1.
    pub fn width_steps(&self) -> usize {
        let span = self.start_width.saturating_sub(self.floor_width);
        span.div_ceil(self.width_step.max(1)) as usize + 1
    }

    /// Number of distinct qualities tried at each width.
    pub fn quality_steps(&self) -> usize {
        let span = self.start_quality.saturating_sub(self.floor_quality);
        span.div_ceil(self.quality_step.max(1)) as usize + 1
    }

    /// Hard upper bound on encode attempts for one image.
    pub fn max_attempts(&self) -> usize {
        self.width_steps() * self.quality_steps()
    }

    /// Reject schedules the conditioner cannot walk.
    pub fn validate(&self) -> Result<(), IdOcrError> {
        if self.width_step == 0 || self.quality_step == 0 {
            return Err(IdOcrError::InvalidConfig(
                "conditioning steps must be ≥ 1".into(),
            ));
        }
        if self.floor_width == 0 || self.floor_width > self.start_width {
            return Err(IdOcrError::InvalidConfig(format!(
                "floor width must be 1–{}, got {}",
                self.start_width, self.floor_width
            )));
        }
        if self.start_quality > 100
            || self.floor_quality == 0
            || self.floor_quality > self.start_quality
        {
            return Err(IdOcrError::InvalidConfig(format!(
                "JPEG quality must satisfy 1 ≤ floor ({}) ≤ start ({}) ≤ 100",
                self.floor_quality, self.start_quality
            )));
        }
        Ok(())
    }
}
