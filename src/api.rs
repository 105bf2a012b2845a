//! Client for the vibration analysis REST API
//!
//! The backend turns raw accelerometer points into a vibration magnitude
//! signal, summary metrics and a dB spectrogram. The spectrogram is what the
//! static renderer draws.

use crate::buffer::{BufferError, SpectrogramFrame, SpectrogramMatrix};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Sampling rate the backend assumes when none is given
pub const DEFAULT_SAMPLING_RATE: f64 = 100.0;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("API returned an unusable spectrogram: {0}")]
    InvalidData(#[from] BufferError),
}

/// One accelerometer reading
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AcousticDataPoint {
    pub timestamp: String,
    #[serde(rename = "accX")]
    pub acc_x: f64,
    #[serde(rename = "accY")]
    pub acc_y: f64,
    #[serde(rename = "accZ")]
    pub acc_z: f64,
}

#[derive(Serialize, Debug)]
struct AnalyzeRequest<'a> {
    data: &'a [AcousticDataPoint],
    sampling_rate: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Normal,
    Warning,
    Anomaly,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Normal => "normal",
            AnalysisStatus::Warning => "warning",
            AnalysisStatus::Anomaly => "anomaly",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VibrationAnalysis {
    pub vibration_signal: Vec<f64>,
    pub timestamps: Vec<String>,
    pub rms: f64,
    pub peak: f64,
    /// Dominant frequency (Hz)
    pub frequency: f64,
    pub status: AnalysisStatus,
    /// dB magnitudes, rows = frequency bins
    pub spectrogram: Vec<Vec<f64>>,
    pub spectrogram_freqs: Vec<f64>,
    pub spectrogram_times: Vec<f64>,
}

impl VibrationAnalysis {
    /// Validated frame for the static renderer.
    ///
    /// Too-short inputs come back as `[[]]` with placeholder axes; that maps
    /// to an empty frame rather than an axis mismatch.
    pub fn spectrogram_frame(&self) -> Result<SpectrogramFrame, ApiError> {
        let matrix = SpectrogramMatrix::new(self.spectrogram.clone())?;
        if matrix.is_empty() {
            return Ok(SpectrogramFrame::default());
        }
        let frame = SpectrogramFrame::new(
            matrix,
            self.spectrogram_freqs.clone(),
            self.spectrogram_times.clone(),
        )?;
        Ok(frame)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

pub struct VibrationClient {
    base_url: String,
    client: reqwest::Client,
}

impl VibrationClient {
    /// Use a preconfigured reqwest client (timeouts, proxies)
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST the points for analysis
    pub async fn analyze(
        &self,
        points: &[AcousticDataPoint],
        sampling_rate: f64,
    ) -> Result<VibrationAnalysis, ApiError> {
        let url = format!("{}/api/vibration/analyze", self.base_url);
        debug!(points = points.len(), sampling_rate, %url, "Requesting vibration analysis");

        let response = self
            .client
            .post(&url)
            .json(&AnalyzeRequest {
                data: points,
                sampling_rate,
            })
            .send()
            .await?;

        let analysis: VibrationAnalysis = decode(response).await?;
        debug!(
            status = analysis.status.as_str(),
            rms = analysis.rms,
            peak = analysis.peak,
            rows = analysis.spectrogram.len(),
            "Vibration analysis received"
        );
        Ok(analysis)
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = format!("{}/api/vibration/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, body });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
