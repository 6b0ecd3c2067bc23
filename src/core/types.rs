use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Frames created by an `ImportFiles` call, in server order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub destination_frames: Vec<String>,
}

/// Schema guess returned by `ParseSetup`. Passed through to `Parse` untouched
/// apart from re-encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseSetup(pub Value);

/// Path of an asynchronous server job, e.g. `/3/Jobs/$03017f00...`.
/// Only meaningful until the job reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a server-resident frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(pub &'static str);

impl FrameHandle {
    pub const DATA_SET: FrameHandle = FrameHandle("dataSet");
    pub const TRAIN: FrameHandle = FrameHandle("train");
    pub const VALIDATE: FrameHandle = FrameHandle("validate");
    pub const PREDICT_ME: FrameHandle = FrameHandle("predictme");
    pub const PREDICTIONS: FrameHandle = FrameHandle("predictions");

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Created,
    Running,
    Done,
    Failed,
    Cancelled,
    Other(String),
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => JobStatus::Created,
            "RUNNING" => JobStatus::Running,
            "DONE" => JobStatus::Done,
            "FAILED" => JobStatus::Failed,
            "CANCELLED" => JobStatus::Cancelled,
            _ => JobStatus::Other(s.to_string()),
        }
    }
}

/// One status observation of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub status: JobStatus,
    pub exception: Option<String>,
}

/// The server writes non-finite metrics as the strings `NaN`, `Infinity`
/// and `-Infinity`.
pub fn parse_non_finite(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

/// Validation score read back after training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confidence(pub f64);

/// Category of the trained model, e.g. `Regression` or `Binomial`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCategory(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionColumn {
    pub label: String,
    pub data: Vec<Value>,
}

/// Final output of a pipeline run.
///
/// `model_confidence` is the validation MSE, so lower is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub prediction: Vec<PredictionColumn>,
    pub model_type: String,
    #[serde(with = "metric")]
    pub model_confidence: f64,
}

/// Finite values as JSON numbers, the rest in the server's string form.
mod metric {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => super::parse_non_finite(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid metric value '{}'", text))),
        }
    }
}
