use anyhow::{Context, Result};
use serde_json::Value;

use crate::core::types::*;

/// Reads one entity out of a server response. Any missing field is an error.
pub trait FromResponse: Sized {
    fn from_response(response: &Value) -> Result<Self>;
}

/// Walks `path` through nested objects.
pub fn field<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value> {
    let mut current = value;
    for (depth, key) in path.iter().enumerate() {
        current = current
            .get(*key)
            .with_context(|| format!("Missing '{}' field", path[..=depth].join(".")))?;
    }
    Ok(current)
}

/// The server returns some single-entry collections as arrays.
pub fn first_or_self<'a>(value: &'a Value, name: &str) -> Result<&'a Value> {
    match value {
        Value::Array(items) => items.first().with_context(|| format!("'{}' is empty", name)),
        other => Ok(other),
    }
}

fn str_field(value: &Value, path: &[&str]) -> Result<String> {
    Ok(field(value, path)?
        .as_str()
        .with_context(|| format!("'{}' is not a string", path.join(".")))?
        .to_string())
}

impl FromResponse for ImportResult {
    fn from_response(response: &Value) -> Result<Self> {
        let frames = field(response, &["destination_frames"])?
            .as_array()
            .context("'destination_frames' field is not an array")?;
        let destination_frames = frames
            .iter()
            .map(|frame| {
                frame
                    .as_str()
                    .map(str::to_string)
                    .context("'destination_frames' entry is not a string")
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ImportResult { destination_frames })
    }
}

impl FromResponse for ParseSetup {
    fn from_response(response: &Value) -> Result<Self> {
        response.as_object().context("ParseSetup response is not an object")?;
        Ok(ParseSetup(response.clone()))
    }
}

impl FromResponse for JobHandle {
    fn from_response(response: &Value) -> Result<Self> {
        // SplitFrame answers with the job itself rather than wrapping it.
        let url = match response.get("job") {
            Some(job) => str_field(job, &["key", "URL"]).context("Missing 'job.key.URL' field")?,
            None => str_field(response, &["key", "URL"]).context("Missing 'job.key.URL' field")?,
        };
        Ok(JobHandle(url))
    }
}

impl FromResponse for JobReport {
    fn from_response(response: &Value) -> Result<Self> {
        let job = first_or_self(field(response, &["jobs"])?, "jobs")?;
        let status = str_field(job, &["status"]).context("Missing 'jobs[0].status' field")?;
        let exception = job
            .get("exception")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(JobReport { status: JobStatus::from(status.as_str()), exception })
    }
}

impl FromResponse for Confidence {
    fn from_response(response: &Value) -> Result<Self> {
        let metrics = first_or_self(field(response, &["model_metrics"])?, "model_metrics")?;
        let mse = field(metrics, &["MSE"]).context("Missing 'model_metrics.MSE' field")?;
        let mse = match mse {
            Value::String(text) => parse_non_finite(text),
            other => other.as_f64(),
        }
        .with_context(|| format!("'model_metrics.MSE' is not a number: {}", mse))?;
        Ok(Confidence(mse))
    }
}

impl FromResponse for ModelCategory {
    fn from_response(response: &Value) -> Result<Self> {
        let metrics = first_or_self(field(response, &["model_metrics"])?, "model_metrics")?;
        let category = str_field(metrics, &["model_category"])
            .context("Missing 'model_metrics.model_category' field")?;
        Ok(ModelCategory(category))
    }
}

impl FromResponse for Vec<PredictionColumn> {
    fn from_response(response: &Value) -> Result<Self> {
        let frame = first_or_self(field(response, &["frames"])?, "frames")?;
        let columns = field(frame, &["columns"])
            .context("Missing 'frames.columns' field")?
            .as_array()
            .context("'frames.columns' is not an array")?;
        columns
            .iter()
            .map(|column| -> Result<PredictionColumn> {
                Ok(PredictionColumn {
                    label: str_field(column, &["label"])?,
                    data: field(column, &["data"])?
                        .as_array()
                        .context("'data' is not an array")?
                        .clone(),
                })
            })
            .collect()
    }
}
