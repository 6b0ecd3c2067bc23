use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::core::types::PredictionResult;

pub fn output_json<W: Write>(writer: &mut W, result: &PredictionResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)
        .context("Failed to serialize prediction result")?;
    writeln!(writer, "{}", json)
        .context("Failed to write prediction result")?;
    writer.flush().context("Failed to flush prediction result")?;
    Ok(())
}

pub fn write_result_file(path: &Path, result: &PredictionResult) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {:?}", path))?;
    let mut writer = BufWriter::new(file);
    output_json(&mut writer, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PredictionColumn;
    use serde_json::{json, Value};

    #[test]
    fn writes_camel_case_json() {
        let result = PredictionResult {
            prediction: vec![PredictionColumn { label: "predict".to_string(), data: vec![json!("yes")] }],
            model_type: "Binomial".to_string(),
            model_confidence: 0.1,
        };
        let mut buffer = Vec::new();
        output_json(&mut buffer, &result).unwrap();
        let written: Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(
            written,
            json!({
                "prediction": [{"label": "predict", "data": ["yes"]}],
                "modelType": "Binomial",
                "modelConfidence": 0.1
            })
        );
    }
}
