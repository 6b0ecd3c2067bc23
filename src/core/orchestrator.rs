use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::info;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::adapters::h2o::H2OServer;
use crate::adapters::transport::Transport;
use crate::core::algorithm::Algorithm;
use crate::core::encoder::{FieldValue, FormRecord};
use crate::core::poller::{JobPoller, PollOptions};
use crate::core::types::*;
use crate::utils::response::{field, FromResponse};

pub const DEFAULT_SPLIT_RATIOS: [f64; 2] = [0.85, 0.15];

/// ParseSetup fields forwarded to Parse, in request order.
const PARSE_SETUP_FIELDS: [&str; 9] = [
    "source_frames",
    "parse_type",
    "separator",
    "number_columns",
    "single_quotes",
    "column_names",
    "column_types",
    "check_header",
    "chunk_size",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ImportTrainingData,
    DetectSchema,
    ParseTrainingData,
    SplitData,
    TrainModel,
    ValidatePrediction,
    ImportPredictionData,
    DetectPredictionSchema,
    ParsePredictionData,
    PredictWithModel,
    FetchResults,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::ImportTrainingData => "Importing training data",
            Stage::DetectSchema => "Detecting training data schema",
            Stage::ParseTrainingData => "Parsing training data",
            Stage::SplitData => "Splitting training data",
            Stage::TrainModel => "Training model",
            Stage::ValidatePrediction => "Validating model",
            Stage::ImportPredictionData => "Importing prediction input",
            Stage::DetectPredictionSchema => "Detecting prediction input schema",
            Stage::ParsePredictionData => "Parsing prediction input",
            Stage::PredictWithModel => "Predicting",
            Stage::FetchResults => "Fetching predictions",
            Stage::Done => "Done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub training_path: String,
    pub prediction_input_path: String,
    /// Checked against the algorithm allow-list before any request is sent.
    pub algorithm: String,
    /// Passed to the server as-is.
    pub split_ratios: Vec<f64>,
    pub target_column: String,
}

impl PredictionRequest {
    pub fn new(
        training_path: impl Into<String>,
        prediction_input_path: impl Into<String>,
        algorithm: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            training_path: training_path.into(),
            prediction_input_path: prediction_input_path.into(),
            algorithm: algorithm.into(),
            split_ratios: DEFAULT_SPLIT_RATIOS.to_vec(),
            target_column: target_column.into(),
        }
    }

    pub fn with_split_ratios(mut self, split_ratios: Vec<f64>) -> Self {
        self.split_ratios = split_ratios;
        self
    }
}

/// Drives one prediction run against the server.
///
/// Frame names are fixed (`dataSet`, `train`, `validate`, `predictme`,
/// `predictions`) and the model id defaults to the algorithm name, so two runs
/// against the same server at once will overwrite each other's frames and
/// models. Nothing is cleaned up if a step fails.
pub struct Orchestrator<T: Transport> {
    transport: T,
    poll_options: PollOptions,
    unique_model_id: bool,
    progress: Option<ProgressBar>,
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(transport: T) -> Orchestrator<T> {
        Self {
            transport,
            poll_options: PollOptions::default(),
            unique_model_id: false,
            progress: None,
        }
    }

    pub fn with_poll_options(mut self, poll_options: PollOptions) -> Self {
        self.poll_options = poll_options;
        self
    }

    /// Suffix model ids with a random UUID so repeated runs do not collide.
    pub fn with_unique_model_id(mut self, unique_model_id: bool) -> Self {
        self.unique_model_id = unique_model_id;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run_prediction(&self, request: &PredictionRequest) -> Result<PredictionResult> {
        let algorithm: Algorithm = request.algorithm.parse()?;
        let model_id = self.model_id(algorithm);

        self.load_frame(
            &request.training_path,
            FrameHandle::DATA_SET,
            [Stage::ImportTrainingData, Stage::DetectSchema, Stage::ParseTrainingData],
        )
        .await?;

        self.enter(Stage::SplitData);
        self.split(&request.split_ratios)
            .await
            .with_context(|| format!("{} failed", Stage::SplitData))?;

        self.enter(Stage::TrainModel);
        self.train(algorithm, &model_id, &request.target_column)
            .await
            .with_context(|| format!("{} failed", Stage::TrainModel))?;

        self.enter(Stage::ValidatePrediction);
        let Confidence(model_confidence) = self
            .predict_frame::<Confidence>(&model_id, FrameHandle::VALIDATE, FormRecord::new())
            .await
            .with_context(|| format!("{} failed", Stage::ValidatePrediction))?;
        info!("Validation MSE for model {}: {}", model_id, model_confidence);

        self.load_frame(
            &request.prediction_input_path,
            FrameHandle::PREDICT_ME,
            [Stage::ImportPredictionData, Stage::DetectPredictionSchema, Stage::ParsePredictionData],
        )
        .await?;

        self.enter(Stage::PredictWithModel);
        let record = FormRecord::new().field(
            "predictions_frame",
            FieldValue::scalar(FrameHandle::PREDICTIONS),
        );
        let ModelCategory(model_type) = self
            .predict_frame::<ModelCategory>(&model_id, FrameHandle::PREDICT_ME, record)
            .await
            .with_context(|| format!("{} failed", Stage::PredictWithModel))?;

        self.enter(Stage::FetchResults);
        let prediction = self
            .fetch_frame(FrameHandle::PREDICTIONS)
            .await
            .with_context(|| format!("{} failed", Stage::FetchResults))?;

        self.enter(Stage::Done);
        if let Some(progress) = &self.progress {
            progress.finish_with_message("Prediction complete");
        }

        Ok(PredictionResult { prediction, model_type, model_confidence })
    }

    fn model_id(&self, algorithm: Algorithm) -> String {
        if self.unique_model_id {
            format!("{}-{}", algorithm, Uuid::new_v4().simple())
        } else {
            algorithm.to_string()
        }
    }

    fn enter(&self, stage: Stage) {
        info!("{}", stage);
        if let Some(progress) = &self.progress {
            progress.set_message(stage.to_string());
        }
    }

    /// Import, detect schema and parse one file into `destination`.
    async fn load_frame(&self, path: &str, destination: FrameHandle, stages: [Stage; 3]) -> Result<()> {
        let [import_stage, detect_stage, parse_stage] = stages;

        self.enter(import_stage);
        let import = self
            .import(path)
            .await
            .with_context(|| format!("{} failed", import_stage))?;

        self.enter(detect_stage);
        let setup = self
            .detect_schema(&import)
            .await
            .with_context(|| format!("{} failed", detect_stage))?;

        self.enter(parse_stage);
        self.parse(&setup, destination)
            .await
            .with_context(|| format!("{} failed", parse_stage))
    }

    async fn import(&self, path: &str) -> Result<ImportResult> {
        let record = FormRecord::new().field("path", FieldValue::scalar(path));
        let response = self.transport.post_form("ImportFiles", &record.encode()).await?;
        ImportResult::from_response(&response)
    }

    async fn detect_schema(&self, import: &ImportResult) -> Result<ParseSetup> {
        let source = import
            .destination_frames
            .first()
            .context("Import created no destination frames")?;
        let record = FormRecord::new().field("source_frames", FieldValue::names(&[source]));
        let response = self.transport.post_form("ParseSetup", &record.encode()).await?;
        ParseSetup::from_response(&response)
    }

    async fn parse(&self, setup: &ParseSetup, destination: FrameHandle) -> Result<()> {
        let mut record = FormRecord::new();
        for name in PARSE_SETUP_FIELDS {
            let value: &Value = field(&setup.0, &[name])?;
            record.push(name, FieldValue::from(value));
        }
        record.push("destination_frame", FieldValue::scalar(destination));
        record.push("delete_on_done", FieldValue::Bool(true));
        self.submit_job("Parse", &record).await
    }

    async fn split(&self, ratios: &[f64]) -> Result<()> {
        let record = FormRecord::new()
            .field("dataset", FieldValue::scalar(FrameHandle::DATA_SET))
            .field("ratios", FieldValue::raw_seq(ratios))
            .field(
                "destination_frames",
                FieldValue::names(&[FrameHandle::TRAIN.name(), FrameHandle::VALIDATE.name()]),
            );
        self.submit_job("SplitFrame", &record).await
    }

    async fn train(&self, algorithm: Algorithm, model_id: &str, target_column: &str) -> Result<()> {
        let record = FormRecord::new()
            .field("training_frame", FieldValue::scalar(FrameHandle::TRAIN))
            .field("validation_frame", FieldValue::scalar(FrameHandle::VALIDATE))
            .field("response_column", FieldValue::scalar(target_column))
            .field("model_id", FieldValue::scalar(model_id));
        self.submit_job(&format!("ModelBuilders/{}", algorithm), &record).await
    }

    async fn predict_frame<R: FromResponse>(
        &self,
        model_id: &str,
        frame: FrameHandle,
        record: FormRecord,
    ) -> Result<R> {
        let endpoint = format!("Predictions/models/{}/frames/{}", model_id, frame);
        let response = self.transport.post_form(&endpoint, &record.encode()).await?;
        R::from_response(&response)
    }

    async fn fetch_frame(&self, frame: FrameHandle) -> Result<Vec<PredictionColumn>> {
        let response = self.transport.get(&format!("Frames/{}", frame)).await?;
        Vec::<PredictionColumn>::from_response(&response)
    }

    /// Submits a job-producing request and waits until the job is done.
    async fn submit_job(&self, endpoint: &str, record: &FormRecord) -> Result<()> {
        let response = self.transport.post_form(endpoint, &record.encode()).await?;
        let job = JobHandle::from_response(&response)?;
        info!("{} started job {}", endpoint, job);
        JobPoller::new(&self.transport, self.poll_options.clone())
            .wait(&job)
            .await?;
        Ok(())
    }
}

/// Runs the whole pipeline against the server at `base_url`.
pub async fn run_prediction(
    base_url: &str,
    training_path: &str,
    prediction_input_path: &str,
    algorithm: &str,
    split_ratios: &[f64],
    target_column: &str,
) -> Result<PredictionResult> {
    let request = PredictionRequest::new(training_path, prediction_input_path, algorithm, target_column)
        .with_split_ratios(split_ratios.to_vec());
    let server = H2OServer::new(base_url)?;
    Orchestrator::new(server).run_prediction(&request).await
}
