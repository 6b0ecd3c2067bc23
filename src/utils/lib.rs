use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use clap::Parser;
use std::path::PathBuf;
use std::fs::create_dir_all;
use std::time::Duration;
use anyhow::{Context, Result};

use chrono::Local;

use crate::adapters::h2o::{base_url_with_port, DEFAULT_BASE_URL};
use crate::adapters::server::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Server URL template; `{endpoint}` is replaced per request.
    #[clap(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Training dataset path, as seen by the server.
    #[clap(long)]
    pub training_data: String,

    /// Dataset to predict on, as seen by the server.
    #[clap(long)]
    pub prediction_input: String,

    #[clap(short, long)]
    pub algorithm: String,

    /// Train/validate ratios.
    #[clap(long, value_delimiter = ',', default_values_t = vec![0.85, 0.15])]
    pub split: Vec<f64>,

    /// Column to predict.
    #[clap(short, long)]
    pub target: String,

    #[clap(short, long, value_parser)]
    pub output: Option<PathBuf>,

    #[clap(long, default_value = "1000")]
    pub poll_interval_ms: u64,

    /// Give up on a job after this long. Waits forever when unset.
    #[clap(long)]
    pub timeout_secs: Option<u64>,

    /// Per-request HTTP timeout.
    #[clap(long, default_value = "60")]
    pub request_timeout_secs: u64,

    #[clap(long)]
    pub unique_model_id: bool,

    /// Start the server from this jar before the run and stop it afterwards.
    #[clap(long, value_parser)]
    pub server_jar: Option<PathBuf>,

    /// Port for the server started from `--server-jar`; the base URL follows it.
    #[clap(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Args {
    /// Base URL the client should talk to for this run.
    pub fn client_base_url(&self) -> Result<String> {
        match self.server_jar {
            Some(_) => base_url_with_port(&self.base_url, self.port),
            None => Ok(self.base_url.clone()),
        }
    }
}

fn timestamped_file_name() -> String {
    Local::now().format("%Y%m%d_%H%M%S.json").to_string()
}

pub fn get_output_file_path(output_arg: Option<PathBuf>) -> Result<PathBuf> {
    match output_arg {
        Some(path) => {
            if path.is_dir() {
                Ok(path.join(timestamped_file_name()))
            } else {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    create_dir_all(parent)
                        .with_context(|| format!("Failed to create output directory {:?}", parent))?;
                }
                Ok(path)
            }
        },
        None => {
            let output_dir = PathBuf::from("./output");
            create_dir_all(&output_dir).context("Failed to create output directory")?;
            Ok(output_dir.join(timestamped_file_name()))
        }
    }
}

pub fn create_spinner() -> Result<ProgressBar, io::Error> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
