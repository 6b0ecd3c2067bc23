use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use crate::adapters::h2o::H2OServer;
use crate::adapters::output::write_result_file;
use crate::adapters::server::*;
use crate::core::cancellation::CancellationToken;
use crate::core::orchestrator::*;
use crate::core::poller::PollOptions;
use crate::core::types::PredictionResult;
use crate::utils::lib::*;

pub async fn run_cli_interface() -> Result<()> {
    let args = Args::parse();
    let output_path = get_output_file_path(args.output.clone())
        .context("Failed to resolve output path")?;
    let base_url = args.client_base_url()
        .context("Failed to derive server base URL")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel_on(tokio::signal::ctrl_c(), cancel.clone());

    let mut poll_options = PollOptions::default()
        .with_interval(Duration::from_millis(args.poll_interval_ms))
        .with_cancellation(cancel.clone());
    if let Some(secs) = args.timeout_secs {
        poll_options = poll_options.with_deadline(Duration::from_secs(secs));
    }

    let server = match &args.server_jar {
        Some(jar) => {
            check_java().await.context("Java runtime check failed")?;
            Some(start_server(jar, args.port).await.context("Failed to start server")?)
        }
        None => None,
    };

    // Requests outside a job wait are not raced by the poller, so stop the
    // whole run on interrupt and fall through to stopping the server.
    let outcome = tokio::select! {
        outcome = run(&args, &base_url, poll_options) => outcome,
        _ = cancel.cancelled() => Err(anyhow::anyhow!("Interrupted")),
    };
    interrupt.abort();

    if let Some(handle) = server {
        stop_server(handle).await.context("Failed to stop server")?;
    }

    let result = outcome?;
    write_result_file(&output_path, &result)
        .context("Failed to write prediction result")?;
    info!("Prediction written to {:?}", output_path);
    println!("Model type: {}", result.model_type);
    println!("Validation MSE: {}", result.model_confidence);
    println!("Prediction written to {}", output_path.display());
    Ok(())
}

/// Cancels `token` once `signal` fires.
pub fn cancel_on<F>(signal: F, token: CancellationToken) -> JoinHandle<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                warn!("Interrupted, stopping");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    })
}

async fn run(args: &Args, base_url: &str, poll_options: PollOptions) -> Result<PredictionResult> {
    let h2o = H2OServer::new(base_url)
        .context("Failed to create server client")?
        .with_timeout(Duration::from_secs(args.request_timeout_secs))?;

    if args.server_jar.is_some() {
        wait_until_ready(&h2o, &poll_options)
            .await
            .context("Server did not become ready")?;
    }

    let request = PredictionRequest::new(
        args.training_data.clone(),
        args.prediction_input.clone(),
        args.algorithm.clone(),
        args.target.clone(),
    )
    .with_split_ratios(args.split.clone());

    let spinner = create_spinner().context("Failed to create progress spinner")?;
    let orchestrator = Orchestrator::new(h2o)
        .with_poll_options(poll_options)
        .with_unique_model_id(args.unique_model_id)
        .with_progress(spinner.clone());

    orchestrator.run_prediction(&request).await.map_err(|e| {
        spinner.abandon_with_message("Prediction failed");
        error!("Prediction failed: {:#}", e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn signal_cancels_the_token() {
        let token = CancellationToken::new();
        let (fire, fired) = oneshot::channel::<()>();
        let listener = cancel_on(
            async move {
                let _ = fired.await;
                Ok(())
            },
            token.clone(),
        );
        assert!(!token.is_cancelled());
        fire.send(()).unwrap();
        listener.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn failed_listener_leaves_the_token_alone() {
        let token = CancellationToken::new();
        let listener = cancel_on(
            async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal support")) },
            token.clone(),
        );
        listener.await.unwrap();
        assert!(!token.is_cancelled());
    }
}
