use anyhow::{Context, Result};
use log::{debug, info};
use std::future::{pending, Future};
use thiserror::Error;
use tokio::time::{sleep, sleep_until, Duration, Instant};

use crate::adapters::transport::Transport;
use crate::core::cancellation::CancellationToken;
use crate::core::types::{JobHandle, JobReport, JobStatus};
use crate::utils::response::FromResponse;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("job {job} failed on the server: {reason}")]
    JobFailed { job: String, reason: String },

    #[error("job {job} was cancelled on the server")]
    JobCancelled { job: String },

    #[error("gave up waiting after {0:?}")]
    TimedOut(Duration),

    #[error("wait cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` waits forever.
    pub deadline: Option<Duration>,
    pub cancel: CancellationToken,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl PollOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs `step` unless the wait that began at `started` hits its deadline
    /// or is cancelled first. A step in flight is dropped when that happens.
    pub async fn race<F: Future>(&self, started: Instant, step: F) -> Result<F::Output, PollError> {
        if self.cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        let expiry = async {
            match self.deadline {
                Some(deadline) => {
                    sleep_until(started + deadline).await;
                    PollError::TimedOut(deadline)
                }
                None => pending::<PollError>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PollError::Cancelled),
            err = expiry => Err(err),
            output = step => Ok(output),
        }
    }
}

pub struct JobPoller<'a, T: Transport + ?Sized> {
    transport: &'a T,
    options: PollOptions,
}

impl<'a, T: Transport + ?Sized> JobPoller<'a, T> {
    pub fn new(transport: &'a T, options: PollOptions) -> Self {
        Self { transport, options }
    }

    /// Returns once the job reports `DONE`, with the number of status checks made.
    pub async fn wait(&self, job: &JobHandle) -> Result<usize> {
        let started = Instant::now();
        let mut checks = 0;
        loop {
            let response = self
                .options
                .race(started, self.transport.get(job.path()))
                .await?
                .with_context(|| format!("Failed to fetch status of job {}", job))?;
            checks += 1;
            let report = JobReport::from_response(&response)
                .with_context(|| format!("Malformed status for job {}", job))?;
            match report.status {
                JobStatus::Done => {
                    info!("Job {} done after {} checks", job, checks);
                    return Ok(checks);
                }
                JobStatus::Failed => {
                    return Err(PollError::JobFailed {
                        job: job.to_string(),
                        reason: report.exception.unwrap_or_else(|| "no reason given".to_string()),
                    }
                    .into())
                }
                JobStatus::Cancelled => {
                    return Err(PollError::JobCancelled { job: job.to_string() }.into())
                }
                status => debug!("Job {} is {:?}", job, status),
            }
            self.options.race(started, sleep(self.options.interval)).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::transport::MockTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn job() -> JobHandle {
        JobHandle("/3/Jobs/parse".to_string())
    }

    fn scripted(statuses: Vec<&'static str>) -> (MockTransport, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|path| path == "/3/Jobs/parse")
            .returning(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses[n.min(statuses.len() - 1)];
                Ok(json!({"jobs": [{"status": status}]}))
            });
        (transport, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_done_with_fixed_spacing() {
        let (transport, calls) = scripted(vec!["RUNNING", "RUNNING", "DONE"]);
        let started = Instant::now();
        let checks = JobPoller::new(&transport, PollOptions::default()).wait(&job()).await.unwrap();
        assert_eq!(checks, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn never_returns_without_done() {
        let (transport, calls) = scripted(vec!["RUNNING"]);
        let poller = JobPoller::new(&transport, PollOptions::default());
        let outcome = tokio::time::timeout(Duration::from_secs(10), poller.wait(&job())).await;
        assert!(outcome.is_err());
        let observed = calls.load(Ordering::SeqCst);
        assert!((10..=11).contains(&observed), "observed {} checks", observed);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_the_wait() {
        let (transport, _) = scripted(vec!["RUNNING"]);
        let options = PollOptions::default().with_deadline(Duration::from_secs(5));
        let err = JobPoller::new(&transport, options).wait(&job()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<PollError>(),
            Some(&PollError::TimedOut(Duration::from_secs(5)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let (transport, calls) = scripted(vec!["RUNNING"]);
        let token = CancellationToken::new();
        let options = PollOptions::default().with_cancellation(token.clone());
        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(2500)).await;
            token.cancel();
        });
        let err = JobPoller::new(&transport, options).wait(&job()).await.unwrap_err();
        canceller.await.unwrap();
        assert_eq!(err.downcast_ref::<PollError>(), Some(&PollError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    struct StalledTransport;

    #[async_trait::async_trait]
    impl Transport for StalledTransport {
        async fn post_form(&self, _endpoint: &str, _body: &str) -> Result<serde_json::Value> {
            pending().await
        }

        async fn get(&self, _path: &str) -> Result<serde_json::Value> {
            pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_off_a_stalled_status_request() {
        let options = PollOptions::default().with_deadline(Duration::from_secs(5));
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            JobPoller::new(&StalledTransport, options).wait(&job()),
        )
        .await
        .expect("deadline should fire before the outer timeout");
        let err = outcome.unwrap_err();
        assert_eq!(
            err.downcast_ref::<PollError>(),
            Some(&PollError::TimedOut(Duration::from_secs(5)))
        );
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_off_a_stalled_status_request() {
        let token = CancellationToken::new();
        let options = PollOptions::default().with_cancellation(token.clone());
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let started = Instant::now();
        let err = JobPoller::new(&StalledTransport, options).wait(&job()).await.unwrap_err();
        assert_eq!(err.downcast_ref::<PollError>(), Some(&PollError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_long_interval() {
        let (transport, calls) = scripted(vec!["RUNNING"]);
        let token = CancellationToken::new();
        let options = PollOptions::default()
            .with_interval(Duration::from_secs(600))
            .with_cancellation(token.clone());
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let started = Instant::now();
        let err = JobPoller::new(&transport, options).wait(&job()).await.unwrap_err();
        assert_eq!(err.downcast_ref::<PollError>(), Some(&PollError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_surfaces_server_exception() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .times(1)
            .returning(|_| Ok(json!({"jobs": [{"status": "FAILED", "exception": "column 'y' not found"}]})));
        let err = JobPoller::new(&transport, PollOptions::default()).wait(&job()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<PollError>(),
            Some(&PollError::JobFailed {
                job: "/3/Jobs/parse".to_string(),
                reason: "column 'y' not found".to_string(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_job_is_an_error() {
        let (transport, _) = scripted(vec!["RUNNING", "CANCELLED"]);
        let err = JobPoller::new(&transport, PollOptions::default()).wait(&job()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PollError>(), Some(PollError::JobCancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn status_request_failure_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let err = JobPoller::new(&transport, PollOptions::default()).wait(&job()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
    }
}
