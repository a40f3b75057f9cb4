//! Submit-and-poll driver for long-running video generation jobs.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{OperationHandle, VideoModel};
use crate::error::{ErrorKind, GenerationError, GenerationResult};
use crate::metrics::{GENERATION_ERRORS, VIDEO_POLLS};
use crate::prompts;

/// Capped exponential backoff between polls.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    /// Multiplier per attempt; values below 1.0 are treated as 1.0
    pub growth_factor: f64,
    pub max_delay: Duration,
    /// Polls allowed before the job is declared timed out
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            growth_factor: 1.1,
            max_delay: Duration::from_secs(30),
            max_attempts: 60,
        }
    }
}

impl BackoffPolicy {
    /// `min(base * growth^attempt, max)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.growth_factor.max(1.0).powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    /// Upper bound on time spent waiting before giving up.
    pub fn total_wait(&self) -> Duration {
        (0..self.max_attempts).map(|attempt| self.delay(attempt)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Done,
    TimedOut,
    Failed,
    Cancelled,
}

// Bookkeeping for one job
struct VideoJob {
    state: JobState,
    attempts: u32,
}

impl VideoJob {
    fn new() -> Self {
        Self {
            state: JobState::Submitted,
            attempts: 0,
        }
    }

    fn transition(&mut self, state: JobState) {
        debug!(from = ?self.state, to = ?state, attempts = self.attempts, "Video job state change");
        self.state = state;
    }

    fn fail(&mut self, state: JobState, err: GenerationError) -> GenerationError {
        self.transition(state);
        GENERATION_ERRORS.with_label_values(&[err.kind.as_str()]).inc();
        warn!(kind = %err.kind, attempts = self.attempts, "Video generation failed: {}", err.detail);
        err
    }

    fn cancel(&mut self) -> GenerationError {
        self.fail(
            JobState::Cancelled,
            GenerationError::cancelled("video generation cancelled"),
        )
    }
}

/// Finished video.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub bytes: Bytes,
    pub uri: String,
    pub attempts: u32,
}

pub struct JobPoller {
    model: Arc<dyn VideoModel>,
    policy: BackoffPolicy,
}

impl JobPoller {
    pub fn new(model: Arc<dyn VideoModel>, policy: BackoffPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub async fn submit_and_await(
        &self,
        prompt: &str,
        style: &str,
        seed_image: Option<Bytes>,
    ) -> GenerationResult<VideoArtifact> {
        self.submit_and_await_with_cancel(prompt, style, seed_image, CancellationToken::new())
            .await
    }

    /// Same as [`submit_and_await`](Self::submit_and_await), stopping early
    /// once `cancel` fires.
    pub async fn submit_and_await_with_cancel(
        &self,
        prompt: &str,
        style: &str,
        seed_image: Option<Bytes>,
        cancel: CancellationToken,
    ) -> GenerationResult<VideoArtifact> {
        info!("Generating project video");
        let request = prompts::video_request(prompt, style, seed_image);
        let mut job = VideoJob::new();

        let mut operation = match self.model.submit(&request).await {
            Ok(operation) => operation,
            Err(err) => return Err(job.fail(JobState::Failed, err.into())),
        };
        job.transition(JobState::Polling);

        while !operation.done && job.attempts < self.policy.max_attempts {
            let delay = self.policy.delay(job.attempts);
            tokio::select! {
                _ = cancel.cancelled() => return Err(job.cancel()),
                _ = sleep(delay) => {}
            }

            let polled = tokio::select! {
                _ = cancel.cancelled() => return Err(job.cancel()),
                polled = self.model.poll(&operation) => polled,
            };
            operation = match polled {
                Ok(next) => next,
                Err(err) => return Err(job.fail(JobState::Failed, err.into())),
            };
            job.attempts += 1;
            VIDEO_POLLS.inc();
            debug!(attempt = job.attempts, operation = %operation.name, "Polling video operation");
        }

        let uri = self.finish(&mut job, operation)?;

        let bytes = match self.model.fetch_artifact(&uri).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = GenerationError::download_failed(format!("failed to download video: {}", err));
                return Err(job.fail(JobState::Failed, err));
            }
        };
        info!(attempts = job.attempts, size = bytes.len(), "Project video generated");
        Ok(VideoArtifact {
            bytes,
            uri,
            attempts: job.attempts,
        })
    }

    // Terminal checks once polling has stopped
    fn finish(&self, job: &mut VideoJob, operation: OperationHandle) -> GenerationResult<String> {
        if !operation.done {
            let waited = self.policy.total_wait();
            return Err(job.fail(
                JobState::TimedOut,
                GenerationError::new(
                    ErrorKind::Timeout,
                    format!(
                        "video generation did not finish after {} polls (~{} seconds)",
                        job.attempts,
                        waited.as_secs()
                    ),
                ),
            ));
        }
        if let Some(message) = operation.error {
            return Err(job.fail(
                JobState::Failed,
                GenerationError::upstream(format!("video operation failed: {}", message)),
            ));
        }
        let Some(uri) = operation.result_uri else {
            return Err(job.fail(
                JobState::Failed,
                GenerationError::empty_response("no video download link returned"),
            ));
        };
        job.transition(JobState::Done);
        Ok(uri)
    }
}
