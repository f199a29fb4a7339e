//! Bounded polling of asynchronous jobs.
//!
//! Circuit compilation and proof generation run server-side. The client reads the
//! job status until it is terminal or the [`PollPolicy`] budget runs out:
//!
//! - `Ready` stops polling and returns the last detail.
//! - `Failed` stops polling and returns the last detail for the caller to turn into
//!   its domain error.
//! - Anything else counts as pending: wait one interval and read again.
//!
//! A budget of `max_attempts = N` allows exactly N status reads. `N = 0` times out
//! without reading. No read is made after a terminal status, and there is no pause
//! after the final allowed read.

use std::future::Future;

use sindri_types::{CircuitDetail, JobStatus, ProofDetail};
use tokio::time::Instant;
use tracing::warn;

use crate::{
    config::PollPolicy,
    error::{Error, Result},
    events::{ClientEvent, Reporter},
};

/// Kind of job being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Job {
    /// Circuit compilation.
    Circuit,
    /// Proof generation.
    Proof,
}

/// A response record that carries a job status.
pub(crate) trait Tracked {
    /// Status reported by the service.
    fn status(&self) -> &JobStatus;
}

impl Tracked for CircuitDetail {
    fn status(&self) -> &JobStatus {
        &self.status
    }
}

impl Tracked for ProofDetail {
    fn status(&self) -> &JobStatus {
        &self.status
    }
}

/// Terminal outcome of a polled job.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Terminal<T> {
    /// The job reached `Ready`.
    Ready(T),
    /// The job reached `Failed`.
    Failed(T),
}

/// Reads `fetch` until it reports a terminal status.
///
/// Errors from `fetch` are returned as-is, so a failed HTTP call ends polling
/// immediately. Exhausting `policy` yields [`Error::Timeout`].
pub(crate) async fn poll_until_terminal<T, F, Fut>(
    policy: &PollPolicy,
    job: Job,
    id: &str,
    reporter: &Reporter,
    mut fetch: F,
) -> Result<Terminal<T>>
where
    T: Tracked,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = policy.timeout().map(|timeout| Instant::now() + timeout);
    let mut attempts = 0;
    let mut last_status = None;

    reporter.report(ClientEvent::PollStarted { job, id });

    loop {
        let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if attempts >= policy.max_attempts || expired {
            warn!(%job, %id, attempts, "Polling budget exhausted");
            return Err(Error::Timeout {
                job,
                id: id.to_string(),
                attempts,
                last_status,
            });
        }

        let detail = fetch().await?;
        attempts += 1;
        reporter.report(ClientEvent::Polled {
            job,
            id,
            attempt: attempts,
            status: detail.status(),
        });

        match detail.status() {
            JobStatus::Ready => return Ok(Terminal::Ready(detail)),
            JobStatus::Failed => return Ok(Terminal::Failed(detail)),
            status => last_status = Some(status.clone()),
        }

        if attempts < policy.max_attempts {
            let mut pause = policy.interval();
            if let Some(deadline) = deadline {
                pause = pause.min(deadline.saturating_duration_since(Instant::now()));
            }
            tokio::time::sleep(pause).await;
        }
    }
}
