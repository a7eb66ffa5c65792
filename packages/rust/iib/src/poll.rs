//! Build status polling.
//!
//! ```text
//! submitted ─► pending* ─┬─► complete   => PollOutcome::Success
//!                        ├─► failed     => PollOutcome::Failed
//!                        └─► (budget)   => PollOutcome::TimedOut
//! ```
//!
//! Each iteration performs exactly one status read. Terminal states return
//! immediately; otherwise the elapsed time is checked before sleeping, so a
//! zero budget gives up after the first read without sleeping. The loop has
//! no cancellation hook.

use std::time::{Duration, Instant};

use tracing::{error, info, instrument};

use operatorcert_shared::Result;

use crate::client::{BuildResponse, BuildState, IibClient};

/// Default wait budget for a build to reach a terminal state.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default delay between two status reads.
const DEFAULT_DELAY: Duration = Duration::from_secs(20);

/// Wait budget and polling cadence.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout: Duration,
    pub delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
        }
    }
}

/// How a wait for a build ended.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The build reached `complete`.
    Success(BuildResponse),
    /// The build reached `failed`.
    Failed {
        response: BuildResponse,
        reason: Option<String>,
    },
    /// No terminal state was observed within the budget.
    TimedOut {
        last_state: String,
        waited: Duration,
    },
}

/// Progress callback for the poll loop.
pub trait PollObserver: Send + Sync {
    /// Called after every status read.
    fn polled(&self, build_id: u64, state: &str, elapsed: Duration);
    /// Called once the loop ends.
    fn finished(&self, build_id: u64, outcome: &PollOutcome);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl PollObserver for SilentObserver {
    fn polled(&self, _build_id: u64, _state: &str, _elapsed: Duration) {}
    fn finished(&self, _build_id: u64, _outcome: &PollOutcome) {}
}

/// Poll `build_id` until it completes, fails, or `settings.timeout` elapses.
///
/// The budget counts from `submitted_at`, the moment the build request was
/// sent, not from the first status read. Transport and HTTP errors abort the
/// loop; they are not retried.
#[instrument(skip(client, settings, observer, submitted_at))]
pub async fn wait_for_build(
    client: &IibClient,
    build_id: u64,
    submitted_at: Instant,
    settings: PollSettings,
    observer: &dyn PollObserver,
) -> Result<PollOutcome> {

    loop {
        let response = client.get_build(build_id).await?;
        let elapsed = submitted_at.elapsed();
        observer.polled(build_id, &response.state, elapsed);

        let outcome = match response.build_state() {
            BuildState::Complete => {
                info!(build_id, "IIB build completed successfully");
                Some(PollOutcome::Success(response))
            }
            BuildState::Failed => {
                let reason = response.latest_reason().map(str::to_string);
                error!(build_id, reason = reason.as_deref().unwrap_or("-"), "IIB build failed");
                Some(PollOutcome::Failed { response, reason })
            }
            BuildState::Pending(state) => {
                if elapsed >= settings.timeout {
                    error!(build_id, %state, waited_secs = elapsed.as_secs(), "timed out waiting for IIB build");
                    Some(PollOutcome::TimedOut {
                        last_state: state,
                        waited: elapsed,
                    })
                } else {
                    info!(build_id, %state, "waiting for IIB build to finish");
                    None
                }
            }
        };

        if let Some(outcome) = outcome {
            observer.finished(build_id, &outcome);
            return Ok(outcome);
        }

        tokio::time::sleep(settings.delay).await;
    }
}
