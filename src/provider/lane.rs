use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::TextProvider;
use crate::error::ProviderError;
use crate::persona::SamplingConfig;

/// Minimum spacing between backend requests, measured from completion of the
/// previous request to the start of the next.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded retry attempts per queued request.
pub const MAX_ATTEMPTS: u32 = 3;

/// One generation request as it travels through the lane.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub sampling: SamplingConfig,
}

struct LaneJob {
    request: GenerateRequest,
    reply: oneshot::Sender<Result<String, ProviderError>>,
}

/// Single-lane FIFO queue in front of a provider.
///
/// All generation calls — every agent, every room — are serialized through
/// one drain task that enforces [`MIN_REQUEST_INTERVAL`] spacing and wraps
/// each request in bounded retry with exponential backoff. This is the one
/// global ordering constraint (and bottleneck) in the system.
#[derive(Clone)]
pub struct ProviderLane {
    tx: mpsc::Sender<LaneJob>,
    provider: Arc<dyn TextProvider>,
}

impl ProviderLane {
    /// Spawn the drain task and return a handle.
    pub fn spawn(provider: Arc<dyn TextProvider>, min_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<LaneJob>(64);
        tokio::spawn(drain(Arc::clone(&provider), rx, min_interval));
        Self { tx, provider }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    /// Queue a request and wait for its result. Requests are processed
    /// strictly in submission order.
    pub async fn generate(&self, request: GenerateRequest) -> Result<String, ProviderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(LaneJob {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ProviderError::LaneClosed)?;
        reply_rx.await.map_err(|_| ProviderError::LaneClosed)?
    }
}

async fn drain(
    provider: Arc<dyn TextProvider>,
    mut rx: mpsc::Receiver<LaneJob>,
    min_interval: Duration,
) {
    let mut last_completed: Option<Instant> = None;

    while let Some(job) = rx.recv().await {
        if let Some(at) = last_completed {
            let elapsed = at.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }

        let result = generate_with_backoff(provider.as_ref(), &job.request).await;
        last_completed = Some(Instant::now());

        // Caller may have given up; dropping the result is fine.
        let _ = job.reply.send(result);
    }
}

/// Run one request with bounded retry. Backoff is `2^attempt * 1000ms` plus
/// up to 1000ms of jitter, and only errors classified transient are retried;
/// everything else surfaces immediately.
pub async fn generate_with_backoff(
    provider: &dyn TextProvider,
    request: &GenerateRequest,
) -> Result<String, ProviderError> {
    let mut attempt = 0;
    loop {
        match provider
            .generate(
                &request.system_prompt,
                &request.user_message,
                &request.sampling,
            )
            .await
        {
            Ok(text) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "retry succeeded");
                }
                return Ok(text);
            }
            Err(e) => {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS || !e.is_transient() {
                    return Err(e);
                }
                let backoff = backoff_delay(attempt - 1);
                warn!(
                    attempt,
                    max = MAX_ATTEMPTS,
                    delay_ms = backoff.as_millis() as u64,
                    "retrying after transient provider error: {e}"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    use rand::Rng;
    let jitter = rand::thread_rng().gen_range(0..1000);
    Duration::from_millis(2u64.pow(attempt) * 1000 + jitter)
}
