use crate::backend::{Backend, FetchOutcome, Issue};
use crate::cards::{Card, CardContext, build_card};
use crate::credentials::Credentials;
use crate::errors::{BackendError, ConnectorError};
use crate::metrics_defs::{CARDS_RETURNED, FETCH_INFLIGHT};
use indexmap::IndexSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fans out one fetch per issue key and assembles the resulting cards.
///
/// The permit pool is shared by every request the process serves, so the
/// total number of fetches in flight never exceeds the configured bound.
#[derive(Clone)]
pub struct Aggregator {
    backend: Arc<dyn Backend>,
    permits: Arc<Semaphore>,
}

impl Aggregator {
    pub fn new(backend: Arc<dyn Backend>, max_concurrent_fetches: usize) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrent_fetches)),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Resolves `keys` to cards in order of first appearance.
    ///
    /// Issues that are not found, or that the tracker refuses for a reason
    /// specific to that issue, are left out. Any failure that concerns the
    /// whole request fails it; when several occur, the one for the earliest
    /// key is reported.
    pub async fn cards<I>(
        &self,
        keys: I,
        credentials: &Credentials,
        ctx: &CardContext<'_>,
    ) -> Result<Vec<Card>, ConnectorError>
    where
        I: IntoIterator<Item = String>,
    {
        let keys: IndexSet<String> = keys.into_iter().collect();
        let issues = self.fetch_all(&keys, credentials).await?;
        let cards: Vec<Card> = issues.iter().map(|issue| build_card(issue, ctx)).collect();

        shared::histogram!(CARDS_RETURNED).record(cards.len() as f64);
        Ok(cards)
    }

    async fn fetch_all(
        &self,
        keys: &IndexSet<String>,
        credentials: &Credentials,
    ) -> Result<Vec<Issue>, ConnectorError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        // Position of the earliest key whose fetch failed the request
        let first_failure = Arc::new(AtomicUsize::new(usize::MAX));
        let mut join_set = JoinSet::new();

        for (position, key) in keys.iter().enumerate() {
            let backend = self.backend.clone();
            let permits = self.permits.clone();
            let credentials = credentials.clone();
            let first_failure = first_failure.clone();
            let key = key.clone();

            join_set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (position, None);
                };
                // A failure ahead of us already decides the response
                if first_failure.load(Ordering::Acquire) < position {
                    return (position, None);
                }

                let _inflight = InflightGuard::new();
                let outcome = backend.fetch_issue(&credentials, &key).await;
                if let FetchOutcome::BackendError(error) = &outcome {
                    if error.aborts_aggregation() {
                        first_failure.fetch_min(position, Ordering::AcqRel);
                    }
                }
                (position, Some(outcome))
            });
        }

        let mut slots: Vec<Option<FetchOutcome>> = vec![None; keys.len()];
        let mut panicked = false;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((position, outcome)) => slots[position] = outcome,
                Err(e) => {
                    tracing::error!(error = %e, "Fetch task panicked");
                    panicked = true;
                }
            }
        }

        let mut issues = Vec::with_capacity(keys.len());
        for (key, slot) in keys.iter().zip(slots) {
            match slot {
                Some(FetchOutcome::Success(issue)) => issues.push(issue),
                Some(FetchOutcome::NotFound) => {
                    tracing::debug!(issue_key = %key, "Issue not found");
                }
                Some(FetchOutcome::BackendError(error)) => {
                    if error.aborts_aggregation() {
                        tracing::info!(
                            issue_key = %key,
                            backend = credentials.host(),
                            error = %error,
                            "Backend failure, failing card request"
                        );
                        return Err(error.into());
                    }
                    log_dropped(key, credentials, &error);
                }
                // Skipped after an earlier failure, or lost to a panic
                None => {}
            }
        }

        if panicked {
            return Err(ConnectorError::InternalError(
                "issue fetch did not complete".to_string(),
            ));
        }
        Ok(issues)
    }
}

fn log_dropped(key: &str, credentials: &Credentials, error: &BackendError) {
    tracing::warn!(
        issue_key = %key,
        backend = credentials.host(),
        status = error.backend_status().map(|s| s.as_u16()),
        "Backend refused issue, leaving it out"
    );
}

struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        shared::gauge!(FETCH_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        shared::gauge!(FETCH_INFLIGHT).decrement(1.0);
    }
}
