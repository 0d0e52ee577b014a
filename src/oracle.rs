// src/oracle.rs
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::OracleConfig;
use crate::market::{Clock, SystemClock};
use crate::providers::{fetch_with_retry, PriceSource, ProviderError};
use crate::publishing::{ChainPublisher, PublishError};
use crate::types::{scale_by_expo, ErrorKind, Outcome, ScaleError, UpdateAttempt};

/// Anything that can end a cycle early. None of these leave the cycle.
#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("scaling failed: {0}")]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("cycle did not finish within {0:?}")]
    Timeout(Duration),
}

impl CycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CycleError::Provider(ProviderError::Fetch(_)) => ErrorKind::Fetch,
            CycleError::Provider(ProviderError::Malformed(_)) => ErrorKind::MalformedResponse,
            CycleError::Scale(_) => ErrorKind::Scaling,
            CycleError::Publish(e) => e.kind(),
            CycleError::Timeout(_) => ErrorKind::CycleTimeout,
        }
    }
}

/// Drives market check -> fetch -> scale -> submit -> confirm, one cycle at a time.
pub struct Oracle<Pu>
where
    Pu: ChainPublisher,
{
    pub cfg: OracleConfig,
    source: Arc<dyn PriceSource>,
    publisher: Pu,
    clock: Arc<dyn Clock>,
    next_cycle: u64,
}

impl<Pu> Oracle<Pu>
where
    Pu: ChainPublisher,
{
    pub fn new(cfg: &OracleConfig, source: Arc<dyn PriceSource>, publisher: Pu) -> Self {
        Self {
            cfg: cfg.clone(),
            source,
            publisher,
            clock: Arc::new(SystemClock),
            next_cycle: 1,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// One-shot mode: a single cycle, no wait.
    pub async fn run_once(&mut self) -> UpdateAttempt {
        self.run_cycle().await
    }

    /// Run cycles until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// The interval is measured from the end of one cycle to the start of the
    /// next, so cycles never overlap. Shutdown abandons an in-flight cycle.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.cfg.update_interval;
        info!(provider = %self.source.id(), ?interval, "oracle loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.changed() => {
                    warn!("shutdown requested mid-cycle, abandoning it");
                    break;
                }
            }

            debug!("waiting {interval:?} until next cycle");
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("oracle loop stopped");
    }

    pub async fn run_cycle(&mut self) -> UpdateAttempt {
        let cycle_id = self.next_cycle;
        self.next_cycle += 1;
        let started_at = self.clock.now();
        let t0 = Instant::now();
        let mut attempt = UpdateAttempt::new(cycle_id, started_at);

        if !self.cfg.market.is_open(started_at) {
            attempt.outcome = Outcome::Skipped;
            info!(cycle = cycle_id, at = %started_at, "market closed, skipping update");
            self.record(&attempt, t0);
            return attempt;
        }

        let bound = self.cfg.cycle_timeout;
        let result = match timeout(bound, self.update(&mut attempt)).await {
            Ok(r) => r,
            Err(_) => Err(CycleError::Timeout(bound)),
        };

        if let Err(e) = result {
            attempt.outcome = Outcome::Failed;
            attempt.error = Some(e.kind());
            attempt.reason = Some(e.to_string());
            if let CycleError::Publish(pe) = &e {
                attempt.tx_hash = pe.tx_hash().or(attempt.tx_hash);
            }
            match (e.kind(), attempt.tx_hash) {
                (ErrorKind::ConfirmationTimeout, Some(tx)) | (ErrorKind::CycleTimeout, Some(tx)) => error!(
                    cycle = cycle_id,
                    at = %started_at,
                    kind = %e.kind(),
                    tx = %tx,
                    "update sent but not confirmed, nonce state may be pending: {e}"
                ),
                (kind, _) => error!(cycle = cycle_id, at = %started_at, %kind, "update failed: {e}"),
            }
        }
        self.record(&attempt, t0);
        attempt
    }

    async fn update(&self, attempt: &mut UpdateAttempt) -> Result<(), CycleError> {
        let cycle = attempt.cycle_id;
        let at = attempt.started_at;

        let obs = fetch_with_retry(self.source.as_ref(), self.cfg.fetch_retries).await?;
        debug!(cycle, provider = %obs.provider, value = %obs.value, "fetched price");

        let price = scale_by_expo(obs.value, self.cfg.expo, self.cfg.value_type)?;
        attempt.price = Some(price.clone());

        let tx_hash = self.publisher.submit(&price).await?;
        attempt.outcome = Outcome::Sent;
        attempt.tx_hash = Some(tx_hash);
        info!(cycle, at = %at, tx = %tx_hash, raw = %obs.value, price = %price, "sent updatePrice");

        let confirmation = self.publisher.confirm(tx_hash).await?;
        attempt.outcome = Outcome::Confirmed;
        info!(cycle, at = %at, tx = %tx_hash, block = ?confirmation.block_number, "confirmed");
        Ok(())
    }

    #[allow(unused_variables)]
    fn record(&self, attempt: &UpdateAttempt, t0: Instant) {
        #[cfg(feature = "metrics")]
        crate::metrics::observe_cycle(attempt, t0.elapsed());
    }
}
