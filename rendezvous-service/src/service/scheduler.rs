//! Deadline-driven pool closing. Every scan interval, pools past their
//! reveal deadline are scheduled for a randomized privacy delay, then
//! closed, detected, and (for ephemeral pools) purged. A per-process
//! in-flight set keeps two delayed-close jobs off the same pool.

use log::{info, warn};
use rand::rngs::OsRng;
use rand::Rng;
use rendezvous_core::application::Rendezvous;
use rendezvous_core::domain::pool::PoolStatus;
use rendezvous_core::foundation::{now_millis, PoolId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

pub struct AutoCloseScheduler {
    facade: Arc<Rendezvous>,
    scan_interval: Duration,
    privacy_delay_secs: (u64, u64),
    in_flight: Arc<Mutex<HashSet<PoolId>>>,
}

impl AutoCloseScheduler {
    pub fn new(facade: Arc<Rendezvous>, scan_interval: Duration, privacy_delay_secs: (u64, u64)) -> Self {
        Self { facade, scan_interval, privacy_delay_secs, in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => self.scan().await,
                }
            }
        })
    }

    async fn scan(&self) {
        let now = now_millis();

        if let Err(err) = self.facade.psi().expire_stale(now) {
            warn!("psi expiry sweep failed error={}", err);
        }

        let pools = match self.facade.list_pools() {
            Ok(pools) => pools,
            Err(err) => {
                warn!("deadline scan failed error={}", err);
                return;
            }
        };

        for pool in pools {
            if pool.status == PoolStatus::Closed || now < pool.reveal_deadline_ms {
                continue;
            }
            match self.facade.match_result(&pool.pool_id) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(err) => {
                    warn!("result lookup failed pool_id={} error={}", pool.pool_id, err);
                    continue;
                }
            }

            {
                let mut in_flight = self.in_flight.lock().await;
                if !in_flight.insert(pool.pool_id) {
                    continue;
                }
            }

            let facade = Arc::clone(&self.facade);
            let in_flight = Arc::clone(&self.in_flight);
            let (min_secs, max_secs) = self.privacy_delay_secs;
            tokio::spawn(async move {
                // Privacy delay: decorrelate result publication from the
                // deadline instant.
                let delay = if max_secs > 0 { OsRng.gen_range(min_secs..=max_secs) } else { 0 };
                info!("pool past deadline pool_id={} privacy_delay_secs={}", pool.pool_id, delay);
                tokio::time::sleep(Duration::from_secs(delay)).await;

                if let Err(err) = facade.pools().force_close(&pool.pool_id) {
                    warn!("auto close failed pool_id={} error={}", pool.pool_id, err);
                } else {
                    match facade.detect_matches(&pool.pool_id).await {
                        Ok(result) => info!(
                            "auto detection complete pool_id={} matched={}",
                            pool.pool_id,
                            result.matched_tokens.len()
                        ),
                        Err(err) => warn!("auto detection failed pool_id={} error={}", pool.pool_id, err),
                    }
                }

                in_flight.lock().await.remove(&pool.pool_id);
            });
        }
    }
}
