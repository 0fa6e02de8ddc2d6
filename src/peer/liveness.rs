//! Failure Detector
//!
//! One independent loop per monitored peer. Each cycle sends a
//! `Liveness Request` and expects a `Liveness Reply` echoing the probe's
//! timestamp and requester together with the target's own address. Three
//! consecutive failed cycles (refused connection, missing, malformed or
//! mismatched reply) and the peer is reported dead: removed from the view
//! and announced to every seed.

use std::sync::Arc;
use std::time::Duration;

use super::view::PeerView;
use crate::config::{NodeConfig, SeedSet};
use crate::event_log::EventLog;
use crate::protocol::{DeadNodeReport, Endpoint, LivenessReply, LivenessRequest};
use crate::shutdown::Shutdown;
use crate::transport;

/// Result of a single probe/reply cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Alive,
    Unreachable,
    BadReply(String),
}

/// Where a session stands after recording a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    Suspect { failures: u32 },
    Dead,
}

/// Consecutive-failure bookkeeping for one monitored peer.
#[derive(Debug, Clone)]
pub struct LivenessSession {
    failures: u32,
    threshold: u32,
}

impl LivenessSession {
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record(&mut self, result: &ProbeResult) -> Verdict {
        match result {
            ProbeResult::Alive => {
                self.failures = 0;
                Verdict::Healthy
            }
            ProbeResult::Unreachable | ProbeResult::BadReply(_) => {
                self.failures += 1;
                if self.failures >= self.threshold {
                    Verdict::Dead
                } else {
                    Verdict::Suspect {
                        failures: self.failures,
                    }
                }
            }
        }
    }
}

/// Sends one probe to `target` and checks the reply against it.
pub async fn probe(local: &Endpoint, target: &Endpoint, timeout: Duration) -> ProbeResult {
    let request = LivenessRequest::new(local.clone());

    let reply = match tokio::time::timeout(timeout, transport::exchange(target, &request.encode()))
        .await
    {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            tracing::debug!("Probe of {} failed: {}", target, e);
            return ProbeResult::Unreachable;
        }
        Err(_) => return ProbeResult::BadReply("timed out".to_string()),
    };

    match LivenessReply::parse(&reply) {
        Ok(reply) if reply.answers(&request, target) => ProbeResult::Alive,
        Ok(reply) => ProbeResult::BadReply(format!("mismatched reply {}", reply.encode())),
        Err(e) => ProbeResult::BadReply(format!("{}: {:?}", e, reply)),
    }
}

/// How a detector loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorExit {
    Reported,
    Cancelled,
}

pub struct FailureDetector {
    local: Endpoint,
    target: Endpoint,
    seeds: SeedSet,
    view: Arc<PeerView>,
    log: EventLog,
    config: NodeConfig,
}

impl FailureDetector {
    pub fn new(
        local: Endpoint,
        target: Endpoint,
        seeds: SeedSet,
        view: Arc<PeerView>,
        log: EventLog,
        config: NodeConfig,
    ) -> Self {
        Self {
            local,
            target,
            seeds,
            view,
            log,
            config,
        }
    }

    pub fn target(&self) -> &Endpoint {
        &self.target
    }

    /// Probes until the target is declared dead or shutdown is requested.
    pub async fn run(self, mut shutdown: Shutdown) -> DetectorExit {
        let mut session = LivenessSession::new(self.config.failure_threshold);

        loop {
            let result = tokio::select! {
                result = probe(&self.local, &self.target, self.config.probe_timeout()) => result,
                _ = shutdown.triggered() => return DetectorExit::Cancelled,
            };

            match session.record(&result) {
                Verdict::Healthy => {
                    tracing::trace!("{} is alive", self.target);
                }
                Verdict::Suspect { failures } => {
                    tracing::debug!(
                        "{} failed probe {}/{}: {:?}",
                        self.target,
                        failures,
                        self.config.failure_threshold,
                        result
                    );
                }
                Verdict::Dead => {
                    self.report().await;
                    return DetectorExit::Reported;
                }
            }

            if !shutdown.sleep(self.config.liveness_interval()).await {
                return DetectorExit::Cancelled;
            }
        }
    }

    /// Drops the target from the view and tells every seed.
    async fn report(&self) {
        if !self.view.remove(&self.target).await {
            tracing::debug!("{} was not in the view", self.target);
        }

        self.log
            .record(format!("Reporting Dead Node {}", self.target))
            .await;

        let report = DeadNodeReport::new(self.target.clone(), self.local.clone()).encode();
        for seed in self.seeds.endpoints() {
            let seed = seed.clone();
            let report = report.clone();
            tokio::spawn(async move {
                if let Err(e) = transport::notify(&seed, &report).await {
                    tracing::debug!("Dead-node report to seed {} failed: {}", seed, e);
                }
            });
        }
    }
}
