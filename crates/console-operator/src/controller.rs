//! Event-driven sync scheduling.
//!
//! A [`Controller`] owns one [`SyncHandler`] and any number of filtered event
//! sources. Events that pass their group's filter wake the controller; wake-ups
//! that arrive while a cycle is queued or running collapse into one follow-up
//! cycle. Failed cycles are retried with exponential backoff, and an optional
//! resync interval runs the handler even when nothing changed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use console_operator_client::{EventRecorder, ObjectRef, TracingRecorder};
use futures_util::FutureExt;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::OperatorError;
use crate::filter::EventFilterFn;

/// Why a sync cycle was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    Startup,
    Event,
    Resync,
    Retry,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Event => write!(f, "event"),
            Self::Resync => write!(f, "resync"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// Per-cycle information handed to the sync handler.
pub struct SyncContext {
    pub controller: String,
    pub reason: TriggerReason,
    /// 1 for a fresh cycle, incremented on every consecutive retry.
    pub attempt: u32,
    pub recorder: Arc<dyn EventRecorder>,
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("controller", &self.controller)
            .field("reason", &self.reason)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// The single entry point a controller drives.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn sync(&self, ctx: &SyncContext) -> Result<(), OperatorError>;
}

/// Exponential retry delay: `base * 2^(failures - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(60),
        }
    }
}

/// Counters returned when a controller stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Completed cycles, successful or not.
    pub cycles: u64,
    pub failures: u64,
}

struct EventSourceGroup {
    filter: EventFilterFn,
    sources: Vec<BoxStream<'static, ObjectRef>>,
}

/// Builder for [`Controller`].
pub struct ControllerBuilder {
    name: String,
    groups: Vec<EventSourceGroup>,
    resync_interval: Option<Duration>,
    backoff: BackoffPolicy,
    handler: Option<Arc<dyn SyncHandler>>,
    recorder: Option<Arc<dyn EventRecorder>>,
}

impl ControllerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            resync_interval: None,
            backoff: BackoffPolicy::default(),
            handler: None,
            recorder: None,
        }
    }

    /// Adds event sources whose notifications only count when `filter`
    /// accepts the object.
    pub fn with_filtered_event_sources(
        mut self,
        filter: EventFilterFn,
        sources: Vec<BoxStream<'static, ObjectRef>>,
    ) -> Self {
        self.groups.push(EventSourceGroup { filter, sources });
        self
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_sync(mut self, handler: Arc<dyn SyncHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Overrides the recorder passed to the handler. Defaults to a
    /// [`TracingRecorder`] named after the controller.
    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn build(self) -> Result<Controller, OperatorError> {
        if self.name.is_empty() {
            return Err(OperatorError::setup("controller name must not be empty"));
        }
        let Some(handler) = self.handler else {
            return Err(OperatorError::setup(format!(
                "controller {} has no sync handler",
                self.name
            )));
        };
        let recorder = self.recorder.unwrap_or_else(|| {
            let component = format!("{}-controller", self.name.to_lowercase());
            Arc::new(TracingRecorder::new(component))
        });

        Ok(Controller {
            name: self.name,
            groups: self.groups,
            resync_interval: self.resync_interval,
            backoff: self.backoff,
            handler,
            recorder,
        })
    }
}

/// Runs one sync handler in response to events, resyncs and retries.
/// At most one cycle is in flight at any time.
pub struct Controller {
    name: String,
    groups: Vec<EventSourceGroup>,
    resync_interval: Option<Duration>,
    backoff: BackoffPolicy,
    handler: Arc<dyn SyncHandler>,
    recorder: Arc<dyn EventRecorder>,
}

impl Controller {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drives the handler until `token` is cancelled. A cycle in flight at
    /// that moment is dropped.
    pub async fn run(self, token: CancellationToken) -> ControllerStats {
        info!(controller = %self.name, "starting controller");

        let wake = Arc::new(Notify::new());
        let mut forwarders = JoinSet::new();
        for group in self.groups {
            for stream in group.sources {
                forwarders.spawn(forward_events(
                    stream,
                    group.filter.clone(),
                    wake.clone(),
                    token.clone(),
                ));
            }
        }

        let mut stats = ControllerStats::default();
        let mut reason = TriggerReason::Startup;
        let mut failures: u32 = 0;

        loop {
            // This cycle observes everything that happened up to now.
            let _ = wake.notified().now_or_never();

            let ctx = SyncContext {
                controller: self.name.clone(),
                reason,
                attempt: failures + 1,
                recorder: self.recorder.clone(),
            };
            trace!(
                controller = %self.name,
                reason = %reason,
                attempt = ctx.attempt,
                "sync triggered"
            );

            let result = tokio::select! {
                _ = token.cancelled() => Err(OperatorError::Cancelled),
                result = self.handler.sync(&ctx) => result,
            };

            match result {
                Err(OperatorError::Cancelled) => break,
                Ok(()) => {
                    stats.cycles += 1;
                    failures = 0;
                }
                Err(e) => {
                    stats.cycles += 1;
                    stats.failures += 1;
                    failures = failures.saturating_add(1);
                    let delay = self.backoff.delay(failures);
                    warn!(
                        controller = %self.name,
                        error = %e,
                        error_kind = e.kind(),
                        attempt = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "sync failed"
                    );
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    reason = TriggerReason::Retry;
                    continue;
                }
            }

            reason = tokio::select! {
                _ = token.cancelled() => break,
                _ = wake.notified() => TriggerReason::Event,
                _ = resync(self.resync_interval) => TriggerReason::Resync,
            };
        }

        forwarders.shutdown().await;
        info!(
            controller = %self.name,
            cycles = stats.cycles,
            failures = stats.failures,
            "controller stopped"
        );
        stats
    }
}

async fn resync(interval: Option<Duration>) {
    match interval {
        Some(interval) => tokio::time::sleep(interval).await,
        None => std::future::pending().await,
    }
}

async fn forward_events(
    mut stream: BoxStream<'static, ObjectRef>,
    filter: EventFilterFn,
    wake: Arc<Notify>,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return,
            next = stream.next() => next,
        };
        match next {
            Some(object) if filter(&object) => {
                debug!(object = %object, "change accepted");
                wake.notify_one();
            }
            Some(object) => trace!(object = %object, "change filtered out"),
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(5), Duration::from_secs(1));
        assert_eq!(policy.delay(64), Duration::from_secs(1));
    }

    #[test]
    fn test_build_requires_handler() {
        let err = ControllerBuilder::new("Console").build().err().unwrap();
        assert!(matches!(err, OperatorError::Setup(_)));
    }
}
