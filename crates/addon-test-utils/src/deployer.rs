//! [`RecordingDeployer`]: a chart deployer whose outcome is scripted per
//! add-on and which records every call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use addon_core::{ChartDeployer, DeployRequest, DeploymentReceipt, Error, Result};
use addon_values::FlatValues;
use async_trait::async_trait;

/// What the deployer does for one add-on.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Succeed,
    /// Fail the first `n` attempts, then succeed
    FailTimes(u32),
    /// Fail every attempt with this message
    Fail(String),
    /// Panic inside the deploy call
    Panic,
}

/// One call to [`RecordingDeployer::deploy`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeployCall {
    pub addon: String,
    pub attempt: u32,
    pub values: FlatValues,
}

/// Start or end of a deploy call, in wall-clock order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    Started(String),
    Finished(String),
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<DeployCall>,
    timeline: Vec<TimelineEntry>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Scriptable [`ChartDeployer`] for scheduler tests.
///
/// # Example
///
/// ```rust,no_run
/// use addon_test_utils::{Behavior, RecordingDeployer};
/// use std::time::Duration;
///
/// let deployer = RecordingDeployer::new()
///     .with_behavior("db", Behavior::Fail("quota exceeded".into()))
///     .with_delay("web", Duration::from_millis(50));
/// ```
#[derive(Debug, Default)]
pub struct RecordingDeployer {
    behaviors: HashMap<String, Behavior>,
    delays: HashMap<String, Duration>,
    recorded: Mutex<Recorded>,
}

impl RecordingDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(mut self, addon: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(addon.to_string(), behavior);
        self
    }

    /// Sleep this long inside every deploy of `addon`.
    pub fn with_delay(mut self, addon: &str, delay: Duration) -> Self {
        self.delays.insert(addon.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<DeployCall> {
        self.lock().calls.clone()
    }

    /// Add-ons in the order their first attempt started.
    pub fn deploy_order(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.attempt == 1)
            .map(|c| c.addon.clone())
            .collect()
    }

    pub fn attempts(&self, addon: &str) -> u32 {
        self.lock().calls.iter().filter(|c| c.addon == addon).count() as u32
    }

    pub fn was_deployed(&self, addon: &str) -> bool {
        self.attempts(addon) > 0
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.lock().timeline.clone()
    }

    /// Most deploy calls ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self, addon: &str) {
        let mut recorded = self.lock();
        recorded.in_flight -= 1;
        recorded.timeline.push(TimelineEntry::Finished(addon.to_string()));
    }
}

#[async_trait]
impl ChartDeployer for RecordingDeployer {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentReceipt> {
        {
            let mut recorded = self.lock();
            recorded.calls.push(DeployCall {
                addon: request.addon.clone(),
                attempt: request.attempt,
                values: request.values.clone(),
            });
            recorded.timeline.push(TimelineEntry::Started(request.addon.clone()));
            recorded.in_flight += 1;
            recorded.max_in_flight = recorded.max_in_flight.max(recorded.in_flight);
        }

        if let Some(delay) = self.delays.get(&request.addon) {
            tokio::time::sleep(*delay).await;
        }

        let behavior = self
            .behaviors
            .get(&request.addon)
            .cloned()
            .unwrap_or(Behavior::Succeed);
        self.finish(&request.addon);

        match behavior {
            Behavior::Succeed => Ok(DeploymentReceipt::for_request(request, request.attempt)),
            Behavior::FailTimes(n) if request.attempt > n => {
                Ok(DeploymentReceipt::for_request(request, request.attempt))
            }
            Behavior::FailTimes(_) => Err(Error::DeployFailure {
                addon: request.addon.clone(),
                message: format!("transient failure on attempt {}", request.attempt),
            }),
            Behavior::Fail(message) => Err(Error::DeployFailure {
                addon: request.addon.clone(),
                message,
            }),
            Behavior::Panic => panic!("deployer exploded while installing {}", request.addon),
        }
    }
}
