//! Dependency-ordered deployment
//!
//! [`DependencyScheduler`] validates the prerequisite graph, then deploys
//! add-ons so that each one starts only after all of its prerequisites
//! completed. Configuration is composed just before an add-on runs, so
//! resource lookups see everything provisioned up to that point.
//!
//! A failed add-on never stops unrelated branches: its dependents (direct
//! and transitive) are marked failed without running, and everything else
//! proceeds.

mod graph;
mod state;

pub use graph::{DependencyGraph, DeploymentPlan, PlanEntry};
pub use state::{AddOnOutcome, AddOnState, DeploymentReport, FailureReason, ScheduleEvent};

use std::collections::HashMap;
use std::sync::Arc;

use addon_resources::ResourceRegistry;
use serde::{Deserialize, Serialize};
use tokio::task::{self, JoinSet};
use tracing::Instrument;
use uuid::Uuid;

use crate::compose::ConfigCompositor;
use crate::deployer::{ChartDeployer, DeployRequest, DeploymentReceipt};
use crate::descriptor::AddOnDescriptor;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use state::RunState;

/// How many ready add-ons may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One add-on at a time, in plan order
    #[default]
    Sequential,
    /// Every ready add-on starts immediately
    Concurrent,
}

impl std::str::FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(Error::invalid_manifest(format!(
                "unknown execution mode '{other}' (expected sequential or concurrent)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    pub mode: ExecutionMode,
    pub retry: RetryPolicy,
}

/// Result of one deploy task: attempts made and the final outcome.
type TaskOutput = (u32, Result<DeploymentReceipt>);

/// Orders and deploys a set of add-ons.
#[derive(Debug, Clone)]
pub struct DependencyScheduler {
    addons: Vec<AddOnDescriptor>,
    options: SchedulerOptions,
}

impl DependencyScheduler {
    pub fn new(addons: Vec<AddOnDescriptor>) -> Self {
        Self {
            addons,
            options: SchedulerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.options.retry = retry;
        self
    }

    pub fn addons(&self) -> &[AddOnDescriptor] {
        &self.addons
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Validate the prerequisite graph and return the deployment order.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateAddOn`], [`Error::UnresolvedDependency`] or
    /// [`Error::DependencyCycle`]. Nothing is deployed in any of these cases.
    pub fn plan(&self) -> Result<DeploymentPlan> {
        DependencyGraph::build(&self.addons)?.plan()
    }

    /// Deploy every add-on.
    ///
    /// Structural problems in the graph are returned as `Err` before any
    /// add-on starts. Per-add-on failures do not abort the run; they are
    /// reported in the returned [`DeploymentReport`].
    pub async fn run(
        &self,
        registry: &dyn ResourceRegistry,
        deployer: Arc<dyn ChartDeployer>,
    ) -> Result<DeploymentReport> {
        let graph = DependencyGraph::build(&self.addons)?;
        graph.topological_order()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("deployment", %run_id, mode = ?self.options.mode);
        let run = self
            .execute(&graph, registry, deployer)
            .instrument(span)
            .await;
        Ok(run.into_report(run_id))
    }

    async fn execute(
        &self,
        graph: &DependencyGraph,
        registry: &dyn ResourceRegistry,
        deployer: Arc<dyn ChartDeployer>,
    ) -> RunState {
        tracing::info!(addons = self.addons.len(), "Starting deployment");

        let compositor = ConfigCompositor::new(registry);
        let mut run = RunState::new(self.addons.iter().map(|a| a.name.as_str()));
        // Dropping the set aborts every deploy still in flight.
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut dispatched: HashMap<task::Id, usize> = HashMap::new();

        loop {
            self.promote_ready(graph, &mut run);

            let limit = match self.options.mode {
                ExecutionMode::Sequential => 1,
                ExecutionMode::Concurrent => usize::MAX,
            };
            while tasks.len() < limit {
                let Some(index) = (0..self.addons.len()).find(|&i| run.state(i) == AddOnState::Ready)
                else {
                    break;
                };
                if let Some(request) = self.prepare(index, &compositor, graph, &mut run) {
                    let deployer = Arc::clone(&deployer);
                    let retry = self.options.retry.clone();
                    let handle = tasks.spawn(deploy_with_retry(deployer, request, retry).in_current_span());
                    dispatched.insert(handle.id(), index);
                } else {
                    // Composition failed; dependents may now be resolvable.
                    self.promote_ready(graph, &mut run);
                }
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };
            let (id, result) = match joined {
                Ok((id, output)) => (id, Ok(output)),
                Err(join_error) => (join_error.id(), Err(join_error)),
            };
            let Some(index) = dispatched.remove(&id) else {
                continue;
            };
            match result {
                Ok((attempts, Ok(receipt))) => {
                    run.outcomes[index].attempts = attempts;
                    run.outcomes[index].receipt = Some(receipt);
                    run.transition(index, AddOnState::Completed);
                    tracing::info!(addon = %self.addons[index].name, attempts, "Add-on deployed");
                }
                Ok((attempts, Err(error))) => {
                    run.outcomes[index].attempts = attempts;
                    self.fail_with_dependents(
                        index,
                        FailureReason::Deploy {
                            message: error.to_string(),
                        },
                        graph,
                        &mut run,
                    );
                }
                Err(join_error) => {
                    run.outcomes[index].attempts = run.outcomes[index].attempts.max(1);
                    let message = if join_error.is_panic() {
                        format!("deploy task panicked: {join_error}")
                    } else {
                        format!("deploy task cancelled: {join_error}")
                    };
                    self.fail_with_dependents(
                        index,
                        FailureReason::Deploy { message },
                        graph,
                        &mut run,
                    );
                }
            }
        }

        let completed = run
            .outcomes
            .iter()
            .filter(|o| o.is_completed())
            .count();
        tracing::info!(
            completed,
            failed = self.addons.len() - completed,
            "Deployment finished"
        );
        run
    }

    /// Move every pending add-on whose prerequisites all completed to ready.
    fn promote_ready(&self, graph: &DependencyGraph, run: &mut RunState) {
        for index in 0..self.addons.len() {
            if run.state(index) == AddOnState::Pending
                && graph
                    .prerequisites_of(index)
                    .iter()
                    .all(|&p| run.state(p) == AddOnState::Completed)
            {
                run.transition(index, AddOnState::Ready);
            }
        }
    }

    /// Compose values for a ready add-on and mark it running. On a
    /// composition error the add-on and its dependents fail instead.
    fn prepare(
        &self,
        index: usize,
        compositor: &ConfigCompositor<'_>,
        graph: &DependencyGraph,
        run: &mut RunState,
    ) -> Option<DeployRequest> {
        let addon = &self.addons[index];
        match compositor.compose_addon(addon) {
            Ok(values) => {
                tracing::debug!(addon = %addon.name, values = values.len(), "Composed values");
                run.outcomes[index].values = Some(values.clone());
                run.transition(index, AddOnState::Running);
                Some(DeployRequest {
                    addon: addon.name.clone(),
                    chart: addon.chart.clone(),
                    values,
                    attempt: 1,
                })
            }
            Err(error) => {
                self.fail_with_dependents(index, FailureReason::from_compose(&error), graph, run);
                None
            }
        }
    }

    fn fail_with_dependents(
        &self,
        index: usize,
        reason: FailureReason,
        graph: &DependencyGraph,
        run: &mut RunState,
    ) {
        run.fail(index, reason);
        let prerequisite = &self.addons[index].name;
        for dependent in graph.transitive_dependents(index) {
            if !run.state(dependent).is_terminal() {
                run.fail(
                    dependent,
                    FailureReason::PrerequisiteFailed {
                        prerequisite: prerequisite.clone(),
                    },
                );
            }
        }
    }
}

/// Call the deployer until it succeeds or the retry policy runs out.
async fn deploy_with_retry(
    deployer: Arc<dyn ChartDeployer>,
    mut request: DeployRequest,
    retry: RetryPolicy,
) -> TaskOutput {
    let mut backoff = retry.backoff();
    loop {
        tracing::debug!(addon = %request.addon, attempt = request.attempt, "Deploying add-on");
        match deployer.deploy(&request).await {
            Ok(receipt) => return (request.attempt, Ok(receipt)),
            Err(error) => match backoff.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        addon = %request.addon,
                        attempt = request.attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Deploy failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    request.attempt += 1;
                }
                None => return (request.attempt, Err(error)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartSpec;
    use crate::deployer::DryRunDeployer;
    use addon_resources::InMemoryRegistry;

    fn addon(name: &str, prerequisites: &[&str]) -> AddOnDescriptor {
        AddOnDescriptor::new(name, ChartSpec::new(name)).with_prerequisites(prerequisites.iter().copied())
    }

    #[test]
    fn test_plan_orders_prerequisites_first() {
        let scheduler = DependencyScheduler::new(vec![addon("b", &["a"]), addon("a", &[])]);
        assert_eq!(scheduler.plan().unwrap().names(), vec!["a", "b"]);
    }

    #[test]
    fn test_execution_mode_parse() {
        assert_eq!("Concurrent".parse::<ExecutionMode>().unwrap(), ExecutionMode::Concurrent);
        assert!("parallel".parse::<ExecutionMode>().is_err());
    }

    #[tokio::test]
    async fn test_run_with_dry_run_deployer() {
        let scheduler = DependencyScheduler::new(vec![addon("b", &["a"]), addon("a", &[])]);
        let deployer = Arc::new(DryRunDeployer::new());

        let report = scheduler
            .run(&InMemoryRegistry::new(), deployer.clone())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.start_order(), vec!["a", "b"]);
        let seen: Vec<String> = deployer.requests().into_iter().map(|r| r.addon).collect();
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_deploying() {
        let scheduler = DependencyScheduler::new(vec![addon("a", &["b"]), addon("b", &["a"])]);
        let deployer = Arc::new(DryRunDeployer::new());

        let err = scheduler
            .run(&InMemoryRegistry::new(), deployer.clone())
            .await
            .unwrap_err();

        assert!(err.is_structural());
        assert!(deployer.requests().is_empty());
    }
}
