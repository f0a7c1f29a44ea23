//! The chart deployment collaborator
//!
//! Rendering and submitting a chart is outside this crate; the scheduler
//! only needs something that accepts finished values and eventually
//! reports success or failure.

use std::sync::Mutex;

use addon_values::FlatValues;
use addon_values::flatten::to_lines;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::chart::ChartSpec;

/// One deployment handed to a [`ChartDeployer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployRequest {
    pub addon: String,
    pub chart: ChartSpec,
    pub values: FlatValues,
    /// 1-based attempt number
    pub attempt: u32,
}

/// What a successful deployment reports back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentReceipt {
    pub addon: String,
    pub release: String,
    pub namespace: String,
    pub revision: u32,
    pub deployed_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl DeploymentReceipt {
    pub fn for_request(request: &DeployRequest, revision: u32) -> Self {
        Self {
            addon: request.addon.clone(),
            release: request.chart.release_name().to_string(),
            namespace: request.chart.namespace.clone(),
            revision,
            deployed_at: Utc::now(),
            dry_run: false,
        }
    }
}

/// Installs a chart with the given values.
#[async_trait]
pub trait ChartDeployer: Send + Sync {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentReceipt>;
}

/// Logs what would be deployed and records every request.
#[derive(Debug, Default)]
pub struct DryRunDeployer {
    requests: Mutex<Vec<DeployRequest>>,
}

impl DryRunDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<DeployRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChartDeployer for DryRunDeployer {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentReceipt> {
        tracing::info!(
            addon = %request.addon,
            chart = %request.chart.name,
            release = request.chart.release_name(),
            namespace = %request.chart.namespace,
            values = request.values.len(),
            "Dry run: would install chart"
        );
        for line in to_lines(&request.values) {
            tracing::debug!(addon = %request.addon, "  {line}");
        }

        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        requests.push(request.clone());

        Ok(DeploymentReceipt {
            dry_run: true,
            ..DeploymentReceipt::for_request(request, 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> DeployRequest {
        let mut values = FlatValues::new();
        values.insert("image.tag".into(), json!("v2"));
        DeployRequest {
            addon: "backstage".into(),
            chart: ChartSpec::new("backstage")
                .namespace("backstage")
                .release("blueprints-addon-backstage"),
            values,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_dry_run_records_and_marks_receipt() {
        let deployer = DryRunDeployer::new();
        let receipt = deployer.deploy(&request()).await.unwrap();

        assert!(receipt.dry_run);
        assert_eq!(receipt.release, "blueprints-addon-backstage");
        assert_eq!(receipt.namespace, "backstage");
        assert_eq!(deployer.requests(), vec![request()]);
    }
}
