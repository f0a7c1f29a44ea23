//! Add-on configuration composition and dependency-ordered deployment.
//!
//! - [`compose`]: merge defaults, computed values and overrides into the
//!   flat values a chart deployer consumes
//! - [`scheduler`]: order add-ons by prerequisites and deploy them,
//!   sequentially or concurrently
//! - [`config`]: TOML deployment manifests and layered value files
//! - [`addons`]: typed views such as Backstage
//!
//! # Example
//!
//! ```
//! use addon_core::{AddOnDescriptor, ChartSpec, DependencyScheduler};
//!
//! let scheduler = DependencyScheduler::new(vec![
//!     AddOnDescriptor::new("backstage", ChartSpec::new("backstage"))
//!         .with_prerequisites(["ebs-csi-driver"]),
//!     AddOnDescriptor::new("ebs-csi-driver", ChartSpec::new("aws-ebs-csi-driver")),
//! ]);
//!
//! let plan = scheduler.plan().unwrap();
//! assert_eq!(plan.names(), vec!["ebs-csi-driver", "backstage"]);
//! ```

pub mod addons;
pub mod chart;
pub mod compose;
pub mod config;
pub mod deployer;
pub mod descriptor;
pub mod error;
pub mod retry;
pub mod scheduler;

pub use chart::ChartSpec;
pub use compose::{ConfigCompositor, compose};
pub use config::{DeploymentManifest, ManifestResolver, ResolvedDeployment};
pub use deployer::{ChartDeployer, DeployRequest, DeploymentReceipt, DryRunDeployer};
pub use descriptor::{AddOnDescriptor, ComputedValues, Requirement, ValueBinding};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use scheduler::{
    AddOnOutcome, AddOnState, DependencyScheduler, DeploymentPlan, DeploymentReport,
    ExecutionMode, FailureReason, SchedulerOptions,
};
