//! Shared test utilities for the add-on composer workspace.
//!
//! This crate is a dev-dependency only and is never published.
//!
//! # Modules
//!
//! - [`deployer`]: [`RecordingDeployer`], a scriptable [`ChartDeployer`]
//! - [`fixtures`]: descriptor builders and [`TestManifest`] for on-disk
//!   manifests
//!
//! [`ChartDeployer`]: addon_core::ChartDeployer

pub mod deployer;
pub mod fixtures;

pub use deployer::{Behavior, DeployCall, RecordingDeployer, TimelineEntry};
pub use fixtures::{TestManifest, addon, addon_with_values};
