//! Provisioned-resource lookup for Add-on Composer.
//!
//! Computed configuration values come from resources created earlier by the
//! provisioning layer (databases, secrets, hosted zones, certificates).
//! This crate defines the read-only surface the compositor consumes.

pub mod error;
pub mod handle;
pub mod registry;

pub use error::{Error, Result};
pub use handle::{Endpoint, ResourceHandle, SecretRef};
pub use registry::{InMemoryRegistry, ResourceRegistry};
