//! Typed add-on views
//!
//! A typed view turns domain options into a generic [`AddOnDescriptor`]:
//! its prerequisites, chart coordinates and three configuration layers.

pub mod backstage;

pub use backstage::{BackstageAddOn, BackstageOptions};

use crate::descriptor::AddOnDescriptor;
use crate::error::Result;

/// Well-known add-on names used as prerequisites.
pub const EBS_CSI_DRIVER: &str = "ebs-csi-driver";
pub const SECRETS_STORE: &str = "secrets-store";

/// Something that can describe itself as an add-on.
pub trait TypedAddOn {
    fn name(&self) -> &str;

    fn descriptor(&self) -> Result<AddOnDescriptor>;
}

impl TypedAddOn for BackstageAddOn {
    fn name(&self) -> &str {
        BackstageAddOn::name(self)
    }

    fn descriptor(&self) -> Result<AddOnDescriptor> {
        BackstageAddOn::descriptor(self)
    }
}
