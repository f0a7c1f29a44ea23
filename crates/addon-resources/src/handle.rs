//! Opaque handles to provisioned resources
//!
//! The provisioning layer decides what a resource is; add-on configuration
//! only reads named attributes off the handle. Attribute names are paths
//! into the handle's attribute tree, so nested attributes
//! (`connection.host`) work the same as flat ones.

use addon_values::{ConfigNode, ConfigPath, get_path, set_path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Attribute holding a hostname.
pub const HOST: &str = "host";
/// Attribute holding a port number.
pub const PORT: &str = "port";
/// Attribute naming the secret that holds a credential.
pub const SECRET_NAME: &str = "secretName";
/// Attribute naming the key inside that secret.
pub const SECRET_KEY: &str = "secretKey";

/// A network endpoint read from a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: Option<u16>,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Reference to a credential stored in a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub name: String,
    pub key: Option<String>,
}

/// Read-only view of a provisioned resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceHandle {
    name: String,
    #[serde(default)]
    kind: String,
    #[serde(default = "empty_attributes")]
    attributes: ConfigNode,
}

fn empty_attributes() -> ConfigNode {
    Value::Object(Map::new())
}

impl ResourceHandle {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            attributes: empty_attributes(),
        }
    }

    /// Build a handle around an existing attribute tree.
    ///
    /// Non-mapping trees are wrapped as `{"value": tree}`.
    pub fn with_attributes(
        name: impl Into<String>,
        kind: impl Into<String>,
        attributes: ConfigNode,
    ) -> Self {
        let attributes = match attributes {
            Value::Object(_) => attributes,
            other => serde_json::json!({ "value": other }),
        };
        Self {
            name: name.into(),
            kind: kind.into(),
            attributes,
        }
    }

    /// Set an attribute, builder style.
    ///
    /// # Errors
    ///
    /// Fails if `attribute` is not a valid path or walks through a scalar.
    pub fn attribute_set(mut self, attribute: &str, value: impl Into<Value>) -> Result<Self> {
        let path = ConfigPath::parse(attribute)?;
        set_path(&mut self.attributes, &path, value.into())?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The whole attribute tree.
    pub fn attributes(&self) -> &ConfigNode {
        &self.attributes
    }

    /// Look up an attribute by path. `None` if absent or unparsable.
    pub fn attribute(&self, attribute: &str) -> Option<&Value> {
        let path = ConfigPath::parse(attribute).ok()?;
        self.attribute_at(&path)
    }

    /// Look up an attribute by parsed path.
    pub fn attribute_at(&self, path: &ConfigPath) -> Option<&Value> {
        get_path(&self.attributes, path).filter(|v| !v.is_null())
    }

    /// Required attribute, any shape.
    pub fn require(&self, attribute: &str) -> Result<&Value> {
        self.attribute(attribute).ok_or_else(|| Error::AttributeMissing {
            resource: self.name.clone(),
            attribute: attribute.to_string(),
        })
    }

    pub fn str_attr(&self, attribute: &str) -> Result<&str> {
        self.require(attribute)?
            .as_str()
            .ok_or_else(|| self.type_error(attribute, "a string"))
    }

    /// Unsigned integer attribute; numeric strings are accepted.
    pub fn u64_attr(&self, attribute: &str) -> Result<u64> {
        let value = self.require(attribute)?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| self.type_error(attribute, "an unsigned integer"))
    }

    pub fn bool_attr(&self, attribute: &str) -> Result<bool> {
        self.require(attribute)?
            .as_bool()
            .ok_or_else(|| self.type_error(attribute, "a boolean"))
    }

    /// The `host`/`port` pair of this resource.
    pub fn endpoint(&self) -> Result<Endpoint> {
        let host = self.str_attr(HOST)?.to_string();
        let port = match self.attribute(PORT) {
            None => None,
            Some(_) => {
                let port = self.u64_attr(PORT)?;
                Some(u16::try_from(port).map_err(|_| self.type_error(PORT, "a port number"))?)
            }
        };
        Ok(Endpoint { host, port })
    }

    /// The `secretName`/`secretKey` pair of this resource.
    pub fn secret(&self) -> Result<SecretRef> {
        let name = self.str_attr(SECRET_NAME)?.to_string();
        let key = match self.attribute(SECRET_KEY) {
            None => None,
            Some(_) => Some(self.str_attr(SECRET_KEY)?.to_string()),
        };
        Ok(SecretRef { name, key })
    }

    fn type_error(&self, attribute: &str, expected: &'static str) -> Error {
        Error::AttributeType {
            resource: self.name.clone(),
            attribute: attribute.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn database() -> ResourceHandle {
        ResourceHandle::with_attributes(
            "backstage-db",
            "rds-instance",
            json!({
                "host": "db.internal",
                "port": 5432,
                "database": "backstage",
                "secretName": "backstage-db-credentials",
                "connection": {"ssl": true}
            }),
        )
    }

    #[test]
    fn test_str_attr() {
        assert_eq!(database().str_attr("database").unwrap(), "backstage");
    }

    #[test]
    fn test_nested_attribute() {
        assert!(database().bool_attr("connection.ssl").unwrap());
    }

    #[test]
    fn test_missing_attribute() {
        let err = database().str_attr("username").unwrap_err();
        assert_eq!(
            err,
            Error::AttributeMissing {
                resource: "backstage-db".to_string(),
                attribute: "username".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_type() {
        assert!(matches!(
            database().str_attr("port"),
            Err(Error::AttributeType { expected: "a string", .. })
        ));
    }

    #[test]
    fn test_u64_accepts_numeric_string() {
        let handle = ResourceHandle::new("x", "y").attribute_set("port", "8080").unwrap();
        assert_eq!(handle.u64_attr("port").unwrap(), 8080);
    }

    #[test]
    fn test_endpoint() {
        let endpoint = database().endpoint().unwrap();
        assert_eq!(endpoint.host, "db.internal");
        assert_eq!(endpoint.port, Some(5432));
        assert_eq!(endpoint.to_string(), "db.internal:5432");
    }

    #[test]
    fn test_endpoint_port_out_of_range() {
        let handle = ResourceHandle::new("x", "y")
            .attribute_set("host", "h")
            .unwrap()
            .attribute_set("port", 70000)
            .unwrap();
        assert!(handle.endpoint().is_err());
    }

    #[test]
    fn test_secret_without_key() {
        let secret = database().secret().unwrap();
        assert_eq!(secret.name, "backstage-db-credentials");
        assert_eq!(secret.key, None);
    }

    #[test]
    fn test_null_attribute_counts_as_missing() {
        let handle = ResourceHandle::with_attributes("x", "y", json!({"host": null}));
        assert!(handle.attribute("host").is_none());
    }

    #[test]
    fn test_scalar_attributes_wrapped() {
        let handle = ResourceHandle::with_attributes("zone", "hosted-zone", json!("example.com"));
        assert_eq!(handle.str_attr("value").unwrap(), "example.com");
    }

    #[test]
    fn test_attribute_set_rejects_malformed_path() {
        let err = ResourceHandle::new("db", "rds-instance")
            .attribute_set("connection..host", "db.internal")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Values(addon_values::Error::InvalidPath { .. })
        ));
    }
}
