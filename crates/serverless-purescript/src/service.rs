//! The host service configuration, as resolved by the Serverless framework.
//!
//! The framework hands plugins a live object graph. Here it arrives as the
//! JSON produced by `serverless print --format json`, and the function table
//! keeps the host's key order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field on a function definition naming the compiled PureScript value.
pub const PURESCRIPT_FIELD: &str = "purescript";

/// Field on a function definition holding the invocation target.
pub const HANDLER_FIELD: &str = "handler";

/// Resolved service configuration plus the directory it was deployed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Function name to definition object, in declaration order.
    #[serde(default)]
    pub functions: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,

    /// Everything else the host declared; written back untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,

    #[serde(skip)]
    pub service_path: PathBuf,
}

/// Plugin settings read from the service's `custom` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Any truthy value enables payload logging, as the host's own config does.
    #[serde(default, deserialize_with = "truthy")]
    pub purescript_debug: bool,

    /// Replacement compiler command; `{genDir}` expands to the generated
    /// source directory.
    #[serde(default)]
    pub purescript_compiler: Option<Vec<String>>,
}

fn truthy<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

impl Service {
    /// Parse a service definition from JSON text.
    pub fn from_json(json: &str, service_path: impl Into<PathBuf>) -> Result<Self> {
        let mut service: Service = serde_json::from_str(json)?;
        service.service_path = service_path.into();
        Ok(service)
    }

    /// Load a service definition from a file on disk.
    pub fn load(config: impl AsRef<Path>, service_path: impl Into<PathBuf>) -> Result<Self> {
        let config = config.as_ref();
        if !config.exists() {
            return Err(Error::config(config, "file not found"));
        }

        let contents =
            std::fs::read_to_string(config).map_err(|e| Error::filesystem(config, e))?;

        Self::from_json(&contents, service_path)
            .map_err(|e| Error::config(config, e.to_string()))
    }

    /// Plugin settings; absent keys fall back to their defaults.
    pub fn settings(&self) -> Result<Settings> {
        match &self.custom {
            Some(custom) => {
                let settings = Settings::deserialize(Value::Object(custom.clone()))?;
                Ok(settings)
            }
            None => Ok(Settings::default()),
        }
    }

    /// Current invocation target of a function, if it has one.
    pub fn handler(&self, name: &str) -> Option<&str> {
        self.functions
            .get(name)
            .and_then(|def| def.get(HANDLER_FIELD))
            .and_then(Value::as_str)
    }

    /// Serialize back to JSON, including any applied handler patch.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
