use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::MetadataError;

/// Directory searched for the properties file when none is given
pub const DEFAULT_PROPERTIES_DIR: &str = ".";
/// Properties file name when none is given
pub const DEFAULT_PROPERTIES_FILE: &str = "mama.yaml";

/// Connection parameters for one named transport
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransportParams {
    /// Broker URL (e.g., "nats://localhost:4222")
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Name the broker shows for this connection
    #[serde(default)]
    pub client_name: Option<String>,
}

impl TransportParams {
    /// Check credentials are consistent and the URL parses.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if let Some(ref raw) = self.url {
            url::Url::parse(raw).map_err(|e| MetadataError::InvalidUrl {
                url: raw.clone(),
                reason: e.to_string(),
            })?;
        }
        match (&self.username, &self.password) {
            (Some(_), None) => {
                return Err(MetadataError::Validation(
                    "username given without password".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(MetadataError::Validation(
                    "password given without username".to_string(),
                ))
            }
            _ => {}
        }
        if self.username.is_some() && self.token.is_some() {
            return Err(MetadataError::Validation(
                "username/password and token are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub transports: HashMap<String, TransportParams>,
}

/// Properties file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bridges: HashMap<String, BridgeConfig>,
}

impl Properties {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        let props: Properties = serde_yaml::from_str(&content)?;
        props.validate()?;
        Ok(props)
    }

    /// Load `<dir>/<file>`
    pub fn load_from(dir: &Path, file: &str) -> Result<Self, MetadataError> {
        Self::load(&Self::resolve_path(dir, file))
    }

    pub fn resolve_path(dir: &Path, file: &str) -> PathBuf {
        dir.join(file)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        for (bridge, config) in &self.bridges {
            for (transport, params) in &config.transports {
                params.validate().map_err(|e| {
                    MetadataError::Validation(format!(
                        "bridges.{}.transports.{}: {}",
                        bridge, transport, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Parameters for `transport` on `bridge`, if the file has a section for it
    pub fn transport(&self, bridge: &str, transport: &str) -> Option<&TransportParams> {
        self.bridges.get(bridge)?.transports.get(transport)
    }
}
