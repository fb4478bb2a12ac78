//! Gateway configuration.
//!
//! A [`GatewayConfig`] is plain data, usually loaded from JSON:
//!
//! ```json
//! {
//!   "name": "fleet",
//!   "retry_limit": 2,
//!   "default_workspace": "main",
//!   "time_to_expire_ms": 60000,
//!   "workspaces": [{
//!     "name": "main",
//!     "projections": [
//!       { "source_name": "cars", "rules": ["/ => /"] },
//!       { "source_name": "planes", "workspace_name": "live", "read_only": true,
//!         "rules": ["/Aircraft => /"] }
//!     ],
//!     "cache": { "projection": { "source_name": "cache", "rules": ["/ => /"] },
//!                "time_to_expire_ms": 5000 }
//!   }]
//! }
//! ```

use std::collections::BTreeMap;

use fedstore_core::Error;
use serde::{Deserialize, Deserializer, Serialize};

use crate::pool::DEFAULT_MAX_WORKERS;
use crate::{CachePolicy, CacheProjection, FederatedWorkspace, Projection};

/// Retry limit used when none is configured.
pub const DEFAULT_RETRY_LIMIT: u32 = 1;

const SOURCE_NAME_KEY: &str = "sourceName";
const RETRY_LIMIT_KEY: &str = "retryLimit";

/// Everything needed to start a [`crate::FederationGateway`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Display name of the federation.
    pub name: Option<String>,
    /// Extra attempts made to open a source connection. Negative values
    /// read as 0.
    #[serde(deserialize_with = "clamped_retry_limit")]
    pub retry_limit: u32,
    /// Workspace used when a request names none. Defaults to the first
    /// listed workspace.
    pub default_workspace: Option<String>,
    /// Default cache time-to-live.
    pub time_to_expire_ms: Option<u64>,
    /// Channels drained at the same time.
    pub max_workers: usize,
    pub workspaces: Vec<WorkspaceConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            name: None,
            retry_limit: DEFAULT_RETRY_LIMIT,
            default_workspace: None,
            time_to_expire_ms: None,
            max_workers: DEFAULT_MAX_WORKERS,
            workspaces: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,
    pub projections: Vec<ProjectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    /// Rule definitions such as `/Aircraft => /Vehicles/Air $ drafts`.
    pub rules: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub projection: ProjectionConfig,
    pub time_to_expire_ms: u64,
}

fn clamp_retry_limit(limit: i64) -> u32 {
    u32::try_from(limit.max(0)).unwrap_or(u32::MAX)
}

fn clamped_retry_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    i64::deserialize(deserializer).map(clamp_retry_limit)
}

impl GatewayConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Set the retry limit; negative values become 0.
    pub fn set_retry_limit(&mut self, limit: i64) {
        self.retry_limit = clamp_retry_limit(limit);
    }

    /// The gateway's identity as flat attributes.
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        if let Some(name) = &self.name {
            attributes.insert(SOURCE_NAME_KEY.to_string(), name.clone());
        }
        attributes.insert(RETRY_LIMIT_KEY.to_string(), self.retry_limit.to_string());
        attributes
    }

    /// Rebuild a configuration from [`GatewayConfig::to_attributes`].
    /// Missing attributes keep their defaults.
    pub fn from_attributes(attributes: &BTreeMap<String, String>) -> Result<Self, Error> {
        let mut config = GatewayConfig {
            name: attributes.get(SOURCE_NAME_KEY).cloned(),
            ..GatewayConfig::default()
        };
        if let Some(limit) = attributes.get(RETRY_LIMIT_KEY) {
            let limit: i64 = limit.trim().parse().map_err(|_| {
                Error::config(format!("{} must be an integer, got '{}'", RETRY_LIMIT_KEY, limit))
            })?;
            config.set_retry_limit(limit);
        }
        Ok(config)
    }

    /// Build every workspace, with the default workspace first.
    pub fn build_workspaces(&self) -> Result<Vec<FederatedWorkspace>, Error> {
        let mut workspaces = self
            .workspaces
            .iter()
            .map(WorkspaceConfig::build)
            .collect::<Result<Vec<_>, _>>()?;

        for (i, workspace) in workspaces.iter().enumerate() {
            if workspaces[..i].iter().any(|w| w.name() == workspace.name()) {
                return Err(Error::config(format!(
                    "workspace '{}' is defined twice",
                    workspace.name()
                )));
            }
        }

        if let Some(default) = &self.default_workspace {
            let i = workspaces
                .iter()
                .position(|w| w.name() == default)
                .ok_or_else(|| Error::InvalidWorkspace {
                    name: default.clone(),
                })?;
            let workspace = workspaces.remove(i);
            workspaces.insert(0, workspace);
        }
        Ok(workspaces)
    }
}

impl WorkspaceConfig {
    pub fn build(&self) -> Result<FederatedWorkspace, Error> {
        let projections = self
            .projections
            .iter()
            .map(ProjectionConfig::build)
            .collect::<Result<Vec<_>, _>>()?;
        let cache = self
            .cache
            .as_ref()
            .map(|cache| -> Result<CacheProjection, Error> {
                Ok(CacheProjection {
                    projection: cache.projection.build()?,
                    policy: CachePolicy::from_millis(cache.time_to_expire_ms),
                })
            })
            .transpose()?;
        FederatedWorkspace::new(self.name.clone(), projections, cache)
    }
}

impl ProjectionConfig {
    pub fn build(&self) -> Result<Projection, Error> {
        Projection::parse(
            self.source_name.clone(),
            self.workspace_name.clone(),
            self.read_only,
            self.rules.as_slice(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;
    use std::io::Write;

    const FLEET: &str = r#"{
        "name": "fleet",
        "retry_limit": 2,
        "default_workspace": "archive",
        "time_to_expire_ms": 60000,
        "workspaces": [
            { "name": "main",
              "projections": [
                  { "source_name": "cars", "rules": ["/ => /"] },
                  { "source_name": "planes", "workspace_name": "live", "read_only": true,
                    "rules": ["/Aircraft => /"] }
              ],
              "cache": { "projection": { "source_name": "cache", "rules": ["/ => /"] },
                         "time_to_expire_ms": 5000 } },
            { "name": "archive",
              "projections": [{ "source_name": "cars", "workspace_name": "old",
                                "rules": ["/ => /"] }] }
        ]
    }"#;

    #[test]
    fn defaults() {
        let config = GatewayConfig::from_json("{}").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.name, None);
        assert_eq!(config.retry_limit, DEFAULT_RETRY_LIMIT);
        assert!(config.retry_limit > 0);
    }

    #[test]
    fn negative_retry_limit_is_clamped() {
        let config = GatewayConfig::from_json(r#"{"retry_limit": -5}"#).unwrap();
        assert_eq!(config.retry_limit, 0);

        let mut config = GatewayConfig::default();
        config.set_retry_limit(-1);
        assert_eq!(config.retry_limit, 0);
        config.set_retry_limit(7);
        assert_eq!(config.retry_limit, 7);
    }

    #[test]
    fn attributes_round_trip() {
        let mut config = GatewayConfig {
            name: Some("fleet".to_string()),
            ..GatewayConfig::default()
        };
        config.set_retry_limit(4);

        let attributes = config.to_attributes();
        assert_eq!(
            attributes,
            btree! {
                "sourceName".to_string() => "fleet".to_string(),
                "retryLimit".to_string() => "4".to_string(),
            }
        );
        let back = GatewayConfig::from_attributes(&attributes).unwrap();
        assert_eq!(back.name.as_deref(), Some("fleet"));
        assert_eq!(back.retry_limit, 4);

        let unnamed =
            GatewayConfig::from_attributes(&GatewayConfig::default().to_attributes()).unwrap();
        assert_eq!(unnamed.name, None);

        let bad = btree! { "retryLimit".to_string() => "lots".to_string() };
        assert!(GatewayConfig::from_attributes(&bad).is_err());
    }

    #[test]
    fn builds_workspaces_default_first() {
        let config = GatewayConfig::from_json(FLEET).unwrap();
        let workspaces = config.build_workspaces().unwrap();
        let names: Vec<&str> = workspaces.iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["archive", "main"]);

        let main = &workspaces[1];
        assert_eq!(main.projections().len(), 2);
        assert!(main.projections()[1].is_read_only());
        assert_eq!(main.projections()[1].workspace_name(), Some("live"));
        assert_eq!(
            main.cache().unwrap().policy,
            CachePolicy::from_millis(5000)
        );
    }

    #[test]
    fn unknown_default_workspace() {
        let mut config = GatewayConfig::from_json(FLEET).unwrap();
        config.default_workspace = Some("nope".to_string());
        assert!(matches!(
            config.build_workspaces(),
            Err(Error::InvalidWorkspace { .. })
        ));
    }

    #[test]
    fn duplicate_workspace_names() {
        let mut config = GatewayConfig::from_json(FLEET).unwrap();
        config.default_workspace = None;
        config.workspaces[1].name = "main".to_string();
        assert!(matches!(config.build_workspaces(), Err(Error::Config { .. })));
    }

    #[test]
    fn bad_rule_is_reported() {
        let config = GatewayConfig::from_json(
            r#"{"workspaces": [{"name": "w", "projections": [
                {"source_name": "s", "rules": ["nonsense"]}
            ]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_workspaces(),
            Err(Error::InvalidProjection { .. })
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FLEET.as_bytes()).unwrap();

        let config = GatewayConfig::from_path(file.path()).unwrap();
        assert_eq!(config.name.as_deref(), Some("fleet"));
        assert_eq!(config.workspaces.len(), 2);

        let again = GatewayConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(again, config);

        assert!(GatewayConfig::from_path(std::path::Path::new("/no/such/file.json")).is_err());
    }
}
