//! The federation gateway: workspace registry, worker pool and sources.

use std::sync::{Arc, PoisonError, RwLock};

use fedstore_core::{Error, WorkSource};

use crate::{CachePolicy, FederatedWorkspace, FederationConnection, GatewayConfig, WorkerPool};

/// One federation of sources, shared by every connection to it.
///
/// The registry holds whole workspaces; replacing a workspace swaps the
/// object, and callers holding the old one keep a consistent view.
pub struct FederationGateway {
    name: Option<String>,
    retry_limit: u32,
    default_cache_policy: Option<CachePolicy>,
    work_source: Arc<dyn WorkSource>,
    pool: RwLock<Option<Arc<WorkerPool>>>,
    /// The first entry is the default workspace.
    workspaces: RwLock<Vec<Arc<FederatedWorkspace>>>,
}

impl FederationGateway {
    /// Build the workspaces described by `config` and start the worker
    /// pool.
    pub fn start(
        config: GatewayConfig,
        work_source: Arc<dyn WorkSource>,
    ) -> Result<Arc<Self>, Error> {
        let workspaces = config
            .build_workspaces()?
            .into_iter()
            .map(Arc::new)
            .collect::<Vec<_>>();
        let pool = WorkerPool::new(config.max_workers)?;

        tracing::info!(
            name = config.name.as_deref().unwrap_or("<unnamed>"),
            workspaces = workspaces.len(),
            retry_limit = config.retry_limit,
            "federation gateway started"
        );
        Ok(Arc::new(FederationGateway {
            name: config.name,
            retry_limit: config.retry_limit,
            default_cache_policy: config.time_to_expire_ms.map(CachePolicy::from_millis),
            work_source,
            pool: RwLock::new(Some(Arc::new(pool))),
            workspaces: RwLock::new(workspaces),
        }))
    }

    /// The federation's display name.
    pub fn source_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn default_cache_policy(&self) -> Option<CachePolicy> {
        self.default_cache_policy
    }

    pub fn work_source(&self) -> &Arc<dyn WorkSource> {
        &self.work_source
    }

    /// Look up a workspace. `None` selects the default workspace.
    pub fn workspace(&self, name: Option<&str>) -> Result<Arc<FederatedWorkspace>, Error> {
        let workspaces = self.workspaces.read().unwrap_or_else(PoisonError::into_inner);
        let found = match name {
            None => workspaces.first(),
            Some(name) => workspaces.iter().find(|w| w.name() == name),
        };
        found.cloned().ok_or_else(|| Error::InvalidWorkspace {
            name: name.unwrap_or_default().to_string(),
        })
    }

    /// Workspace names, default first.
    pub fn workspace_names(&self) -> Vec<String> {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|w| w.name().to_string())
            .collect()
    }

    pub fn has_workspace(&self, name: &str) -> bool {
        self.workspace(Some(name)).is_ok()
    }

    /// Register a workspace, replacing any with the same name. A replaced
    /// workspace keeps its position unless `is_default` moves it first.
    pub fn add_workspace(
        &self,
        workspace: FederatedWorkspace,
        is_default: bool,
    ) -> Arc<FederatedWorkspace> {
        let workspace = Arc::new(workspace);
        let mut workspaces = self.workspaces.write().unwrap_or_else(PoisonError::into_inner);
        let existing = workspaces.iter().position(|w| w.name() == workspace.name());
        match (existing, is_default) {
            (Some(i), false) => workspaces[i] = Arc::clone(&workspace),
            (Some(i), true) => {
                workspaces.remove(i);
                workspaces.insert(0, Arc::clone(&workspace));
            }
            (None, false) => workspaces.push(Arc::clone(&workspace)),
            (None, true) => workspaces.insert(0, Arc::clone(&workspace)),
        }
        tracing::debug!(workspace = workspace.name(), is_default, "workspace registered");
        workspace
    }

    /// Unregister a workspace. Returns false if none had the name.
    pub fn remove_workspace(&self, name: &str) -> bool {
        let mut workspaces = self.workspaces.write().unwrap_or_else(PoisonError::into_inner);
        let before = workspaces.len();
        workspaces.retain(|w| w.name() != name);
        before != workspaces.len()
    }

    /// Open a connection for one caller session.
    pub fn connect(self: &Arc<Self>) -> FederationConnection {
        FederationConnection::new(Arc::clone(self))
    }

    pub(crate) fn pool(&self) -> Result<Arc<WorkerPool>, Error> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::execution("federation gateway is shut down"))
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop the worker pool. Dispatches already running finish first;
    /// later submissions fail. Calling this again has no effect.
    pub fn shutdown(&self) {
        let pool = self.pool.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(pool) = pool {
            // A dispatch still holding the pool stops it when it lets go.
            if let Ok(mut pool) = Arc::try_unwrap(pool) {
                pool.shutdown();
            }
            tracing::info!(
                name = self.name.as_deref().unwrap_or("<unnamed>"),
                "federation gateway shut down"
            );
        }
    }
}

impl std::fmt::Debug for FederationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationGateway")
            .field("name", &self.name)
            .field("retry_limit", &self.retry_limit)
            .field("workspaces", &self.workspace_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Projection;
    use fedstore_memory::InMemoryRepository;

    fn config() -> GatewayConfig {
        GatewayConfig::from_json(
            r#"{
                "name": "fleet",
                "retry_limit": 3,
                "time_to_expire_ms": 60000,
                "workspaces": [
                    { "name": "workspace1",
                      "projections": [{ "source_name": "cars", "rules": ["/ => /"] }] },
                    { "name": "workspace2",
                      "projections": [{ "source_name": "cars", "rules": ["/ => /"] }] }
                ]
            }"#,
        )
        .unwrap()
    }

    fn gateway() -> Arc<FederationGateway> {
        let source = InMemoryRepository::new().with_source("cars", &[]);
        FederationGateway::start(config(), Arc::new(source)).unwrap()
    }

    fn workspace(name: &str) -> FederatedWorkspace {
        let projection = Projection::parse("cars", None, false, &["/ => /"]).unwrap();
        FederatedWorkspace::new(name, vec![projection], None).unwrap()
    }

    #[test]
    fn settings_pass_through() {
        let gateway = gateway();
        assert_eq!(gateway.source_name(), Some("fleet"));
        assert_eq!(gateway.retry_limit(), 3);
        assert_eq!(
            gateway.default_cache_policy(),
            Some(CachePolicy::from_millis(60_000))
        );
    }

    #[test]
    fn workspace_lookup() {
        let gateway = gateway();
        assert_eq!(gateway.workspace(None).unwrap().name(), "workspace1");

        let first = gateway.workspace(Some("workspace1")).unwrap();
        let again = gateway.workspace(Some("workspace1")).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        assert_eq!(
            gateway.workspace(Some("missing")).unwrap_err(),
            Error::InvalidWorkspace {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn replace_and_remove_workspaces() {
        let gateway = gateway();
        let old = gateway.workspace(Some("workspace2")).unwrap();
        let new = gateway.add_workspace(workspace("workspace2"), false);
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(gateway.workspace_names(), vec!["workspace1", "workspace2"]);

        gateway.add_workspace(workspace("workspace3"), true);
        assert_eq!(gateway.workspace(None).unwrap().name(), "workspace3");
        assert!(gateway.has_workspace("workspace3"));

        assert!(gateway.remove_workspace("workspace3"));
        assert!(!gateway.remove_workspace("workspace3"));
        assert!(!gateway.has_workspace("workspace3"));
        assert_eq!(gateway.workspace(None).unwrap().name(), "workspace1");
    }

    #[test]
    fn shutdown_is_idempotent() {
        let gateway = gateway();
        assert!(!gateway.is_shut_down());
        gateway.shutdown();
        gateway.shutdown();
        assert!(gateway.is_shut_down());
        assert!(gateway.pool().is_err());
    }

    #[test]
    fn empty_registry_has_no_default() {
        let gateway = gateway();
        assert!(gateway.remove_workspace("workspace1"));
        assert!(gateway.remove_workspace("workspace2"));
        assert!(matches!(
            gateway.workspace(None),
            Err(Error::InvalidWorkspace { .. })
        ));
    }
}
