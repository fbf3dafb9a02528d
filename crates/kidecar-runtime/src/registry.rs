//! Plugin registry shared by the host and its tasks

use kidecar_plugin_api::{DynPlugin, PluginState, PluginStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One registered plugin
#[derive(Debug, Clone)]
pub(crate) struct PluginEntry {
    /// Plugin instance
    pub(crate) plugin: Arc<dyn DynPlugin>,

    /// Order in which plugins are started
    pub(crate) boot_order: i32,

    /// Lifecycle state
    pub(crate) state: PluginState,

    /// Last completed status poll
    pub(crate) status: Option<PluginStatus>,

    /// Cancelled when the entry is removed or replaced
    pub(crate) registration: CancellationToken,

    /// Cancelled when the current run is stopped
    pub(crate) run: Option<CancellationToken>,
}

impl PluginEntry {
    pub(crate) fn new(plugin: Arc<dyn DynPlugin>, boot_order: i32, parent: &CancellationToken) -> Self {
        Self {
            plugin,
            boot_order,
            state: PluginState::Bound,
            status: None,
            registration: parent.child_token(),
            run: None,
        }
    }

    fn retire(&self) {
        if let Some(run) = &self.run {
            run.cancel();
        }
        self.registration.cancel();
    }
}

/// Registry of plugins keyed by name
///
/// Entries, their states and their cached statuses all live under one lock.
/// Every update from a background task names the plugin instance it was
/// spawned for and is dropped if that entry has since been replaced.
#[derive(Debug, Clone, Default)]
pub(crate) struct PluginRegistry {
    entries: Arc<RwLock<HashMap<String, PluginEntry>>>,
}

impl PluginRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, retiring any previous one with the same name
    pub(crate) fn insert(&self, name: &str, entry: PluginEntry) -> bool {
        let previous = self.entries.write().insert(name.to_string(), entry);
        match previous {
            Some(old) => {
                old.retire();
                true
            }
            None => false,
        }
    }

    /// Remove an entry and cancel its tasks
    pub(crate) fn remove(&self, name: &str) -> Option<PluginEntry> {
        let removed = self.entries.write().remove(name);
        if let Some(entry) = &removed {
            entry.retire();
        }
        removed
    }

    pub(crate) fn get(&self, name: &str) -> Option<PluginEntry> {
        self.entries.read().get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered names in boot order, then by name
    pub(crate) fn names(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut names: Vec<(i32, String)> = entries
            .iter()
            .map(|(name, entry)| (entry.boot_order, name.clone()))
            .collect();
        names.sort();
        names.into_iter().map(|(_, name)| name).collect()
    }

    pub(crate) fn state(&self, name: &str) -> Option<PluginState> {
        self.entries.read().get(name).map(|e| e.state.clone())
    }

    /// Move a bound or stopped plugin to running
    ///
    /// Returns the run token, or `None` if the plugin is unknown or already running.
    pub(crate) fn begin_run(&self, name: &str) -> Option<(Arc<dyn DynPlugin>, CancellationToken)> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(name)?;
        if entry.state.is_running() {
            return None;
        }
        let run = entry.registration.child_token();
        entry.run = Some(run.clone());
        entry.state = PluginState::Running;
        Some((entry.plugin.clone(), run))
    }

    /// Record how a run ended
    pub(crate) fn end_run(&self, name: &str, plugin: &Arc<dyn DynPlugin>, state: PluginState) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(name) {
            if same_plugin(&entry.plugin, plugin) && entry.state.is_running() {
                entry.state = state;
                entry.run = None;
            }
        }
    }

    /// Mark a plugin stopped after a successful `stop`
    pub(crate) fn mark_stopped(&self, name: &str, plugin: &Arc<dyn DynPlugin>) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(name) {
            if same_plugin(&entry.plugin, plugin) {
                if let Some(run) = entry.run.take() {
                    run.cancel();
                }
                entry.state = PluginState::Stopped;
            }
        }
    }

    pub(crate) fn cached_status(&self, name: &str) -> Option<PluginStatus> {
        self.entries.read().get(name).and_then(|e| e.status.clone())
    }

    /// Overwrite the cached status; the last completed poll wins
    pub(crate) fn store_status(&self, name: &str, plugin: &Arc<dyn DynPlugin>, status: PluginStatus) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(name) {
            if same_plugin(&entry.plugin, plugin) {
                entry.status = Some(status);
            }
        }
    }
}

fn same_plugin(a: &Arc<dyn DynPlugin>, b: &Arc<dyn DynPlugin>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidecar_plugin_api::testing::MockPlugin;
    use kidecar_plugin_api::TypedPlugin;

    fn entry(name: &str, boot_order: i32, parent: &CancellationToken) -> PluginEntry {
        let plugin: Arc<dyn DynPlugin> = Arc::from(TypedPlugin::boxed(MockPlugin::new(name)));
        PluginEntry::new(plugin, boot_order, parent)
    }

    #[test]
    fn test_names_follow_boot_order() {
        let root = CancellationToken::new();
        let registry = PluginRegistry::new();
        registry.insert("zeta", entry("zeta", 0, &root));
        registry.insert("alpha", entry("alpha", 2, &root));
        registry.insert("beta", entry("beta", 0, &root));

        assert_eq!(registry.names(), vec!["beta", "zeta", "alpha"]);
    }

    #[test]
    fn test_replace_retires_previous_entry() {
        let root = CancellationToken::new();
        let registry = PluginRegistry::new();
        let first = entry("probe", 0, &root);
        let first_scope = first.registration.clone();

        assert!(!registry.insert("probe", first));
        assert!(registry.insert("probe", entry("probe", 0, &root)));
        assert!(first_scope.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_stale_updates_are_ignored() {
        let root = CancellationToken::new();
        let registry = PluginRegistry::new();
        let old = entry("probe", 0, &root);
        let old_plugin = old.plugin.clone();
        registry.insert("probe", old);
        registry.insert("probe", entry("probe", 0, &root));

        registry.store_status("probe", &old_plugin, PluginStatus::new("probe", "1.0.0"));
        assert!(registry.cached_status("probe").is_none());
    }

    #[test]
    fn test_run_transitions() {
        let root = CancellationToken::new();
        let registry = PluginRegistry::new();
        registry.insert("probe", entry("probe", 0, &root));

        let (plugin, run) = registry.begin_run("probe").unwrap();
        assert!(registry.begin_run("probe").is_none());

        registry.mark_stopped("probe", &plugin);
        assert!(run.is_cancelled());
        assert_eq!(registry.state("probe"), Some(PluginState::Stopped));

        registry.end_run("probe", &plugin, PluginState::Failed("late".to_string()));
        assert_eq!(registry.state("probe"), Some(PluginState::Stopped));
    }
}
