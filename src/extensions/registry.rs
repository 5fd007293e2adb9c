use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{Extension, ExtensionError, ExtensionState};
use crate::help::{CommandInfo, HelpError, HelpIndex};

struct Entry {
    extension: Arc<dyn Extension>,
    state: ExtensionState,
    commands: Vec<CommandInfo>,
}

struct Inner {
    /// Discovery order
    entries: Vec<Entry>,
    /// Indices into `entries` of loaded extensions, in the order they were loaded
    load_order: Vec<usize>,
}

impl Inner {
    fn position(&self, id: &str) -> Result<usize, ExtensionError> {
        self.entries
            .iter()
            .position(|e| e.extension.id() == id)
            .ok_or_else(|| ExtensionError::UnknownExtension(id.to_string()))
    }
}

/// Read-only view published after every registry mutation.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub states: Vec<(String, ExtensionState)>,
    /// Core commands followed by loaded extension commands, in registration order
    pub commands: Vec<CommandInfo>,
    pub help: Arc<HelpIndex>,
    pub diagnostics: Vec<HelpError>,
}

/// Outcome of a bulk reload. Partial failure is expected.
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub reloaded: Vec<String>,
    pub failed: Vec<(String, ExtensionError)>,
}

impl ReloadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Tracks discovered extensions and their load state.
///
/// Mutations (`load`, `unload`, `reload`, `reload_all`) are serialized by one
/// async mutex. Readers never take that lock: they clone the current
/// [`Snapshot`], which is replaced wholesale once a mutation has finished, so a
/// half-built help index is never observable.
pub struct ExtensionRegistry {
    prefix: String,
    core: Vec<CommandInfo>,
    disabled: HashSet<String>,
    inner: Mutex<Inner>,
    published: RwLock<Arc<Snapshot>>,
}

impl ExtensionRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        let registry = Self {
            prefix: prefix.into(),
            core: Vec::new(),
            disabled: HashSet::new(),
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                load_order: Vec::new(),
            }),
            published: RwLock::new(Arc::new(Snapshot::default())),
        };
        registry.republish_owned()
    }

    /// Commands that are always available and never unloaded.
    pub fn with_core_commands(mut self, commands: Vec<CommandInfo>) -> Self {
        self.core = commands;
        self.republish_owned()
    }

    pub fn with_disabled_commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.disabled = names.into_iter().map(|n| n.as_ref().to_lowercase()).collect();
        self.republish_owned()
    }

    /// Adds a discovered extension in the `Unloaded` state.
    pub fn with_extension(mut self, extension: Arc<dyn Extension>) -> Self {
        let inner = self.inner.get_mut();
        if inner.entries.iter().any(|e| e.extension.id() == extension.id()) {
            warn!("Extension '{}' discovered twice, ignoring duplicate", extension.id());
            return self;
        }
        inner.entries.push(Entry {
            extension,
            state: ExtensionState::Unloaded,
            commands: Vec::new(),
        });
        self.republish_owned()
    }

    fn republish_owned(self) -> Self {
        if let Ok(inner) = self.inner.try_lock() {
            self.publish(&inner, true);
        }
        self
    }

    pub async fn load(&self, id: &str) -> Result<(), ExtensionError> {
        let mut inner = self.inner.lock().await;
        self.load_locked(&mut inner, id).await
    }

    pub async fn unload(&self, id: &str) -> Result<(), ExtensionError> {
        let mut inner = self.inner.lock().await;
        self.unload_locked(&mut inner, id).await
    }

    /// Unload followed by load. An extension that was not loaded is simply
    /// loaded; every other unload error is returned.
    pub async fn reload(&self, id: &str) -> Result<(), ExtensionError> {
        let mut inner = self.inner.lock().await;
        self.reload_locked(&mut inner, id).await
    }

    /// Reloads every discovered extension, continuing past failures.
    pub async fn reload_all(&self) -> ReloadReport {
        let mut inner = self.inner.lock().await;
        let ids: Vec<String> = inner
            .entries
            .iter()
            .map(|e| e.extension.id().to_string())
            .collect();

        let mut report = ReloadReport::default();
        for id in ids {
            match self.reload_locked(&mut inner, &id).await {
                Ok(()) => report.reloaded.push(id),
                Err(e) => {
                    error!("Loading {} error: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            "Reloaded {} extension(s), {} failed",
            report.reloaded.len(),
            report.failed.len()
        );
        report
    }

    /// Rebuilds the help index from the current command set.
    pub async fn rebuild_help(&self) {
        let inner = self.inner.lock().await;
        self.publish(&inner, true);
    }

    async fn reload_locked(&self, inner: &mut Inner, id: &str) -> Result<(), ExtensionError> {
        match self.unload_locked(inner, id).await {
            Ok(()) | Err(ExtensionError::NotLoaded(_)) => {}
            Err(e) => return Err(e),
        }
        self.load_locked(inner, id).await
    }

    async fn load_locked(&self, inner: &mut Inner, id: &str) -> Result<(), ExtensionError> {
        let idx = inner.position(id)?;
        if inner.entries[idx].state.is_loaded() {
            return Err(ExtensionError::AlreadyLoaded(id.to_string()));
        }

        let extension = inner.entries[idx].extension.clone();
        debug!("Loading extension '{}'", id);

        let commands = match extension.register().await {
            Ok(commands) => commands,
            Err(cause) => {
                error!("Extension '{}' failed to register: {:#}", id, cause);
                inner.entries[idx].state = ExtensionState::FailedLoad(cause.to_string());
                self.publish(inner, false);
                return Err(ExtensionError::LoadFailed {
                    id: id.to_string(),
                    cause,
                });
            }
        };

        let commands: Vec<CommandInfo> = commands
            .into_iter()
            .map(|mut command| {
                command.module = id.to_string();
                if self.disabled.contains(&command.name.to_lowercase()) {
                    command.enabled = false;
                }
                command
            })
            .collect();

        let existing = self.collect_commands(inner);
        if let Some(command) = find_conflict(&existing, &commands) {
            warn!("Extension '{}' declares conflicting command '{}'", id, command);
            if let Err(e) = extension.deregister().await {
                warn!("Extension '{}' failed to roll back: {:#}", id, e);
            }
            inner.entries[idx].state =
                ExtensionState::FailedLoad(format!("command `{}` is already taken", command));
            self.publish(inner, false);
            return Err(ExtensionError::CommandConflict {
                id: id.to_string(),
                command,
            });
        }

        let count = commands.len();
        let entry = &mut inner.entries[idx];
        entry.state = ExtensionState::Loaded;
        entry.commands = commands;
        inner.load_order.push(idx);
        self.publish(inner, true);

        info!("Loaded extension '{}' ({} command(s))", id, count);
        Ok(())
    }

    async fn unload_locked(&self, inner: &mut Inner, id: &str) -> Result<(), ExtensionError> {
        let idx = inner.position(id)?;
        if !inner.entries[idx].state.is_loaded() {
            return Err(ExtensionError::NotLoaded(id.to_string()));
        }

        let extension = inner.entries[idx].extension.clone();
        if let Err(e) = extension.deregister().await {
            warn!("Extension '{}' failed to deregister cleanly: {:#}", id, e);
        }

        let entry = &mut inner.entries[idx];
        entry.state = ExtensionState::Unloaded;
        entry.commands.clear();
        inner.load_order.retain(|&i| i != idx);
        self.publish(inner, true);

        info!("Unloaded extension '{}'", id);
        Ok(())
    }

    fn collect_commands(&self, inner: &Inner) -> Vec<CommandInfo> {
        let core = self.core.iter().cloned().map(|mut command| {
            if self.disabled.contains(&command.name.to_lowercase()) {
                command.enabled = false;
            }
            command
        });
        let loaded = inner
            .load_order
            .iter()
            .flat_map(|&idx| inner.entries[idx].commands.iter().cloned());
        core.chain(loaded).collect()
    }

    fn build_snapshot(&self, inner: &Inner, keep_help: Option<&Snapshot>) -> Snapshot {
        let states = inner
            .entries
            .iter()
            .map(|e| (e.extension.id().to_string(), e.state.clone()))
            .collect();
        let commands = self.collect_commands(inner);

        let (help, diagnostics) = match keep_help {
            Some(previous) => (previous.help.clone(), previous.diagnostics.clone()),
            None => {
                let (index, diagnostics) = HelpIndex::build(&commands, &self.prefix);
                (Arc::new(index), diagnostics)
            }
        };

        Snapshot {
            states,
            commands,
            help,
            diagnostics,
        }
    }

    /// Replaces the published snapshot. The help index is only rebuilt when
    /// the loaded command set changed.
    fn publish(&self, inner: &Inner, rebuild_help: bool) {
        let previous = self.snapshot();
        let snapshot = if rebuild_help {
            self.build_snapshot(inner, None)
        } else {
            self.build_snapshot(inner, Some(&previous))
        };
        *self.published.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot);
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn help_index(&self) -> Arc<HelpIndex> {
        self.snapshot().help.clone()
    }

    /// Identifiers of loaded extensions, in discovery order.
    pub fn loaded(&self) -> Vec<String> {
        self.snapshot()
            .states
            .iter()
            .filter(|(_, state)| state.is_loaded())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn states(&self) -> Vec<(String, ExtensionState)> {
        self.snapshot().states.clone()
    }

    pub fn state(&self, id: &str) -> Option<ExtensionState> {
        self.snapshot()
            .states
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, state)| state.clone())
    }

    pub fn commands(&self) -> Vec<CommandInfo> {
        self.snapshot().commands.clone()
    }

    /// Dispatch gate: the command is core or owned by a loaded extension, and enabled.
    pub fn is_command_available(&self, name: &str) -> bool {
        self.snapshot()
            .commands
            .iter()
            .any(|c| c.enabled && c.answers_to(name))
    }
}

/// Returns the first incoming name or alias that collides with the existing
/// command namespace (or with an earlier incoming command).
fn find_conflict(existing: &[CommandInfo], incoming: &[CommandInfo]) -> Option<String> {
    let mut names: HashSet<String> = HashSet::new();
    // alias -> whether its owner tolerates overlap
    let mut aliases: HashMap<String, bool> = HashMap::new();

    for command in existing {
        claim(command, &mut names, &mut aliases);
    }

    for command in incoming {
        let name = command.name.to_lowercase();
        if names.contains(&name) || aliases.contains_key(&name) {
            return Some(command.name.clone());
        }
        for alias in &command.aliases {
            let alias_key = alias.to_lowercase();
            if alias_key == name {
                continue;
            }
            if names.contains(&alias_key) {
                return Some(alias.clone());
            }
            if let Some(&allow) = aliases.get(&alias_key) {
                if !(allow && command.allow_alias_overlap) {
                    return Some(alias.clone());
                }
            }
        }
        claim(command, &mut names, &mut aliases);
    }

    None
}

fn claim(command: &CommandInfo, names: &mut HashSet<String>, aliases: &mut HashMap<String, bool>) {
    names.insert(command.name.to_lowercase());
    for alias in &command.aliases {
        aliases
            .entry(alias.to_lowercase())
            .and_modify(|allow| *allow &= command.allow_alias_overlap)
            .or_insert(command.allow_alias_overlap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeExtension {
        id: String,
        commands: Vec<CommandInfo>,
        failing: AtomicBool,
        registered: AtomicUsize,
        deregistered: AtomicUsize,
    }

    impl FakeExtension {
        fn new(id: &str, command_names: &[&str]) -> Arc<Self> {
            let commands = command_names
                .iter()
                .map(|name| {
                    CommandInfo::new(*name, "ignored").docs(format!(
                        "Runs {}.\nCommand examples:\n>>> [prefix]{}",
                        name, name
                    ))
                })
                .collect();
            Self::with_commands(id, commands)
        }

        fn with_commands(id: &str, commands: Vec<CommandInfo>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                commands,
                failing: AtomicBool::new(false),
                registered: AtomicUsize::new(0),
                deregistered: AtomicUsize::new(0),
            })
        }

        fn failing(self: Arc<Self>) -> Arc<Self> {
            self.failing.store(true, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl Extension for FakeExtension {
        fn id(&self) -> &str {
            &self.id
        }

        async fn register(&self) -> anyhow::Result<Vec<CommandInfo>> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("setup of {} exploded", self.id);
            }
            self.registered.fetch_add(1, Ordering::SeqCst);
            Ok(self.commands.clone())
        }

        async fn deregister(&self) -> anyhow::Result<()> {
            self.deregistered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn registry(extensions: &[Arc<FakeExtension>]) -> ExtensionRegistry {
        extensions
            .iter()
            .fold(ExtensionRegistry::new(";"), |registry, ext| {
                registry.with_extension(ext.clone())
            })
    }

    #[tokio::test]
    async fn test_load_makes_commands_visible() {
        let weather = FakeExtension::new("cogs.requesters.weather", &["weather", "graph"]);
        let registry = registry(&[weather.clone()]);

        assert_eq!(registry.state("cogs.requesters.weather"), Some(ExtensionState::Unloaded));
        assert!(!registry.is_command_available("weather"));

        registry.load("cogs.requesters.weather").await.unwrap();

        assert_eq!(registry.loaded(), vec!["cogs.requesters.weather"]);
        assert!(registry.is_command_available("weather"));
        let help = registry.help_index();
        assert!(help.get("cogs.requesters.weather", "graph").is_some());
        // module is always the owning extension id
        assert!(registry.commands().iter().all(|c| c.module == "cogs.requesters.weather"));
    }

    #[tokio::test]
    async fn test_load_twice_is_rejected() {
        let ext = FakeExtension::new("cogs.a", &["a"]);
        let registry = registry(&[ext.clone()]);

        registry.load("cogs.a").await.unwrap();
        let err = registry.load("cogs.a").await.unwrap_err();
        assert!(matches!(err, ExtensionError::AlreadyLoaded(id) if id == "cogs.a"));
        assert_eq!(ext.registered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unload_requires_loaded() {
        let registry = registry(&[FakeExtension::new("cogs.a", &["a"])]);

        let err = registry.unload("cogs.a").await.unwrap_err();
        assert!(matches!(err, ExtensionError::NotLoaded(_)));

        let err = registry.unload("cogs.missing").await.unwrap_err();
        assert!(matches!(err, ExtensionError::UnknownExtension(_)));
    }

    #[tokio::test]
    async fn test_unload_removes_commands_and_help() {
        let ext = FakeExtension::new("cogs.a", &["a"]);
        let registry = registry(&[ext.clone()]);
        registry.load("cogs.a").await.unwrap();

        let before = registry.help_index();
        registry.unload("cogs.a").await.unwrap();

        assert!(registry.loaded().is_empty());
        assert!(!registry.is_command_available("a"));
        assert!(!registry.help_index().contains("a"));
        // previously handed-out index is untouched
        assert!(before.contains("a"));
        assert_eq!(ext.deregistered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_loads_an_unloaded_extension() {
        let ext = FakeExtension::new("cogs.a", &["a"]);
        let registry = registry(&[ext.clone()]);

        registry.reload("cogs.a").await.unwrap();
        assert_eq!(registry.loaded(), vec!["cogs.a"]);
        assert_eq!(ext.deregistered.load(Ordering::SeqCst), 0);

        registry.reload("cogs.a").await.unwrap();
        assert_eq!(ext.registered.load(Ordering::SeqCst), 2);
        assert_eq!(ext.deregistered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_unknown_is_an_error() {
        let registry = registry(&[]);
        let err = registry.reload("cogs.nope").await.unwrap_err();
        assert!(matches!(err, ExtensionError::UnknownExtension(_)));
    }

    #[tokio::test]
    async fn test_reload_all_isolates_failures() {
        let extensions = vec![
            FakeExtension::new("cogs.one", &["one"]),
            FakeExtension::new("cogs.two", &["two"]),
            FakeExtension::new("cogs.broken", &["broken"]).failing(),
            FakeExtension::new("cogs.three", &["three"]),
            FakeExtension::new("cogs.four", &["four"]),
        ];
        let registry = registry(&extensions);
        // one of them is already loaded, the rest are not
        registry.load("cogs.two").await.unwrap();

        let report = registry.reload_all().await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "cogs.broken");
        assert!(matches!(report.failed[0].1, ExtensionError::LoadFailed { .. }));
        assert_eq!(report.reloaded, vec!["cogs.one", "cogs.two", "cogs.three", "cogs.four"]);
        assert_eq!(registry.loaded(), vec!["cogs.one", "cogs.two", "cogs.three", "cogs.four"]);
        assert!(matches!(
            registry.state("cogs.broken"),
            Some(ExtensionState::FailedLoad(cause)) if cause.contains("exploded")
        ));
    }

    #[tokio::test]
    async fn test_failed_load_can_recover() {
        let ext = FakeExtension::new("cogs.flaky", &["flaky"]).failing();
        let registry = registry(&[ext.clone()]);

        assert!(registry.load("cogs.flaky").await.is_err());
        assert!(!registry.is_command_available("flaky"));

        ext.failing.store(false, Ordering::SeqCst);
        registry.reload("cogs.flaky").await.unwrap();
        assert_eq!(registry.state("cogs.flaky"), Some(ExtensionState::Loaded));
        assert!(registry.help_index().contains("flaky"));
    }

    #[tokio::test]
    async fn test_conflicting_alias_fails_load() {
        let first = FakeExtension::with_commands(
            "cogs.first",
            vec![CommandInfo::new("reload", "x").aliases(["r"])],
        );
        let second = FakeExtension::with_commands(
            "cogs.second",
            vec![CommandInfo::new("roll", "x").aliases(["r"])],
        );
        let registry = registry(&[first, second.clone()]);

        registry.load("cogs.first").await.unwrap();
        let err = registry.load("cogs.second").await.unwrap_err();

        assert!(matches!(err, ExtensionError::CommandConflict { ref command, .. } if command == "r"));
        assert_eq!(registry.loaded(), vec!["cogs.first"]);
        assert!(!registry.is_command_available("roll"));
        assert_eq!(second.deregistered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_alias_overlap_when_both_sides_allow_it() {
        let first = FakeExtension::with_commands(
            "cogs.first",
            vec![CommandInfo::new("weather", "x").aliases(["w"]).allow_alias_overlap()],
        );
        let second = FakeExtension::with_commands(
            "cogs.second",
            vec![CommandInfo::new("wiki", "x").aliases(["w"]).allow_alias_overlap()],
        );
        let registry = registry(&[first, second]);

        registry.load("cogs.first").await.unwrap();
        registry.load("cogs.second").await.unwrap();
        assert_eq!(registry.loaded().len(), 2);
    }

    #[tokio::test]
    async fn test_name_clash_with_core_command() {
        let ext = FakeExtension::new("cogs.rogue", &["help"]);
        let registry = ExtensionRegistry::new(";")
            .with_core_commands(vec![CommandInfo::new("help", "main")])
            .with_extension(ext);

        let err = registry.load("cogs.rogue").await.unwrap_err();
        assert!(matches!(err, ExtensionError::CommandConflict { .. }));
    }

    #[tokio::test]
    async fn test_core_and_disabled_commands() {
        let core = vec![CommandInfo::new("reload", "main")
            .docs("Reloads extensions.\nCommand examples:\n>>> [prefix]reload")];
        let registry = ExtensionRegistry::new(";")
            .with_core_commands(core)
            .with_disabled_commands(["Weather"])
            .with_extension(FakeExtension::new("cogs.weather", &["weather", "graph"]));

        // core commands are indexed before anything is loaded
        assert!(registry.help_index().get("main", "reload").is_some());
        assert!(registry.is_command_available("reload"));

        registry.load("cogs.weather").await.unwrap();
        assert!(!registry.is_command_available("weather"));
        assert!(!registry.help_index().contains("weather"));
        assert!(registry.help_index().contains("graph"));

        let modules: Vec<_> = registry
            .help_index()
            .modules()
            .map(|m| m.name.clone())
            .collect();
        assert_eq!(modules, vec!["main", "cogs.weather"]);
    }

    #[tokio::test]
    async fn test_malformed_docs_are_reported_not_fatal() {
        let ext = FakeExtension::with_commands(
            "cogs.mixed",
            vec![
                CommandInfo::new("good", "x").docs("Good.\nCommand examples:\n>>> [prefix]good"),
                CommandInfo::new("bad", "x").docs("No examples here"),
            ],
        );
        let registry = registry(&[ext]);
        registry.load("cogs.mixed").await.unwrap();

        let snapshot = registry.snapshot();
        assert!(snapshot.help.contains("good"));
        assert!(!snapshot.help.contains("bad"));
        assert_eq!(
            snapshot.diagnostics,
            vec![HelpError::MalformedMetadata {
                module: "cogs.mixed".to_string(),
                command: "bad".to_string(),
            }]
        );
        // still dispatchable, only missing from help
        assert!(registry.is_command_available("bad"));
    }

    #[tokio::test]
    async fn test_loaded_set_tracks_last_successful_transition() {
        let ids = ["cogs.a", "cogs.b", "cogs.c", "cogs.d"];
        let extensions: Vec<_> = ids
            .iter()
            .map(|id| FakeExtension::new(id, &[&id[5..]]))
            .collect();
        let registry = registry(&extensions);

        let mut expected: BTreeSet<String> = BTreeSet::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let id = ids[(seed % 4) as usize];
            match (seed >> 8) % 3 {
                0 => {
                    if registry.load(id).await.is_ok() {
                        expected.insert(id.to_string());
                    }
                }
                1 => {
                    if registry.unload(id).await.is_ok() {
                        expected.remove(id);
                    }
                }
                _ => {
                    registry.reload(id).await.unwrap();
                    expected.insert(id.to_string());
                }
            }

            let loaded: BTreeSet<String> = registry.loaded().into_iter().collect();
            assert_eq!(loaded, expected);
            for id in ids {
                assert_eq!(registry.is_command_available(&id[5..]), expected.contains(id));
            }
        }
    }
}
