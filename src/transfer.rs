//! Bundle export and strategy-driven import.
//!
//! A bundle is a TOML snapshot of both writable scopes. Import reconciles
//! it entity by entity: an entity collides only with the entity of the same
//! name in the same (kind, scope) store. Under [`MergeStrategy::Ask`] the
//! import is split in two steps, [`import`] returning the conflicts and
//! [`PendingImport::resolve`] applying the caller's decisions.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::model::{Alias, Scope, ShellFunction};
use crate::store::fragment::write_atomic;
use crate::store::{ConfigStore, FragmentStore};

pub const BUNDLE_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportData {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub aliases: Vec<AliasRecord>,
    #[serde(default)]
    pub functions: Vec<FunctionRecord>,
    #[serde(default)]
    pub config: ConfigRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub name: String,
    pub command: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub content: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRecord {
    pub shared: String,
    pub local: String,
    pub plugins: Vec<String>,
}

/// How to treat an incoming entity whose name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Overwrite,
    Keep,
    Ask,
}

/// Caller decision for one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Overwrite,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Alias,
    Function,
    Config,
    Plugin,
}

/// Address of one imported item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRef {
    pub kind: ItemKind,
    pub scope: Scope,
    pub name: String,
}

impl EntryRef {
    pub fn new(kind: ItemKind, scope: Scope, name: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            name: name.into(),
        }
    }

    pub fn config(scope: Scope) -> Self {
        Self::new(ItemKind::Config, scope, "config")
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ItemKind::Alias => "alias",
            ItemKind::Function => "function",
            ItemKind::Config => "config",
            ItemKind::Plugin => "plugin",
        };
        write!(f, "{kind} '{}' ({})", self.name, self.scope)
    }
}

/// A colliding item with both versions rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub entry: EntryRef,
    pub existing: String,
    pub incoming: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub entry: EntryRef,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub added: Vec<EntryRef>,
    pub overwritten: Vec<EntryRef>,
    pub kept: Vec<EntryRef>,
    pub unchanged: Vec<EntryRef>,
    pub unresolved: Vec<EntryRef>,
    pub failed: Vec<FailedEntry>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} overwritten, {} kept, {} unchanged, {} unresolved, {} failed",
            self.added.len(),
            self.overwritten.len(),
            self.kept.len(),
            self.unchanged.len(),
            self.unresolved.len(),
            self.failed.len()
        )
    }

    fn record(&mut self, entry: EntryRef, result: Result<Applied>) {
        match result {
            Ok(Applied::Added) => self.added.push(entry),
            Ok(Applied::Overwritten) => self.overwritten.push(entry),
            Ok(Applied::Kept) => self.kept.push(entry),
            Ok(Applied::Unchanged) => self.unchanged.push(entry),
            Ok(Applied::Unresolved) => self.unresolved.push(entry),
            Err(err) => {
                debug!(%entry, error = %err, "import entry failed");
                self.failed.push(FailedEntry {
                    entry,
                    error: err.to_string(),
                })
            }
        }
    }
}

#[derive(Debug)]
pub enum ImportOutcome {
    Applied(ImportReport),
    /// `ask` found conflicts; nothing has been written yet.
    Pending(PendingImport),
}

#[derive(Debug)]
pub struct PendingImport {
    bundle: ExportData,
    conflicts: Vec<Conflict>,
}

impl PendingImport {
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Apply every conflict-free item plus the given decisions. Conflicts
    /// without a decision keep the existing value and are reported as
    /// unresolved.
    #[instrument(skip_all, fields(decisions = decisions.len()))]
    pub fn resolve(
        self,
        store: &ConfigStore,
        decisions: &HashMap<EntryRef, Resolution>,
    ) -> ImportReport {
        let report = apply(store, &self.bundle, |entry| decisions.get(entry).copied());
        info!(summary = %report.summary(), "import resolved");
        report
    }
}

enum Applied {
    Added,
    Overwritten,
    Kept,
    Unchanged,
    Unresolved,
}

/// Consistent snapshot of both writable scopes. Secrets are never exported.
pub fn export(store: &ConfigStore) -> Result<ExportData> {
    let snapshot = store.snapshot()?;

    Ok(ExportData {
        version: BUNDLE_VERSION.to_string(),
        exported_at: Utc::now(),
        aliases: snapshot
            .aliases
            .into_iter()
            .map(|(scope, alias)| AliasRecord {
                name: alias.name,
                command: alias.command,
                scope,
            })
            .collect(),
        functions: snapshot
            .functions
            .into_iter()
            .map(|(scope, function)| FunctionRecord {
                name: function.name,
                content: function.content,
                scope,
            })
            .collect(),
        config: ConfigRecord {
            shared: snapshot.shared_config,
            local: snapshot.local_config,
            plugins: snapshot.plugins,
        },
    })
}

/// Write a bundle to `path` and describe what was written.
#[instrument(skip(store))]
pub fn export_to(store: &ConfigStore, path: &Path) -> Result<String> {
    let data = export(store)?;
    let text = toml::to_string_pretty(&data).map_err(|e| Error::Bundle {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_atomic(path, &text)?;

    let message = format!(
        "Exported {} aliases, {} functions and {} plugins to {}",
        data.aliases.len(),
        data.functions.len(),
        data.config.plugins.len(),
        path.display()
    );
    info!("{message}");
    Ok(message)
}

pub fn read_bundle(path: &Path) -> Result<ExportData> {
    let text = fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
    let data: ExportData = toml::from_str(&text).map_err(|e| Error::Bundle {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if data.version != BUNDLE_VERSION {
        return Err(Error::Bundle {
            path: path.to_path_buf(),
            message: format!("unsupported bundle version '{}'", data.version),
        });
    }
    Ok(data)
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .unwrap_or_else(|_| PathBuf::from(raw))
}

/// Import a bundle. `Overwrite` and `Keep` apply immediately; `Ask` applies
/// immediately only when nothing collides.
#[instrument(skip_all, fields(strategy = ?strategy))]
pub fn import(store: &ConfigStore, bundle: ExportData, strategy: MergeStrategy) -> Result<ImportOutcome> {
    let report = match strategy {
        MergeStrategy::Overwrite => apply(store, &bundle, |_| Some(Resolution::Overwrite)),
        MergeStrategy::Keep => apply(store, &bundle, |_| Some(Resolution::Keep)),
        MergeStrategy::Ask => {
            let conflicts = conflicts(store, &bundle)?;
            if !conflicts.is_empty() {
                info!(conflicts = conflicts.len(), "import waiting for decisions");
                return Ok(ImportOutcome::Pending(PendingImport { bundle, conflicts }));
            }
            apply(store, &bundle, |_| None)
        }
    };

    info!(summary = %report.summary(), "import applied");
    Ok(ImportOutcome::Applied(report))
}

pub fn import_from(store: &ConfigStore, path: &Path, strategy: MergeStrategy) -> Result<ImportOutcome> {
    import(store, read_bundle(path)?, strategy)
}

/// Every incoming item that differs from an existing one of the same name.
pub fn conflicts(store: &ConfigStore, bundle: &ExportData) -> Result<Vec<Conflict>> {
    let mut found = Vec::new();

    for record in &bundle.aliases {
        let Ok(target) = store.aliases(record.scope) else { continue };
        if let Some(existing) = target.get(&record.name)? {
            if existing.command != record.command {
                found.push(Conflict {
                    entry: EntryRef::new(ItemKind::Alias, record.scope, &record.name),
                    existing: existing.command,
                    incoming: record.command.clone(),
                });
            }
        }
    }

    for record in &bundle.functions {
        let Ok(target) = store.functions(record.scope) else { continue };
        if let Some(existing) = target.get(&record.name)? {
            if existing.content != record.content {
                found.push(Conflict {
                    entry: EntryRef::new(ItemKind::Function, record.scope, &record.name),
                    existing: existing.content,
                    incoming: record.content.clone(),
                });
            }
        }
    }

    for (scope, incoming) in config_blobs(bundle) {
        let existing = store.get_config(scope)?.content;
        if !existing.trim().is_empty() && existing != incoming {
            found.push(Conflict {
                entry: EntryRef::config(scope),
                existing,
                incoming: incoming.to_string(),
            });
        }
    }

    Ok(found)
}

fn config_blobs(bundle: &ExportData) -> impl Iterator<Item = (Scope, &str)> {
    [
        (Scope::Shared, bundle.config.shared.as_str()),
        (Scope::Local, bundle.config.local.as_str()),
    ]
    .into_iter()
    .filter(|(_, text)| !text.is_empty())
}

fn apply<F>(store: &ConfigStore, bundle: &ExportData, decide: F) -> ImportReport
where
    F: Fn(&EntryRef) -> Option<Resolution>,
{
    let mut report = ImportReport::default();

    for record in &bundle.aliases {
        let entry = EntryRef::new(ItemKind::Alias, record.scope, &record.name);
        let alias = Alias::new(&record.name, &record.command);
        let result = store
            .aliases(record.scope)
            .and_then(|target| apply_entity(target, &alias, decide(&entry)));
        report.record(entry, result);
    }

    for record in &bundle.functions {
        let entry = EntryRef::new(ItemKind::Function, record.scope, &record.name);
        let function = ShellFunction::new(&record.name, &record.content);
        let result = store
            .functions(record.scope)
            .and_then(|target| apply_entity(target, &function, decide(&entry)));
        report.record(entry, result);
    }

    for (scope, incoming) in config_blobs(bundle) {
        let entry = EntryRef::config(scope);
        let result = apply_config(store, scope, incoming, || decide(&entry));
        report.record(entry, result);
    }

    let registry = store.plugins();
    for name in &bundle.config.plugins {
        let entry = EntryRef::new(ItemKind::Plugin, Scope::Local, name);
        let result = registry.add(name).map(|added| {
            if added {
                Applied::Added
            } else {
                Applied::Unchanged
            }
        });
        report.record(entry, result);
    }

    report
}

fn apply_entity<C: Codec>(
    target: &FragmentStore<C>,
    incoming: &C::Entity,
    decision: Option<Resolution>,
) -> Result<Applied> {
    C::validate(incoming)?;
    let name = C::name(incoming);

    match target.get(name)? {
        None => {
            target.add(incoming)?;
            Ok(Applied::Added)
        }
        Some(existing) if existing == *incoming => Ok(Applied::Unchanged),
        Some(_) => match decision {
            Some(Resolution::Overwrite) => {
                target.upsert(incoming)?;
                Ok(Applied::Overwritten)
            }
            Some(Resolution::Keep) => Ok(Applied::Kept),
            None => Ok(Applied::Unresolved),
        },
    }
}

fn apply_config(
    store: &ConfigStore,
    scope: Scope,
    incoming: &str,
    decide: impl FnOnce() -> Option<Resolution>,
) -> Result<Applied> {
    let existing = store.get_config(scope)?.content;
    if existing == incoming {
        return Ok(Applied::Unchanged);
    }
    if existing.trim().is_empty() {
        store.set_config(scope, incoming)?;
        return Ok(Applied::Added);
    }

    match decide() {
        Some(Resolution::Overwrite) => {
            store.set_config(scope, incoming)?;
            Ok(Applied::Overwritten)
        }
        Some(Resolution::Keep) => Ok(Applied::Kept),
        None => Ok(Applied::Unresolved),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::OhMyZshProbe;
    use crate::workspace::Workspace;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(&Workspace::at(dir.path()), Box::new(OhMyZshProbe::default()));
        (dir, store)
    }

    fn bundle(aliases: &[(&str, &str, Scope)]) -> ExportData {
        ExportData {
            version: BUNDLE_VERSION.to_string(),
            exported_at: Utc::now(),
            aliases: aliases
                .iter()
                .map(|(name, command, scope)| AliasRecord {
                    name: name.to_string(),
                    command: command.to_string(),
                    scope: *scope,
                })
                .collect(),
            functions: Vec::new(),
            config: ConfigRecord::default(),
        }
    }

    fn applied(outcome: ImportOutcome) -> ImportReport {
        match outcome {
            ImportOutcome::Applied(report) => report,
            ImportOutcome::Pending(pending) => panic!("unexpected conflicts: {:?}", pending.conflicts()),
        }
    }

    #[test]
    fn test_keep_leaves_existing_value() {
        let (_dir, store) = temp_store();
        store.add_alias(Scope::Local, &Alias::new("ll", "ls -l")).unwrap();

        let report = applied(import(&store, bundle(&[("ll", "ls -lah", Scope::Local)]), MergeStrategy::Keep).unwrap());
        assert_eq!(store.list_aliases(Scope::Local).unwrap()[0].command, "ls -l");
        assert_eq!(report.kept.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces_existing_value() {
        let (_dir, store) = temp_store();
        store.add_alias(Scope::Local, &Alias::new("ll", "ls -l")).unwrap();
        store.add_alias(Scope::Local, &Alias::new("gs", "git status")).unwrap();

        let report = applied(
            import(&store, bundle(&[("ll", "ls -lah", Scope::Local)]), MergeStrategy::Overwrite).unwrap(),
        );
        assert_eq!(
            store.list_aliases(Scope::Local).unwrap(),
            vec![Alias::new("ll", "ls -lah"), Alias::new("gs", "git status")]
        );
        assert_eq!(report.overwritten, vec![EntryRef::new(ItemKind::Alias, Scope::Local, "ll")]);
    }

    #[test]
    fn test_non_colliding_entities_are_added_and_identical_ones_unchanged() {
        let (_dir, store) = temp_store();
        store.add_alias(Scope::Shared, &Alias::new("gs", "git status")).unwrap();

        let report = applied(
            import(
                &store,
                bundle(&[("gs", "git status", Scope::Shared), ("ll", "ls -lah", Scope::Shared)]),
                MergeStrategy::Ask,
            )
            .unwrap(),
        );
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.unchanged.len(), 1);
        assert_eq!(store.list_aliases(Scope::Shared).unwrap().len(), 2);
    }

    #[test]
    fn test_collision_domain_is_per_scope() {
        let (_dir, store) = temp_store();
        store.add_alias(Scope::Shared, &Alias::new("ll", "ls -l")).unwrap();

        let report = applied(import(&store, bundle(&[("ll", "ls -lah", Scope::Local)]), MergeStrategy::Ask).unwrap());
        assert_eq!(report.added.len(), 1);
        assert_eq!(store.list_aliases(Scope::Shared).unwrap()[0].command, "ls -l");
        assert_eq!(store.list_aliases(Scope::Local).unwrap()[0].command, "ls -lah");
    }

    #[test]
    fn test_ask_reports_conflicts_before_writing() {
        let (_dir, store) = temp_store();
        store.add_alias(Scope::Local, &Alias::new("ll", "ls -l")).unwrap();

        let outcome = import(
            &store,
            bundle(&[("ll", "ls -lah", Scope::Local), ("gs", "git status", Scope::Local)]),
            MergeStrategy::Ask,
        )
        .unwrap();
        let ImportOutcome::Pending(pending) = outcome else {
            panic!("expected pending import");
        };

        assert_eq!(pending.conflicts().len(), 1);
        assert_eq!(pending.conflicts()[0].existing, "ls -l");
        assert_eq!(pending.conflicts()[0].incoming, "ls -lah");
        assert_eq!(store.list_aliases(Scope::Local).unwrap().len(), 1);

        let decisions = HashMap::from([(
            EntryRef::new(ItemKind::Alias, Scope::Local, "ll"),
            Resolution::Overwrite,
        )]);
        let report = pending.resolve(&store, &decisions);
        assert_eq!(report.overwritten.len(), 1);
        assert_eq!(report.added.len(), 1);
        assert_eq!(store.list_aliases(Scope::Local).unwrap()[0].command, "ls -lah");
    }

    #[test]
    fn test_ask_without_decision_is_unresolved() {
        let (_dir, store) = temp_store();
        store.add_alias(Scope::Local, &Alias::new("ll", "ls -l")).unwrap();

        let outcome = import(&store, bundle(&[("ll", "ls -lah", Scope::Local)]), MergeStrategy::Ask).unwrap();
        let ImportOutcome::Pending(pending) = outcome else {
            panic!("expected pending import");
        };
        let report = pending.resolve(&store, &HashMap::new());
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(store.list_aliases(Scope::Local).unwrap()[0].command, "ls -l");
    }

    #[test]
    fn test_invalid_entries_fail_individually() {
        let (_dir, store) = temp_store();
        let report = applied(
            import(
                &store,
                bundle(&[
                    ("bad name", "x", Scope::Local),
                    ("vpn", "openvpn", Scope::Secrets),
                    ("ok", "true", Scope::Local),
                ]),
                MergeStrategy::Overwrite,
            )
            .unwrap(),
        );
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.added, vec![EntryRef::new(ItemKind::Alias, Scope::Local, "ok")]);
    }

    #[test]
    fn test_config_and_plugins_import() {
        let (_dir, store) = temp_store();
        store.set_config(Scope::Local, "plugins=(git)\n").unwrap();

        let mut data = bundle(&[]);
        data.config = ConfigRecord {
            shared: "setopt autocd\n".into(),
            local: "plugins=(fzf)\nexport EDITOR=nvim\n".into(),
            plugins: vec!["fzf".into(), "git".into()],
        };

        let report = applied(import(&store, data.clone(), MergeStrategy::Keep).unwrap());
        assert_eq!(store.get_config(Scope::Shared).unwrap().content, "setopt autocd\n");
        assert_eq!(
            store.plugins().list_enabled().unwrap(),
            vec!["git".to_string(), "fzf".to_string()]
        );
        assert!(report.kept.contains(&EntryRef::config(Scope::Local)));

        let outcome = import(&store, data, MergeStrategy::Ask).unwrap();
        let ImportOutcome::Pending(pending) = outcome else {
            panic!("expected config conflict");
        };
        assert_eq!(pending.conflicts()[0].entry, EntryRef::config(Scope::Local));
    }

    #[test]
    fn test_export_round_trip_through_file() {
        let (dir, store) = temp_store();
        store.add_alias(Scope::Shared, &Alias::new("ll", "ls -lah")).unwrap();
        store
            .add_function(Scope::Local, &ShellFunction::new("mkcd", "mkdir -p \"$1\"\ncd \"$1\""))
            .unwrap();
        store.set_config(Scope::Local, "plugins=(git)\n").unwrap();

        let path = dir.path().join("backup/zdot.toml");
        let message = export_to(&store, &path).unwrap();
        assert!(message.contains("1 aliases"));

        let data = read_bundle(&path).unwrap();
        assert_eq!(data.version, "1");
        assert_eq!(data.aliases[0].scope, Scope::Shared);
        assert_eq!(data.functions[0].content, "mkdir -p \"$1\"\ncd \"$1\"");
        assert_eq!(data.config.plugins, vec!["git"]);

        let (_other_dir, other) = temp_store();
        let report = applied(import(&other, data, MergeStrategy::Ask).unwrap());
        assert!(report.failed.is_empty());
        assert_eq!(other.list_aliases(Scope::Shared).unwrap(), vec![Alias::new("ll", "ls -lah")]);
    }

    #[test]
    fn test_read_bundle_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bundle.toml");
        fs::write(&path, "version = \"9\"\nexported_at = \"2024-01-01T00:00:00Z\"\n").unwrap();
        assert!(matches!(read_bundle(&path), Err(Error::Bundle { .. })));

        fs::write(&path, "not toml at all [").unwrap();
        assert!(matches!(read_bundle(&path), Err(Error::Bundle { .. })));
    }
}
