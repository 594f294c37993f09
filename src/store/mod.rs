//! The config store: scope resolution over the fragment files.

pub mod fragment;
pub mod secrets;
pub mod text;

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::codec::{AliasCodec, FunctionCodec};
use crate::error::{Error, Result};
use crate::model::{Alias, ConfigContent, FragmentKind, Scope, ShellFunction};
use crate::plugins::{parse_registry, PluginProbe, PluginRegistry};
use crate::workspace::{Workspace, WorkspacePath};

pub use fragment::{FragmentFile, FragmentStore};
pub use secrets::SecretsView;

/// One value per writable scope.
#[derive(Debug)]
struct ScopePair<T> {
    shared: T,
    local: T,
}

impl<T> ScopePair<T> {
    fn build(mut make: impl FnMut(Scope) -> T) -> Self {
        Self {
            shared: make(Scope::Shared),
            local: make(Scope::Local),
        }
    }

    fn get(&self, scope: Scope) -> Result<&T> {
        match scope {
            Scope::Shared => Ok(&self.shared),
            Scope::Local => Ok(&self.local),
            Scope::Secrets => Err(Error::ReadOnlyScope(scope)),
        }
    }
}

/// Everything the store holds, read under one set of locks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub aliases: Vec<(Scope, Alias)>,
    pub functions: Vec<(Scope, ShellFunction)>,
    pub shared_config: String,
    pub local_config: String,
    pub plugins: Vec<String>,
}

/// Aliases, functions and config blobs across the shared and local scopes,
/// plus the read-only secrets aliases.
pub struct ConfigStore {
    aliases: ScopePair<FragmentStore<AliasCodec>>,
    functions: ScopePair<FragmentStore<FunctionCodec>>,
    config: ScopePair<FragmentFile>,
    secrets: SecretsView,
    probe: Box<dyn PluginProbe>,
    tree: Arc<RwLock<()>>,
}

impl ConfigStore {
    pub fn new(workspace: &Workspace, probe: Box<dyn PluginProbe>) -> Self {
        let tree = workspace.tree_lock();
        let file = |kind: FragmentKind, scope: Scope| {
            let path = workspace.path(WorkspacePath::Fragment(kind, scope));
            match scope {
                Scope::Shared => FragmentFile::in_tree(path, Arc::clone(&tree)),
                _ => FragmentFile::new(path),
            }
        };

        Self {
            aliases: ScopePair::build(|scope| FragmentStore::new(file(FragmentKind::Aliases, scope))),
            functions: ScopePair::build(|scope| {
                FragmentStore::new(file(FragmentKind::Functions, scope))
            }),
            config: ScopePair::build(|scope| file(FragmentKind::Config, scope)),
            secrets: SecretsView::new(workspace.path(WorkspacePath::Secrets)),
            probe,
            tree: Arc::clone(&tree),
        }
    }

    pub fn aliases(&self, scope: Scope) -> Result<&FragmentStore<AliasCodec>> {
        self.aliases.get(scope)
    }

    pub fn functions(&self, scope: Scope) -> Result<&FragmentStore<FunctionCodec>> {
        self.functions.get(scope)
    }

    /// Aliases of a scope; `Secrets` lists the secrets file.
    pub fn list_aliases(&self, scope: Scope) -> Result<Vec<Alias>> {
        match scope {
            Scope::Secrets => self.secrets.list(),
            _ => self.aliases.get(scope)?.list(),
        }
    }

    pub fn list_secrets_aliases(&self) -> Result<Vec<Alias>> {
        self.secrets.list()
    }

    pub fn add_alias(&self, scope: Scope, alias: &Alias) -> Result<()> {
        self.aliases.get(scope)?.add(alias)?;
        info!(%scope, name = %alias.name, "alias added");
        Ok(())
    }

    pub fn update_alias(&self, scope: Scope, old_name: &str, alias: &Alias) -> Result<()> {
        self.aliases.get(scope)?.update(old_name, alias)?;
        info!(%scope, old_name, name = %alias.name, "alias updated");
        Ok(())
    }

    pub fn delete_alias(&self, scope: Scope, name: &str) -> Result<()> {
        self.aliases.get(scope)?.delete(name)?;
        info!(%scope, name, "alias deleted");
        Ok(())
    }

    /// Functions of a scope. The secrets file holds no functions.
    pub fn list_functions(&self, scope: Scope) -> Result<Vec<ShellFunction>> {
        match scope {
            Scope::Secrets => Ok(Vec::new()),
            _ => self.functions.get(scope)?.list(),
        }
    }

    pub fn add_function(&self, scope: Scope, function: &ShellFunction) -> Result<()> {
        self.functions.get(scope)?.add(function)?;
        info!(%scope, name = %function.name, "function added");
        Ok(())
    }

    pub fn update_function(
        &self,
        scope: Scope,
        old_name: &str,
        function: &ShellFunction,
    ) -> Result<()> {
        self.functions.get(scope)?.update(old_name, function)?;
        info!(%scope, old_name, name = %function.name, "function updated");
        Ok(())
    }

    pub fn delete_function(&self, scope: Scope, name: &str) -> Result<()> {
        self.functions.get(scope)?.delete(name)?;
        info!(%scope, name, "function deleted");
        Ok(())
    }

    pub fn get_config(&self, scope: Scope) -> Result<ConfigContent> {
        Ok(ConfigContent {
            content: self.config.get(scope)?.read()?,
            scope,
        })
    }

    /// Replace a scope's config blob atomically.
    pub fn set_config(&self, scope: Scope, content: &str) -> Result<()> {
        self.config.get(scope)?.replace(content)?;
        info!(%scope, bytes = content.len(), "config written");
        Ok(())
    }

    /// Registry stored in the local config file.
    pub fn plugins(&self) -> PluginRegistry<'_> {
        PluginRegistry::new(&self.config.local, self.probe.as_ref())
    }

    /// Read every fragment file under one set of read locks.
    ///
    /// Locks are taken tree first, then per file in scope order (shared,
    /// local) and kind order (config, aliases, functions).
    pub fn snapshot(&self) -> Result<Snapshot> {
        let _tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);

        let files: Vec<(Scope, FragmentKind, &FragmentFile)> = Scope::writable()
            .into_iter()
            .flat_map(|scope| {
                FragmentKind::all()
                    .into_iter()
                    .filter_map(move |kind| Some((scope, kind, self.file(kind, scope).ok()?)))
            })
            .collect();
        let _guards: Vec<_> = files.iter().map(|(_, _, file)| file.read_guard()).collect();

        let mut snapshot = Snapshot::default();
        for (scope, kind, file) in files {
            let text = file.read_unlocked()?;
            match kind {
                FragmentKind::Aliases => snapshot.aliases.extend(
                    FragmentStore::<AliasCodec>::entities(&text)
                        .into_iter()
                        .map(|alias| (scope, alias)),
                ),
                FragmentKind::Functions => snapshot.functions.extend(
                    FragmentStore::<FunctionCodec>::entities(&text)
                        .into_iter()
                        .map(|function| (scope, function)),
                ),
                FragmentKind::Config if scope == Scope::Shared => snapshot.shared_config = text,
                FragmentKind::Config => {
                    snapshot.plugins = parse_registry(&text);
                    snapshot.local_config = text;
                }
            }
        }

        Ok(snapshot)
    }

    fn file(&self, kind: FragmentKind, scope: Scope) -> Result<&FragmentFile> {
        Ok(match kind {
            FragmentKind::Aliases => self.aliases.get(scope)?.file(),
            FragmentKind::Functions => self.functions.get(scope)?.file(),
            FragmentKind::Config => self.config.get(scope)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::OhMyZshProbe;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn store() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::at(dir.path());
        let store = ConfigStore::new(&workspace, Box::new(OhMyZshProbe::default()));
        (dir, store)
    }

    #[test]
    fn test_add_and_list_shared_alias() {
        let (_dir, store) = store();
        store.add_alias(Scope::Shared, &Alias::new("ll", "ls -lah")).unwrap();

        assert_eq!(
            store.list_aliases(Scope::Shared).unwrap(),
            vec![Alias::new("ll", "ls -lah")]
        );
        assert!(store.list_aliases(Scope::Local).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_alias_in_same_scope() {
        let (_dir, store) = store();
        store.add_alias(Scope::Shared, &Alias::new("ll", "ls -lah")).unwrap();
        let err = store
            .add_alias(Scope::Shared, &Alias::new("ll", "ls -l"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
        assert_eq!(store.list_aliases(Scope::Shared).unwrap().len(), 1);
    }

    #[test]
    fn test_same_name_in_different_scopes() {
        let (_dir, store) = store();
        store.add_alias(Scope::Shared, &Alias::new("ll", "ls -lah")).unwrap();
        store.add_alias(Scope::Local, &Alias::new("ll", "exa -l")).unwrap();
        store
            .add_function(Scope::Shared, &ShellFunction::new("ll", "ls -l \"$@\""))
            .unwrap();
        assert_eq!(store.list_aliases(Scope::Local).unwrap()[0].command, "exa -l");
    }

    #[test]
    fn test_secrets_scope_is_read_only() {
        let (dir, store) = store();
        fs::create_dir_all(dir.path().join("local")).unwrap();
        fs::write(dir.path().join("local/secrets.zsh"), "alias vpn='openvpn ~/work.ovpn'\n").unwrap();

        assert_eq!(store.list_aliases(Scope::Secrets).unwrap().len(), 1);
        assert_eq!(store.list_secrets_aliases().unwrap()[0].name, "vpn");
        assert!(store.list_functions(Scope::Secrets).unwrap().is_empty());

        let alias = Alias::new("x", "y");
        assert!(matches!(
            store.add_alias(Scope::Secrets, &alias),
            Err(Error::ReadOnlyScope(Scope::Secrets))
        ));
        assert!(matches!(
            store.update_alias(Scope::Secrets, "vpn", &alias),
            Err(Error::ReadOnlyScope(_))
        ));
        assert!(matches!(
            store.delete_alias(Scope::Secrets, "vpn"),
            Err(Error::ReadOnlyScope(_))
        ));
        assert!(matches!(
            store.add_function(Scope::Secrets, &ShellFunction::new("f", "true")),
            Err(Error::ReadOnlyScope(_))
        ));
        assert!(matches!(store.get_config(Scope::Secrets), Err(Error::ReadOnlyScope(_))));
        assert!(matches!(
            store.set_config(Scope::Secrets, "x"),
            Err(Error::ReadOnlyScope(_))
        ));
    }

    #[test]
    fn test_config_get_set() {
        let (dir, store) = store();
        assert_eq!(store.get_config(Scope::Local).unwrap().content, "");

        store.set_config(Scope::Local, "export EDITOR=nvim\n").unwrap();
        let config = store.get_config(Scope::Local).unwrap();
        assert_eq!(config.content, "export EDITOR=nvim\n");
        assert_eq!(config.scope, Scope::Local);
        assert!(dir.path().join("local/config.zsh").exists());
    }

    #[test]
    fn test_function_crud() {
        let (_dir, store) = store();
        let mkcd = ShellFunction::new("mkcd", "mkdir -p \"$1\" && cd \"$1\"");
        store.add_function(Scope::Local, &mkcd).unwrap();
        store
            .update_function(Scope::Local, "mkcd", &ShellFunction::new("md", "mkdir -p \"$1\""))
            .unwrap();

        let listed = store.list_functions(Scope::Local).unwrap();
        assert_eq!(listed, vec![ShellFunction::new("md", "mkdir -p \"$1\"")]);

        store.delete_function(Scope::Local, "md").unwrap();
        assert!(store.list_functions(Scope::Local).unwrap().is_empty());
        assert!(matches!(
            store.delete_function(Scope::Local, "md"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_plugins_share_local_config_file() {
        let (_dir, store) = store();
        store
            .set_config(Scope::Local, "plugins=(git)\nexport EDITOR=nvim\n")
            .unwrap();
        store.plugins().add("fzf").unwrap();

        assert_eq!(
            store.get_config(Scope::Local).unwrap().content,
            "plugins=(git fzf)\nexport EDITOR=nvim\n"
        );
    }

    #[test]
    fn test_snapshot_collects_all_scopes() {
        let (_dir, store) = store();
        store.add_alias(Scope::Shared, &Alias::new("a", "1")).unwrap();
        store.add_alias(Scope::Local, &Alias::new("b", "2")).unwrap();
        store
            .add_function(Scope::Shared, &ShellFunction::new("f", "true"))
            .unwrap();
        store.set_config(Scope::Shared, "setopt autocd\n").unwrap();
        store.set_config(Scope::Local, "plugins=(git)\n").unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(
            snapshot.aliases,
            vec![(Scope::Shared, Alias::new("a", "1")), (Scope::Local, Alias::new("b", "2"))]
        );
        assert_eq!(snapshot.functions.len(), 1);
        assert_eq!(snapshot.shared_config, "setopt autocd\n");
        assert_eq!(snapshot.plugins, vec!["git"]);
    }

    #[test]
    fn test_concurrent_mutations_across_scopes() {
        let (_dir, store) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let scope = if i % 2 == 0 { Scope::Shared } else { Scope::Local };
                    store.add_alias(scope, &Alias::new(format!("a{i}"), "true")).unwrap();
                    store.snapshot().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.list_aliases(Scope::Shared).unwrap().len(), 3);
        assert_eq!(store.list_aliases(Scope::Local).unwrap().len(), 3);
    }
}
