//! Plugin registry: the `plugins=(...)` line of the local config file,
//! annotated against a static catalog of common oh-my-zsh plugins.

use std::env;
use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::codec::patterns::PLUGINS_RE;
use crate::error::Result;
use crate::model::{validate_name, Plugin};
use crate::store::fragment::FragmentFile;
use crate::store::text;

const BUILTIN: &str = "Built-in Oh-My-Zsh plugin - no installation required";

/// Catalog metadata for one plugin.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub repository: &'static str,
    pub install_command: &'static str,
}

const fn builtin(name: &'static str, description: &'static str, repository: &'static str) -> CatalogEntry {
    CatalogEntry {
        name,
        description,
        repository,
        install_command: BUILTIN,
    }
}

pub const CATALOG: &[CatalogEntry] = &[
    builtin("git", "Git aliases and functions", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/git"),
    CatalogEntry {
        name: "zsh-autosuggestions",
        description: "Fish-like autosuggestions for zsh",
        repository: "https://github.com/zsh-users/zsh-autosuggestions",
        install_command: "cd ~/.oh-my-zsh/custom/plugins\ngit clone https://github.com/zsh-users/zsh-autosuggestions",
    },
    CatalogEntry {
        name: "zsh-syntax-highlighting",
        description: "Fish shell like syntax highlighting for Zsh",
        repository: "https://github.com/zsh-users/zsh-syntax-highlighting",
        install_command: "cd ~/.oh-my-zsh/custom/plugins\ngit clone https://github.com/zsh-users/zsh-syntax-highlighting.git",
    },
    CatalogEntry {
        name: "alias-tips",
        description: "Help remember your aliases by showing tips when you type a command",
        repository: "https://github.com/djui/alias-tips",
        install_command: "cd ~/.oh-my-zsh/custom/plugins\ngit clone https://github.com/djui/alias-tips.git",
    },
    CatalogEntry {
        name: "fzf",
        description: "Fuzzy finder integration for command history and file search",
        repository: "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/fzf",
        install_command: "Built-in Oh-My-Zsh plugin - requires fzf to be installed:\nsudo apt install fzf  # Ubuntu/Debian\nbrew install fzf      # macOS",
    },
    CatalogEntry {
        name: "fzf-tab",
        description: "Replace zsh tab completion with fzf",
        repository: "https://github.com/Aloxaf/fzf-tab",
        install_command: "cd ~/.oh-my-zsh/custom/plugins\ngit clone https://github.com/Aloxaf/fzf-tab",
    },
    builtin("docker", "Docker completion and aliases", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/docker"),
    builtin("docker-compose", "Docker-compose completion", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/docker-compose"),
    builtin("kubectl", "Kubectl completion and aliases", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/kubectl"),
    builtin("npm", "NPM completion and aliases", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/npm"),
    builtin("node", "Node.js completion", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/node"),
    builtin("rust", "Rust and Cargo completion", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/rust"),
    builtin("python", "Python completion and utilities", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/python"),
    builtin("sudo", "Easily prefix your commands with sudo by pressing ESC twice", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/sudo"),
    builtin("web-search", "Search the web from your terminal", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/web-search"),
    builtin("history", "Enhanced history utilities", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/history"),
    builtin("colored-man-pages", "Colorize man pages", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/colored-man-pages"),
    builtin("command-not-found", "Suggest package to install when command not found", "https://github.com/ohmyzsh/ohmyzsh/tree/master/plugins/command-not-found"),
];

pub fn catalog_entry(name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.name == name)
}

/// Reports whether a plugin is present on this machine.
pub trait PluginProbe: Send + Sync {
    fn is_installed(&self, name: &str) -> bool;
}

/// Looks for a plugin directory under the oh-my-zsh plugin roots.
#[derive(Debug, Clone, Default)]
pub struct OhMyZshProbe {
    dirs: Vec<PathBuf>,
}

impl OhMyZshProbe {
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// `$ZSH/plugins`, `$ZSH_CUSTOM/plugins` (both defaulting under
    /// `~/.oh-my-zsh`), followed by `extra`.
    pub fn from_env(extra: &[PathBuf]) -> Self {
        let zsh = env::var_os("ZSH").map(PathBuf::from).or_else(|| {
            directories::BaseDirs::new().map(|base| base.home_dir().join(".oh-my-zsh"))
        });
        let custom = env::var_os("ZSH_CUSTOM")
            .map(PathBuf::from)
            .or_else(|| zsh.as_ref().map(|zsh| zsh.join("custom")));

        let mut dirs: Vec<PathBuf> = [zsh, custom]
            .into_iter()
            .flatten()
            .map(|root| root.join("plugins"))
            .collect();
        dirs.extend(extra.iter().cloned());
        Self { dirs }
    }
}

impl PluginProbe for OhMyZshProbe {
    fn is_installed(&self, name: &str) -> bool {
        self.dirs.iter().any(|dir| dir.join(name).is_dir())
    }
}

/// Registry identifiers in file order. A file without a registry line has
/// no enabled plugins.
pub fn parse_registry(text: &str) -> Vec<String> {
    PLUGINS_RE
        .captures(text)
        .map(|caps| caps[2].split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Rewrite the registry line in place as a single line, or append one.
fn rewrite_registry(text: &str, names: &[String]) -> String {
    let line = format!("plugins=({})", names.join(" "));
    let found = PLUGINS_RE
        .captures(text)
        .and_then(|caps| Some((caps.get(0)?.range(), caps.get(1)?.as_str())));

    match found {
        Some((range, indent)) => format!(
            "{}{indent}{line}{}",
            &text[..range.start],
            &text[range.end..]
        ),
        None => text::append_block(text, &format!("{line}\n")),
    }
}

/// View of the registry line inside one config file.
pub struct PluginRegistry<'a> {
    file: &'a FragmentFile,
    probe: &'a dyn PluginProbe,
}

impl<'a> PluginRegistry<'a> {
    pub fn new(file: &'a FragmentFile, probe: &'a dyn PluginProbe) -> Self {
        Self { file, probe }
    }

    pub fn list_enabled(&self) -> Result<Vec<String>> {
        Ok(parse_registry(&self.file.read()?))
    }

    /// Enabled plugins in registry order, with catalog metadata when known.
    pub fn enabled(&self) -> Result<Vec<Plugin>> {
        Ok(self
            .list_enabled()?
            .into_iter()
            .map(|name| self.describe(&name, true))
            .collect())
    }

    /// The whole catalog annotated with enabled and installed state.
    pub fn list_available(&self) -> Result<Vec<Plugin>> {
        let enabled = self.list_enabled()?;
        Ok(CATALOG
            .iter()
            .map(|entry| self.describe(entry.name, enabled.iter().any(|n| n == entry.name)))
            .collect())
    }

    /// Enable a plugin. Returns `false` when it was already enabled.
    #[instrument(level = "debug", skip(self))]
    pub fn add(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let changed = self.file.modify(|current| {
            let mut names = parse_registry(current);
            if names.iter().any(|n| n == name) {
                return Ok(None);
            }
            names.push(name.to_string());
            Ok(Some(rewrite_registry(current, &names)))
        })?;
        debug!(changed, "plugin enable");
        Ok(changed)
    }

    /// Disable a plugin. Returns `false` when it was not enabled.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, name: &str) -> Result<bool> {
        let changed = self.file.modify(|current| {
            let mut names = parse_registry(current);
            let before = names.len();
            names.retain(|n| n != name);
            if names.len() == before {
                return Ok(None);
            }
            Ok(Some(rewrite_registry(current, &names)))
        })?;
        debug!(changed, "plugin disable");
        Ok(changed)
    }

    fn describe(&self, name: &str, enabled: bool) -> Plugin {
        let entry = catalog_entry(name);
        Plugin {
            name: name.to_string(),
            description: entry.map(|e| e.description.to_string()),
            repository: entry.map(|e| e.repository.to_string()),
            install_command: entry.map(|e| e.install_command.to_string()),
            enabled,
            installed: self.probe.is_installed(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct FixedProbe(&'static [&'static str]);

    impl PluginProbe for FixedProbe {
        fn is_installed(&self, name: &str) -> bool {
            self.0.contains(&name)
        }
    }

    fn config_file(dir: &TempDir, contents: Option<&str>) -> FragmentFile {
        let path = dir.path().join("config.zsh");
        if let Some(contents) = contents {
            fs::write(&path, contents).unwrap();
        }
        FragmentFile::new(path)
    }

    #[test]
    fn test_catalog_has_unique_names() {
        assert_eq!(CATALOG.len(), 18);
        for (i, entry) in CATALOG.iter().enumerate() {
            assert!(CATALOG[i + 1..].iter().all(|other| other.name != entry.name));
        }
    }

    #[test]
    fn test_parse_registry() {
        assert_eq!(parse_registry("plugins=(git fzf)\n"), vec!["git", "fzf"]);
        assert_eq!(parse_registry("  plugins=(\n    git\n    docker\n  )\n"), vec!["git", "docker"]);
        assert!(parse_registry("plugins=()\n").is_empty());
        assert!(parse_registry("export ZSH=~/.oh-my-zsh\n").is_empty());
    }

    #[test]
    fn test_add_preserves_order_and_surroundings() {
        let dir = TempDir::new().unwrap();
        let file = config_file(&dir, Some("export ZSH=$HOME/.oh-my-zsh\nplugins=(git fzf)\nsource $ZSH/oh-my-zsh.sh\n"));
        let probe = FixedProbe(&[]);
        let registry = PluginRegistry::new(&file, &probe);

        assert!(registry.add("docker").unwrap());
        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            "export ZSH=$HOME/.oh-my-zsh\nplugins=(git fzf docker)\nsource $ZSH/oh-my-zsh.sh\n"
        );
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = config_file(&dir, Some("plugins=(\n  git\n)\n"));
        let probe = FixedProbe(&[]);
        let registry = PluginRegistry::new(&file, &probe);

        assert!(!registry.add("git").unwrap());
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "plugins=(\n  git\n)\n");
    }

    #[test]
    fn test_add_without_registry_line_appends_one() {
        let dir = TempDir::new().unwrap();
        let file = config_file(&dir, Some("export EDITOR=nvim\n"));
        let probe = FixedProbe(&[]);
        let registry = PluginRegistry::new(&file, &probe);

        registry.add("git").unwrap();
        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            "export EDITOR=nvim\n\nplugins=(git)\n"
        );

        let missing = FragmentFile::new(dir.path().join("absent.zsh"));
        PluginRegistry::new(&missing, &probe).add("fzf").unwrap();
        assert_eq!(fs::read_to_string(missing.path()).unwrap(), "plugins=(fzf)\n");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = config_file(&dir, Some("plugins=(git fzf docker)\n"));
        let probe = FixedProbe(&[]);
        let registry = PluginRegistry::new(&file, &probe);

        assert!(registry.remove("fzf").unwrap());
        assert!(!registry.remove("fzf").unwrap());
        assert_eq!(registry.list_enabled().unwrap(), vec!["git", "docker"]);
        assert!(!registry.remove("zsh-autosuggestions").unwrap());
    }

    #[test]
    fn test_list_available_annotations() {
        let dir = TempDir::new().unwrap();
        let file = config_file(&dir, Some("plugins=(git my-own)\n"));
        let probe = FixedProbe(&["git", "sudo"]);
        let registry = PluginRegistry::new(&file, &probe);

        let available = registry.list_available().unwrap();
        assert_eq!(available.len(), CATALOG.len());
        let git = available.iter().find(|p| p.name == "git").unwrap();
        assert!(git.enabled && git.installed);
        let sudo = available.iter().find(|p| p.name == "sudo").unwrap();
        assert!(!sudo.enabled && sudo.installed);

        let enabled = registry.enabled().unwrap();
        assert_eq!(enabled.len(), 2);
        assert_eq!(enabled[1].name, "my-own");
        assert!(enabled[1].description.is_none());
    }

    #[test]
    fn test_oh_my_zsh_probe_checks_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("plugins/fzf-tab")).unwrap();
        let probe = OhMyZshProbe::with_dirs(vec![dir.path().join("plugins")]);

        assert!(probe.is_installed("fzf-tab"));
        assert!(!probe.is_installed("alias-tips"));
    }
}
