use std::path::PathBuf;

use crate::model::{FragmentKind, Scope};
use crate::workspace::{Workspace, WorkspacePath};

/// Shell the fragment files are sourced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Shell {
    Zsh,
    Bash,
}

impl Shell {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "zsh" => Some(Shell::Zsh),
            "bash" => Some(Shell::Bash),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shell::Zsh => "zsh",
            Shell::Bash => "bash",
        }
    }

    /// Startup file, as written in instructions to the user
    pub fn rc_file(self) -> &'static str {
        match self {
            Shell::Zsh => "~/.zshrc",
            Shell::Bash => "~/.bashrc",
        }
    }
}

/// Every file a shell sources, in load order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub files: Vec<PathBuf>,
}

impl Environment {
    /// Shared before local, config before aliases before functions, then secrets
    pub fn new_from_workspace(workspace: &Workspace) -> Self {
        let mut files: Vec<PathBuf> = Scope::writable()
            .into_iter()
            .flat_map(|scope| {
                FragmentKind::all()
                    .into_iter()
                    .map(move |kind| workspace.path(WorkspacePath::Fragment(kind, scope)))
            })
            .collect();
        files.push(workspace.path(WorkspacePath::Secrets));
        Self { files }
    }

    /// Lines for inclusion in the rc file. Missing files are skipped at load time.
    pub fn format_for_shell(&self, shell: Shell) -> String {
        let header = format!("# zdot ({})", shell.as_str());
        std::iter::once(header)
            .chain(self.files.iter().map(|file| {
                let file = file.display();
                format!("[ -f \"{file}\" ] && source \"{file}\"")
            }))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Instruction for picking up changes in the running shell
pub fn reload_message(shell: Shell) -> String {
    format!("source {}", shell.rc_file())
}
