//! Synchronization engine for the shared scope, built on `git2`.
//!
//! Nothing is cached between calls: every operation opens the repository,
//! derives what it needs and returns. All operations hold the shared tree
//! lock exclusively, so they are serialized against each other and against
//! fragment writes inside the shared directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use chrono::{DateTime, FixedOffset};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Commit, Cred, CredentialType, DiffFormat, ErrorCode, FetchOptions,
    IndexAddOption, Oid, PushOptions, RemoteCallbacks, Repository, RepositoryInitOptions,
    Signature, Sort, Status, StatusOptions,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::model::{GitCommit, GitStatus};
use crate::workspace::{Workspace, WorkspacePath};

const INITIAL_BRANCH: &str = "main";
const INITIAL_MESSAGE: &str = "Initial commit";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Result of a successful pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PullOutcome {
    UpToDate,
    FastForward { commits: usize },
    Merged { commit: String },
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PushOutcome {
    UpToDate,
    Pushed { commits: usize },
}

/// Upstream of the current branch, from `branch.<name>.*` config.
#[derive(Debug)]
struct Tracking {
    remote: String,
    /// `refs/heads/<branch>` on the remote
    merge: String,
    /// `refs/remotes/<remote>/<branch>` locally
    tracking_ref: String,
}

pub struct SyncEngine {
    root: PathBuf,
    remote: String,
    author: Option<(String, String)>,
    tree_lock: Arc<RwLock<()>>,
}

impl SyncEngine {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            root: workspace.path(WorkspacePath::Shared),
            remote: "origin".to_string(),
            author: None,
            tree_lock: workspace.tree_lock(),
        }
    }

    /// Remote used by `connect`, `clone` and as the fallback tracking remote.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Author used when git config has no `user.name`/`user.email`.
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author = Some((name.into(), email.into()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_initialized(&self) -> bool {
        self.root.join(".git").exists()
    }

    #[instrument(skip(self))]
    pub fn status(&self) -> Result<GitStatus> {
        let _guard = self.lock();
        let repo = self.open()?;
        status_of(&repo)
    }

    /// Stage everything under the root and commit. Returns the new hash.
    #[instrument(skip(self))]
    pub fn commit(&self, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let _guard = self.lock();
        let repo = self.open()?;
        if status_of(&repo)?.clean {
            return Err(Error::NothingToCommit);
        }

        let oid = self.commit_all(&repo, message)?;
        info!(hash = %oid, "committed");
        Ok(oid.to_string())
    }

    /// Up to `limit` commits reachable from HEAD, newest first.
    #[instrument(skip(self))]
    pub fn log(&self, limit: i64) -> Result<Vec<GitCommit>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let _guard = self.lock();
        let repo = self.open()?;
        if head_oid(&repo)?.is_none() {
            return Ok(Vec::new());
        }

        let mut walk = repo.revwalk().map_err(Error::git("walk history"))?;
        walk.push_head().map_err(Error::git("walk history"))?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(Error::git("walk history"))?;

        walk.take(limit as usize)
            .map(|oid| {
                let oid = oid.map_err(Error::git("walk history"))?;
                let commit = repo.find_commit(oid).map_err(Error::git("read commit"))?;
                Ok(describe_commit(&commit))
            })
            .collect()
    }

    /// Patch of tracked changes in the working tree against HEAD.
    #[instrument(skip(self))]
    pub fn diff(&self) -> Result<String> {
        let _guard = self.lock();
        let repo = self.open()?;

        let head_tree = match head_oid(&repo)? {
            Some(oid) => Some(
                repo.find_commit(oid)
                    .and_then(|commit| commit.tree())
                    .map_err(Error::git("read HEAD tree"))?,
            ),
            None => None,
        };
        let diff = repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), None)
            .map_err(Error::git("diff"))?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .map_err(Error::git("diff"))?;

        Ok(patch)
    }

    /// Create the repository and commit the current tree.
    #[instrument(skip(self))]
    pub fn init(&self) -> Result<String> {
        let _guard = self.lock();
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized(self.root.clone()));
        }

        fs::create_dir_all(&self.root).map_err(|e| Error::io("create directory", &self.root, e))?;
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(INITIAL_BRANCH);
        let repo = Repository::init_opts(&self.root, &opts).map_err(Error::git("init"))?;

        let oid = self.commit_all(&repo, INITIAL_MESSAGE)?;
        info!(root = %self.root.display(), hash = %oid, "repository initialized");
        Ok(oid.to_string())
    }

    /// Point the configured remote at `url` and track it from the current
    /// branch. When the remote does not have the branch yet it is pushed.
    #[instrument(skip(self))]
    pub fn connect(&self, url: &str) -> Result<()> {
        let url = Workspace::canonical_url(url);
        let _guard = self.lock();
        let repo = self.open()?;

        match repo.find_remote(&self.remote) {
            Ok(_) => repo
                .remote_set_url(&self.remote, &url)
                .map_err(Error::git("set remote url"))?,
            Err(_) => {
                repo.remote(&self.remote, &url)
                    .map_err(Error::git("create remote"))?;
            }
        }

        self.fetch(&repo, &self.remote)?;

        let branch = current_branch(&repo)?;
        let tracking = Tracking {
            remote: self.remote.clone(),
            merge: format!("refs/heads/{branch}"),
            tracking_ref: format!("refs/remotes/{}/{branch}", self.remote),
        };

        if repo.find_reference(&tracking.tracking_ref).is_err() {
            if let Some(head) = head_oid(&repo)? {
                debug!(branch = %branch, "remote lacks branch, pushing");
                self.push_ref(&repo, &tracking, &branch)?;
                repo.reference(&tracking.tracking_ref, head, true, "zdot: connect")
                    .map_err(Error::git("update tracking ref"))?;
            }
        }

        let mut config = repo.config().map_err(Error::git("open config"))?;
        config
            .set_str(&format!("branch.{branch}.remote"), &tracking.remote)
            .and_then(|_| config.set_str(&format!("branch.{branch}.merge"), &tracking.merge))
            .map_err(Error::git("set upstream"))?;

        info!(remote = %self.remote, url = %url, branch = %branch, "connected");
        Ok(())
    }

    /// Clone `url` into the shared directory.
    #[instrument(skip(self))]
    pub fn clone_remote(&self, url: &str) -> Result<()> {
        let url = Workspace::canonical_url(url);
        let _guard = self.lock();
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized(self.root.clone()));
        }

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(credential_callbacks(git2::Config::open_default().ok()));

        let remote_name = self.remote.clone();
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch);
        builder.remote_create(move |repo, _name, url| repo.remote(&remote_name, url));
        builder.clone(&url, &self.root).map_err(Error::git("clone"))?;

        info!(url = %url, root = %self.root.display(), "cloned");
        Ok(())
    }

    /// Fetch the upstream and integrate it by fast-forward or clean merge.
    #[instrument(skip(self))]
    pub fn pull(&self) -> Result<PullOutcome> {
        let _guard = self.lock();
        let repo = self.open()?;
        let branch = current_branch(&repo)?;
        let tracking = tracking(&repo, &branch)?;

        self.fetch(&repo, &tracking.remote)?;

        let Some(upstream) = repo
            .find_reference(&tracking.tracking_ref)
            .ok()
            .and_then(|reference| reference.target())
        else {
            debug!(tracking_ref = %tracking.tracking_ref, "upstream branch does not exist yet");
            return Ok(PullOutcome::UpToDate);
        };

        let annotated = repo
            .find_annotated_commit(upstream)
            .map_err(Error::git("read upstream"))?;
        let (analysis, _) = repo
            .merge_analysis(&[&annotated])
            .map_err(Error::git("merge analysis"))?;

        let outcome = if analysis.is_up_to_date() {
            PullOutcome::UpToDate
        } else if analysis.is_fast_forward() || analysis.is_unborn() {
            let commits = match head_oid(&repo)? {
                Some(head) => ahead_behind(&repo, upstream, head)?.0,
                None => count_commits(&repo, upstream)?,
            };
            fast_forward(&repo, &branch, upstream)?;
            PullOutcome::FastForward { commits }
        } else {
            let commit = self.merge(&repo, &branch, &tracking, upstream)?;
            PullOutcome::Merged {
                commit: commit.to_string(),
            }
        };

        info!(?outcome, "pulled");
        Ok(outcome)
    }

    /// Push the current branch to its upstream.
    #[instrument(skip(self))]
    pub fn push(&self) -> Result<PushOutcome> {
        let _guard = self.lock();
        let repo = self.open()?;
        let branch = current_branch(&repo)?;
        let tracking = tracking(&repo, &branch)?;

        let Some(head) = head_oid(&repo)? else {
            return Ok(PushOutcome::UpToDate);
        };

        self.fetch(&repo, &tracking.remote)?;

        let remote_head = repo
            .find_reference(&tracking.tracking_ref)
            .ok()
            .and_then(|reference| reference.target());

        let commits = match remote_head {
            Some(remote_head) => {
                let (ahead, behind) = ahead_behind(&repo, head, remote_head)?;
                if behind > 0 {
                    return Err(Error::Rejected(format!(
                        "{} has {behind} commit(s) not present locally; pull first",
                        tracking.tracking_ref.trim_start_matches("refs/remotes/")
                    )));
                }
                if ahead == 0 {
                    return Ok(PushOutcome::UpToDate);
                }
                ahead
            }
            None => count_commits(&repo, head)?,
        };

        self.push_ref(&repo, &tracking, &branch)?;
        repo.reference(&tracking.tracking_ref, head, true, "zdot: push")
            .map_err(Error::git("update tracking ref"))?;

        info!(commits, remote = %tracking.remote, "pushed");
        Ok(PushOutcome::Pushed { commits })
    }

    fn lock(&self) -> RwLockWriteGuard<'_, ()> {
        self.tree_lock
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> Result<Repository> {
        if !self.is_initialized() {
            return Err(Error::RepositoryNotInitialized(self.root.clone()));
        }
        Repository::open(&self.root).map_err(Error::git("open repository"))
    }

    /// Signature from git config, then the configured author, then the
    /// login user on this host.
    fn signature(&self, repo: &Repository) -> Result<Signature<'static>> {
        if let Ok(signature) = repo.signature() {
            return Ok(signature.to_owned());
        }
        if let Some((name, email)) = &self.author {
            return Signature::now(name, email).map_err(Error::git("create signature"));
        }

        let user = whoami::username();
        let realname = whoami::realname();
        let name = if realname.trim().is_empty() { user.clone() } else { realname };
        let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
        Signature::now(&name, &format!("{user}@{host}")).map_err(Error::git("create signature"))
    }

    fn commit_all(&self, repo: &Repository, message: &str) -> Result<Oid> {
        let mut index = repo.index().map_err(Error::git("open index"))?;
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .and_then(|_| index.update_all(["*"].iter(), None))
            .and_then(|_| index.write())
            .map_err(Error::git("stage changes"))?;
        let tree_id = index.write_tree().map_err(Error::git("write tree"))?;
        let tree = repo.find_tree(tree_id).map_err(Error::git("write tree"))?;

        let signature = self.signature(repo)?;
        let parent = match head_oid(repo)? {
            Some(oid) => Some(repo.find_commit(oid).map_err(Error::git("read HEAD"))?),
            None => None,
        };
        let parents: Vec<&Commit> = parent.iter().collect();

        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(Error::git("commit"))
    }

    fn fetch(&self, repo: &Repository, remote: &str) -> Result<()> {
        let mut remote = repo.find_remote(remote).map_err(Error::git("find remote"))?;
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(credential_callbacks(repo.config().ok()));
        remote
            .fetch(&[] as &[&str], Some(&mut opts), None)
            .map_err(Error::git("fetch"))?;
        debug!(remote = remote.name().unwrap_or_default(), "fetched");
        Ok(())
    }

    fn push_ref(&self, repo: &Repository, tracking: &Tracking, branch: &str) -> Result<()> {
        let mut remote = repo
            .find_remote(&tracking.remote)
            .map_err(Error::git("find remote"))?;
        let refspec = format!("refs/heads/{branch}:{}", tracking.merge);

        let mut rejection: Option<String> = None;
        let pushed = {
            let mut callbacks = credential_callbacks(repo.config().ok());
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejection = Some(format!("{refname}: {message}"));
                }
                Ok(())
            });
            let mut opts = PushOptions::new();
            opts.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut opts))
        };

        match pushed {
            Err(err) if err.code() == ErrorCode::NotFastForward => {
                return Err(Error::Rejected(err.message().to_string()))
            }
            Err(err) => return Err(Error::Git { op: "push", source: err }),
            Ok(()) => {}
        }
        match rejection {
            Some(message) => {
                warn!(%message, "push rejected by remote");
                Err(Error::Rejected(message))
            }
            None => Ok(()),
        }
    }

    fn merge(&self, repo: &Repository, branch: &str, tracking: &Tracking, upstream: Oid) -> Result<Oid> {
        let ours = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(Error::git("read HEAD"))?;
        let theirs = repo.find_commit(upstream).map_err(Error::git("read upstream"))?;

        let mut index = repo
            .merge_commits(&ours, &theirs, None)
            .map_err(Error::git("merge"))?;
        if index.has_conflicts() {
            let mut paths: Vec<String> = index
                .conflicts()
                .map_err(Error::git("read conflicts"))?
                .filter_map(|conflict| conflict.ok())
                .filter_map(|conflict| conflict.our.or(conflict.their).or(conflict.ancestor))
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
                .collect();
            paths.dedup();
            return Err(Error::MergeConflict(paths));
        }

        let tree_id = index.write_tree_to(repo).map_err(Error::git("write merge tree"))?;
        let tree = repo.find_tree(tree_id).map_err(Error::git("write merge tree"))?;
        repo.checkout_tree(tree.as_object(), Some(CheckoutBuilder::new().safe()))
            .map_err(Error::git("checkout merge"))?;

        let signature = self.signature(repo)?;
        let message = format!(
            "Merge {} into {branch}",
            tracking.tracking_ref.trim_start_matches("refs/remotes/")
        );
        repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &[&ours, &theirs])
            .map_err(Error::git("commit merge"))
    }
}

fn status_of(repo: &Repository) -> Result<GitStatus> {
    let branch = current_branch(repo)?;

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo
        .statuses(Some(&mut opts))
        .map_err(Error::git("read status"))?;

    let mut modified = Vec::new();
    let mut untracked = Vec::new();
    for entry in statuses.iter() {
        let path = String::from_utf8_lossy(entry.path_bytes()).into_owned();
        let status = entry.status();
        if status == Status::WT_NEW {
            untracked.push(path);
        } else if !status.is_ignored() && status != Status::CURRENT {
            modified.push(path);
        }
    }

    let (ahead, behind) = upstream_counts(repo, &branch)?;

    Ok(GitStatus {
        clean: modified.is_empty() && untracked.is_empty(),
        branch,
        ahead: ahead as u32,
        behind: behind as u32,
        modified,
        untracked,
    })
}

/// Ahead/behind relative to the upstream; zero when there is none.
fn upstream_counts(repo: &Repository, branch: &str) -> Result<(usize, usize)> {
    let Ok(local) = repo.find_branch(branch, BranchType::Local) else {
        return Ok((0, 0));
    };
    let Ok(upstream) = local.upstream() else {
        return Ok((0, 0));
    };
    match (local.get().target(), upstream.get().target()) {
        (Some(local), Some(upstream)) => ahead_behind(repo, local, upstream),
        _ => Ok((0, 0)),
    }
}

fn ahead_behind(repo: &Repository, local: Oid, upstream: Oid) -> Result<(usize, usize)> {
    repo.graph_ahead_behind(local, upstream)
        .map_err(Error::git("compute ahead/behind"))
}

fn count_commits(repo: &Repository, tip: Oid) -> Result<usize> {
    let mut walk = repo.revwalk().map_err(Error::git("walk history"))?;
    walk.push(tip).map_err(Error::git("walk history"))?;
    Ok(walk.count())
}

fn head_oid(repo: &Repository) -> Result<Option<Oid>> {
    match repo.head() {
        Ok(head) => Ok(head.target()),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(err) => Err(Error::Git {
            op: "read HEAD",
            source: err,
        }),
    }
}

fn current_branch(repo: &Repository) -> Result<String> {
    match repo.head() {
        Ok(head) => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            let head = repo
                .find_reference("HEAD")
                .map_err(Error::git("read HEAD"))?;
            Ok(head
                .symbolic_target()
                .and_then(|target| target.strip_prefix("refs/heads/"))
                .unwrap_or("HEAD")
                .to_string())
        }
        Err(err) => Err(Error::Git {
            op: "read HEAD",
            source: err,
        }),
    }
}

fn tracking(repo: &Repository, branch: &str) -> Result<Tracking> {
    let config = repo.config().map_err(Error::git("open config"))?;
    let no_upstream = |_| Error::NoUpstream(branch.to_string());

    let remote = config
        .get_string(&format!("branch.{branch}.remote"))
        .map_err(no_upstream)?;
    let merge = config
        .get_string(&format!("branch.{branch}.merge"))
        .map_err(no_upstream)?;
    let short = merge.strip_prefix("refs/heads/").unwrap_or(&merge).to_string();

    Ok(Tracking {
        tracking_ref: format!("refs/remotes/{remote}/{short}"),
        remote,
        merge,
    })
}

fn fast_forward(repo: &Repository, branch: &str, target: Oid) -> Result<()> {
    let object = repo
        .find_object(target, None)
        .map_err(Error::git("read upstream"))?;
    repo.checkout_tree(&object, Some(CheckoutBuilder::new().safe()))
        .map_err(Error::git("checkout"))?;

    let refname = format!("refs/heads/{branch}");
    repo.reference(&refname, target, true, "zdot: fast-forward")
        .map_err(Error::git("update branch"))?;
    repo.set_head(&refname).map_err(Error::git("update HEAD"))?;
    Ok(())
}

fn describe_commit(commit: &Commit) -> GitCommit {
    let time = commit.time();
    let date = FixedOffset::east_opt(time.offset_minutes() * 60)
        .zip(DateTime::from_timestamp(time.seconds(), 0))
        .map(|(offset, utc)| utc.with_timezone(&offset).format(DATE_FORMAT).to_string())
        .unwrap_or_default();

    GitCommit {
        hash: commit.id().to_string(),
        message: commit.summary().unwrap_or_default().to_string(),
        author: commit.author().name().unwrap_or("unknown").to_string(),
        date,
    }
}

/// Credentials: ssh-agent for SSH, the git credential helper for
/// user/password, then libgit2 defaults.
fn credential_callbacks<'a>(config: Option<git2::Config>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;

    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }

        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username.unwrap_or("git"));
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(config) = &config {
                return Cred::credential_helper(config, url, username);
            }
        }
        if allowed.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }
        Err(git2::Error::from_str("no supported credential type"))
    });

    callbacks
}
