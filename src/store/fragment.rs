//! One physical fragment file and the structural CRUD built on top of it.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, instrument};

use super::text;
use crate::codec::{split_lines, Codec, Decoded};
use crate::error::{Error, Result};

/// A fragment file guarded by its own lock.
///
/// Files inside the version-controlled tree also hold a handle to the tree
/// lock. Writers take it shared before their own exclusive file lock, so
/// that repository operations, which take it exclusively, never observe a
/// half-finished edit.
#[derive(Debug)]
pub struct FragmentFile {
    path: PathBuf,
    lock: RwLock<()>,
    tree: Option<Arc<RwLock<()>>>,
}

impl FragmentFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
            tree: None,
        }
    }

    pub fn in_tree(path: impl Into<PathBuf>, tree: Arc<RwLock<()>>) -> Self {
        Self {
            tree: Some(tree),
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing file reads as empty.
    pub fn read(&self) -> Result<String> {
        let _tree = self.tree_guard();
        let _guard = self.read_guard();
        self.read_unlocked()
    }

    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read without locking. Callers must hold [`read_guard`](Self::read_guard).
    pub(crate) fn read_unlocked(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(Error::io("read", &self.path, err)),
        }
    }

    /// Run one read-modify-write cycle under the exclusive file lock.
    ///
    /// `edit` returns the new contents, or `None` to leave the file alone.
    /// Returns whether the file was written.
    pub fn modify<F>(&self, edit: F) -> Result<bool>
    where
        F: FnOnce(&str) -> Result<Option<String>>,
    {
        let _tree = self.tree_guard();
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        let current = self.read_unlocked()?;
        match edit(&current)? {
            Some(next) if next != current => {
                write_atomic(&self.path, &next)?;
                debug!(path = %self.path.display(), bytes = next.len(), "fragment written");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Replace the whole file.
    pub fn replace(&self, contents: &str) -> Result<()> {
        self.modify(|_| Ok(Some(contents.to_string()))).map(|_| ())
    }

    fn tree_guard(&self) -> Option<RwLockReadGuard<'_, ()>> {
        self.tree
            .as_ref()
            .map(|tree| tree.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Write through a temporary sibling and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fragment".to_string());
    let temp_path = parent.join(format!(".{file_name}.tmp"));

    let written = File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        })
        .map_err(|e| Error::io("write", &temp_path, e))
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| Error::io("rename", path, e)));

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

/// Structural CRUD over the entities one codec recognizes in one file.
#[derive(Debug)]
pub struct FragmentStore<C> {
    file: FragmentFile,
    codec: PhantomData<fn() -> C>,
}

impl<C: Codec> FragmentStore<C> {
    pub fn new(file: FragmentFile) -> Self {
        Self {
            file,
            codec: PhantomData,
        }
    }

    pub fn file(&self) -> &FragmentFile {
        &self.file
    }

    /// Entities in file order.
    pub fn list(&self) -> Result<Vec<C::Entity>> {
        Ok(Self::entities(&self.file.read()?))
    }

    pub(crate) fn entities(text: &str) -> Vec<C::Entity> {
        C::decode_all(&split_lines(text))
            .into_iter()
            .map(|decoded| decoded.entity)
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<Option<C::Entity>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|entity| C::name(entity) == name))
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.file.path().display(), name = C::name(entity)))]
    pub fn add(&self, entity: &C::Entity) -> Result<()> {
        C::validate(entity)?;
        let block = C::encode(entity);

        self.file.modify(|current| {
            let lines = split_lines(current);
            if find::<C>(&lines, C::name(entity)).is_some() {
                return Err(duplicate::<C>(C::name(entity)));
            }
            Ok(Some(text::append_block(current, &block)))
        })?;
        debug!("{} added", C::KIND);
        Ok(())
    }

    /// Replace `old_name` in place; a different `entity.name` renames it.
    #[instrument(level = "debug", skip_all, fields(path = %self.file.path().display(), old_name = old_name, name = C::name(entity)))]
    pub fn update(&self, old_name: &str, entity: &C::Entity) -> Result<()> {
        C::validate(entity)?;
        let block = C::encode(entity);
        let new_name = C::name(entity);

        self.file.modify(|current| {
            let lines = split_lines(current);
            let target = find::<C>(&lines, old_name).ok_or_else(|| not_found::<C>(old_name))?;
            if new_name != old_name && find::<C>(&lines, new_name).is_some() {
                return Err(duplicate::<C>(new_name));
            }
            Ok(Some(text::replace_span(&lines, target.span, &block)))
        })?;
        debug!("{} updated", C::KIND);
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.file.path().display(), name = name))]
    pub fn delete(&self, name: &str) -> Result<()> {
        self.file.modify(|current| {
            let lines = split_lines(current);
            let target = find::<C>(&lines, name).ok_or_else(|| not_found::<C>(name))?;
            Ok(Some(text::remove_span(&lines, target.span)))
        })?;
        debug!("{} deleted", C::KIND);
        Ok(())
    }

    /// Add, or replace an existing entity of the same name. Returns `true`
    /// when an existing entity was replaced.
    pub fn upsert(&self, entity: &C::Entity) -> Result<bool> {
        C::validate(entity)?;
        let block = C::encode(entity);
        let mut replaced = false;

        self.file.modify(|current| {
            let lines = split_lines(current);
            Ok(Some(match find::<C>(&lines, C::name(entity)) {
                Some(target) => {
                    replaced = true;
                    text::replace_span(&lines, target.span, &block)
                }
                None => text::append_block(current, &block),
            }))
        })?;
        Ok(replaced)
    }
}

fn find<C: Codec>(lines: &[&str], name: &str) -> Option<Decoded<C::Entity>> {
    C::decode_all(lines)
        .into_iter()
        .find(|decoded| C::name(&decoded.entity) == name)
}

fn not_found<C: Codec>(name: &str) -> Error {
    Error::NotFound {
        kind: C::KIND,
        name: name.to_string(),
    }
}

fn duplicate<C: Codec>(name: &str) -> Error {
    Error::DuplicateName {
        kind: C::KIND,
        name: name.to_string(),
    }
}
