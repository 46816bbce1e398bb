//! Object and ref transfer between stores.
//!
//! A remote is another store at a filesystem path, registered by name.
//! Transfers copy missing objects first and update refs last, so an
//! interrupted transfer never leaves a ref pointing at objects the
//! destination does not have.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::StoreError;
use super::filesystem::FilesystemStore;
use super::hash::Hash;
use super::object::{self, ObjectKind};
use super::traits::{ObjectStore, RefStore};

/// Cooperative cancellation for transfer operations.
///
/// Observed between object copies and before ref updates; a cancelled
/// transfer returns promptly and never performs a partial ref update.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn split_refspec(spec: &str) -> Result<(&str, &str), StoreError> {
    spec.split_once(':')
        .ok_or_else(|| StoreError::Transport(format!("malformed refspec: {}", spec)))
}

/// Copy every object reachable from `tip` that `to` is missing.
fn copy_objects(
    from: &FilesystemStore,
    to: &FilesystemStore,
    tip: Hash,
    cancel: &CancelToken,
) -> Result<(), StoreError> {
    let mut pending = vec![tip];
    let mut copied = 0usize;

    while let Some(id) = pending.pop() {
        cancel.check()?;
        if to.has_object(id) {
            continue;
        }

        let framed = from.read_raw_object(id)?;
        let (kind, body) = object::unframe(&framed)?;
        match kind {
            ObjectKind::Commit => {
                let commit = object::Commit::decode_body(body)?;
                pending.push(commit.tree);
                pending.extend(commit.parents);
            }
            ObjectKind::Tree => {
                for (_, entry_id) in object::decode_tree(body)? {
                    pending.push(entry_id);
                }
            }
            ObjectKind::Blob => {}
        }

        to.write_raw_object(&framed)?;
        copied += 1;
    }

    tracing::debug!(copied, tip = %tip, "copied objects");
    Ok(())
}

/// Fast-forward-only ref update: the old target must be unset, equal, or an
/// ancestor of the new one.
fn update_ref_fast_forward_only(
    store: &FilesystemStore,
    name: &str,
    new_target: Hash,
) -> Result<(), StoreError> {
    let old = match store.get_reference(name) {
        Ok(old) => old,
        Err(StoreError::NotFound) => {
            return store.compare_and_set_reference(name, super::hash::ZERO_HASH, new_target);
        }
        Err(e) => return Err(e),
    };

    if old == new_target {
        return Ok(());
    }
    if !store.knows_commit(new_target, old)? {
        return Err(StoreError::Conflict);
    }
    store.compare_and_set_reference(name, old, new_target)
}

impl FilesystemStore {
    fn open_remote(&self, name: &str) -> Result<FilesystemStore, StoreError> {
        let path = self.remote_path(name)?;
        let remote = FilesystemStore::new(&path)?;
        if !remote.path().join("objects").is_dir() {
            return Err(StoreError::Transport(format!(
                "remote '{}' has no store at {}",
                name, path
            )));
        }
        Ok(remote)
    }

    /// Fetch the given `src:dst` refspecs from a named remote. Destination
    /// refs are updated fast-forward-only after all objects have landed.
    ///
    /// A remote with no refs at all fails with `EmptyRemoteRepository`.
    pub fn fetch_refspecs(
        &self,
        remote_name: &str,
        refspecs: &[&str],
        cancel: &CancelToken,
    ) -> Result<(), StoreError> {
        let remote = self.open_remote(remote_name)?;
        if remote.read_state()?.refs.is_empty() {
            return Err(StoreError::EmptyRemoteRepository);
        }

        for spec in refspecs {
            let (src, dst) = split_refspec(spec)?;
            let remote_tip = remote.get_reference(src)?;
            copy_objects(&remote, self, remote_tip, cancel)?;
            cancel.check()?;
            update_ref_fast_forward_only(self, dst, remote_tip)?;
            tracing::debug!(remote = remote_name, src, dst, tip = %remote_tip, "fetched ref");
        }
        Ok(())
    }

    /// Fetch refs under their own names, fast-forward-only.
    pub fn fetch(
        &self,
        remote_name: &str,
        refs: &[&str],
        cancel: &CancelToken,
    ) -> Result<(), StoreError> {
        let refspecs: Vec<String> = refs.iter().map(|r| format!("{}:{}", r, r)).collect();
        let refspecs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
        self.fetch_refspecs(remote_name, &refspecs, cancel)
    }

    /// Push refs to a named remote under their own names, fast-forward-only.
    /// The remote's rejection of a non-fast-forward surfaces as `Conflict`.
    pub fn push(
        &self,
        remote_name: &str,
        refs: &[&str],
        cancel: &CancelToken,
    ) -> Result<(), StoreError> {
        let remote = self.open_remote(remote_name)?;

        for name in refs {
            let local_tip = self.get_reference(name)?;
            copy_objects(self, &remote, local_tip, cancel)?;
            cancel.check()?;
            update_ref_fast_forward_only(&remote, name, local_tip)?;
            tracing::debug!(remote = remote_name, name, tip = %local_tip, "pushed ref");
        }
        Ok(())
    }
}
