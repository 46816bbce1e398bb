//! User-facing repository façade.
//!
//! Composes the object store, the entry codec, and the log queries into the
//! operations an operator actually runs: record an entry for a ref, annotate
//! earlier entries, and keep the local log consistent with a remote one.

use thiserror::Error;
use tracing::debug;

use crate::dev;
use crate::rsl::{self, AnnotationEntry, ReferenceEntry, RslError};
use crate::store::{
    CancelToken, FilesystemStore, Hash, ObjectStore, RefStore, StoreError, ZERO_HASH,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("specified commit is not in ref")]
    CommitNotInRef,

    #[error("developer mode is not enabled")]
    NotInDevMode,

    #[error("unable to push RSL")]
    PushRejected(#[source] StoreError),

    #[error("unable to pull RSL")]
    PullRejected(#[source] StoreError),

    #[error(transparent)]
    Rsl(#[from] RslError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A repository with a reference state log.
pub struct Repository {
    store: FilesystemStore,
}

impl Repository {
    /// Open (initializing if needed) a repository at the given path.
    pub fn init<P: AsRef<std::path::Path>>(path: P) -> Result<Self, RepositoryError> {
        let store = FilesystemStore::new(path)?;
        store.initialize()?;
        Ok(Repository { store })
    }

    pub fn from_store(store: FilesystemStore) -> Self {
        Repository { store }
    }

    pub fn store(&self) -> &FilesystemStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FilesystemStore {
        &mut self.store
    }

    /// Record an RSL entry for the current state of a reference.
    ///
    /// If the latest unskipped entry for the ref already records the same
    /// target, nothing is appended.
    pub fn record_rsl_entry_for_reference(
        &self,
        ref_name: &str,
        sign_commit: bool,
    ) -> Result<(), RepositoryError> {
        debug!(ref_name, "identifying absolute reference path");
        let abs_ref_name = self.store.absolute_reference(ref_name)?;

        debug!(ref_name = abs_ref_name.as_str(), "loading current state of reference");
        let ref_tip = self.store.get_reference(&abs_ref_name)?;

        debug!("checking for existing entry for reference with same target");
        if self.is_duplicate_entry(&abs_ref_name, ref_tip)? {
            return Ok(());
        }

        debug!("creating RSL reference entry");
        ReferenceEntry::new(abs_ref_name, ref_tip).commit(&self.store, sign_commit)?;
        Ok(())
    }

    /// Record an RSL entry for an explicit target, signing with the supplied
    /// key material. Only available in developer mode.
    ///
    /// When the reference exists, the target must be reachable from its tip.
    pub fn record_rsl_entry_for_reference_at_target(
        &self,
        ref_name: &str,
        target_id: &str,
        signing_key_bytes: &[u8],
    ) -> Result<(), RepositoryError> {
        if !dev::in_dev_mode() {
            return Err(RepositoryError::NotInDevMode);
        }

        debug!(ref_name, "identifying absolute reference path");
        let abs_ref_name = self.store.absolute_reference(ref_name)?;
        let target_id = Hash::from_hex(target_id)?;

        match self.store.get_reference(&abs_ref_name) {
            Ok(ref_tip) => {
                if !self.store.knows_commit(ref_tip, target_id)? {
                    return Err(RepositoryError::CommitNotInRef);
                }
            }
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        debug!("creating RSL reference entry");
        ReferenceEntry::new(abs_ref_name, target_id)
            .commit_using_key(&self.store, signing_key_bytes)?;
        Ok(())
    }

    /// Record an annotation for one or more prior RSL entries. Every id must
    /// denote an existing entry in the log.
    pub fn record_rsl_annotation(
        &self,
        rsl_entry_ids: &[&str],
        skip: bool,
        message: &str,
        sign_commit: bool,
    ) -> Result<(), RepositoryError> {
        let mut entry_hashes = Vec::with_capacity(rsl_entry_ids.len());
        for id in rsl_entry_ids {
            let hash = Hash::from_hex(id)?;
            rsl::get_entry(&self.store, hash)?;
            entry_hashes.push(hash);
        }

        debug!("creating RSL annotation entry");
        AnnotationEntry::new(entry_hashes, skip, message).commit(&self.store, sign_commit)?;
        Ok(())
    }

    /// Check whether the RSL at the remote has updates for the local log.
    ///
    /// Returns `(has_updates, has_diverged)`: the first indicates the remote
    /// holds entries the local log lacks, the second that the two logs need
    /// to be reconciled before either side can fast-forward.
    pub fn check_remote_rsl_for_updates(
        &self,
        remote_name: &str,
        cancel: &CancelToken,
    ) -> Result<(bool, bool), RepositoryError> {
        let tracker_ref = rsl::remote_tracker_ref(remote_name);
        let refspec = format!("{}:{}", rsl::RSL_REF, tracker_ref);

        debug!(remote = remote_name, "updating remote RSL tracker");
        match self.store.fetch_refspecs(remote_name, &[refspec.as_str()], cancel) {
            Ok(()) => {}
            Err(StoreError::EmptyRemoteRepository) | Err(StoreError::NotFound) => {
                debug!("remote has no RSL to compare against");
                return Ok((false, false));
            }
            Err(e) => return Err(e.into()),
        }

        let remote_ref_state = self.store.get_reference(&tracker_ref)?;
        let local_ref_state = match self.store.get_reference(rsl::RSL_REF) {
            Ok(tip) => tip,
            Err(StoreError::NotFound) => ZERO_HASH,
            Err(e) => return Err(e.into()),
        };

        if local_ref_state.is_zero() {
            debug!("local RSL has not been initialized but remote RSL exists");
            return Ok((true, false));
        }

        if remote_ref_state == local_ref_state {
            debug!("local and remote RSLs have same state");
            return Ok((false, false));
        }

        if self.store.knows_commit(remote_ref_state, local_ref_state)? {
            debug!("remote RSL is ahead of local RSL");
            return Ok((true, false));
        }

        if self.store.knows_commit(local_ref_state, remote_ref_state)? {
            debug!("local RSL is ahead of remote RSL");
            return Ok((false, false));
        }

        debug!("local and remote RSLs have diverged");
        Ok((true, true))
    }

    /// Push the local RSL to the remote, fast-forward only. Divergent logs
    /// are rejected.
    pub fn push_rsl(&self, remote_name: &str, cancel: &CancelToken) -> Result<(), RepositoryError> {
        debug!(remote = remote_name, "pushing RSL reference");
        self.store
            .push(remote_name, &[rsl::RSL_REF], cancel)
            .map_err(RepositoryError::PushRejected)
    }

    /// Pull the remote RSL into the local log, fast-forward only. Divergent
    /// logs are rejected.
    pub fn pull_rsl(&self, remote_name: &str, cancel: &CancelToken) -> Result<(), RepositoryError> {
        debug!(remote = remote_name, "pulling RSL reference");
        self.store
            .fetch(remote_name, &[rsl::RSL_REF], cancel)
            .map_err(RepositoryError::PullRejected)
    }

    /// The log legitimately may revisit an earlier target (A, then B, then A
    /// again); only the latest unskipped entry counts for deduplication.
    fn is_duplicate_entry(
        &self,
        ref_name: &str,
        ref_tip: Hash,
    ) -> Result<bool, RepositoryError> {
        match rsl::get_latest_unskipped_reference_entry_for_ref(&self.store, ref_name) {
            Ok((latest_unskipped, _)) => Ok(latest_unskipped.target_id == ref_tip),
            Err(RslError::EntryNotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
