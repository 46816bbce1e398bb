use ed25519_dalek::SigningKey;
use std::fs;
use std::path::{Path, PathBuf};

use super::errors::StoreError;
use super::hash::{Hash, ZERO_HASH};
use super::object::{self, Commit, ObjectKind};
use super::signing;
use super::state::State;
use super::traits::{ObjectStore, RefStore};

/// Filesystem-backed store with SHA-256 content addressing.
///
/// Layout: `objects/<hex id>` for immutable objects, `state.yaml` for refs
/// and remote configuration. State writes go through a temp file + rename so
/// a ref update is all-or-nothing.
pub struct FilesystemStore {
    base_path: PathBuf,
    signing_key: Option<SigningKey>,
}

impl FilesystemStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StoreError> {
        Ok(FilesystemStore {
            base_path: base_path.as_ref().to_path_buf(),
            signing_key: None,
        })
    }

    /// Create directories for a new store. Safe to call on an existing one.
    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.objects_dir())?;
        if !self.state_path().exists() {
            self.write_state(&State::default())?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Configure the key used when callers request signed commits.
    pub fn set_signing_key(&mut self, key: SigningKey) {
        self.signing_key = Some(key);
    }

    fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    fn state_path(&self) -> PathBuf {
        self.base_path.join("state.yaml")
    }

    pub(crate) fn read_state(&self) -> Result<State, StoreError> {
        let state_path = self.state_path();
        if state_path.exists() {
            let content = fs::read_to_string(&state_path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(State::default())
        }
    }

    pub(crate) fn write_state(&self, state: &State) -> Result<(), StoreError> {
        let temp_path = self.base_path.join(".state.yaml.tmp");
        let yaml = serde_yaml::to_string(state)?;
        fs::write(&temp_path, yaml)?;
        fs::rename(&temp_path, self.state_path())?;
        Ok(())
    }

    pub(crate) fn update_state<F>(&self, update_fn: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut State) -> Result<(), StoreError>,
    {
        let mut state = self.read_state()?;
        update_fn(&mut state)?;
        self.write_state(&state)?;
        Ok(())
    }

    /// Register a named remote pointing at another store's path.
    pub fn add_remote(&self, name: &str, path: &str) -> Result<(), StoreError> {
        self.update_state(|state| {
            if state.remotes.contains_key(name) {
                return Err(StoreError::AlreadyExists);
            }
            state.remotes.insert(name.to_string(), path.to_string());
            Ok(())
        })
    }

    pub(crate) fn remote_path(&self, name: &str) -> Result<String, StoreError> {
        self.read_state()?
            .remotes
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::Transport(format!("remote '{}' is not configured", name)))
    }

    fn object_path(&self, id: Hash) -> PathBuf {
        self.objects_dir().join(id.to_hex())
    }

    pub(crate) fn has_object(&self, id: Hash) -> bool {
        self.object_path(id).exists()
    }

    /// Store framed object bytes received from another store, verifying the
    /// content address before anything else reads them back.
    pub(crate) fn write_raw_object(&self, framed: &[u8]) -> Result<Hash, StoreError> {
        let (kind, body) = object::unframe(framed)?;
        let id = object::object_id(kind, body);
        let path = self.object_path(id);
        if !path.exists() {
            fs::write(&path, framed)?;
        }
        Ok(id)
    }

    pub(crate) fn read_raw_object(&self, id: Hash) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }
        Ok(fs::read(&path)?)
    }

    fn write_object(&self, kind: ObjectKind, body: &[u8]) -> Result<Hash, StoreError> {
        let id = object::object_id(kind, body);
        let path = self.object_path(id);
        if !path.exists() {
            fs::write(&path, object::frame(kind, body))?;
        }
        Ok(id)
    }

    fn read_object(&self, id: Hash, expected: ObjectKind) -> Result<Vec<u8>, StoreError> {
        let framed = self.read_raw_object(id)?;
        let (kind, body) = object::unframe(&framed)?;
        if kind != expected {
            return Err(StoreError::Corrupt(format!(
                "expected {} object, found {}",
                expected.as_str(),
                kind.as_str()
            )));
        }
        if object::object_id(kind, body) != id {
            return Err(StoreError::Corrupt(format!("object {} fails its content check", id)));
        }
        Ok(body.to_vec())
    }

    fn commit_inner(
        &self,
        tree: Hash,
        ref_name: &str,
        message: &str,
        key: Option<&SigningKey>,
    ) -> Result<Hash, StoreError> {
        let parent = match self.get_reference(ref_name) {
            Ok(tip) => Some(tip),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e),
        };

        let mut commit = Commit {
            tree,
            parents: parent.into_iter().collect(),
            signature: None,
            message: message.to_string(),
        };
        if let Some(key) = key {
            commit.signature = Some(signing::sign_commit_content(key, &commit.unsigned_body()));
        }

        let id = self.write_object(ObjectKind::Commit, &commit.encode_body())?;
        self.compare_and_set_reference(ref_name, parent.unwrap_or(ZERO_HASH), id)?;
        Ok(id)
    }

    /// Check a signed commit's signature against a verifying key. The store
    /// treats the signature as opaque bytes; key selection happens above.
    pub fn verify_commit_signature(
        &self,
        id: Hash,
        key: &ed25519_dalek::VerifyingKey,
    ) -> Result<(), StoreError> {
        let commit = self.get_commit(id)?;
        let signature = commit
            .signature
            .as_deref()
            .ok_or_else(|| StoreError::Other(format!("commit {} is not signed", id)))?;
        signing::verify_commit_signature(key, &commit.unsigned_body(), signature)
    }
}

impl ObjectStore for FilesystemStore {
    fn write_blob(&self, contents: &[u8]) -> Result<Hash, StoreError> {
        self.write_object(ObjectKind::Blob, contents)
    }

    fn read_blob(&self, id: Hash) -> Result<Vec<u8>, StoreError> {
        self.read_object(id, ObjectKind::Blob)
    }

    fn write_tree(&self, entries: &[(String, Hash)]) -> Result<Hash, StoreError> {
        self.write_object(ObjectKind::Tree, &object::encode_tree(entries))
    }

    fn get_commit(&self, id: Hash) -> Result<Commit, StoreError> {
        let body = self.read_object(id, ObjectKind::Commit)?;
        Commit::decode_body(&body)
    }

    fn commit(&self, tree: Hash, ref_name: &str, message: &str, sign: bool)
        -> Result<Hash, StoreError> {
        let key = if sign {
            Some(self.signing_key.as_ref().ok_or(StoreError::NoSigningKey)?)
        } else {
            None
        };
        self.commit_inner(tree, ref_name, message, key)
    }

    fn commit_using_key(
        &self,
        tree: Hash,
        ref_name: &str,
        message: &str,
        key_bytes: &[u8],
    ) -> Result<Hash, StoreError> {
        let key = signing::signing_key_from_bytes(key_bytes)?;
        self.commit_inner(tree, ref_name, message, Some(&key))
    }

    fn knows_commit(&self, tip: Hash, query: Hash) -> Result<bool, StoreError> {
        if tip == query {
            return Ok(true);
        }

        let mut pending = vec![tip];
        let mut visited = std::collections::HashSet::new();
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            for parent in self.get_commit(id)?.parents {
                if parent == query {
                    return Ok(true);
                }
                pending.push(parent);
            }
        }
        Ok(false)
    }
}

impl RefStore for FilesystemStore {
    fn get_reference(&self, name: &str) -> Result<Hash, StoreError> {
        match self.read_state()?.refs.get(name) {
            Some(hex) => Hash::from_hex(hex),
            None => Err(StoreError::NotFound),
        }
    }

    fn set_reference(&self, name: &str, target: Hash) -> Result<(), StoreError> {
        self.update_state(|state| {
            state.refs.insert(name.to_string(), target.to_hex());
            Ok(())
        })
    }

    fn compare_and_set_reference(
        &self,
        name: &str,
        expected: Hash,
        target: Hash,
    ) -> Result<(), StoreError> {
        self.update_state(|state| {
            let current = match state.refs.get(name) {
                Some(hex) => Hash::from_hex(hex)?,
                None => ZERO_HASH,
            };
            if current != expected {
                return Err(StoreError::Conflict);
            }
            state.refs.insert(name.to_string(), target.to_hex());
            Ok(())
        })
    }

    fn delete_reference(&self, name: &str) -> Result<(), StoreError> {
        self.update_state(|state| {
            state.refs.remove(name);
            Ok(())
        })
    }

    fn list_references(&self) -> Result<Vec<(String, Hash)>, StoreError> {
        let state = self.read_state()?;
        let mut refs = Vec::with_capacity(state.refs.len());
        for (name, hex) in &state.refs {
            refs.push((name.clone(), Hash::from_hex(hex)?));
        }
        Ok(refs)
    }

    fn absolute_reference(&self, name: &str) -> Result<String, StoreError> {
        if name.starts_with("refs/") {
            return Ok(name.to_string());
        }

        let state = self.read_state()?;
        for prefix in ["refs/heads/", "refs/tags/"] {
            let candidate = format!("{}{}", prefix, name);
            if state.refs.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(StoreError::NotFound)
    }
}
