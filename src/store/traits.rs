use super::errors::StoreError;
use super::hash::Hash;
use super::object::Commit;

/// Object-graph operations: blobs, trees, commits, and ancestry.
///
/// This is the capability the log layer is written against; it never touches
/// the filesystem implementation directly.
pub trait ObjectStore {
    /// Write a blob and return its content address. Writing existing content
    /// is a no-op that returns the same address.
    fn write_blob(&self, contents: &[u8]) -> Result<Hash, StoreError>;

    /// Read a blob's contents by address.
    fn read_blob(&self, id: Hash) -> Result<Vec<u8>, StoreError>;

    /// Write a tree from (name, id) entries and return its address.
    fn write_tree(&self, entries: &[(String, Hash)]) -> Result<Hash, StoreError>;

    /// The address of the empty tree.
    fn empty_tree(&self) -> Result<Hash, StoreError> {
        self.write_tree(&[])
    }

    /// Read a commit object by address.
    fn get_commit(&self, id: Hash) -> Result<Commit, StoreError>;

    fn get_commit_message(&self, id: Hash) -> Result<String, StoreError> {
        Ok(self.get_commit(id)?.message)
    }

    fn get_commit_parent_ids(&self, id: Hash) -> Result<Vec<Hash>, StoreError> {
        Ok(self.get_commit(id)?.parents)
    }

    /// Commit `tree` onto `ref_name` with the current ref target (if any) as
    /// the sole parent, then advance the ref. Returns the new commit id.
    ///
    /// When `sign` is set the commit is signed with the store's configured
    /// key; without one the call fails and the ref is unchanged.
    fn commit(&self, tree: Hash, ref_name: &str, message: &str, sign: bool)
        -> Result<Hash, StoreError>;

    /// As [`commit`](ObjectStore::commit), signing with explicitly supplied
    /// key material instead of the configured key.
    fn commit_using_key(
        &self,
        tree: Hash,
        ref_name: &str,
        message: &str,
        key_bytes: &[u8],
    ) -> Result<Hash, StoreError>;

    /// Does the commit at `tip` have `query` as an ancestor? A commit is
    /// considered its own ancestor.
    fn knows_commit(&self, tip: Hash, query: Hash) -> Result<bool, StoreError>;
}

/// Reference operations.
pub trait RefStore {
    /// Resolve a fully qualified ref name to its target. `NotFound` when the
    /// ref is unset.
    fn get_reference(&self, name: &str) -> Result<Hash, StoreError>;

    /// Set a ref unconditionally.
    fn set_reference(&self, name: &str, target: Hash) -> Result<(), StoreError>;

    /// Atomically update a ref from an expected old target (zero = unset) to
    /// a new one. `Conflict` when the stored target differs from `expected`.
    fn compare_and_set_reference(
        &self,
        name: &str,
        expected: Hash,
        target: Hash,
    ) -> Result<(), StoreError>;

    /// Delete a ref. Deleting an unset ref is a no-op.
    fn delete_reference(&self, name: &str) -> Result<(), StoreError>;

    /// Enumerate all refs with their targets.
    fn list_references(&self) -> Result<Vec<(String, Hash)>, StoreError>;

    /// Canonicalize a ref shorthand ("main") to its absolute form
    /// ("refs/heads/main"). Absolute names pass through unchanged.
    fn absolute_reference(&self, name: &str) -> Result<String, StoreError>;
}

/// Combined store capability consumed by the log layer.
pub trait Store: ObjectStore + RefStore {}

impl<T: ObjectStore + RefStore> Store for T {}
