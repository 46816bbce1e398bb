mod errors;
mod filesystem;
mod hash;
mod object;
mod signing;
mod state;
mod traits;
mod transfer;

pub use errors::StoreError;
pub use filesystem::FilesystemStore;
pub use hash::{Hash, HASH_LEN, ZERO_HASH};
pub use object::{Commit, ObjectKind};
pub use signing::{sign_commit_content, signing_key_from_bytes, verify_commit_signature};
pub use state::State;
pub use traits::{ObjectStore, RefStore, Store};
pub use transfer::CancelToken;

// Key types appear in the public API; re-export so callers don't need a
// direct ed25519-dalek dependency.
pub use ed25519_dalek::{SigningKey, VerifyingKey};
