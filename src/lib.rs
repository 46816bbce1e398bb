//! Tamper-evident reference state log (RSL) for content-addressed
//! repositories.
//!
//! The RSL is an append-only chain of signed records stored inside the
//! repository itself, on a dedicated reference. Each record attests what a
//! named reference pointed to and which operator caused the change.
//! Downstream verifiers replay the chain to reconstruct authoritative
//! history for any branch, even when the hosting service is compromised.
//!
//! The crate is organized in three layers:
//!
//! - [`store`] — the content-addressed object store: blobs, trees, commits,
//!   refs, signing, and transfer between stores at filesystem paths.
//! - [`rsl`] — the log itself: entry types, their commit-message codec, and
//!   the chain queries.
//! - [`repo`] — the user-facing façade composing the two: record entries,
//!   annotate them, and synchronize the log with named remotes.

pub mod dev;
pub mod repo;
pub mod rsl;
pub mod store;

pub use repo::{Repository, RepositoryError};
pub use rsl::RslError;
pub use store::{CancelToken, Hash, StoreError};
