//! Object model and wire encoding for the content-addressed store.
//!
//! Every object is stored framed as `<kind> <body-len>\0<body>` and its
//! content address is the SHA-256 of the framed bytes, so objects of
//! different kinds can never collide.

use sha2::{Digest, Sha256};

use super::errors::StoreError;
use super::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    fn from_str(s: &str) -> Result<Self, StoreError> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            other => Err(StoreError::Corrupt(format!("unknown object kind: {}", other))),
        }
    }
}

/// A commit object.
///
/// Commits carry no timestamps: their identity is a deterministic function
/// of the tree, ancestry, signature, and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Hash,
    pub parents: Vec<Hash>,
    /// Base64 ed25519 signature over the unsigned encoding, when present.
    pub signature: Option<String>,
    pub message: String,
}

impl Commit {
    /// Encode the commit body, including the signature line if present.
    pub fn encode_body(&self) -> Vec<u8> {
        self.encode(true)
    }

    /// Encode the commit body without the signature line. This is the byte
    /// sequence a signature covers.
    pub fn unsigned_body(&self) -> Vec<u8> {
        self.encode(false)
    }

    fn encode(&self, with_signature: bool) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("tree {}\n", self.tree.to_hex()));
        for parent in &self.parents {
            out.push_str(&format!("parent {}\n", parent.to_hex()));
        }
        if with_signature {
            if let Some(sig) = &self.signature {
                out.push_str(&format!("signature {}\n", sig));
            }
        }
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub fn decode_body(body: &[u8]) -> Result<Self, StoreError> {
        let text = std::str::from_utf8(body)
            .map_err(|_| StoreError::Corrupt("commit body is not UTF-8".to_string()))?;

        let (header, message) = match text.split_once("\n\n") {
            Some((header, message)) => (header, message.to_string()),
            None => return Err(StoreError::Corrupt("commit body has no message separator".to_string())),
        };

        let mut tree = None;
        let mut parents = Vec::new();
        let mut signature = None;

        for line in header.lines() {
            match line.split_once(' ') {
                Some(("tree", value)) => tree = Some(Hash::from_hex(value)?),
                Some(("parent", value)) => parents.push(Hash::from_hex(value)?),
                Some(("signature", value)) => signature = Some(value.to_string()),
                _ => return Err(StoreError::Corrupt(format!("unknown commit header line: {}", line))),
            }
        }

        let tree = tree.ok_or_else(|| StoreError::Corrupt("commit has no tree".to_string()))?;

        Ok(Commit {
            tree,
            parents,
            signature,
            message,
        })
    }
}

/// Encode a tree body from (name, id) entries. Entries are sorted by name so
/// equal trees always produce equal bytes.
pub fn encode_tree(entries: &[(String, Hash)]) -> Vec<u8> {
    let mut sorted: Vec<&(String, Hash)> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::new();
    for (name, id) in sorted {
        out.push_str(&format!("{} {}\n", id.to_hex(), name));
    }
    out.into_bytes()
}

pub fn decode_tree(body: &[u8]) -> Result<Vec<(String, Hash)>, StoreError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| StoreError::Corrupt("tree body is not UTF-8".to_string()))?;

    let mut entries = Vec::new();
    for line in text.lines() {
        let (id, name) = line
            .split_once(' ')
            .ok_or_else(|| StoreError::Corrupt(format!("malformed tree entry: {}", line)))?;
        entries.push((name.to_string(), Hash::from_hex(id)?));
    }
    Ok(entries)
}

/// Frame an object body for storage and hashing.
pub fn frame(kind: ObjectKind, body: &[u8]) -> Vec<u8> {
    let mut framed = format!("{} {}\0", kind.as_str(), body.len()).into_bytes();
    framed.extend_from_slice(body);
    framed
}

/// Split framed object bytes into kind and body.
pub fn unframe(bytes: &[u8]) -> Result<(ObjectKind, &[u8]), StoreError> {
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| StoreError::Corrupt("object frame has no NUL".to_string()))?;
    let header = std::str::from_utf8(&bytes[..nul])
        .map_err(|_| StoreError::Corrupt("object frame header is not UTF-8".to_string()))?;

    let (kind, len) = header
        .split_once(' ')
        .ok_or_else(|| StoreError::Corrupt(format!("malformed object frame header: {}", header)))?;
    let kind = ObjectKind::from_str(kind)?;
    let len: usize = len
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("bad length in object frame: {}", len)))?;

    let body = &bytes[nul + 1..];
    if body.len() != len {
        return Err(StoreError::Corrupt(format!(
            "object frame declares {} bytes, found {}",
            len,
            body.len()
        )));
    }

    Ok((kind, body))
}

/// Compute the content address of an object.
pub fn object_id(kind: ObjectKind, body: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(frame(kind, body));
    let digest: [u8; 32] = hasher.finalize().into();
    Hash::from_bytes(digest)
}
