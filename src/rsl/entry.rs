//! Entry types and their commit-message codec.
//!
//! Entries are serialized as human-readable text placed in the message of
//! the commit that carries them. The encoding is normative: independent
//! verifiers accept only byte sequences matching it exactly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::store::{Hash, Store, ZERO_HASH};

use super::{RslError, RSL_REF};

pub const REFERENCE_ENTRY_HEADER: &str = "RSL Reference Entry";
pub const ANNOTATION_ENTRY_HEADER: &str = "RSL Annotation Entry";

pub const REF_KEY: &str = "ref";
pub const TARGET_ID_KEY: &str = "targetID";
pub const ENTRY_ID_KEY: &str = "entryID";
pub const SKIP_KEY: &str = "skip";

pub const BEGIN_MESSAGE: &str = "-----BEGIN MESSAGE-----";
pub const END_MESSAGE: &str = "-----END MESSAGE-----";

/// A record of what a named reference pointed to when the entry was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Address of the commit carrying the entry; assigned at read time and
    /// never persisted inside the message.
    pub id: Hash,
    pub ref_name: String,
    pub target_id: Hash,
}

/// A record referring to one or more earlier entries, optionally marking
/// them skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEntry {
    pub id: Hash,
    /// Earlier entries this annotation refers to. Never empty.
    pub rsl_entry_ids: Vec<Hash>,
    /// When set, the referenced entries are voided for "latest unskipped"
    /// queries. There is no un-skip.
    pub skip: bool,
    /// Free-form operator comment; possibly multi-line, possibly empty.
    pub message: String,
}

/// A single record in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Reference(ReferenceEntry),
    Annotation(AnnotationEntry),
}

impl Entry {
    pub fn id(&self) -> Hash {
        match self {
            Entry::Reference(e) => e.id,
            Entry::Annotation(e) => e.id,
        }
    }

    pub fn commit_message(&self) -> String {
        match self {
            Entry::Reference(e) => e.commit_message(),
            Entry::Annotation(e) => e.commit_message(),
        }
    }
}

impl ReferenceEntry {
    pub fn new(ref_name: impl Into<String>, target_id: Hash) -> Self {
        ReferenceEntry {
            id: ZERO_HASH,
            ref_name: ref_name.into(),
            target_id,
        }
    }

    fn commit_message(&self) -> String {
        format!(
            "{}\n\n{}: {}\n{}: {}",
            REFERENCE_ENTRY_HEADER,
            REF_KEY,
            self.ref_name,
            TARGET_ID_KEY,
            self.target_id.to_hex()
        )
    }

    /// Append this entry to the log. Returns the new entry's id.
    pub fn commit<S: Store>(&self, store: &S, sign: bool) -> Result<Hash, RslError> {
        commit_entry(store, &self.commit_message(), sign)
    }

    /// Append this entry, signing with explicitly supplied key material.
    pub fn commit_using_key<S: Store>(&self, store: &S, key_bytes: &[u8]) -> Result<Hash, RslError> {
        commit_entry_using_key(store, &self.commit_message(), key_bytes)
    }
}

impl AnnotationEntry {
    pub fn new(rsl_entry_ids: Vec<Hash>, skip: bool, message: impl Into<String>) -> Self {
        AnnotationEntry {
            id: ZERO_HASH,
            rsl_entry_ids,
            skip,
            message: message.into(),
        }
    }

    /// Does this annotation refer to the given entry id?
    pub fn refers_to(&self, entry_id: Hash) -> bool {
        self.rsl_entry_ids.contains(&entry_id)
    }

    fn commit_message(&self) -> String {
        let mut lines = vec![ANNOTATION_ENTRY_HEADER.to_string(), String::new()];
        for entry_id in &self.rsl_entry_ids {
            lines.push(format!("{}: {}", ENTRY_ID_KEY, entry_id.to_hex()));
        }
        lines.push(format!("{}: {}", SKIP_KEY, self.skip));

        // An empty message gets no delimiter block at all.
        if !self.message.is_empty() {
            lines.push(BEGIN_MESSAGE.to_string());
            lines.push(BASE64.encode(self.message.as_bytes()));
            lines.push(END_MESSAGE.to_string());
        }

        lines.join("\n")
    }

    pub fn commit<S: Store>(&self, store: &S, sign: bool) -> Result<Hash, RslError> {
        commit_entry(store, &self.commit_message(), sign)
    }

    pub fn commit_using_key<S: Store>(&self, store: &S, key_bytes: &[u8]) -> Result<Hash, RslError> {
        commit_entry_using_key(store, &self.commit_message(), key_bytes)
    }
}

fn commit_entry<S: Store>(store: &S, message: &str, sign: bool) -> Result<Hash, RslError> {
    let tree = store.empty_tree()?;
    Ok(store.commit(tree, RSL_REF, message, sign)?)
}

fn commit_entry_using_key<S: Store>(
    store: &S,
    message: &str,
    key_bytes: &[u8],
) -> Result<Hash, RslError> {
    let tree = store.empty_tree()?;
    Ok(store.commit_using_key(tree, RSL_REF, message, key_bytes)?)
}

/// Parse a commit message into an entry. The commit's id is attached to the
/// result; it is never part of the message itself.
///
/// A valid message starts with a recognized header on its own line, followed
/// by a blank line, followed by the variant's key/value lines. Anything else
/// is `InvalidEntry`; partial entries are never accepted.
pub fn parse_entry_text(id: Hash, text: &str) -> Result<Entry, RslError> {
    let lines: Vec<&str> = text.trim_end_matches('\n').lines().collect();
    if lines.len() < 3 || !lines[1].is_empty() {
        return Err(RslError::InvalidEntry);
    }

    match lines[0] {
        REFERENCE_ENTRY_HEADER => parse_reference_entry(id, &lines[2..]),
        ANNOTATION_ENTRY_HEADER => parse_annotation_entry(id, &lines[2..]),
        _ => Err(RslError::InvalidEntry),
    }
}

fn parse_reference_entry(id: Hash, lines: &[&str]) -> Result<Entry, RslError> {
    let mut ref_name = None;
    let mut target_id = None;

    for line in lines {
        match line.split_once(": ") {
            Some((REF_KEY, value)) => ref_name = Some(value.to_string()),
            Some((TARGET_ID_KEY, value)) => {
                target_id = Some(Hash::from_hex(value).map_err(|_| RslError::InvalidEntry)?)
            }
            _ => continue,
        }
    }

    match (ref_name, target_id) {
        (Some(ref_name), Some(target_id)) => Ok(Entry::Reference(ReferenceEntry {
            id,
            ref_name,
            target_id,
        })),
        _ => Err(RslError::InvalidEntry),
    }
}

fn parse_annotation_entry(id: Hash, lines: &[&str]) -> Result<Entry, RslError> {
    let mut rsl_entry_ids = Vec::new();
    let mut skip = None;
    let mut message_b64 = String::new();
    let mut in_message = false;

    for line in lines {
        match *line {
            BEGIN_MESSAGE => in_message = true,
            END_MESSAGE => in_message = false,
            line if in_message => message_b64.push_str(line),
            line => match line.split_once(": ") {
                Some((ENTRY_ID_KEY, value)) => {
                    rsl_entry_ids.push(Hash::from_hex(value).map_err(|_| RslError::InvalidEntry)?)
                }
                Some((SKIP_KEY, "true")) => skip = Some(true),
                Some((SKIP_KEY, "false")) => skip = Some(false),
                Some((SKIP_KEY, _)) => return Err(RslError::InvalidEntry),
                _ => continue,
            },
        }
    }

    let skip = skip.ok_or(RslError::InvalidEntry)?;
    if rsl_entry_ids.is_empty() {
        return Err(RslError::InvalidEntry);
    }

    let message_bytes = BASE64
        .decode(message_b64.as_bytes())
        .map_err(|_| RslError::InvalidEntry)?;
    let message = String::from_utf8(message_bytes).map_err(|_| RslError::InvalidEntry)?;

    Ok(Entry::Annotation(AnnotationEntry {
        id,
        rsl_entry_ids,
        skip,
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_zero_hash() -> Hash {
        Hash::from_hex("abcdef12345678900987654321fedcbaabcdef12345678900987654321fedcba").unwrap()
    }

    #[test]
    fn test_reference_entry_commit_message() {
        let entry = ReferenceEntry::new("refs/heads/main", ZERO_HASH);
        assert_eq!(
            entry.commit_message(),
            format!(
                "{}\n\n{}: {}\n{}: {}",
                REFERENCE_ENTRY_HEADER,
                REF_KEY,
                "refs/heads/main",
                TARGET_ID_KEY,
                ZERO_HASH
            )
        );

        let entry = ReferenceEntry::new("refs/heads/main", non_zero_hash());
        assert_eq!(
            entry.commit_message(),
            format!(
                "{}\n\n{}: {}\n{}: {}",
                REFERENCE_ENTRY_HEADER,
                REF_KEY,
                "refs/heads/main",
                TARGET_ID_KEY,
                non_zero_hash()
            )
        );
    }

    #[test]
    fn test_annotation_entry_commit_message() {
        // No message: the delimiter block must be absent entirely
        let entry = AnnotationEntry::new(vec![ZERO_HASH], true, "");
        assert_eq!(
            entry.commit_message(),
            format!(
                "{}\n\n{}: {}\n{}: true",
                ANNOTATION_ENTRY_HEADER, ENTRY_ID_KEY, ZERO_HASH, SKIP_KEY
            )
        );

        // With message
        let entry = AnnotationEntry::new(vec![ZERO_HASH], true, "message");
        assert_eq!(
            entry.commit_message(),
            format!(
                "{}\n\n{}: {}\n{}: true\n{}\n{}\n{}",
                ANNOTATION_ENTRY_HEADER,
                ENTRY_ID_KEY,
                ZERO_HASH,
                SKIP_KEY,
                BEGIN_MESSAGE,
                BASE64.encode(b"message"),
                END_MESSAGE
            )
        );

        // Multi-line message
        let entry = AnnotationEntry::new(vec![ZERO_HASH], true, "message1\nmessage2");
        assert_eq!(
            entry.commit_message(),
            format!(
                "{}\n\n{}: {}\n{}: true\n{}\n{}\n{}",
                ANNOTATION_ENTRY_HEADER,
                ENTRY_ID_KEY,
                ZERO_HASH,
                SKIP_KEY,
                BEGIN_MESSAGE,
                BASE64.encode(b"message1\nmessage2"),
                END_MESSAGE
            )
        );

        // Multiple entry ids, skip false
        let entry = AnnotationEntry::new(vec![ZERO_HASH, ZERO_HASH], false, "");
        assert_eq!(
            entry.commit_message(),
            format!(
                "{}\n\n{}: {}\n{}: {}\n{}: false",
                ANNOTATION_ENTRY_HEADER, ENTRY_ID_KEY, ZERO_HASH, ENTRY_ID_KEY, ZERO_HASH, SKIP_KEY
            )
        );
    }

    #[test]
    fn test_parse_entry_text() {
        // Reference entry, zero and non-zero targets
        let text = format!(
            "{}\n\n{}: refs/heads/main\n{}: {}",
            REFERENCE_ENTRY_HEADER, REF_KEY, TARGET_ID_KEY, ZERO_HASH
        );
        assert_eq!(
            parse_entry_text(ZERO_HASH, &text).unwrap(),
            Entry::Reference(ReferenceEntry::new("refs/heads/main", ZERO_HASH))
        );

        let text = format!(
            "{}\n\n{}: refs/heads/main\n{}: {}",
            REFERENCE_ENTRY_HEADER,
            REF_KEY,
            TARGET_ID_KEY,
            non_zero_hash()
        );
        assert_eq!(
            parse_entry_text(ZERO_HASH, &text).unwrap(),
            Entry::Reference(ReferenceEntry::new("refs/heads/main", non_zero_hash()))
        );

        // Missing header
        let text = format!("{}: refs/heads/main\n{}: {}", REF_KEY, TARGET_ID_KEY, ZERO_HASH);
        assert!(matches!(
            parse_entry_text(ZERO_HASH, &text),
            Err(RslError::InvalidEntry)
        ));

        // Missing information
        let text = format!("{}\n\n{}: refs/heads/main", REFERENCE_ENTRY_HEADER, REF_KEY);
        assert!(matches!(
            parse_entry_text(ZERO_HASH, &text),
            Err(RslError::InvalidEntry)
        ));
    }

    #[test]
    fn test_parse_annotation_text() {
        // No message
        let text = format!(
            "{}\n\n{}: {}\n{}: true",
            ANNOTATION_ENTRY_HEADER, ENTRY_ID_KEY, ZERO_HASH, SKIP_KEY
        );
        assert_eq!(
            parse_entry_text(ZERO_HASH, &text).unwrap(),
            Entry::Annotation(AnnotationEntry::new(vec![ZERO_HASH], true, ""))
        );

        // With message
        let text = format!(
            "{}\n\n{}: {}\n{}: true\n{}\n{}\n{}",
            ANNOTATION_ENTRY_HEADER,
            ENTRY_ID_KEY,
            ZERO_HASH,
            SKIP_KEY,
            BEGIN_MESSAGE,
            BASE64.encode(b"message"),
            END_MESSAGE
        );
        assert_eq!(
            parse_entry_text(ZERO_HASH, &text).unwrap(),
            Entry::Annotation(AnnotationEntry::new(vec![ZERO_HASH], true, "message"))
        );

        // Multi-line message survives the base64 trailer
        let text = format!(
            "{}\n\n{}: {}\n{}: true\n{}\n{}\n{}",
            ANNOTATION_ENTRY_HEADER,
            ENTRY_ID_KEY,
            ZERO_HASH,
            SKIP_KEY,
            BEGIN_MESSAGE,
            BASE64.encode(b"message1\nmessage2"),
            END_MESSAGE
        );
        assert_eq!(
            parse_entry_text(ZERO_HASH, &text).unwrap(),
            Entry::Annotation(AnnotationEntry::new(
                vec![ZERO_HASH],
                true,
                "message1\nmessage2"
            ))
        );

        // Skip false, multiple entry ids
        let text = format!(
            "{}\n\n{}: {}\n{}: {}\n{}: false",
            ANNOTATION_ENTRY_HEADER, ENTRY_ID_KEY, ZERO_HASH, ENTRY_ID_KEY, ZERO_HASH, SKIP_KEY
        );
        assert_eq!(
            parse_entry_text(ZERO_HASH, &text).unwrap(),
            Entry::Annotation(AnnotationEntry::new(vec![ZERO_HASH, ZERO_HASH], false, ""))
        );

        // Missing header
        let text = format!(
            "{}: {}\n{}: true\n{}\n{}\n{}",
            ENTRY_ID_KEY,
            ZERO_HASH,
            SKIP_KEY,
            BEGIN_MESSAGE,
            BASE64.encode(b"message"),
            END_MESSAGE
        );
        assert!(matches!(
            parse_entry_text(ZERO_HASH, &text),
            Err(RslError::InvalidEntry)
        ));

        // Missing skip key
        let text = format!("{}\n\n{}: {}", ANNOTATION_ENTRY_HEADER, ENTRY_ID_KEY, ZERO_HASH);
        assert!(matches!(
            parse_entry_text(ZERO_HASH, &text),
            Err(RslError::InvalidEntry)
        ));

        // No entry ids
        let text = format!("{}\n\n{}: true", ANNOTATION_ENTRY_HEADER, SKIP_KEY);
        assert!(matches!(
            parse_entry_text(ZERO_HASH, &text),
            Err(RslError::InvalidEntry)
        ));
    }

    #[test]
    fn test_roundtrip() {
        let entries = vec![
            Entry::Reference(ReferenceEntry::new("refs/heads/main", non_zero_hash())),
            Entry::Annotation(AnnotationEntry::new(vec![non_zero_hash()], true, "")),
            Entry::Annotation(AnnotationEntry::new(
                vec![non_zero_hash(), ZERO_HASH],
                false,
                "line1\nline2",
            )),
        ];

        for entry in entries {
            let parsed = parse_entry_text(ZERO_HASH, &entry.commit_message()).unwrap();
            assert_eq!(parsed, entry);
        }
    }

    #[test]
    fn test_refers_to() {
        let annotation = AnnotationEntry::new(vec![non_zero_hash()], false, "note");
        assert!(annotation.refers_to(non_zero_hash()));
        assert!(!annotation.refers_to(ZERO_HASH));

        let annotation = AnnotationEntry::new(vec![ZERO_HASH, non_zero_hash()], false, "note");
        assert!(annotation.refers_to(non_zero_hash()));
    }
}
