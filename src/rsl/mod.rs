//! The reference state log: an append-only chain of entries carried as
//! commits on a dedicated ref.
//!
//! The chain's linkage is the store's commit-parent edge; entries never
//! duplicate ids inside their payloads. All queries are single linear walks
//! from the tip (or a given anchor), accumulating annotations in a side
//! buffer keyed by the entry ids they refer to.

mod entry;

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::store::{Hash, Store, StoreError, ZERO_HASH};

pub use entry::{
    parse_entry_text, AnnotationEntry, Entry, ReferenceEntry, ANNOTATION_ENTRY_HEADER,
    BEGIN_MESSAGE, END_MESSAGE, ENTRY_ID_KEY, REFERENCE_ENTRY_HEADER, REF_KEY, SKIP_KEY,
    TARGET_ID_KEY,
};

/// The ref whose tip is the head of the log.
pub const RSL_REF: &str = "refs/gittuf/reference-state-log";

/// Prefix of all internal refs, excluded from user-visible queries.
pub const GITTUF_NAMESPACE_PREFIX: &str = "refs/gittuf/";

/// The ref tracking the last known RSL tip of a remote.
pub fn remote_tracker_ref(remote_name: &str) -> String {
    format!("refs/gittuf/reference-state-log-remote/{}", remote_name)
}

#[derive(Debug, Error)]
pub enum RslError {
    #[error("malformed RSL entry")]
    InvalidEntry,

    #[error("RSL entry not found")]
    EntryNotFound,

    #[error("no RSL entry covers the commit")]
    NoRecordOfCommit,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Returns the entry at the current tip of the log. An unset RSL ref means
/// an empty log, reported as `EntryNotFound`.
pub fn get_latest_entry<S: Store>(store: &S) -> Result<Entry, RslError> {
    let tip = match store.get_reference(RSL_REF) {
        Ok(tip) => tip,
        Err(StoreError::NotFound) => return Err(RslError::EntryNotFound),
        Err(e) => return Err(e.into()),
    };
    get_entry(store, tip)
}

/// Returns the entry carried by the commit at `id`.
pub fn get_entry<S: Store>(store: &S, id: Hash) -> Result<Entry, RslError> {
    let message = match store.get_commit_message(id) {
        Ok(message) => message,
        Err(StoreError::NotFound) => return Err(RslError::EntryNotFound),
        Err(e) => return Err(e.into()),
    };
    parse_entry_text(id, &message)
}

/// Returns the entry one step older on the chain; `EntryNotFound` at the
/// log's first entry.
pub fn get_parent_for_entry<S: Store>(store: &S, entry: &Entry) -> Result<Entry, RslError> {
    match parent_of(store, entry.id())? {
        Some(parent_id) => get_entry(store, parent_id),
        None => Err(RslError::EntryNotFound),
    }
}

/// Walks to the chain's root. Returns the first entry together with all
/// annotations anywhere in the chain that refer to it.
pub fn get_first_entry<S: Store>(store: &S) -> Result<(Entry, Vec<AnnotationEntry>), RslError> {
    let mut annotations = Vec::new();
    let mut current = get_latest_entry(store)?;

    loop {
        if let Entry::Annotation(a) = &current {
            annotations.push(a.clone());
        }
        match parent_of(store, current.id())? {
            Some(parent_id) => current = get_entry(store, parent_id)?,
            None => break,
        }
    }

    let first_id = current.id();
    annotations.retain(|a| a.refers_to(first_id));
    Ok((current, annotations))
}

/// Latest ReferenceEntry for the exact ref name, with every newer
/// annotation that refers to it (newest annotation first).
pub fn get_latest_reference_entry_for_ref<S: Store>(
    store: &S,
    ref_name: &str,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    find_reference_entry(store, ZERO_HASH, false, |e| e.ref_name == ref_name)
}

/// As [`get_latest_reference_entry_for_ref`], but only entries strictly
/// older than `anchor_id` are candidates. A zero anchor starts from the tip.
pub fn get_latest_reference_entry_for_ref_before<S: Store>(
    store: &S,
    ref_name: &str,
    anchor_id: Hash,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    find_reference_entry(store, anchor_id, false, |e| e.ref_name == ref_name)
}

/// Latest ReferenceEntry for the ref that is not the target of any skip
/// annotation anywhere in the chain.
pub fn get_latest_unskipped_reference_entry_for_ref<S: Store>(
    store: &S,
    ref_name: &str,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    find_reference_entry(store, ZERO_HASH, true, |e| e.ref_name == ref_name)
}

/// As [`get_latest_unskipped_reference_entry_for_ref`] with an anchor; skip
/// annotations newer than the anchor still count.
pub fn get_latest_unskipped_reference_entry_for_ref_before<S: Store>(
    store: &S,
    ref_name: &str,
    anchor_id: Hash,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    find_reference_entry(store, anchor_id, true, |e| e.ref_name == ref_name)
}

/// Latest ReferenceEntry outside the internal `refs/gittuf/` namespace.
pub fn get_latest_non_gittuf_reference_entry<S: Store>(
    store: &S,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    find_reference_entry(store, ZERO_HASH, false, |e| {
        !e.ref_name.starts_with(GITTUF_NAMESPACE_PREFIX)
    })
}

/// First non-gittuf ReferenceEntry strictly older than `entry`.
pub fn get_non_gittuf_parent_reference_entry_for_entry<S: Store>(
    store: &S,
    entry: &Entry,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    find_reference_entry(store, entry.id(), false, |e| {
        !e.ref_name.starts_with(GITTUF_NAMESPACE_PREFIX)
    })
}

/// Oldest ReferenceEntry for the exact ref name, with every annotation in
/// the chain that refers to it.
pub fn get_first_reference_entry_for_ref<S: Store>(
    store: &S,
    ref_name: &str,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    let mut annotations = Vec::new();
    let mut oldest_match: Option<ReferenceEntry> = None;
    let mut current = get_latest_entry(store)?;

    loop {
        match &current {
            Entry::Annotation(a) => annotations.push(a.clone()),
            Entry::Reference(r) if r.ref_name == ref_name => oldest_match = Some(r.clone()),
            Entry::Reference(_) => {}
        }
        match parent_of(store, current.id())? {
            Some(parent_id) => current = get_entry(store, parent_id)?,
            None => break,
        }
    }

    match oldest_match {
        Some(entry) => {
            annotations.retain(|a| a.refers_to(entry.id));
            Ok((entry, annotations))
        }
        None => Err(RslError::EntryNotFound),
    }
}

/// Oldest ReferenceEntry whose target equals `commit_id` or has it as an
/// ancestor in the object graph. `NoRecordOfCommit` when no entry covers it.
pub fn get_first_reference_entry_for_commit<S: Store>(
    store: &S,
    commit_id: Hash,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError> {
    let mut annotations = Vec::new();
    let mut oldest_match: Option<ReferenceEntry> = None;
    let mut current = match get_latest_entry(store) {
        Ok(entry) => entry,
        Err(RslError::EntryNotFound) => return Err(RslError::NoRecordOfCommit),
        Err(e) => return Err(e),
    };

    loop {
        match &current {
            Entry::Annotation(a) => annotations.push(a.clone()),
            Entry::Reference(r) => {
                if entry_covers_commit(store, r, commit_id)? {
                    oldest_match = Some(r.clone());
                }
            }
        }
        match parent_of(store, current.id())? {
            Some(parent_id) => current = get_entry(store, parent_id)?,
            None => break,
        }
    }

    match oldest_match {
        Some(entry) => {
            annotations.retain(|a| a.refers_to(entry.id));
            Ok((entry, annotations))
        }
        None => Err(RslError::NoRecordOfCommit),
    }
}

fn entry_covers_commit<S: Store>(
    store: &S,
    entry: &ReferenceEntry,
    commit_id: Hash,
) -> Result<bool, RslError> {
    if entry.target_id == commit_id {
        return Ok(true);
    }
    if entry.target_id.is_zero() {
        return Ok(false);
    }
    // A target recorded elsewhere may not exist in this store; that simply
    // means it cannot cover the commit.
    match store.knows_commit(entry.target_id, commit_id) {
        Ok(knows) => Ok(knows),
        Err(StoreError::NotFound) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// All ReferenceEntries between the two inclusive anchors, oldest first,
/// with a map from each returned entry's id to the annotations (oldest
/// first) that refer to it.
pub fn get_reference_entries_in_range<S: Store>(
    store: &S,
    first_id: Hash,
    last_id: Hash,
) -> Result<(Vec<ReferenceEntry>, HashMap<Hash, Vec<AnnotationEntry>>), RslError> {
    reference_entries_in_range(store, first_id, last_id, None)
}

/// As [`get_reference_entries_in_range`], restricted to the named ref.
/// Entries in `refs/gittuf/*` are always considered relevant.
pub fn get_reference_entries_in_range_for_ref<S: Store>(
    store: &S,
    first_id: Hash,
    last_id: Hash,
    ref_name: &str,
) -> Result<(Vec<ReferenceEntry>, HashMap<Hash, Vec<AnnotationEntry>>), RslError> {
    reference_entries_in_range(store, first_id, last_id, Some(ref_name))
}

fn reference_entries_in_range<S: Store>(
    store: &S,
    first_id: Hash,
    last_id: Hash,
    ref_filter: Option<&str>,
) -> Result<(Vec<ReferenceEntry>, HashMap<Hash, Vec<AnnotationEntry>>), RslError> {
    let mut all_annotations = Vec::new();

    // Walk down to the newer anchor, only gathering annotations: they may
    // refer back into the range.
    let mut current = get_latest_entry(store)?;
    while current.id() != last_id {
        if let Entry::Annotation(a) = &current {
            all_annotations.push(a.clone());
        }
        current = match parent_of(store, current.id())? {
            Some(parent_id) => get_entry(store, parent_id)?,
            None => return Err(RslError::EntryNotFound),
        };
    }

    // From the newer anchor through the older one, inclusive.
    let mut entries = Vec::new();
    loop {
        match &current {
            Entry::Reference(r) => {
                let relevant = match ref_filter {
                    None => true,
                    Some(name) => {
                        r.ref_name == name || r.ref_name.starts_with(GITTUF_NAMESPACE_PREFIX)
                    }
                };
                if relevant {
                    entries.push(r.clone());
                }
            }
            Entry::Annotation(a) => all_annotations.push(a.clone()),
        }

        if current.id() == first_id {
            break;
        }
        current = match parent_of(store, current.id())? {
            Some(parent_id) => get_entry(store, parent_id)?,
            None => return Err(RslError::EntryNotFound),
        };
    }
    entries.reverse();

    let entry_ids: HashSet<Hash> = entries.iter().map(|e| e.id).collect();
    let mut annotation_map: HashMap<Hash, Vec<AnnotationEntry>> = HashMap::new();
    for annotation in all_annotations.iter().rev() {
        for target in &annotation.rsl_entry_ids {
            if entry_ids.contains(target) {
                annotation_map
                    .entry(*target)
                    .or_default()
                    .push(annotation.clone());
            }
        }
    }

    Ok((entries, annotation_map))
}

fn parent_of<S: Store>(store: &S, id: Hash) -> Result<Option<Hash>, RslError> {
    Ok(store.get_commit_parent_ids(id)?.first().copied())
}

/// Single-pass search for the newest ReferenceEntry satisfying a predicate.
///
/// Annotations are accumulated while walking; when `unskipped_only` is set,
/// entries targeted by any skip annotation seen so far (necessarily newer
/// than the entry itself) are passed over. With a non-zero `anchor_id`, only
/// entries strictly older than the anchor are candidates, while annotations
/// continue to be gathered from the tip down.
fn find_reference_entry<S, F>(
    store: &S,
    anchor_id: Hash,
    unskipped_only: bool,
    predicate: F,
) -> Result<(ReferenceEntry, Vec<AnnotationEntry>), RslError>
where
    S: Store,
    F: Fn(&ReferenceEntry) -> bool,
{
    let mut annotations: Vec<AnnotationEntry> = Vec::new();
    let mut skipped: HashSet<Hash> = HashSet::new();
    let mut past_anchor = anchor_id.is_zero();
    let mut current = get_latest_entry(store)?;

    loop {
        let id = current.id();
        match &current {
            Entry::Annotation(a) => {
                if a.skip {
                    skipped.extend(a.rsl_entry_ids.iter().copied());
                }
                annotations.push(a.clone());
            }
            Entry::Reference(r) => {
                if past_anchor && predicate(r) && !(unskipped_only && skipped.contains(&id)) {
                    let referring = annotations.iter().filter(|a| a.refers_to(id)).cloned().collect();
                    return Ok((r.clone(), referring));
                }
            }
        }

        if !past_anchor && id == anchor_id {
            past_anchor = true;
        }

        current = match parent_of(store, id)? {
            Some(parent_id) => get_entry(store, parent_id)?,
            None => return Err(RslError::EntryNotFound),
        };
    }
}
