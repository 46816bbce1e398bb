use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The mutable state stored in state.yaml.
///
/// Everything else in the store is immutable and content-addressed; refs and
/// remote configuration are the only values that change in place.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct State {
    /// Maps fully qualified ref names to hex object ids.
    #[serde(default)]
    pub refs: BTreeMap<String, String>,

    /// Maps remote names to filesystem paths of other stores.
    #[serde(default)]
    pub remotes: BTreeMap<String, String>,
}
