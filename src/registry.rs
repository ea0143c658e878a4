//! Thin protocol name/id lookups, delegated entirely to the collaborator registry (spec §4.5).
//!
//! The registry's contents (which fingerprints exist, under what names) are out of scope here;
//! this module exists only so callers have one place to go from a configuration string to an
//! `AppProto` and back, instead of reaching into `AppLayerDeps` directly.

use crate::deps::AppLayerDeps;
use crate::flow::AppProto;

/// Resolves a protocol name to its id, or `None` if the collaborator does not recognize it.
pub fn proto_by_name<D: AppLayerDeps>(deps: &D, name: &str) -> Option<AppProto> {
    deps.proto_by_name(name)
}

/// Resolves a protocol id back to its registered name.
pub fn proto_to_string<D: AppLayerDeps>(deps: &D, id: AppProto) -> Option<String> {
    deps.proto_name(id).map(str::to_owned)
}
