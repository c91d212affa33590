//! JSON-patch construction helpers.
//!
//! Paths are assembled from pointer tokens rather than formatted strings so
//! that reserved characters in field names are escaped per RFC 6901.

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use serde_json::Value;

/// Build an `add` operation at the given pointer tokens.
pub fn add<'a>(tokens: impl IntoIterator<Item = &'a str>, value: Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(tokens),
        value,
    })
}

/// Build a `replace` operation at the given pointer tokens.
pub fn replace<'a>(tokens: impl IntoIterator<Item = &'a str>, value: Value) -> PatchOperation {
    PatchOperation::Replace(ReplaceOperation {
        path: PointerBuf::from_tokens(tokens),
        value,
    })
}
