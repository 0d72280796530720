//! Hashing System - Export Identifiers and Document Fingerprints
//!
//! Identifiers must be stable across runs so downstream tools can diff and
//! re-import exports. Nothing here is cryptographic except the fingerprint.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::model::VariableKey;

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Canonical JSON: object keys sorted at every depth, no whitespace
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&sorted(serde_json::to_value(value)?))
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let entries: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// Fingerprint of any serializable document
pub fn compute_document_hash<T: Serialize>(document: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(document)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Classic 32-bit rolling string hash (`h = h * 31 + unit`) over UTF-16 code
/// units, wrapping on overflow.
pub fn string_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32)
        })
}

pub const VARIABLE_NUMBER_BASE: u32 = 1000;
pub const VARIABLE_NUMBER_SPAN: u32 = 9000;
pub const SUB_NUMBER_SPAN: u32 = 1000;

/// Two-part numeric identifier: variable number in [1000, 10000), sub number in [0, 1000).
pub fn variable_numbers(key: &VariableKey) -> (u32, u32) {
    let hash = string_hash(&format!("{}-{}", key.collection_id, key.variable_id));
    let abs = hash.unsigned_abs();
    let variable_number = VARIABLE_NUMBER_BASE + abs % VARIABLE_NUMBER_SPAN;
    let sub_number = (abs / VARIABLE_NUMBER_SPAN) % SUB_NUMBER_SPAN;
    (variable_number, sub_number)
}

/// External identifier for a variable, e.g. `VariableID:4821:113`
pub fn variable_export_id(key: &VariableKey) -> String {
    let (variable_number, sub_number) = variable_numbers(key);
    format!("VariableID:{}:{}", variable_number, sub_number)
}

/// External identifier for a collection
pub fn collection_export_id(collection_id: &str) -> String {
    format!("VariableCollectionId:{}", collection_id)
}
