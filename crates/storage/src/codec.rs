//! String encodings for the persisted progress values.
//!
//! The current step is a decimal index. Completed steps are a JSON array of
//! step ids, in ascending order. Older stores may hold a bare comma list
//! (`1,2,3`), which is still accepted on read.

use std::collections::BTreeSet;

use learn_core::model::StepId;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[must_use]
pub fn encode_index(index: usize) -> String {
    index.to_string()
}

/// # Errors
///
/// Returns `StorageError::Serialization` unless `raw` is a non-negative integer.
pub fn decode_index(raw: &str) -> Result<usize, StorageError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| ser(format!("invalid step index {raw:?}: {e}")))
}

#[must_use]
pub fn encode_completed(ids: &BTreeSet<StepId>) -> String {
    let raw: Vec<u64> = ids.iter().map(StepId::value).collect();
    // A Vec<u64> always serializes.
    serde_json::to_string(&raw).unwrap_or_else(|_| "[]".to_owned())
}

/// # Errors
///
/// Returns `StorageError::Serialization` if `raw` is neither a JSON array of
/// non-negative integers nor a comma-separated list of them.
pub fn decode_completed(raw: &str) -> Result<BTreeSet<StepId>, StorageError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(BTreeSet::new());
    }
    if trimmed.starts_with('[') {
        let ids: Vec<u64> = serde_json::from_str(trimmed).map_err(ser)?;
        return Ok(ids.into_iter().map(StepId::new).collect());
    }
    trimmed
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map(StepId::new)
                .map_err(|e| ser(format!("invalid step id {part:?}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> BTreeSet<StepId> {
        raw.iter().copied().map(StepId::new).collect()
    }

    #[test]
    fn index_decodes_trimmed_integers_only() {
        assert_eq!(decode_index(" 3 ").unwrap(), 3);
        assert!(matches!(decode_index("-1"), Err(StorageError::Serialization(_))));
        assert!(matches!(decode_index("two"), Err(StorageError::Serialization(_))));
    }

    #[test]
    fn completed_encodes_as_sorted_json_array() {
        assert_eq!(encode_completed(&ids(&[3, 1, 2])), "[1,2,3]");
        assert_eq!(encode_completed(&ids(&[])), "[]");
    }

    #[test]
    fn completed_accepts_json_and_comma_lists() {
        assert_eq!(decode_completed("[2, 1, 2]").unwrap(), ids(&[1, 2]));
        assert_eq!(decode_completed("1,2, 4").unwrap(), ids(&[1, 2, 4]));
        assert_eq!(decode_completed("").unwrap(), ids(&[]));
    }

    #[test]
    fn completed_rejects_garbage() {
        assert!(matches!(decode_completed("[\"a\"]"), Err(StorageError::Serialization(_))));
        assert!(matches!(decode_completed("1,,2"), Err(StorageError::Serialization(_))));
        assert!(matches!(decode_completed("{}"), Err(StorageError::Serialization(_))));
    }
}
