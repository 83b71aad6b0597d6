//! Structure-aware search/replace over a single stored value.

use crate::phpser::{self, Value, MAX_DEPTH};
use thiserror::Error;

/// Replace every non-overlapping occurrence of `search`, left to right.
///
/// Returns `None` when there is nothing to replace.
pub fn replace_bytes(haystack: &[u8], search: &[u8], replace: &[u8]) -> Option<Vec<u8>> {
    if search.is_empty() || haystack.len() < search.len() {
        return None;
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut replaced = false;
    while let Some(at) = find(rest, search) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(replace);
        rest = &rest[at + search.len()..];
        replaced = true;
    }
    if !replaced {
        return None;
    }
    out.extend_from_slice(rest);
    Some(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// A stored value nests serialized data deeper than the rewrite will follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("serialized data nested deeper than {MAX_DEPTH} levels")]
pub struct TooDeep;

/// Rewrite one stored value.
///
/// A value that decodes as a serialized structure is rewritten leaf by leaf
/// and re-encoded, so string lengths stay consistent; anything else gets a
/// plain byte replacement. Returns `Ok(None)` when the value is unchanged.
///
/// Structures and serialized strings inside string leaves share one nesting
/// budget of [`MAX_DEPTH`] levels.
pub fn rewrite_text(text: &[u8], search: &[u8], replace: &[u8]) -> Result<Option<Vec<u8>>, TooDeep> {
    fold_text(text, search, replace, MAX_DEPTH)
}

/// Fold over a decoded value, rewriting string leaves in place.
///
/// Keys, class names and opaque payloads are left alone. String leaves may
/// themselves hold serialized structures and are handled recursively.
pub fn rewrite_value(value: &mut Value, search: &[u8], replace: &[u8]) -> Result<bool, TooDeep> {
    fold_value(value, search, replace, MAX_DEPTH)
}

fn fold_text(text: &[u8], search: &[u8], replace: &[u8], budget: usize) -> Result<Option<Vec<u8>>, TooDeep> {
    let Some(mut value) = phpser::try_decode(text) else {
        return Ok(replace_bytes(text, search, replace));
    };
    let budget = budget.checked_sub(1).ok_or(TooDeep)?;
    if !fold_value(&mut value, search, replace, budget)? {
        return Ok(None);
    }
    let encoded = phpser::encode(&value);
    Ok((encoded != text).then_some(encoded))
}

fn fold_value(value: &mut Value, search: &[u8], replace: &[u8], budget: usize) -> Result<bool, TooDeep> {
    match value {
        Value::Str(bytes) => match fold_text(bytes, search, replace, budget)? {
            Some(new) => {
                *bytes = new;
                Ok(true)
            }
            None => Ok(false),
        },
        Value::Array(members) | Value::Object { members, .. } => {
            let budget = budget.checked_sub(1).ok_or(TooDeep)?;
            let mut changed = false;
            for (_, member) in members.iter_mut() {
                changed |= fold_value(member, search, replace, budget)?;
            }
            Ok(changed)
        }
        _ => Ok(false),
    }
}
