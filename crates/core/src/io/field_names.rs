//! Collision-free short field names for legacy formats
//!
//! dBase-backed formats cap field names at 10 characters. Truncating blindly
//! can merge two columns into one name, so names are assigned in priority
//! order (analysis fields first, then the rest of the table) and a collision
//! becomes `<first 8 chars>_<n>`.

use std::collections::{HashMap, HashSet};

/// Maximum field-name length of dBase attribute tables
pub const LEGACY_FIELD_LEN: usize = 10;

/// Build a mapping from original column names to unique names of at most
/// `max_len` characters.
///
/// `selected` names are assigned first so that analysis variables keep the
/// most readable short names; every name in `all` not already mapped
/// follows in order.
pub fn legacy_field_mapping<'a, I, S>(all: I, selected: &[S], max_len: usize) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
    S: AsRef<str>,
{
    let mut mapping = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();

    let ordered = selected
        .iter()
        .map(|s| s.as_ref().to_string())
        .chain(all.into_iter().map(str::to_string));

    for name in ordered {
        if mapping.contains_key(&name) {
            continue;
        }
        let short = unique_short_name(&name, &used, max_len);
        used.insert(short.clone());
        mapping.insert(name, short);
    }

    mapping
}

fn truncate(name: &str, len: usize) -> String {
    name.chars().take(len).collect()
}

fn unique_short_name(name: &str, used: &HashSet<String>, max_len: usize) -> String {
    let short = truncate(name, max_len);
    if !used.contains(&short) {
        return short;
    }

    // The stem shrinks as the counter gains digits, so "_<n>" always fits
    let found = (1..)
        .map(|counter: usize| {
            let suffix = format!("_{}", counter);
            let stem = truncate(&short, max_len.saturating_sub(suffix.len()).max(1));
            stem + &suffix
        })
        .find(|candidate| !used.contains(candidate));
    found.unwrap_or(short)
}
