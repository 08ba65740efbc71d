//! Column rename detection.
//!
//! Every (removed, added) pair gets a weighted score from name similarity,
//! type equality and agreement of the remaining attributes. Pairs are then
//! accepted greedily, best score first, each column used at most once.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::sql::table::ColumnDefinition;

/// Minimum score for a pair to be treated as a rename
pub const RENAME_THRESHOLD: f64 = 0.3;

/// Renames scoring below this are flagged for confirmation
pub const CONFIRMATION_THRESHOLD: f64 = 0.7;

const NAME_WEIGHT: f64 = 0.5;
const TYPE_WEIGHT: f64 = 0.35;
const ATTRIBUTE_WEIGHT: f64 = 0.15;

// Scores are sums of a few products; absorb rounding at the thresholds
const EPSILON: f64 = 1e-9;

/// Levenshtein edit distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized edit similarity in `[0.0, 1.0]`
fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Jaccard overlap of underscore-separated words
fn word_overlap(a: &str, b: &str) -> f64 {
    let words_a: HashSet<&str> = a.split('_').filter(|w| !w.is_empty()).collect();
    let words_b: HashSet<&str> = b.split('_').filter(|w| !w.is_empty()).collect();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    words_a.intersection(&words_b).count() as f64 / union as f64
}

/// Case-insensitive name similarity in `[0.0, 1.0]`
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }

    let contained = a.starts_with(&b) || b.starts_with(&a) || a.ends_with(&b) || b.ends_with(&a);
    if contained || a.replace('_', "") == b.replace('_', "") {
        return 0.9;
    }

    0.5 * levenshtein_ratio(&a, &b) + 0.5 * word_overlap(&a, &b)
}

fn attribute_agreement(old: &ColumnDefinition, new: &ColumnDefinition) -> f64 {
    let matches = [
        old.is_nullable() == new.is_nullable(),
        old.is_primary_key() == new.is_primary_key(),
        old.is_unique() == new.is_unique(),
        old.default() == new.default(),
    ];
    matches.iter().filter(|&&m| m).count() as f64 / matches.len() as f64
}

/// Weighted likelihood that `new` is `old` under a different name
pub fn rename_score(old: &ColumnDefinition, new: &ColumnDefinition) -> f64 {
    let type_score = if old.data_type() == new.data_type() { 1.0 } else { 0.5 };

    NAME_WEIGHT * name_similarity(old.name(), new.name())
        + TYPE_WEIGHT * type_score
        + ATTRIBUTE_WEIGHT * attribute_agreement(old, new)
}

/// An accepted rename pairing
#[derive(Debug, Clone, PartialEq)]
pub struct RenameMatch {
    /// Position of the column in the old table
    pub old_index: usize,
    /// Position of the column in the new table
    pub new_index: usize,
    pub score: f64,
}

impl RenameMatch {
    pub fn requires_confirmation(&self) -> bool {
        self.score + EPSILON < CONFIRMATION_THRESHOLD
    }
}

/// Pair removed columns with added ones. Inputs carry each column's index in
/// its own table, which also breaks score ties.
pub fn match_renames(
    removed: &[(usize, &ColumnDefinition)],
    added: &[(usize, &ColumnDefinition)],
) -> Vec<RenameMatch> {
    let mut candidates: Vec<RenameMatch> = removed
        .iter()
        .flat_map(|&(old_index, old)| {
            added.iter().map(move |&(new_index, new)| RenameMatch {
                old_index,
                new_index,
                score: rename_score(old, new),
            })
        })
        .filter(|candidate| candidate.score + EPSILON >= RENAME_THRESHOLD)
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.old_index.cmp(&b.old_index))
            .then(a.new_index.cmp(&b.new_index))
    });

    let mut used_old = HashSet::new();
    let mut used_new = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            if used_old.contains(&c.old_index) || used_new.contains(&c.new_index) {
                return false;
            }
            used_old.insert(c.old_index);
            used_new.insert(c.new_index);
            true
        })
        .collect()
}
