//! Duplicate screening for incoming test blocks.
//!
//! Three tiers, cheapest first: exact signature match, fuzzy signature
//! equality, then a Levenshtein similarity ratio against every block already
//! in the corpus. A candidate that survives all three is unique and enters
//! the corpus; anything else is silently counted, never an error.

use crate::block::{Corpus, TestBlock};

/// Outcome of screening one batch of candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsorbOutcome {
    pub accepted: usize,
    pub duplicates: usize,
}

/// Screen `candidates` in order against `corpus`, admitting unique blocks as
/// they pass. Blocks admitted earlier in the batch participate in screening
/// the later ones, so a batch with internal duplicates self-deduplicates.
pub fn absorb(corpus: &mut Corpus, candidates: Vec<TestBlock>, threshold: f64) -> AbsorbOutcome {
    let mut outcome = AbsorbOutcome::default();
    for candidate in candidates {
        if would_accept(corpus, &candidate, threshold) {
            corpus.push(candidate);
            outcome.accepted += 1;
        } else {
            outcome.duplicates += 1;
        }
    }
    outcome
}

/// Whether `candidate` would enter the corpus as a unique block.
pub fn would_accept(corpus: &Corpus, candidate: &TestBlock, threshold: f64) -> bool {
    let exact = candidate.exact_signature();
    if corpus.contains_exact(&exact) {
        return false;
    }
    let fuzzy = candidate.fuzzy_signature();
    !corpus
        .blocks()
        .iter()
        .any(|existing| near_duplicate(&existing.fuzzy_signature(), &fuzzy, threshold))
}

/// Two normalized names are near-duplicates when equal or when their
/// similarity ratio strictly exceeds `threshold`.
pub fn near_duplicate(a: &str, b: &str, threshold: f64) -> bool {
    if a == b {
        return true;
    }
    similarity(a, b) > threshold
}

/// Similarity ratio in `[0.0, 1.0]`: `(max_len - distance) / max_len` over
/// characters. Two empty strings are identical, ratio 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let max_len = a_len.max(b_len);
    if max_len == 0 {
        return 1.0;
    }
    let distance = edit_distance(a, b);
    (max_len - distance) as f64 / max_len as f64
}

/// Levenshtein distance over characters, two rolling rows.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, &ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}
