//! Shingling: text to a set of overlapping n-grams

use super::config::ShingleUnit;
use std::collections::HashSet;

/// A set of shingles; set semantics keep Jaccard counts honest
pub type ShingleSet = HashSet<String>;

/// Case-fold and collapse every whitespace run into a single space
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every contiguous window of `n` units of the normalized text
///
/// Text shorter than `n` units yields one shingle holding the whole
/// normalized text. Empty (or whitespace-only) text yields the empty set.
/// `n` of 0 is treated as 1.
pub fn shingles(text: &str, n: usize, unit: ShingleUnit) -> ShingleSet {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return ShingleSet::new();
    }
    let n = n.max(1);

    match unit {
        ShingleUnit::Word => {
            let tokens: Vec<&str> = normalized.split(' ').collect();
            if tokens.len() < n {
                return ShingleSet::from([normalized.clone()]);
            }
            tokens.windows(n).map(|window| window.join(" ")).collect()
        }
        ShingleUnit::Character => {
            let chars: Vec<char> = normalized.chars().collect();
            if chars.len() < n {
                return ShingleSet::from([normalized.clone()]);
            }
            chars.windows(n).map(|window| window.iter().collect::<String>()).collect()
        }
    }
}

/// Jaccard similarity `|a ∩ b| / |a ∪ b|`
///
/// Two empty sets score 0.0; they never link.
pub fn jaccard(a: &ShingleSet, b: &ShingleSet) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|s| large.contains(*s)).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}
