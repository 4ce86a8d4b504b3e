//! Approximate question matching
//!
//! Scores a query against every stored question with a normalized
//! Indel-distance ratio (0-100) and picks the best candidate above a
//! configurable threshold. This is a linear scan; it is meant for stores
//! of hundreds to low thousands of questions.

use tracing::debug;

/// A candidate that cleared the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    pub candidate: &'a str,
    pub score: f64,
}

/// Similarity of two strings in `0.0..=100.0`.
///
/// `100 * (1 - indel / (len_a + len_b))` where `indel` is the minimum number
/// of insertions and deletions turning `a` into `b`, computed over Unicode
/// scalar values. Two empty strings are identical (100).
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }

    let lcs = lcs_len(&a, &b);
    let indel = total - 2 * lcs;
    100.0 * (1.0 - indel as f64 / total as f64)
}

/// Length of the longest common subsequence, two-row dynamic programming
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Best-scoring candidate whose score is strictly greater than `threshold`.
///
/// Ties on the maximum score go to the candidate that appears first in
/// `candidates`.
pub fn find_best_match<'a, S: AsRef<str>>(
    query: &str,
    candidates: &'a [S],
    threshold: f64,
) -> Option<Match<'a>> {
    let mut best: Option<Match<'a>> = None;

    for candidate in candidates {
        let candidate = candidate.as_ref();
        let score = similarity_ratio(query, candidate);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Match { candidate, score });
        }
    }

    match best {
        Some(m) if m.score > threshold => {
            debug!("Matched '{}' -> '{}' (score {:.1})", query, m.candidate, m.score);
            Some(m)
        }
        Some(m) => {
            debug!("Best candidate '{}' scored {:.1}, not above {:.1}", m.candidate, m.score, threshold);
            None
        }
        None => None,
    }
}
