//! Text utilities shared by the scorer, deduplicator and validator.
//!
//! Vietnamese product talk mixes scripts, casing and stray whitespace,
//! so every comparison in the engine goes through [`normalize`] first.

/// Lowercase and collapse internal whitespace, preserving Unicode.
///
/// `"  iPhone  15  PRO "` becomes `"iphone 15 pro"`.
pub fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ratcliff/Obershelp sequence similarity in [0.0, 1.0].
///
/// Computed as `2 * matches / (len_a + len_b)` where matches are counted by
/// recursively splitting around the longest common substring. Symmetric, and
/// equal strings score exactly 1.0.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matches = matching_chars(&a, &b);
    (2.0 * matches as f64) / ((a.len() + b.len()) as f64)
}

/// Total matched characters: longest common substring, then recurse on the
/// unmatched pieces to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (best_a, best_b, best_len) = longest_common_substring(a, b);
    if best_len == 0 {
        return 0;
    }
    best_len
        + matching_chars(&a[..best_a], &b[..best_b])
        + matching_chars(&a[best_a + best_len..], &b[best_b + best_len..])
}

/// Position and length of the longest common substring, earliest match wins
/// ties.
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut curr = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                curr[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = curr;
    }
    best
}

/// Render an amount in Vietnamese dong: `.` thousands separators, `đ` suffix.
///
/// `24_990_000` becomes `"24.990.000đ"`.
pub fn format_vnd(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    if amount < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped.push('đ');
    grouped
}
