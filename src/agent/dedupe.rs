//! Post-processing for generated answers. Generation backends occasionally
//! emit the full answer twice, or repeat a summary paragraph verbatim;
//! keeping the duplicates looks broken and double-counts facts during
//! grading, so the answer is collapsed once before scoring and display.

use std::collections::HashSet;

const MIN_DEDUPE_CHARS: usize = 100;
const WHOLE_ANSWER_MIN_CHARS: usize = 200;
const PREFIX_PROBE_CHARS: usize = 200;
const SIMILARITY_THRESHOLD: f64 = 0.8;
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Lowercase and collapse all whitespace runs to single spaces.
fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse accidental duplication in an answer. Idempotent; texts under
/// 100 characters pass through untouched.
pub fn collapse_repeats(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < MIN_DEDUPE_CHARS {
        return text.to_string();
    }

    // Whole-answer duplication: the model emitted the entire response twice.
    let half_len = chars.len() / 2;
    if chars.len() > WHOLE_ANSWER_MIN_CHARS && half_len > MIN_DEDUPE_CHARS {
        let first_half: String = chars[..half_len].iter().collect();
        let second_half: String = chars[half_len..].iter().collect();
        let first_half = first_half.trim();
        let second_half = second_half.trim();

        let first_norm = normalize(first_half);
        let second_norm = normalize(second_half);
        let probe: String = first_norm.chars().take(PREFIX_PROBE_CHARS).collect();

        if !probe.is_empty() && second_norm.starts_with(&probe) {
            let a: Vec<char> = first_norm.chars().collect();
            let b: Vec<char> = second_norm.chars().collect();
            let min_len = a.len().min(b.len());
            if min_len > 0 {
                let matching = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
                if matching as f64 / min_len as f64 > SIMILARITY_THRESHOLD {
                    return first_half.to_string();
                }
            }
        }
    }

    // Paragraph duplication: drop repeated substantial paragraphs, first
    // occurrence wins. Short paragraphs (headers, labels) always survive.
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.len() <= 1 {
        return text.to_string();
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(paragraphs.len());
    for para in paragraphs {
        let norm = normalize(para);
        if norm.chars().count() > MIN_PARAGRAPH_CHARS {
            if seen.insert(norm) {
                unique.push(para);
            }
        } else {
            unique.push(para);
        }
    }

    unique.join("\n\n")
}
