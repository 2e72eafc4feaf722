//! Scoring primitives shared by both ranking strategies.
//!
//! Vector math for the embedding strategy, the stopword-filtered term set for
//! the keyword strategy, and the sentence splitter used by refined-text
//! extraction.

use std::collections::HashSet;

/// Fixed stopword list applied to persona/job tokenization. Deliberately
/// small; diacritics and non-Latin scripts are never touched.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "were", "with",
];

/// Abbreviations (lowercased, dots stripped) that never end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "al", "dr", "eg", "eq", "etc", "fig", "ie", "mr", "mrs", "ms", "no", "prof", "st", "vs",
];

/// Cosine similarity between two vectors, defined as 0 when either vector has
/// zero norm or the lengths disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scales a vector to unit L2 norm in place; zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

/// Combines persona and job embeddings into one normalized query vector.
///
/// Weighted addition with the job term scaled by `job_weight`, then L2
/// normalization. Mismatched lengths fall back to whichever vector is longer
/// being truncated, which only happens with a misbehaving backend.
pub fn combine_query(persona: &[f32], job: &[f32], job_weight: f32) -> Vec<f32> {
    let len = persona.len().max(job.len());
    let mut combined = vec![0.0f32; len];
    for (i, slot) in combined.iter_mut().enumerate() {
        let p = persona.get(i).copied().unwrap_or(0.0);
        let j = job.get(i).copied().unwrap_or(0.0);
        *slot = p + job_weight * j;
    }
    l2_normalize(&mut combined);
    combined
}

/// Lowercases and splits text on non-alphanumeric boundaries, dropping
/// stopwords. Diacritics and non-Latin codepoints survive unchanged.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Deduplicated query-term set built from the persona and job strings.
#[derive(Debug, Clone)]
pub struct TermSet {
    terms: Vec<String>,
}

impl TermSet {
    /// Tokenizes `text` into a deduplicated term set, insertion order kept.
    pub fn new(text: &str) -> Self {
        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        for token in tokenize(text) {
            if seen.insert(token.clone()) {
                terms.push(token);
            }
        }
        Self { terms }
    }

    /// True when tokenization left nothing to match on.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Fraction of query terms present in `text`, in `[0, 1]`.
    ///
    /// 1.0 exactly when the text's token set is a superset of the query terms,
    /// 0.0 when disjoint.
    pub fn score(&self, text: &str) -> f32 {
        if self.terms.is_empty() {
            return 0.0;
        }
        let haystack: HashSet<String> = tokenize(text).into_iter().collect();
        let hits = self
            .terms
            .iter()
            .filter(|term| haystack.contains(term.as_str()))
            .count();
        hits as f32 / self.terms.len() as f32
    }
}

/// Splits text into sentences on terminal punctuation.
///
/// Deliberately simple, with two protections: a dot flanked by digits never
/// terminates (decimal numbers, version strings), and a dot following a known
/// abbreviation never terminates. Handles `।` for Devanagari prose.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (pos, &(idx, ch)) in chars.iter().enumerate() {
        if !matches!(ch, '.' | '!' | '?' | '।') {
            continue;
        }
        let next = chars.get(pos + 1).map(|&(_, c)| c);
        if ch == '.' {
            let prev = pos.checked_sub(1).map(|p| chars[p].1);
            let digit_bound = prev.is_some_and(|c| c.is_ascii_digit())
                && next.is_some_and(|c| c.is_ascii_digit());
            if digit_bound || ends_with_abbreviation(&text[start..idx]) {
                continue;
            }
        }
        // Only break when the terminator closes a word.
        if next.is_some_and(|c| !c.is_whitespace()) {
            continue;
        }
        let end = idx + ch.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// True when the text before a dot ends in a known abbreviation.
fn ends_with_abbreviation(prefix: &str) -> bool {
    let last = prefix
        .rsplit(|ch: char| ch.is_whitespace())
        .next()
        .unwrap_or("");
    let cleaned: String = last
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(|ch| ch.to_lowercase())
        .collect();
    !cleaned.is_empty() && ABBREVIATIONS.contains(&cleaned.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_invariant_under_positive_scaling() {
        let a = vec![0.2f32, 0.5, 0.1];
        let b = vec![0.4f32, 0.1, 0.9];
        let scaled: Vec<f32> = a.iter().map(|v| v * 2.0).collect();
        let base = cosine_similarity(&a, &b);
        let rescaled = cosine_similarity(&scaled, &b);
        assert!((base - rescaled).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_norm_defined_as_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn combined_query_is_unit_length() {
        let combined = combine_query(&[1.0, 0.0], &[0.0, 1.0], 2.0);
        let norm: f32 = combined.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!(combined[1] > combined[0]);
    }

    #[test]
    fn keyword_superset_scores_one_disjoint_scores_zero() {
        let terms = TermSet::new("molecular biology methods");
        assert_eq!(
            terms.score("We apply molecular methods from biology here."),
            1.0
        );
        assert_eq!(terms.score("completely unrelated prose"), 0.0);
    }

    #[test]
    fn stopwords_removed_diacritics_kept() {
        let tokens = tokenize("The naïve approach to the café");
        assert_eq!(tokens, ["naïve", "approach", "café"]);
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let sentences = split_sentences("First point. Second point! Third? Done.");
        assert_eq!(
            sentences,
            ["First point.", "Second point!", "Third?", "Done."]
        );
    }

    #[test]
    fn decimal_numbers_do_not_split() {
        let sentences = split_sentences("Pi is roughly 3.14 in value. Next sentence.");
        assert_eq!(
            sentences,
            ["Pi is roughly 3.14 in value.", "Next sentence."]
        );
    }

    #[test]
    fn abbreviations_do_not_split() {
        let sentences = split_sentences("See Fig. 2 for details, e.g. the red curve. Done.");
        assert_eq!(
            sentences,
            ["See Fig. 2 for details, e.g. the red curve.", "Done."]
        );
    }

    #[test]
    fn devanagari_danda_splits() {
        let sentences = split_sentences("यह पहला वाक्य है। यह दूसरा है।");
        assert_eq!(sentences, ["यह पहला वाक्य है।", "यह दूसरा है।"]);
    }
}
