// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Near-miss suggestions
//!
//! Unknown-name errors are enriched with the valid names closest to the one
//! written. A candidate qualifies when it is within a small edit distance of
//! the query, or sounds the same (equal Soundex code).

use serde::{Deserialize, Serialize};
use std::cmp::{max, min};

/// How a candidate matches the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Same name up to letter case
    CaseInsensitive,
    /// Within the maximum edit distance (typo correction)
    Fuzzy { distance: usize },
    /// Candidate starts with the query
    PrefixMatch,
    /// Same Soundex code
    Phonetic,
}

/// A ranked suggestion
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub candidate: String,
    pub match_kind: MatchKind,
    pub relevance_score: f64,
}

/// Configuration for suggestion matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolutionConfig {
    /// Maximum Levenshtein distance for fuzzy matching (default: 2)
    pub max_distance: usize,
    /// Maximum number of suggestions to return (default: 5)
    pub max_suggestions: usize,
    /// Also suggest candidates with the same Soundex code (default: true)
    pub phonetic: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_distance: 2,
            max_suggestions: 5,
            phonetic: true,
        }
    }
}

impl ResolutionConfig {
    /// Classify how `candidate` matches `query`, if at all
    fn match_kind(&self, query: &str, candidate: &str) -> Option<MatchKind> {
        if query == candidate {
            return None;
        }
        if query.eq_ignore_ascii_case(candidate) {
            return Some(MatchKind::CaseInsensitive);
        }

        let distance = levenshtein_distance(&query.to_lowercase(), &candidate.to_lowercase());
        if distance <= self.max_distance {
            return Some(MatchKind::Fuzzy { distance });
        }

        if query.len() >= 3 && candidate.to_lowercase().starts_with(&query.to_lowercase()) {
            return Some(MatchKind::PrefixMatch);
        }

        if self.phonetic {
            let code = soundex(query);
            if code.is_some() && code == soundex(candidate) {
                return Some(MatchKind::Phonetic);
            }
        }

        None
    }

    /// Rank the candidates matching `query`, best first
    pub fn rank<'a, I>(&self, query: &str, candidates: I) -> Vec<Suggestion>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut suggestions: Vec<Suggestion> = Vec::new();
        for candidate in candidates {
            if suggestions.iter().any(|s| s.candidate == candidate) {
                continue;
            }
            if let Some(match_kind) = self.match_kind(query, candidate) {
                suggestions.push(Suggestion {
                    candidate: candidate.to_string(),
                    match_kind,
                    relevance_score: relevance_score(query, candidate, match_kind, self),
                });
            }
        }

        // Stable sort keeps candidate order among equal scores
        suggestions.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        suggestions.truncate(self.max_suggestions);
        suggestions
    }

    /// Names of the best candidates matching `query`
    pub fn suggest<'a, I>(&self, query: &str, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.rank(query, candidates)
            .into_iter()
            .map(|s| s.candidate)
            .collect()
    }
}

/// Relevance of a match in `[0, 1]`; higher is more relevant
fn relevance_score(query: &str, candidate: &str, kind: MatchKind, config: &ResolutionConfig) -> f64 {
    let score = match kind {
        MatchKind::CaseInsensitive => 0.95,
        MatchKind::Fuzzy { distance } => {
            let base_score = similarity_score(query, candidate);
            let distance_penalty = 1.0 - (distance as f64 / (config.max_distance as f64 + 1.0));
            base_score * distance_penalty + 0.1
        }
        MatchKind::PrefixMatch => (query.len() as f64 / candidate.len() as f64) * 0.85,
        MatchKind::Phonetic => 0.3,
    };
    score.clamp(0.0, 1.0)
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    // Use the smaller string for the inner array to save space
    if m < n {
        return levenshtein_distance(b, a);
    }

    let mut previous: Vec<usize> = (0..=n).collect();

    for (i, &ca) in a_chars.iter().enumerate() {
        let mut current = vec![i + 1];

        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current.push(min(
                min(previous[j + 1] + 1, current[j] + 1),
                previous[j] + cost,
            ));
        }

        previous = current;
    }

    previous[n]
}

/// Calculate similarity score (0.0 to 1.0) based on edit distance
fn similarity_score(a: &str, b: &str) -> f64 {
    let max_len = max(a.chars().count(), b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    let distance = levenshtein_distance(&a.to_lowercase(), &b.to_lowercase());
    1.0 - (distance as f64 / max_len as f64)
}

/// American Soundex code of a word, `None` when it has no ASCII letter
pub fn soundex(word: &str) -> Option<String> {
    fn digit(c: char) -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let mut letters = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase());
    let first = letters.next()?;

    let mut code = String::with_capacity(4);
    code.push(first);
    let mut last = digit(first);

    for c in letters {
        let d = digit(c);
        if let Some(encoded) = d.filter(|_| d != last) {
            code.push(encoded);
            if code.len() == 4 {
                break;
            }
        }
        // H and W do not separate letters with the same code
        if c != 'H' && c != 'W' {
            last = d;
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("Nme", "Name"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_soundex() {
        assert_eq!(soundex("Robert").as_deref(), Some("R163"));
        assert_eq!(soundex("Rupert").as_deref(), Some("R163"));
        assert_eq!(soundex("Ashcraft").as_deref(), Some("A261"));
        assert_eq!(soundex("Tymczak").as_deref(), Some("T522"));
        assert_eq!(soundex("42"), None);
    }

    #[test]
    fn test_suggest_typo() {
        let config = ResolutionConfig::default();
        let suggestions = config.suggest("Nme", ["Name", "City", "Country"]);
        assert_eq!(suggestions, vec!["Name".to_string()]);
    }

    #[test]
    fn test_suggest_phonetic_beyond_edit_distance() {
        let config = ResolutionConfig::default();
        assert_eq!(
            config.suggest("Jaxen", ["Jackson", "Salary"]),
            vec!["Jackson".to_string()]
        );

        let strict = ResolutionConfig {
            phonetic: false,
            ..ResolutionConfig::default()
        };
        assert!(strict.suggest("Jaxen", ["Jackson"]).is_empty());
    }

    #[test]
    fn test_case_insensitive_ranks_first() {
        let config = ResolutionConfig::default();
        let suggestions = config.suggest("name", ["Nam", "Name"]);
        assert_eq!(suggestions[0], "Name");
    }

    #[test]
    fn test_max_suggestions_and_duplicates() {
        let config = ResolutionConfig {
            max_suggestions: 2,
            ..ResolutionConfig::default()
        };
        let suggestions = config.suggest("ab", ["abc", "abd", "abc", "abe"]);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0], "abc");
    }

    #[test]
    fn test_no_suggestions_for_completely_wrong_name() {
        let config = ResolutionConfig::default();
        assert!(config.suggest("xyz", ["Name", "City"]).is_empty());
    }
}
