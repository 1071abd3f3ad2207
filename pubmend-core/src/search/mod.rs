//! Fuzzy ranking of catalog candidates
//!
//! Scores every candidate name against the user's query (0 = perfect,
//! lower is better), drops names from the reserved `dart:` namespace and
//! weak matches, and decides whether a single candidate is confident
//! enough to be picked without asking the user.

use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, levenshtein, normalized_levenshtein};
use tracing::debug;

/// Prefix of the preinstalled SDK libraries (`dart:io`, `dart:async`, ...)
pub const RESERVED_PREFIX: &str = "dart:";

/// Default score at or below which a match is considered certain
pub const DEFAULT_AUTO_RESOLVE_THRESHOLD: f64 = 0.1;

/// Default score above which a candidate is dropped
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// Default distance over which a late match position costs a full point
pub const DEFAULT_LOCATION_DISTANCE: usize = 100;

/// How a query is compared to a candidate name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityMetric {
    /// Approximate substring match averaged with whole-name edit distance
    #[default]
    Blended,
    /// Whole-name normalized Levenshtein distance
    Levenshtein,
    /// Whole-name Jaro-Winkler distance
    JaroWinkler,
}

/// Ranker tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankerConfig {
    /// Score at or below which a match counts as high confidence
    pub auto_resolve_threshold: f64,

    /// Score above which a candidate is not returned at all
    pub match_threshold: f64,

    /// Characters of offset that add a full point to the substring score
    pub location_distance: usize,

    /// Scoring function
    pub metric: SimilarityMetric,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            auto_resolve_threshold: DEFAULT_AUTO_RESOLVE_THRESHOLD,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            location_distance: DEFAULT_LOCATION_DISTANCE,
            metric: SimilarityMetric::default(),
        }
    }
}

/// A candidate with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub name: String,
    pub score: f64,
}

/// Outcome of ranking a query
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    /// Exactly one high-confidence match and auto-pick is enabled
    Resolved(ScoredCandidate),

    /// Ranked candidates, best first, for the caller to disambiguate
    Candidates(Vec<ScoredCandidate>),
}

impl SearchResult {
    /// Candidate names in ranked order
    pub fn names(&self) -> Vec<String> {
        match self {
            SearchResult::Resolved(candidate) => vec![candidate.name.clone()],
            SearchResult::Candidates(candidates) => {
                candidates.iter().map(|c| c.name.clone()).collect()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SearchResult::Candidates(c) if c.is_empty())
    }

    /// The auto-resolved name, if any
    pub fn resolved(&self) -> Option<&str> {
        match self {
            SearchResult::Resolved(candidate) => Some(&candidate.name),
            SearchResult::Candidates(_) => None,
        }
    }
}

/// Whether a name belongs to the preinstalled SDK namespace
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Rank `candidates` against `query`
///
/// `auto_pick` gates the single-candidate shortcut; when it is off the
/// full ranked list is always returned.
pub fn rank(
    query: &str,
    candidates: &[String],
    config: &RankerConfig,
    auto_pick: bool,
) -> SearchResult {
    if query.trim().is_empty() {
        return SearchResult::Candidates(Vec::new());
    }

    let mut ranked: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|name| !is_reserved(name))
        .map(|name| ScoredCandidate {
            name: name.clone(),
            score: score(query, name, config),
        })
        .filter(|candidate| candidate.score <= config.match_threshold)
        .collect();

    // Stable: equal scores keep catalog order
    ranked.sort_by(|a, b| a.score.total_cmp(&b.score));

    let confident: Vec<&ScoredCandidate> = ranked
        .iter()
        .filter(|c| c.score <= config.auto_resolve_threshold)
        .collect();

    debug!(
        "Ranked {} of {} candidates for '{}' ({} high-confidence)",
        ranked.len(),
        candidates.len(),
        query,
        confident.len()
    );

    if auto_pick && confident.len() == 1 {
        return SearchResult::Resolved(confident[0].clone());
    }

    SearchResult::Candidates(ranked)
}

/// Similarity score in [0, 1], 0 being a perfect match
pub fn score(query: &str, candidate: &str, config: &RankerConfig) -> f64 {
    let raw = match config.metric {
        SimilarityMetric::Blended => {
            let substring = substring_score(query, candidate, config.location_distance);
            let whole = 1.0 - normalized_levenshtein(query, candidate);
            (substring + whole) / 2.0
        }
        SimilarityMetric::Levenshtein => 1.0 - normalized_levenshtein(query, candidate),
        SimilarityMetric::JaroWinkler => 1.0 - jaro_winkler(query, candidate),
    };
    raw.clamp(0.0, 1.0)
}

/// Best approximate occurrence of `query` inside `candidate`
///
/// Slides a query-sized window over the candidate; each window costs its
/// edit distance relative to the query length plus its offset relative to
/// `location_distance`.
fn substring_score(query: &str, candidate: &str, location_distance: usize) -> f64 {
    let query_len = query.chars().count();
    if query_len == 0 {
        return 1.0;
    }

    let chars: Vec<char> = candidate.chars().collect();
    if chars.len() <= query_len {
        return levenshtein(query, candidate) as f64 / query_len as f64;
    }

    let distance = location_distance.max(1) as f64;
    (0..=chars.len() - query_len)
        .map(|start| {
            let window: String = chars[start..start + query_len].iter().collect();
            let errors = levenshtein(query, &window) as f64 / query_len as f64;
            errors + start as f64 / distance
        })
        .fold(f64::INFINITY, f64::min)
        .min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_auto_resolves() {
        let config = RankerConfig::default();
        let result = rank("http", &names(&["http", "http_parser"]), &config, true);

        assert_eq!(result.resolved(), Some("http"));
        assert_eq!(result.names(), vec!["http"]);
    }

    #[test]
    fn test_scores_straddle_confidence_threshold() {
        let config = RankerConfig::default();
        assert_eq!(score("http", "http", &config), 0.0);

        let parser = score("http", "http_parser", &config);
        assert!(parser > config.auto_resolve_threshold, "score was {parser}");
        assert!(parser <= config.match_threshold, "score was {parser}");
    }

    #[test]
    fn test_auto_pick_disabled_returns_ranked_list() {
        let config = RankerConfig::default();
        let result = rank("http", &names(&["http_parser", "http"]), &config, false);

        assert!(result.resolved().is_none());
        assert_eq!(result.names(), vec!["http", "http_parser"]);
    }

    #[test]
    fn test_two_confident_matches_do_not_auto_resolve() {
        let config = RankerConfig {
            auto_resolve_threshold: 0.4,
            ..RankerConfig::default()
        };
        let result = rank("http", &names(&["http", "http_parser"]), &config, true);

        assert!(result.resolved().is_none());
        assert_eq!(result.names().len(), 2);
    }

    #[test]
    fn test_reserved_namespace_is_filtered() {
        let config = RankerConfig::default();
        let result = rank(
            "dart:io",
            &names(&["dart:io", "dart:isolate", "dartio"]),
            &config,
            true,
        );

        assert!(result.resolved().is_none());
        assert_eq!(result.names(), vec!["dartio"]);
    }

    #[test]
    fn test_empty_inputs_never_resolve() {
        let config = RankerConfig::default();

        let result = rank("http", &[], &config, true);
        assert!(result.is_empty());

        let result = rank("   ", &names(&["http"]), &config, true);
        assert!(result.is_empty());
    }

    #[test]
    fn test_weak_matches_are_dropped() {
        let config = RankerConfig::default();
        let result = rank("provider", &names(&["provider", "sqflite"]), &config, false);

        assert_eq!(result.names(), vec!["provider"]);
    }

    #[test]
    fn test_typo_still_ranks_first() {
        let config = RankerConfig::default();
        let result = rank(
            "provder",
            &names(&["flutter_provider", "provider", "riverpod"]),
            &config,
            true,
        );

        assert_eq!(result.names().first().map(String::as_str), Some("provider"));
    }

    #[test]
    fn test_candidate_casing_is_not_normalized() {
        let config = RankerConfig::default();
        assert!(score("http", "HTTP", &config) > score("http", "http", &config));
    }

    #[test]
    fn test_alternative_metrics() {
        let levenshtein = RankerConfig {
            metric: SimilarityMetric::Levenshtein,
            ..RankerConfig::default()
        };
        assert_eq!(score("dio", "dio", &levenshtein), 0.0);

        let jaro = RankerConfig {
            metric: SimilarityMetric::JaroWinkler,
            ..RankerConfig::default()
        };
        assert!(score("http", "http_parser", &jaro) < score("http", "dio", &jaro));
    }
}
