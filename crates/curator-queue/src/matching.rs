//! Title-variant expansion and fuzzy result picking for provider searches.
//!
//! Library titles come from filenames and rarely match provider canon
//! exactly. Search therefore widens across derived variants (parentheticals
//! stripped, leading article dropped, pre-colon prefix, punctuation
//! stripped) and scores candidates by normalized string similarity with a
//! bonus for a matching year.

use serde::Serialize;
use strsim::normalized_levenshtein;
use tracing::warn;

use curator_providers::{ProviderError, SearchHit};

/// Similarity floor below which the best candidate is rejected.
const MATCH_THRESHOLD: f64 = 0.5;
/// Score bonus when the candidate's year equals the target year.
const YEAR_BONUS: f64 = 0.15;

/// One search attempt, kept for the operator-visible no-result log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriedQuery {
    pub query: String,
    pub year: Option<i32>,
}

/// Render the attempts for a log message.
pub fn format_tried(tried: &[TriedQuery]) -> String {
    serde_json::to_string(tried).unwrap_or_else(|_| "[]".to_string())
}

/// Derive search variants from a title, original first, deduplicated.
pub fn title_variants(title: &str) -> Vec<String> {
    if title.is_empty() {
        return Vec::new();
    }
    let mut variants = vec![title.to_string()];
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    };

    push(strip_parentheticals(title));
    for article in ["The ", "A ", "An "] {
        if let Some(stripped) = title.strip_prefix(article) {
            push(stripped.trim().to_string());
        }
    }
    if let Some((before, _)) = title.split_once(':') {
        push(before.trim().to_string());
    }
    push(
        title
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
            .collect::<String>()
            .trim()
            .to_string(),
    );
    variants
}

fn strip_parentheticals(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut depth = 0usize;
    for c in title.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pick the best-scoring hit above the threshold.
pub fn pick_best_hit<'a>(
    hits: &'a [SearchHit],
    target_title: &str,
    target_year: Option<i32>,
) -> Option<&'a SearchHit> {
    let target = target_title.to_lowercase();
    let mut best: Option<&SearchHit> = None;
    let mut best_score = 0.0;
    for hit in hits {
        let mut score = normalized_levenshtein(&target, &hit.title.to_lowercase());
        if let (Some(want), Some(got)) = (target_year, hit.year) {
            if want == got {
                score += YEAR_BONUS;
            }
        }
        if score > best_score {
            best_score = score;
            best = Some(hit);
        }
    }
    if best_score >= MATCH_THRESHOLD { best } else { None }
}

/// Run the variant/year search ladder against a search function.
///
/// For each variant: first with the year (when given), then without. The
/// first non-empty result set wins; best fuzzy match if one clears the
/// threshold, otherwise the provider's first result. Search errors are
/// logged and treated as empty so one flaky call doesn't abort the ladder.
/// Returns the chosen hit id and every query attempted.
pub async fn resolve_via_search<F, Fut>(
    title: &str,
    year: Option<i32>,
    search: F,
) -> (Option<i64>, Vec<TriedQuery>)
where
    F: Fn(String, Option<i32>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<SearchHit>, ProviderError>>,
{
    let mut tried = Vec::new();
    for variant in title_variants(title) {
        let mut attempts = Vec::new();
        if year.is_some() {
            attempts.push(year);
        }
        attempts.push(None);

        for attempt_year in attempts {
            tried.push(TriedQuery {
                query: variant.clone(),
                year: attempt_year,
            });
            let hits = match search(variant.clone(), attempt_year).await {
                Ok(hits) => hits,
                Err(err) => {
                    warn!(query = %variant, ?attempt_year, %err, "metadata search failed");
                    Vec::new()
                }
            };
            if hits.is_empty() {
                continue;
            }
            let chosen = pick_best_hit(&hits, &variant, attempt_year)
                .or_else(|| hits.first())
                .map(|hit| hit.id);
            return (chosen, tried);
        }
    }
    (None, tried)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i64, title: &str, year: Option<i32>) -> SearchHit {
        SearchHit {
            id,
            title: title.to_string(),
            year,
        }
    }

    #[test]
    fn variants_cover_the_expansion_set() {
        let variants = title_variants("The Lord of the Rings: The Fellowship (2001)");
        assert_eq!(variants[0], "The Lord of the Rings: The Fellowship (2001)");
        assert!(variants.contains(&"The Lord of the Rings: The Fellowship".to_string()));
        assert!(
            variants.contains(&"Lord of the Rings: The Fellowship (2001)".to_string()),
            "article-stripped variant: {variants:?}"
        );
        assert!(variants.contains(&"The Lord of the Rings".to_string()));
        // Punctuation-stripped variant has no colon or parens.
        assert!(variants.iter().any(|v| !v.contains(':') && !v.contains('(')));
    }

    #[test]
    fn variants_deduplicate() {
        let variants = title_variants("Heat");
        assert_eq!(variants, vec!["Heat".to_string()]);
        assert!(title_variants("").is_empty());
    }

    #[test]
    fn year_match_boosts_score() {
        let hits = vec![hit(1, "Heat", Some(1972)), hit(2, "Heat", Some(1995))];
        let best = pick_best_hit(&hits, "Heat", Some(1995)).unwrap();
        assert_eq!(best.id, 2);
    }

    #[test]
    fn low_similarity_is_rejected() {
        let hits = vec![hit(1, "Something Entirely Different", None)];
        assert!(pick_best_hit(&hits, "Heat", None).is_none());
    }

    #[tokio::test]
    async fn ladder_falls_back_to_first_result_below_threshold() {
        let (chosen, tried) = resolve_via_search("Heat", None, |query, _year| async move {
            if query == "Heat" {
                Ok(vec![hit(9, "Completely Unrelated Name", None)])
            } else {
                Ok(vec![])
            }
        })
        .await;
        assert_eq!(chosen, Some(9));
        assert_eq!(tried.len(), 1);
    }

    #[tokio::test]
    async fn ladder_drops_year_on_second_pass() {
        let (chosen, tried) =
            resolve_via_search("Heat", Some(1995), |query, year| async move {
                if query == "Heat" && year.is_none() {
                    Ok(vec![hit(42, "Heat", Some(1995))])
                } else {
                    Ok(vec![])
                }
            })
            .await;
        assert_eq!(chosen, Some(42));
        assert_eq!(
            tried,
            vec![
                TriedQuery { query: "Heat".to_string(), year: Some(1995) },
                TriedQuery { query: "Heat".to_string(), year: None },
            ]
        );
    }

    #[tokio::test]
    async fn ladder_records_every_attempt_when_nothing_matches() {
        let (chosen, tried) =
            resolve_via_search("The Phantom: Menace", Some(1999), |_q, _y| async move {
                Ok(vec![])
            })
            .await;
        assert!(chosen.is_none());
        // Each variant tried with and without the year.
        assert!(tried.len() >= 6);
        assert!(format_tried(&tried).contains("\"query\""));
    }

    #[tokio::test]
    async fn search_errors_are_treated_as_empty() {
        let (chosen, _) = resolve_via_search("Heat", None, |_q, _y| async move {
            Err(ProviderError::Http("boom".to_string()))
        })
        .await;
        assert!(chosen.is_none());
    }
}
