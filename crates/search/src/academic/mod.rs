//! External academic paper search
//!
//! Two providers (arXiv, PubMed) behind one trait. Each returns its own
//! relevance-ordered list; `AcademicSearch` merges them by round-robin
//! interleave and caps the combined list at twice the per-provider maximum.
//! The interleave trusts provider ordering — it is a heuristic merge, not a
//! re-ranking. Provider failures degrade to an empty contribution.

mod arxiv;
mod pubmed;

pub use arxiv::ArxivProvider;
pub use pubmed::PubMedProvider;

use async_trait::async_trait;
use lectern_common::config::AcademicConfig;
use lectern_common::metrics;
use lectern_common::models::Paper;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Provider-level failure; callers degrade rather than propagate
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("API error: status {status}")]
    Api { status: u16 },
}

/// A ranked paper search source
#[async_trait]
pub trait PaperProvider: Send + Sync {
    /// Search for papers, best match first
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, ProviderError>;

    /// Provider name used in logs and paper records
    fn name(&self) -> &str;
}

/// Fan-out search across all configured providers
pub struct AcademicSearch {
    providers: Vec<Arc<dyn PaperProvider>>,
}

impl AcademicSearch {
    /// Standard provider set: arXiv and PubMed
    pub fn new(config: &AcademicConfig) -> Self {
        Self {
            providers: vec![
                Arc::new(ArxivProvider::new(config)),
                Arc::new(PubMedProvider::new(config)),
            ],
        }
    }

    /// Custom provider set (tests, reduced deployments)
    pub fn with_providers(providers: Vec<Arc<dyn PaperProvider>>) -> Self {
        Self { providers }
    }

    /// Query every provider and interleave their relevance-ordered lists.
    ///
    /// Providers are queried sequentially; a failing provider contributes
    /// an empty list after a warning. The combined list is truncated to
    /// `2 * max_results`.
    pub async fn search_all(&self, query: &str, max_results: usize) -> Vec<Paper> {
        let mut per_provider: Vec<Vec<Paper>> = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let results = match provider.search(query, max_results).await {
                Ok(papers) => {
                    metrics::record_paper_search(provider.name(), true);
                    papers
                }
                Err(e) => {
                    metrics::record_paper_search(provider.name(), false);
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Paper search failed, continuing without this provider"
                    );
                    Vec::new()
                }
            };
            per_provider.push(results);
        }

        let combined = interleave(per_provider, max_results * 2);
        info!(
            query = query,
            results = combined.len(),
            "Academic search complete"
        );
        combined
    }
}

/// Round-robin merge: rank 0 of each list, then rank 1, and so on
fn interleave(lists: Vec<Vec<Paper>>, cap: usize) -> Vec<Paper> {
    let longest = lists.iter().map(|l| l.len()).max().unwrap_or(0);
    let mut combined = Vec::new();

    for rank in 0..longest {
        for list in &lists {
            if let Some(paper) = list.get(rank) {
                combined.push(paper.clone());
            }
        }
    }

    combined.truncate(cap);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubProvider {
        name: &'static str,
        papers: Vec<Paper>,
        fail: bool,
    }

    #[async_trait]
    impl PaperProvider for StubProvider {
        async fn search(&self, _query: &str, max: usize) -> Result<Vec<Paper>, ProviderError> {
            if self.fail {
                return Err(ProviderError::Api { status: 503 });
            }
            Ok(self.papers.iter().take(max).cloned().collect())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn paper(source: &str, rank: usize) -> Paper {
        Paper {
            title: format!("{source} paper {rank}"),
            authors: vec!["Doe J".into()],
            summary: "summary".into(),
            published: "2024-01-01".into(),
            url: format!("https://example.org/{source}/{rank}"),
            source: source.to_string(),
            id: format!("{source}-{rank}"),
        }
    }

    fn stub(name: &'static str, count: usize) -> Arc<dyn PaperProvider> {
        Arc::new(StubProvider {
            name,
            papers: (0..count).map(|i| paper(name, i)).collect(),
            fail: false,
        })
    }

    #[tokio::test]
    async fn test_round_robin_interleave_order() {
        let search = AcademicSearch::with_providers(vec![stub("arXiv", 2), stub("PubMed", 2)]);
        let results = search.search_all("quantum", 3).await;

        let titles: Vec<&str> = results.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["arXiv paper 0", "PubMed paper 0", "arXiv paper 1", "PubMed paper 1"]
        );
    }

    #[tokio::test]
    async fn test_combined_results_capped_at_twice_max() {
        let search = AcademicSearch::with_providers(vec![stub("arXiv", 3), stub("PubMed", 3)]);
        let results = search.search_all("quantum", 2).await;
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_uneven_lists_interleave_cleanly() {
        let search = AcademicSearch::with_providers(vec![stub("arXiv", 3), stub("PubMed", 1)]);
        let results = search.search_all("quantum", 3).await;

        let titles: Vec<&str> = results.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["arXiv paper 0", "PubMed paper 0", "arXiv paper 1", "arXiv paper 2"]
        );
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_empty() {
        let failing = Arc::new(StubProvider {
            name: "PubMed",
            papers: vec![],
            fail: true,
        });
        let search = AcademicSearch::with_providers(vec![stub("arXiv", 2), failing]);
        let results = search.search_all("quantum", 3).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|p| p.source == "arXiv"));
    }

    #[tokio::test]
    async fn test_all_providers_failing_yields_empty() {
        let failing = Arc::new(StubProvider {
            name: "arXiv",
            papers: vec![],
            fail: true,
        });
        let search = AcademicSearch::with_providers(vec![failing]);
        assert!(search.search_all("quantum", 3).await.is_empty());
    }
}
