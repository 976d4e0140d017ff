//! PubMed paper provider
//!
//! Two-step NCBI E-utilities flow: `esearch` returns matching PMIDs as
//! JSON, `efetch` returns article XML with titles, authors, abstracts, and
//! publication dates. NCBI asks clients to identify themselves with `tool`
//! and `email` parameters.

use super::{PaperProvider, ProviderError};
use async_trait::async_trait;
use lectern_common::config::AcademicConfig;
use lectern_common::models::Paper;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub struct PubMedProvider {
    client: reqwest::Client,
    base_url: String,
    email: String,
    tool: String,
}

#[derive(Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedProvider {
    pub fn new(config: &AcademicConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.pubmed_base_url.clone(),
            email: config.email.clone(),
            tool: config.tool.clone(),
        }
    }

    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed".to_string()),
                ("term", query.to_string()),
                ("retmax", max_results.to_string()),
                ("retmode", "json".to_string()),
                ("tool", self.tool.clone()),
                ("email", self.email.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
            });
        }

        let parsed: ESearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parsed.esearchresult.idlist)
    }

    async fn fetch_articles(&self, ids: &[String]) -> Result<Vec<Paper>, ProviderError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed".to_string()),
                ("id", ids.join(",")),
                ("retmode", "xml".to_string()),
                ("tool", self.tool.clone()),
                ("email", self.email.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        parse_efetch_xml(&body)
    }
}

#[async_trait]
impl PaperProvider for PubMedProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, ProviderError> {
        let ids = self.search_ids(query, max_results).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let papers = self.fetch_articles(&ids).await?;
        debug!(query = query, results = papers.len(), "PubMed search complete");
        Ok(papers)
    }

    fn name(&self) -> &str {
        "PubMed"
    }
}

#[derive(Default)]
struct ArticleDraft {
    pmid: String,
    title: String,
    abstract_parts: Vec<String>,
    authors: Vec<String>,
    date_parts: Vec<String>,
}

impl ArticleDraft {
    fn build(self) -> Paper {
        let url = format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid);
        Paper {
            title: self.title.trim().to_string(),
            authors: self.authors,
            summary: self.abstract_parts.join(" "),
            published: self.date_parts.join("-"),
            url,
            source: "PubMed".to_string(),
            id: self.pmid,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Pmid,
    Title,
    AbstractText,
    LastName,
    ForeName,
    Year,
    Month,
    Day,
}

/// Parse an efetch `PubmedArticleSet` document
fn parse_efetch_xml(xml: &str) -> Result<Vec<Paper>, ProviderError> {
    let mut reader = Reader::from_str(xml);
    let mut papers = Vec::new();

    let mut in_article = false;
    let mut in_abstract = false;
    let mut in_author = false;
    let mut in_pubdate = false;
    let mut field: Option<Field> = None;
    let mut draft = ArticleDraft::default();
    let mut last_name = String::new();
    let mut fore_name = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"PubmedArticle" => {
                    in_article = true;
                    draft = ArticleDraft::default();
                }
                // Only the citation-level PMID names the article; ignore
                // PMIDs inside reference lists.
                b"PMID" if in_article && draft.pmid.is_empty() => field = Some(Field::Pmid),
                b"ArticleTitle" if in_article => field = Some(Field::Title),
                b"Abstract" if in_article => in_abstract = true,
                b"AbstractText" if in_abstract => field = Some(Field::AbstractText),
                b"Author" if in_article => {
                    in_author = true;
                    last_name.clear();
                    fore_name.clear();
                }
                b"LastName" if in_author => field = Some(Field::LastName),
                b"ForeName" if in_author => field = Some(Field::ForeName),
                b"PubDate" if in_article => in_pubdate = true,
                b"Year" if in_pubdate => field = Some(Field::Year),
                b"Month" if in_pubdate => field = Some(Field::Month),
                b"Day" if in_pubdate => field = Some(Field::Day),
                _ => {}
            },
            Ok(Event::Text(t)) if in_article => {
                if let Some(current) = field {
                    let text = t
                        .unescape()
                        .map_err(|e| ProviderError::Parse(e.to_string()))?;
                    match current {
                        Field::Pmid => draft.pmid.push_str(text.trim()),
                        Field::Title => draft.title.push_str(&text),
                        Field::AbstractText => draft.abstract_parts.push(text.trim().to_string()),
                        Field::LastName => last_name.push_str(text.trim()),
                        Field::ForeName => fore_name.push_str(text.trim()),
                        Field::Year | Field::Month | Field::Day => {
                            draft.date_parts.push(text.trim().to_string())
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"PubmedArticle" => {
                        in_article = false;
                        papers.push(std::mem::take(&mut draft).build());
                    }
                    b"Abstract" => in_abstract = false,
                    b"Author" => {
                        in_author = false;
                        if !last_name.is_empty() && !fore_name.is_empty() {
                            draft.authors.push(format!("{last_name} {fore_name}"));
                        }
                    }
                    b"PubDate" => in_pubdate = false,
                    _ => {}
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ProviderError::Parse(e.to_string())),
            _ => {}
        }
    }

    Ok(papers)
}
