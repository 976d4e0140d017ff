//! arXiv paper provider
//!
//! Queries the arXiv export API (Atom feed, relevance-sorted) and parses
//! entries into [`Paper`] records.

use super::{PaperProvider, ProviderError};
use async_trait::async_trait;
use lectern_common::config::AcademicConfig;
use lectern_common::models::Paper;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use tracing::debug;

pub struct ArxivProvider {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivProvider {
    pub fn new(config: &AcademicConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.arxiv_base_url.clone(),
        }
    }
}

#[async_trait]
impl PaperProvider for ArxivProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", format!("all:{query}")),
                ("start", "0".to_string()),
                ("max_results", max_results.to_string()),
                ("sortBy", "relevance".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let papers = parse_atom_feed(&body)?;
        debug!(query = query, results = papers.len(), "arXiv search complete");
        Ok(papers)
    }

    fn name(&self) -> &str {
        "arXiv"
    }
}

#[derive(Default)]
struct EntryDraft {
    title: String,
    authors: Vec<String>,
    summary: String,
    published: String,
    abs_url: String,
    pdf_url: Option<String>,
}

impl EntryDraft {
    fn build(self) -> Paper {
        // Entry ids look like http://arxiv.org/abs/2101.00001v2; the short
        // id is the last path segment.
        let short_id = self
            .abs_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        Paper {
            title: normalize_whitespace(&self.title),
            authors: self.authors,
            summary: self.summary.trim().to_string(),
            published: self.published.chars().take(10).collect(),
            url: self.pdf_url.unwrap_or(self.abs_url),
            source: "arXiv".to_string(),
            id: short_id,
        }
    }
}

/// arXiv wraps long titles and summaries over indented lines
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Summary,
    Published,
    Id,
    AuthorName,
}

fn parse_atom_feed(xml: &str) -> Result<Vec<Paper>, ProviderError> {
    let mut reader = Reader::from_str(xml);
    let mut papers = Vec::new();

    let mut in_entry = false;
    let mut field: Option<Field> = None;
    let mut draft = EntryDraft::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    draft = EntryDraft::default();
                }
                b"title" if in_entry => field = Some(Field::Title),
                b"summary" if in_entry => field = Some(Field::Summary),
                b"published" if in_entry => field = Some(Field::Published),
                b"id" if in_entry => field = Some(Field::Id),
                b"name" if in_entry => field = Some(Field::AuthorName),
                _ => {}
            },
            Ok(Event::Empty(e)) if in_entry && e.local_name().as_ref() == b"link" => {
                let mut is_pdf = false;
                let mut href = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"title" if attr.value.as_ref() == b"pdf" => is_pdf = true,
                        b"href" => href = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                        _ => {}
                    }
                }
                if is_pdf {
                    draft.pdf_url = href;
                }
            }
            Ok(Event::Text(t)) if in_entry => {
                if let Some(current) = field {
                    let text = t
                        .unescape()
                        .map_err(|e| ProviderError::Parse(e.to_string()))?;
                    match current {
                        Field::Title => draft.title.push_str(&text),
                        Field::Summary => draft.summary.push_str(&text),
                        Field::Published => draft.published.push_str(&text),
                        Field::Id => draft.abs_url.push_str(&text),
                        Field::AuthorName => {
                            let name = text.trim().to_string();
                            if !name.is_empty() {
                                draft.authors.push(name);
                            }
                        }
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    in_entry = false;
                    papers.push(std::mem::take(&mut draft).build());
                }
                b"title" | b"summary" | b"published" | b"id" | b"name" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ProviderError::Parse(e.to_string())),
            _ => {}
        }
    }

    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query: search_query=all:attention</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models...</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2005.12345v1</id>
    <published>2020-05-25T00:00:00Z</published>
    <title>Second Paper</title>
    <summary>Another summary.</summary>
    <author><name>Jane Roe</name></author>
    <link href="http://arxiv.org/abs/2005.12345v1" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.title, "Attention Is All You Need");
        assert_eq!(first.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(first.published, "2017-06-12");
        assert_eq!(first.url, "http://arxiv.org/pdf/1706.03762v7");
        assert_eq!(first.source, "arXiv");
        assert_eq!(first.id, "1706.03762v7");
    }

    #[test]
    fn test_missing_pdf_link_falls_back_to_abs_url() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert_eq!(papers[1].url, "http://arxiv.org/abs/2005.12345v1");
    }

    #[test]
    fn test_feed_title_is_not_an_entry_field() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert!(!papers[0].title.contains("ArXiv Query"));
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>none</title></feed>"#;
        assert!(parse_atom_feed(xml).unwrap().is_empty());
    }
}
