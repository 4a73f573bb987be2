//! Financial vocabulary corpus builder.
//!
//! Crawls the dictionary in three levels: the root page lists one page per
//! letter, each letter page lists term pages, and each term page holds one
//! term with its definition.

use super::fetcher::{fetch_all, PageFetcher};
use super::parser::{element_text, extract_links, page_title, selector};
use super::{ScrapeProgress, ScrapeStage};
use crate::config::CorpusConfig;
use crate::dataset::VocabularyEntry;
use crate::error::ScrapeError;
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const LETTER_LINKS: &str = "ul#terms-bar__list_1-0 a[href]";
const TERM_LINKS: &str = "div#dictionary-top300-list__content_1-0 a[href]";
const DEFINITION_ITEMS: &str = "div#mntl-sc-block-callout-body_1-0 li";

/// Parses a term page into an entry.
///
/// The term is the page title and the definition is the text of the list
/// items in the summary callout. Returns `Ok(None)` when either is missing.
pub fn parse_term_page(html: &str) -> Result<Option<VocabularyEntry>, ScrapeError> {
    let document = Html::parse_document(html);
    let Some(term) = page_title(&document)? else {
        return Ok(None);
    };

    let items = selector(DEFINITION_ITEMS)?;
    let definition = document
        .select(&items)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if definition.is_empty() {
        return Ok(None);
    }

    Ok(Some(VocabularyEntry { term, definition }))
}

/// Keeps the first entry for each term, preserving order.
pub fn dedupe_terms(entries: Vec<VocabularyEntry>) -> Vec<VocabularyEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.term.clone()))
        .collect()
}

/// Builds the vocabulary from the online dictionary.
pub struct CorpusBuilder<'a> {
    fetcher: &'a dyn PageFetcher,
    config: CorpusConfig,
    max_in_flight: usize,
}

impl<'a> CorpusBuilder<'a> {
    /// Creates a builder.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Page source
    /// * `config` - Dictionary location
    /// * `max_in_flight` - Concurrent request bound
    pub fn new(fetcher: &'a dyn PageFetcher, config: CorpusConfig, max_in_flight: usize) -> Self {
        Self {
            fetcher,
            config,
            max_in_flight,
        }
    }

    /// Crawls the dictionary and returns the deduplicated vocabulary.
    ///
    /// Letter and term pages that fail to load or parse are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Fails only if the root page cannot be fetched or lists no letter
    /// pages, since nothing can be built without it.
    pub async fn build<F>(&self, mut on_progress: F) -> Result<Vec<VocabularyEntry>, ScrapeError>
    where
        F: FnMut(ScrapeProgress),
    {
        let root_url = self.config.dictionary_url.as_str();
        let root = self.fetcher.fetch(root_url).await?;
        let letter_urls = extract_links(&root, root_url, LETTER_LINKS)?;
        if letter_urls.is_empty() {
            return Err(ScrapeError::ParseError(format!(
                "No letter pages found at {}",
                root_url
            )));
        }
        info!("Found {} letter pages", letter_urls.len());

        // Level 2: term links, deduplicated across letters
        let total = letter_urls.len();
        let letter_pages = fetch_all(self.fetcher, letter_urls, self.max_in_flight, |done| {
            on_progress(ScrapeProgress::new(ScrapeStage::LetterPages, done, total))
        })
        .await;

        let mut seen = HashSet::new();
        let mut term_urls = Vec::new();
        for (url, page) in letter_pages {
            let links = page.and_then(|html| extract_links(&html, &url, TERM_LINKS));
            match links {
                Ok(links) => {
                    debug!(url = %url, terms = links.len(), "Parsed letter page");
                    term_urls.extend(links.into_iter().filter(|l| seen.insert(l.clone())));
                }
                Err(e) => warn!(url = %url, "Skipping letter page: {}", e),
            }
        }
        info!("Found {} term pages", term_urls.len());

        // Level 3: term pages
        let total = term_urls.len();
        let term_pages = fetch_all(self.fetcher, term_urls, self.max_in_flight, |done| {
            on_progress(ScrapeProgress::new(ScrapeStage::TermPages, done, total))
        })
        .await;

        let mut entries = Vec::new();
        for (url, page) in term_pages {
            match page.and_then(|html| parse_term_page(&html)) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => warn!(url = %url, "Skipping term page without title or definition"),
                Err(e) => warn!(url = %url, "Skipping term page: {}", e),
            }
        }

        let entries = dedupe_terms(entries);
        info!("Built vocabulary with {} terms", entries.len());
        Ok(entries)
    }
}
