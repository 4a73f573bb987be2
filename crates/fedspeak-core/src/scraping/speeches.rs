//! Federal Reserve speech archive scraper.
//!
//! The archive has one index page per year linking to individual speech
//! pages. Two page layouts exist: a table-based legacy layout up to 2010 and
//! the current article layout from 2011 onwards.

use super::fetcher::{fetch_all, validate_url, PageFetcher};
use super::parser::{element_text, page_title, resolve_hrefs, selector};
use super::{ScrapeProgress, ScrapeStage};
use crate::config::{SpeechArchiveConfig, LEGACY_LAYOUT_LAST_YEAR};
use crate::dataset::Speech;
use crate::error::ScrapeError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Speaker name in legacy page titles ("FRB: Speech, Greenspan -- ...").
static LEGACY_SPEAKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Speech,\s(.*?)\s--").expect("Invalid speaker pattern"));

/// Speaker recorded when the page does not name one.
pub const UNKNOWN_SPEAKER: &str = "unknown";

/// Page layout of the archive for a given year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveLayout {
    /// Table-based pages (up to 2010)
    Legacy,
    /// `div#article` pages (2011 onwards)
    Modern,
}

impl ArchiveLayout {
    pub fn for_year(year: i32) -> Self {
        if year <= LEGACY_LAYOUT_LAST_YEAR {
            ArchiveLayout::Legacy
        } else {
            ArchiveLayout::Modern
        }
    }

    /// URL of the year's index page under the archive root.
    pub fn index_url(self, base_url: &str, year: i32) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            ArchiveLayout::Legacy => format!("{base}/{year}speech.htm"),
            ArchiveLayout::Modern => format!("{base}/{year}-speeches.htm"),
        }
    }
}

/// Extracts the speech links from a year index page.
pub fn parse_index_page(
    html: &str,
    page_url: &str,
    layout: ArchiveLayout,
) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let base = validate_url(page_url)?;

    match layout {
        ArchiveLayout::Legacy => {
            let links = selector("ul#speechIndex a[href]")?;
            Ok(resolve_hrefs(
                &base,
                document
                    .select(&links)
                    .filter_map(|a| a.value().attr("href")),
            ))
        }
        ArchiveLayout::Modern => {
            // First class-less link of each entry; classed links are
            // video/audio attachments
            let paragraphs = selector("div.row.eventlist p")?;
            let anchors = selector("a[href]")?;
            let hrefs = document.select(&paragraphs).filter_map(|p| {
                p.select(&anchors)
                    .find(|a| a.value().attr("class").is_none())
                    .and_then(|a| a.value().attr("href"))
            });
            Ok(resolve_hrefs(&base, hrefs))
        }
    }
}

/// Derives the speech id and publication date from its URL.
///
/// The id is the last path segment without its extension
/// (`greenspan19961205.htm` → `greenspan19961205`); the date is formed by
/// the digits of that segment read as `YYYYMMDD`.
pub fn speech_id_and_date(url: &str) -> Result<(String, NaiveDate), ScrapeError> {
    let parsed = validate_url(url)?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let stem = segment.split('.').next().unwrap_or("");
    if stem.is_empty() {
        return Err(ScrapeError::InvalidDate(format!("no page name in {}", url)));
    }

    let digits: String = stem.chars().filter(char::is_ascii_digit).collect();
    let date = NaiveDate::parse_from_str(&digits, "%Y%m%d")
        .map_err(|e| ScrapeError::InvalidDate(format!("{} ('{}'): {}", url, digits, e)))?;
    Ok((stem.to_string(), date))
}

/// Parses a speech page.
///
/// # Errors
///
/// Returns [`ScrapeError::InvalidDate`] if the URL carries no date and
/// [`ScrapeError::ParseError`] if the page has no speech body.
pub fn parse_speech_page(
    html: &str,
    url: &str,
    layout: ArchiveLayout,
) -> Result<Speech, ScrapeError> {
    let (id, date) = speech_id_and_date(url)?;
    let document = Html::parse_document(html);

    let (speaker, full_text) = match layout {
        ArchiveLayout::Legacy => {
            let speaker = page_title(&document)?
                .and_then(|title| {
                    LEGACY_SPEAKER
                        .captures(&title)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().trim().to_string())
                })
                .unwrap_or_else(|| UNKNOWN_SPEAKER.to_string());

            let blocks = selector("table[width=\"600\"] p, table[width=\"600\"] li")?;
            let lines: Vec<String> = document
                .select(&blocks)
                .filter_map(|el| {
                    let text = element_text(el);
                    match (text.is_empty(), el.value().name()) {
                        (true, _) => None,
                        (false, "li") => Some(format!("• {text}")),
                        (false, _) => Some(text),
                    }
                })
                .collect();
            (speaker, lines.join("\n"))
        }
        ArchiveLayout::Modern => {
            let article = selector("div#article")?;
            let article = document
                .select(&article)
                .next()
                .ok_or_else(|| ScrapeError::ParseError(format!("no article body in {}", url)))?;

            let speaker_sel = selector("p.speaker")?;
            let speaker = article
                .select(&speaker_sel)
                .next()
                .map(element_text)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_SPEAKER.to_string());

            let paragraphs = selector("p")?;
            let lines: Vec<String> = article
                .select(&paragraphs)
                .filter(|p| p.value().attr("class").is_none() && p.value().attr("id").is_none())
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            (speaker, lines.join("\n"))
        }
    };

    if full_text.trim().is_empty() {
        return Err(ScrapeError::ParseError(format!("empty speech body in {}", url)));
    }

    Ok(Speech {
        id,
        date,
        speaker,
        full_text,
    })
}

/// Scrapes all speeches for the configured year range.
pub struct SpeechScraper<'a> {
    fetcher: &'a dyn PageFetcher,
    config: SpeechArchiveConfig,
    max_in_flight: usize,
}

impl<'a> SpeechScraper<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        config: SpeechArchiveConfig,
        max_in_flight: usize,
    ) -> Self {
        Self {
            fetcher,
            config,
            max_in_flight,
        }
    }

    /// Fetches every year index and every speech page it links to.
    ///
    /// Speeches are returned in archive order (by year, then index order),
    /// deduplicated by id. Unreachable or unparseable pages are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidUrl`] for an empty year range.
    pub async fn scrape<F>(&self, mut on_progress: F) -> Result<Vec<Speech>, ScrapeError>
    where
        F: FnMut(ScrapeProgress),
    {
        let (first, last) = (self.config.first_year, self.config.last_year);
        if first > last {
            return Err(ScrapeError::InvalidUrl(format!(
                "empty year range {}..={}",
                first, last
            )));
        }

        let years: Vec<i32> = (first..=last).collect();
        let index_urls: Vec<String> = years
            .iter()
            .map(|&y| ArchiveLayout::for_year(y).index_url(&self.config.base_url, y))
            .collect();
        let total = index_urls.len();
        let index_pages = fetch_all(self.fetcher, index_urls, self.max_in_flight, |done| {
            on_progress(ScrapeProgress::new(ScrapeStage::YearIndexes, done, total))
        })
        .await;

        let mut speech_urls = Vec::new();
        let mut layouts = Vec::new();
        for (year, (url, page)) in years.into_iter().zip(index_pages) {
            let layout = ArchiveLayout::for_year(year);
            match page.and_then(|html| parse_index_page(&html, &url, layout)) {
                Ok(links) => {
                    debug!(year, speeches = links.len(), "Parsed year index");
                    layouts.extend(std::iter::repeat(layout).take(links.len()));
                    speech_urls.extend(links);
                }
                Err(e) => warn!(year, "Skipping year index: {}", e),
            }
        }
        info!("Found {} speech pages", speech_urls.len());

        let total = speech_urls.len();
        let pages = fetch_all(self.fetcher, speech_urls, self.max_in_flight, |done| {
            on_progress(ScrapeProgress::new(ScrapeStage::SpeechPages, done, total))
        })
        .await;

        let mut seen = HashSet::new();
        let mut speeches = Vec::new();
        for ((url, page), layout) in pages.into_iter().zip(layouts) {
            match page.and_then(|html| parse_speech_page(&html, &url, layout)) {
                Ok(speech) if seen.insert(speech.id.clone()) => speeches.push(speech),
                Ok(speech) => debug!(speech = %speech.id, "Duplicate speech link"),
                Err(e) => warn!(url = %url, "Skipping speech: {}", e),
            }
        }

        info!("Scraped {} speeches", speeches.len());
        Ok(speeches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticFetcher;

    const BASE: &str = "https://fed.test/newsevents/speech/";

    const LEGACY_SPEECH: &str = r#"
        <html><head><title>FRB: Speech, Greenspan -- The Challenge of Central Banking -- December 5, 1996</title></head>
        <body><table width="600"><tr><td>
            <p>Irrational   exuberance has unduly escalated asset values.</p>
            <ul><li>Point one</li><li>Point two</li></ul>
            <p></p>
        </td></tr></table></body></html>
    "#;

    const MODERN_SPEECH: &str = r#"
        <html><body><div id="article">
            <p class="speaker">Chair Jerome H. Powell</p>
            <p class="article__time">March 15, 2020</p>
            <p>The coronavirus outbreak has harmed communities.</p>
            <p id="footnote">1. Footnote text</p>
            <p>The Committee is prepared to use its full range of tools.</p>
        </div></body></html>
    "#;

    #[test]
    fn test_layout_by_year() {
        assert_eq!(ArchiveLayout::for_year(1996), ArchiveLayout::Legacy);
        assert_eq!(ArchiveLayout::for_year(2010), ArchiveLayout::Legacy);
        assert_eq!(ArchiveLayout::for_year(2011), ArchiveLayout::Modern);
        assert_eq!(
            ArchiveLayout::Legacy.index_url(BASE, 1996),
            "https://fed.test/newsevents/speech/1996speech.htm"
        );
        assert_eq!(
            ArchiveLayout::Modern.index_url(BASE, 2020),
            "https://fed.test/newsevents/speech/2020-speeches.htm"
        );
    }

    #[test]
    fn test_speech_id_and_date() {
        let (id, date) =
            speech_id_and_date("https://fed.test/boarddocs/speeches/1996/19961205.htm").unwrap();
        assert_eq!(id, "19961205");
        assert_eq!(date, NaiveDate::from_ymd_opt(1996, 12, 5).unwrap());

        let (id, date) =
            speech_id_and_date("https://fed.test/newsevents/speech/powell20200315a.htm").unwrap();
        assert_eq!(id, "powell20200315a");
        assert_eq!(date, NaiveDate::from_ymd_opt(2020, 3, 15).unwrap());
    }

    #[test]
    fn test_speech_without_date_is_rejected() {
        let result = speech_id_and_date("https://fed.test/newsevents/speech/about.htm");
        assert!(matches!(result, Err(ScrapeError::InvalidDate(_))));
    }

    #[test]
    fn test_parse_legacy_speech() {
        let speech = parse_speech_page(
            LEGACY_SPEECH,
            "https://fed.test/boarddocs/speeches/1996/19961205.htm",
            ArchiveLayout::Legacy,
        )
        .unwrap();

        assert_eq!(speech.speaker, "Greenspan");
        assert_eq!(
            speech.full_text,
            "Irrational exuberance has unduly escalated asset values.\n• Point one\n• Point two"
        );
    }

    #[test]
    fn test_parse_modern_speech() {
        let speech = parse_speech_page(
            MODERN_SPEECH,
            "https://fed.test/newsevents/speech/powell20200315a.htm",
            ArchiveLayout::Modern,
        )
        .unwrap();

        assert_eq!(speech.speaker, "Chair Jerome H. Powell");
        assert_eq!(
            speech.full_text,
            "The coronavirus outbreak has harmed communities.\n\
             The Committee is prepared to use its full range of tools."
        );
    }

    #[test]
    fn test_modern_page_without_article() {
        let result = parse_speech_page(
            "<html><body><p>Moved</p></body></html>",
            "https://fed.test/newsevents/speech/powell20200315a.htm",
            ArchiveLayout::Modern,
        );
        assert!(matches!(result, Err(ScrapeError::ParseError(_))));
    }

    #[test]
    fn test_modern_index_skips_classed_links() {
        let html = r#"
            <div class="row eventlist"><div>
                <p><a href="/newsevents/speech/powell20200315a.htm">Remarks</a>
                   <a class="watchLive" href="/video.htm">Watch</a></p>
                <p><a class="watchLive" href="/video2.htm">Watch</a></p>
                <p><a href="brainard20200401a.htm">Outlook</a></p>
            </div></div>
        "#;
        let links = parse_index_page(html, BASE, ArchiveLayout::Modern).unwrap();
        assert_eq!(
            links,
            vec![
                "https://fed.test/newsevents/speech/powell20200315a.htm",
                "https://fed.test/newsevents/speech/brainard20200401a.htm",
            ]
        );
    }

    #[tokio::test]
    async fn test_scrape_mixes_layouts_and_skips_failures() {
        let legacy_index = r#"<ul id="speechIndex">
            <li><a href="/boarddocs/speeches/2010/20100105.htm">A</a></li>
            <li><a href="/boarddocs/speeches/2010/missing20100110.htm">B</a></li>
        </ul>"#;
        let modern_index = r#"<div class="row eventlist">
            <p><a href="/newsevents/speech/powell20110315a.htm">C</a></p>
            <p><a href="/newsevents/speech/nodate.htm">D</a></p>
        </div>"#;
        let fetcher = StaticFetcher::new([
            ("https://fed.test/newsevents/speech/2010speech.htm", legacy_index),
            ("https://fed.test/newsevents/speech/2011-speeches.htm", modern_index),
            ("https://fed.test/boarddocs/speeches/2010/20100105.htm", LEGACY_SPEECH),
            ("https://fed.test/newsevents/speech/powell20110315a.htm", MODERN_SPEECH),
            ("https://fed.test/newsevents/speech/nodate.htm", MODERN_SPEECH),
        ]);
        let config = SpeechArchiveConfig {
            base_url: BASE.to_string(),
            first_year: 2010,
            last_year: 2012,
        };
        let scraper = SpeechScraper::new(&fetcher, config, 4);

        let speeches = scraper.scrape(|_| {}).await.unwrap();

        let ids: Vec<&str> = speeches.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["20100105", "powell20110315a"]);
        assert_eq!(speeches[0].speaker, "Greenspan");
        assert_eq!(speeches[1].date, NaiveDate::from_ymd_opt(2011, 3, 15).unwrap());
    }

    #[tokio::test]
    async fn test_scrape_rejects_inverted_range() {
        let fetcher = StaticFetcher::new(Vec::<(&str, &str)>::new());
        let config = SpeechArchiveConfig {
            base_url: BASE.to_string(),
            first_year: 2012,
            last_year: 2010,
        };
        assert!(SpeechScraper::new(&fetcher, config, 1)
            .scrape(|_| {})
            .await
            .is_err());
    }
}
