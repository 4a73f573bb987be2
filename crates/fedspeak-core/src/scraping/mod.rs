//! Web scrapers for the vocabulary corpus and the speech archive.
//!
//! Both scrapers fetch through a [`PageFetcher`] with a bounded number of
//! requests in flight and consume results in discovery order, so identical
//! pages always yield identical output. Individual page failures are logged
//! with `warn!` and skipped.

pub mod fetcher;
pub mod parser;
pub mod speeches;
pub mod vocabulary;

pub use fetcher::{HttpFetcher, PageFetcher};
pub use speeches::{ArchiveLayout, SpeechScraper};
pub use vocabulary::CorpusBuilder;

/// Which crawl level a progress update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStage {
    LetterPages,
    TermPages,
    YearIndexes,
    SpeechPages,
}

impl ScrapeStage {
    pub fn label(&self) -> &'static str {
        match self {
            ScrapeStage::LetterPages => "letter pages",
            ScrapeStage::TermPages => "term pages",
            ScrapeStage::YearIndexes => "year indexes",
            ScrapeStage::SpeechPages => "speech pages",
        }
    }
}

/// Progress of one crawl level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeProgress {
    pub stage: ScrapeStage,
    /// Pages finished (fetched or failed)
    pub completed: usize,
    pub total: usize,
}

impl ScrapeProgress {
    pub fn new(stage: ScrapeStage, completed: usize, total: usize) -> Self {
        Self {
            stage,
            completed,
            total,
        }
    }
}
