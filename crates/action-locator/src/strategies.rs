//! Element resolution strategies
//!
//! Two strategies in fallback order:
//! 1. Selector - ordered structural selectors, first interactive match
//! 2. Keyword - clickable elements whose visible text names a purchase verb

use async_trait::async_trait;
use cdp_adapter::{normalize_text, ElementSnapshot, HostDocument, HostError, SelectorList};
use tracing::trace;

use crate::errors::LocatorError;
use crate::interactivity::is_interactive;

/// Read-only lookup of one candidate in a document.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn locate(&self, host: &dyn HostDocument) -> Result<Option<ElementSnapshot>, HostError>;

    fn name(&self) -> &'static str;
}

/// Probes selectors in order; the first selector yielding an interactive
/// element wins.
pub struct SelectorStrategy {
    selectors: Vec<String>,
}

impl SelectorStrategy {
    pub fn new(selectors: Vec<String>) -> Result<Self, LocatorError> {
        for selector in &selectors {
            SelectorList::parse(selector)?;
        }
        Ok(Self { selectors })
    }
}

#[async_trait]
impl Strategy for SelectorStrategy {
    async fn locate(&self, host: &dyn HostDocument) -> Result<Option<ElementSnapshot>, HostError> {
        for selector in &self.selectors {
            let matches = host.query_all(selector).await?;
            if matches.is_empty() {
                continue;
            }
            if let Some(hit) = matches.into_iter().find(is_interactive) {
                trace!(%selector, element = %hit.id, "selector hit");
                return Ok(Some(hit));
            }
            trace!(%selector, "selector matched only inert elements");
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "selector"
    }
}

/// Scans every clickable element for one of the keywords.
pub struct KeywordStrategy {
    clickable_selector: String,
    keywords: Vec<String>,
}

impl KeywordStrategy {
    pub fn new(clickable_selector: String, keywords: Vec<String>) -> Result<Self, LocatorError> {
        SelectorList::parse(&clickable_selector)?;
        let keywords = keywords
            .iter()
            .map(|keyword| normalize_text(keyword))
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Ok(Self {
            clickable_selector,
            keywords,
        })
    }

    fn mentions_keyword(&self, element: &ElementSnapshot) -> bool {
        let text = element.normalized_text();
        self.keywords.iter().any(|keyword| text.contains(keyword))
    }
}

#[async_trait]
impl Strategy for KeywordStrategy {
    async fn locate(&self, host: &dyn HostDocument) -> Result<Option<ElementSnapshot>, HostError> {
        if self.keywords.is_empty() {
            return Ok(None);
        }
        let candidates = host.query_all(&self.clickable_selector).await?;
        Ok(candidates
            .into_iter()
            .find(|element| is_interactive(element) && self.mentions_keyword(element)))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
