//! The host document seam consumed by the locator and the executor.

use async_trait::async_trait;
use dropclick_core_types::ElementId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::errors::HostError;

/// Point-in-time description of one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: ElementId,
    /// Lowercase tag name.
    pub tag: String,
    /// Raw text content, descendants included.
    pub text: String,
    pub classes: Vec<String>,
    pub role: Option<String>,
    /// `disabled` property or `aria-disabled="true"`.
    pub disabled: bool,
    /// Still part of the live tree.
    pub attached: bool,
    /// Has a layout box: non-zero size and no `display:none` on the ancestor chain.
    pub rendered: bool,
    /// Computed `visibility:hidden`.
    pub hidden: bool,
}

impl ElementSnapshot {
    /// Lowercased text with runs of whitespace collapsed to one space.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Change notifications published by a host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    /// Subtree insertion/removal or a change of `disabled`, `class` or `style`.
    Mutated,
    /// The document was replaced (navigation, reload, history traversal).
    Navigated { url: String },
}

/// Live page the agent senses and acts on.
///
/// Only the executor and the success detector call the mutating operations
/// (`click`, `reload`, `history_back`); everything else is read-only.
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// Every element matching a CSS selector list, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, HostError>;

    /// Fresh snapshot of a previously returned element, `None` once detached.
    async fn inspect(&self, id: &ElementId) -> Result<Option<ElementSnapshot>, HostError>;

    async fn page_text(&self) -> Result<String, HostError>;

    async fn current_url(&self) -> Result<String, HostError>;

    async fn click(&self, id: &ElementId) -> Result<(), HostError>;

    async fn reload(&self) -> Result<(), HostError>;

    async fn history_back(&self) -> Result<(), HostError>;

    fn subscribe(&self) -> broadcast::Receiver<DomEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_and_case() {
        assert_eq!(normalize_text("  В\n  КОРЗИНУ \t"), "в корзину");
    }
}
