use scraper::{ElementRef, Html};

use crate::patterns::PatternRegistry;

/// Listing elements found on one result page.
#[derive(Debug, Clone)]
pub struct Discovery<'a> {
    /// The container selector that matched, if any did.
    pub selector: Option<String>,
    pub elements: Vec<ElementRef<'a>>,
}

impl Discovery<'_> {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Locate listing elements with the first container selector that matches
/// anything. Later selectors are not consulted once one has matched.
pub fn discover_listings<'a>(document: &'a Html, registry: &PatternRegistry) -> Discovery<'a> {
    for container in registry.containers() {
        let elements: Vec<_> = document.select(&container.selector).collect();
        if !elements.is_empty() {
            return Discovery {
                selector: Some(container.source.clone()),
                elements,
            };
        }
    }
    Discovery {
        selector: None,
        elements: Vec::new(),
    }
}
