//! Candidate discovery on a news page.
//!
//! The site's markup changes often and its generated class names carry
//! build hashes (`stream-item story-item yf-1drgw5l`), so a single selector
//! fails silently the day it drifts. Candidates are looked up through an
//! ordered table of strategies; the first one that matches anything wins.
//! "Nothing matched" is a normal result, reported as an empty [`Candidates`].

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// A named way to locate news item containers.
pub struct Strategy {
    pub name: &'static str,
    selector: Selector,
}

impl Strategy {
    fn new(name: &'static str, css: &str) -> Self {
        Self {
            name,
            selector: Selector::parse(css).expect("static selector must parse"),
        }
    }
}

/// Tried in order.
pub static STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| {
    vec![
        // <li class="stream-item story-item yf-…">
        Strategy::new("stream-item", "li.stream-item.story-item"),
        // <section data-testid="storyitem" …>
        Strategy::new("storyitem-testid", r#"section[data-testid="storyitem"]"#),
    ]
});

/// Item containers found on a page, plus which strategy found them.
#[derive(Debug)]
pub struct Candidates<'a> {
    pub strategy: Option<&'static str>,
    pub nodes: Vec<ElementRef<'a>>,
}

impl Candidates<'_> {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Item containers in document order, using the first strategy that matches.
///
/// # Arguments
///
/// * `document` - A parsed snapshot of the news page
///
/// # Returns
///
/// The matching nodes and the winning strategy's name. Both are empty when
/// no strategy matched.
pub fn find_candidates(document: &Html) -> Candidates<'_> {
    for strategy in STRATEGIES.iter() {
        let nodes: Vec<_> = document.select(&strategy.selector).collect();
        if !nodes.is_empty() {
            return Candidates {
                strategy: Some(strategy.name),
                nodes,
            };
        }
    }
    Candidates {
        strategy: None,
        nodes: Vec::new(),
    }
}

/// True when a visible text node contains `marker`. Script and style
/// bodies are ignored, so a marker string embedded in page JavaScript does
/// not count. An empty marker never matches.
pub fn has_text_marker(document: &Html, marker: &str) -> bool {
    !marker.is_empty()
        && document
            .root_element()
            .descendants()
            .filter_map(|node| node.value().as_text().map(|t| (node, t)))
            .filter(|(node, _)| {
                !node
                    .parent()
                    .and_then(|p| p.value().as_element())
                    .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"))
            })
            .any(|(_, t)| t.contains(marker))
}
