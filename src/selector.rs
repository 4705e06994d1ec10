//! Ordered selector fallback chains
//!
//! Every heuristic lookup in the crate goes through one primitive: walk an
//! ordered list of CSS selectors and stop at the first one that matches
//! anything inside the given scope. Matches from different selectors are
//! never merged.

use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use crate::error::{Error, Result};

/// An ordered, immutable list of selectors for one semantic role.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    role: &'static str,
    entries: Vec<(String, Selector)>,
}

impl SelectorChain {
    /// Compile a chain, rejecting any pattern that is not valid CSS.
    pub fn new<S: AsRef<str>>(role: &'static str, patterns: &[S]) -> Result<Self> {
        let entries = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Selector::parse(pattern)
                    .map(|selector| (pattern.to_string(), selector))
                    .map_err(|e| {
                        Error::InvalidArgument(format!(
                            "invalid {role} selector '{pattern}': {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { role, entries })
    }

    /// Compile one of the built-in catalogues.
    pub(crate) fn builtin(role: &'static str, patterns: &[&str]) -> Self {
        Self::new(role, patterns).expect("built-in selector catalogue must be valid CSS")
    }

    /// Semantic role this chain resolves (title, price, ...)
    pub fn role(&self) -> &'static str {
        self.role
    }

    /// Pattern strings in evaluation order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(pattern, _)| pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First element, in document order, matched by the earliest pattern
    /// that matches anything among the descendants of `scope`.
    ///
    /// A matched element with empty text still ends the search.
    pub fn first_match<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.entries.iter().find_map(|(pattern, selector)| {
            let found = scope.select(selector).next();
            if found.is_some() {
                trace!(role = self.role, pattern = %pattern, "selector matched");
            }
            found
        })
    }

    /// Every element matched by the earliest pattern that matches anything
    /// in the document, together with that pattern.
    pub fn first_match_set<'a>(&self, document: &'a Html) -> Option<(&str, Vec<ElementRef<'a>>)> {
        self.first_match_set_in(document.root_element())
    }

    /// Scoped variant of [`first_match_set`](Self::first_match_set).
    pub fn first_match_set_in<'a>(
        &self,
        scope: ElementRef<'a>,
    ) -> Option<(&str, Vec<ElementRef<'a>>)> {
        self.entries.iter().find_map(|(pattern, selector)| {
            let matches: Vec<ElementRef<'a>> = scope.select(selector).collect();
            (!matches.is_empty()).then_some((pattern.as_str(), matches))
        })
    }
}
