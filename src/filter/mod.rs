//! Filter pipeline
//!
//! Filters rewrite HTML before it is handed to the publisher. Every filter
//! is opt-in: it runs only when the run was started with its toggle, and a
//! missing toggle simply skips it.

mod relative_domain;

pub use relative_domain::{RelativeDomainFilter, REWRITE_OPTION};

use crate::RelayError;
use std::collections::BTreeSet;

/// The item a filter is rewriting
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    /// Host of the crawled item, without port
    pub host: &'a str,

    /// Absolute URL of the item
    pub url: &'a str,
}

/// Run-wide filter toggles and arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    toggles: BTreeSet<String>,

    /// Comma-separated extra domains for the relative-domain filter
    pub extra_domains: String,
}

impl RunArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns on the filter with this option name
    pub fn enable(mut self, option_name: &str) -> Self {
        self.toggles.insert(option_name.to_string());
        self
    }

    pub fn with_extra_domains(mut self, extra_domains: impl Into<String>) -> Self {
        self.extra_domains = extra_domains.into();
        self
    }

    pub fn is_enabled(&self, option_name: &str) -> bool {
        self.toggles.contains(option_name)
    }

    /// Extra domains, split on commas and trimmed, empties removed
    pub fn extra_domains(&self) -> Vec<String> {
        self.extra_domains
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A capability that rewrites fetched HTML
pub trait Filter: Send + Sync {
    /// The toggle that enables this filter
    fn option_name(&self) -> &'static str;

    fn apply(
        &self,
        content: &str,
        context: &FilterContext<'_>,
        args: &RunArgs,
    ) -> Result<String, RelayError>;
}

/// Ordered set of filters applied to every HTML item
pub struct FilterRegistry {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Creates the registry with the built-in filters
    pub fn standard() -> Self {
        Self::new().with(RelativeDomainFilter)
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Applies every enabled filter in order
    ///
    /// A failing filter is logged and skipped; the content it was given is
    /// passed on unchanged.
    pub fn run(&self, content: String, context: &FilterContext<'_>, args: &RunArgs) -> String {
        let mut content = content;
        for filter in &self.filters {
            if !args.is_enabled(filter.option_name()) {
                continue;
            }
            match filter.apply(&content, context, args) {
                Ok(rewritten) => content = rewritten,
                Err(e) => {
                    tracing::warn!(
                        "Filter {} failed on {}: {}",
                        filter.option_name(),
                        context.url,
                        e
                    );
                }
            }
        }
        content
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
