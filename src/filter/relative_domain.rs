use crate::filter::{Filter, FilterContext, RunArgs};
use crate::url::www_counterpart;
use crate::RelayError;
use regex::{Captures, Regex};

/// Rewrites absolute links to the crawled site as root-relative paths
///
/// `https://example.com:8080/about` becomes `/about`. The crawled host, its
/// `www.` counterpart and any configured extra domains are rewritten; every
/// occurrence is replaced and host matching is case-insensitive.
pub struct RelativeDomainFilter;

pub const REWRITE_OPTION: &str = "rewrite";

/// Reduces a configured domain to a bare host
fn bare_domain(domain: &str) -> &str {
    let domain = domain.trim();
    let domain = domain
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(domain);
    domain.trim_end_matches('/')
}

impl RelativeDomainFilter {
    fn pattern(context: &FilterContext<'_>, args: &RunArgs) -> Result<Regex, RelayError> {
        let mut domains = vec![context.host.to_string(), www_counterpart(context.host)];
        domains.extend(
            args.extra_domains()
                .iter()
                .map(|d| bare_domain(d).to_string())
                .filter(|d| !d.is_empty()),
        );

        let alternatives = domains
            .iter()
            .map(|d| regex::escape(d))
            .collect::<Vec<_>>()
            .join("|");

        // The host must end at a path, query, fragment or delimiter, so neither
        // `example.com.evil.org` nor `example.com@evil.org` matches
        let pattern = format!(
            r#"(?i)https?://(?:{})(?::\d+)?(/|[?#"'\s<>)&,;]|$)"#,
            alternatives
        );
        Ok(Regex::new(&pattern)?)
    }
}

impl Filter for RelativeDomainFilter {
    fn option_name(&self) -> &'static str {
        REWRITE_OPTION
    }

    fn apply(
        &self,
        content: &str,
        context: &FilterContext<'_>,
        args: &RunArgs,
    ) -> Result<String, RelayError> {
        let pattern = Self::pattern(context, args)?;
        let rewritten = pattern.replace_all(content, |caps: &Captures<'_>| {
            match caps.get(1).map(|m| m.as_str()) {
                Some("/") | Some("") | None => "/".to_string(),
                Some(next) => format!("/{}", next),
            }
        });
        Ok(rewritten.into_owned())
    }
}
