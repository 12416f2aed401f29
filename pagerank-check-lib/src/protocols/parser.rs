//! Results page parsing.
//!
//! The scores live as plain text inside `#html-2-pdfwrapper`. After trimming
//! and dropping tabs, the block reads:
//!
//! ```text
//! <heading>
//! <queried domain>
//! Last Checked: <date>
//! <Metric Name>: <value>
//! ...
//! <footer>
//! ```

use crate::error::PageRankError;
use crate::types::MetricsRecord;
use scraper::{Html, Selector};
use tracing::debug;

lazy_static::lazy_static! {
    static ref RESULTS_SELECTOR: Selector =
        Selector::parse("#html-2-pdfwrapper").expect("results selector is valid");
}

/// Lines of page chrome before the first result line.
const HEADER_LINES: usize = 2;

/// Lines of page chrome after the last result line.
const FOOTER_LINES: usize = 1;

/// Top-level fields of a serialized [`MetricsRecord`]; metrics may not reuse them.
const RESERVED_KEYS: &[&str] = &["domain", "last_checked", "retrieved_at"];

/// Parse a checkpagerank.net results page into a [`MetricsRecord`].
///
/// # Errors
///
/// - `NoResults` when the results block is missing or empty (the service
///   serves such a page when requests come in faster than every 30s)
/// - `ParseError` when the "Last Checked" line is malformed
pub fn parse_scores(domain: &str, html: &str) -> Result<MetricsRecord, PageRankError> {
    let document = Html::parse_document(html);
    let container = document
        .select(&RESULTS_SELECTOR)
        .next()
        .ok_or_else(|| PageRankError::no_results(domain))?;

    let text = container.text().collect::<String>().replace('\t', "");
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() <= HEADER_LINES + FOOTER_LINES {
        return Err(PageRankError::no_results(domain));
    }
    let results = &lines[HEADER_LINES..lines.len() - FOOTER_LINES];

    let last_checked = results[0]
        .split_once(": ")
        .map(|(_, value)| value.trim())
        .ok_or_else(|| {
            PageRankError::parse(format!(
                "Expected 'Last Checked: <date>' for '{}', found '{}'",
                domain, results[0]
            ))
        })?;

    let mut record = MetricsRecord::new(domain, last_checked);
    for field in &results[1..] {
        match field.split_once(": ") {
            Some((key, value)) => {
                let key = normalize_metric_key(key);
                if RESERVED_KEYS.contains(&key.as_str()) {
                    debug!(domain, key = %key, "skipping line that shadows a record field");
                    continue;
                }
                record.metrics.insert(key, value.trim().to_string());
            }
            None => debug!(domain, line = %field, "skipping unrecognized result line"),
        }
    }

    Ok(record)
}

/// "Domain Authority" -> "domain_authority"
pub fn normalize_metric_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Check Page Rank</title></head><body>
<div id="html-2-pdfwrapper">
<h2>Website Rank Checker Results</h2>
<p>amazon.co.uk</p>
<p>Last Checked: 2024-03-01</p>
<p>Domain Authority: 96</p>
<p>Page Authority: 78</p>
<p>Trust Flow: 88</p>
<p>Alexa Global Rank: 1,234</p>
<p>Generated by checkpagerank.net</p>
</div>
</body></html>"#;

    #[test]
    fn test_parse_scores_extracts_metrics() {
        let record = parse_scores("amazon.co.uk", RESULTS_PAGE).unwrap();

        assert_eq!(record.domain, "amazon.co.uk");
        assert_eq!(record.last_checked, "2024-03-01");
        assert_eq!(record.metric("domain_authority"), Some("96"));
        assert_eq!(record.metric("page_authority"), Some("78"));
        assert_eq!(record.metric("trust_flow"), Some("88"));
        assert_eq!(record.metric("alexa_global_rank"), Some("1,234"));
        assert_eq!(record.metrics.len(), 4);
    }

    #[test]
    fn test_parse_scores_ignores_tabs_and_indentation() {
        let html = "<div id=\"html-2-pdfwrapper\">\n\t\t<h2>Results</h2>\n\t<p>bbc.co.uk</p>\n\t<p>Last Checked:\t 2024-02-02</p>\n\t<p>Page Rank: 8</p>\n\t<p>footer</p>\n</div>";
        let record = parse_scores("bbc.co.uk", html).unwrap();

        assert_eq!(record.last_checked, "2024-02-02");
        assert_eq!(record.metric("page_rank"), Some("8"));
    }

    #[test]
    fn test_missing_results_block_is_no_results() {
        let html = "<html><body><p>Please wait 30 seconds</p></body></html>";
        let err = parse_scores("example.com", html).unwrap_err();
        assert!(matches!(err, PageRankError::NoResults { .. }));
    }

    #[test]
    fn test_empty_results_block_is_no_results() {
        let html = "<div id=\"html-2-pdfwrapper\"><h2>Results</h2><p>example.com</p></div>";
        let html = html.replace("</h2>", "</h2>\n").replace("</p>", "</p>\n");
        let err = parse_scores("example.com", &html).unwrap_err();
        assert!(matches!(err, PageRankError::NoResults { .. }));
    }

    #[test]
    fn test_malformed_last_checked_is_parse_error() {
        let html = "<div id=\"html-2-pdfwrapper\">\n<h2>Results</h2>\n<p>example.com</p>\n<p>never</p>\n<p>footer</p>\n</div>";
        let err = parse_scores("example.com", html).unwrap_err();
        assert!(matches!(err, PageRankError::ParseError { .. }));
    }

    #[test]
    fn test_reserved_keys_do_not_shadow_record_fields() {
        let html = RESULTS_PAGE.replace(
            "<p>Trust Flow: 88</p>",
            "<p>Domain: AMAZON.CO.UK</p>\n<p>Trust Flow: 88</p>\n<p>Retrieved At: yesterday</p>",
        );
        let record = parse_scores("amazon.co.uk", &html).unwrap();

        assert_eq!(record.domain, "amazon.co.uk");
        assert_eq!(record.metric("domain"), None);
        assert_eq!(record.metric("retrieved_at"), None);
        assert_eq!(record.metrics.len(), 4);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json.matches("\"domain\"").count(), 1);
        let back: MetricsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_normalize_metric_key() {
        assert_eq!(normalize_metric_key("Domain Authority"), "domain_authority");
        assert_eq!(normalize_metric_key(" Spam Score "), "spam_score");
    }
}
