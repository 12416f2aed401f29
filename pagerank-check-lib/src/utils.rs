//! Utility functions for preparing domain lists.
//!
//! This module contains helpers for reading domain lists and reducing raw
//! input to the ordered, duplicate-free set a batch dispatches from.

use crate::error::PageRankError;
use std::collections::HashSet;
use std::path::Path;

/// Trim entries, drop blanks, and remove duplicates keeping first-seen order.
///
/// # Example
///
/// ```rust
/// use pagerank_check_lib::dedup_domains;
///
/// let domains = dedup_domains(["amazon.co.uk", " amazon.co.uk", "wikipedia.org"]);
/// assert_eq!(domains, vec!["amazon.co.uk", "wikipedia.org"]);
/// ```
pub fn dedup_domains<I, S>(domains: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for domain in domains {
        let trimmed = domain.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            results.push(trimmed.to_string());
        }
    }

    results
}

/// Parse a domain list: one entry per line, `#` starts a comment.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let entry = line.split('#').next().unwrap_or("").trim();
            if entry.is_empty() {
                None
            } else {
                Some(entry.to_string())
            }
        })
        .collect()
}

/// Read a domain list file.
///
/// # Errors
///
/// Returns `PageRankError::FileError` if the file cannot be read or contains
/// no entries.
pub fn load_domains_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, PageRankError> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path).map_err(|e| {
        PageRankError::file_error(
            path.to_string_lossy(),
            format!("Failed to read domain list: {}", e),
        )
    })?;

    let domains = parse_domain_list(&content);
    if domains.is_empty() {
        return Err(PageRankError::file_error(
            path.to_string_lossy(),
            "No domains found in the file",
        ));
    }

    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let result = dedup_domains(vec![
            "wikipedia.org",
            "amazon.co.uk",
            "wikipedia.org",
            "",
            "  ",
            "amazon.co.uk ",
        ]);
        assert_eq!(result, vec!["wikipedia.org", "amazon.co.uk"]);
    }

    #[test]
    fn test_parse_domain_list_skips_comments() {
        let content = "# seed list\namazon.co.uk\n\nwikipedia.org # inline\n   \n#example.com\n";
        assert_eq!(
            parse_domain_list(content),
            vec!["amazon.co.uk", "wikipedia.org"]
        );
    }

    #[test]
    fn test_load_domains_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "amazon.co.uk").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "bbc.co.uk").unwrap();
        file.flush().unwrap();

        let domains = load_domains_from_file(file.path()).unwrap();
        assert_eq!(domains, vec!["amazon.co.uk", "bbc.co.uk"]);
    }

    #[test]
    fn test_load_domains_from_empty_file_fails() {
        let file = NamedTempFile::new().unwrap();
        let result = load_domains_from_file(file.path());
        assert!(matches!(result, Err(PageRankError::FileError { .. })));
    }

    #[test]
    fn test_load_domains_missing_file_fails() {
        let result = load_domains_from_file("/definitely/not/here.txt");
        assert!(result.is_err());
    }
}
