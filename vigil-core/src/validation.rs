//! Domain extraction and validation helpers

use crate::error::{Result, VigilError};

/// Extract the bare registrable name from a URL or domain string.
///
/// Strips the scheme, a leading `www.`, any path, query, fragment and port,
/// then lower-cases what remains. No validation is performed; use
/// [`is_valid_domain`] or [`normalize_domain`] for that.
pub fn extract_domain(input: &str) -> String {
    let lower = input.trim().to_lowercase();

    let without_scheme = match lower.find("://") {
        Some(pos) => &lower[pos + 3..],
        None => lower.as_str(),
    };

    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);

    let host = without_www
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_www);

    // Credentials in the authority part never belong to the host.
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);

    host.to_string()
}

/// Check that a string (URL or domain) yields a plausible domain name:
/// dot-separated labels of ASCII alphanumerics and inner hyphens, ending in
/// an alphabetic TLD of at least two characters or a punycode (`xn--`) TLD.
pub fn is_valid_domain(input: &str) -> bool {
    let domain = extract_domain(input);
    if domain.is_empty() || domain.len() > 253 || !domain.contains('.') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let valid_labels = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });

    let tld_ok = labels.last().is_some_and(|tld| tld_is_valid(tld));

    valid_labels && tld_ok
}

fn tld_is_valid(tld: &str) -> bool {
    match tld.strip_prefix("xn--") {
        Some(rest) => {
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()),
    }
}

/// Extract and validate a domain in one step.
pub fn normalize_domain(input: &str) -> Result<String> {
    let domain = extract_domain(input);
    if is_valid_domain(&domain) {
        Ok(domain)
    } else {
        Err(VigilError::InvalidDomain(domain))
    }
}

/// Top-level suffix of a domain (`"ru"` for `"example.ru"`).
pub fn tld_of(domain: &str) -> Option<&str> {
    domain.rsplit('.').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain_strips_everything() {
        assert_eq!(
            extract_domain("https://www.Example.com:8443/path?x=1"),
            "example.com"
        );
        assert_eq!(extract_domain("http://example.com/"), "example.com");
        assert_eq!(extract_domain("  WWW.EXAMPLE.COM  "), "example.com");
        assert_eq!(extract_domain("example.com?ref=1"), "example.com");
        assert_eq!(extract_domain("HTTPS://shop.example.org#top"), "shop.example.org");
        assert_eq!(extract_domain("example.com:80"), "example.com");
    }

    #[test]
    fn test_is_valid_domain() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("https://sub.example.co.uk/path"));
        assert!(is_valid_domain("my-site.ru"));

        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("localhost"));
        assert!(!is_valid_domain("example..com"));
        assert!(!is_valid_domain("-example.com"));
        assert!(!is_valid_domain("example-.com"));
        assert!(!is_valid_domain("192.168.1.1"));
        assert!(!is_valid_domain("exa_mple.com"));
    }

    #[test]
    fn test_punycode_tld_accepted() {
        assert!(is_valid_domain("xn--d1acufc.xn--p1ai"));
        assert!(is_valid_domain("https://www.xn--80ak6aa92e.com/"));
        assert_eq!(
            normalize_domain("https://XN--D1ACUFC.XN--P1AI/").unwrap(),
            "xn--d1acufc.xn--p1ai"
        );
        assert!(!is_valid_domain("example.xn--"));
        assert!(!is_valid_domain("example.c0m"));
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("https://www.example.com/a").unwrap(), "example.com");
        assert!(matches!(
            normalize_domain("not a domain"),
            Err(VigilError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_tld_of() {
        assert_eq!(tld_of("example.ru"), Some("ru"));
        assert_eq!(tld_of("example.co.uk"), Some("uk"));
        assert_eq!(tld_of(""), None);
    }
}
