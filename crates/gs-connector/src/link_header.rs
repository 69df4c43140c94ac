//! RFC 8288 `Link` header parsing
//!
//! Only the target URI and the `rel` parameter are kept. Entries that don't
//! match `<uri>; param="value"` are skipped.

use std::sync::OnceLock;

use regex::Regex;

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<([^>]*)>((?:\s*;\s*(?:[^;,"]|"[^"]*")+)*)"#).expect("link pattern is valid")
    })
}

fn param_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#";\s*([A-Za-z0-9_*-]+)\s*=\s*(?:"([^"]*)"|([^\s;]+))"#)
            .expect("link parameter pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub uri: String,
    pub rel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    links: Vec<Link>,
}

impl Links {
    pub fn parse(header: &str) -> Self {
        let links = link_pattern()
            .captures_iter(header)
            .map(|caps| {
                let uri = caps[1].trim().to_string();
                let params = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                let rel = param_pattern()
                    .captures_iter(params)
                    .find(|p| p[1].eq_ignore_ascii_case("rel"))
                    .and_then(|p| p.get(2).or_else(|| p.get(3)))
                    .map(|v| v.as_str().to_string());
                Link { uri, rel }
            })
            .collect();

        Self { links }
    }

    /// Parse every `Link` header value of a response.
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let links = headers
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| Self::parse(v).links)
            .collect();

        Self { links }
    }

    /// First link whose relation list contains `rel`.
    pub fn find_rel(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| {
            l.rel
                .as_deref()
                .map(|r| r.split_whitespace().any(|r| r.eq_ignore_ascii_case(rel)))
                .unwrap_or(false)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiple_links() {
        let header = r#"<https://acme.okta.com/api/v1/users?limit=2>; rel="self", <https://acme.okta.com/api/v1/users?after=00u2&limit=2>; rel="next""#;
        let links = Links::parse(header);

        assert_eq!(links.len(), 2);
        assert_eq!(
            links.find_rel("next").map(|l| l.uri.as_str()),
            Some("https://acme.okta.com/api/v1/users?after=00u2&limit=2")
        );
        assert_eq!(
            links.find_rel("self").map(|l| l.uri.as_str()),
            Some("https://acme.okta.com/api/v1/users?limit=2")
        );
    }

    #[test]
    fn test_parse_extra_params_and_unquoted_rel() {
        let links = Links::parse(r#"<https://api.example.com/items?page=3>; title="Page 3"; rel=next"#);
        assert_eq!(links.find_rel("next").unwrap().uri, "https://api.example.com/items?page=3");
    }

    #[test]
    fn test_quoted_params_with_separators() {
        let header = r#"<https://api.example.com/items?page=2>; title="a, b; c"; rel="next", <https://api.example.com/items?page=1>; rel="prev""#;
        let links = Links::parse(header);

        assert_eq!(links.len(), 2);
        assert_eq!(links.find_rel("next").unwrap().uri, "https://api.example.com/items?page=2");
        assert_eq!(links.find_rel("prev").unwrap().uri, "https://api.example.com/items?page=1");
    }

    #[test]
    fn test_space_separated_relations() {
        let links = Links::parse(r#"<https://api.example.com/items?page=9>; rel="last next""#);
        assert!(links.find_rel("next").is_some());
        assert!(links.find_rel("last").is_some());
        assert!(links.find_rel("prev").is_none());
    }

    #[test]
    fn test_empty_and_garbage_headers() {
        assert!(Links::parse("").is_empty());
        assert!(Links::parse("not a link header").is_empty());
    }

    #[test]
    fn test_link_without_rel() {
        let links = Links::parse("<https://api.example.com/a>");
        assert_eq!(links.len(), 1);
        assert!(links.iter().next().unwrap().rel.is_none());
        assert!(links.find_rel("next").is_none());
    }
}
