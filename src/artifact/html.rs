//! Heuristic structural extraction from raw HTML.
//!
//! This is a tag scanner, not a DOM parser: it finds forms, navigation,
//! buttons, tables, headings and links well enough to template test cases and
//! run presence checks when no LLM is available.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::domain::{ComponentKind, UiComponent};

/// Links beyond this many are not listed individually
const MAX_LINKS: usize = 20;

static FORM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>").unwrap());
static NAV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<nav\b[^>]*>(.*?)</nav>").unwrap());
static BUTTON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<button\b[^>]*>(.*?)</button>").unwrap());
static INPUT_BUTTON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<input\b[^>]*type\s*=\s*["']?(?:submit|button)["']?[^>]*>"#).unwrap());
static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").unwrap());
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<h([1-3])\b[^>]*>(.*?)</h[1-3]>").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<a\b[^>]*href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#).unwrap());
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b([a-z][a-z0-9_:-]*)\s*=\s*["']([^"']*)["']"#).unwrap());
static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<([a-z][a-z0-9-]*)\b").unwrap());
static INPUT_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<input\b").unwrap());
static ANCHOR_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<a\b").unwrap());
static ROW_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<tr\b").unwrap());
static ANY_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h[1-6]\b").unwrap());
static BUTTON_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<button\b").unwrap());

fn attr(tag_attrs: &str, name: &str) -> Option<String> {
    ATTR_RE
        .captures_iter(tag_attrs)
        .find(|c| c[1].eq_ignore_ascii_case(name))
        .map(|c| c[2].to_string())
}

fn count(haystack: &str, re: &Regex) -> usize {
    re.find_iter(haystack).count()
}

/// Remove tags and collapse whitespace
pub fn strip_tags(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, " ");
    WS_RE.replace_all(&text, " ").trim().to_string()
}

/// Contents of `<title>`, if any
pub fn page_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .map(|c| strip_tags(&c[1]))
        .filter(|t| !t.is_empty())
}

/// Scan a page for the structural elements test cases are built from
pub fn extract_components(html: &str) -> Vec<UiComponent> {
    let mut components = Vec::new();

    for caps in HEADING_RE.captures_iter(html) {
        let label = strip_tags(&caps[2]);
        if !label.is_empty() {
            components.push(UiComponent {
                kind: ComponentKind::Heading,
                label: format!("h{}: {}", &caps[1], label),
                count: 1,
            });
        }
    }

    for caps in FORM_RE.captures_iter(html) {
        let attrs = &caps[1];
        let action = attr(attrs, "action").unwrap_or_default();
        let method = attr(attrs, "method").unwrap_or_else(|| "get".to_string());
        components.push(UiComponent {
            kind: ComponentKind::Form,
            label: format!("{} {}", method.to_ascii_uppercase(), action).trim().to_string(),
            count: count(&caps[2], &INPUT_OPEN_RE),
        });
    }

    for caps in NAV_RE.captures_iter(html) {
        components.push(UiComponent {
            kind: ComponentKind::Navigation,
            label: "navigation".to_string(),
            count: count(&caps[1], &ANCHOR_OPEN_RE),
        });
    }

    for caps in BUTTON_RE.captures_iter(html) {
        components.push(UiComponent {
            kind: ComponentKind::Button,
            label: strip_tags(&caps[1]),
            count: 1,
        });
    }
    for m in INPUT_BUTTON_RE.find_iter(html) {
        components.push(UiComponent {
            kind: ComponentKind::Button,
            label: attr(m.as_str(), "value").unwrap_or_default(),
            count: 1,
        });
    }

    for caps in TABLE_RE.captures_iter(html) {
        components.push(UiComponent {
            kind: ComponentKind::Table,
            label: "table".to_string(),
            count: count(&caps[1], &ROW_OPEN_RE),
        });
    }

    for caps in LINK_RE.captures_iter(html).take(MAX_LINKS) {
        let text = strip_tags(&caps[2]);
        components.push(UiComponent {
            kind: ComponentKind::Link,
            label: if text.is_empty() { caps[1].to_string() } else { text },
            count: 1,
        });
    }

    components
}

/// Whether an element identified by `key` occurs in the page.
///
/// Keys are lower-case tag names, plus `heading` (any h1-h6) and `button`
/// (a `<button>` or a submit/button `<input>`).
pub fn has_element(html: &str, key: &str) -> bool {
    match key {
        "heading" => ANY_HEADING_RE.is_match(html),
        "button" => BUTTON_OPEN_RE.is_match(html) || INPUT_BUTTON_RE.is_match(html),
        tag => OPEN_TAG_RE
            .captures_iter(html)
            .any(|c| c[1].eq_ignore_ascii_case(tag)),
    }
}

/// Hex SHA-256 of the page body
pub fn content_digest(html: &str) -> String {
    hex::encode(Sha256::digest(html.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Shop | Home</title></head>
<body>
  <nav><a href="/">Home</a><a href="/cart">Cart</a></nav>
  <h1>Welcome</h1>
  <h2>Featured <em>items</em></h2>
  <form action="/login" method="post">
    <input name="user"><input name="pass" type="password">
    <input type="submit" value="Sign in">
  </form>
  <button>Subscribe</button>
  <table><tr><th>Item</th></tr><tr><td>Mug</td></tr></table>
</body></html>"#;

    fn of_kind(components: &[UiComponent], kind: ComponentKind) -> Vec<&UiComponent> {
        components.iter().filter(|c| c.kind == kind).collect()
    }

    #[test]
    fn test_page_title() {
        assert_eq!(page_title(PAGE), Some("Shop | Home".to_string()));
        assert_eq!(page_title("<html></html>"), None);
    }

    #[test]
    fn test_extract_forms() {
        let components = extract_components(PAGE);
        let forms = of_kind(&components, ComponentKind::Form);
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].label, "POST /login");
        assert_eq!(forms[0].count, 3);
    }

    #[test]
    fn test_extract_headings_strip_markup() {
        let components = extract_components(PAGE);
        let headings = of_kind(&components, ComponentKind::Heading);
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].label, "h1: Welcome");
        assert_eq!(headings[1].label, "h2: Featured items");
    }

    #[test]
    fn test_extract_nav_buttons_tables_links() {
        let components = extract_components(PAGE);
        assert_eq!(of_kind(&components, ComponentKind::Navigation)[0].count, 2);
        let buttons = of_kind(&components, ComponentKind::Button);
        let labels: Vec<_> = buttons.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Subscribe", "Sign in"]);
        assert_eq!(of_kind(&components, ComponentKind::Table)[0].count, 2);
        assert_eq!(of_kind(&components, ComponentKind::Link).len(), 2);
    }

    #[test]
    fn test_extract_from_empty_page() {
        assert!(extract_components("").is_empty());
    }

    #[test]
    fn test_has_element() {
        assert!(has_element(PAGE, "form"));
        assert!(has_element(PAGE, "heading"));
        assert!(has_element(PAGE, "nav"));
        assert!(has_element("<input type='submit'>", "button"));
        assert!(!has_element(PAGE, "video"));
        // Prefix of another tag must not match
        assert!(!has_element("<navigation>", "nav"));
        assert!(has_element("<NAV class='top'>", "nav"));
        assert!(has_element("<my-widget></my-widget>", "my-widget"));
        assert!(!has_element("<p>no headings</p>", "heading"));
    }

    #[test]
    fn test_attr_matches_whole_names() {
        let attrs = r#" data-action="/track" ACTION='/login' method="post""#;
        assert_eq!(attr(attrs, "action").as_deref(), Some("/login"));
        assert_eq!(attr(attrs, "method").as_deref(), Some("post"));
        assert_eq!(attr(attrs, "value"), None);
    }

    #[test]
    fn test_content_digest_is_stable() {
        assert_eq!(content_digest("abc"), content_digest("abc"));
        assert_ne!(content_digest("abc"), content_digest("abd"));
        assert_eq!(content_digest("").len(), 64);
    }
}
