//! Structural scanning of composed documents.
//!
//! This is not an HTML parser. It locates the handful of elements the sandbox
//! needs (scripts, title, body) the same way a browser tokenizer would treat
//! raw-text elements: a `<script>` body runs until the first `</script>`, and
//! nothing inside a comment or a `<style>` block starts a script.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").expect("valid script pattern")
});
// Comments and style blocks are matched alongside scripts so whichever opens
// first owns the text up to its own terminator.
static EXECUTABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<!--.*?(?:-->|\z)|<style\b[^>]*>.*?(?:</style\s*>|\z)|<script\b([^>]*)>(.*?)</script\s*>",
    )
    .expect("valid executable pattern")
});
static TYPE_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|\s)type\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid type attribute pattern")
});
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid title pattern"));
static BODY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body\s*>").expect("valid body pattern"));

const JAVASCRIPT_TYPES: &[&str] = &[
    "module",
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
    "application/x-ecmascript",
    "text/x-ecmascript",
    "text/jscript",
    "text/livescript",
    "text/javascript1.0",
    "text/javascript1.1",
    "text/javascript1.2",
    "text/javascript1.3",
    "text/javascript1.4",
    "text/javascript1.5",
];

/// Bodies of the script elements a browser would execute, in document order.
pub fn scripts(document: &str) -> Vec<String> {
    EXECUTABLE_RE
        .captures_iter(document)
        .filter_map(|caps| {
            let body = caps.get(2)?;
            let attributes = caps.get(1).map_or("", |attrs| attrs.as_str());
            is_javascript(attributes).then(|| body.as_str().to_string())
        })
        .collect()
}

/// A script with no `type`, an empty one, or a JavaScript MIME type runs.
fn is_javascript(attributes: &str) -> bool {
    let Some(caps) = TYPE_ATTR_RE.captures(attributes) else {
        return true;
    };
    let kind = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |value| value.as_str())
        .trim()
        .to_ascii_lowercase();
    kind.is_empty() || JAVASCRIPT_TYPES.contains(&kind.as_str())
}

/// Text of the first `<title>` element.
pub fn title(document: &str) -> Option<String> {
    TITLE_RE
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|title| title.as_str().trim().to_string())
}

/// Markup between the outermost body tags with script elements removed.
pub fn body(document: &str) -> Option<String> {
    let inner = BODY_RE.captures(document)?.get(1)?.as_str();
    Some(SCRIPT_RE.replace_all(inner, "").trim().to_string())
}
