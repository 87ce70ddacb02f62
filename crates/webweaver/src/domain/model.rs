//! Domain models for source fragments, composed documents, and captured output.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const STARTER_HTML: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    <title>Web Weaver</title>\n</head>\n<body>\n    <h1>Hello, Web Weaver!</h1>\n    <p>Start building your website here.</p>\n</body>\n</html>";
const STARTER_CSS: &str = "body {\n    font-family: sans-serif;\n    margin: 0;\n    padding: 20px;\n    background-color: #f0f0f0;\n}";
const STARTER_JS: &str = "// Your JavaScript code here\nconsole.log(\"Web Weaver is running!\");";

/// One of the three independently edited source fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum Fragment {
    /// Markup placed inside the document body.
    #[value(alias = "markup")]
    Html,
    /// Stylesheet placed inside the head style element.
    #[value(aliases = ["style", "stylesheet"])]
    Css,
    /// Script placed at the end of the body.
    #[value(aliases = ["js", "script"])]
    Javascript,
}

impl Fragment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fragment::Html => "html",
            Fragment::Css => "css",
            Fragment::Javascript => "javascript",
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three source fragments owned by an editing session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceBundle {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub javascript: String,
}

impl SourceBundle {
    pub fn new(
        html: impl Into<String>,
        css: impl Into<String>,
        javascript: impl Into<String>,
    ) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            javascript: javascript.into(),
        }
    }

    /// The bundle a fresh playground opens with.
    pub fn starter() -> Self {
        Self::new(STARTER_HTML, STARTER_CSS, STARTER_JS)
    }

    pub fn get(&self, fragment: Fragment) -> &str {
        match fragment {
            Fragment::Html => &self.html,
            Fragment::Css => &self.css,
            Fragment::Javascript => &self.javascript,
        }
    }

    /// Replace a single fragment, leaving the other two untouched.
    pub fn set(&mut self, fragment: Fragment, value: impl Into<String>) {
        let value = value.into();
        match fragment {
            Fragment::Html => self.html = value,
            Fragment::Css => self.css = value,
            Fragment::Javascript => self.javascript = value,
        }
    }

    pub fn clear(&mut self) {
        self.html.clear();
        self.css.clear();
        self.javascript.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.javascript.is_empty()
    }
}

/// A self-contained document derived from a [`SourceBundle`].
///
/// Only the composer constructs one; the contents never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComposedDocument(String);

impl ComposedDocument {
    pub(crate) fn new(markup: String) -> Self {
        Self(markup)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComposedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ComposedDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single console line emitted during one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedLine {
    pub text: String,
    pub is_error: bool,
}

impl CapturedLine {
    pub fn log(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Ordered console output of exactly one run invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputLog {
    lines: Vec<CapturedLine>,
}

impl OutputLog {
    pub fn push(&mut self, line: CapturedLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[CapturedLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any line arrived on the error channel.
    pub fn has_errors(&self) -> bool {
        self.lines.iter().any(|line| line.is_error)
    }
}

impl From<Vec<CapturedLine>> for OutputLog {
    fn from(lines: Vec<CapturedLine>) -> Self {
        Self { lines }
    }
}

impl IntoIterator for OutputLog {
    type Item = CapturedLine;
    type IntoIter = std::vec::IntoIter<CapturedLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<'a> IntoIterator for &'a OutputLog {
    type Item = &'a CapturedLine;
    type IntoIter = std::slice::Iter<'a, CapturedLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_accepts_aliases() {
        assert_eq!(Fragment::from_str("markup", false), Ok(Fragment::Html));
        assert_eq!(Fragment::from_str("stylesheet", false), Ok(Fragment::Css));
        assert_eq!(Fragment::from_str("JS", true), Ok(Fragment::Javascript));
        assert_eq!(Fragment::from_str("script", false), Ok(Fragment::Javascript));
        assert!(Fragment::from_str("rust", false).is_err());
    }

    #[test]
    fn set_touches_only_one_fragment() {
        let mut bundle = SourceBundle::new("<p>a</p>", "p{}", "1;");
        bundle.set(Fragment::Css, "h1{}");
        assert_eq!(bundle.html, "<p>a</p>");
        assert_eq!(bundle.css, "h1{}");
        assert_eq!(bundle.get(Fragment::Javascript), "1;");
    }

    #[test]
    fn clear_empties_every_fragment() {
        let mut bundle = SourceBundle::starter();
        assert!(!bundle.is_empty());
        bundle.clear();
        assert!(bundle.is_empty());
    }

    #[test]
    fn captured_line_serializes_camel_case() {
        let log = OutputLog::from(vec![CapturedLine::error("boom")]);
        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(json, r#"[{"text":"boom","isError":true}]"#);
        assert!(log.has_errors());
    }
}
