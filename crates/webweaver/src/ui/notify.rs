//! Notification rendering for analysis results and failures.

use std::fmt;

use serde::Serialize;

use crate::app::analysis::{ErrorReport, ImprovementReport};

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    Default,
    Destructive,
}

/// A titled message handed to whatever displays toasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    fn new(title: &str, description: String, variant: Variant) -> Self {
        Self {
            title: title.to_string(),
            description,
            variant,
        }
    }

    /// Summarise an error report, one line per non-empty list.
    pub fn error_report(report: &ErrorReport) -> Self {
        let sections = [
            ("HTML Errors", &report.html_errors),
            ("CSS Errors", &report.css_errors),
            ("JavaScript Errors", &report.javascript_errors),
            ("Suggestions", &report.suggestions),
        ];

        let lines: Vec<String> = sections
            .into_iter()
            .filter_map(|(label, entries)| {
                let entries = entries.as_ref().filter(|entries| !entries.is_empty())?;
                Some(format!("{label}: {}", entries.join(", ")))
            })
            .collect();

        let description = if lines.is_empty() {
            "No errors found.".to_string()
        } else {
            lines.join("\n")
        };
        Self::new("AI Error Detection", description, Variant::Default)
    }

    pub fn improvement(report: &ImprovementReport) -> Self {
        let description = if report.suggestions.is_empty() {
            "No suggestions found.".to_string()
        } else {
            report.suggestions.clone()
        };
        Self::new("AI Assistant Suggestions", description, Variant::Default)
    }

    /// A destructive notification carrying a failure's message.
    pub fn failure(error: &dyn fmt::Display) -> Self {
        Self::new("Error", error.to_string(), Variant::Destructive)
    }

    pub fn is_destructive(&self) -> bool {
        self.variant == Variant::Destructive
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        write!(f, "{}", self.description)
    }
}
