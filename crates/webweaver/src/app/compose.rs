//! Document composition from source fragments.

use crate::domain::model::{ComposedDocument, SourceBundle};

/// Title every composed preview document carries.
pub const PREVIEW_TITLE: &str = "Web Weaver Live Preview";

/// Merge the three fragments into one self-contained document.
///
/// Fragments are embedded verbatim: the stylesheet inside the head `<style>`
/// element, the markup inside `<body>`, and the script in a trailing
/// `<script>` element. Any input is accepted and the same bundle always
/// yields the same bytes.
pub fn compose(bundle: &SourceBundle) -> ComposedDocument {
    let SourceBundle {
        html,
        css,
        javascript,
    } = bundle;

    let mut out =
        String::with_capacity(DOCUMENT_OVERHEAD + html.len() + css.len() + javascript.len());
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html lang=\"en\">\n");
    out.push_str("<head>\n");
    out.push_str("    <meta charset=\"UTF-8\">\n");
    out.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    out.push_str("    <title>");
    out.push_str(PREVIEW_TITLE);
    out.push_str("</title>\n");
    out.push_str("    <style>");
    out.push_str(css);
    out.push_str("</style>\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(html);
    out.push('\n');
    out.push_str("    <script>");
    out.push_str(javascript);
    out.push_str("</script>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");

    ComposedDocument::new(out)
}

const DOCUMENT_OVERHEAD: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::markup;

    #[test]
    fn compose_is_deterministic() {
        let bundle = SourceBundle::starter();
        assert_eq!(compose(&bundle), compose(&bundle));
    }

    #[test]
    fn empty_bundle_keeps_structure() {
        let doc = compose(&SourceBundle::default());
        let text = doc.as_str();
        assert!(text.starts_with("<!DOCTYPE html>"));
        assert!(text.contains("<style></style>"));
        assert!(text.contains("<script></script>"));
        assert_eq!(markup::scripts(text), vec![String::new()]);
        assert_eq!(markup::title(text).as_deref(), Some(PREVIEW_TITLE));
    }

    #[test]
    fn fragments_are_embedded_verbatim() {
        let bundle = SourceBundle::new(
            "<p class=\"x\">a & b</p>",
            "p::after { content: \"<>\"; }",
            "if (1 < 2 && true) console.log('ok');",
        );
        let doc = compose(&bundle);
        assert!(doc.as_str().contains("<p class=\"x\">a & b</p>"));
        assert!(doc.as_str().contains("<style>p::after { content: \"<>\"; }</style>"));
        assert_eq!(
            markup::scripts(doc.as_str()),
            vec!["if (1 < 2 && true) console.log('ok');".to_string()]
        );
    }

    #[test]
    fn style_precedes_markup_precedes_script() {
        let doc = compose(&SourceBundle::new("MARKUP", "STYLE", "SCRIPT"));
        let text = doc.as_str();
        let style = text.find("STYLE").unwrap();
        let markup = text.find("MARKUP").unwrap();
        let script = text.find("SCRIPT").unwrap();
        assert!(style < markup && markup < script);
    }
}
