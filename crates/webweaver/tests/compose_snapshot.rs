use insta::assert_snapshot;
use webweaver::app::compose::compose;
use webweaver::app::markup;
use webweaver::domain::model::SourceBundle;

#[test]
fn composed_document_renders() {
    let bundle = SourceBundle::new("<h1>Hi</h1>", "h1 { color: teal; }", "console.log('hi');");
    let document = compose(&bundle);
    assert_snapshot!("composed_document", document.as_str());
}

#[test]
fn composed_document_round_trips_through_markup_queries() {
    let bundle = SourceBundle::new("<p>body</p>", "", "let x = 1;");
    let document = compose(&bundle);
    assert_eq!(
        markup::title(document.as_str()).as_deref(),
        Some("Web Weaver Live Preview")
    );
    assert_eq!(markup::scripts(document.as_str()), vec!["let x = 1;".to_string()]);
    assert_eq!(markup::body(document.as_str()).as_deref(), Some("<p>body</p>"));
}
