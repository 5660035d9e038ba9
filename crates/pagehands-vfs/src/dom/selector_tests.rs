use super::super::parser::parse_document;
use super::*;

fn find_by_tag(doc: &Document, tag: &str) -> NodeId {
    doc.descendant_elements(doc.root)
        .into_iter()
        .find(|&id| doc.tag(id) == Some(tag))
        .unwrap()
}

#[test]
fn id_wins_outright() {
    let doc = parse_document("<body><div id=\"banner\"><span>x</span></div></body>");
    let div = find_by_tag(&doc, "div");
    assert_eq!(derive_selector(&doc, div), "#banner");
}

#[test]
fn ancestor_id_terminates_the_climb() {
    let doc = parse_document("<body><div id=\"main\"><p class=\"note\"><em>x</em></p></div></body>");
    let em = find_by_tag(&doc, "em");
    assert_eq!(derive_selector(&doc, em), "#main > p.note > em");
}

#[test]
fn classes_attach_to_tags() {
    let doc = parse_document("<body><article class=\"post featured\">x</article></body>");
    let article = find_by_tag(&doc, "article");
    assert_eq!(derive_selector(&doc, article), "body > article.post.featured");
}

#[test]
fn random_classnames_are_skipped() {
    let doc = parse_document(
        "<body><div class=\"css-1x2y3z sidebar\"><p class=\"sc-fzXfNd text\">x</p></div></body>",
    );
    let p = find_by_tag(&doc, "p");
    assert_eq!(derive_selector(&doc, p), "body > div.sidebar > p.text");
}

#[test]
fn hashlike_classnames_are_skipped() {
    let doc = parse_document("<body><div class=\"a1b2c3d4 menu\">x</div></body>");
    let div = find_by_tag(&doc, "div");
    assert_eq!(derive_selector(&doc, div), "body > div.menu");
}

#[test]
fn climb_is_bounded() {
    let doc = parse_document(
        "<body><div><div><div><div><div><span>deep</span></div></div></div></div></div></body>",
    );
    let span = find_by_tag(&doc, "span");
    let selector = derive_selector(&doc, span);
    // span plus at most four ancestors.
    assert_eq!(selector.split(" > ").count(), 5);
    assert!(selector.ends_with("span"));
    assert!(!selector.starts_with("body"));
}

#[test]
fn stops_at_body() {
    let doc = parse_document("<body><p>x</p></body>");
    let p = find_by_tag(&doc, "p");
    assert_eq!(derive_selector(&doc, p), "body > p");
}
