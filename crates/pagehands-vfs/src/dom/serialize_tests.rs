use super::super::parser::parse_document;
use super::*;

#[test]
fn outer_html_roundtrips_simple_markup() {
    let doc = parse_document("<html><head></head><body><p id=\"x\">hi</p></body></html>");
    let html = outer_html(&doc, doc.root);
    assert_eq!(
        html,
        "<html><head></head><body><p id=\"x\">hi</p></body></html>"
    );
}

#[test]
fn void_elements_have_no_close_tag() {
    let doc = parse_document("<body><br><img src=\"a.png\"></body>");
    let html = outer_html(&doc, doc.body);
    assert_eq!(html, "<body><br><img src=\"a.png\"></body>");
}

#[test]
fn inner_html_excludes_the_element_itself() {
    let doc = parse_document("<body><div><span>a</span></div></body>");
    let div = doc.descendant_elements(doc.body)[0];
    assert_eq!(inner_html(&doc, div), "<span>a</span>");
}

#[test]
fn formatted_puts_tags_on_their_own_lines() {
    let doc = parse_document("<body><div>\n    indented text\n  <span>x</span></div></body>");
    let text = formatted(&doc, doc.body);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "<body>",
            "<div>",
            "indented text",
            "<span>",
            "x",
            "</span>",
            "</div>",
            "</body>",
        ]
    );
}

#[test]
fn formatted_drops_blank_text() {
    let doc = parse_document("<body><p>a</p>\n\n   \n<p>b</p></body>");
    let text = formatted(&doc, doc.body);
    assert!(!text.contains("\n\n"));
}

#[test]
fn attr_quotes_escaped() {
    let doc = parse_document("<body><div title='say \"hi\"'>x</div></body>");
    let html = outer_html(&doc, doc.body);
    assert!(html.contains("title=\"say &quot;hi&quot;\""));
}

#[test]
fn comments_serialize() {
    let doc = parse_document("<body><!-- note --><p>x</p></body>");
    assert!(outer_html(&doc, doc.body).contains("<!-- note -->"));
    assert!(formatted(&doc, doc.body).contains("<!--note-->"));
}

#[test]
fn formatted_trims_leading_whitespace_in_text() {
    let doc = parse_document("<body><p>  a\n\n   b</p></body>");
    let text = formatted(&doc, doc.body);
    assert_eq!(text, "<body>\n<p>\na\nb\n</p>\n</body>");
}
