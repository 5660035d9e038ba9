use super::*;

fn loc() -> PageLocation {
    PageLocation::new("shop.test", "/products/42")
}

#[test]
fn absolute_page_path() {
    let vp = parse_path("/shop.test/products/42/page.html", &loc()).unwrap();
    assert_eq!(vp.domain, "shop.test");
    assert_eq!(vp.url_path, "/products/42");
    assert_eq!(vp.kind, PathKind::Page);
    assert_eq!(vp.full, "/shop.test/products/42/page.html");
}

#[test]
fn bare_leaf_resolves_against_active_page() {
    let vp = parse_path("page.html", &loc()).unwrap();
    assert_eq!(vp.full, "/shop.test/products/42/page.html");

    let vp = parse_path("scripts/a.js", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::Script);
    assert_eq!(vp.file_name.as_deref(), Some("a.js"));
    assert_eq!(vp.url_path, "/products/42");
}

#[test]
fn dot_relative_resolves() {
    let vp = parse_path("./plan.md", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::Plan);
    assert_eq!(vp.url_path, "/products/42");
}

#[test]
fn parent_relative_resolves() {
    let vp = parse_path("../page.html", &loc()).unwrap();
    assert_eq!(vp.url_path, "/products");
}

#[test]
fn traversal_above_root_is_clamped() {
    // Five `..` from /products/42 would escape the domain; extras drop.
    let vp = parse_path("../../../../../shop.test/page.html", &loc());
    // After clamping, the first remaining segment is treated as the domain.
    let vp = vp.unwrap();
    assert_eq!(vp.domain, "shop.test");
    assert_eq!(vp.url_path, "/");
}

#[test]
fn root_page_path() {
    let root = PageLocation::new("x.test", "/");
    let vp = parse_path("/x.test/page.html", &root).unwrap();
    assert_eq!(vp.url_path, "/");
    assert_eq!(vp.full, "/x.test/page.html");
}

#[test]
fn style_leaf() {
    let vp = parse_path("/x.test/styles/dark.css", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::Style);
    assert_eq!(vp.domain, "x.test");
    assert_eq!(vp.url_path, "/");
    assert_eq!(vp.file_name.as_deref(), Some("dark.css"));
}

#[test]
fn scripts_directory() {
    let vp = parse_path("/shop.test/products/42/scripts", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::ScriptsDir);
    assert_eq!(vp.url_path, "/products/42");
    assert_eq!(vp.full, "/shop.test/products/42/scripts");
}

#[test]
fn unrecognized_leaf_is_a_directory() {
    let vp = parse_path("/shop.test/products/42/readme.txt", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::Directory);
    assert!(vp.file_name.is_none());
}

#[test]
fn nested_script_name_is_not_a_script() {
    // Script and style names are flat; a nested path is just a directory.
    let vp = parse_path("/x.test/scripts/sub/a.js", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::Directory);
}

#[test]
fn wrong_extension_under_scripts_is_a_directory() {
    let vp = parse_path("/x.test/scripts/a.css", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::Directory);
}

#[test]
fn empty_and_bare_slash_are_rejected() {
    assert!(parse_path("", &loc()).is_none());
    assert!(parse_path("/", &loc()).is_none());
}

#[test]
fn dynamic_pattern_path_parses_literally() {
    let vp = parse_path("/shop.test/products/[id]/scripts/a.js", &loc()).unwrap();
    assert_eq!(vp.url_path, "/products/[id]");
    assert_eq!(vp.kind, PathKind::Script);
}

#[test]
fn extension_only_names_are_not_artifacts() {
    let vp = parse_path("/x.test/scripts/.js", &loc()).unwrap();
    assert_eq!(vp.kind, PathKind::Directory);
}
