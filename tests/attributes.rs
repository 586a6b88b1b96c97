//! Curly-brace attribute syntax, exercised through the full
//! parse-attrs-render chain.

use streammark::{apply_attribute_patterns, parser, render_markdown, AttrsConfig, TokenType};

#[test]
fn test_code_span_attribute() {
    let tokens = apply_attribute_patterns(
        parser::parse("`code`{.highlight}"),
        &AttrsConfig::default(),
    );
    let inline = tokens
        .iter()
        .find(|t| t.token_type == TokenType::Inline)
        .expect("inline token");
    let code = inline
        .children
        .as_ref()
        .expect("inline children")
        .iter()
        .find(|t| t.token_type == TokenType::CodeInline)
        .expect("code token");
    assert_eq!(code.attr_get("class"), Some("highlight"));
    assert!(!code.content.contains("{.highlight}"));

    let html = render_markdown("`code`{.highlight}");
    assert_eq!(html, "<p><code class=\"highlight\">code</code></p>\n");
}

#[test]
fn test_heading_attributes() {
    assert_eq!(
        render_markdown("# Features {#features .docs}"),
        "<h1 id=\"features\" class=\"docs\">Features</h1>\n"
    );
}

#[test]
fn test_fence_attributes_keep_language() {
    let html = render_markdown("```rust {.numbered}\nfn main() {}\n```");
    assert!(html.contains("<pre><code class=\"numbered language-rust\">"));
}

#[test]
fn test_emphasis_span_attributes() {
    let html = render_markdown("*hot*{.red} take");
    assert_eq!(html, "<p><em class=\"red\">hot</em> take</p>\n");
}

#[test]
fn test_image_attributes() {
    let html = render_markdown("![logo](logo.png){width=40}");
    assert!(html.contains("width=\"40\""));
    assert!(html.contains("src=\"logo.png\""));
    assert!(!html.contains("{width=40}"));
}

#[test]
fn test_list_item_and_list_attributes() {
    let html = render_markdown("- red {.error}\n- plain");
    assert!(html.contains("<li class=\"error\">red</li>"));
    assert!(html.contains("<li>plain</li>"));

    let html = render_markdown("- one\n- two\n{.checklist}");
    assert!(html.starts_with("<ul class=\"checklist\">"));
    assert!(!html.contains("{.checklist}"));
}

#[test]
fn test_table_attributes_and_spans() {
    let input = "\
| h1 | h2 | h3 |
| -- | -- | -- |
| wide {colspan=2} | a | b |

{.data-table}
";
    let html = render_markdown(input);
    assert!(html.contains("<table class=\"data-table\">"));
    assert!(html.contains("colspan=\"2\""));
    // Three columns, first body cell spans two: only one more cell shows.
    assert!(html.contains(">a<"));
    assert!(!html.contains(">b<"));
}

#[test]
fn test_horizontal_rule_attributes() {
    assert_eq!(
        render_markdown("--- {.fancy}"),
        "<hr class=\"fancy\">\n"
    );
}

#[test]
fn test_disallowed_attributes_dropped() {
    let html = render_markdown("# T {onload=evil() .ok data-x=1}");
    assert!(!html.contains("onload"));
    assert!(html.contains("class=\"ok\""));
    assert!(html.contains("data-x=\"1\""));
}

#[test]
fn test_unmatched_curly_left_alone() {
    let html = render_markdown("just {braces in text");
    assert!(html.contains("just {braces in text"));
}
