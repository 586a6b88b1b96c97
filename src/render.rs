//! HTML rendering over the token tree.
//!
//! The renderer walks [`TreeNode`] forests produced by [`crate::tree`] and
//! emits an HTML string. Raw HTML tokens are passed through the sanitizer
//! when enabled; everything else is escaped. Streaming mode tolerates
//! markup cut mid-tag by a partial buffer.

use crate::error::{MarkdownError, Result};
use crate::sanitize::{has_forbidden_protocol, is_url_attribute, sanitize_fragment};
use crate::token::{Nesting, Token, TokenType};
use crate::tree::TreeNode;

/// Depth guard for pathological trees.
const MAX_RENDER_DEPTH: usize = 128;

/// Rendering options.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Run raw HTML tokens through the sanitizer.
    pub sanitize: bool,
    /// Input is a growing stream; suppress markup cut mid-tag instead of
    /// showing it literally.
    pub streaming: bool,
    /// Prefix for the fence language class.
    pub lang_prefix: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sanitize: true,
            streaming: false,
            lang_prefix: "language-".to_string(),
        }
    }
}

/// Renders a token tree forest to HTML.
pub fn render_tree(nodes: &[TreeNode], config: &RenderConfig) -> Result<String> {
    let mut out = String::new();
    render_nodes(&mut out, nodes, config, 0)?;
    Ok(out)
}

fn render_nodes(
    out: &mut String,
    nodes: &[TreeNode],
    config: &RenderConfig,
    depth: usize,
) -> Result<()> {
    if depth > MAX_RENDER_DEPTH {
        return Err(MarkdownError::render_error("token tree too deep"));
    }
    for node in nodes {
        render_node(out, node, config, depth)?;
    }
    Ok(())
}

fn render_node(out: &mut String, node: &TreeNode, config: &RenderConfig, depth: usize) -> Result<()> {
    let token = &node.token;
    if token.hidden {
        // Hidden drops the node's own markup only. Tight-list paragraphs
        // are hidden but their inline content still shows; collapsed table
        // cells hide their descendants individually.
        return render_nodes(out, &node.children, config, depth + 1);
    }
    match token.token_type {
        TokenType::Inline => render_nodes(out, &node.children, config, depth + 1)?,
        TokenType::Text => out.push_str(&escape_html(&token.content)),
        TokenType::Softbreak => out.push('\n'),
        TokenType::Hardbreak => out.push_str("<br>\n"),
        TokenType::CodeInline => {
            out.push_str("<code");
            write_attrs(out, token, config);
            out.push('>');
            out.push_str(&escape_html(&token.content));
            out.push_str("</code>");
        }
        TokenType::Fence => render_fence(out, token, config),
        TokenType::Hr => {
            out.push_str("<hr");
            write_attrs(out, token, config);
            out.push_str(">\n");
        }
        TokenType::Image => render_image(out, node, config),
        TokenType::HtmlBlock | TokenType::HtmlInline => {
            render_raw_html(out, token, config)?;
        }
        _ => match token.nesting {
            Nesting::Open => {
                out.push('<');
                out.push_str(&token.tag);
                write_attrs(out, token, config);
                out.push('>');
                render_nodes(out, &node.children, config, depth + 1)?;
                out.push_str("</");
                out.push_str(&token.tag);
                out.push('>');
                if token.block {
                    out.push('\n');
                }
            }
            // Closers are folded into their opener while building the tree;
            // one showing up here means a malformed stream. Skip it.
            Nesting::Close => {}
            Nesting::SelfContained => {
                if token.tag.is_empty() {
                    out.push_str(&escape_html(&token.content));
                } else {
                    out.push('<');
                    out.push_str(&token.tag);
                    write_attrs(out, token, config);
                    out.push('>');
                }
            }
        },
    }
    Ok(())
}

/// Fenced code. An unterminated fence from a partial stream renders like any
/// other: partial code must stay visible while the rest arrives.
fn render_fence(out: &mut String, token: &Token, config: &RenderConfig) {
    out.push_str("<pre><code");
    let language = token.info.split_whitespace().next().unwrap_or("");
    let mut fence = token.clone();
    if !language.is_empty() {
        fence.attr_join("class", format!("{}{}", config.lang_prefix, language));
    }
    write_attrs(out, &fence, config);
    out.push('>');
    out.push_str(&escape_html(&token.content));
    out.push_str("</code></pre>\n");
}

fn render_image(out: &mut String, node: &TreeNode, config: &RenderConfig) {
    let token = &node.token;
    out.push_str("<img");
    if let Some(src) = token.attr_get("src") {
        if !(config.sanitize && has_forbidden_protocol(src)) {
            out.push_str(" src=\"");
            out.push_str(&escape_html(src));
            out.push('"');
        }
    }
    out.push_str(" alt=\"");
    out.push_str(&escape_html(&plain_text(&node.children)));
    out.push('"');
    for (key, value) in &token.attrs {
        if key == "src" {
            continue;
        }
        if config.sanitize && is_url_attribute(key) && has_forbidden_protocol(value) {
            continue;
        }
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_html(value));
        out.push('"');
    }
    out.push('>');
}

fn render_raw_html(out: &mut String, token: &Token, config: &RenderConfig) -> Result<()> {
    let mut content = token.content.as_str();
    if config.streaming {
        content = trim_truncated_tag(content);
    }
    if config.sanitize {
        out.push_str(&sanitize_fragment(content)?);
    } else {
        out.push_str(content);
    }
    Ok(())
}

/// Drops a trailing tag the stream has not finished yet, so a half-received
/// `<div cla` never flashes as literal text.
fn trim_truncated_tag(content: &str) -> &str {
    match content.rfind('<') {
        Some(at) if !content[at..].contains('>') => &content[..at],
        _ => content,
    }
}

fn plain_text(nodes: &[TreeNode]) -> String {
    let mut text = String::new();
    for node in nodes {
        if node.token.token_type == TokenType::Text {
            text.push_str(&node.token.content);
        }
        text.push_str(&plain_text(&node.children));
    }
    text
}

/// Emits the token's attributes. Link and image destinations come straight
/// from markdown and never pass through the fragment sanitizer, so URL
/// attributes get the same protocol check here when sanitizing is on.
fn write_attrs(out: &mut String, token: &Token, config: &RenderConfig) {
    for (key, value) in &token.attrs {
        if config.sanitize && is_url_attribute(key) && has_forbidden_protocol(value) {
            continue;
        }
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_html(value));
        out.push('"');
    }
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::{apply_attribute_patterns, AttrsConfig};
    use crate::parser;
    use crate::tree::TokenTree;

    fn render(input: &str, config: &RenderConfig) -> String {
        let tokens = apply_attribute_patterns(parser::parse(input), &AttrsConfig::default());
        let mut tree = TokenTree::new();
        tree.update(tokens);
        render_tree(tree.roots(), config).unwrap()
    }

    #[test]
    fn test_paragraph_roundtrip() {
        let html = render("hello *world*", &RenderConfig::default());
        assert_eq!(html, "<p>hello <em>world</em></p>\n");
    }

    #[test]
    fn test_heading_and_escape() {
        let html = render("# a < b", &RenderConfig::default());
        assert_eq!(html, "<h1>a &lt; b</h1>\n");
    }

    #[test]
    fn test_fence_language_class() {
        let html = render("```js\nlet x = 1;\n```", &RenderConfig::default());
        assert_eq!(
            html,
            "<pre><code class=\"language-js\">let x = 1;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_unterminated_fence_still_renders() {
        let html = render("```js\nconsole.log(1)", &RenderConfig::default());
        assert!(html.contains("<pre><code class=\"language-js\">"));
        assert!(html.contains("console.log(1)"));
    }

    #[test]
    fn test_attrs_rendered_on_tag() {
        let html = render("# Title {.main #top}", &RenderConfig::default());
        assert_eq!(html, "<h1 class=\"main\" id=\"top\">Title</h1>\n");
    }

    #[test]
    fn test_image_alt_from_children() {
        let html = render("![a < b](pic.png)", &RenderConfig::default());
        assert_eq!(html, "<p><img src=\"pic.png\" alt=\"a &lt; b\"></p>\n");
    }

    #[test]
    fn test_hidden_cells_not_rendered() {
        let input = "\
| a | b |
| - | - |
| w {colspan=2} | x |
";
        let html = render(input, &RenderConfig::default());
        assert!(html.contains("colspan=\"2\""));
        assert!(!html.contains(">x<"));
    }

    #[test]
    fn test_raw_html_sanitized() {
        let html = render(
            "before <span onclick=\"boom()\">mid</span> after",
            &RenderConfig::default(),
        );
        assert!(html.contains("<span>mid</span>"));
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn test_raw_html_passthrough_when_disabled() {
        let config = RenderConfig {
            sanitize: false,
            ..RenderConfig::default()
        };
        let html = render("x <b class=\"k\">y</b>", &config);
        assert!(html.contains("<b class=\"k\">y</b>"));
    }

    #[test]
    fn test_streaming_trims_half_received_tag() {
        let config = RenderConfig {
            streaming: true,
            ..RenderConfig::default()
        };
        let tokens = parser::parse("<div>\npartial <span cla");
        let mut tree = TokenTree::new();
        tree.update(tokens);
        let html = render_tree(tree.roots(), &config).unwrap();
        assert!(!html.contains("span cla"));
        assert!(html.contains("partial"));
    }

    #[test]
    fn test_link_script_url_dropped() {
        let html = render("[click me](javascript:alert(1))", &RenderConfig::default());
        assert_eq!(html, "<p><a>click me</a></p>\n");
        let html = render("[click me](JaVaScRiPt:alert(1))", &RenderConfig::default());
        assert_eq!(html, "<p><a>click me</a></p>\n");
        let html = render("[ok](https://example.com)", &RenderConfig::default());
        assert!(html.contains("href=\"https://example.com\""));
    }

    #[test]
    fn test_image_script_url_dropped() {
        let html = render("![x](javascript:alert(1))", &RenderConfig::default());
        assert_eq!(html, "<p><img alt=\"x\"></p>\n");
    }

    #[test]
    fn test_script_url_kept_when_sanitize_disabled() {
        let config = RenderConfig {
            sanitize: false,
            ..RenderConfig::default()
        };
        let html = render("[x](javascript:alert(1))", &config);
        assert!(html.contains("href=\"javascript:alert(1)\""));
    }

    #[test]
    fn test_ordered_list_start_attr() {
        let html = render("3. three\n4. four", &RenderConfig::default());
        assert!(html.starts_with("<ol start=\"3\">"));
        assert!(html.contains("<li>three</li>"));
    }
}
