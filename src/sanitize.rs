//! HTML fragment sanitizer for raw markup passed through the renderer.
//!
//! Works at the tag level: the fragment is scanned for tags, each tag is
//! checked against an element allow-list, event-handler attributes and
//! script-bearing URL protocols are dropped, and dangerous containers are
//! removed together with their content. Text between tags passes through
//! untouched. Structural markup such as `<svg>` with nested `<defs>` and
//! `<title>` survives with its hierarchy intact.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MarkdownError, Result};

/// Upper bound on tags per fragment. A fragment past this size is rejected
/// rather than scanned further.
const MAX_FRAGMENT_TAGS: usize = 10_000;

/// Elements allowed through, lowercase. Includes the SVG subset needed for
/// inline vector markup.
static ALLOWED_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "code", "col", "colgroup", "dd", "del",
    "details", "div", "dl", "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6",
    "hr", "i", "img", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "s", "samp", "small",
    "span", "strong", "sub", "summary", "sup", "table", "tbody", "td", "tfoot", "th", "thead",
    "tr", "u", "ul", "var",
    // svg subset
    "circle", "clippath", "defs", "desc", "ellipse", "g", "line", "lineargradient", "marker",
    "mask", "path", "pattern", "polygon", "polyline", "radialgradient", "rect", "stop", "svg",
    "symbol", "text", "title", "tspan", "use",
];

/// Elements removed together with everything inside them.
static DROP_WITH_CONTENT: &[&str] = &["embed", "iframe", "noscript", "object", "script", "style"];

/// Attribute keys carrying URLs, subject to the protocol check.
static URL_ATTRIBUTES: &[&str] = &["action", "formaction", "href", "src", "xlink:href"];

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^<(/?)([a-zA-Z][a-zA-Z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#)
        .expect("tag regex")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_:][a-zA-Z0-9_:.-]*)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s>]+))?"#)
        .expect("attribute regex")
});

/// Sanitizes a raw HTML fragment.
pub fn sanitize_fragment(html: &str) -> Result<String> {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut seen_tags = 0usize;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        seen_tags += 1;
        if seen_tags > MAX_FRAGMENT_TAGS {
            return Err(MarkdownError::sanitize_error("fragment exceeds tag limit"));
        }

        if let Some(after) = strip_comment(rest) {
            rest = after;
            continue;
        }

        let captures = match TAG_RE.captures(rest) {
            Some(captures) => captures,
            None => {
                // A bare "<" that opens nothing is shown literally.
                out.push_str("&lt;");
                rest = &rest[1..];
                continue;
            }
        };
        let whole = captures.get(0).map(|m| m.as_str()).unwrap_or("");
        let closing = !captures[1].is_empty();
        let name = captures[2].to_ascii_lowercase();
        let attrs_raw = captures.get(3).map(|m| m.as_str()).unwrap_or("");
        let self_closing = !captures[4].is_empty();
        rest = &rest[whole.len()..];

        if DROP_WITH_CONTENT.contains(&name.as_str()) {
            if !closing && !self_closing {
                rest = skip_past_closing(rest, &name);
            }
            continue;
        }
        if !ALLOWED_ELEMENTS.contains(&name.as_str()) {
            // Unknown element: drop the tag, keep whatever text it wrapped.
            continue;
        }

        if closing {
            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        } else {
            out.push('<');
            out.push_str(&name);
            write_safe_attrs(&mut out, attrs_raw);
            if self_closing {
                out.push_str(" /");
            }
            out.push('>');
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Skips an HTML comment, returning the remainder after `-->`. A comment
/// left open by a streaming cut consumes the rest of the fragment.
fn strip_comment(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix("<!--")?;
    Some(match body.find("-->") {
        Some(end) => &body[end + 3..],
        None => "",
    })
}

/// Advances past the matching close tag of a dropped container.
fn skip_past_closing<'a>(rest: &'a str, name: &str) -> &'a str {
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{name}");
    match lower.find(&needle) {
        Some(at) => match rest[at..].find('>') {
            Some(gt) => &rest[at + gt + 1..],
            None => "",
        },
        None => "",
    }
}

/// Re-emits the attributes of an allowed tag, dropping event handlers and
/// script-bearing URLs.
fn write_safe_attrs(out: &mut String, attrs_raw: &str) {
    for captures in ATTR_RE.captures_iter(attrs_raw) {
        let key = captures[1].to_ascii_lowercase();
        if key.starts_with("on") {
            continue;
        }
        let value = captures
            .get(2)
            .map(|m| unquote(m.as_str()))
            .unwrap_or_default();
        if URL_ATTRIBUTES.contains(&key.as_str()) && has_forbidden_protocol(&value) {
            continue;
        }
        out.push(' ');
        out.push_str(&key);
        if captures.get(2).is_some() {
            out.push_str("=\"");
            out.push_str(&escape_attr(&value));
            out.push('"');
        }
    }
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Returns true for attribute keys that carry URLs. The renderer uses this
/// to vet link and image destinations coming straight from markdown, which
/// never pass through [`sanitize_fragment`].
pub(crate) fn is_url_attribute(key: &str) -> bool {
    URL_ATTRIBUTES.contains(&key)
}

/// Protocol check over a URL attribute value. Whitespace and control
/// characters are removed first so `java\tscript:` cannot slip through.
pub(crate) fn has_forbidden_protocol(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.starts_with("javascript:")
        || compact.starts_with("vbscript:")
        || compact.starts_with("data:text/html")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
