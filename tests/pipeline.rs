//! End-to-end tests over the streaming pipeline: parse idempotence,
//! streaming tolerance, sanitization, and throttled update scheduling.

use std::time::Duration;

use streammark::{
    parser, render_markdown, MarkdownPipeline, MockClock, PipelineConfig, PipelineState,
};

fn pipeline(config: PipelineConfig) -> MarkdownPipeline<MockClock> {
    MarkdownPipeline::with_clock(config, MockClock::new())
}

#[test]
fn test_parse_is_idempotent() {
    let input = "# Title\n\nSome *emphasis* and `code`.\n\n- one\n- two\n";
    assert_eq!(parser::parse(input), parser::parse(input));
}

#[test]
fn test_unterminated_fence_renders_open_code_block() {
    let html = render_markdown("```js\nconsole.log(1)");
    assert!(html.contains("<pre><code class=\"language-js\">"));
    assert!(html.contains("console.log(1)"));
}

#[test]
fn test_svg_sanitization_preserves_structure() {
    let input = concat!(
        "<svg onclick=\"window.leaked = true\">\n",
        "<title>chart</title>\n",
        "<defs><path d=\"M0 0\" /></defs>\n",
        "</svg>\n",
    );
    let html = render_markdown(input);
    assert!(html.contains("<svg>"));
    assert!(html.contains("<title>chart</title>"));
    assert!(html.contains("<defs>"));
    assert!(html.contains("</defs>"));
    assert!(!html.contains("onclick"));
    assert!(!html.contains("leaked"));
}

#[test]
fn test_streamed_prefixes_coalesce_and_converge() {
    let mut p = pipeline(PipelineConfig::default());
    let chunks = [
        "# Str",
        "# Streaming\n\nfi",
        "# Streaming\n\nfirst paragraph\n\n```py\npri",
        "# Streaming\n\nfirst paragraph\n\n```py\nprint(1)\n```\n",
    ];
    p.set_markdown(chunks[0]);
    assert_eq!(p.state(), PipelineState::Stable);

    for chunk in &chunks[1..] {
        p.clock().advance(Duration::from_millis(10));
        p.set_markdown(chunk);
    }
    // Burst still within the parse window: output lags, work is pending.
    assert!(p.has_pending_work());

    p.clock().advance(Duration::from_millis(200));
    p.poll();
    assert_eq!(p.state(), PipelineState::Stable);
    let html = p.html();
    assert!(html.contains("<h1>Streaming</h1>"));
    assert!(html.contains("first paragraph"));
    assert!(html.contains("print(1)"));
}

#[test]
fn test_stable_identity_across_streamed_updates() {
    let mut p = pipeline(PipelineConfig::default());
    p.set_markdown("# head\n\nbody");
    let heading_key = p.tree()[0].key;
    let paragraph_key = p.tree()[1].key;

    p.clock().advance(Duration::from_millis(200));
    p.set_markdown("# head\n\nbody grows here");
    // Heading untouched; paragraph keeps its key while its text leaf is new.
    assert_eq!(p.tree()[0].key, heading_key);
    assert_eq!(p.tree()[1].key, paragraph_key);
}

#[test]
fn test_sanitize_toggle_uses_render_throttle() {
    let mut p = pipeline(PipelineConfig::default());
    p.set_markdown("a <b onclick=\"x()\">c</b>");
    assert!(!p.html().contains("onclick"));

    p.clock().advance(Duration::from_millis(200));
    p.set_sanitize_html(false);
    assert!(p.html().contains("onclick"));

    // Flip twice within the render window: the second toggle is deferred
    // and the last value wins when polled.
    p.set_sanitize_html(true);
    assert!(p.html().contains("onclick"));
    assert!(p.has_pending_work());
    p.clock().advance(Duration::from_millis(60));
    p.poll();
    assert!(!p.html().contains("onclick"));
}

#[test]
fn test_clear_resets_to_initial() {
    let mut p = pipeline(PipelineConfig::default());
    p.set_markdown("content");
    assert_eq!(p.state(), PipelineState::Stable);
    p.set_markdown("");
    assert_eq!(p.state(), PipelineState::Initial);
    assert_eq!(p.html(), "");
    assert!(p.tree().is_empty());
}

#[test]
fn test_malformed_input_degrades_to_text() {
    // Unbalanced emphasis and a stray bracket never fail, they render as
    // literal text.
    let html = render_markdown("*unclosed and [stray");
    assert!(html.contains("*unclosed"));
    assert!(html.contains("[stray"));
}
