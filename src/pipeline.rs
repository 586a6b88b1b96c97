//! The incremental rendering pipeline.
//!
//! [`MarkdownPipeline`] owns the full chain: throttled reparsing of the
//! current markdown buffer, attribute-pattern post-processing, token tree
//! reconciliation, and HTML rendering. It is built for streamed input: the
//! `markdown` property is set repeatedly with growing prefixes, bursts are
//! coalesced by the throttles, and render identity is kept stable across
//! reparses so a host can patch its output instead of replacing it.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::attrs::apply_attribute_patterns;
use crate::config::PipelineConfig;
use crate::parser::Parser;
use crate::render::render_tree;
use crate::throttle::{Clock, SystemClock, Throttle};
use crate::tree::{TokenTree, TreeNode};

static HTML_TAG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("html strip regex"));

/// Lifecycle of the pipeline's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No content parsed yet.
    Initial,
    /// A parse completed and its output is current.
    Stable,
    /// Content changed; a reparse is owed or in progress.
    Reparsing,
}

/// The streaming markdown pipeline. Single-owner, no interior threading;
/// callers drive it by setting inputs and calling [`MarkdownPipeline::poll`]
/// periodically to release trailing throttled updates.
pub struct MarkdownPipeline<C: Clock = SystemClock> {
    config: PipelineConfig,
    clock: C,
    parse_throttle: Throttle,
    render_throttle: Throttle,
    markdown: String,
    tree: TokenTree,
    html: String,
    state: PipelineState,
}

impl MarkdownPipeline<SystemClock> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> MarkdownPipeline<C> {
    /// Builds a pipeline with an injected clock.
    pub fn with_clock(config: PipelineConfig, clock: C) -> Self {
        let parse_throttle = Throttle::new(config.throttle.parse_window);
        let render_throttle = Throttle::new(config.throttle.render_window);
        Self {
            config,
            clock,
            parse_throttle,
            render_throttle,
            markdown: String::new(),
            tree: TokenTree::new(),
            html: String::new(),
            state: PipelineState::Initial,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The last successfully rendered HTML. Retained across render failures.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// The current token tree.
    pub fn tree(&self) -> &[TreeNode] {
        self.tree.roots()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The injected clock. Lets a test host advance a [`crate::throttle::MockClock`].
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Sets the markdown buffer. An empty buffer resets the pipeline; any
    /// other change schedules a reparse through the parse throttle.
    pub fn set_markdown(&mut self, markdown: &str) {
        if markdown == self.markdown {
            return;
        }
        if markdown.is_empty() {
            self.clear();
            return;
        }
        self.markdown = markdown.to_string();
        self.state = PipelineState::Reparsing;
        if self.parse_throttle.request(self.clock.now()) {
            self.reparse();
        }
    }

    /// Toggles output sanitization. Render-only: the existing tree is kept.
    pub fn set_sanitize_html(&mut self, enabled: bool) {
        if self.config.render.sanitize == enabled {
            return;
        }
        self.config.render.sanitize = enabled;
        self.schedule_render();
    }

    /// Toggles streaming mode. Render-only.
    pub fn set_streaming(&mut self, enabled: bool) {
        if self.config.render.streaming == enabled {
            return;
        }
        self.config.render.streaming = enabled;
        self.schedule_render();
    }

    /// Toggles stripping of raw HTML before parsing. Requires a reparse.
    pub fn set_remove_html_before_conversion(&mut self, enabled: bool) {
        if self.config.remove_html_before_conversion == enabled {
            return;
        }
        self.config.remove_html_before_conversion = enabled;
        if !self.markdown.is_empty() {
            self.state = PipelineState::Reparsing;
            if self.parse_throttle.request(self.clock.now()) {
                self.reparse();
            }
        }
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.config.debug = enabled;
    }

    /// Releases any trailing throttled work whose window has elapsed. The
    /// host calls this from its timer or frame callback.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        if self.parse_throttle.poll(now) {
            self.reparse();
        }
        if self.render_throttle.poll(now) {
            self.rerender();
        }
    }

    /// True when a throttled update has not run yet.
    pub fn has_pending_work(&self) -> bool {
        self.parse_throttle.is_pending() || self.render_throttle.is_pending()
    }

    /// Drops all content and identity, returning to the initial state.
    pub fn clear(&mut self) {
        self.markdown.clear();
        self.tree.clear();
        self.html.clear();
        self.parse_throttle.reset();
        self.render_throttle.reset();
        self.state = PipelineState::Initial;
    }

    fn schedule_render(&mut self) {
        if self.render_throttle.request(self.clock.now()) {
            self.rerender();
        }
    }

    fn reparse(&mut self) {
        let source = if self.config.remove_html_before_conversion {
            HTML_TAG_STRIP_RE.replace_all(&self.markdown, "").into_owned()
        } else {
            self.markdown.clone()
        };

        let parser = Parser::new(self.config.parser.clone());
        let tokens = apply_attribute_patterns(parser.parse(&source), &self.config.attrs);
        if self.config.debug {
            debug!(token_count = tokens.len(), "parsed markdown buffer");
        }
        self.tree.update(tokens);
        self.rerender();
        self.state = PipelineState::Stable;
    }

    /// Renders the current tree. On failure the previous stable output is
    /// kept and the error is logged.
    fn rerender(&mut self) {
        match render_tree(self.tree.roots(), &self.config.render) {
            Ok(html) => {
                if self.config.debug {
                    debug!(bytes = html.len(), "rendered token tree");
                }
                self.html = html;
            }
            Err(error) => {
                warn!(%error, "render failed, keeping previous output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::MockClock;
    use std::time::Duration;

    fn pipeline() -> MarkdownPipeline<MockClock> {
        MarkdownPipeline::with_clock(PipelineConfig::default(), MockClock::new())
    }

    #[test]
    fn test_first_parse_is_immediate() {
        let mut p = pipeline();
        assert_eq!(p.state(), PipelineState::Initial);
        p.set_markdown("# hi");
        assert_eq!(p.state(), PipelineState::Stable);
        assert_eq!(p.html(), "<h1>hi</h1>\n");
    }

    #[test]
    fn test_burst_coalesces_and_last_wins() {
        let mut p = pipeline();
        p.set_markdown("# h");
        let first = p.html().to_string();

        // Stream arrives faster than the parse window.
        p.set_markdown("# he");
        p.set_markdown("# hel");
        p.set_markdown("# hello");
        assert_eq!(p.html(), first);
        assert_eq!(p.state(), PipelineState::Reparsing);
        assert!(p.has_pending_work());

        p.clock.advance(Duration::from_millis(150));
        p.poll();
        assert_eq!(p.html(), "<h1>hello</h1>\n");
        assert_eq!(p.state(), PipelineState::Stable);
        assert!(!p.has_pending_work());
    }

    #[test]
    fn test_render_only_toggle_skips_reparse() {
        let mut p = pipeline();
        p.set_markdown("x <span onclick=\"a()\">y</span>");
        assert!(!p.html().contains("onclick"));

        p.clock.advance(Duration::from_millis(200));
        p.set_sanitize_html(false);
        assert!(p.html().contains("onclick"));
        // Tree identity untouched by the render-only path.
        assert_eq!(p.state(), PipelineState::Stable);
    }

    #[test]
    fn test_clear_returns_to_initial() {
        let mut p = pipeline();
        p.set_markdown("para");
        p.set_markdown("");
        assert_eq!(p.state(), PipelineState::Initial);
        assert_eq!(p.html(), "");
        assert!(p.tree().is_empty());
    }

    #[test]
    fn test_remove_html_before_conversion() {
        let mut p = MarkdownPipeline::with_clock(
            PipelineConfig::builder()
                .remove_html_before_conversion(true)
                .build(),
            MockClock::new(),
        );
        p.set_markdown("keep <span>this</span> text");
        assert_eq!(p.html(), "<p>keep this text</p>\n");
    }

    #[test]
    fn test_streaming_prefix_keeps_render_keys() {
        let mut p = pipeline();
        p.set_markdown("# title\n\nfirst");
        let key = p.tree()[0].key;

        p.clock.advance(Duration::from_millis(200));
        p.set_markdown("# title\n\nfirst\n\nsecond");
        assert_eq!(p.tree()[0].key, key);
        assert_eq!(p.tree().len(), 3);
    }
}
