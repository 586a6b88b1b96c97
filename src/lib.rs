//! Incremental markdown rendering for streamed text.
//!
//! This crate implements the pipeline behind a live markdown view fed by a
//! token stream: a tolerant tokenizer, a curly-brace attribute extension
//! (`{.class #id key=val}`), a token-tree differ with stable render keys,
//! and a streaming-aware HTML renderer with built-in sanitization, all
//! driven through throttled update scheduling.
//!
//! # Quick start
//!
//! ```
//! use streammark::render_markdown;
//!
//! let html = render_markdown("# Hello {.title}");
//! assert_eq!(html, "<h1 class=\"title\">Hello</h1>\n");
//! ```
//!
//! For streamed input, drive a [`MarkdownPipeline`] instead:
//!
//! ```
//! use streammark::{MarkdownPipeline, PipelineConfig};
//!
//! let mut pipeline = MarkdownPipeline::new(PipelineConfig::default());
//! pipeline.set_markdown("# Hello");
//! pipeline.set_markdown("# Hello, wor");
//! pipeline.set_markdown("# Hello, world");
//! pipeline.poll();
//! assert!(pipeline.html().contains("Hello"));
//! ```

// Core modules
pub mod attrs;
pub mod error;
pub mod parser;
pub mod render;
pub mod sanitize;
pub mod throttle;
pub mod token;
pub mod tree;
pub mod utils;

// Public API configuration and pipeline modules
pub mod config;
pub mod pipeline;

// Re-export key types for public API
pub use attrs::{apply_attribute_patterns, AttrsConfig};
pub use config::{PipelineConfig, PipelineConfigBuilder, ThrottleConfig};
pub use error::{MarkdownError, Result};
pub use parser::{Parser, ParserConfig};
pub use pipeline::{MarkdownPipeline, PipelineState};
pub use render::{render_tree, RenderConfig};
pub use sanitize::sanitize_fragment;
pub use throttle::{Clock, MockClock, SystemClock, Throttle};
pub use token::{Nesting, Token, TokenType};
pub use tree::{TokenTree, TreeNode};

/// Converts a markdown string to HTML in one call.
///
/// Parses with default configuration, applies the attribute patterns, and
/// renders with sanitization enabled. Never fails: if rendering errors the
/// result is an empty string.
pub fn render_markdown(markdown: &str) -> String {
    let tokens = apply_attribute_patterns(parser::parse(markdown), &AttrsConfig::default());
    let mut tree = TokenTree::new();
    tree.update(tokens);
    render_tree(tree.roots(), &RenderConfig::default()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown_basic() {
        let html = render_markdown("# Hello, World!");
        assert_eq!(html, "<h1>Hello, World!</h1>\n");
    }

    #[test]
    fn test_render_markdown_empty() {
        assert_eq!(render_markdown(""), "");
    }

    #[test]
    fn test_render_markdown_attributes() {
        let html = render_markdown("paragraph {.note}");
        assert_eq!(html, "<p class=\"note\">paragraph</p>\n");
    }
}
