// Parser module: block pass first, then an inline pass over the content of
// every Inline carrier token.
mod block;
mod inline;

pub use block::BlockParser;
pub use inline::parse_inline;

use crate::token::{Token, TokenType};

/// Configuration for the tokenizer.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Whether raw HTML blocks and inline tags are preserved as HTML tokens.
    /// When false, HTML-looking input is treated as literal text and later
    /// escaped by the renderer.
    pub preserve_html: bool,
    /// Whether GFM pipe tables are recognized.
    pub tables: bool,
    /// Whether the `==text==` highlight extension is recognized.
    pub highlight: bool,
    /// Maximum inline nesting depth; deeper markup degrades to literal text.
    pub max_nesting_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            preserve_html: true,
            tables: true,
            highlight: true,
            max_nesting_depth: 32,
        }
    }
}

/// Markdown tokenizer.
///
/// Converts a markdown string (complete or a truncated streaming prefix) into
/// a flat token array. Parsing never fails: malformed constructs degrade to
/// literal text tokens.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// Creates a parser with the given configuration.
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Creates a parser with default configuration.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Returns the parser configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Tokenizes the input into a flat token array.
    pub fn parse(&self, input: &str) -> Vec<Token> {
        let mut tokens = BlockParser::new(&self.config).parse(input);
        self.run_inline_pass(&mut tokens);
        tokens
    }

    fn run_inline_pass(&self, tokens: &mut [Token]) {
        for token in tokens {
            if token.token_type == TokenType::Inline && token.children.is_none() {
                token.children = Some(parse_inline(&token.content, &self.config));
            }
        }
    }
}

/// Parses markdown with the default configuration.
pub fn parse(markdown: &str) -> Vec<Token> {
    Parser::with_defaults().parse(markdown)
}
