/// Token model for the markdown pipeline.
///
/// The tokenizer produces a flat array of [`Token`]s: paired open/close
/// tokens for containers, self-contained tokens for leaves, and `Inline`
/// tokens whose `children` hold the parsed inline content of a block. The
/// attribute-extension engine and the token-tree differ both operate on this
/// representation.
use serde::{Deserialize, Serialize};

/// Classification of a token. Paired variants come as `*Open`/`*Close`;
/// everything else is self-contained (`nesting = 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    // Block-level tokens
    ParagraphOpen,
    ParagraphClose,
    HeadingOpen,
    HeadingClose,
    BlockquoteOpen,
    BlockquoteClose,
    BulletListOpen,
    BulletListClose,
    OrderedListOpen,
    OrderedListClose,
    ListItemOpen,
    ListItemClose,
    TableOpen,
    TableClose,
    TheadOpen,
    TheadClose,
    TbodyOpen,
    TbodyClose,
    TrOpen,
    TrClose,
    ThOpen,
    ThClose,
    TdOpen,
    TdClose,
    Fence,
    Hr,
    HtmlBlock,
    /// Carrier for inline content: `content` holds the raw text and
    /// `children` the parsed inline tokens.
    Inline,

    // Inline tokens
    Text,
    CodeInline,
    EmOpen,
    EmClose,
    StrongOpen,
    StrongClose,
    SOpen,
    SClose,
    MarkOpen,
    MarkClose,
    LinkOpen,
    LinkClose,
    Image,
    Softbreak,
    Hardbreak,
    HtmlInline,
}

/// Nesting direction of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nesting {
    /// Opening token (`+1`).
    Open,
    /// Self-contained token (`0`).
    SelfContained,
    /// Closing token (`-1`).
    Close,
}

impl Nesting {
    /// Returns the numeric nesting delta (+1, 0 or -1).
    pub fn delta(self) -> i32 {
        match self {
            Nesting::Open => 1,
            Nesting::SelfContained => 0,
            Nesting::Close => -1,
        }
    }
}

/// A unit of parsed markdown structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Token classification.
    pub token_type: TokenType,
    /// Semantic HTML-like tag name (e.g. "p", "h2", "code"). Empty for
    /// tokens that do not map to an element.
    pub tag: String,
    /// Nesting direction.
    pub nesting: Nesting,
    /// Nesting depth of this token within the stream.
    pub level: usize,
    /// Raw text for text-bearing tokens (text, code, inline carriers).
    pub content: String,
    /// Ordered name/value attribute pairs. Keys are unique; `attr_join`
    /// merges repeated `class`/`style` values.
    pub attrs: Vec<(String, String)>,
    /// Parsed inline children for `Inline` tokens; `None` elsewhere.
    pub children: Option<Vec<Token>>,
    /// Source line range `[start, end)` for block tokens.
    pub map: Option<(usize, usize)>,
    /// The markup that produced this token ("**", "```", "==", ...).
    pub markup: String,
    /// Info string for fenced code blocks.
    pub info: String,
    /// Hidden tokens are kept for structural bookkeeping (e.g. collapsed
    /// table cells, tight-list paragraphs) but skipped by the renderer.
    pub hidden: bool,
    /// Whether this is a block-level token.
    pub block: bool,
}

impl Token {
    /// Creates a new token with the given classification, tag and nesting.
    pub fn new(token_type: TokenType, tag: impl Into<String>, nesting: Nesting) -> Self {
        Token {
            token_type,
            tag: tag.into(),
            nesting,
            level: 0,
            content: String::new(),
            attrs: Vec::new(),
            children: None,
            map: None,
            markup: String::new(),
            info: String::new(),
            hidden: false,
            block: false,
        }
    }

    /// Creates an inline text token with the given content.
    pub fn text(content: impl Into<String>) -> Self {
        let mut token = Token::new(TokenType::Text, "", Nesting::SelfContained);
        token.content = content.into();
        token
    }

    /// Returns the value of the attribute with the given name, if present.
    pub fn attr_get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the index of the attribute with the given name.
    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.attrs.iter().position(|(key, _)| key == name)
    }

    /// Sets an attribute, replacing any existing value for the same name.
    pub fn attr_set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attr_index(&name) {
            Some(index) => self.attrs[index].1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    /// Joins a value onto an existing attribute with a space separator, or
    /// creates the attribute if absent. Used for `class` and `style` so
    /// multiple patterns can contribute values.
    pub fn attr_join(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attr_index(&name) {
            Some(index) => {
                let existing = &mut self.attrs[index].1;
                if !existing.is_empty() {
                    existing.push(' ');
                }
                existing.push_str(&value);
            }
            None => self.attrs.push((name, value)),
        }
    }

    /// Returns true for tokens that open a container.
    pub fn is_open(&self) -> bool {
        self.nesting == Nesting::Open
    }

    /// Returns true for tokens that close a container.
    pub fn is_close(&self) -> bool {
        self.nesting == Nesting::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_delta() {
        assert_eq!(Nesting::Open.delta(), 1);
        assert_eq!(Nesting::SelfContained.delta(), 0);
        assert_eq!(Nesting::Close.delta(), -1);
    }

    #[test]
    fn test_attr_set_replaces() {
        let mut token = Token::new(TokenType::Fence, "code", Nesting::SelfContained);
        token.attr_set("id", "first");
        token.attr_set("id", "second");
        assert_eq!(token.attr_get("id"), Some("second"));
        assert_eq!(token.attrs.len(), 1);
    }

    #[test]
    fn test_attr_join_appends() {
        let mut token = Token::new(TokenType::ParagraphOpen, "p", Nesting::Open);
        token.attr_join("class", "lead");
        token.attr_join("class", "highlight");
        assert_eq!(token.attr_get("class"), Some("lead highlight"));
    }

    #[test]
    fn test_attr_order_is_preserved() {
        let mut token = Token::new(TokenType::HeadingOpen, "h1", Nesting::Open);
        token.attr_set("id", "intro");
        token.attr_set("class", "title");
        token.attr_set("data-line", "0");
        let keys: Vec<&str> = token.attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "class", "data-line"]);
    }
}
