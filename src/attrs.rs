// Attribute-extension engine: scans the token stream for curly-brace
// attribute annotations ({.class #id key=val}) and reassigns them onto the
// correct structural token.
mod patterns;
mod syntax;

pub use patterns::patterns;
pub use syntax::{curly_only, curly_prefix, curly_suffix, parse_attr_list};

use crate::token::{Nesting, Token, TokenType};
use crate::utils::escape_regex;
use once_cell::sync::OnceCell;
use regex::Regex;

/// An attribute name/value pair as parsed from curly syntax.
pub type AttrPair = (String, String);

/// Allow-list entry for attribute keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedAttribute {
    /// The key must match exactly.
    Exact(&'static str),
    /// The key must start with this prefix (e.g. `data-`).
    Prefix(&'static str),
}

/// Configuration for the attribute-extension engine.
#[derive(Debug, Clone)]
pub struct AttrsConfig {
    /// Left delimiter of the attribute span.
    pub left_delimiter: String,
    /// Right delimiter of the attribute span.
    pub right_delimiter: String,
    /// Keys that survive filtering; anything else is dropped silently.
    pub allowed: Vec<AllowedAttribute>,
    /// Lazily built thematic-break regex. Set the delimiters before the
    /// first pattern run; the cache is filled on first use.
    hr_curly_re: OnceCell<Regex>,
}

impl Default for AttrsConfig {
    fn default() -> Self {
        Self {
            left_delimiter: "{".to_string(),
            right_delimiter: "}".to_string(),
            allowed: vec![
                AllowedAttribute::Exact("class"),
                AllowedAttribute::Exact("id"),
                AllowedAttribute::Exact("style"),
                AllowedAttribute::Exact("colspan"),
                AllowedAttribute::Exact("rowspan"),
                AllowedAttribute::Exact("start"),
                AllowedAttribute::Exact("title"),
                AllowedAttribute::Exact("alt"),
                AllowedAttribute::Exact("align"),
                AllowedAttribute::Exact("width"),
                AllowedAttribute::Exact("height"),
                AllowedAttribute::Exact("dir"),
                AllowedAttribute::Exact("lang"),
                AllowedAttribute::Prefix("data-"),
                AllowedAttribute::Prefix("aria-"),
            ],
            hr_curly_re: OnceCell::new(),
        }
    }
}

impl AttrsConfig {
    /// Returns true if the given attribute key is on the allow-list.
    pub fn is_allowed(&self, key: &str) -> bool {
        self.allowed.iter().any(|entry| match entry {
            AllowedAttribute::Exact(name) => key == *name,
            AllowedAttribute::Prefix(prefix) => key.starts_with(prefix),
        })
    }

    /// The delimiter-aware regex matching a thematic break followed by a
    /// curly span. Compiled once per config, on first use.
    fn hr_curly_regex(&self) -> &Regex {
        self.hr_curly_re.get_or_init(|| {
            let pattern = format!(
                r"^(?:(?:-[ \t]*){{3,}}|(?:_[ \t]*){{3,}}|(?:\*[ \t]*){{3,}}){}[^{}{}]+{}$",
                escape_regex(&self.left_delimiter),
                escape_regex(&self.left_delimiter),
                escape_regex(&self.right_delimiter),
                escape_regex(&self.right_delimiter),
            );
            Regex::new(&pattern).expect("hr curly regex")
        })
    }
}

/// A positional test: the rule is evaluated against the token at
/// `index + offset`.
#[derive(Debug, Clone)]
pub struct PositionedTest {
    pub offset: isize,
    pub rule: DetectingRule,
}

/// Tagged predicate over a token, used by pattern tests. Keeping this a
/// closed enum makes pattern coverage exhaustively checkable.
#[derive(Debug, Clone)]
pub enum DetectingRule {
    /// Token type equals the given type.
    TypeIs(TokenType),
    /// Token type is one of the given types.
    TypeOneOf(&'static [TokenType]),
    /// Token nesting direction equals the given direction.
    NestingIs(Nesting),
    /// The fence info string ends with a parseable curly span.
    InfoEndsWithCurly,
    /// The last child is a text token ending with a parseable curly span.
    LastChildEndsWithCurly,
    /// The last child is a text token consisting solely of a curly span.
    LastChildIsOnlyCurly,
    /// The second-to-last child is a softbreak.
    SoftbreakBeforeLastChild,
    /// Some child of one of the given types is immediately followed by a
    /// text child starting with a curly span.
    ChildOfTypeThenCurly(&'static [TokenType]),
    /// A closing child is immediately followed by a text child starting
    /// with a curly span.
    CloserThenCurly,
    /// The token has exactly one text child holding a thematic break
    /// followed by a curly span ("--- {.class}").
    ContentIsHrWithCurly,
    /// Negation of a nested rule.
    Not(Box<DetectingRule>),
}

impl DetectingRule {
    /// Evaluates this rule against a single token.
    pub fn check(&self, token: &Token, config: &AttrsConfig) -> bool {
        match self {
            DetectingRule::TypeIs(token_type) => token.token_type == *token_type,
            DetectingRule::TypeOneOf(types) => types.contains(&token.token_type),
            DetectingRule::NestingIs(nesting) => token.nesting == *nesting,
            DetectingRule::InfoEndsWithCurly => {
                curly_suffix(token.info.trim_end(), config).is_some()
            }
            DetectingRule::LastChildEndsWithCurly => last_text_child(token)
                .map(|text| curly_suffix(&text.content, config).is_some())
                .unwrap_or(false),
            DetectingRule::LastChildIsOnlyCurly => last_text_child(token)
                .map(|text| curly_only(text.content.trim(), config).is_some())
                .unwrap_or(false),
            DetectingRule::SoftbreakBeforeLastChild => token
                .children
                .as_ref()
                .map(|children| {
                    children.len() >= 2
                        && children[children.len() - 2].token_type == TokenType::Softbreak
                })
                .unwrap_or(false),
            DetectingRule::ChildOfTypeThenCurly(types) => {
                find_child_then_curly(token, config, |child| types.contains(&child.token_type))
                    .is_some()
            }
            DetectingRule::CloserThenCurly => {
                find_child_then_curly(token, config, |child| child.nesting == Nesting::Close)
                    .is_some()
            }
            DetectingRule::ContentIsHrWithCurly => {
                let children = match token.children.as_ref() {
                    Some(children) if children.len() == 1 => children,
                    _ => return false,
                };
                if children[0].token_type != TokenType::Text {
                    return false;
                }
                config.hr_curly_regex().is_match(children[0].content.trim())
            }
            DetectingRule::Not(rule) => !rule.check(token, config),
        }
    }
}

/// Returns the last child when it is a text token.
fn last_text_child(token: &Token) -> Option<&Token> {
    let last = token.children.as_ref()?.last()?;
    if last.token_type == TokenType::Text {
        Some(last)
    } else {
        None
    }
}

/// Finds the index of a child satisfying `predicate` whose next sibling is a
/// text child starting with a parseable curly span.
fn find_child_then_curly(
    token: &Token,
    config: &AttrsConfig,
    predicate: impl Fn(&Token) -> bool,
) -> Option<usize> {
    let children = token.children.as_ref()?;
    for index in 0..children.len().saturating_sub(1) {
        let next = &children[index + 1];
        if predicate(&children[index])
            && next.token_type == TokenType::Text
            && next.content.starts_with(&config.left_delimiter)
            && curly_prefix(&next.content, config).is_some()
        {
            return Some(index);
        }
    }
    None
}

/// A declarative attribute pattern: a name, positional tests and a pure
/// transform producing a replacement token vector.
pub struct AttributePattern {
    pub name: &'static str,
    pub tests: Vec<PositionedTest>,
    pub transform: fn(&[Token], usize, &AttrsConfig) -> Option<Vec<Token>>,
}

impl AttributePattern {
    /// Returns true when every test passes at its offset relative to `index`.
    pub fn matches(&self, tokens: &[Token], index: usize, config: &AttrsConfig) -> bool {
        self.tests.iter().all(|test| {
            let target = index as isize + test.offset;
            if target < 0 {
                return false;
            }
            match tokens.get(target as usize) {
                Some(token) => test.rule.check(token, config),
                None => false,
            }
        })
    }
}

/// Runs every registered pattern over the token stream in priority order.
///
/// Ordering is load-bearing: later patterns assume the delimiters consumed by
/// earlier ones are already gone from `content`. Transforms are pure; a
/// transform returning `None` leaves the stream untouched (silent no-op).
pub fn apply_attribute_patterns(mut tokens: Vec<Token>, config: &AttrsConfig) -> Vec<Token> {
    for pattern in patterns() {
        let mut index = 0;
        while index < tokens.len() {
            if pattern.matches(&tokens, index, config) {
                if let Some(replaced) = (pattern.transform)(&tokens, index, config) {
                    tokens = replaced;
                }
            }
            index += 1;
        }
    }
    tokens
}

/// Drops attribute pairs whose keys are not on the allow-list.
pub fn filter_allowed(attrs: Vec<AttrPair>, config: &AttrsConfig) -> Vec<AttrPair> {
    attrs
        .into_iter()
        .filter(|(key, _)| config.is_allowed(key))
        .collect()
}

/// Applies attribute pairs onto a token. `class` and `style` join onto any
/// existing value; other keys replace.
pub fn apply_attrs(token: &mut Token, attrs: Vec<AttrPair>) {
    for (key, value) in attrs {
        if key == "class" || key == "style" {
            token.attr_join(key, value);
        } else {
            token.attr_set(key, value);
        }
    }
}

/// Strips a trailing curly span from text, removing exactly one trailing
/// space of the remaining content when present (never more).
pub fn strip_curly_suffix(content: &str, config: &AttrsConfig) -> Option<(String, Vec<AttrPair>)> {
    let (start, attrs) = curly_suffix(content, config)?;
    let mut head = content[..start].to_string();
    if head.ends_with(' ') {
        head.pop();
    }
    Some((head, attrs))
}
