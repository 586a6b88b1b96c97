/// Inline pass of the tokenizer.
///
/// Parses the raw content of an `Inline` carrier token into child tokens:
/// text, emphasis, strong, strikethrough, `==highlight==`, code spans, links,
/// images, soft/hard breaks and (optionally) inline HTML. The scanner never
/// fails; any markup it cannot close degrades to literal text.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::ParserConfig;
use crate::token::{Nesting, Token, TokenType};

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(?:/?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>]*?)?/?|!--.*?--)>").expect("html tag regex")
});

/// Parses inline markup into a child token array.
pub fn parse_inline(content: &str, config: &ParserConfig) -> Vec<Token> {
    let mut scanner = InlineScanner {
        config,
        level: 0,
        out: Vec::new(),
    };
    scanner.scan(content, 0);
    scanner.out
}

struct InlineScanner<'cfg> {
    config: &'cfg ParserConfig,
    level: usize,
    out: Vec<Token>,
}

impl InlineScanner<'_> {
    fn scan(&mut self, src: &str, depth: usize) {
        if depth > self.config.max_nesting_depth {
            let mut literal = src.to_string();
            self.flush_text(&mut literal);
            return;
        }

        let mut text = String::new();
        let mut pos = 0;
        while pos < src.len() {
            let rest = &src[pos..];
            let ch = match rest.chars().next() {
                Some(ch) => ch,
                None => break,
            };

            match ch {
                '\\' => {
                    let mut chars = rest.chars();
                    chars.next();
                    match chars.next() {
                        Some('\n') => {
                            self.flush_text(&mut text);
                            self.push_break(TokenType::Hardbreak, "br");
                            pos += 2;
                        }
                        Some(next) if next.is_ascii_punctuation() => {
                            text.push(next);
                            pos += 1 + next.len_utf8();
                        }
                        _ => {
                            text.push('\\');
                            pos += 1;
                        }
                    }
                }
                '\n' => {
                    let hard = text.ends_with("  ");
                    while text.ends_with(' ') {
                        text.pop();
                    }
                    self.flush_text(&mut text);
                    if hard {
                        self.push_break(TokenType::Hardbreak, "br");
                    } else {
                        self.push_break(TokenType::Softbreak, "");
                    }
                    pos += 1;
                    // Leading indentation of the next line is presentational.
                    pos += src[pos..].len() - src[pos..].trim_start_matches(' ').len();
                }
                '`' => {
                    let run = run_length(rest, '`');
                    match find_code_close(&rest[run..], run) {
                        Some(close) => {
                            self.flush_text(&mut text);
                            let body = &rest[run..run + close];
                            let mut token =
                                Token::new(TokenType::CodeInline, "code", Nesting::SelfContained);
                            token.level = self.level;
                            token.markup = "`".repeat(run);
                            token.content = trim_code_span(body).to_string();
                            self.out.push(token);
                            pos += run + close + run;
                        }
                        None => {
                            text.push_str(&rest[..run]);
                            pos += run;
                        }
                    }
                }
                '=' if self.config.highlight && rest.starts_with("==") => {
                    if !self.try_paired(rest, '=', 2, TokenType::MarkOpen, TokenType::MarkClose, "mark", &mut text, &mut pos, depth) {
                        text.push('=');
                        pos += 1;
                    }
                }
                '~' if rest.starts_with("~~") => {
                    if !self.try_paired(rest, '~', 2, TokenType::SOpen, TokenType::SClose, "s", &mut text, &mut pos, depth) {
                        text.push('~');
                        pos += 1;
                    }
                }
                '*' | '_' => {
                    if !self.try_emphasis(rest, ch, &mut text, &mut pos, depth) {
                        let run = run_length(rest, ch);
                        text.push_str(&rest[..run]);
                        pos += run;
                    }
                }
                '!' if rest.starts_with("![") => {
                    match parse_link_parts(&rest[1..]) {
                        Some(parts) => {
                            self.flush_text(&mut text);
                            let mut token =
                                Token::new(TokenType::Image, "img", Nesting::SelfContained);
                            token.level = self.level;
                            token.markup = "![".to_string();
                            token.attr_set("src", parts.destination);
                            if let Some(title) = parts.title {
                                token.attr_set("title", title);
                            }
                            token.content = parts.label.clone();
                            token.children = Some(vec![Token::text(parts.label)]);
                            self.out.push(token);
                            pos += 1 + parts.consumed;
                        }
                        None => {
                            text.push('!');
                            pos += 1;
                        }
                    }
                }
                '[' => match parse_link_parts(rest) {
                    Some(parts) => {
                        self.flush_text(&mut text);
                        let mut open = Token::new(TokenType::LinkOpen, "a", Nesting::Open);
                        open.level = self.level;
                        open.attr_set("href", parts.destination);
                        if let Some(title) = parts.title {
                            open.attr_set("title", title);
                        }
                        self.out.push(open);
                        self.level += 1;
                        self.scan(&parts.label, depth + 1);
                        self.level -= 1;
                        let mut close = Token::new(TokenType::LinkClose, "a", Nesting::Close);
                        close.level = self.level;
                        self.out.push(close);
                        pos += parts.consumed;
                    }
                    None => {
                        text.push('[');
                        pos += 1;
                    }
                },
                '<' if self.config.preserve_html => {
                    match HTML_TAG_RE.find(rest) {
                        Some(found) => {
                            self.flush_text(&mut text);
                            let mut token =
                                Token::new(TokenType::HtmlInline, "", Nesting::SelfContained);
                            token.level = self.level;
                            token.content = found.as_str().to_string();
                            self.out.push(token);
                            pos += found.end();
                        }
                        None => {
                            text.push('<');
                            pos += 1;
                        }
                    }
                }
                _ => {
                    text.push(ch);
                    pos += ch.len_utf8();
                }
            }
        }
        self.flush_text(&mut text);
    }

    fn flush_text(&mut self, text: &mut String) {
        if text.is_empty() {
            return;
        }
        let mut token = Token::text(std::mem::take(text));
        token.level = self.level;
        self.out.push(token);
    }

    fn push_break(&mut self, token_type: TokenType, tag: &str) {
        let mut token = Token::new(token_type, tag, Nesting::SelfContained);
        token.level = self.level;
        self.out.push(token);
    }

    /// Emits a `open inner close` triple for two-character paired delimiters
    /// (`==`, `~~`). Returns false when no closing delimiter exists.
    #[allow(clippy::too_many_arguments)]
    fn try_paired(
        &mut self,
        rest: &str,
        marker: char,
        count: usize,
        open_type: TokenType,
        close_type: TokenType,
        tag: &str,
        text: &mut String,
        pos: &mut usize,
        depth: usize,
    ) -> bool {
        let inner_start = marker.len_utf8() * count;
        let close = match find_delimiter_close(&rest[inner_start..], marker, count) {
            Some(close) if close > 0 => close,
            _ => return false,
        };

        self.flush_text(text);
        let markup: String = std::iter::repeat(marker).take(count).collect();

        let mut open = Token::new(open_type, tag, Nesting::Open);
        open.level = self.level;
        open.markup = markup.clone();
        self.out.push(open);

        self.level += 1;
        let inner = rest[inner_start..inner_start + close].to_string();
        self.scan(&inner, depth + 1);
        self.level -= 1;

        let mut close_token = Token::new(close_type, tag, Nesting::Close);
        close_token.level = self.level;
        close_token.markup = markup;
        self.out.push(close_token);

        *pos += inner_start + close + marker.len_utf8() * count;
        true
    }

    /// Emphasis and strong emphasis for `*`/`_` runs. Runs of three or more
    /// markers try `em(strong(..))` first, then strong, then em.
    fn try_emphasis(
        &mut self,
        rest: &str,
        marker: char,
        text: &mut String,
        pos: &mut usize,
        depth: usize,
    ) -> bool {
        let run = run_length(rest, marker);

        if run >= 3 && self.try_em_strong(rest, marker, text, pos, depth) {
            return true;
        }
        if run >= 2
            && self.try_paired(
                rest,
                marker,
                2,
                TokenType::StrongOpen,
                TokenType::StrongClose,
                "strong",
                text,
                pos,
                depth,
            )
        {
            return true;
        }
        self.try_paired(
            rest,
            marker,
            1,
            TokenType::EmOpen,
            TokenType::EmClose,
            "em",
            text,
            pos,
            depth,
        )
    }

    fn try_em_strong(
        &mut self,
        rest: &str,
        marker: char,
        text: &mut String,
        pos: &mut usize,
        depth: usize,
    ) -> bool {
        let inner_start = marker.len_utf8() * 3;
        let close = match find_delimiter_close(&rest[inner_start..], marker, 3) {
            Some(close) if close > 0 => close,
            _ => return false,
        };

        self.flush_text(text);
        let single: String = marker.to_string();
        let double: String = std::iter::repeat(marker).take(2).collect();

        let mut em_open = Token::new(TokenType::EmOpen, "em", Nesting::Open);
        em_open.level = self.level;
        em_open.markup = single.clone();
        self.out.push(em_open);
        self.level += 1;

        let mut strong_open = Token::new(TokenType::StrongOpen, "strong", Nesting::Open);
        strong_open.level = self.level;
        strong_open.markup = double.clone();
        self.out.push(strong_open);
        self.level += 1;

        let inner = rest[inner_start..inner_start + close].to_string();
        self.scan(&inner, depth + 1);

        self.level -= 1;
        let mut strong_close = Token::new(TokenType::StrongClose, "strong", Nesting::Close);
        strong_close.level = self.level;
        strong_close.markup = double;
        self.out.push(strong_close);

        self.level -= 1;
        let mut em_close = Token::new(TokenType::EmClose, "em", Nesting::Close);
        em_close.level = self.level;
        em_close.markup = single;
        self.out.push(em_close);

        *pos += inner_start + close + marker.len_utf8() * 3;
        true
    }
}

fn run_length(src: &str, marker: char) -> usize {
    src.chars().take_while(|&c| c == marker).count() * marker.len_utf8()
}

/// Finds the byte offset (within `src`) of a closing delimiter run for the
/// given marker repeated `count` times. Longer runs of the same marker inside
/// the span are skipped whole so `*a **b** c*` closes at the final single
/// marker.
fn find_delimiter_close(src: &str, marker: char, count: usize) -> Option<usize> {
    let marker_len = marker.len_utf8();
    let mut pos = 0;
    while pos < src.len() {
        let rest = &src[pos..];
        let ch = rest.chars().next()?;
        if ch == '\\' {
            pos += 1;
            if let Some(next) = src[pos..].chars().next() {
                pos += next.len_utf8();
            }
            continue;
        }
        if ch == marker {
            let run = run_length(rest, marker) / marker_len;
            if run >= count && !(count == 1 && run >= 2) {
                return Some(pos);
            }
            pos += run * marker_len;
            continue;
        }
        pos += ch.len_utf8();
    }
    None
}

/// Finds the closing backtick run of exactly `count` backticks.
fn find_code_close(src: &str, count: usize) -> Option<usize> {
    let mut pos = 0;
    while pos < src.len() {
        let rest = &src[pos..];
        let ch = rest.chars().next()?;
        if ch == '`' {
            let run = run_length(rest, '`');
            if run == count {
                return Some(pos);
            }
            pos += run;
            continue;
        }
        pos += ch.len_utf8();
    }
    None
}

/// Strips one leading and one trailing space from a code span when both are
/// present and the content is not all spaces.
fn trim_code_span(body: &str) -> &str {
    if body.len() >= 2
        && body.starts_with(' ')
        && body.ends_with(' ')
        && body.chars().any(|c| c != ' ')
    {
        &body[1..body.len() - 1]
    } else {
        body
    }
}

struct LinkParts {
    label: String,
    destination: String,
    title: Option<String>,
    /// Bytes consumed from the opening `[` through the closing `)`.
    consumed: usize,
}

/// Parses `[label](destination "title")` starting at the opening bracket.
fn parse_link_parts(src: &str) -> Option<LinkParts> {
    let mut depth = 0usize;
    let mut label_end = None;
    let mut escaped = false;
    for (offset, ch) in src.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    label_end = Some(offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let label_end = label_end?;
    let label = src[1..label_end].to_string();

    let after = &src[label_end + 1..];
    if !after.starts_with('(') {
        return None;
    }
    let close = find_paren_close(after)?;
    let inner = after[1..close].trim();

    let (destination, title) = match inner.find(|c: char| c.is_whitespace()) {
        Some(split) => {
            let dest = &inner[..split];
            let rest = inner[split..].trim();
            let title = rest
                .strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .or_else(|| rest.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')));
            match title {
                Some(title) => (dest.to_string(), Some(title.to_string())),
                // Whitespace without a quoted title is not a destination.
                None => return None,
            }
        }
        None => (inner.to_string(), None),
    };

    Some(LinkParts {
        label,
        destination,
        title,
        consumed: label_end + 1 + close + 1,
    })
}

fn find_paren_close(src: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (offset, ch) in src.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}
