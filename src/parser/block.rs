/// Block-level pass of the tokenizer.
///
/// Walks the input line by line and emits paired open/close tokens for
/// container blocks, `Fence`/`Hr`/`HtmlBlock` leaves, and `Inline` carrier
/// tokens whose content is handled by the inline pass afterwards.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::ParserConfig;
use crate::token::{Nesting, Token, TokenType};

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*))?$").expect("heading regex"));
static HEADING_TRAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+#+[ \t]*$").expect("heading trail regex"));
static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})[ \t]*(.*)$").expect("fence regex"));
static HR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}((?:-[ \t]*){3,}|(?:_[ \t]*){3,}|(?:\*[ \t]*){3,})$").expect("hr regex")
});
static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( {0,3})([-+*])(?:[ \t]+(.*))?$").expect("bullet regex"));
static ORDERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( {0,3})(\d{1,9})([.)])(?:[ \t]+(.*))?$").expect("ordered regex"));
static TABLE_DELIM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}\|?[ \t]*:?-+:?[ \t]*(?:\|[ \t]*:?-+:?[ \t]*)*\|?[ \t]*$")
        .expect("table delimiter regex")
});
static HTML_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}<(?:/?[A-Za-z][A-Za-z0-9-]*|!--)").expect("html regex"));

/// A parsed list marker.
struct ListMarker<'line> {
    ordered: bool,
    marker: String,
    start: u64,
    /// Column where the item content begins; continuation lines must be
    /// indented at least this far.
    content_indent: usize,
    content: &'line str,
}

fn parse_list_marker(line: &str) -> Option<ListMarker<'_>> {
    if let Some(caps) = BULLET_RE.captures(line) {
        let indent = caps.get(1).map_or(0, |m| m.as_str().len());
        let content = caps.get(3).map_or("", |m| m.as_str());
        return Some(ListMarker {
            ordered: false,
            marker: caps[2].to_string(),
            start: 0,
            content_indent: indent + 2,
            content,
        });
    }
    if let Some(caps) = ORDERED_RE.captures(line) {
        let indent = caps.get(1).map_or(0, |m| m.as_str().len());
        let digits = &caps[2];
        let content = caps.get(4).map_or("", |m| m.as_str());
        return Some(ListMarker {
            ordered: true,
            marker: caps[3].to_string(),
            start: digits.parse().unwrap_or(1),
            content_indent: indent + digits.len() + 2,
            content,
        });
    }
    None
}

/// Block-level tokenizer over a borrowed configuration.
pub struct BlockParser<'cfg> {
    config: &'cfg ParserConfig,
}

impl<'cfg> BlockParser<'cfg> {
    pub fn new(config: &'cfg ParserConfig) -> Self {
        Self { config }
    }

    /// Tokenizes the full input into block-level tokens.
    pub fn parse(&self, input: &str) -> Vec<Token> {
        let lines: Vec<&str> = input.split('\n').collect();
        let mut tokens = Vec::new();
        let mut level = 0usize;
        self.parse_lines(&lines, 0, &mut level, &mut tokens);
        tokens
    }

    fn parse_lines(
        &self,
        lines: &[&str],
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) {
        let mut index = 0;
        while index < lines.len() {
            if lines[index].trim().is_empty() {
                index += 1;
                continue;
            }

            if let Some(consumed) = self.try_fence(lines, index, line_offset, level, out) {
                index += consumed;
                continue;
            }
            if let Some(consumed) = self.try_heading(lines, index, line_offset, level, out) {
                index += consumed;
                continue;
            }
            if let Some(consumed) = self.try_hr(lines, index, line_offset, level, out) {
                index += consumed;
                continue;
            }
            if let Some(consumed) = self.try_blockquote(lines, index, line_offset, level, out) {
                index += consumed;
                continue;
            }
            if self.config.tables {
                if let Some(consumed) = self.try_table(lines, index, line_offset, level, out) {
                    index += consumed;
                    continue;
                }
            }
            if let Some(consumed) = self.try_list(lines, index, line_offset, level, out) {
                index += consumed;
                continue;
            }
            if self.config.preserve_html {
                if let Some(consumed) = self.try_html_block(lines, index, line_offset, level, out) {
                    index += consumed;
                    continue;
                }
            }

            index += self.consume_paragraph(lines, index, line_offset, level, out);
        }
    }

    fn open_token(
        &self,
        token_type: TokenType,
        tag: &str,
        level: &mut usize,
        map: Option<(usize, usize)>,
    ) -> Token {
        let mut token = Token::new(token_type, tag, Nesting::Open);
        token.block = true;
        token.level = *level;
        token.map = map;
        *level += 1;
        token
    }

    fn close_token(&self, token_type: TokenType, tag: &str, level: &mut usize) -> Token {
        *level = level.saturating_sub(1);
        let mut token = Token::new(token_type, tag, Nesting::Close);
        token.block = true;
        token.level = *level;
        token
    }

    fn inline_token(&self, content: String, level: usize, map: Option<(usize, usize)>) -> Token {
        let mut token = Token::new(TokenType::Inline, "", Nesting::SelfContained);
        token.block = true;
        token.content = content;
        token.level = level;
        token.map = map;
        token
    }

    fn try_fence(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> Option<usize> {
        let caps = FENCE_RE.captures(lines[index])?;
        let fence = caps[1].to_string();
        let fence_char = fence.chars().next().unwrap_or('`');
        let info = caps[2].trim().to_string();
        // An info string on a backtick fence must not contain backticks.
        if fence_char == '`' && info.contains('`') {
            return None;
        }

        let mut body_end = lines.len();
        let mut closed = false;
        for (offset, line) in lines.iter().enumerate().skip(index + 1) {
            let trimmed = line.trim();
            if trimmed.len() >= fence.len()
                && trimmed.chars().all(|ch| ch == fence_char)
            {
                body_end = offset;
                closed = true;
                break;
            }
        }

        let body: Vec<&str> = lines[index + 1..body_end].to_vec();
        let consumed = if closed {
            body_end - index + 1
        } else {
            // Streaming tolerance: an unterminated fence swallows the rest of
            // the input and still yields a token.
            lines.len() - index
        };

        let mut token = Token::new(TokenType::Fence, "code", Nesting::SelfContained);
        token.block = true;
        token.level = *level;
        token.markup = fence;
        token.info = info;
        token.map = Some((line_offset + index, line_offset + index + consumed));
        token.content = if body.is_empty() {
            String::new()
        } else {
            let mut content = body.join("\n");
            content.push('\n');
            content
        };
        out.push(token);
        Some(consumed)
    }

    fn try_heading(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> Option<usize> {
        let caps = HEADING_RE.captures(lines[index])?;
        let marker = caps[1].to_string();
        let tag = format!("h{}", marker.len());
        let raw = caps.get(2).map_or("", |m| m.as_str());
        let content = HEADING_TRAIL_RE.replace(raw.trim_end(), "").into_owned();
        let map = Some((line_offset + index, line_offset + index + 1));

        let mut open = self.open_token(TokenType::HeadingOpen, &tag, level, map);
        open.markup = marker.clone();
        out.push(open);
        out.push(self.inline_token(content, *level, map));
        let mut close = self.close_token(TokenType::HeadingClose, &tag, level);
        close.markup = marker;
        out.push(close);
        Some(1)
    }

    fn try_hr(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> Option<usize> {
        let caps = HR_RE.captures(lines[index])?;
        let mut token = Token::new(TokenType::Hr, "hr", Nesting::SelfContained);
        token.block = true;
        token.level = *level;
        let marker = caps[1].chars().next().unwrap_or('-');
        token.markup = marker.to_string().repeat(3);
        token.map = Some((line_offset + index, line_offset + index + 1));
        out.push(token);
        Some(1)
    }

    fn try_blockquote(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> Option<usize> {
        if !lines[index].trim_start().starts_with('>') {
            return None;
        }

        let mut inner: Vec<&str> = Vec::new();
        let mut end = index;
        while end < lines.len() {
            let trimmed = lines[end].trim_start();
            if let Some(rest) = trimmed.strip_prefix('>') {
                inner.push(rest.strip_prefix(' ').unwrap_or(rest));
                end += 1;
            } else {
                break;
            }
        }

        let map = Some((line_offset + index, line_offset + end));
        let mut open = self.open_token(TokenType::BlockquoteOpen, "blockquote", level, map);
        open.markup = ">".to_string();
        out.push(open);
        self.parse_lines(&inner, line_offset + index, level, out);
        let mut close = self.close_token(TokenType::BlockquoteClose, "blockquote", level);
        close.markup = ">".to_string();
        out.push(close);
        Some(end - index)
    }

    fn try_table(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> Option<usize> {
        if !lines[index].contains('|') {
            return None;
        }
        let delimiter = lines.get(index + 1)?;
        if !delimiter.contains('-') || !TABLE_DELIM_RE.is_match(delimiter) {
            return None;
        }

        let header = split_table_row(lines[index]);
        let aligns: Vec<Option<&'static str>> = split_table_row(delimiter)
            .iter()
            .map(|cell| {
                let cell = cell.trim();
                match (cell.starts_with(':'), cell.ends_with(':')) {
                    (true, true) => Some("center"),
                    (true, false) => Some("left"),
                    (false, true) => Some("right"),
                    (false, false) => None,
                }
            })
            .collect();
        if header.len() != aligns.len() || header.is_empty() {
            return None;
        }

        let columns = aligns.len();
        let mut end = index + 2;
        while end < lines.len() && lines[end].contains('|') && !lines[end].trim().is_empty() {
            end += 1;
        }

        let map = Some((line_offset + index, line_offset + end));
        out.push(self.open_token(TokenType::TableOpen, "table", level, map));
        out.push(self.open_token(TokenType::TheadOpen, "thead", level, map));
        self.emit_table_row(
            &header,
            &aligns,
            columns,
            TokenType::ThOpen,
            TokenType::ThClose,
            "th",
            line_offset + index,
            level,
            out,
        );
        out.push(self.close_token(TokenType::TheadClose, "thead", level));

        if end > index + 2 {
            out.push(self.open_token(TokenType::TbodyOpen, "tbody", level, None));
            for row_index in index + 2..end {
                let cells = split_table_row(lines[row_index]);
                self.emit_table_row(
                    &cells,
                    &aligns,
                    columns,
                    TokenType::TdOpen,
                    TokenType::TdClose,
                    "td",
                    line_offset + row_index,
                    level,
                    out,
                );
            }
            out.push(self.close_token(TokenType::TbodyClose, "tbody", level));
        }
        out.push(self.close_token(TokenType::TableClose, "table", level));
        Some(end - index)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_table_row(
        &self,
        cells: &[String],
        aligns: &[Option<&'static str>],
        columns: usize,
        open_type: TokenType,
        close_type: TokenType,
        tag: &str,
        line: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) {
        let map = Some((line, line + 1));
        out.push(self.open_token(TokenType::TrOpen, "tr", level, map));
        for column in 0..columns {
            let mut open = self.open_token(open_type, tag, level, map);
            if let Some(align) = aligns.get(column).copied().flatten() {
                open.attr_set("style", format!("text-align:{align}"));
            }
            out.push(open);
            let content = cells.get(column).cloned().unwrap_or_default();
            out.push(self.inline_token(content, *level, map));
            out.push(self.close_token(close_type, tag, level));
        }
        out.push(self.close_token(TokenType::TrClose, "tr", level));
    }

    fn try_list(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> Option<usize> {
        let first = parse_list_marker(lines[index])?;
        let ordered = first.ordered;
        let start = first.start;
        let list_marker = first.marker.clone();

        // Collect items: each item is its dedented content lines.
        let mut items: Vec<(Vec<String>, usize)> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_start = index;
        let mut content_indent = first.content_indent;
        let mut loose = false;
        let mut pending_blank = false;
        let mut end = index;

        while end < lines.len() {
            let line = lines[end];
            if line.trim().is_empty() {
                pending_blank = true;
                end += 1;
                continue;
            }
            let indent = line.len() - line.trim_start().len();
            // Lines indented to the item content column belong to the current
            // item, including nested list markers.
            if end > index && indent >= content_indent {
                if pending_blank {
                    loose = true;
                    current.push(String::new());
                    pending_blank = false;
                }
                current.push(line[content_indent..].to_string());
                end += 1;
                continue;
            }
            if let Some(marker) = parse_list_marker(line) {
                if marker.ordered == ordered {
                    if !current.is_empty() {
                        items.push((std::mem::take(&mut current), current_start));
                        if pending_blank {
                            loose = true;
                        }
                    }
                    pending_blank = false;
                    current_start = end;
                    content_indent = marker.content_indent;
                    current.push(marker.content.to_string());
                    end += 1;
                    continue;
                }
                break;
            }
            if pending_blank {
                break;
            }
            // Lazy paragraph continuation.
            if !is_block_start(line, self.config) {
                current.push(line.trim_start().to_string());
                end += 1;
                continue;
            }
            break;
        }
        if !current.is_empty() {
            items.push((current, current_start));
        }
        if items.is_empty() {
            return None;
        }

        let (list_open_type, list_close_type, list_tag) = if ordered {
            (TokenType::OrderedListOpen, TokenType::OrderedListClose, "ol")
        } else {
            (TokenType::BulletListOpen, TokenType::BulletListClose, "ul")
        };

        let map = Some((line_offset + index, line_offset + end));
        let mut list_open = self.open_token(list_open_type, list_tag, level, map);
        list_open.markup = list_marker.clone();
        if ordered && start != 1 {
            list_open.attr_set("start", start.to_string());
        }
        out.push(list_open);

        for (item_lines, item_start) in items {
            let item_map = Some((line_offset + item_start, line_offset + item_start + item_lines.len()));
            let mut item_open = self.open_token(TokenType::ListItemOpen, "li", level, item_map);
            item_open.markup = list_marker.clone();
            out.push(item_open);

            let item_level = *level;
            let item_token_start = out.len();
            let borrowed: Vec<&str> = item_lines.iter().map(String::as_str).collect();
            self.parse_lines(&borrowed, line_offset + item_start, level, out);

            // Tight lists render item content without paragraph wrappers; the
            // paragraph tokens stay in the stream for structural bookkeeping.
            if !loose {
                for token in &mut out[item_token_start..] {
                    let is_paragraph = matches!(
                        token.token_type,
                        TokenType::ParagraphOpen | TokenType::ParagraphClose
                    );
                    if is_paragraph && (token.level == item_level || token.level == item_level + 1)
                    {
                        token.hidden = true;
                    }
                }
            }

            let mut item_close = self.close_token(TokenType::ListItemClose, "li", level);
            item_close.markup = list_marker.clone();
            out.push(item_close);
        }

        let mut list_close = self.close_token(list_close_type, list_tag, level);
        list_close.markup = list_marker;
        out.push(list_close);
        Some(end - index)
    }

    fn try_html_block(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> Option<usize> {
        if !HTML_BLOCK_RE.is_match(lines[index]) {
            return None;
        }
        let mut end = index;
        while end < lines.len() && !lines[end].trim().is_empty() {
            end += 1;
        }
        let mut token = Token::new(TokenType::HtmlBlock, "", Nesting::SelfContained);
        token.block = true;
        token.level = *level;
        token.map = Some((line_offset + index, line_offset + end));
        token.content = {
            let mut content = lines[index..end].join("\n");
            content.push('\n');
            content
        };
        out.push(token);
        Some(end - index)
    }

    fn consume_paragraph(
        &self,
        lines: &[&str],
        index: usize,
        line_offset: usize,
        level: &mut usize,
        out: &mut Vec<Token>,
    ) -> usize {
        let mut end = index + 1;
        while end < lines.len()
            && !lines[end].trim().is_empty()
            && !is_block_start(lines[end], self.config)
            && !is_table_start(lines, end, self.config)
        {
            end += 1;
        }

        let content = lines[index..end]
            .iter()
            .map(|line| line.trim())
            .collect::<Vec<_>>()
            .join("\n");
        let map = Some((line_offset + index, line_offset + end));

        out.push(self.open_token(TokenType::ParagraphOpen, "p", level, map));
        out.push(self.inline_token(content, *level, map));
        out.push(self.close_token(TokenType::ParagraphClose, "p", level));
        end - index
    }
}

/// Returns true if the line opens a non-paragraph block (used to terminate
/// paragraphs and lazy list continuations).
fn is_block_start(line: &str, config: &ParserConfig) -> bool {
    if FENCE_RE.is_match(line)
        || HEADING_RE.is_match(line)
        || HR_RE.is_match(line)
        || line.trim_start().starts_with('>')
        || parse_list_marker(line).is_some()
    {
        return true;
    }
    config.preserve_html && HTML_BLOCK_RE.is_match(line)
}

fn is_table_start(lines: &[&str], index: usize, config: &ParserConfig) -> bool {
    if !config.tables || !lines[index].contains('|') {
        return false;
    }
    lines
        .get(index + 1)
        .map(|next| next.contains('-') && TABLE_DELIM_RE.is_match(next))
        .unwrap_or(false)
}

/// Splits a table row into trimmed cell strings, honoring `\|` escapes.
fn split_table_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut escaped = false;
    for ch in trimmed.chars() {
        if escaped {
            if ch != '|' {
                cell.push('\\');
            }
            cell.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '|' {
            cells.push(cell.trim().to_string());
            cell = String::new();
        } else {
            cell.push(ch);
        }
    }
    if escaped {
        cell.push('\\');
    }
    cells.push(cell.trim().to_string());
    cells
}
