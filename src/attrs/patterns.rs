/// The registered attribute patterns, in application order.
///
/// Ordering is fixed and significant: every pattern assumes the delimiters
/// consumed by earlier patterns are already stripped from `content`, so the
/// list below is not freely reorderable.
use super::{
    apply_attrs, curly_only, curly_prefix, curly_suffix, filter_allowed, find_child_then_curly,
    strip_curly_suffix, AttrPair, AttributePattern, AttrsConfig, DetectingRule, PositionedTest,
};
use crate::token::{Nesting, Token, TokenType};
use crate::utils::{hide_token, matching_opening_token};

fn test(offset: isize, rule: DetectingRule) -> PositionedTest {
    PositionedTest { offset, rule }
}

const CELL_OPEN_TYPES: &[TokenType] = &[TokenType::ThOpen, TokenType::TdOpen];
const LEAF_INLINE_TYPES: &[TokenType] = &[TokenType::CodeInline, TokenType::Image];

/// Builds the pattern list in priority order.
pub fn patterns() -> Vec<AttributePattern> {
    vec![
        AttributePattern {
            name: "fenced code blocks",
            tests: vec![
                test(0, DetectingRule::TypeIs(TokenType::Fence)),
                test(0, DetectingRule::InfoEndsWithCurly),
            ],
            transform: fence_transform,
        },
        AttributePattern {
            name: "inline nesting 0",
            tests: vec![
                test(0, DetectingRule::TypeIs(TokenType::Inline)),
                test(0, DetectingRule::ChildOfTypeThenCurly(LEAF_INLINE_TYPES)),
            ],
            transform: inline_leaf_transform,
        },
        AttributePattern {
            name: "tables",
            tests: vec![
                test(0, DetectingRule::TypeIs(TokenType::TableClose)),
                test(1, DetectingRule::TypeIs(TokenType::ParagraphOpen)),
                test(2, DetectingRule::TypeIs(TokenType::Inline)),
                test(2, DetectingRule::LastChildIsOnlyCurly),
                test(3, DetectingRule::TypeIs(TokenType::ParagraphClose)),
            ],
            transform: table_attrs_transform,
        },
        AttributePattern {
            name: "table cell spans",
            tests: vec![
                test(0, DetectingRule::TypeOneOf(CELL_OPEN_TYPES)),
                test(1, DetectingRule::TypeIs(TokenType::Inline)),
                test(1, DetectingRule::LastChildEndsWithCurly),
            ],
            transform: cell_attrs_transform,
        },
        AttributePattern {
            name: "table colsnum",
            tests: vec![test(0, DetectingRule::TypeIs(TokenType::TrClose))],
            transform: colsnum_transform,
        },
        AttributePattern {
            name: "table span collapse",
            tests: vec![test(0, DetectingRule::TypeIs(TokenType::TableOpen))],
            transform: span_collapse_transform,
        },
        AttributePattern {
            name: "inline attributes",
            tests: vec![
                test(0, DetectingRule::TypeIs(TokenType::Inline)),
                test(0, DetectingRule::CloserThenCurly),
            ],
            transform: inline_closer_transform,
        },
        AttributePattern {
            name: "list item end",
            tests: vec![
                test(-2, DetectingRule::TypeIs(TokenType::ListItemOpen)),
                test(-1, DetectingRule::TypeIs(TokenType::ParagraphOpen)),
                test(0, DetectingRule::TypeIs(TokenType::Inline)),
                test(0, DetectingRule::LastChildEndsWithCurly),
                test(
                    0,
                    DetectingRule::Not(Box::new(DetectingRule::LastChildIsOnlyCurly)),
                ),
            ],
            transform: list_item_end_transform,
        },
        AttributePattern {
            name: "list softbreak",
            tests: vec![
                test(-2, DetectingRule::TypeIs(TokenType::ListItemOpen)),
                test(0, DetectingRule::TypeIs(TokenType::Inline)),
                test(0, DetectingRule::SoftbreakBeforeLastChild),
                test(0, DetectingRule::LastChildIsOnlyCurly),
            ],
            transform: list_softbreak_transform,
        },
        AttributePattern {
            name: "horizontal rule",
            tests: vec![
                test(0, DetectingRule::TypeIs(TokenType::ParagraphOpen)),
                test(1, DetectingRule::TypeIs(TokenType::Inline)),
                test(1, DetectingRule::ContentIsHrWithCurly),
                test(2, DetectingRule::TypeIs(TokenType::ParagraphClose)),
            ],
            transform: hr_transform,
        },
        AttributePattern {
            name: "end of block",
            tests: vec![
                test(0, DetectingRule::TypeIs(TokenType::Inline)),
                test(0, DetectingRule::LastChildEndsWithCurly),
                test(-1, DetectingRule::NestingIs(Nesting::Open)),
            ],
            transform: end_of_block_transform,
        },
    ]
}

/// Strips a trailing curly span from the last text child of an inline
/// carrier, dropping the child (and a preceding softbreak) when it becomes
/// empty. Returns the unfiltered attribute pairs.
fn strip_last_child_suffix(inline: &mut Token, config: &AttrsConfig) -> Option<Vec<AttrPair>> {
    let children = inline.children.as_mut()?;
    let last = children.last_mut()?;
    let (head, attrs) = strip_curly_suffix(&last.content, config)?;
    last.content = head;
    if children.last().map(|t| t.content.is_empty()).unwrap_or(false) {
        children.pop();
        let softbreak_last = children
            .last()
            .map(|t| t.token_type == TokenType::Softbreak)
            .unwrap_or(false);
        if softbreak_last {
            children.pop();
        }
    }
    Some(attrs)
}

fn fence_transform(tokens: &[Token], index: usize, config: &AttrsConfig) -> Option<Vec<Token>> {
    let info = tokens[index].info.trim_end().to_string();
    let (start, attrs) = curly_suffix(&info, config)?;

    let mut out = tokens.to_vec();
    let token = &mut out[index];
    token.info = info[..start].trim_end().to_string();
    apply_attrs(token, filter_allowed(attrs, config));
    Some(out)
}

fn inline_leaf_transform(
    tokens: &[Token],
    index: usize,
    config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let child_index = find_child_then_curly(&tokens[index], config, |child| {
        LEAF_INLINE_TYPES.contains(&child.token_type)
    })?;

    let mut out = tokens.to_vec();
    let children = out[index].children.as_mut()?;
    let (consumed, attrs) = curly_prefix(&children[child_index + 1].content, config)?;
    let remainder = children[child_index + 1].content[consumed..].to_string();
    if remainder.is_empty() {
        children.remove(child_index + 1);
    } else {
        children[child_index + 1].content = remainder;
    }
    apply_attrs(&mut children[child_index], filter_allowed(attrs, config));
    Some(out)
}

fn table_attrs_transform(
    tokens: &[Token],
    index: usize,
    config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let attrs = curly_only(tokens[index + 2].content.trim(), config)?;
    let opening = matching_opening_token(tokens, index)?;

    let mut out = tokens.to_vec();
    apply_attrs(&mut out[opening], filter_allowed(attrs, config));
    out.drain(index + 1..index + 4);
    Some(out)
}

fn cell_attrs_transform(
    tokens: &[Token],
    index: usize,
    config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let mut out = tokens.to_vec();
    let attrs = strip_last_child_suffix(&mut out[index + 1], config)?;
    apply_attrs(&mut out[index], filter_allowed(attrs, config));
    Some(out)
}

fn colsnum_transform(tokens: &[Token], index: usize, _config: &AttrsConfig) -> Option<Vec<Token>> {
    let opening = matching_opening_token(tokens, index)?;
    let cell_level = tokens[opening].level + 1;

    let mut cell_count = 0usize;
    let mut covered = 0usize;
    for token in &tokens[opening + 1..index] {
        if CELL_OPEN_TYPES.contains(&token.token_type) && token.level == cell_level {
            cell_count += 1;
            covered += cell_colspan(token);
        }
    }
    if covered == cell_count {
        return None;
    }

    let mut out = tokens.to_vec();
    out[opening].attr_set("colsnum", covered.to_string());
    Some(out)
}

fn cell_colspan(token: &Token) -> usize {
    token
        .attr_get("colspan")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

fn cell_rowspan(token: &Token) -> usize {
    token
        .attr_get("rowspan")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Consumes the `colsnum` metadata computed by the previous pass and hides
/// the cells that would overflow the table's column count. Cells spanned by
/// a `rowspan` from an earlier row reduce the columns available to the rows
/// below it.
fn span_collapse_transform(
    tokens: &[Token],
    index: usize,
    _config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let table_level = tokens[index].level;
    let close = (index + 1..tokens.len()).find(|&j| {
        tokens[j].token_type == TokenType::TableClose && tokens[j].level == table_level
    })?;

    let has_spans = tokens[index..=close].iter().any(|token| {
        (CELL_OPEN_TYPES.contains(&token.token_type)
            && (token.attr_get("colspan").is_some() || token.attr_get("rowspan").is_some()))
            || (token.token_type == TokenType::TrOpen && token.attr_get("colsnum").is_some())
    });
    if !has_spans {
        return None;
    }

    let mut out = tokens.to_vec();
    let columns = out[index..=close]
        .iter()
        .filter(|token| token.token_type == TokenType::ThOpen)
        .count();

    // (rows remaining, columns occupied) for active rowspans.
    let mut carries: Vec<(usize, usize)> = Vec::new();
    let mut cursor = index + 1;
    while cursor < close {
        if out[cursor].token_type != TokenType::TrOpen {
            cursor += 1;
            continue;
        }
        let row_level = out[cursor].level;
        let row_close = (cursor + 1..close)
            .find(|&j| out[j].token_type == TokenType::TrClose && out[j].level == row_level)
            .unwrap_or(close);

        let carried: usize = carries.iter().map(|(_, width)| *width).sum();
        let available = columns.saturating_sub(carried);

        let mut coverage = 0usize;
        let mut new_carries: Vec<(usize, usize)> = Vec::new();
        let mut cell = cursor + 1;
        while cell < row_close {
            if !CELL_OPEN_TYPES.contains(&out[cell].token_type) || out[cell].level != row_level + 1
            {
                cell += 1;
                continue;
            }
            let cell_close = (cell + 1..row_close)
                .find(|&j| {
                    matches!(
                        out[j].token_type,
                        TokenType::ThClose | TokenType::TdClose
                    ) && out[j].level == row_level + 1
                })
                .unwrap_or(row_close);

            if coverage >= available {
                for token in &mut out[cell..=cell_close] {
                    hide_token(token);
                }
            } else {
                let width = cell_colspan(&out[cell]);
                coverage += width;
                let rows = cell_rowspan(&out[cell]);
                if rows > 1 {
                    new_carries.push((rows - 1, width));
                }
            }
            cell = cell_close + 1;
        }

        carries.retain_mut(|(remaining, _)| {
            *remaining -= 1;
            *remaining > 0
        });
        carries.extend(new_carries);

        if let Some(attr_index) = out[cursor].attr_index("colsnum") {
            out[cursor].attrs.remove(attr_index);
        }
        cursor = row_close + 1;
    }
    Some(out)
}

fn inline_closer_transform(
    tokens: &[Token],
    index: usize,
    config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let inline = &tokens[index];
    let closer = find_child_then_curly(inline, config, |child| child.nesting == Nesting::Close)?;
    let children_ref = inline.children.as_ref()?;
    let (consumed, attrs) = curly_prefix(&children_ref[closer + 1].content, config)?;
    let opening = matching_opening_token(children_ref, closer)?;

    let mut out = tokens.to_vec();
    let children = out[index].children.as_mut()?;
    let remainder = children[closer + 1].content[consumed..].to_string();
    if remainder.is_empty() {
        children.remove(closer + 1);
    } else {
        children[closer + 1].content = remainder;
    }
    apply_attrs(&mut children[opening], filter_allowed(attrs, config));
    Some(out)
}

fn list_item_end_transform(
    tokens: &[Token],
    index: usize,
    config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let mut out = tokens.to_vec();
    let attrs = strip_last_child_suffix(&mut out[index], config)?;
    apply_attrs(&mut out[index - 2], filter_allowed(attrs, config));
    Some(out)
}

fn list_softbreak_transform(
    tokens: &[Token],
    index: usize,
    config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let last = tokens[index].children.as_ref()?.last()?;
    let attrs = curly_only(last.content.trim(), config)?;

    // The annotation applies to the list containing the item, not the item.
    let item_level = tokens[index - 2].level;
    let list_index = (0..index - 2).rev().find(|&j| {
        matches!(
            tokens[j].token_type,
            TokenType::BulletListOpen | TokenType::OrderedListOpen
        ) && tokens[j].level + 1 == item_level
    })?;

    let mut out = tokens.to_vec();
    let children = out[index].children.as_mut()?;
    children.pop();
    let softbreak_last = children
        .last()
        .map(|t| t.token_type == TokenType::Softbreak)
        .unwrap_or(false);
    if softbreak_last {
        children.pop();
    }
    apply_attrs(&mut out[list_index], filter_allowed(attrs, config));
    Some(out)
}

fn hr_transform(tokens: &[Token], index: usize, config: &AttrsConfig) -> Option<Vec<Token>> {
    let children = tokens[index + 1].children.as_ref()?;
    let text = children.first()?.content.trim();
    let (_, attrs) = curly_suffix(text, config)?;

    let mut hr = Token::new(TokenType::Hr, "hr", Nesting::SelfContained);
    hr.block = true;
    hr.level = tokens[index].level;
    hr.map = tokens[index].map;
    hr.markup = text.chars().next().unwrap_or('-').to_string().repeat(3);
    apply_attrs(&mut hr, filter_allowed(attrs, config));

    let mut out = tokens.to_vec();
    out.splice(index..index + 3, std::iter::once(hr));
    Some(out)
}

fn end_of_block_transform(
    tokens: &[Token],
    index: usize,
    config: &AttrsConfig,
) -> Option<Vec<Token>> {
    let mut out = tokens.to_vec();
    let attrs = strip_last_child_suffix(&mut out[index], config)?;
    apply_attrs(&mut out[index - 1], filter_allowed(attrs, config));
    Some(out)
}
