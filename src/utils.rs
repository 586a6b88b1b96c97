/// Shared token-stream primitives used by the attribute-extension engine.
use crate::token::{Nesting, Token};

/// Escapes regex metacharacters in a literal string so it can be embedded in
/// a dynamically built pattern (e.g. delimiter-aware attribute regexes).
pub fn escape_regex(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(
            ch,
            '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Finds the index of the opening token that balances the closing token at
/// `closing_index`, scanning strictly backward while tracking nesting depth.
///
/// Returns `None` when `closing_index` does not point at a closing token or
/// the array is unbalanced. Malformed input is defensive, never a panic.
pub fn matching_opening_token(tokens: &[Token], closing_index: usize) -> Option<usize> {
    let closing = tokens.get(closing_index)?;
    if closing.nesting != Nesting::Close {
        return None;
    }

    let mut depth: i32 = 0;
    for index in (0..closing_index).rev() {
        let token = &tokens[index];
        match token.nesting {
            Nesting::Close => depth += 1,
            Nesting::Open => {
                if depth == 0 {
                    if token.level == closing.level {
                        return Some(index);
                    }
                    return None;
                }
                depth -= 1;
            }
            Nesting::SelfContained => {}
        }
    }
    None
}

/// Recursively marks a token and all its descendants hidden, clearing their
/// content. Used when collapsing table cells spanned by `colspan`/`rowspan`.
pub fn hide_token(token: &mut Token) {
    token.hidden = true;
    token.content.clear();
    if let Some(children) = token.children.as_mut() {
        for child in children {
            hide_token(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn open(token_type: TokenType, tag: &str, level: usize) -> Token {
        let mut token = Token::new(token_type, tag, Nesting::Open);
        token.level = level;
        token
    }

    fn close(token_type: TokenType, tag: &str, level: usize) -> Token {
        let mut token = Token::new(token_type, tag, Nesting::Close);
        token.level = level;
        token
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("{.a}"), "\\{\\.a\\}");
        assert_eq!(escape_regex("plain"), "plain");
        assert_eq!(escape_regex("a+b*c"), "a\\+b\\*c");
    }

    #[test]
    fn test_matching_opening_token_nested() {
        // <li><strong>text</strong></li>
        let tokens = vec![
            open(TokenType::ListItemOpen, "li", 0),
            open(TokenType::StrongOpen, "strong", 1),
            Token::text("bold"),
            close(TokenType::StrongClose, "strong", 1),
            close(TokenType::ListItemClose, "li", 0),
        ];

        assert_eq!(matching_opening_token(&tokens, 4), Some(0));
        assert_eq!(matching_opening_token(&tokens, 3), Some(1));
    }

    #[test]
    fn test_matching_opening_token_rejects_non_closing() {
        let tokens = vec![open(TokenType::ParagraphOpen, "p", 0), Token::text("x")];
        assert_eq!(matching_opening_token(&tokens, 0), None);
        assert_eq!(matching_opening_token(&tokens, 1), None);
        assert_eq!(matching_opening_token(&tokens, 99), None);
    }

    #[test]
    fn test_matching_opening_token_unbalanced() {
        let tokens = vec![Token::text("x"), close(TokenType::ParagraphClose, "p", 0)];
        assert_eq!(matching_opening_token(&tokens, 1), None);
    }

    /// Generates a random balanced token sequence, appending self-contained
    /// text tokens along the way, and records the opener index paired with
    /// each closer.
    fn generate_balanced(rng: &mut StdRng, tokens: &mut Vec<Token>, pairs: &mut Vec<(usize, usize)>, level: usize, budget: &mut usize) {
        while *budget > 0 {
            match rng.gen_range(0..4) {
                0 => {
                    tokens.push(Token::text("t"));
                    *budget -= 1;
                }
                1 if level > 0 => return,
                _ => {
                    *budget -= 1;
                    let opener_index = tokens.len();
                    tokens.push(open(TokenType::StrongOpen, "strong", level));
                    generate_balanced(rng, tokens, pairs, level + 1, budget);
                    let closer_index = tokens.len();
                    tokens.push(close(TokenType::StrongClose, "strong", level));
                    pairs.push((opener_index, closer_index));
                }
            }
        }
    }

    #[test]
    fn test_matching_opening_token_property() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let mut tokens = Vec::new();
            let mut pairs = Vec::new();
            let mut budget = rng.gen_range(1..40);
            generate_balanced(&mut rng, &mut tokens, &mut pairs, 0, &mut budget);

            for (opener_index, closer_index) in pairs {
                let found = matching_opening_token(&tokens, closer_index)
                    .expect("balanced sequence must resolve");
                assert_eq!(found, opener_index);
                assert_eq!(tokens[found].nesting, Nesting::Open);
                assert_eq!(tokens[closer_index].nesting, Nesting::Close);
                assert_eq!(tokens[found].level, tokens[closer_index].level);
            }
        }
    }

    #[test]
    fn test_hide_token_recursive() {
        let mut inline = Token::new(TokenType::Inline, "", Nesting::SelfContained);
        inline.content = "cell".to_string();
        inline.children = Some(vec![Token::text("cell")]);

        hide_token(&mut inline);

        assert!(inline.hidden);
        assert!(inline.content.is_empty());
        let children = inline.children.as_ref().unwrap();
        assert!(children[0].hidden);
        assert!(children[0].content.is_empty());
    }
}
