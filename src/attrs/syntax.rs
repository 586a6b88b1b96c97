/// Curly-brace attribute micro-grammar.
///
/// Parses spans like `{.class #id key=val key2="quoted"}` into ordered
/// name/value pairs, plus locator helpers for spans at the start, end, or
/// spanning the whole of a text run.
use nom::branch::alt;
use nom::bytes::complete::{is_not, take_while1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{all_consuming, map, opt};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, separated_pair};
use nom::IResult;

use super::{AttrPair, AttrsConfig};

fn bare_value(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !matches!(c, '{' | '}' | '"' | '\'' | '='))(input)
}

fn key_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | ':'))(input)
}

fn quoted_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(
            char('"'),
            map(opt(is_not("\"")), |v| v.unwrap_or("")),
            char('"'),
        ),
        delimited(
            char('\''),
            map(opt(is_not("'")), |v| v.unwrap_or("")),
            char('\''),
        ),
    ))(input)
}

fn attr(input: &str) -> IResult<&str, AttrPair> {
    alt((
        map(preceded(char('.'), bare_value), |v| {
            ("class".to_string(), v.to_string())
        }),
        map(preceded(char('#'), bare_value), |v| {
            ("id".to_string(), v.to_string())
        }),
        map(
            separated_pair(key_name, char('='), alt((quoted_value, bare_value))),
            |(k, v)| (k.to_string(), v.to_string()),
        ),
        map(key_name, |k| (k.to_string(), String::new())),
    ))(input)
}

/// Parses the inside of a curly span (without delimiters) into attribute
/// pairs. Returns `None` when the span is empty or malformed; the caller
/// treats that as a no-op match.
pub fn parse_attr_list(inner: &str) -> Option<Vec<AttrPair>> {
    let result: IResult<&str, Vec<AttrPair>> = all_consuming(delimited(
        multispace0,
        separated_list1(multispace1, attr),
        multispace0,
    ))(inner);
    result.ok().map(|(_, attrs)| attrs)
}

/// Locates a curly span terminating `content`. Returns the byte offset of
/// the opening delimiter and the parsed pairs.
pub fn curly_suffix(content: &str, config: &AttrsConfig) -> Option<(usize, Vec<AttrPair>)> {
    let left = config.left_delimiter.as_str();
    let right = config.right_delimiter.as_str();
    if !content.ends_with(right) {
        return None;
    }
    let start = content.rfind(left)?;
    let inner = &content[start + left.len()..content.len() - right.len()];
    if inner.contains(left) || inner.contains(right) {
        return None;
    }
    parse_attr_list(inner).map(|attrs| (start, attrs))
}

/// Locates a curly span opening `content`. Returns the byte offset just
/// past the closing delimiter and the parsed pairs.
pub fn curly_prefix(content: &str, config: &AttrsConfig) -> Option<(usize, Vec<AttrPair>)> {
    let left = config.left_delimiter.as_str();
    let right = config.right_delimiter.as_str();
    if !content.starts_with(left) {
        return None;
    }
    let close = content.find(right)?;
    let inner = &content[left.len()..close];
    if inner.contains(left) {
        return None;
    }
    parse_attr_list(inner).map(|attrs| (close + right.len(), attrs))
}

/// Parses `content` that consists solely of a curly span.
pub fn curly_only(content: &str, config: &AttrsConfig) -> Option<Vec<AttrPair>> {
    let left = config.left_delimiter.as_str();
    let right = config.right_delimiter.as_str();
    if content.len() < left.len() + right.len()
        || !content.starts_with(left)
        || !content.ends_with(right)
    {
        return None;
    }
    let inner = &content[left.len()..content.len() - right.len()];
    if inner.contains(left) || inner.contains(right) {
        return None;
    }
    parse_attr_list(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<AttrPair> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_class_id_shortcuts() {
        assert_eq!(
            parse_attr_list(".red #main"),
            Some(pairs(&[("class", "red"), ("id", "main")]))
        );
    }

    #[test]
    fn test_key_value_forms() {
        assert_eq!(
            parse_attr_list("colspan=3 title=\"a b\" flag"),
            Some(pairs(&[("colspan", "3"), ("title", "a b"), ("flag", "")]))
        );
    }

    #[test]
    fn test_empty_and_malformed() {
        assert_eq!(parse_attr_list(""), None);
        assert_eq!(parse_attr_list("   "), None);
        assert_eq!(parse_attr_list(".{bad}"), None);
    }

    #[test]
    fn test_curly_suffix() {
        let config = AttrsConfig::default();
        let (start, attrs) = curly_suffix("text {.x}", &config).unwrap();
        assert_eq!(start, 5);
        assert_eq!(attrs, pairs(&[("class", "x")]));
        assert_eq!(curly_suffix("no span here", &config), None);
        assert_eq!(curly_suffix("trailing {.x} not-at-end", &config), None);
    }

    #[test]
    fn test_curly_prefix() {
        let config = AttrsConfig::default();
        let (end, attrs) = curly_prefix("{#id} rest", &config).unwrap();
        assert_eq!(end, 5);
        assert_eq!(attrs, pairs(&[("id", "id")]));
        assert_eq!(curly_prefix("rest {#id}", &config), None);
    }

    #[test]
    fn test_curly_only() {
        let config = AttrsConfig::default();
        assert_eq!(
            curly_only("{.a .b}", &config),
            Some(pairs(&[("class", "a"), ("class", "b")]))
        );
        assert_eq!(curly_only("{.a} x", &config), None);
        assert_eq!(curly_only("{}", &config), None);
    }
}
