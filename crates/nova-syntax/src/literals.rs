use std::ops::Range;

use crate::ast::LiteralKind;

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LiteralError {
    pub message: String,
    /// Byte range within the provided literal text (not file offsets).
    pub span: Range<usize>,
}

fn err(message: impl Into<String>, span: Range<usize>) -> LiteralError {
    LiteralError {
        message: message.into(),
        span,
    }
}

pub fn parse_literal(kind: LiteralKind, text: &str) -> Result<LiteralValue, LiteralError> {
    match kind {
        LiteralKind::Int => Ok(LiteralValue::Int(parse_int_literal(text)?)),
        LiteralKind::Long => Ok(LiteralValue::Long(parse_long_literal(text)?)),
        LiteralKind::Float => Ok(LiteralValue::Float(parse_double_literal(text)? as f32)),
        LiteralKind::Double => Ok(LiteralValue::Double(parse_double_literal(text)?)),
        LiteralKind::Char => Ok(LiteralValue::Char(unescape_char_literal(text)?)),
        LiteralKind::String if text.starts_with("\"\"\"") => {
            Ok(LiteralValue::String(unescape_text_block(text)?))
        }
        LiteralKind::String => Ok(LiteralValue::String(unescape_string_literal(text)?)),
        LiteralKind::Bool => match text {
            "true" => Ok(LiteralValue::Bool(true)),
            "false" => Ok(LiteralValue::Bool(false)),
            _ => Err(err("Invalid boolean literal", 0..text.len())),
        },
        LiteralKind::Null => Ok(LiteralValue::Null),
    }
}

/// Digits of an integer literal with base prefix and underscores removed.
fn integer_digits(text: &str) -> Result<(u32, String), LiteralError> {
    let lower = text.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    let digits: String = body.chars().filter(|c| *c != '_').collect();
    if digits.is_empty() {
        return Err(err("Missing digits in integer literal", 0..text.len()));
    }
    Ok((radix, digits))
}

/// Parses an `int` literal. Non-decimal literals may use the full 32-bit range
/// (`0xFFFFFFFF` is `-1`), and `2147483648` is only valid under unary minus,
/// which callers handle by folding the negation first.
pub fn parse_int_literal(text: &str) -> Result<i32, LiteralError> {
    if text.ends_with(['l', 'L']) {
        return Err(err(
            "Int literal must not have `L` suffix",
            text.len() - 1..text.len(),
        ));
    }
    let (radix, digits) = integer_digits(text)?;
    let value = u64::from_str_radix(&digits, radix)
        .map_err(|_| err("Invalid int literal", 0..text.len()))?;
    if radix == 10 {
        i32::try_from(value).map_err(|_| err("Int literal out of range", 0..text.len()))
    } else {
        u32::try_from(value)
            .map(|v| v as i32)
            .map_err(|_| err("Int literal out of range", 0..text.len()))
    }
}

pub fn parse_long_literal(text: &str) -> Result<i64, LiteralError> {
    let body = text.strip_suffix(['l', 'L']).unwrap_or(text);
    let (radix, digits) = integer_digits(body)?;
    let value = u128::from_str_radix(&digits, radix)
        .map_err(|_| err("Invalid long literal", 0..text.len()))?;
    if radix == 10 {
        i64::try_from(value).map_err(|_| err("Long literal out of range", 0..text.len()))
    } else {
        u64::try_from(value)
            .map(|v| v as i64)
            .map_err(|_| err("Long literal out of range", 0..text.len()))
    }
}

pub fn parse_double_literal(text: &str) -> Result<f64, LiteralError> {
    let body = text.strip_suffix(['d', 'D', 'f', 'F']).unwrap_or(text);
    let cleaned: String = body.chars().filter(|c| *c != '_').collect();
    cleaned
        .parse::<f64>()
        .map_err(|_| err("Invalid floating-point literal", 0..text.len()))
}

pub fn unescape_char_literal(text: &str) -> Result<char, LiteralError> {
    let inner = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(|| err("Invalid char literal", 0..text.len()))?;
    let out = unescape(inner, 1)?;
    let mut chars = out.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        (None, _) => Err(err("Empty char literal", 0..text.len())),
        _ => Err(err(
            "Char literal must contain exactly one character",
            0..text.len(),
        )),
    }
}

pub fn unescape_string_literal(text: &str) -> Result<String, LiteralError> {
    if text.len() < 2 || !text.starts_with('"') || !text.ends_with('"') {
        return Err(err("Invalid string literal", 0..text.len()));
    }
    unescape(&text[1..text.len() - 1], 1)
}

/// Text blocks are only needed as constants; indentation stripping follows the
/// common case of a closing delimiter on its own line.
pub fn unescape_text_block(text: &str) -> Result<String, LiteralError> {
    let inner = text
        .strip_prefix("\"\"\"")
        .and_then(|rest| rest.strip_suffix("\"\"\""))
        .ok_or_else(|| err("Invalid text block literal", 0..text.len()))?;
    let Some((_, content)) = inner.split_once('\n') else {
        return Err(err("Text block must start on a new line", 0..text.len()));
    };
    let lines: Vec<&str> = content.split('\n').collect();
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .chain(lines.last())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut joined = String::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            joined.push('\n');
        }
        joined.push_str(line.get(indent..).unwrap_or("").trim_end());
    }
    unescape(&joined, 3)
}

fn unescape(text: &str, base: usize) -> Result<String, LiteralError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            return Err(err("Unterminated escape sequence", base + idx..base + text.len()));
        };
        match escaped {
            'b' => out.push('\u{0008}'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'f' => out.push('\u{000C}'),
            'r' => out.push('\r'),
            's' => out.push(' '),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            'u' => {
                while chars.peek().is_some_and(|(_, c)| *c == 'u') {
                    chars.next();
                }
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = chars
                        .next()
                        .and_then(|(_, c)| c.to_digit(16))
                        .ok_or_else(|| err("Invalid unicode escape", base + idx..base + idx + 2))?;
                    code = code * 16 + digit;
                }
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            '0'..='7' => {
                let mut code = escaped.to_digit(8).unwrap_or(0);
                let max_digits = if escaped <= '3' { 3 } else { 2 };
                for _ in 1..max_digits {
                    match chars.peek().and_then(|(_, c)| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            _ => {
                return Err(err(
                    format!("Invalid escape sequence `\\{escaped}`"),
                    base + idx..base + idx + 2,
                ))
            }
        }
    }
    Ok(out)
}

/// Renders `value` as a Java string literal, quotes included.
pub fn quote_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_literals() {
        assert_eq!(parse_int_literal("1_000"), Ok(1000));
        assert_eq!(parse_int_literal("0x1F"), Ok(31));
        assert_eq!(parse_int_literal("0xFFFFFFFF"), Ok(-1));
        assert_eq!(parse_int_literal("010"), Ok(8));
        assert!(parse_int_literal("2147483648").is_err());
        assert_eq!(parse_long_literal("10L"), Ok(10));
        assert_eq!(parse_double_literal("1.5e1"), Ok(15.0));
    }

    #[test]
    fn string_and_char_literals() {
        assert_eq!(unescape_string_literal(r#""a\tb\"""#).unwrap(), "a\tb\"");
        assert_eq!(unescape_char_literal(r"'\n'"), Ok('\n'));
        assert_eq!(unescape_char_literal(r"'A'"), Ok('A'));
        assert!(unescape_char_literal("'ab'").is_err());
        assert_eq!(quote_string_literal("a\"b\n"), r#""a\"b\n""#);
    }

    #[test]
    fn text_block() {
        let text = "\"\"\"\n    a\n      b\n    \"\"\"";
        assert_eq!(unescape_text_block(text).unwrap(), "a\n  b\n");
    }
}
