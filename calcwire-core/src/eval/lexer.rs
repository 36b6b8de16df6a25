//! Tokenizer for the arithmetic grammar.
//!
//! The lexer is deliberately permissive about *which* characters it accepts:
//! punctuation that belongs to constructs the grammar rejects (attribute
//! access, subscripts, string literals, comparisons) is still tokenized so the
//! parser can classify it as an illegal construct instead of a bare syntax
//! error.

use super::EvalError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer or decimal literal.
    Number(f64),
    /// Identifier (constant or function name, or anything else).
    Ident(String),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    DoubleStar,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `%`
    Percent,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.` outside a numeric literal.
    Dot,
    /// `[`
    LBracket,
    /// Quoted string literal (contents are never interpreted).
    Str,
    /// Any other punctuation character.
    Other(char),
    /// End of input.
    Eof,
}

/// A token together with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was scanned.
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub pos: usize,
}

/// Split `src` into tokens, always terminated by [`TokenKind::Eof`].
///
/// # Errors
/// Returns [`EvalError::Syntax`] on malformed numeric literals or an
/// unterminated string literal.
pub fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = scan_number(bytes, i);
            let text = &src[start..i];
            let value = text.parse::<f64>().map_err(|_| EvalError::Syntax {
                pos: start,
                msg: format!("invalid numeric literal '{text}'"),
            })?;
            tokens.push(Token { kind: TokenKind::Number(value), pos: start });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token { kind: TokenKind::Ident(src[start..i].to_string()), pos: start });
            continue;
        }

        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' if bytes.get(i + 1) == Some(&b'*') => {
                i += 1;
                TokenKind::DoubleStar
            }
            b'*' => TokenKind::Star,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i += 1;
                TokenKind::DoubleSlash
            }
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'[' => TokenKind::LBracket,
            b'"' | b'\'' => {
                i = scan_string(bytes, i).ok_or(EvalError::Syntax {
                    pos: start,
                    msg: "unterminated string literal".into(),
                })?;
                tokens.push(Token { kind: TokenKind::Str, pos: start });
                continue;
            }
            _ => {
                // Non-ASCII input is reported by its full character, not a byte.
                let ch = src[start..].chars().next().unwrap_or('\u{fffd}');
                i += ch.len_utf8();
                tokens.push(Token { kind: TokenKind::Other(ch), pos: start });
                continue;
            }
        };
        i += 1;
        tokens.push(Token { kind, pos: start });
    }

    tokens.push(Token { kind: TokenKind::Eof, pos: src.len() });
    Ok(tokens)
}

/// Scan `digits [. digits] [(e|E) [+|-] digits]` starting at `i`.
///
/// An exponent marker is only consumed when digits follow it, so `2e` lexes
/// as the literal `2` followed by the identifier `e`.
fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

/// Returns the index just past the closing quote.
fn scan_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            kinds("2**10 // 3 % .5"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::DoubleStar,
                TokenKind::Number(10.0),
                TokenKind::DoubleSlash,
                TokenKind::Number(3.0),
                TokenKind::Percent,
                TokenKind::Number(0.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn exponent_literals() {
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("2.5E-2")[0], TokenKind::Number(0.025));
        assert_eq!(
            kinds("2e"),
            vec![TokenKind::Number(2.0), TokenKind::Ident("e".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn foreign_punctuation_is_tokenized() {
        assert_eq!(
            kinds("a.b[0] < 'x'"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Dot,
                TokenKind::Ident("b".into()),
                TokenKind::LBracket,
                TokenKind::Number(0.0),
                TokenKind::Other(']'),
                TokenKind::Other('<'),
                TokenKind::Str,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn positions_are_byte_offsets() {
        let tokens = tokenize("  sin( 1 )").expect("tokenize");
        let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(positions, vec![2, 5, 7, 9, 10]);
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        assert!(matches!(tokenize("'abc"), Err(EvalError::Syntax { pos: 0, .. })));
    }
}
