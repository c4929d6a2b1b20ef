//! Tokenizer for the reference grammar

use gr_ast::interface::ParseDiagnostic;
use gr_span::Span;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword; the parser distinguishes them by text
    Ident,
    /// Numeric literal
    Number,
    /// String literal
    Str,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// End of input
    Eof,
}

/// One lexed token
#[derive(Debug, Clone)]
pub struct Token {
    /// Category
    pub kind: TokenKind,
    /// Byte range in the source
    pub span: Span,
    /// Decoded string contents, for [`TokenKind::Str`] tokens
    pub string: Option<String>,
}

/// Tokenizes `source`, attaching leading `//` comment text to the token
/// that follows it
pub fn tokenize(source: &str) -> Result<Vec<(Token, Vec<String>)>, ParseDiagnostic> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut comments: Vec<String> = Vec::new();
    let mut pos = 0_usize;

    while pos < bytes.len() {
        let byte = bytes[pos];
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => pos += 1,
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                let start = pos + 2;
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                comments.push(source[start..pos].trim().to_owned());
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                let start = pos;
                pos += 2;
                while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                    pos += 1;
                }
                if pos + 1 >= bytes.len() {
                    return Err(diagnostic("unterminated block comment", start, start + 2));
                }
                comments.push(source[start + 2..pos].trim().to_owned());
                pos += 2;
            }
            b'"' | b'\'' => {
                let (token, next) = lex_string(source, pos, byte)?;
                tokens.push((token, std::mem::take(&mut comments)));
                pos = next;
            }
            b'0'..=b'9' => {
                let start = pos;
                while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                    pos += 1;
                }
                tokens.push((
                    simple(TokenKind::Number, start, pos),
                    std::mem::take(&mut comments),
                ));
            }
            _ if byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$' => {
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'$')
                {
                    pos += 1;
                }
                tokens.push((
                    simple(TokenKind::Ident, start, pos),
                    std::mem::take(&mut comments),
                ));
            }
            _ => {
                let (kind, width) = match byte {
                    b'(' => (TokenKind::LeftParen, 1),
                    b')' => (TokenKind::RightParen, 1),
                    b'{' => (TokenKind::LeftBrace, 1),
                    b'}' => (TokenKind::RightBrace, 1),
                    b',' => (TokenKind::Comma, 1),
                    b';' => (TokenKind::Semicolon, 1),
                    b'.' => (TokenKind::Dot, 1),
                    b'+' => (TokenKind::Plus, 1),
                    b'-' => (TokenKind::Minus, 1),
                    b'*' => (TokenKind::Star, 1),
                    b'/' => (TokenKind::Slash, 1),
                    b'<' => (TokenKind::Lt, 1),
                    b'>' => (TokenKind::Gt, 1),
                    b'=' if bytes.get(pos + 1) == Some(&b'=') => (TokenKind::EqEq, 2),
                    b'=' => (TokenKind::Assign, 1),
                    b'!' if bytes.get(pos + 1) == Some(&b'=') => (TokenKind::NotEq, 2),
                    _ => {
                        return Err(diagnostic(
                            &format!("unexpected character `{}`", byte as char),
                            pos,
                            pos + 1,
                        ));
                    }
                };
                tokens.push((simple(kind, pos, pos + width), std::mem::take(&mut comments)));
                pos += width;
            }
        }
    }

    tokens.push((simple(TokenKind::Eof, pos, pos), comments));
    Ok(tokens)
}

fn lex_string(source: &str, start: usize, quote: u8) -> Result<(Token, usize), ParseDiagnostic> {
    let bytes = source.as_bytes();
    let mut decoded = String::new();
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            byte if byte == quote => {
                return Ok((
                    Token {
                        kind: TokenKind::Str,
                        span: Span::new(index(start), index(pos + 1)),
                        string: Some(decoded),
                    },
                    pos + 1,
                ));
            }
            b'\\' => {
                let escaped = bytes.get(pos + 1).copied().ok_or_else(|| {
                    diagnostic("unterminated string literal", start, pos + 1)
                })?;
                decoded.push(match escaped {
                    b'n' => '\n',
                    b't' => '\t',
                    other => other as char,
                });
                pos += 2;
            }
            b'\n' => return Err(diagnostic("unterminated string literal", start, pos)),
            byte if byte.is_ascii() => {
                decoded.push(byte as char);
                pos += 1;
            }
            _ => {
                // start of a multi-byte character; take it whole
                let rest = &source[pos..];
                let Some(ch) = rest.chars().next() else {
                    break;
                };
                decoded.push(ch);
                pos += ch.len_utf8();
            }
        }
    }
    Err(diagnostic("unterminated string literal", start, pos))
}

fn simple(kind: TokenKind, start: usize, end: usize) -> Token {
    Token {
        kind,
        span: Span::new(index(start), index(end)),
        string: None,
    }
}

fn diagnostic(message: &str, start: usize, end: usize) -> ParseDiagnostic {
    ParseDiagnostic {
        message: message.to_owned(),
        span: Some(Span::new(index(start), index(end))),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "byte offsets are bounded by the 4 GiB source limit spans impose"
)]
fn index(offset: usize) -> u32 {
    offset as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|(token, _)| token.kind)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("a(b);"),
            vec![
                TokenKind::Ident,
                TokenKind::LeftParen,
                TokenKind::Ident,
                TokenKind::RightParen,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("a == b != c"),
            vec![
                TokenKind::Ident,
                TokenKind::EqEq,
                TokenKind::Ident,
                TokenKind::NotEq,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""a\nb""#).expect("tokenize");
        assert_eq!(tokens[0].0.string.as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_non_ascii_string_contents_survive() {
        let tokens = tokenize("\"héllo wörld\";").expect("tokenize");
        assert_eq!(tokens[0].0.string.as_deref(), Some("héllo wörld"));
    }

    #[test]
    fn test_comments_attach_to_next_token() {
        let tokens = tokenize("// leading\nx;").expect("tokenize");
        assert_eq!(tokens[0].1, vec!["leading".to_owned()]);
        assert!(tokens[1].1.is_empty());
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        assert!(tokenize("\"abc").is_err());
    }
}
