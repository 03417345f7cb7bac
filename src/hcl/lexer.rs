//! Tokenizer for the HCL subset used by Terraform modules

use super::ParseError;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(String),
    /// Quoted string; `literal` is the decoded text when it has no interpolation
    Str { literal: Option<String> },
    Heredoc,
    Newline,
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

const MULTI_CHAR_PUNCT: [&str; 8] = ["...", "==", "!=", "<=", ">=", "&&", "||", "=>"];

const SINGLE_CHAR_PUNCT: [&str; 19] = [
    "{", "}", "[", "]", "(", ")", "=", ",", ":", ".", "?", "!", "+", "-", "*", "/", "%", "<",
    ">",
];

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' => i += 1,
            b'\n' => {
                tokens.push(Token {
                    kind: TokenKind::Newline,
                    span: i..i + 1,
                });
                i += 1;
            }
            b'#' => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = src[i + 2..]
                    .find("*/")
                    .ok_or_else(|| ParseError::at(src, i, "unterminated block comment"))?;
                i = i + 2 + end + 2;
            }
            b'"' => {
                let (end, literal) = lex_string(src, i)?;
                tokens.push(Token {
                    kind: TokenKind::Str { literal },
                    span: i..end,
                });
                i = end;
            }
            b'<' if bytes.get(i + 1) == Some(&b'<') && heredoc_follows(bytes, i + 2) => {
                let end = lex_heredoc(src, i)?;
                tokens.push(Token {
                    kind: TokenKind::Heredoc,
                    span: i..end,
                });
                i = end;
            }
            b'0'..=b'9' => {
                let end = lex_number(bytes, i);
                tokens.push(Token {
                    kind: TokenKind::Number(src[i..end].to_string()),
                    span: i..end,
                });
                i = end;
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('\0');
                if ch.is_alphabetic() || ch == '_' {
                    let end = lex_ident(src, i);
                    tokens.push(Token {
                        kind: TokenKind::Ident(src[i..end].to_string()),
                        span: i..end,
                    });
                    i = end;
                } else if let Some(p) = match_punct(&src[i..]) {
                    tokens.push(Token {
                        kind: TokenKind::Punct(p),
                        span: i..i + p.len(),
                    });
                    i += p.len();
                } else {
                    return Err(ParseError::at(
                        src,
                        i,
                        &format!("unexpected character '{}'", ch),
                    ));
                }
            }
        }
    }

    Ok(tokens)
}

fn skip_line_comment(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn match_punct(rest: &str) -> Option<&'static str> {
    MULTI_CHAR_PUNCT
        .iter()
        .chain(SINGLE_CHAR_PUNCT.iter())
        .find(|p| rest.starts_with(**p))
        .copied()
}

fn lex_ident(src: &str, start: usize) -> usize {
    let mut end = start;
    for (offset, ch) in src[start..].char_indices() {
        if ch.is_alphanumeric() || ch == '_' || ch == '-' {
            end = start + offset + ch.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn lex_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
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
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

/// Lex a quoted template starting at the opening quote.
///
/// Returns the offset just past the closing quote, plus the decoded text when
/// the string contains no `${` or `%{` sequences.
fn lex_string(src: &str, start: usize) -> Result<(usize, Option<String>), ParseError> {
    let bytes = src.as_bytes();
    let mut literal = String::new();
    let mut templated = false;
    let mut i = start + 1;

    loop {
        let Some(&c) = bytes.get(i) else {
            return Err(ParseError::at(src, start, "unterminated string"));
        };
        match c {
            b'"' => {
                let decoded = if templated { None } else { Some(literal) };
                return Ok((i + 1, decoded));
            }
            b'\n' => return Err(ParseError::at(src, start, "unterminated string")),
            b'\\' => {
                let (ch, len) = decode_escape(src, i)?;
                literal.push(ch);
                i += len;
            }
            b'$' | b'%' if bytes.get(i + 1) == Some(&c) && bytes.get(i + 2) == Some(&b'{') => {
                literal.push(c as char);
                literal.push('{');
                i += 3;
            }
            b'$' | b'%' if bytes.get(i + 1) == Some(&b'{') => {
                templated = true;
                i = skip_interpolation(src, i + 2)?;
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('\0');
                literal.push(ch);
                i += ch.len_utf8();
            }
        }
    }
}

fn decode_escape(src: &str, at: usize) -> Result<(char, usize), ParseError> {
    let bytes = src.as_bytes();
    let Some(&kind) = bytes.get(at + 1) else {
        return Err(ParseError::at(src, at, "unterminated escape sequence"));
    };
    let simple = match kind {
        b'n' => Some('\n'),
        b'r' => Some('\r'),
        b't' => Some('\t'),
        b'"' => Some('"'),
        b'\\' => Some('\\'),
        _ => None,
    };
    if let Some(ch) = simple {
        return Ok((ch, 2));
    }

    let digits = match kind {
        b'u' => 4,
        b'U' => 8,
        _ => return Err(ParseError::at(src, at, "invalid escape sequence")),
    };
    let hex = src
        .get(at + 2..at + 2 + digits)
        .ok_or_else(|| ParseError::at(src, at, "truncated unicode escape"))?;
    let ch = u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| ParseError::at(src, at, "invalid unicode escape"))?;
    Ok((ch, 2 + digits))
}

/// Skip past the `}` closing an interpolation whose body starts at `start`
fn skip_interpolation(src: &str, start: usize) -> Result<usize, ParseError> {
    let bytes = src.as_bytes();
    let mut depth = 1usize;
    let mut i = start;

    while let Some(&c) = bytes.get(i) {
        match c {
            b'"' => {
                let (end, _) = lex_string(src, i)?;
                i = end;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(ParseError::at(src, start, "unterminated template interpolation"))
}

fn heredoc_follows(bytes: &[u8], mut i: usize) -> bool {
    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    matches!(bytes.get(i), Some(b) if b.is_ascii_alphabetic() || *b == b'_')
}

/// Lex `<<MARKER` / `<<-MARKER` up to the end of the closing marker line
fn lex_heredoc(src: &str, start: usize) -> Result<usize, ParseError> {
    let mut i = start + 2;
    if src.as_bytes().get(i) == Some(&b'-') {
        i += 1;
    }
    let marker_end = lex_ident(src, i);
    let marker = &src[i..marker_end];

    let line_end = src[marker_end..]
        .find('\n')
        .map(|n| marker_end + n)
        .ok_or_else(|| ParseError::at(src, start, "heredoc marker must end its line"))?;
    if !src[marker_end..line_end].trim().is_empty() {
        return Err(ParseError::at(src, start, "heredoc marker must end its line"));
    }

    let mut line_start = line_end + 1;
    while line_start <= src.len() {
        let end = src[line_start..]
            .find('\n')
            .map(|n| line_start + n)
            .unwrap_or(src.len());
        if src[line_start..end].trim() == marker {
            return Ok(end);
        }
        if end == src.len() {
            break;
        }
        line_start = end + 1;
    }

    Err(ParseError::at(
        src,
        start,
        &format!("unterminated heredoc, expected closing '{}'", marker),
    ))
}
