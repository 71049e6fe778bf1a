//! Longest-match lexer (`spec.md` §4.1).
//!
//! Tokenization is a single left-to-right scan: at each position we try an
//! ordered list of recognizers and take the longest match, with keyword
//! recognition folded into identifier scanning (an identifier that spells a
//! keyword becomes that keyword's token) rather than a separate earlier
//! pass, since keywords are always a strict subset of the identifier
//! grammar.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Constant,
    LongConstant,
    UnsignedIntConstant,
    UnsignedLongConstant,

    // keywords
    KwInt,
    KwLong,
    KwSigned,
    KwUnsigned,
    KwVoid,
    KwReturn,
    KwIf,
    KwElse,
    KwDo,
    KwWhile,
    KwFor,
    KwBreak,
    KwContinue,
    KwStatic,
    KwExtern,

    // punctuation / operators
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Semicolon,
    Comma,
    Tilde,
    Minus,
    MinusMinus,
    Plus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEqual,
    EqualEqual,
    Equal,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AmpAmp,
    PipePipe,
    Question,
    Colon,

    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Present for `Identifier` and the four numeric-constant kinds; the
    /// lexeme excludes any numeric suffix.
    pub lexeme: Option<String>,
    pub line: usize,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::KwInt),
    ("long", TokenKind::KwLong),
    ("signed", TokenKind::KwSigned),
    ("unsigned", TokenKind::KwUnsigned),
    ("void", TokenKind::KwVoid),
    ("return", TokenKind::KwReturn),
    ("if", TokenKind::KwIf),
    ("else", TokenKind::KwElse),
    ("do", TokenKind::KwDo),
    ("while", TokenKind::KwWhile),
    ("for", TokenKind::KwFor),
    ("break", TokenKind::KwBreak),
    ("continue", TokenKind::KwContinue),
    ("static", TokenKind::KwStatic),
    ("extern", TokenKind::KwExtern),
];

pub fn lex(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0usize;
    let mut line = 1usize;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let (token, consumed) = lex_number(&source[i..], line)?;
            tokens.push(token);
            i += consumed;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && (is_ident_continue(bytes[i] as char)) {
                i += 1;
            }
            let text = &source[start..i];
            let kind = KEYWORDS
                .iter()
                .find(|(kw, _)| *kw == text)
                .map(|(_, k)| k.clone())
                .unwrap_or(TokenKind::Identifier);
            let lexeme = if kind == TokenKind::Identifier {
                Some(text.to_string())
            } else {
                None
            };
            tokens.push(Token { kind, lexeme, line });
            continue;
        }

        // Longer operators must be tried before their single-character prefixes.
        let rest = &source[i..];
        if let Some((kind, len)) = match_punct(rest) {
            tokens.push(Token { kind, lexeme: None, line });
            i += len;
            continue;
        }

        return Err(format!(
            "line {}: unrecognized input starting at '{}'",
            line,
            &source[i..(i + 1).min(source.len())]
        ));
    }

    tokens.push(Token { kind: TokenKind::Eof, lexeme: None, line });
    Ok(tokens)
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn match_punct(rest: &str) -> Option<(TokenKind, usize)> {
    const TWO_CHAR: &[(&str, TokenKind)] = &[
        ("--", TokenKind::MinusMinus),
        ("<=", TokenKind::LessEqual),
        (">=", TokenKind::GreaterEqual),
        ("==", TokenKind::EqualEqual),
        ("!=", TokenKind::BangEqual),
        ("&&", TokenKind::AmpAmp),
        ("||", TokenKind::PipePipe),
    ];
    for (text, kind) in TWO_CHAR {
        if rest.starts_with(text) {
            return Some((kind.clone(), 2));
        }
    }
    const ONE_CHAR: &[(char, TokenKind)] = &[
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        ('~', TokenKind::Tilde),
        ('-', TokenKind::Minus),
        ('+', TokenKind::Plus),
        ('*', TokenKind::Star),
        ('/', TokenKind::Slash),
        ('%', TokenKind::Percent),
        ('!', TokenKind::Bang),
        ('=', TokenKind::Equal),
        ('<', TokenKind::Less),
        ('>', TokenKind::Greater),
        ('?', TokenKind::Question),
        (':', TokenKind::Colon),
    ];
    let first = rest.chars().next()?;
    ONE_CHAR
        .iter()
        .find(|(ch, _)| *ch == first)
        .map(|(_, kind)| (kind.clone(), 1))
}

/// Parses a numeric-literal lexeme: digits, then an optional suffix that
/// selects among the four numeric-constant kinds (`spec.md` §4.1).
fn lex_number(rest: &str, line: usize) -> Result<(Token, usize), String> {
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let digits = &rest[..digits_end];

    let after = &rest[digits_end..];
    let (kind, suffix_len) = classify_suffix(after)?;

    // Reject a malformed literal like `123abc` (an identifier glued onto a
    // digit run) by requiring the character right after the suffix to not
    // continue an identifier.
    let total = digits_end + suffix_len;
    if let Some(c) = rest[total..].chars().next() {
        if is_ident_continue(c) {
            return Err(format!(
                "line {}: invalid numeric literal '{}'",
                line,
                &rest[..total + 1]
            ));
        }
    }

    Ok((
        Token { kind, lexeme: Some(digits.to_string()), line },
        total,
    ))
}

fn classify_suffix(after: &str) -> Result<(TokenKind, usize), String> {
    let lower: String = after.chars().take(2).collect::<String>().to_ascii_lowercase();
    if lower.starts_with("ul") || lower.starts_with("lu") {
        return Ok((TokenKind::UnsignedLongConstant, 2));
    }
    let one = lower.chars().next();
    match one {
        Some('l') => Ok((TokenKind::LongConstant, 1)),
        Some('u') => Ok((TokenKind::UnsignedIntConstant, 1)),
        _ => Ok((TokenKind::Constant, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_before_identifiers() {
        assert_eq!(kinds("int x"), vec![TokenKind::KwInt, TokenKind::Identifier, TokenKind::Eof]);
        assert_eq!(kinds("integer"), vec![TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn longest_match_operators() {
        assert_eq!(
            kinds("a <= b"),
            vec![TokenKind::Identifier, TokenKind::LessEqual, TokenKind::Identifier, TokenKind::Eof]
        );
        assert_eq!(kinds("--x"), vec![TokenKind::MinusMinus, TokenKind::Identifier, TokenKind::Eof]);
        assert_eq!(kinds("&&"), vec![TokenKind::AmpAmp, TokenKind::Eof]);
    }

    #[test]
    fn numeric_suffixes() {
        let toks = lex("1 1l 1u 1ul 1LU 1UL").unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Constant,
                TokenKind::LongConstant,
                TokenKind::UnsignedIntConstant,
                TokenKind::UnsignedLongConstant,
                TokenKind::UnsignedLongConstant,
                TokenKind::UnsignedLongConstant,
                TokenKind::Eof,
            ]
        );
        assert_eq!(toks[0].lexeme, Some("1".to_string()));
    }

    #[test]
    fn unrecognized_input_is_fatal() {
        assert!(lex("int x = 1 @ 2;").is_err());
    }

    #[test]
    fn malformed_literal_rejected() {
        assert!(lex("123abc").is_err());
    }
}
