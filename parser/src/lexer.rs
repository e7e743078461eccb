//! Token-level lexer for the C# subset
//!
//! Comments and whitespace are trivia: they are skipped here, and survive in
//! the output because rendering splices edits over the original text instead
//! of re-printing tokens.

use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::satisfy;
use nom::combinator::{opt, recognize};
use nom::{IResult, Parser};

use crate::cs_ast::Span;

/// One lexed token with its byte range
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    Ident(String),
    Number(String),
    /// Unescaped string value
    Str(String),
    /// Character literal content, as written between the quotes
    Char(String),
    Punct(&'static str),
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.kind, TokKind::Punct(s) if *s == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokKind::Ident(s) if s == name)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokKind::Ident(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Lexing failure with the byte offset it occurred at
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

/// Multi-character punctuation first so maximal munch wins
const PUNCTS: &[&str] = &[
    "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "+=", "-=", "*=", "/=", "%=",
    "::", "(", ")", "[", "]", "{", "}", ",", ".", ";", ":", "?", "<", ">", "=", "+", "-", "*",
    "/", "%", "!", "&", "|", "^", "~",
];

/// Lex the whole input into a token list
pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = src;

    loop {
        rest = skip_trivia(rest);
        if rest.is_empty() {
            break;
        }

        let start = src.len() - rest.len();
        let (remaining, kind) = token(rest).map_err(|_| LexError {
            offset: start,
            message: format!("unrecognized character {:?}", rest.chars().next().unwrap()),
        })?;
        let end = src.len() - remaining.len();

        tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
        rest = remaining;
    }

    Ok(tokens)
}

fn token(input: &str) -> Result<(&str, TokKind), ()> {
    if input.starts_with("@\"") {
        return verbatim_string(input);
    }
    if input.starts_with('"') {
        return string_lit(input);
    }
    if input.starts_with('\'') {
        return char_lit(input);
    }

    if let Ok((rest, text)) = ident(input) {
        return Ok((rest, TokKind::Ident(text.to_string())));
    }
    if let Ok((rest, text)) = number(input) {
        return Ok((rest, TokKind::Number(text.to_string())));
    }

    for punct in PUNCTS {
        if let Some(rest) = input.strip_prefix(punct) {
            return Ok((rest, TokKind::Punct(punct)));
        }
    }

    Err(())
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize((
        satisfy(|c: char| c.is_alphabetic() || c == '_' || c == '@'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while1(|c: char| c.is_ascii_digit()),
        opt((
            nom::character::complete::char('.'),
            take_while1(|c: char| c.is_ascii_digit()),
        )),
        take_while(|c: char| "fFdDmMuUlL".contains(c)),
    ))
    .parse(input)
}

fn string_lit(input: &str) -> Result<(&str, TokKind), ()> {
    debug_assert!(input.starts_with('"'));
    let mut value = String::new();
    let mut chars = input.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&input[i + 1..], TokKind::Str(value))),
            '\\' => match chars.next() {
                Some((_, e)) => value.push(unescape(e)),
                None => return Err(()),
            },
            other => value.push(other),
        }
    }

    Err(())
}

fn verbatim_string(input: &str) -> Result<(&str, TokKind), ()> {
    debug_assert!(input.starts_with("@\""));
    let mut value = String::new();
    let bytes = input.as_bytes();
    let mut i = 2;

    while i < bytes.len() {
        if bytes[i] == b'"' {
            // Doubled quote is an escaped quote in verbatim strings
            if bytes.get(i + 1) == Some(&b'"') {
                value.push('"');
                i += 2;
                continue;
            }
            return Ok((&input[i + 1..], TokKind::Str(value)));
        }
        let c = input[i..].chars().next().ok_or(())?;
        value.push(c);
        i += c.len_utf8();
    }

    Err(())
}

fn char_lit(input: &str) -> Result<(&str, TokKind), ()> {
    debug_assert!(input.starts_with('\''));
    let mut chars = input.char_indices().skip(1);
    let mut raw = String::new();

    match chars.next() {
        Some((_, '\\')) => {
            raw.push('\\');
            match chars.next() {
                Some((_, e)) => raw.push(e),
                None => return Err(()),
            }
        }
        Some((_, c)) if c != '\'' => raw.push(c),
        _ => return Err(()),
    }

    match chars.next() {
        Some((i, '\'')) => Ok((&input[i + 1..], TokKind::Char(raw))),
        _ => Err(()),
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

fn skip_trivia(mut input: &str) -> &str {
    loop {
        let trimmed = input.trim_start();
        if let Some(rest) = trimmed.strip_prefix("//") {
            input = match rest.find('\n') {
                Some(i) => &rest[i + 1..],
                None => "",
            };
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            input = match rest.find("*/") {
                Some(i) => &rest[i + 2..],
                None => "",
            };
        } else {
            return trimmed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn idents_and_puncts() {
        assert_eq!(
            kinds("Assert.That(x);"),
            vec![
                TokKind::Ident("Assert".into()),
                TokKind::Punct("."),
                TokKind::Ident("That".into()),
                TokKind::Punct("("),
                TokKind::Ident("x".into()),
                TokKind::Punct(")"),
                TokKind::Punct(";"),
            ]
        );
    }

    #[test]
    fn maximal_munch_on_puncts() {
        assert_eq!(
            kinds("a => b == c"),
            vec![
                TokKind::Ident("a".into()),
                TokKind::Punct("=>"),
                TokKind::Ident("b".into()),
                TokKind::Punct("=="),
                TokKind::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn int_member_access_is_not_a_float() {
        assert_eq!(
            kinds("1.Bar()"),
            vec![
                TokKind::Number("1".into()),
                TokKind::Punct("."),
                TokKind::Ident("Bar".into()),
                TokKind::Punct("("),
                TokKind::Punct(")"),
            ]
        );
    }

    #[test]
    fn numbers_with_fraction_and_suffix() {
        assert_eq!(kinds("1.0"), vec![TokKind::Number("1.0".into())]);
        assert_eq!(kinds("2.5f"), vec![TokKind::Number("2.5f".into())]);
        assert_eq!(kinds("10L"), vec![TokKind::Number("10L".into())]);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokKind::Str("a\"b\n".into())]
        );
    }

    #[test]
    fn verbatim_string_doubled_quotes() {
        assert_eq!(
            kinds(r#"@"say ""hi"" now""#),
            vec![TokKind::Str("say \"hi\" now".into())]
        );
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("a // trailing\n/* block */ b"),
            vec![TokKind::Ident("a".into()), TokKind::Ident("b".into())]
        );
    }

    #[test]
    fn spans_are_byte_ranges() {
        let tokens = lex("ab  cd").unwrap();
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(4, 6));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = lex("\"oops").unwrap_err();
        assert_eq!(err.offset, 0);
    }
}
