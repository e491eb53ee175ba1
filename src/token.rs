//! Tokenizer for the onboarding-request surface syntax.
//!
//! Turns raw text into a flat stream of typed tokens, each carrying a
//! 1-based line/column position for error reporting. Line comments (`;` to
//! end of line) and whitespace are consumed here and never reach the parser.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace1},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{pair, preceded, tuple},
    IResult, InputTake,
};
use nom_locate::LocatedSpan;

use crate::error::LexError;

type Input<'a> = LocatedSpan<&'a str>;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    /// `->`, used only by lifecycle transition clauses.
    Arrow,
    /// Double-quoted string with escapes already decoded.
    Str(String),
    /// Numeric literal text; classification happens in the mapper.
    Number(String),
    /// Bare identifier.
    Ident(String),
    /// `:`-prefixed identifier; the text retains the leading colon.
    ColonIdent(String),
}

/// A token plus the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

/// Tokenize the whole input, discarding comments and whitespace.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut rest = Input::new(input);
    let mut tokens = Vec::new();
    loop {
        rest = skip_trivia(rest);
        let Some(ch) = rest.fragment().chars().next() else {
            return Ok(tokens);
        };
        let pos = position(&rest);
        if ch == '"' {
            let (next, text) = string_token(rest)?;
            tokens.push(Token {
                kind: TokenKind::Str(text),
                pos,
            });
            rest = next;
            continue;
        }
        match simple_token(rest) {
            Ok((next, kind)) => {
                tokens.push(Token { kind, pos });
                rest = next;
            }
            Err(_) => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    line: pos.line,
                    column: pos.column,
                })
            }
        }
    }
}

fn position(input: &Input<'_>) -> Position {
    Position::new(input.location_line(), input.get_utf8_column() as u32)
}

fn skip_trivia(mut input: Input<'_>) -> Input<'_> {
    loop {
        if let Ok((rest, _)) = multispace1::<_, nom::error::Error<Input<'_>>>(input) {
            input = rest;
            continue;
        }
        if let Ok((rest, _)) = line_comment(input) {
            input = rest;
            continue;
        }
        return input;
    }
}

fn line_comment(input: Input<'_>) -> IResult<Input<'_>, ()> {
    map(preceded(char(';'), take_while(|c| c != '\n')), |_| ())(input)
}

fn simple_token(input: Input<'_>) -> IResult<Input<'_>, TokenKind> {
    alt((
        map(char('('), |_| TokenKind::LParen),
        map(char(')'), |_| TokenKind::RParen),
        map(tag("->"), |_| TokenKind::Arrow),
        map(number, |n: Input<'_>| {
            TokenKind::Number(n.fragment().to_string())
        }),
        map(colon_ident, |s: Input<'_>| {
            TokenKind::ColonIdent(s.fragment().to_string())
        }),
        map(ident, |s: Input<'_>| {
            TokenKind::Ident(s.fragment().to_string())
        }),
    ))(input)
}

/// Ident: letter, then letters/digits/`_`/`-`.
fn ident(input: Input<'_>) -> IResult<Input<'_>, Input<'_>> {
    recognize(pair(
        alpha1,
        many0(alt((alphanumeric1, tag("_"), tag("-")))),
    ))(input)
}

fn colon_ident(input: Input<'_>) -> IResult<Input<'_>, Input<'_>> {
    recognize(pair(char(':'), ident))(input)
}

/// Number: optional leading `-`, digits, optional `.` digits. No exponent.
fn number(input: Input<'_>) -> IResult<Input<'_>, Input<'_>> {
    recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

/// Decode a double-quoted string starting at `input`. Exactly two escapes
/// are legal: `\"` and `\\`.
fn string_token(input: Input<'_>) -> Result<(Input<'_>, String), LexError> {
    let start = position(&input);
    let body = &input.fragment()[1..];
    let mut out = String::new();
    let mut iter = body.char_indices();
    while let Some((i, c)) = iter.next() {
        match c {
            '"' => {
                let (rest, _) = input.take_split(1 + i + c.len_utf8());
                return Ok((rest, out));
            }
            '\\' => match iter.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    let at = position(&input.take_split(1 + i).0);
                    return Err(LexError::InvalidEscape {
                        ch: other,
                        line: at.line,
                        column: at.column,
                    });
                }
                None => break,
            },
            _ => out.push(c),
        }
    }
    Err(LexError::UnterminatedString {
        line: start.line,
        column: start.column,
    })
}
