//! Generic parse tree.
//!
//! The parser at this layer is grammar-agnostic: a node is a parenthesized
//! list of nodes or a single atom, nothing else. All onboarding semantics
//! live in the mapper.

use crate::error::{ParseError, SyntaxError};
use crate::token::{tokenize, Position, Token, TokenKind};

/// Atom leaf: decoded string, numeric literal text, or bare symbol. A
/// symbol beginning with `:` is a keyword symbol; the transition arrow
/// surfaces as the symbol `->`.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Str(String),
    Number(String),
    Sym(String),
}

/// A node in the generic tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    List { elements: Vec<Sexpr>, pos: Position },
    Atom { atom: Atom, pos: Position },
}

impl Sexpr {
    pub fn pos(&self) -> Position {
        match self {
            Sexpr::List { pos, .. } | Sexpr::Atom { pos, .. } => *pos,
        }
    }

    /// Elements if this node is a list.
    pub fn elements(&self) -> Option<&[Sexpr]> {
        match self {
            Sexpr::List { elements, .. } => Some(elements),
            Sexpr::Atom { .. } => None,
        }
    }

    /// Symbol text if this node is a bare symbol atom.
    pub fn sym(&self) -> Option<&str> {
        match self {
            Sexpr::Atom {
                atom: Atom::Sym(s), ..
            } => Some(s),
            _ => None,
        }
    }

    /// Text content of any atom: decoded string, number text, or symbol.
    pub fn atom_text(&self) -> Option<&str> {
        match self {
            Sexpr::Atom { atom, .. } => Some(match atom {
                Atom::Str(s) => s,
                Atom::Number(n) => n,
                Atom::Sym(s) => s,
            }),
            Sexpr::List { .. } => None,
        }
    }
}

/// Parse a token stream into exactly one root node. Trailing tokens after
/// the root are a terminal error, not a warning.
pub fn parse_tokens(tokens: &[Token]) -> Result<Sexpr, SyntaxError> {
    let mut cursor = Cursor { tokens, index: 0 };
    let root = cursor.node()?;
    if let Some(tok) = cursor.peek() {
        return Err(SyntaxError {
            position: tok.pos,
            expected: "end of input",
            found: describe(&tok.kind),
        });
    }
    Ok(root)
}

/// Tokenize and parse in one call.
pub fn parse_text(text: &str) -> Result<Sexpr, ParseError> {
    let tokens = tokenize(text)?;
    Ok(parse_tokens(&tokens)?)
}

struct Cursor<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.index);
        if tok.is_some() {
            self.index += 1;
        }
        tok
    }

    fn node(&mut self) -> Result<Sexpr, SyntaxError> {
        let Some(tok) = self.next() else {
            return Err(SyntaxError {
                position: self.end_pos(),
                expected: "a list or an atom",
                found: "end of input".to_string(),
            });
        };
        match &tok.kind {
            TokenKind::LParen => self.list(tok.pos),
            TokenKind::RParen => Err(SyntaxError {
                position: tok.pos,
                expected: "a list or an atom",
                found: "')'".to_string(),
            }),
            TokenKind::Arrow => Ok(Sexpr::Atom {
                atom: Atom::Sym("->".to_string()),
                pos: tok.pos,
            }),
            TokenKind::Str(s) => Ok(Sexpr::Atom {
                atom: Atom::Str(s.clone()),
                pos: tok.pos,
            }),
            TokenKind::Number(n) => Ok(Sexpr::Atom {
                atom: Atom::Number(n.clone()),
                pos: tok.pos,
            }),
            TokenKind::Ident(s) | TokenKind::ColonIdent(s) => Ok(Sexpr::Atom {
                atom: Atom::Sym(s.clone()),
                pos: tok.pos,
            }),
        }
    }

    fn list(&mut self, open: Position) -> Result<Sexpr, SyntaxError> {
        let mut elements = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError {
                        position: open,
                        expected: "')'",
                        found: "end of input".to_string(),
                    })
                }
                Some(tok) if matches!(tok.kind, TokenKind::RParen) => {
                    self.index += 1;
                    return Ok(Sexpr::List { elements, pos: open });
                }
                Some(_) => elements.push(self.node()?),
            }
        }
    }

    fn end_pos(&self) -> Position {
        self.tokens
            .last()
            .map(|t| t.pos)
            .unwrap_or_else(|| Position::new(1, 1))
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Arrow => "'->'".to_string(),
        TokenKind::Str(s) => format!("string {:?}", s),
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::Ident(s) => format!("symbol {}", s),
        TokenKind::ColonIdent(s) => format!("keyword {}", s),
    }
}
