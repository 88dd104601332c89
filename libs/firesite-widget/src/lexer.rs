use super::{
    error::{context, WidgetError, WidgetResult},
    trace,
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_until, take_while1},
    combinator::{map, verify},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenBrace,
    CloseBrace,
    OpenBlock,
    CloseBlock,
    Equals,
    Quote,
    Identifier,
    Value,
    Whitespace,
}

impl TokenKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::OpenBrace => "`{`",
            Self::CloseBrace => "`}`",
            Self::OpenBlock => "`[[`",
            Self::CloseBlock => "`]]`",
            Self::Equals => "`=`",
            Self::Quote => "`\"`",
            Self::Identifier => "identifier",
            Self::Value => "value",
            Self::Whitespace => "whitespace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the token in the lexed input.
    pub offset: usize,
}

impl Token<'_> {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Main,
    /// Inside `"..."`.
    SimpleArg,
    /// Inside `[[...]]`.
    BlockArg,
}

type Lexed<'a> = IResult<&'a str, (TokenKind, &'a str)>;

const BLOCK_OPEN: &str = "[[";
const BLOCK_CLOSE: &str = "]]";

pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_whitespace_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

// `\n` is the only line break allowed in block values
pub(crate) fn is_bare_line_break(c: char) -> bool {
    matches!(c, '\r' | '\u{2028}' | '\u{2029}')
}

fn tagged<'a>(kind: TokenKind) -> impl Fn(&'a str) -> (TokenKind, &'a str) {
    move |text| (kind, text)
}

fn main_token(input: &str) -> Lexed<'_> {
    alt((
        map(tag("{"), tagged(TokenKind::OpenBrace)),
        map(tag("}"), tagged(TokenKind::CloseBrace)),
        map(tag(BLOCK_OPEN), tagged(TokenKind::OpenBlock)),
        map(tag("="), tagged(TokenKind::Equals)),
        map(tag("\""), tagged(TokenKind::Quote)),
        map(take_while1(is_identifier_char), tagged(TokenKind::Identifier)),
        map(take_while1(is_whitespace_char), tagged(TokenKind::Whitespace)),
    ))(input)
}

fn simple_token(input: &str) -> Lexed<'_> {
    alt((
        map(tag("\""), tagged(TokenKind::Quote)),
        map(take_till1(|c: char| c == '"'), tagged(TokenKind::Value)),
    ))(input)
}

/// Non-greedy: a block value runs up to the nearest `]]`, which must exist.
fn block_value(input: &str) -> IResult<&str, &str> {
    verify(take_until(BLOCK_CLOSE), |value: &str| {
        !value.is_empty() && !value.contains(is_bare_line_break)
    })(input)
}

fn block_token(input: &str) -> Lexed<'_> {
    alt((
        map(tag(BLOCK_CLOSE), tagged(TokenKind::CloseBlock)),
        map(block_value, tagged(TokenKind::Value)),
    ))(input)
}

/// Stateful tokenizer. `"` pushes the quoted-value state and `[[` pushes the
/// block-value state; each is popped by its own closing token.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    states: Vec<LexState>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            states: vec![LexState::Main],
            failed: false,
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    fn state(&self) -> LexState {
        self.states.last().copied().unwrap_or(LexState::Main)
    }

    fn emit(&mut self, (kind, text): (TokenKind, &'a str)) -> Token<'a> {
        match (self.state(), kind) {
            (LexState::Main, TokenKind::OpenBlock) => self.states.push(LexState::BlockArg),
            (LexState::Main, TokenKind::Quote) => self.states.push(LexState::SimpleArg),
            (LexState::SimpleArg, TokenKind::Quote) | (LexState::BlockArg, TokenKind::CloseBlock) => {
                self.states.pop();
            }
            _ => {}
        }
        let token = Token {
            kind,
            text,
            offset: self.pos,
        };
        self.pos += text.len();
        trace!("lexed {:?} at {}", kind, token.offset);
        token
    }

    fn error(&self, rest: &str) -> WidgetError {
        let offset = match self.state() {
            LexState::BlockArg if !rest.contains(BLOCK_CLOSE) => {
                return WidgetError::UnterminatedBlock {
                    offset: self.pos,
                    context: context(self.src, self.pos),
                };
            }
            LexState::BlockArg => self.pos + rest.find(is_bare_line_break).unwrap_or(0),
            _ => self.pos,
        };
        WidgetError::InvalidCharacter {
            offset,
            context: context(self.src, offset),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = WidgetResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.src.len() {
            return None;
        }
        let src = self.src;
        let rest = &src[self.pos..];
        let lexed = match self.state() {
            LexState::Main => main_token(rest),
            LexState::SimpleArg => simple_token(rest),
            LexState::BlockArg => block_token(rest),
        };
        Some(match lexed {
            Ok((_, token)) => Ok(self.emit(token)),
            Err(_) => {
                self.failed = true;
                Err(self.error(rest))
            }
        })
    }
}
