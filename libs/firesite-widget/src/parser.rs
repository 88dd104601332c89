use super::{
    error::{context, WidgetError, WidgetResult},
    Lexer, Token, TokenKind, WidgetInvocation,
};
use std::str::FromStr;

/// Recursive-descent parser for a single widget:
///
/// ```text
/// widget    := '{' identifier arg* '}'
/// arg       := identifier '=' ( '"' value '"' | '[[' value ']]' )
/// ```
///
/// Whitespace between tokens is skipped.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    consumed: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            lexer: Lexer::new(src),
            consumed: 0,
        }
    }

    /// Byte length of the input consumed by the last successfully read token.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    fn next_token(&mut self) -> WidgetResult<Option<Token<'a>>> {
        for token in self.lexer.by_ref() {
            let token = token?;
            if token.kind != TokenKind::Whitespace {
                self.consumed = token.end();
                return Ok(Some(token));
            }
        }
        Ok(None)
    }

    fn unexpected(&self, expected: &'static str, found: Option<Token<'a>>) -> WidgetError {
        let src = self.lexer.source();
        match found {
            Some(token) => WidgetError::UnexpectedToken {
                expected,
                found: token.text.to_string(),
                offset: token.offset,
                context: context(src, token.offset),
            },
            None => WidgetError::UnexpectedEnd {
                expected,
                offset: src.len(),
                context: context(src, src.len()),
            },
        }
    }

    fn expect(&mut self, kind: TokenKind) -> WidgetResult<Token<'a>> {
        match self.next_token()? {
            Some(token) if token.kind == kind => Ok(token),
            other => Err(self.unexpected(kind.describe(), other)),
        }
    }

    /// Parses one widget, stopping right after its closing brace.
    pub fn widget(&mut self) -> WidgetResult<WidgetInvocation> {
        self.expect(TokenKind::OpenBrace)?;
        let name = self.expect(TokenKind::Identifier)?;

        let mut args = Vec::new();
        loop {
            match self.next_token()? {
                Some(token) if token.kind == TokenKind::CloseBrace => break,
                Some(token) if token.kind == TokenKind::Identifier => args.push(self.arg(token)?),
                other => return Err(self.unexpected("argument or `}`", other)),
            }
        }

        Ok(WidgetInvocation {
            name: name.text.to_string(),
            args,
        })
    }

    fn arg(&mut self, key: Token<'a>) -> WidgetResult<(String, String)> {
        self.expect(TokenKind::Equals)?;
        let close = match self.next_token()? {
            Some(token) if token.kind == TokenKind::Quote => TokenKind::Quote,
            Some(token) if token.kind == TokenKind::OpenBlock => TokenKind::CloseBlock,
            other => return Err(self.unexpected("`\"` or `[[`", other)),
        };
        let value = self.expect(TokenKind::Value)?;
        self.expect(close)?;

        Ok((key.text.to_string(), value.text.to_string()))
    }

    /// Fails unless only whitespace remains.
    pub fn finish(&mut self) -> WidgetResult<()> {
        match self.next_token()? {
            None => Ok(()),
            other => Err(self.unexpected("end of input", other)),
        }
    }
}

/// Parses input holding exactly one widget, optionally surrounded by whitespace.
pub fn parse_widget(input: &str) -> WidgetResult<WidgetInvocation> {
    let mut parser = Parser::new(input);
    let widget = parser.widget()?;
    parser.finish()?;
    Ok(widget)
}

impl FromStr for WidgetInvocation {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_widget(s)
    }
}
