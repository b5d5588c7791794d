use super::{Parse, ParseErrorKind, ParseRes, Parser};
use crate::ast::{Block, Program, RunBlock};
use crate::error::WantedSpec;
use crate::lexer::{Keyword, TokenKind};

impl<'source> Parse<'source> for Program {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        let mut structs = Vec::new();
        let mut functions = Vec::new();
        loop {
            match parser.peek_kind() {
                TokenKind::Keyword(Keyword::Struct) => structs.push(parser.parse()?),
                TokenKind::Keyword(Keyword::Fnc) => functions.push(parser.parse()?),
                TokenKind::Keyword(Keyword::Run) => {
                    let run = parser.parse()?;
                    parser
                        .expect_token(TokenKind::Eof)
                        .map_err(|e| e.add_context("after the run block"))?;
                    return Ok(Self {
                        structs,
                        functions,
                        run,
                    });
                }
                TokenKind::Eof => {
                    return parser.reject_current(ParseErrorKind::MissingRunBlock)
                }
                found => {
                    return parser.reject_current(ParseErrorKind::Expected {
                        wanted: WantedSpec::Description(
                            "a struct declaration, a function declaration or the run block",
                        ),
                        found,
                    })
                }
            }
        }
    }
}

impl<'source> Parse<'source> for RunBlock {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing run block", |parser| {
            let pos = parser.current_pos();
            parser.consume_keyword(Keyword::Run)?;
            let body: Block = parser.parse()?;
            parser.consume_token(TokenKind::Semicolon)?;
            Ok(Self { body, pos })
        })
    }
}
