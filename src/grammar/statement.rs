use super::{Parse, ParseRes, Parser};
use crate::ast::{Block, Expr, ExprKind, Statement, StatementKind};
use crate::error::Position;
use crate::lexer::{Keyword, Operator, TokenKind};

impl<'source> Parse<'source> for Block {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing block", |parser| {
            parser.consume_token(TokenKind::OpenBrace)?;
            let mut statements = Vec::new();
            while parser.peek_kind() != TokenKind::CloseBrace {
                statements.push(parser.parse()?);
            }
            parser.accept_current(); // closing brace
            Ok(Self(statements))
        })
    }
}

impl<'source> Parse<'source> for Statement {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing statement", |parser| {
            let pos = parser.current_pos();
            match parser.peek_kind() {
                TokenKind::Keyword(Keyword::Val) => {
                    parser.accept_current();
                    declaration(parser, pos, true)
                }
                TokenKind::Keyword(kw) if kw.is_type_name() => declaration(parser, pos, false),
                TokenKind::Keyword(Keyword::If) => if_statement(parser, pos),
                TokenKind::Keyword(Keyword::For) => for_statement(parser, pos),
                TokenKind::Keyword(Keyword::Try) => try_statement(parser, pos),
                TokenKind::Keyword(Keyword::Repeat) => repeat_statement(parser, pos),
                TokenKind::Keyword(Keyword::Return) => {
                    parser.accept_current();
                    let value = if parser.peek_kind() == TokenKind::Semicolon {
                        None
                    } else {
                        Some(parser.parse()?)
                    };
                    parser.consume_token(TokenKind::Semicolon)?;
                    Ok(Statement {
                        kind: StatementKind::Return(value),
                        pos,
                    })
                }
                TokenKind::OpenBrace => {
                    let block = parser.parse()?;
                    parser.skip_optional_semicolon();
                    Ok(Statement {
                        kind: StatementKind::Block(block),
                        pos,
                    })
                }
                TokenKind::Identifier => identifier_statement(parser, pos),
                _ => expression_statement(parser, pos),
            }
        })
    }
}

/// The one-token lookahead rule: an identifier followed by `=`, `[` or `->`
/// starts an assignment form; followed by another identifier or `?` it is a
/// struct-typed declaration. `Name [N] name` re-disambiguates the bracket
/// case back to a declaration of an array of structs.
fn identifier_statement<'source>(
    parser: &mut Parser<'source>,
    pos: Position,
) -> ParseRes<Statement> {
    match parser.peek_kind_at(1) {
        TokenKind::Operator(Operator::Assign) => {
            let name = parser.identifier()?;
            parser.consume_operator(Operator::Assign)?;
            let value = parser.parse()?;
            parser.consume_token(TokenKind::Semicolon)?;
            Ok(Statement {
                kind: StatementKind::Assign { name, value },
                pos,
            })
        }
        TokenKind::Arrow => member_assignment(parser, pos),
        TokenKind::OpenBracket => {
            if parser.bracket_group_precedes_identifier() {
                declaration(parser, pos, false)
            } else {
                let name = parser.identifier()?;
                let array = Expr::new(ExprKind::Identifier(name), pos);
                parser.consume_token(TokenKind::OpenBracket)?;
                let index = parser.parse()?;
                parser.consume_token(TokenKind::CloseBracket)?;
                parser.consume_operator(Operator::Assign)?;
                let value = parser.parse()?;
                parser.consume_token(TokenKind::Semicolon)?;
                Ok(Statement {
                    kind: StatementKind::AssignIndex {
                        array,
                        index,
                        value,
                    },
                    pos,
                })
            }
        }
        TokenKind::Identifier | TokenKind::Question => declaration(parser, pos, false),
        _ => expression_statement(parser, pos),
    }
}

/// `name(->field)+ = value ;` — everything up to the final field is the
/// receiving object.
fn member_assignment<'source>(
    parser: &mut Parser<'source>,
    pos: Position,
) -> ParseRes<Statement> {
    let name = parser.identifier()?;
    let mut object = Expr::new(ExprKind::Identifier(name), pos);
    let field = loop {
        parser.consume_token(TokenKind::Arrow)?;
        let field = parser.identifier()?;
        if parser.peek_kind() == TokenKind::Arrow {
            object = Expr::new(
                ExprKind::Member {
                    target: Box::new(object),
                    field,
                },
                pos,
            );
        } else {
            break field;
        }
    };
    parser.consume_operator(Operator::Assign)?;
    let value = parser.parse()?;
    parser.consume_token(TokenKind::Semicolon)?;
    Ok(Statement {
        kind: StatementKind::AssignMember {
            object,
            field,
            value,
        },
        pos,
    })
}

fn declaration<'source>(
    parser: &mut Parser<'source>,
    pos: Position,
    constant: bool,
) -> ParseRes<Statement> {
    parser.with_context("parsing declaration", |parser| {
        let ty = parser.parse()?;
        let name = parser.identifier()?;
        let init = if parser.peek_kind() == TokenKind::Operator(Operator::Assign) {
            parser.accept_current();
            Some(parser.parse()?)
        } else {
            None
        };
        parser.consume_token(TokenKind::Semicolon)?;
        Ok(Statement {
            kind: StatementKind::Declare {
                ty,
                name,
                init,
                constant,
                comptime: None,
            },
            pos,
        })
    })
}

fn expression_statement<'source>(
    parser: &mut Parser<'source>,
    pos: Position,
) -> ParseRes<Statement> {
    let expr = parser.parse()?;
    parser.consume_token(TokenKind::Semicolon)?;
    Ok(Statement {
        kind: StatementKind::Expr(expr),
        pos,
    })
}

/// `if [cond] {..} or [cond] {..} else {..}`
fn if_statement<'source>(parser: &mut Parser<'source>, pos: Position) -> ParseRes<Statement> {
    parser.with_context("parsing if statement", |parser| {
        parser.consume_keyword(Keyword::If)?;
        let mut arms = vec![condition_and_block(parser)?];
        while parser.peek_kind() == TokenKind::Keyword(Keyword::Or) {
            parser.accept_current();
            arms.push(condition_and_block(parser)?);
        }
        let otherwise = if parser.peek_kind() == TokenKind::Keyword(Keyword::Else) {
            parser.accept_current();
            Some(parser.parse()?)
        } else {
            None
        };
        parser.skip_optional_semicolon();
        Ok(Statement {
            kind: StatementKind::If { arms, otherwise },
            pos,
        })
    })
}

fn condition_and_block<'source>(parser: &mut Parser<'source>) -> ParseRes<(Expr, Block)> {
    parser.consume_token(TokenKind::OpenBracket)?;
    let condition = parser.parse()?;
    parser.consume_token(TokenKind::CloseBracket)?;
    let block = parser.parse()?;
    Ok((condition, block))
}

/// `for [init; cond; incr] {..}` — the init clause is a full statement (its
/// semicolon is the first separator); the increment clause ends at `]`.
fn for_statement<'source>(parser: &mut Parser<'source>, pos: Position) -> ParseRes<Statement> {
    parser.with_context("parsing for statement", |parser| {
        parser.consume_keyword(Keyword::For)?;
        parser.consume_token(TokenKind::OpenBracket)?;
        let init = Box::new(parser.parse()?);
        let condition = parser.parse()?;
        parser.consume_token(TokenKind::Semicolon)?;
        let increment = Box::new(clause_statement(parser)?);
        parser.consume_token(TokenKind::CloseBracket)?;
        let body = parser.parse()?;
        parser.skip_optional_semicolon();
        Ok(Statement {
            kind: StatementKind::For {
                init,
                condition,
                increment,
                body,
            },
            pos,
        })
    })
}

/// An assignment or expression without a terminating semicolon.
fn clause_statement<'source>(parser: &mut Parser<'source>) -> ParseRes<Statement> {
    let pos = parser.current_pos();
    if parser.peek_kind() == TokenKind::Identifier
        && parser.peek_kind_at(1) == TokenKind::Operator(Operator::Assign)
    {
        let name = parser.identifier()?;
        parser.consume_operator(Operator::Assign)?;
        let value = parser.parse()?;
        Ok(Statement {
            kind: StatementKind::Assign { name, value },
            pos,
        })
    } else {
        let expr = parser.parse()?;
        Ok(Statement {
            kind: StatementKind::Expr(expr),
            pos,
        })
    }
}

/// `try {..} catch[name] {..} finally {..}`
fn try_statement<'source>(parser: &mut Parser<'source>, pos: Position) -> ParseRes<Statement> {
    parser.with_context("parsing try statement", |parser| {
        parser.consume_keyword(Keyword::Try)?;
        let body = parser.parse()?;
        parser.consume_keyword(Keyword::Catch)?;
        parser.consume_token(TokenKind::OpenBracket)?;
        let catch_name = parser.identifier()?;
        parser.consume_token(TokenKind::CloseBracket)?;
        let catch_body = parser.parse()?;
        let finally_body = if parser.peek_kind() == TokenKind::Keyword(Keyword::Finally) {
            parser.accept_current();
            Some(parser.parse()?)
        } else {
            None
        };
        parser.skip_optional_semicolon();
        Ok(Statement {
            kind: StatementKind::Try {
                body,
                catch_name,
                catch_body,
                finally_body,
            },
            pos,
        })
    })
}

/// `repeat [expr] { when [v] {..} ... fixed {..} }`
fn repeat_statement<'source>(parser: &mut Parser<'source>, pos: Position) -> ParseRes<Statement> {
    parser.with_context("parsing repeat statement", |parser| {
        parser.consume_keyword(Keyword::Repeat)?;
        parser.consume_token(TokenKind::OpenBracket)?;
        let selector = parser.parse()?;
        parser.consume_token(TokenKind::CloseBracket)?;
        parser.consume_token(TokenKind::OpenBrace)?;

        let mut cases = Vec::new();
        while parser.peek_kind() == TokenKind::Keyword(Keyword::When) {
            parser.accept_current();
            cases.push(condition_and_block(parser)?);
        }
        let fixed = if parser.peek_kind() == TokenKind::Keyword(Keyword::Fixed) {
            parser.accept_current();
            Some(parser.parse()?)
        } else {
            None
        };
        parser.consume_token(TokenKind::CloseBrace)?;
        parser.skip_optional_semicolon();
        Ok(Statement {
            kind: StatementKind::Repeat {
                selector,
                cases,
                fixed,
            },
            pos,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse_ok, parse_test};
    use super::*;
    use crate::error::SourceMetadata;
    use crate::types::Type;

    fn stmt(source: &'static str) -> Statement {
        let meta = Box::leak(Box::new(SourceMetadata::new(source)));
        parse_ok(meta)
    }

    #[test]
    fn declaration_with_initializer() {
        let s = stmt("num x = 5;");
        match s.kind {
            StatementKind::Declare {
                ty,
                name,
                init,
                constant,
                ..
            } => {
                assert_eq!(ty, Type::NUM);
                assert_eq!(name, "x");
                assert!(init.is_some());
                assert!(!constant);
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn constant_declaration() {
        let s = stmt("val num X = 2 + 3 * 4;");
        assert!(matches!(
            s.kind,
            StatementKind::Declare { constant: true, .. }
        ));
    }

    #[test]
    fn assignment_vs_declaration_lookahead() {
        assert!(matches!(stmt("x = 2;").kind, StatementKind::Assign { .. }));
        assert!(matches!(
            stmt("Point p = Point { x = 1, y = 2 };").kind,
            StatementKind::Declare { .. }
        ));
        assert!(matches!(
            stmt("xs[0] = 5;").kind,
            StatementKind::AssignIndex { .. }
        ));
        assert!(matches!(
            stmt("Point[3] ps;").kind,
            StatementKind::Declare { .. }
        ));
        assert!(matches!(
            stmt("p->x = 5;").kind,
            StatementKind::AssignMember { .. }
        ));
        assert!(matches!(
            stmt("Point? maybe = null;").kind,
            StatementKind::Declare { .. }
        ));
    }

    #[test]
    fn chained_member_assignment() {
        let s = stmt("a->b->c = 1;");
        match s.kind {
            StatementKind::AssignMember { object, field, .. } => {
                assert_eq!(field, "c");
                assert!(matches!(
                    object.kind,
                    ExprKind::Member { ref field, .. } if field == "b"
                ));
            }
            other => panic!("expected member assignment, got {:?}", other),
        }
    }

    #[test]
    fn if_or_else_chain() {
        let s = stmt("if [a] { x = 1; } or [b] { x = 2; } or [c] { x = 3; } else { x = 4; }");
        match s.kind {
            StatementKind::If { arms, otherwise } => {
                assert_eq!(arms.len(), 3);
                assert!(otherwise.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn for_loop() {
        let s = stmt("for [num i = 0; i < 10; i = i + 1] { @print[i]; }");
        match s.kind {
            StatementKind::For {
                init,
                increment,
                body,
                ..
            } => {
                assert!(matches!(init.kind, StatementKind::Declare { .. }));
                assert!(matches!(increment.kind, StatementKind::Assign { .. }));
                assert_eq!(body.0.len(), 1);
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn repeat_when_fixed() {
        let s = stmt(
            "repeat [d] { when [1] { @print[\"one\"]; } when [3] { @print[\"three\"]; } fixed { @print[\"other\"]; } }",
        );
        match s.kind {
            StatementKind::Repeat { cases, fixed, .. } => {
                assert_eq!(cases.len(), 2);
                assert!(fixed.is_some());
            }
            other => panic!("expected repeat, got {:?}", other),
        }
    }

    #[test]
    fn try_catch_finally() {
        let s = stmt("try { @print[1]; } catch[err] { @print[2]; } finally { @print[3]; }");
        match s.kind {
            StatementKind::Try {
                catch_name,
                finally_body,
                ..
            } => {
                assert_eq!(catch_name, "err");
                assert!(finally_body.is_some());
            }
            other => panic!("expected try, got {:?}", other),
        }
    }

    #[test]
    fn try_without_finally() {
        let s = stmt("try { } catch[e] { }");
        assert!(matches!(
            s.kind,
            StatementKind::Try {
                finally_body: None,
                ..
            }
        ));
    }

    #[test]
    fn return_forms() {
        assert!(matches!(stmt("return;").kind, StatementKind::Return(None)));
        assert!(matches!(
            stmt("return a + b;").kind,
            StatementKind::Return(Some(_))
        ));
    }

    #[test]
    fn missing_semicolon_fails() {
        let meta = SourceMetadata::new("num x = 5");
        assert!(parse_test::<Statement>(&meta).is_err());
    }

    #[test]
    fn newlines_are_separators() {
        let meta = SourceMetadata::new("{\n  num x = 1;\n\n  x = 2;\n}");
        let block: Block = parse_ok(&meta);
        assert_eq!(block.0.len(), 2);
    }
}
