use super::{interp, Parse, ParseErrorKind, ParseRes, Parser};
use crate::ast::{binary_precedence, BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::WantedSpec;
use crate::lexer::{self, Keyword, Operator, TokenKind};

impl<'source> Parse<'source> for Expr {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing expression", |parser| {
            let lhs = parse_unary(parser)?;
            parse_binary(parser, lhs, 1)
        })
    }
}

/// Left-associative precedence climb. `+>>` builds a concatenation node at
/// the additive level; everything else becomes a plain binary operation.
fn parse_binary<'source>(
    parser: &mut Parser<'source>,
    mut lhs: Expr,
    min_precedence: u8,
) -> ParseRes<Expr> {
    while let Some((op, precedence)) = peek_binary_operator(parser, min_precedence) {
        parser.accept_current();
        let mut rhs = parse_unary(parser)?;
        while peek_binary_operator(parser, precedence + 1).is_some() {
            rhs = parse_binary(parser, rhs, precedence + 1)?;
        }
        let pos = lhs.pos;
        let kind = if op == Operator::Concat {
            ExprKind::Concat {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
        } else {
            ExprKind::Binary {
                op: BinaryOp::from_operator(op).expect("operator filtered by precedence table"),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
        };
        lhs = Expr::new(kind, pos);
    }
    Ok(lhs)
}

fn peek_binary_operator(parser: &mut Parser, min_precedence: u8) -> Option<(Operator, u8)> {
    parser
        .peek_kind()
        .as_operator()
        .and_then(|op| binary_precedence(op).map(|prec| (op, prec)))
        .filter(|&(_, prec)| prec >= min_precedence)
}

fn parse_unary<'source>(parser: &mut Parser<'source>) -> ParseRes<Expr> {
    let mut prefixes = Vec::new();
    while let Some(op) = parser
        .peek_kind()
        .as_operator()
        .and_then(UnaryOp::from_operator)
    {
        prefixes.push((op, parser.current_pos()));
        parser.accept_current();
    }
    let mut expr = parse_postfix(parser)?;
    for (op, pos) in prefixes.into_iter().rev() {
        expr = Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(expr),
            },
            pos,
        );
    }
    Ok(expr)
}

fn parse_postfix<'source>(parser: &mut Parser<'source>) -> ParseRes<Expr> {
    let mut expr = parse_primary(parser)?;
    loop {
        match parser.peek_kind() {
            TokenKind::OpenBracket => {
                let pos = parser.current_pos();
                parser.accept_current();
                let index = parser.parse()?;
                parser.consume_token(TokenKind::CloseBracket)?;
                expr = Expr::new(
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
            }
            TokenKind::Arrow => {
                let pos = parser.current_pos();
                parser.accept_current();
                let field = parser.identifier()?;
                expr = Expr::new(
                    ExprKind::Member {
                        target: Box::new(expr),
                        field,
                    },
                    pos,
                );
            }
            TokenKind::Dot => {
                return parser.reject_current(ParseErrorKind::DotOutsideReadBuiltin);
            }
            _ => return Ok(expr),
        }
    }
}

fn parse_primary<'source>(parser: &mut Parser<'source>) -> ParseRes<Expr> {
    parser.with_context("parsing primary expression", |parser| {
        let pos = parser.current_pos();
        match parser.peek_kind() {
            TokenKind::Number => {
                let lexeme = parser.current_lexeme();
                let value: f64 = lexeme.parse().map_err(|_| {
                    super::ParseError::new(ParseErrorKind::InvalidNumber(lexeme.to_string()))
                        .with_position(pos, parser.metadata())
                })?;
                parser.accept_current();
                Ok(Expr::new(
                    ExprKind::Number {
                        value,
                        integer: !lexeme.contains('.'),
                    },
                    pos,
                ))
            }
            TokenKind::Text => {
                let content = lexer::text_value(parser.current_lexeme());
                parser.accept_current();
                interp::expression_from_text(parser, content, pos)
            }
            TokenKind::Char => {
                let value = lexer::char_value(parser.current_lexeme());
                parser.accept_current();
                Ok(Expr::new(ExprKind::Char(value), pos))
            }
            TokenKind::True => {
                parser.accept_current();
                Ok(Expr::new(ExprKind::Bool(true), pos))
            }
            TokenKind::False => {
                parser.accept_current();
                Ok(Expr::new(ExprKind::Bool(false), pos))
            }
            TokenKind::Null => {
                parser.accept_current();
                Ok(Expr::new(ExprKind::Null, pos))
            }
            TokenKind::At => {
                parser.accept_current();
                parse_call(parser, pos)
            }
            TokenKind::Identifier => {
                let name = parser.identifier()?;
                if parser.peek_kind() == TokenKind::OpenBrace {
                    parse_struct_literal(parser, name, pos)
                } else {
                    Ok(Expr::new(ExprKind::Identifier(name), pos))
                }
            }
            TokenKind::OpenBracket => {
                parser.accept_current();
                let mut elements = Vec::new();
                while parser.peek_kind() != TokenKind::CloseBracket {
                    elements.push(parser.parse()?);
                    if parser.peek_kind() == TokenKind::Comma {
                        parser.accept_current();
                    } else {
                        break;
                    }
                }
                parser.consume_token(TokenKind::CloseBracket)?;
                Ok(Expr::new(ExprKind::ArrayLiteral(elements), pos))
            }
            TokenKind::OpenParen => {
                parser.accept_current();
                let inner: Expr = parser.parse()?;
                parser.consume_token(TokenKind::CloseParen)?;
                Ok(inner)
            }
            found => parser.reject_current(ParseErrorKind::Expected {
                wanted: WantedSpec::Description(
                    "a literal, identifier, call, array literal or parenthesized expression",
                ),
                found,
            }),
        }
    })
}

/// After the `@`: `name[args...]` or one of the dotted read builtins
/// (`num.read`, `text.read`, `char.read`, `bool.read`).
fn parse_call<'source>(
    parser: &mut Parser<'source>,
    pos: crate::error::Position,
) -> ParseRes<Expr> {
    parser.with_context("parsing call", |parser| {
        let callee = match parser.peek_kind() {
            TokenKind::Keyword(kw) if kw.is_type_name() && kw != Keyword::Void => {
                parser.accept_current();
                parser.consume_token(TokenKind::Dot)?;
                let member = parser.identifier()?;
                if member != "read" {
                    return parser.reject_current(ParseErrorKind::DotOutsideReadBuiltin);
                }
                format!("{}.read", kw)
            }
            TokenKind::Identifier => parser.identifier()?,
            found => {
                return parser.reject_current(ParseErrorKind::Expected {
                    wanted: WantedSpec::Description("a function name"),
                    found,
                })
            }
        };

        parser.consume_token(TokenKind::OpenBracket)?;
        let mut args = Vec::new();
        while parser.peek_kind() != TokenKind::CloseBracket {
            args.push(parser.parse()?);
            if parser.peek_kind() == TokenKind::Comma {
                parser.accept_current();
            } else {
                break;
            }
        }
        parser.consume_token(TokenKind::CloseBracket)?;
        Ok(Expr::new(ExprKind::Call { callee, args }, pos))
    })
}

/// `Name { field = expr, ... }`; the name was already consumed.
fn parse_struct_literal<'source>(
    parser: &mut Parser<'source>,
    name: String,
    pos: crate::error::Position,
) -> ParseRes<Expr> {
    parser.with_context("parsing struct literal", |parser| {
        parser.consume_token(TokenKind::OpenBrace)?;
        let mut fields = Vec::new();
        while parser.peek_kind() != TokenKind::CloseBrace {
            let field = parser.identifier()?;
            parser.consume_operator(Operator::Assign)?;
            let value = parser.parse()?;
            fields.push((field, value));
            if parser.peek_kind() == TokenKind::Comma {
                parser.accept_current();
            } else {
                break;
            }
        }
        parser.consume_token(TokenKind::CloseBrace)?;
        Ok(Expr::new(
            ExprKind::StructLiteral {
                name: name.clone(),
                fields,
            },
            pos,
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse_ok, parse_test};
    use super::*;
    use crate::error::SourceMetadata;

    fn expr(source: &'static str) -> Expr {
        let meta = Box::leak(Box::new(SourceMetadata::new(source)));
        parse_ok(meta)
    }

    fn num(e: &Expr) -> f64 {
        match e.kind {
            ExprKind::Number { value, .. } => value,
            ref other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn literals() {
        assert!(matches!(
            expr("12").kind,
            ExprKind::Number {
                value,
                integer: true
            } if value == 12.0
        ));
        assert!(matches!(
            expr("3.5").kind,
            ExprKind::Number {
                value,
                integer: false
            } if value == 3.5
        ));
        assert!(matches!(expr("true").kind, ExprKind::Bool(true)));
        assert!(matches!(expr("null").kind, ExprKind::Null));
        assert!(matches!(expr("'x'").kind, ExprKind::Char(b'x')));
    }

    #[test]
    fn precedence_mul_over_add() {
        // 2 + 3 * 4 parses as 2 + (3 * 4)
        let e = expr("2 + 3 * 4");
        match e.kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } => {
                assert_eq!(num(&lhs), 2.0);
                match rhs.kind {
                    ExprKind::Binary {
                        op: BinaryOp::Multiply,
                        lhs,
                        rhs,
                    } => {
                        assert_eq!(num(&lhs), 3.0);
                        assert_eq!(num(&rhs), 4.0);
                    }
                    other => panic!("expected multiplication, got {:?}", other),
                }
            }
            other => panic!("expected addition, got {:?}", other),
        }
    }

    #[test]
    fn left_associativity() {
        // 10 - 4 - 3 parses as (10 - 4) - 3
        let e = expr("10 - 4 - 3");
        match e.kind {
            ExprKind::Binary {
                op: BinaryOp::Subtract,
                lhs,
                rhs,
            } => {
                assert_eq!(num(&rhs), 3.0);
                assert!(matches!(
                    lhs.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Subtract,
                        ..
                    }
                ));
            }
            other => panic!("expected subtraction, got {:?}", other),
        }
    }

    #[test]
    fn concat_builds_its_own_node() {
        let e = expr(r#"a +>> b"#);
        assert!(matches!(e.kind, ExprKind::Concat { .. }));
    }

    #[test]
    fn logical_and_binds_tighter_than_or() {
        let e = expr("a || b && c");
        match e.kind {
            ExprKind::Binary {
                op: BinaryOp::LogicOr,
                rhs,
                ..
            } => assert!(matches!(
                rhs.kind,
                ExprKind::Binary {
                    op: BinaryOp::LogicAnd,
                    ..
                }
            )),
            other => panic!("expected ||, got {:?}", other),
        }
    }

    #[test]
    fn unary_stacking() {
        let e = expr("!!flag");
        assert!(matches!(
            e.kind,
            ExprKind::Unary {
                op: UnaryOp::Not,
                ..
            }
        ));
        let e = expr("-(1 + 2)");
        assert!(matches!(
            e.kind,
            ExprKind::Unary {
                op: UnaryOp::Negate,
                ..
            }
        ));
    }

    #[test]
    fn calls_and_builtins() {
        let e = expr("@add[5, 3]");
        match e.kind {
            ExprKind::Call { callee, args } => {
                assert_eq!(callee, "add");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected call, got {:?}", other),
        }
        let e = expr(r#"@num.read[""]"#);
        assert!(matches!(
            e.kind,
            ExprKind::Call { ref callee, .. } if callee == "num.read"
        ));
    }

    #[test]
    fn dotted_access_fails_outside_builtins() {
        let meta = SourceMetadata::new("a.b");
        assert!(parse_test::<Expr>(&meta).is_err());
        let meta = SourceMetadata::new("@num.write[1]");
        assert!(parse_test::<Expr>(&meta).is_err());
    }

    #[test]
    fn postfix_chain() {
        let e = expr("p->pos->x");
        match e.kind {
            ExprKind::Member { target, field } => {
                assert_eq!(field, "x");
                assert!(matches!(
                    target.kind,
                    ExprKind::Member { ref field, .. } if field == "pos"
                ));
            }
            other => panic!("expected member access, got {:?}", other),
        }
        let e = expr("xs[2]");
        assert!(matches!(e.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn array_and_struct_literals() {
        let e = expr("[1, 2, 3]");
        assert!(matches!(e.kind, ExprKind::ArrayLiteral(ref els) if els.len() == 3));
        let e = expr("Point { x = 1, y = 2 }");
        match e.kind {
            ExprKind::StructLiteral { name, fields } => {
                assert_eq!(name, "Point");
                assert_eq!(fields[0].0, "x");
                assert_eq!(fields[1].0, "y");
            }
            other => panic!("expected struct literal, got {:?}", other),
        }
    }

    #[test]
    fn comparison_chain_types() {
        let e = expr("a <= b == c");
        // equality has lower precedence than relational
        assert!(matches!(
            e.kind,
            ExprKind::Binary {
                op: BinaryOp::Equals,
                ..
            }
        ));
    }
}
