use super::{Parse, ParseErrorKind, ParseRes, Parser};
use crate::ast::{FunctionDecl, Param, StructDecl};
use crate::error::WantedSpec;
use crate::lexer::{Keyword, TokenKind};
use crate::types::{Field, Type};

/// `num | text | char | bool | void | StructName`, then an optional `[N]` /
/// `[]` array suffix, then an optional `?`.
impl<'source> Parse<'source> for Type {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing type", |parser| {
            let base = match parser.peek_kind() {
                TokenKind::Keyword(Keyword::Num) => Type::NUM,
                TokenKind::Keyword(Keyword::Text) => Type::TEXT,
                TokenKind::Keyword(Keyword::Char) => Type::CHAR,
                TokenKind::Keyword(Keyword::Bool) => Type::BOOL,
                TokenKind::Keyword(Keyword::Void) => Type::Void,
                TokenKind::Identifier => Type::Struct {
                    name: parser.current_lexeme().to_string(),
                    nullable: false,
                },
                found => {
                    return parser.reject_current(ParseErrorKind::Expected {
                        wanted: WantedSpec::Description("a type name"),
                        found,
                    })
                }
            };
            parser.accept_current();

            let mut ty = base;
            if parser.peek_kind() == TokenKind::OpenBracket {
                parser.accept_current();
                let length = if parser.peek_kind() == TokenKind::Number {
                    let lexeme = parser.current_lexeme();
                    match lexeme.parse::<u32>() {
                        Ok(length) if length > 0 => {
                            parser.accept_current();
                            Some(length)
                        }
                        _ => {
                            return parser.reject_current(ParseErrorKind::InvalidArrayLength(
                                lexeme.to_string(),
                            ))
                        }
                    }
                } else {
                    None
                };
                parser.consume_token(TokenKind::CloseBracket)?;
                ty = Type::Array {
                    element: Box::new(ty),
                    length,
                    nullable: false,
                };
            }

            if parser.peek_kind() == TokenKind::Question {
                parser.accept_current();
                ty = ty.nullable();
            }
            Ok(ty)
        })
    }
}

/// `struct Name { (Type fieldName ;)* } ;`
impl<'source> Parse<'source> for StructDecl {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing struct declaration", |parser| {
            let pos = parser.current_pos();
            parser.consume_keyword(Keyword::Struct)?;
            let name = parser.identifier()?;
            parser.consume_token(TokenKind::OpenBrace)?;

            let mut fields = Vec::new();
            while parser.peek_kind() != TokenKind::CloseBrace {
                let ty = parser.parse()?;
                let field_name = parser.identifier()?;
                parser.consume_token(TokenKind::Semicolon)?;
                fields.push(Field {
                    name: field_name,
                    ty,
                });
            }
            parser.accept_current(); // closing brace
            parser.consume_token(TokenKind::Semicolon)?;
            Ok(Self { name, fields, pos })
        })
    }
}

/// `fnc Name [ (val? Type paramName),* ] : ReturnType { body }`
impl<'source> Parse<'source> for FunctionDecl {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing function declaration", |parser| {
            let pos = parser.current_pos();
            parser.consume_keyword(Keyword::Fnc)?;
            let name = parser.identifier()?;
            parser.consume_token(TokenKind::OpenBracket)?;

            let mut params = Vec::new();
            while parser.peek_kind() != TokenKind::CloseBracket {
                let constant = parser.peek_kind() == TokenKind::Keyword(Keyword::Val);
                if constant {
                    parser.accept_current();
                }
                let ty = parser.parse()?;
                let param_name = parser.identifier()?;
                params.push(Param {
                    ty,
                    name: param_name,
                    constant,
                });
                if parser.peek_kind() == TokenKind::Comma {
                    parser.accept_current();
                } else {
                    break;
                }
            }
            parser.consume_token(TokenKind::CloseBracket)?;
            parser.consume_token(TokenKind::Colon)?;
            let ret = parser.parse()?;
            let body = parser.parse()?;
            Ok(Self {
                name,
                params,
                ret,
                body,
                pos,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_ok;
    use super::*;
    use crate::error::SourceMetadata;

    #[test]
    fn scalar_types() {
        let meta = SourceMetadata::new("num");
        assert_eq!(parse_ok::<Type>(&meta), Type::NUM);
        let meta = SourceMetadata::new("text?");
        assert_eq!(parse_ok::<Type>(&meta), Type::TEXT.nullable());
    }

    #[test]
    fn array_types() {
        let meta = SourceMetadata::new("num[3]");
        assert_eq!(
            parse_ok::<Type>(&meta),
            Type::Array {
                element: Box::new(Type::NUM),
                length: Some(3),
                nullable: false,
            }
        );
        let meta = SourceMetadata::new("char[]?");
        assert_eq!(
            parse_ok::<Type>(&meta),
            Type::Array {
                element: Box::new(Type::CHAR),
                length: None,
                nullable: true,
            }
        );
    }

    #[test]
    fn zero_length_array_rejected() {
        let meta = SourceMetadata::new("num[0]");
        assert!(super::super::tests::parse_test::<Type>(&meta).is_err());
    }

    #[test]
    fn struct_declaration() {
        let meta = SourceMetadata::new("struct Point { num x; num y; };");
        let decl: StructDecl = parse_ok(&meta);
        assert_eq!(decl.name, "Point");
        assert_eq!(decl.fields.len(), 2);
        assert_eq!(decl.fields[1].name, "y");
        assert_eq!(decl.fields[1].ty, Type::NUM);
    }

    #[test]
    fn function_declaration() {
        let meta = SourceMetadata::new("fnc add[num a, num b]:num { return a + b; }");
        let decl: FunctionDecl = parse_ok(&meta);
        assert_eq!(decl.name, "add");
        assert_eq!(decl.params.len(), 2);
        assert!(!decl.params[0].constant);
        assert_eq!(decl.ret, Type::NUM);
        assert_eq!(decl.body.0.len(), 1);
    }

    #[test]
    fn constant_parameter() {
        let meta = SourceMetadata::new("fnc shout[val text message]:void { }");
        let decl: FunctionDecl = parse_ok(&meta);
        assert!(decl.params[0].constant);
        assert_eq!(decl.ret, Type::Void);
    }
}
