use super::{ParseErrorKind, ParseRes, Parser};
use crate::ast::{Expr, ExprKind};
use crate::error::Position;
use crate::lexer::FormatSpec;

/// Re-scan a text literal's decoded content. A literal without `$` stays a
/// plain text node; otherwise it splits into interleaved static parts and
/// embedded expressions:
///
///   `$ident`          an identifier reference
///   `${ident:fmt}`    an identifier reference with a format specifier
///
/// The resulting node always satisfies `parts.len() == exprs.len() + 1` and
/// `formats.len() == exprs.len()`.
pub fn expression_from_text(
    parser: &mut Parser,
    content: String,
    pos: Position,
) -> ParseRes<Expr> {
    if !content.contains('$') {
        return Ok(Expr::new(ExprKind::Text(content), pos));
    }

    let mut parts = Vec::new();
    let mut exprs = Vec::new();
    let mut formats = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            current.push(ch);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => inner.push(c),
                        None => {
                            return parser.emit_error_at(
                                pos,
                                ParseErrorKind::UnterminatedInterpolation,
                            )
                        }
                    }
                }
                let (name, format) = split_format(parser, &inner, pos)?;
                parts.push(std::mem::take(&mut current));
                exprs.push(Expr::new(ExprKind::Identifier(name), pos));
                formats.push(format);
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                parts.push(std::mem::take(&mut current));
                exprs.push(Expr::new(ExprKind::Identifier(name), pos));
                formats.push(None);
            }
            // a dollar not introducing an embedding stays literal text
            _ => current.push('$'),
        }
    }
    parts.push(current);

    if exprs.is_empty() {
        return Ok(Expr::new(ExprKind::Text(content), pos));
    }
    Ok(Expr::new(
        ExprKind::Interpolation {
            parts,
            exprs,
            formats,
        },
        pos,
    ))
}

/// `inner` is what stood between `${` and `}`; an optional trailing `:d`,
/// `:f` or `:s` selects the conversion, anything else after a colon is
/// rejected.
fn split_format(
    parser: &mut Parser,
    inner: &str,
    pos: Position,
) -> ParseRes<(String, Option<FormatSpec>)> {
    match inner.rsplit_once(':') {
        Some((name, suffix)) => {
            let Some(spec) = FormatSpec::from_suffix(suffix.trim()) else {
                return parser.emit_error_at(
                    pos,
                    ParseErrorKind::InvalidFormatSpecifier(format!(":{}", suffix)),
                );
            };
            Ok((name.trim().to_string(), Some(spec)))
        }
        None => Ok((inner.trim().to_string(), None)),
    }
}
