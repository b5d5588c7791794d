use super::SemanticErrorKind;
use crate::ast::{BinaryOp, ConstValue, Expr, ExprKind, UnaryOp};

/// Eagerly fold a compile-time constant expression. `Ok(None)` means the
/// expression is not a compile-time constant; the only hard failure is a
/// constant division by zero.
///
/// The foldable set: literals, references to other folded constants, unary
/// `-`/`+` on numbers, and `+ - * /` over two folded numbers.
pub fn fold_expr(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<ConstValue>,
) -> Result<Option<ConstValue>, SemanticErrorKind> {
    Ok(Some(match &expr.kind {
        ExprKind::Number { value, .. } => ConstValue::Num(*value as i64),
        ExprKind::Text(content) => ConstValue::Text(content.clone()),
        ExprKind::Char(value) => ConstValue::Char(*value),
        ExprKind::Bool(value) => ConstValue::Bool(*value),
        ExprKind::Identifier(name) => match lookup(name) {
            Some(value) => value,
            None => return Ok(None),
        },
        ExprKind::Unary { op, operand } => {
            match (op, fold_expr(operand, lookup)?) {
                (UnaryOp::Negate, Some(ConstValue::Num(n))) => {
                    ConstValue::Num(n.wrapping_neg())
                }
                (UnaryOp::Plus, Some(ConstValue::Num(n))) => ConstValue::Num(n),
                _ => return Ok(None),
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let (Some(ConstValue::Num(a)), Some(ConstValue::Num(b))) =
                (fold_expr(lhs, lookup)?, fold_expr(rhs, lookup)?)
            else {
                return Ok(None);
            };
            match op {
                BinaryOp::Add => ConstValue::Num(a.wrapping_add(b)),
                BinaryOp::Subtract => ConstValue::Num(a.wrapping_sub(b)),
                BinaryOp::Multiply => ConstValue::Num(a.wrapping_mul(b)),
                BinaryOp::Divide => {
                    if b == 0 {
                        return Err(SemanticErrorKind::ConstantDivisionByZero);
                    }
                    ConstValue::Num(a.wrapping_div(b))
                }
                _ => return Ok(None),
            }
        }
        _ => return Ok(None),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;

    fn expr(kind: ExprKind) -> Expr {
        Expr::new(kind, Position::start())
    }

    fn num(value: f64) -> Expr {
        expr(ExprKind::Number {
            value,
            integer: value.fract() == 0.0,
        })
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn no_bindings(_: &str) -> Option<ConstValue> {
        None
    }

    #[test]
    fn folds_arithmetic() {
        // 2 + 3 * 4
        let e = binary(
            BinaryOp::Add,
            num(2.0),
            binary(BinaryOp::Multiply, num(3.0), num(4.0)),
        );
        assert_eq!(
            fold_expr(&e, &no_bindings).unwrap(),
            Some(ConstValue::Num(14))
        );
    }

    #[test]
    fn folds_negation() {
        let e = expr(ExprKind::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(num(5.0)),
        });
        assert_eq!(
            fold_expr(&e, &no_bindings).unwrap(),
            Some(ConstValue::Num(-5))
        );
    }

    #[test]
    fn decimal_truncates() {
        assert_eq!(
            fold_expr(&num(3.9), &no_bindings).unwrap(),
            Some(ConstValue::Num(3))
        );
    }

    #[test]
    fn division_by_zero_is_rejected() {
        let e = binary(BinaryOp::Divide, num(1.0), num(0.0));
        assert!(matches!(
            fold_expr(&e, &no_bindings),
            Err(SemanticErrorKind::ConstantDivisionByZero)
        ));
    }

    #[test]
    fn references_fold_through_bindings() {
        let e = binary(
            BinaryOp::Multiply,
            expr(ExprKind::Identifier("width".into())),
            num(2.0),
        );
        let lookup = |name: &str| {
            (name == "width").then(|| ConstValue::Num(21))
        };
        assert_eq!(fold_expr(&e, &lookup).unwrap(), Some(ConstValue::Num(42)));
    }

    #[test]
    fn runtime_expressions_do_not_fold() {
        let e = expr(ExprKind::Call {
            callee: "f".into(),
            args: Vec::new(),
        });
        assert_eq!(fold_expr(&e, &no_bindings).unwrap(), None);
        // modulo is outside the folded subset
        let e = binary(BinaryOp::Modulo, num(5.0), num(3.0));
        assert_eq!(fold_expr(&e, &no_bindings).unwrap(), None);
    }

    #[test]
    fn text_and_bool_literals_fold() {
        let e = expr(ExprKind::Text("hi".into()));
        assert_eq!(
            fold_expr(&e, &no_bindings).unwrap(),
            Some(ConstValue::Text("hi".into()))
        );
        let e = expr(ExprKind::Bool(true));
        assert_eq!(
            fold_expr(&e, &no_bindings).unwrap(),
            Some(ConstValue::Bool(true))
        );
    }
}
