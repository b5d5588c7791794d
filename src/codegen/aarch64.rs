//! Skeletal AArch64 backend. It lays out the same sections as the x86-64
//! backend and can run programs that print text literals; everything else
//! reports an unsupported-construct error. Syscalls go through `svc #0`
//! with the number in `x8` (write = 64, exit = 93); frames are `x29`/`x30`
//! pairs kept 16-byte aligned.

use crate::ast::{ExprKind, Program, Statement, StatementKind};
use crate::codegen::assembly::{Asm, Directive};
use crate::codegen::{CodegenError, LiteralPool};

const TARGET: &str = "aarch64";

pub fn generate(program: &Program) -> Result<String, CodegenError> {
    if let Some(func) = program.functions.first() {
        return Err(unsupported(format!("function `{}`", func.name)));
    }
    let mut pool = LiteralPool::new();
    let mut body = String::new();
    for statement in &program.run.body.0 {
        emit_statement(statement, &mut pool, &mut body)?;
    }

    let mut out = String::new();
    out.push_str("\t.data\n");
    for (label, content) in pool.entries() {
        out.push_str(&format!("{}\n", Asm::Label(label)));
        out.push_str(&format!("{}\n", Asm::Directive(Directive::Asciz(content.to_string()))));
    }
    out.push_str("\t.text\n");
    out.push_str("\t.global _start\n");
    out.push_str("_start:\n");
    out.push_str("\tstp x29, x30, [sp, #-16]!\n");
    out.push_str("\tmov x29, sp\n");
    out.push_str(&body);
    // exit(0)
    out.push_str("\tmov x0, #0\n");
    out.push_str("\tmov x8, #93\n");
    out.push_str("\tsvc #0\n");
    Ok(out)
}

fn emit_statement(
    statement: &Statement,
    pool: &mut LiteralPool,
    out: &mut String,
) -> Result<(), CodegenError> {
    match &statement.kind {
        // folded constants need no code
        StatementKind::Declare {
            comptime: Some(_), ..
        } => Ok(()),
        StatementKind::Expr(expr) => match &expr.kind {
            ExprKind::Call { callee, args } if callee == "print" => {
                match args.first().map(|a| &a.kind) {
                    Some(ExprKind::Text(content)) => {
                        emit_write(content, pool, out);
                        emit_write("\n", pool, out);
                        Ok(())
                    }
                    _ => Err(unsupported("printing a non-literal value".into())),
                }
            }
            ExprKind::Call { callee, .. } => Err(unsupported(format!("call to `@{}`", callee))),
            _ => Err(unsupported("this expression statement".into())),
        },
        other => Err(unsupported(construct_name(other).into())),
    }
}

fn emit_write(content: &str, pool: &mut LiteralPool, out: &mut String) {
    let label = pool.intern(content);
    out.push_str("\tmov x0, #1\n");
    out.push_str(&format!("\tldr x1, ={}\n", label));
    out.push_str(&format!("\tmov x2, #{}\n", content.len()));
    out.push_str("\tmov x8, #64\n");
    out.push_str("\tsvc #0\n");
}

fn unsupported(construct: String) -> CodegenError {
    CodegenError::Unsupported {
        target: TARGET,
        construct,
    }
}

pub(super) fn construct_name(kind: &StatementKind) -> &'static str {
    match kind {
        StatementKind::Declare { .. } => "variable declarations",
        StatementKind::Assign { .. } => "assignments",
        StatementKind::AssignIndex { .. } => "array element assignments",
        StatementKind::AssignMember { .. } => "member assignments",
        StatementKind::If { .. } => "if statements",
        StatementKind::For { .. } => "for loops",
        StatementKind::Try { .. } => "try statements",
        StatementKind::Repeat { .. } => "repeat statements",
        StatementKind::Return(_) => "return statements",
        StatementKind::Expr(_) => "expression statements",
        StatementKind::Block(_) => "blocks",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceMetadata;
    use crate::grammar::Parser;
    use crate::lexer::Lexer;
    use crate::semantic;

    fn checked(source: &'static str) -> Program {
        let meta = Box::leak(Box::new(SourceMetadata::new(source)));
        let tokens = Lexer::new(meta).tokenize().unwrap();
        let mut program: Program = Parser::new(tokens, meta).parse().unwrap();
        semantic::analyze(&mut program, meta).unwrap();
        program
    }

    #[test]
    fn prints_literals_with_aarch64_syscalls() {
        let program = checked(r#"run { @print["Hello"]; };"#);
        let asm = generate(&program).unwrap();
        assert!(asm.contains("_start:"));
        assert!(asm.contains("mov x8, #64"));
        assert!(asm.contains("mov x8, #93"));
        assert!(asm.contains("svc #0"));
        assert!(asm.contains(".asciz \"Hello\""));
    }

    #[test]
    fn rejects_everything_else() {
        let program = checked("run { num x = 1; };");
        let err = generate(&program).unwrap_err();
        assert!(err.to_string().contains("not supported by the aarch64 backend"));
    }
}
