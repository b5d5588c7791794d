//! Skeletal ARMv7-A backend, the 32-bit sibling of the AArch64 stub. Frames
//! push `fp`/`lr`; syscalls go through `svc #0` with the number in `r7`
//! (write = 4, exit = 1).

use crate::ast::{ExprKind, Program, Statement, StatementKind};
use crate::codegen::assembly::{Asm, Directive};
use crate::codegen::{aarch64::construct_name, CodegenError, LiteralPool};

const TARGET: &str = "arm32";

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
    out.push_str("\tpush {fp, lr}\n");
    out.push_str("\tmov fp, sp\n");
    out.push_str(&body);
    // exit(0)
    out.push_str("\tmov r0, #0\n");
    out.push_str("\tmov r7, #1\n");
    out.push_str("\tsvc #0\n");
    Ok(out)
}

fn emit_statement(
    statement: &Statement,
    pool: &mut LiteralPool,
    out: &mut String,
) -> Result<(), CodegenError> {
    match &statement.kind {
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
    out.push_str("\tmov r0, #1\n");
    out.push_str(&format!("\tldr r1, ={}\n", label));
    out.push_str(&format!("\tmov r2, #{}\n", content.len()));
    out.push_str("\tmov r7, #4\n");
    out.push_str("\tsvc #0\n");
}

fn unsupported(construct: String) -> CodegenError {
    CodegenError::Unsupported {
        target: TARGET,
        construct,
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
    fn prints_literals_with_eabi_syscalls() {
        let program = checked(r#"run { @print["hi"]; };"#);
        let asm = generate(&program).unwrap();
        assert!(asm.contains("push {fp, lr}"));
        assert!(asm.contains("mov r7, #4"));
        assert!(asm.contains("mov r7, #1"));
    }

    #[test]
    fn rejects_loops() {
        let program = checked("run { for [num i = 0; i < 2; i = i + 1] { } };");
        let err = generate(&program).unwrap_err();
        assert!(err.to_string().contains("arm32"));
    }
}
