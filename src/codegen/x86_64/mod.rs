//! The x86-64 backend: a stack-machine lowering of the checked tree.
//! Expressions leave their result in `%rax`; binary operators push the left
//! operand, evaluate the right and pop the left into `%rbx`. Locals live in
//! 8-byte slots at negative offsets from `%rbp`.

use crate::ast::{
    Block, ConstValue, Expr, ExprKind, FunctionDecl, Program, RunBlock, Statement, StatementKind,
    BinaryOp, UnaryOp,
};
use crate::codegen::assembly::{
    Asm, Condition, Directive, Instruction::*, Operand, Register, Register::*,
};
use crate::codegen::{CodegenError, LiteralPool};
use crate::types::{StructRegistry, Type};
use std::collections::HashMap;

pub mod runtime;

use runtime::Runtime;

// operand shorthands shared with the runtime module

pub(crate) fn r(reg: Register) -> Operand {
    Operand::Reg(reg)
}
pub(crate) fn imm(value: i64) -> Operand {
    Operand::Imm(value)
}
pub(crate) fn mem(base: Register, offset: i32) -> Operand {
    Operand::Mem { base, offset }
}
pub(crate) fn idx(base: Register, index: Register, scale: u8) -> Operand {
    Operand::Indexed {
        base,
        index,
        scale,
        offset: 0,
    }
}
pub(crate) fn sym(label: impl Into<String>) -> Operand {
    Operand::Sym(label.into())
}
pub(crate) fn sym_mem(label: impl Into<String>) -> Operand {
    Operand::SymMem(label.into())
}
pub(crate) fn sym_idx(label: impl Into<String>, base: Register) -> Operand {
    Operand::SymIndexed {
        label: label.into(),
        base,
    }
}

pub fn generate(program: &Program, registry: &StructRegistry) -> Result<String, CodegenError> {
    Emitter::new(registry).generate(program)
}

/// Where a name lives inside the emitter.
#[derive(Debug, Clone)]
enum Slot {
    /// 8-byte slot holding a scalar or a pointer; `%rbp`-relative offset.
    Value(i32),
    /// The variable owns a multi-slot region starting at this offset; its
    /// value is the region's address.
    Aggregate(i32),
    /// Folded constant; references lower to immediates or labels.
    Const(ConstValue),
}

struct Emitter<'p> {
    registry: &'p StructRegistry,
    pool: LiteralPool,
    text: Vec<Asm>,
    scopes: Vec<HashMap<String, Slot>>,
    frame_next: i32,
    labels: usize,
    runtime: Runtime,
    in_run: bool,
}

impl<'p> Emitter<'p> {
    fn new(registry: &'p StructRegistry) -> Self {
        Self {
            registry,
            pool: LiteralPool::new(),
            text: Vec::new(),
            scopes: Vec::new(),
            frame_next: 0,
            labels: 0,
            runtime: Runtime::empty(),
            in_run: false,
        }
    }

    fn generate(mut self, program: &Program) -> Result<String, CodegenError> {
        self.text.push(Directive::Global("_start".into()).into());
        self.emit_run(&program.run)?;
        for func in &program.functions {
            self.emit_function(func)?;
        }
        let routines = runtime::expand(self.runtime);
        tracing::debug!(target: "emit", "runtime routines in use: {routines:?}");
        let runtime_text = runtime::emit(routines, &mut self.pool);

        let mut lines: Vec<Asm> = vec![Directive::Data.into()];
        lines.push(Asm::Comment(
            "string_buffer is a single shared arena: string_concat, string_append".into(),
        ));
        lines.push(Asm::Comment(
            "and string_interpolate each overwrite it, so a result must be consumed".into(),
        ));
        lines.push(Asm::Comment(
            "before the next string-building call. temp_buffer (number and char".into(),
        ));
        lines.push(Asm::Comment(
            "conversions) and input_buffer (line input) have the same single-writer".into(),
        ));
        lines.push(Asm::Comment("contract.".into()));
        lines.push(Asm::Label("input_buffer".into()));
        lines.push(Directive::Space(256).into());
        lines.push(Asm::Label("temp_buffer".into()));
        lines.push(Directive::Space(64).into());
        lines.push(Asm::Label("string_buffer".into()));
        lines.push(Directive::Space(4096).into());
        for (label, content) in self.pool.entries() {
            lines.push(Asm::Label(label));
            lines.push(Directive::Asciz(content.to_string()).into());
        }
        lines.push(Directive::Text.into());
        lines.extend(self.text);
        lines.extend(runtime_text);

        let mut out = String::new();
        for line in &lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        Ok(out)
    }

    // small emission helpers

    fn ins(&mut self, instruction: crate::codegen::assembly::Instruction) {
        self.text.push(instruction.into());
    }

    fn label(&mut self, name: &str) {
        self.text.push(Asm::Label(name.to_string()));
    }

    fn fresh_label(&mut self, stem: &str) -> String {
        self.labels += 1;
        format!(".L{}_{}", stem, self.labels)
    }

    fn alloc(&mut self, bytes: i32) -> i32 {
        self.frame_next -= bytes;
        self.frame_next
    }

    fn insert(&mut self, name: &str, slot: Slot) {
        self.scopes
            .last_mut()
            .expect("a scope is always open while emitting")
            .insert(name.to_string(), slot);
    }

    fn slot(&self, name: &str) -> Slot {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .expect("name was resolved by the semantic pass")
    }

    // frame planning: one walk that mirrors the allocation decisions of the
    // emit path, so the prologue can reserve the whole frame up front

    fn frame_bytes(&self, param_count: usize, body: &Block) -> i32 {
        let bytes = 8 * param_count as i32 + self.block_bytes(body);
        (bytes + 15) & !15
    }

    fn block_bytes(&self, block: &Block) -> i32 {
        block.0.iter().map(|s| self.statement_bytes(s)).sum()
    }

    fn statement_bytes(&self, statement: &Statement) -> i32 {
        match &statement.kind {
            StatementKind::Declare {
                comptime: Some(_), ..
            } => 0,
            StatementKind::Declare { ty, init, .. } => {
                match self.region_bytes(ty, init.as_ref()) {
                    Some(region) if !ty.is_nullable() => region,
                    Some(region) => 8 + region,
                    None => 8,
                }
            }
            StatementKind::Assign { value, .. } => match &value.kind {
                ExprKind::ArrayLiteral(elements) => 8 * elements.len() as i32,
                ExprKind::StructLiteral { name, .. } => 8 * self.field_count(name),
                _ => 0,
            },
            StatementKind::If { arms, otherwise } => {
                arms.iter().map(|(_, b)| self.block_bytes(b)).sum::<i32>()
                    + otherwise.as_ref().map_or(0, |b| self.block_bytes(b))
            }
            StatementKind::For { init, body, .. } => {
                self.statement_bytes(init) + self.block_bytes(body)
            }
            StatementKind::Try {
                body, finally_body, ..
            } => {
                self.block_bytes(body)
                    + finally_body.as_ref().map_or(0, |b| self.block_bytes(b))
            }
            StatementKind::Repeat { cases, fixed, .. } => {
                cases.iter().map(|(_, b)| self.block_bytes(b)).sum::<i32>()
                    + fixed.as_ref().map_or(0, |b| self.block_bytes(b))
            }
            StatementKind::Block(block) => self.block_bytes(block),
            _ => 0,
        }
    }

    /// Backing storage a variable of this type owns, when it owns any.
    fn region_bytes(&self, ty: &Type, init: Option<&Expr>) -> Option<i32> {
        match ty {
            Type::Array {
                length: Some(n), ..
            } => Some(8 * *n as i32),
            Type::Array { length: None, .. } => match init {
                Some(Expr {
                    kind: ExprKind::ArrayLiteral(elements),
                    ..
                }) => Some(8 * elements.len() as i32),
                _ => None,
            },
            Type::Struct { name, .. } => Some(8 * self.field_count(name)),
            _ => None,
        }
    }

    fn field_count(&self, name: &str) -> i32 {
        self.registry.fields(name).map_or(0, |f| f.len()) as i32
    }

    fn field_offset(&self, ty: &Type, field: &str) -> i32 {
        let Type::Struct { name, .. } = ty else {
            unreachable!("member access on a non-struct survived the semantic pass")
        };
        8 * self
            .registry
            .field_index(name, field)
            .expect("field was resolved by the semantic pass") as i32
    }

    // functions and the run block

    fn emit_run(&mut self, run: &RunBlock) -> Result<(), CodegenError> {
        self.in_run = true;
        self.scopes = vec![HashMap::new()];
        self.frame_next = 0;
        let frame = self.frame_bytes(0, &run.body);
        log::debug!("run block needs {frame} bytes");
        self.label("_start");
        self.ins(Pushq(r(Rbp)));
        self.ins(Movq {
            src: r(Rsp),
            dst: r(Rbp),
        });
        if frame > 0 {
            self.ins(Subq {
                src: imm(i64::from(frame)),
                dst: r(Rsp),
            });
        }
        self.emit_block_in_scope(&run.body)?;
        self.emit_exit();
        Ok(())
    }

    fn emit_exit(&mut self) {
        self.ins(Movq {
            src: imm(60),
            dst: r(Rax),
        });
        self.ins(Xorq {
            src: r(Rdi),
            dst: r(Rdi),
        });
        self.ins(Syscall);
    }

    fn emit_function(&mut self, func: &FunctionDecl) -> Result<(), CodegenError> {
        self.in_run = false;
        self.scopes = vec![HashMap::new()];
        self.frame_next = 0;
        let frame = self.frame_bytes(func.params.len(), &func.body);
        log::debug!("fn_{} needs {frame} bytes", func.name);
        self.label(&format!("fn_{}", func.name));
        self.ins(Pushq(r(Rbp)));
        self.ins(Movq {
            src: r(Rsp),
            dst: r(Rbp),
        });
        if frame > 0 {
            self.ins(Subq {
                src: imm(i64::from(frame)),
                dst: r(Rsp),
            });
        }
        for (i, param) in func.params.iter().enumerate() {
            let offset = self.alloc(8);
            self.insert(&param.name, Slot::Value(offset));
            if i < Register::ARGS.len() {
                self.ins(Movq {
                    src: r(Register::ARGS[i]),
                    dst: mem(Rbp, offset),
                });
            } else {
                // spilled arguments sit above the saved frame pointer
                let spill = 16 + 8 * (i - Register::ARGS.len()) as i32;
                self.ins(Movq {
                    src: mem(Rbp, spill),
                    dst: r(Rax),
                });
                self.ins(Movq {
                    src: r(Rax),
                    dst: mem(Rbp, offset),
                });
            }
        }
        self.emit_block_in_scope(&func.body)?;
        // implicit return for functions that fall off the end
        self.ins(Xorq {
            src: r(Rax),
            dst: r(Rax),
        });
        self.emit_epilogue();
        Ok(())
    }

    fn emit_epilogue(&mut self) {
        self.ins(Movq {
            src: r(Rbp),
            dst: r(Rsp),
        });
        self.ins(Popq(r(Rbp)));
        self.ins(Ret);
    }

    // statements

    fn emit_block_in_scope(&mut self, block: &Block) -> Result<(), CodegenError> {
        for statement in &block.0 {
            self.emit_statement(statement)?;
        }
        Ok(())
    }

    fn emit_block(&mut self, block: &Block) -> Result<(), CodegenError> {
        self.scopes.push(HashMap::new());
        let result = self.emit_block_in_scope(block);
        self.scopes.pop();
        result
    }

    fn emit_statement(&mut self, statement: &Statement) -> Result<(), CodegenError> {
        match &statement.kind {
            StatementKind::Declare {
                ty,
                name,
                init,
                comptime,
                ..
            } => self.emit_declare(ty, name, init.as_ref(), comptime.as_ref()),
            StatementKind::Assign { name, value } => self.emit_assign(name, value),
            StatementKind::AssignIndex {
                array,
                index,
                value,
            } => {
                self.emit_expr(array)?;
                self.ins(Pushq(r(Rax)));
                self.emit_expr(index)?;
                self.ins(Pushq(r(Rax)));
                self.emit_expr(value)?;
                self.ins(Popq(r(Rbx)));
                self.ins(Popq(r(Rcx)));
                self.ins(Movq {
                    src: r(Rax),
                    dst: idx(Rcx, Rbx, 8),
                });
                Ok(())
            }
            StatementKind::AssignMember {
                object,
                field,
                value,
            } => {
                let offset = self.field_offset(object.checked_ty(), field);
                self.emit_expr(object)?;
                self.ins(Pushq(r(Rax)));
                self.emit_expr(value)?;
                self.ins(Popq(r(Rbx)));
                self.ins(Movq {
                    src: r(Rax),
                    dst: mem(Rbx, offset),
                });
                Ok(())
            }
            StatementKind::If { arms, otherwise } => {
                let end = self.fresh_label("end");
                for (condition, block) in arms {
                    let next = self.fresh_label("next");
                    self.emit_expr(condition)?;
                    self.ins(Cmpq {
                        src: imm(0),
                        dst: r(Rax),
                    });
                    self.ins(J {
                        condition: Condition::Equals,
                        label: next.clone(),
                    });
                    self.emit_block(block)?;
                    self.ins(Jmp(end.clone()));
                    self.label(&next);
                }
                if let Some(block) = otherwise {
                    self.emit_block(block)?;
                }
                self.label(&end);
                Ok(())
            }
            StatementKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                let top = self.fresh_label("top");
                let end = self.fresh_label("end");
                self.scopes.push(HashMap::new());
                let result = (|| {
                    self.emit_statement(init)?;
                    self.label(&top);
                    self.emit_expr(condition)?;
                    self.ins(Cmpq {
                        src: imm(0),
                        dst: r(Rax),
                    });
                    self.ins(J {
                        condition: Condition::Equals,
                        label: end.clone(),
                    });
                    self.emit_block(body)?;
                    self.emit_statement(increment)?;
                    self.ins(Jmp(top.clone()));
                    self.label(&end);
                    Ok(())
                })();
                self.scopes.pop();
                result
            }
            StatementKind::Try {
                body, finally_body, ..
            } => {
                // no unwinding runtime: the try body always runs, the catch
                // body never does, the finally body follows unconditionally
                self.emit_block(body)?;
                if let Some(block) = finally_body {
                    self.emit_block(block)?;
                }
                Ok(())
            }
            StatementKind::Repeat {
                selector,
                cases,
                fixed,
            } => self.emit_repeat(selector, cases, fixed.as_ref()),
            StatementKind::Return(value) => {
                match value {
                    Some(value) => self.emit_expr(value)?,
                    None => self.ins(Xorq {
                        src: r(Rax),
                        dst: r(Rax),
                    }),
                }
                if self.in_run {
                    self.emit_exit();
                } else {
                    self.emit_epilogue();
                }
                Ok(())
            }
            StatementKind::Expr(expr) => self.emit_expr(expr),
            StatementKind::Block(block) => self.emit_block(block),
        }
    }

    fn emit_declare(
        &mut self,
        ty: &Type,
        name: &str,
        init: Option<&Expr>,
        comptime: Option<&ConstValue>,
    ) -> Result<(), CodegenError> {
        // folded constants never touch the stack
        if let Some(value) = comptime {
            self.insert(name, Slot::Const(value.clone()));
            return Ok(());
        }
        match self.region_bytes(ty, init) {
            Some(region) if !ty.is_nullable() => {
                let base = self.alloc(region);
                self.insert(name, Slot::Aggregate(base));
                if let Some(init) = init {
                    self.emit_aggregate_init(base, region, init)?;
                }
                Ok(())
            }
            Some(region) => {
                // nullable aggregates hold a pointer, with a hidden region
                // backing any literal initializer
                let pointer = self.alloc(8);
                self.insert(name, Slot::Value(pointer));
                match init {
                    Some(init)
                        if matches!(
                            init.kind,
                            ExprKind::ArrayLiteral(_) | ExprKind::StructLiteral { .. }
                        ) =>
                    {
                        let base = self.alloc(region);
                        self.emit_aggregate_init(base, region, init)?;
                        self.ins(Leaq {
                            src: mem(Rbp, base),
                            dst: Rax,
                        });
                        self.ins(Movq {
                            src: r(Rax),
                            dst: mem(Rbp, pointer),
                        });
                        Ok(())
                    }
                    Some(init) => {
                        self.emit_expr(init)?;
                        self.ins(Movq {
                            src: r(Rax),
                            dst: mem(Rbp, pointer),
                        });
                        Ok(())
                    }
                    None => Ok(()),
                }
            }
            None => {
                let offset = self.alloc(8);
                self.insert(name, Slot::Value(offset));
                if let Some(init) = init {
                    self.emit_expr(init)?;
                    self.ins(Movq {
                        src: r(Rax),
                        dst: mem(Rbp, offset),
                    });
                }
                Ok(())
            }
        }
    }

    /// Fill a region at `base(%rbp)` from a literal, or copy it from another
    /// aggregate's address.
    fn emit_aggregate_init(
        &mut self,
        base: i32,
        region: i32,
        init: &Expr,
    ) -> Result<(), CodegenError> {
        match &init.kind {
            ExprKind::ArrayLiteral(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    self.emit_expr(element)?;
                    self.ins(Movq {
                        src: r(Rax),
                        dst: mem(Rbp, base + 8 * i as i32),
                    });
                }
                Ok(())
            }
            ExprKind::StructLiteral { name, fields } => {
                for (field, value) in fields {
                    let offset = self
                        .registry
                        .field_index(name, field)
                        .expect("field was resolved by the semantic pass")
                        as i32;
                    self.emit_expr(value)?;
                    self.ins(Movq {
                        src: r(Rax),
                        dst: mem(Rbp, base + 8 * offset),
                    });
                }
                Ok(())
            }
            _ => {
                self.emit_expr(init)?;
                for i in 0..region / 8 {
                    self.ins(Movq {
                        src: mem(Rax, 8 * i),
                        dst: r(Rbx),
                    });
                    self.ins(Movq {
                        src: r(Rbx),
                        dst: mem(Rbp, base + 8 * i),
                    });
                }
                Ok(())
            }
        }
    }

    fn emit_assign(&mut self, name: &str, value: &Expr) -> Result<(), CodegenError> {
        match self.slot(name) {
            Slot::Value(offset) => match &value.kind {
                ExprKind::ArrayLiteral(elements) => {
                    let region = 8 * elements.len() as i32;
                    let base = self.alloc(region);
                    self.emit_aggregate_init(base, region, value)?;
                    self.ins(Leaq {
                        src: mem(Rbp, base),
                        dst: Rax,
                    });
                    self.ins(Movq {
                        src: r(Rax),
                        dst: mem(Rbp, offset),
                    });
                    Ok(())
                }
                ExprKind::StructLiteral {
                    name: struct_name, ..
                } => {
                    let region = 8 * self.field_count(struct_name);
                    let base = self.alloc(region);
                    self.emit_aggregate_init(base, region, value)?;
                    self.ins(Leaq {
                        src: mem(Rbp, base),
                        dst: Rax,
                    });
                    self.ins(Movq {
                        src: r(Rax),
                        dst: mem(Rbp, offset),
                    });
                    Ok(())
                }
                _ => {
                    self.emit_expr(value)?;
                    self.ins(Movq {
                        src: r(Rax),
                        dst: mem(Rbp, offset),
                    });
                    Ok(())
                }
            },
            Slot::Aggregate(base) => match &value.kind {
                ExprKind::ArrayLiteral(_) | ExprKind::StructLiteral { .. } => {
                    // region size is implied by the literal itself
                    let region = match &value.kind {
                        ExprKind::ArrayLiteral(elements) => 8 * elements.len() as i32,
                        ExprKind::StructLiteral { name, .. } => 8 * self.field_count(name),
                        _ => unreachable!(),
                    };
                    self.emit_aggregate_init(base, region, value)
                }
                _ => {
                    let region = match value.checked_ty() {
                        Type::Array {
                            length: Some(n), ..
                        } => 8 * *n as i32,
                        Type::Struct { name, .. } => 8 * self.field_count(name),
                        other => {
                            return Err(CodegenError::Unsupported {
                                target: "x86_64",
                                construct: format!(
                                    "assigning a value of type {} over an owned array",
                                    other
                                ),
                            })
                        }
                    };
                    self.emit_aggregate_init(base, region, value)
                }
            },
            Slot::Const(_) => unreachable!("constant reassignment survived the semantic pass"),
        }
    }

    fn emit_repeat(
        &mut self,
        selector: &Expr,
        cases: &[(Expr, Block)],
        fixed: Option<&Block>,
    ) -> Result<(), CodegenError> {
        tracing::trace!(target: "emit::repeat", "{} cases, fixed arm: {}", cases.len(), fixed.is_some());
        let end = self.fresh_label("end");
        self.emit_expr(selector)?;
        self.ins(Pushq(r(Rax)));
        let mut case_labels = Vec::with_capacity(cases.len());
        for (value, _) in cases {
            let case_label = self.fresh_label("case");
            self.emit_expr(value)?;
            // reload the selector for every comparison; case values are free
            // to clobber %rdx
            self.ins(Movq {
                src: mem(Rsp, 0),
                dst: r(Rdx),
            });
            self.ins(Cmpq {
                src: r(Rdx),
                dst: r(Rax),
            });
            self.ins(J {
                condition: Condition::Equals,
                label: case_label.clone(),
            });
            case_labels.push(case_label);
        }
        let fixed_label = if fixed.is_some() {
            self.fresh_label("fixed")
        } else {
            end.clone()
        };
        self.ins(Jmp(fixed_label.clone()));
        for ((_, block), case_label) in cases.iter().zip(case_labels) {
            self.label(&case_label);
            self.emit_block(block)?;
            // no fallthrough between cases
            self.ins(Jmp(end.clone()));
        }
        if let Some(block) = fixed {
            self.label(&fixed_label);
            self.emit_block(block)?;
        }
        self.label(&end);
        self.ins(Addq {
            src: imm(8),
            dst: r(Rsp),
        });
        Ok(())
    }

    // expressions

    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::Number { value, .. } => {
                self.ins(Movq {
                    src: imm(*value as i64),
                    dst: r(Rax),
                });
                Ok(())
            }
            ExprKind::Text(content) => {
                let label = self.pool.intern(content);
                self.ins(Movq {
                    src: sym(label),
                    dst: r(Rax),
                });
                Ok(())
            }
            ExprKind::Char(value) => {
                self.ins(Movq {
                    src: imm(i64::from(*value)),
                    dst: r(Rax),
                });
                Ok(())
            }
            ExprKind::Bool(value) => {
                self.ins(Movq {
                    src: imm(i64::from(*value)),
                    dst: r(Rax),
                });
                Ok(())
            }
            ExprKind::Null => {
                self.ins(Movq {
                    src: imm(0),
                    dst: r(Rax),
                });
                Ok(())
            }
            ExprKind::Identifier(name) => {
                match self.slot(name) {
                    Slot::Value(offset) => self.ins(Movq {
                        src: mem(Rbp, offset),
                        dst: r(Rax),
                    }),
                    Slot::Aggregate(offset) => self.ins(Leaq {
                        src: mem(Rbp, offset),
                        dst: Rax,
                    }),
                    Slot::Const(value) => self.emit_const(&value),
                }
                Ok(())
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.emit_expr(lhs)?;
                self.ins(Pushq(r(Rax)));
                self.emit_expr(rhs)?;
                self.ins(Popq(r(Rbx)));
                self.emit_binary_op(*op);
                Ok(())
            }
            ExprKind::Unary { op, operand } => {
                self.emit_expr(operand)?;
                match op {
                    UnaryOp::Negate => self.ins(Negq(r(Rax))),
                    UnaryOp::Plus => {}
                    UnaryOp::Not => self.ins(Xorq {
                        src: imm(1),
                        dst: r(Rax),
                    }),
                }
                Ok(())
            }
            ExprKind::Call { callee, args } => self.emit_call(callee, args),
            ExprKind::Interpolation {
                parts,
                exprs,
                formats,
            } => self.emit_interpolation(parts, exprs, formats),
            ExprKind::Concat { lhs, rhs } => self.emit_concat(lhs, rhs),
            ExprKind::Index { target, index } => {
                self.emit_expr(target)?;
                self.ins(Pushq(r(Rax)));
                self.emit_expr(index)?;
                self.ins(Popq(r(Rbx)));
                self.ins(Movq {
                    src: idx(Rbx, Rax, 8),
                    dst: r(Rax),
                });
                Ok(())
            }
            ExprKind::Member { target, field } => {
                let offset = self.field_offset(target.checked_ty(), field);
                self.emit_expr(target)?;
                self.ins(Movq {
                    src: mem(Rax, offset),
                    dst: r(Rax),
                });
                Ok(())
            }
            ExprKind::ArrayLiteral(_) | ExprKind::StructLiteral { .. } => {
                unreachable!("aggregate literal outside a store context survived the semantic pass")
            }
        }
    }

    fn emit_const(&mut self, value: &ConstValue) {
        let src = match value {
            ConstValue::Num(n) => imm(*n),
            ConstValue::Char(c) => imm(i64::from(*c)),
            ConstValue::Bool(b) => imm(i64::from(*b)),
            ConstValue::Text(content) => {
                let label = self.pool.intern(content);
                sym(label)
            }
        };
        self.ins(Movq { src, dst: r(Rax) });
    }

    /// Left operand in `%rbx`, right in `%rax`; the result replaces `%rax`.
    fn emit_binary_op(&mut self, op: BinaryOp) {
        match op {
            BinaryOp::Add => self.ins(Addq {
                src: r(Rbx),
                dst: r(Rax),
            }),
            BinaryOp::Subtract => {
                self.ins(Subq {
                    src: r(Rax),
                    dst: r(Rbx),
                });
                self.ins(Movq {
                    src: r(Rbx),
                    dst: r(Rax),
                });
            }
            BinaryOp::Multiply => self.ins(Imulq {
                src: r(Rbx),
                dst: Rax,
            }),
            BinaryOp::Divide | BinaryOp::Modulo => {
                // dividend is the left operand
                self.ins(Movq {
                    src: r(Rax),
                    dst: r(Rcx),
                });
                self.ins(Movq {
                    src: r(Rbx),
                    dst: r(Rax),
                });
                self.ins(Cqto);
                self.ins(Idivq(r(Rcx)));
                if op == BinaryOp::Modulo {
                    self.ins(Movq {
                        src: r(Rdx),
                        dst: r(Rax),
                    });
                }
            }
            BinaryOp::LogicAnd => self.ins(Andq {
                src: r(Rbx),
                dst: r(Rax),
            }),
            BinaryOp::LogicOr => self.ins(Orq {
                src: r(Rbx),
                dst: r(Rax),
            }),
            BinaryOp::Equals
            | BinaryOp::NotEquals
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => {
                // flags of left minus right
                self.ins(Cmpq {
                    src: r(Rax),
                    dst: r(Rbx),
                });
                self.ins(Set {
                    condition: condition_for(op),
                    dst: r(Rax),
                });
                self.ins(Movzbq {
                    src: r(Rax),
                    dst: Rax,
                });
            }
        }
    }

    fn emit_call(&mut self, callee: &str, args: &[Expr]) -> Result<(), CodegenError> {
        match callee {
            "print" => self.emit_print(&args[0]),
            "read" => {
                self.emit_prompt(args.first())?;
                self.runtime |= Runtime::READ_STRING;
                self.ins(Call("read_string".into()));
                Ok(())
            }
            "num.read" => self.emit_typed_read(args.first(), "string_to_num", Runtime::STRING_TO_NUM),
            "text.read" => {
                self.emit_prompt(args.first())?;
                self.runtime |= Runtime::READ_STRING;
                self.ins(Call("read_string".into()));
                Ok(())
            }
            "char.read" => {
                self.emit_typed_read(args.first(), "string_to_char", Runtime::STRING_TO_CHAR)
            }
            "bool.read" => {
                self.emit_typed_read(args.first(), "string_to_bool", Runtime::STRING_TO_BOOL)
            }
            _ => {
                for arg in args.iter().rev() {
                    self.emit_expr(arg)?;
                    self.ins(Pushq(r(Rax)));
                }
                for i in 0..args.len().min(Register::ARGS.len()) {
                    self.ins(Popq(r(Register::ARGS[i])));
                }
                self.ins(Call(format!("fn_{}", callee)));
                if args.len() > Register::ARGS.len() {
                    let spilled = (args.len() - Register::ARGS.len()) as i64;
                    self.ins(Addq {
                        src: imm(8 * spilled),
                        dst: r(Rsp),
                    });
                }
                Ok(())
            }
        }
    }

    /// `print` chooses the converter from the argument's checked type; text
    /// goes straight to print_string. A line feed follows the value.
    fn emit_print(&mut self, arg: &Expr) -> Result<(), CodegenError> {
        self.emit_expr(arg)?;
        self.ins(Movq {
            src: r(Rax),
            dst: r(Rdi),
        });
        match arg.checked_ty() {
            Type::Text { .. } => {}
            Type::Num { .. } => {
                self.runtime |= Runtime::NUM_TO_STRING;
                self.ins(Call("num_to_string".into()));
                self.ins(Movq {
                    src: r(Rax),
                    dst: r(Rdi),
                });
            }
            Type::Char { .. } => {
                self.runtime |= Runtime::CHAR_TO_STRING;
                self.ins(Call("char_to_string".into()));
                self.ins(Movq {
                    src: r(Rax),
                    dst: r(Rdi),
                });
            }
            Type::Bool { .. } => {
                self.runtime |= Runtime::BOOL_TO_STRING;
                self.ins(Call("bool_to_string".into()));
                self.ins(Movq {
                    src: r(Rax),
                    dst: r(Rdi),
                });
            }
            other => unreachable!("print of {} survived the semantic pass", other),
        }
        self.runtime |= Runtime::PRINT_STRING;
        self.ins(Call("print_string".into()));
        let newline = self.pool.intern("\n");
        self.ins(Movq {
            src: sym(newline),
            dst: r(Rdi),
        });
        self.ins(Call("print_string".into()));
        Ok(())
    }

    fn emit_prompt(&mut self, prompt: Option<&Expr>) -> Result<(), CodegenError> {
        if let Some(prompt) = prompt {
            self.emit_expr(prompt)?;
            self.ins(Movq {
                src: r(Rax),
                dst: r(Rdi),
            });
            self.runtime |= Runtime::PRINT_STRING;
            self.ins(Call("print_string".into()));
        }
        Ok(())
    }

    fn emit_typed_read(
        &mut self,
        prompt: Option<&Expr>,
        converter: &str,
        flag: Runtime,
    ) -> Result<(), CodegenError> {
        self.emit_prompt(prompt)?;
        self.runtime |= Runtime::READ_STRING | flag;
        self.ins(Call("read_string".into()));
        self.ins(Movq {
            src: r(Rax),
            dst: r(Rdi),
        });
        self.ins(Call(converter.to_string()));
        Ok(())
    }

    /// `lhs +>> rhs`. Operands are converted to text first; a converted left
    /// operand is parked in the arena (its image lives in temp_buffer, which
    /// the right side's conversion would overwrite).
    fn emit_concat(&mut self, lhs: &Expr, rhs: &Expr) -> Result<(), CodegenError> {
        self.runtime |= Runtime::STRING_CONCAT;
        self.emit_expr(lhs)?;
        if self.emit_to_text(lhs.checked_ty()) {
            let empty = self.pool.intern("");
            self.ins(Movq {
                src: r(Rax),
                dst: r(Rdi),
            });
            self.ins(Movq {
                src: sym(empty),
                dst: r(Rsi),
            });
            self.ins(Call("string_concat".into()));
        }
        self.ins(Pushq(r(Rax)));
        self.emit_expr(rhs)?;
        self.emit_to_text(rhs.checked_ty());
        self.ins(Movq {
            src: r(Rax),
            dst: r(Rsi),
        });
        self.ins(Popq(r(Rdi)));
        self.ins(Call("string_concat".into()));
        Ok(())
    }

    /// Convert `%rax` to a string pointer according to the checked type.
    /// Returns true when the conversion went through temp_buffer.
    fn emit_to_text(&mut self, ty: &Type) -> bool {
        match ty {
            Type::Text { .. } => false,
            Type::Num { .. } => {
                self.runtime |= Runtime::NUM_TO_STRING;
                self.ins(Movq {
                    src: r(Rax),
                    dst: r(Rdi),
                });
                self.ins(Call("num_to_string".into()));
                true
            }
            Type::Char { .. } => {
                self.runtime |= Runtime::CHAR_TO_STRING;
                self.ins(Movq {
                    src: r(Rax),
                    dst: r(Rdi),
                });
                self.ins(Call("char_to_string".into()));
                true
            }
            Type::Bool { .. } => {
                self.runtime |= Runtime::BOOL_TO_STRING;
                self.ins(Movq {
                    src: r(Rax),
                    dst: r(Rdi),
                });
                self.ins(Call("bool_to_string".into()));
                false
            }
            other => unreachable!("text conversion of {} survived the semantic pass", other),
        }
    }

    /// Push the interpolation frame and call the runtime builder. Explicit
    /// format specifiers are honored; without one, the expression's checked
    /// type picks the conversion.
    fn emit_interpolation(
        &mut self,
        parts: &[String],
        exprs: &[Expr],
        formats: &[Option<crate::lexer::FormatSpec>],
    ) -> Result<(), CodegenError> {
        self.runtime |= Runtime::STRING_INTERPOLATE;
        for i in (0..exprs.len()).rev() {
            let format = match formats[i] {
                Some(spec) => spec.as_str(),
                None => match exprs[i].checked_ty() {
                    Type::Text { .. } => ":s",
                    Type::Char { .. } => ":c",
                    Type::Bool { .. } => ":b",
                    _ => ":d",
                },
            };
            let format_label = self.pool.intern(format);
            self.ins(Pushq(sym(format_label)));
            self.emit_expr(&exprs[i])?;
            self.ins(Pushq(r(Rax)));
        }
        for part in parts.iter().rev() {
            let part_label = self.pool.intern(part);
            self.ins(Pushq(sym(part_label)));
        }
        self.ins(Pushq(imm(parts.len() as i64)));
        self.ins(Pushq(imm(exprs.len() as i64)));
        self.ins(Call("string_interpolate".into()));
        Ok(())
    }
}

const fn condition_for(op: BinaryOp) -> Condition {
    match op {
        BinaryOp::Equals => Condition::Equals,
        BinaryOp::NotEquals => Condition::NotEquals,
        BinaryOp::Less => Condition::LessThan,
        BinaryOp::LessEqual => Condition::LessEqual,
        BinaryOp::Greater => Condition::GreaterThan,
        BinaryOp::GreaterEqual => Condition::GreaterEqual,
        _ => unreachable!(),
    }
}
