use crate::ast::{
    BinaryOp, Block, ConstValue, Expr, ExprKind, Program, Statement, StatementKind, UnaryOp,
};
use crate::error::{self, Position, SourceMetadata};
use crate::types::{StructRegistry, Type};
use itertools::Itertools;
use std::collections::HashMap;
use thiserror::Error;

pub mod fold;

pub type SemanticError = error::Error<SemanticErrorKind>;
type SemRes<T> = Result<T, SemanticError>;

#[derive(Debug, Error)]
pub enum SemanticErrorKind {
    #[error("undefined name `{0}`")]
    UndefinedName(String),
    #[error("duplicate declaration of `{0}`")]
    DuplicateDeclaration(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown function `@{0}`")]
    UnknownFunction(String),
    #[error("`{0}` is a builtin and cannot be redefined")]
    ReservedFunctionName(String),
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: Type, found: Type },
    #[error("cannot assign null to non-nullable {0}")]
    NullToNonNullable(Type),
    #[error("Cannot reassign constant {0}")]
    ReassignedConstant(String),
    #[error("constant `{0}` has no initializer")]
    ConstantWithoutInitializer(String),
    #[error("constant `{0}` must be initialized from a compile-time constant expression")]
    NonConstantInitializer(String),
    #[error("division by zero in constant expression")]
    ConstantDivisionByZero,
    #[error("`@{callee}` expects {expected} arguments, got {found}")]
    WrongArity {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid operands to `{op}`: {lhs} and {rhs}")]
    InvalidBinaryOperands { op: BinaryOp, lhs: Type, rhs: Type },
    #[error("invalid operand to `{op}`: {operand}")]
    InvalidUnaryOperand { op: UnaryOp, operand: Type },
    #[error("condition must be a bool, got {0}")]
    NonBoolCondition(Type),
    #[error("variables cannot have type void")]
    VoidVariable,
    #[error("array access requires an array variable, got {0}")]
    NotAnArray(Type),
    #[error("array access is only supported on a plain array variable")]
    ComplexArrayTarget,
    #[error("array index must be numeric, got {0}")]
    NonNumericIndex(Type),
    #[error("array literal of {found} elements does not fit {expected}")]
    ArrayLengthMismatch { expected: Type, found: usize },
    #[error("array literals are only allowed as declaration initializers")]
    MisplacedArrayLiteral,
    #[error("an array literal cannot initialize {0}")]
    ArrayLiteralForNonArray(Type),
    #[error("struct literals are only allowed in declarations and assignments")]
    MisplacedStructLiteral,
    #[error("{0} has no fields")]
    NotAStruct(Type),
    #[error("struct `{0}` has no field `{1}`")]
    UnknownField(String, String),
    #[error("struct literal for `{name}` is missing {missing}")]
    MissingFields { name: String, missing: String },
    #[error("`{0}` cannot be printed")]
    NotPrintable(Type),
    #[error("`{0}` cannot be interpolated into text")]
    NotInterpolable(Type),
    #[error("`+>>` cannot convert {0} to text")]
    InvalidConcatOperand(Type),
}

struct Binding {
    ty: Type,
    constant: bool,
    comptime: Option<ConstValue>,
}

struct Signature {
    params: Vec<Type>,
    ret: Type,
}

const RESERVED_CALLEES: &[&str] = &["print", "read"];

/// Two forward passes: registration of structs and function signatures, then
/// scoped checking of every body. On success the tree carries a type on
/// every expression and a folded value on every constant declaration, and
/// the returned registry describes all struct layouts.
pub fn analyze(
    program: &mut Program,
    meta: &SourceMetadata,
) -> Result<StructRegistry, SemanticError> {
    let mut analyzer = Analyzer {
        meta,
        registry: StructRegistry::new(),
        functions: HashMap::new(),
        scopes: Vec::new(),
        current_return: Type::Void,
    };
    analyzer.register_declarations(program)?;
    tracing::debug!(
        target: "semantic::register",
        "{} structs and {} functions registered",
        program.structs.len(),
        program.functions.len()
    );
    analyzer.check_program(program)?;
    Ok(analyzer.registry)
}

struct Analyzer<'a, 'source> {
    meta: &'a SourceMetadata<'source>,
    registry: StructRegistry,
    functions: HashMap<String, Signature>,
    scopes: Vec<HashMap<String, Binding>>,
    current_return: Type,
}

impl<'a, 'source> Analyzer<'a, 'source> {
    fn error<T>(&self, pos: Position, kind: SemanticErrorKind) -> SemRes<T> {
        Err(SemanticError::new(kind).with_position(pos, self.meta))
    }

    // pass 1

    fn register_declarations(&mut self, program: &Program) -> SemRes<()> {
        for decl in &program.structs {
            if !self.registry.register(&decl.name, decl.fields.clone()) {
                return self.error(
                    decl.pos,
                    SemanticErrorKind::DuplicateDeclaration(decl.name.clone()),
                );
            }
        }
        // field types can only be validated once every struct has a name
        for decl in &program.structs {
            for field in &decl.fields {
                self.validate_type(&field.ty, decl.pos)?;
            }
        }
        for func in &program.functions {
            if RESERVED_CALLEES.contains(&func.name.as_str()) {
                return self.error(
                    func.pos,
                    SemanticErrorKind::ReservedFunctionName(func.name.clone()),
                );
            }
            if self.functions.contains_key(&func.name) {
                return self.error(
                    func.pos,
                    SemanticErrorKind::DuplicateDeclaration(func.name.clone()),
                );
            }
            for param in &func.params {
                self.validate_type(&param.ty, func.pos)?;
            }
            self.validate_type(&func.ret, func.pos)?;
            self.functions.insert(
                func.name.clone(),
                Signature {
                    params: func.params.iter().map(|p| p.ty.clone()).collect(),
                    ret: func.ret.clone(),
                },
            );
        }
        Ok(())
    }

    fn validate_type(&self, ty: &Type, pos: Position) -> SemRes<()> {
        match ty {
            Type::Struct { name, .. } => {
                if self.registry.contains(name) {
                    Ok(())
                } else {
                    self.error(pos, SemanticErrorKind::UnknownType(name.clone()))
                }
            }
            Type::Array { element, .. } => self.validate_type(element, pos),
            _ => Ok(()),
        }
    }

    // pass 2

    fn check_program(&mut self, program: &mut Program) -> SemRes<()> {
        let functions = std::mem::take(&mut program.functions);
        let mut checked = Vec::with_capacity(functions.len());
        for mut func in functions {
            self.scopes.clear();
            self.scopes.push(HashMap::new());
            for param in &func.params {
                if param.ty == Type::Void {
                    return self.error(func.pos, SemanticErrorKind::VoidVariable);
                }
                if self.lookup(&param.name).is_some() {
                    return self.error(
                        func.pos,
                        SemanticErrorKind::DuplicateDeclaration(param.name.clone()),
                    );
                }
                self.scopes.last_mut().unwrap().insert(
                    param.name.clone(),
                    Binding {
                        ty: param.ty.clone(),
                        constant: param.constant,
                        comptime: None,
                    },
                );
            }
            self.current_return = func.ret.clone();
            self.check_block_in_place(&mut func.body)?;
            checked.push(func);
        }
        program.functions = checked;

        self.scopes.clear();
        self.scopes.push(HashMap::new());
        self.current_return = Type::Void;
        self.check_block_in_place(&mut program.run.body)
    }

    /// Check a block's statements inside the current scope.
    fn check_block_in_place(&mut self, block: &mut Block) -> SemRes<()> {
        for statement in &mut block.0 {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    /// Check a block inside a fresh nested scope.
    fn check_block(&mut self, block: &mut Block) -> SemRes<()> {
        self.scopes.push(HashMap::new());
        let result = self.check_block_in_place(block);
        self.scopes.pop();
        result
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn check_statement(&mut self, statement: &mut Statement) -> SemRes<()> {
        let pos = statement.pos;
        match &mut statement.kind {
            StatementKind::Declare {
                ty,
                name,
                init,
                constant,
                comptime,
            } => {
                let (ty, name, constant) = (ty.clone(), name.clone(), *constant);
                self.validate_type(&ty, pos)?;
                if ty == Type::Void {
                    return self.error(pos, SemanticErrorKind::VoidVariable);
                }
                // no shadowing anywhere up the scope chain
                if self.lookup(&name).is_some() {
                    return self
                        .error(pos, SemanticErrorKind::DuplicateDeclaration(name.clone()));
                }
                if constant && init.is_none() {
                    return self
                        .error(pos, SemanticErrorKind::ConstantWithoutInitializer(name.clone()));
                }
                if let Some(init) = init.as_mut() {
                    self.check_initializer(&ty, init, pos)?;
                }
                let folded = if constant {
                    let init = init.as_ref().expect("checked above");
                    let value = fold::fold_expr(init, &|n| {
                        self.lookup(n).and_then(|b| b.comptime.clone())
                    })
                    .map_err(|kind| SemanticError::new(kind).with_position(pos, self.meta))?;
                    match value {
                        Some(value) => Some(value),
                        None => {
                            return self.error(
                                pos,
                                SemanticErrorKind::NonConstantInitializer(name.clone()),
                            )
                        }
                    }
                } else {
                    None
                };
                *comptime = folded.clone();
                self.scopes.last_mut().unwrap().insert(
                    name.clone(),
                    Binding {
                        ty,
                        constant,
                        comptime: folded,
                    },
                );
                Ok(())
            }
            StatementKind::Assign { name, value } => {
                let name = name.clone();
                let Some(binding) = self.lookup(&name) else {
                    return self.error(pos, SemanticErrorKind::UndefinedName(name));
                };
                if binding.constant {
                    return self.error(pos, SemanticErrorKind::ReassignedConstant(name));
                }
                let target_ty = binding.ty.clone();
                self.check_initializer(&target_ty, value, pos)
            }
            StatementKind::AssignIndex {
                array,
                index,
                value,
            } => {
                let element = self.check_array_access(array, index)?;
                let found = self.type_of(value)?;
                self.require_assignable(&element, &found, value.pos)
            }
            StatementKind::AssignMember {
                object,
                field,
                value,
            } => {
                let field_ty = self.member_type(object, field, pos)?;
                let found = self.type_of(value)?;
                self.require_assignable(&field_ty, &found, value.pos)
            }
            StatementKind::If { arms, otherwise } => {
                for (condition, block) in arms {
                    let cond_ty = self.type_of(condition)?;
                    if !cond_ty.is_bool() {
                        return self
                            .error(condition.pos, SemanticErrorKind::NonBoolCondition(cond_ty));
                    }
                    self.check_block(block)?;
                }
                if let Some(block) = otherwise {
                    self.check_block(block)?;
                }
                Ok(())
            }
            StatementKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                // the init declaration lives in its own scope around the loop
                self.scopes.push(HashMap::new());
                let result = (|| {
                    self.check_statement(init)?;
                    let cond_ty = self.type_of(condition)?;
                    if !cond_ty.is_bool() {
                        return self
                            .error(condition.pos, SemanticErrorKind::NonBoolCondition(cond_ty));
                    }
                    self.check_statement(increment)?;
                    self.check_block(body)
                })();
                self.scopes.pop();
                result
            }
            StatementKind::Try {
                body,
                catch_name,
                catch_body,
                finally_body,
            } => {
                self.check_block(body)?;
                self.scopes.push(HashMap::new());
                self.scopes.last_mut().unwrap().insert(
                    catch_name.clone(),
                    Binding {
                        ty: Type::TEXT,
                        constant: true,
                        comptime: None,
                    },
                );
                let result = self.check_block_in_place(catch_body);
                self.scopes.pop();
                result?;
                if let Some(block) = finally_body {
                    self.check_block(block)?;
                }
                Ok(())
            }
            StatementKind::Repeat {
                selector,
                cases,
                fixed,
            } => {
                let selector_ty = self.type_of(selector)?;
                for (value, block) in cases {
                    let value_ty = self.type_of(value)?;
                    if value_ty != selector_ty {
                        return self.error(
                            value.pos,
                            SemanticErrorKind::TypeMismatch {
                                expected: selector_ty,
                                found: value_ty,
                            },
                        );
                    }
                    self.check_block(block)?;
                }
                if let Some(block) = fixed {
                    self.check_block(block)?;
                }
                Ok(())
            }
            StatementKind::Return(value) => {
                let expected = self.current_return.clone();
                match value {
                    None => {
                        if expected == Type::Void {
                            Ok(())
                        } else {
                            self.error(
                                pos,
                                SemanticErrorKind::TypeMismatch {
                                    expected,
                                    found: Type::Void,
                                },
                            )
                        }
                    }
                    Some(value) => {
                        let found = self.type_of(value)?;
                        self.require_assignable(&expected, &found, value.pos)
                    }
                }
            }
            StatementKind::Expr(expr) => self.type_of(expr).map(|_| ()),
            StatementKind::Block(block) => self.check_block(block),
        }
    }

    /// Declared-type-directed check of an initializer or assignment value.
    /// Array and struct literals are only legal here, where the backend has
    /// a destination to store them into.
    fn check_initializer(&mut self, target: &Type, value: &mut Expr, pos: Position) -> SemRes<()> {
        match &mut value.kind {
            ExprKind::ArrayLiteral(elements) => {
                let Type::Array {
                    element, length, ..
                } = target
                else {
                    return self.error(
                        pos,
                        SemanticErrorKind::ArrayLiteralForNonArray(target.clone()),
                    );
                };
                let element = element.as_ref().clone();
                let count = elements.len();
                if let Some(length) = *length {
                    if count != length as usize {
                        return self.error(
                            value.pos,
                            SemanticErrorKind::ArrayLengthMismatch {
                                expected: target.clone(),
                                found: count,
                            },
                        );
                    }
                }
                for item in elements.iter_mut() {
                    let found = self.type_of(item)?;
                    self.require_assignable(&element, &found, item.pos)?;
                }
                value.ty = Some(target.clone());
                Ok(())
            }
            ExprKind::StructLiteral { .. } => {
                let found = self.check_struct_literal(value)?;
                self.require_assignable(target, &found, value.pos)
            }
            _ => {
                let found = self.type_of(value)?;
                self.require_assignable(target, &found, value.pos)
            }
        }
    }

    fn require_assignable(&self, target: &Type, found: &Type, pos: Position) -> SemRes<()> {
        if target.assignable_from(found) {
            return Ok(());
        }
        if matches!(found, Type::Null) {
            return self.error(pos, SemanticErrorKind::NullToNonNullable(target.clone()));
        }
        self.error(
            pos,
            SemanticErrorKind::TypeMismatch {
                expected: target.clone(),
                found: found.clone(),
            },
        )
    }

    /// Validate `target[index]` and return the element type. The receiver
    /// must be a plain array variable.
    fn check_array_access(&mut self, target: &mut Expr, index: &mut Expr) -> SemRes<Type> {
        let ExprKind::Identifier(name) = &target.kind else {
            return self.error(target.pos, SemanticErrorKind::ComplexArrayTarget);
        };
        let Some(binding) = self.lookup(name) else {
            return self.error(target.pos, SemanticErrorKind::UndefinedName(name.clone()));
        };
        let array_ty = binding.ty.clone();
        let Type::Array { element, .. } = &array_ty else {
            return self.error(target.pos, SemanticErrorKind::NotAnArray(array_ty.clone()));
        };
        let element = element.as_ref().clone();
        target.ty = Some(array_ty.clone());
        let index_ty = self.type_of(index)?;
        if !index_ty.is_numeric() {
            return self.error(index.pos, SemanticErrorKind::NonNumericIndex(index_ty));
        }
        Ok(element)
    }

    fn member_type(&mut self, object: &mut Expr, field: &str, pos: Position) -> SemRes<Type> {
        let object_ty = self.type_of(object)?;
        let Type::Struct { name, .. } = &object_ty else {
            return self.error(pos, SemanticErrorKind::NotAStruct(object_ty));
        };
        match self.registry.field(name, field) {
            Some(f) => Ok(f.ty.clone()),
            None => self.error(
                pos,
                SemanticErrorKind::UnknownField(name.clone(), field.to_string()),
            ),
        }
    }

    fn check_struct_literal(&mut self, expr: &mut Expr) -> SemRes<Type> {
        let pos = expr.pos;
        let ExprKind::StructLiteral { name, fields } = &mut expr.kind else {
            unreachable!("caller matched the literal")
        };
        let name = name.clone();
        let Some(declared) = self.registry.fields(&name).map(<[_]>::to_vec) else {
            return self.error(pos, SemanticErrorKind::UnknownType(name));
        };
        for (field_name, value) in fields.iter_mut() {
            let Some(field) = declared.iter().find(|f| &f.name == field_name) else {
                return self.error(
                    value.pos,
                    SemanticErrorKind::UnknownField(name.clone(), field_name.clone()),
                );
            };
            let field_ty = field.ty.clone();
            let found = self.type_of(value)?;
            self.require_assignable(&field_ty, &found, value.pos)?;
        }
        let missing = declared
            .iter()
            .filter(|f| !fields.iter().any(|(n, _)| n == &f.name))
            .map(|f| format!("`{}`", f.name))
            .join(", ");
        if !missing.is_empty() {
            return self.error(pos, SemanticErrorKind::MissingFields { name, missing });
        }
        let ty = Type::Struct {
            name,
            nullable: false,
        };
        expr.ty = Some(ty.clone());
        Ok(ty)
    }

    /// Compute, record and return an expression's type.
    fn type_of(&mut self, expr: &mut Expr) -> SemRes<Type> {
        let pos = expr.pos;
        let ty = match &mut expr.kind {
            ExprKind::Number { .. } => Type::NUM,
            ExprKind::Text(_) => Type::TEXT,
            ExprKind::Char(_) => Type::CHAR,
            ExprKind::Bool(_) => Type::BOOL,
            ExprKind::Null => Type::Null,
            ExprKind::Identifier(name) => match self.lookup(name) {
                Some(binding) => binding.ty.clone(),
                None => {
                    return self.error(pos, SemanticErrorKind::UndefinedName(name.clone()))
                }
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let lhs_ty = self.type_of(lhs)?;
                let rhs_ty = self.type_of(rhs)?;
                if op.is_arithmetic() {
                    if lhs_ty.is_numeric() && rhs_ty.is_numeric() {
                        Type::NUM
                    } else {
                        return self.error(
                            pos,
                            SemanticErrorKind::InvalidBinaryOperands {
                                op,
                                lhs: lhs_ty,
                                rhs: rhs_ty,
                            },
                        );
                    }
                } else if op.is_comparison() {
                    if lhs_ty == rhs_ty {
                        Type::BOOL
                    } else {
                        return self.error(
                            pos,
                            SemanticErrorKind::InvalidBinaryOperands {
                                op,
                                lhs: lhs_ty,
                                rhs: rhs_ty,
                            },
                        );
                    }
                } else {
                    debug_assert!(op.is_logical());
                    if lhs_ty.is_bool() && rhs_ty.is_bool() {
                        Type::BOOL
                    } else {
                        return self.error(
                            pos,
                            SemanticErrorKind::InvalidBinaryOperands {
                                op,
                                lhs: lhs_ty,
                                rhs: rhs_ty,
                            },
                        );
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                let operand_ty = self.type_of(operand)?;
                let ok = match op {
                    UnaryOp::Negate | UnaryOp::Plus => operand_ty.is_numeric(),
                    UnaryOp::Not => operand_ty.is_bool(),
                };
                if !ok {
                    return self.error(
                        pos,
                        SemanticErrorKind::InvalidUnaryOperand {
                            op,
                            operand: operand_ty,
                        },
                    );
                }
                operand_ty
            }
            ExprKind::Call { .. } => self.check_call(expr)?,
            ExprKind::Interpolation { exprs, .. } => {
                for item in exprs.iter_mut() {
                    let item_ty = self.type_of(item)?;
                    if !item_ty.is_printable() {
                        return self
                            .error(item.pos, SemanticErrorKind::NotInterpolable(item_ty));
                    }
                }
                Type::TEXT
            }
            ExprKind::Concat { lhs, rhs } => {
                for side in [lhs.as_mut(), rhs.as_mut()] {
                    let side_ty = self.type_of(side)?;
                    if !side_ty.is_printable() {
                        return self
                            .error(side.pos, SemanticErrorKind::InvalidConcatOperand(side_ty));
                    }
                }
                Type::TEXT
            }
            ExprKind::ArrayLiteral(_) => {
                return self.error(pos, SemanticErrorKind::MisplacedArrayLiteral)
            }
            ExprKind::Index { target, index } => {
                self.check_array_access(target, index)?
            }
            ExprKind::Member { target, field } => {
                let field = field.clone();
                self.member_type(target, &field, pos)?
            }
            ExprKind::StructLiteral { .. } => {
                return self.error(pos, SemanticErrorKind::MisplacedStructLiteral)
            }
        };
        expr.ty = Some(ty.clone());
        Ok(ty)
    }

    fn check_call(&mut self, expr: &mut Expr) -> SemRes<Type> {
        let pos = expr.pos;
        let ExprKind::Call { callee, args } = &mut expr.kind else {
            unreachable!("caller matched the call")
        };
        let callee = callee.clone();
        match callee.as_str() {
            "print" => {
                if args.len() != 1 {
                    return self.error(
                        pos,
                        SemanticErrorKind::WrongArity {
                            callee,
                            expected: 1,
                            found: args.len(),
                        },
                    );
                }
                let arg_ty = self.type_of(&mut args[0])?;
                if !arg_ty.is_printable() {
                    return self.error(args[0].pos, SemanticErrorKind::NotPrintable(arg_ty));
                }
                Ok(Type::Void)
            }
            "read" => {
                self.check_prompt_args(&callee, args, pos, false)?;
                Ok(Type::TEXT)
            }
            "num.read" => {
                self.check_prompt_args(&callee, args, pos, true)?;
                Ok(Type::NUM)
            }
            "text.read" => {
                self.check_prompt_args(&callee, args, pos, true)?;
                Ok(Type::TEXT)
            }
            "char.read" => {
                self.check_prompt_args(&callee, args, pos, true)?;
                Ok(Type::CHAR)
            }
            "bool.read" => {
                self.check_prompt_args(&callee, args, pos, true)?;
                Ok(Type::BOOL)
            }
            _ => {
                let Some(signature) = self.functions.get(&callee) else {
                    return self.error(pos, SemanticErrorKind::UnknownFunction(callee));
                };
                let params = signature.params.clone();
                let ret = signature.ret.clone();
                if args.len() != params.len() {
                    return self.error(
                        pos,
                        SemanticErrorKind::WrongArity {
                            callee,
                            expected: params.len(),
                            found: args.len(),
                        },
                    );
                }
                for (arg, param_ty) in args.iter_mut().zip(params) {
                    let found = self.type_of(arg)?;
                    self.require_assignable(&param_ty, &found, arg.pos)?;
                }
                Ok(ret)
            }
        }
    }

    /// The read builtins take an optional text prompt; bare `read` requires
    /// one.
    fn check_prompt_args(
        &mut self,
        callee: &str,
        args: &mut [Expr],
        pos: Position,
        optional: bool,
    ) -> SemRes<()> {
        let ok_count = args.len() == 1 || (optional && args.is_empty());
        if !ok_count {
            return self.error(
                pos,
                SemanticErrorKind::WrongArity {
                    callee: callee.to_string(),
                    expected: 1,
                    found: args.len(),
                },
            );
        }
        if let Some(prompt) = args.first_mut() {
            let found = self.type_of(prompt)?;
            if !found.is_text() {
                return self.error(
                    prompt.pos,
                    SemanticErrorKind::TypeMismatch {
                        expected: Type::TEXT,
                        found,
                    },
                );
            }
        }
        Ok(())
    }
}
