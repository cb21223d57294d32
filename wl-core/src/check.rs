//! Multi-phase semantic analyzer.
//!
//! The checker runs seven ordered passes over the whole module graph;
//! every pass finishes for all modules before the next one starts:
//!
//!   1. duplicate declarations inside each file,
//!   2. import registration,
//!   3. struct placeholders (name and identity only),
//!   4. typealias resolution,
//!   5. function signatures,
//!   6. struct contents,
//!   7. function bodies.
//!
//! The loader has already collapsed the import graph into a dense,
//! cycle-free list of files, so "visit every module once" is a plain
//! iteration in file-id order; cycles need no special handling past
//! this point.
//!
//! Cross-module types are wrapped as `Extern` in the referencing
//! module; `types_equal` chases those wrappers and compares pointers
//! and functions structurally, structs nominally.

use std::collections::HashMap;

use crate::ast::{self, BinaryOp, Block, Definition, Expr, ParsedFile, Stmt, TypeRef};
use crate::diagnostic::{Diagnostic, codes};
use crate::hir::*;
use crate::module::{Module, ScopeId, ValueDef};
use crate::source::{FileId, Position};
use crate::types::{ImportId, Type, TypeId, TypeTable};

/// Check a loaded program. `files` must be dense in `FileId`, as
/// produced by `Loader::finish`.
pub fn check(entry: FileId, files: &[ParsedFile]) -> Result<CheckedProgram, Diagnostic> {
    let mut checker = Checker::new(files);
    checker.run()?;
    Ok(checker.finish(entry))
}

/// What a block is allowed or required to do with `return`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Obligation {
    /// Every exit path must produce a value of this type.
    MustReturn(TypeId),
    /// `return` is allowed and must carry this type; falling off the
    /// end is fine.
    MayReturn(TypeId),
}

struct Checker<'a> {
    files: &'a [ParsedFile],
    modules: Vec<Module>,
    functions: Vec<Vec<CheckedFunction>>,
    externs: Vec<Vec<CheckedExtern>>,
}

impl<'a> Checker<'a> {
    fn new(files: &'a [ParsedFile]) -> Checker<'a> {
        Checker {
            files,
            modules: files.iter().map(|f| Module::new(f.file)).collect(),
            functions: files.iter().map(|_| Vec::new()).collect(),
            externs: files.iter().map(|_| Vec::new()).collect(),
        }
    }

    fn run(&mut self) -> Result<(), Diagnostic> {
        let n = self.files.len();
        for m in 0..n {
            self.check_duplicates(m)?;
        }
        for m in 0..n {
            self.register_imports(m)?;
        }
        for m in 0..n {
            self.declare_structs(m);
        }
        for m in 0..n {
            self.resolve_typealiases(m)?;
        }
        for m in 0..n {
            self.check_signatures(m)?;
        }
        for m in 0..n {
            self.check_struct_contents(m)?;
        }
        for m in 0..n {
            self.check_bodies(m)?;
        }
        Ok(())
    }

    fn finish(self, entry: FileId) -> CheckedProgram {
        let modules = self
            .modules
            .into_iter()
            .zip(self.functions)
            .zip(self.externs)
            .map(|((module, functions), externs)| CheckedModule {
                module,
                functions,
                externs,
            })
            .collect();
        CheckedProgram { entry, modules }
    }

    // -- phase 1: duplicates -------------------------------------------

    /// Two namespaces per file: types (struct, typealias) and
    /// values-or-modules (fun, extern fun, import). The error points
    /// at the second definition.
    fn check_duplicates(&self, m: usize) -> Result<(), Diagnostic> {
        let mut types: HashMap<&str, Position> = HashMap::new();
        let mut values: HashMap<&str, Position> = HashMap::new();
        for def in &self.files[m].defs {
            let table = match def {
                Definition::Struct(_) | Definition::Typealias(_) => &mut types,
                Definition::Function(_)
                | Definition::ExternFunction(_)
                | Definition::Import(_) => &mut values,
            };
            if table.insert(def.name(), def.position()).is_some() {
                return Err(Diagnostic::error(
                    format!("duplicate declaration of `{}`", def.name()),
                    def.position(),
                )
                .with_code(codes::DUPLICATE_DECLARATION));
            }
        }
        Ok(())
    }

    // -- phase 2: imports ----------------------------------------------

    fn register_imports(&mut self, m: usize) -> Result<(), Diagnostic> {
        let files = self.files;
        for def in &files[m].defs {
            if let Definition::Import(import) = def {
                let Some(target) = import.target else {
                    return Err(Diagnostic::error(
                        format!("import `{}` was not resolved", import.name),
                        import.position,
                    )
                    .with_code(codes::IMPORT_FAILED));
                };
                self.modules[m].add_import(&import.name, target);
            }
        }
        Ok(())
    }

    // -- phase 3: struct placeholders ----------------------------------

    fn declare_structs(&mut self, m: usize) {
        let files = self.files;
        for def in &files[m].defs {
            if let Definition::Struct(s) = def {
                let id = self.modules[m].types.declare_struct(&s.name);
                self.modules[m]
                    .scope_mut(Module::GLOBAL)
                    .types
                    .insert(s.name.clone(), id);
            }
        }
    }

    // -- phase 4: typealiases ------------------------------------------

    /// An alias registers its name directly against the target's id,
    /// so alias and target are the same type. Aliases resolve in
    /// source order within a file and in file order across modules.
    fn resolve_typealiases(&mut self, m: usize) -> Result<(), Diagnostic> {
        let files = self.files;
        for def in &files[m].defs {
            if let Definition::Typealias(alias) = def {
                let id = self.check_type_ref(m, Module::GLOBAL, &alias.target)?;
                self.modules[m]
                    .scope_mut(Module::GLOBAL)
                    .types
                    .insert(alias.name.clone(), id);
            }
        }
        Ok(())
    }

    // -- phase 5: function signatures ----------------------------------

    fn check_signatures(&mut self, m: usize) -> Result<(), Diagnostic> {
        let files = self.files;
        for def in &files[m].defs {
            let (name, params, ret) = match def {
                Definition::Function(f) => (&f.name, &f.params, &f.ret),
                Definition::ExternFunction(f) => (&f.name, &f.params, &f.ret),
                _ => continue,
            };
            let mut param_ids = Vec::with_capacity(params.len());
            let mut checked_params = Vec::with_capacity(params.len());
            for param in params {
                let ty = self.check_type_ref(m, Module::GLOBAL, &param.ty)?;
                param_ids.push(ty);
                checked_params.push(CheckedParam {
                    name: param.name.clone(),
                    ty,
                });
            }
            let returns = match ret {
                Some(ty) => self.check_type_ref(m, Module::GLOBAL, ty)?,
                None => TypeTable::UNIT,
            };
            let fn_ty = self.modules[m].types.intern(Type::Function {
                params: param_ids,
                returns,
            });
            self.modules[m]
                .scope_mut(Module::GLOBAL)
                .functions
                .insert(name.clone(), fn_ty);

            if let Definition::ExternFunction(f) = def {
                self.externs[m].push(CheckedExtern {
                    name: f.name.clone(),
                    params: checked_params,
                    returns,
                    position: f.position,
                });
            }
        }
        Ok(())
    }

    // -- phase 6: struct contents --------------------------------------

    fn check_struct_contents(&mut self, m: usize) -> Result<(), Diagnostic> {
        let files = self.files;
        for def in &files[m].defs {
            let Definition::Struct(s) = def else { continue };
            let mut fields: Vec<(String, TypeId)> = Vec::with_capacity(s.fields.len());
            for field in &s.fields {
                if fields.iter().any(|(name, _)| name == &field.name) {
                    return Err(Diagnostic::error(
                        format!("duplicate field `{}` in struct `{}`", field.name, s.name),
                        field.position,
                    )
                    .with_code(codes::DUPLICATE_FIELD));
                }
                let ty = self.check_type_ref(m, Module::GLOBAL, &field.ty)?;
                fields.push((field.name.clone(), ty));
            }
            let id = self.modules[m]
                .lookup_type(Module::GLOBAL, &s.name)
                .unwrap_or_else(|| panic!("struct `{}` not declared in phase 3", s.name));
            self.modules[m].types.set_struct_fields(id, fields);
        }
        Ok(())
    }

    // -- phase 7: function bodies --------------------------------------

    fn check_bodies(&mut self, m: usize) -> Result<(), Diagnostic> {
        let files = self.files;
        for def in &files[m].defs {
            let Definition::Function(f) = def else { continue };
            let scope = self.modules[m].new_scope(Module::GLOBAL);
            let mut params = Vec::with_capacity(f.params.len());
            for param in &f.params {
                let ty = self.check_type_ref(m, scope, &param.ty)?;
                self.modules[m]
                    .scope_mut(scope)
                    .variables
                    .insert(param.name.clone(), ty);
                params.push(CheckedParam {
                    name: param.name.clone(),
                    ty,
                });
            }
            let returns = match &f.ret {
                Some(ty) => self.check_type_ref(m, scope, ty)?,
                None => TypeTable::UNIT,
            };
            let body = self.check_block(m, scope, &f.body, Obligation::MustReturn(returns), 0)?;
            self.functions[m].push(CheckedFunction {
                name: f.name.clone(),
                params,
                returns,
                body,
                position: f.position,
            });
        }
        Ok(())
    }

    // -- type references -----------------------------------------------

    fn check_type_ref(
        &mut self,
        m: usize,
        scope: ScopeId,
        ty: &TypeRef,
    ) -> Result<TypeId, Diagnostic> {
        match ty {
            TypeRef::Named { name, position } => {
                self.modules[m].lookup_type(scope, name).ok_or_else(|| {
                    Diagnostic::error(format!("undeclared type `{name}`"), *position)
                        .with_code(codes::UNDECLARED_TYPE)
                })
            }
            TypeRef::Pointer { inner, .. } => {
                let to = self.check_type_ref(m, scope, inner)?;
                Ok(self.modules[m].types.intern(Type::Pointer { to }))
            }
            TypeRef::Module {
                module,
                name,
                position,
            } => {
                let Some(import) = self.modules[m].lookup_import(scope, module) else {
                    return Err(Diagnostic::error(
                        format!("undeclared module `{module}`"),
                        *position,
                    )
                    .with_code(codes::UNDECLARED_TYPE));
                };
                let target = self.modules[m].import_target(import).0 as usize;
                let Some(ty) = self.modules[target].lookup_type(Module::GLOBAL, name) else {
                    return Err(Diagnostic::error(
                        format!("module `{module}` has no type `{name}`"),
                        *position,
                    )
                    .with_code(codes::UNDECLARED_TYPE));
                };
                Ok(self.import_type(m, import, ty))
            }
        }
    }

    /// Bring a type id from an imported module into module `m`.
    /// Builtins share fixed ids; anything else is wrapped as Extern.
    fn import_type(&mut self, m: usize, import: ImportId, ty: TypeId) -> TypeId {
        if ty.is_builtin() {
            ty
        } else {
            self.modules[m].types.intern(Type::Extern { import, ty })
        }
    }

    /// Chase `Extern` wrappers down to the defining module.
    fn resolve(&self, m: usize, ty: TypeId) -> (usize, TypeId) {
        let (mut m, mut ty) = (m, ty);
        while let Type::Extern { import, ty: inner } = self.modules[m].types.get(ty) {
            let inner = *inner;
            m = self.modules[m].import_target(*import).0 as usize;
            ty = inner;
        }
        (m, ty)
    }

    /// Structural equality across modules: builtins by fixed id,
    /// pointers and functions element-wise, structs by definition
    /// site.
    fn types_equal(&self, m1: usize, t1: TypeId, m2: usize, t2: TypeId) -> bool {
        let (m1, t1) = self.resolve(m1, t1);
        let (m2, t2) = self.resolve(m2, t2);
        if t1.is_builtin() || t2.is_builtin() {
            return t1 == t2;
        }
        match (self.modules[m1].types.get(t1), self.modules[m2].types.get(t2)) {
            (Type::Pointer { to: a }, Type::Pointer { to: b }) => {
                self.types_equal(m1, *a, m2, *b)
            }
            (
                Type::Function {
                    params: p1,
                    returns: r1,
                },
                Type::Function {
                    params: p2,
                    returns: r2,
                },
            ) => {
                p1.len() == p2.len()
                    && p1
                        .iter()
                        .zip(p2)
                        .all(|(a, b)| self.types_equal(m1, *a, m2, *b))
                    && self.types_equal(m1, *r1, m2, *r2)
            }
            (Type::Struct { .. }, Type::Struct { .. }) => m1 == m2 && t1 == t2,
            _ => false,
        }
    }

    fn type_name(&self, m: usize, ty: TypeId) -> String {
        match self.modules[m].types.get(ty) {
            Type::Builtin(b) => {
                use crate::types::Builtin::*;
                match b {
                    Unit => "()",
                    Int => "int",
                    Float => "float",
                    Char => "char",
                    Bool => "bool",
                }
                .to_string()
            }
            Type::Pointer { to } => format!("*{}", self.type_name(m, *to)),
            Type::Struct { name, .. } => name.clone(),
            Type::Function { params, returns } => {
                let params: Vec<String> =
                    params.iter().map(|p| self.type_name(m, *p)).collect();
                format!("fun({}) {}", params.join(", "), self.type_name(m, *returns))
            }
            Type::Extern { import, ty } => {
                let target = self.modules[m].import_target(*import).0 as usize;
                self.type_name(target, *ty)
            }
        }
    }

    fn is_numeric(&self, m: usize, ty: TypeId) -> bool {
        let (_, ty) = self.resolve(m, ty);
        ty == TypeTable::INT || ty == TypeTable::FLOAT
    }

    fn is_bool(&self, m: usize, ty: TypeId) -> bool {
        let (_, ty) = self.resolve(m, ty);
        ty == TypeTable::BOOL
    }

    fn is_pointer(&self, m: usize, ty: TypeId) -> bool {
        let (m, ty) = self.resolve(m, ty);
        matches!(self.modules[m].types.get(ty), Type::Pointer { .. })
    }

    /// The type of field `field` on a struct or pointer-to-struct
    /// type, expressed in module `m`. Follows Extern chains and wraps
    /// the result back up hop by hop; a single level of pointer
    /// indirection is transparent.
    fn field_type(
        &mut self,
        m: usize,
        ty: TypeId,
        field: &str,
        deref: bool,
    ) -> Option<TypeId> {
        match self.modules[m].types.get(ty).clone() {
            Type::Struct { fields, .. } => {
                fields.iter().find(|(n, _)| n == field).map(|(_, t)| *t)
            }
            Type::Pointer { to } if deref => self.field_type(m, to, field, false),
            Type::Extern { import, ty } => {
                let target = self.modules[m].import_target(import).0 as usize;
                let field_ty = self.field_type(target, ty, field, deref)?;
                Some(self.import_type(m, import, field_ty))
            }
            _ => None,
        }
    }

    /// The return type of a callable, expressed in module `m`. Same
    /// hop-by-hop re-wrapping as `field_type`.
    fn callee_return_type(&mut self, m: usize, ty: TypeId) -> Option<TypeId> {
        match self.modules[m].types.get(ty).clone() {
            Type::Function { returns, .. } => Some(returns),
            Type::Extern { import, ty } => {
                let target = self.modules[m].import_target(import).0 as usize;
                let returns = self.callee_return_type(target, ty)?;
                Some(self.import_type(m, import, returns))
            }
            _ => None,
        }
    }

    // -- blocks and statements -----------------------------------------

    fn check_block(
        &mut self,
        m: usize,
        parent: ScopeId,
        block: &Block,
        obligation: Obligation,
        loop_depth: u32,
    ) -> Result<CheckedBlock, Diagnostic> {
        let scope = self.modules[m].new_scope(parent);
        let relaxed = match obligation {
            Obligation::MustReturn(t) | Obligation::MayReturn(t) => Obligation::MayReturn(t),
        };

        let mut stmts = Vec::with_capacity(block.stmts.len());
        let mut discharged = false;
        let last = block.stmts.len().checked_sub(1);
        for (i, stmt) in block.stmts.iter().enumerate() {
            let terminal = Some(i) == last;
            if terminal && matches!(obligation, Obligation::MustReturn(_)) {
                let (checked, ok) =
                    self.check_terminal_stmt(m, scope, stmt, obligation, loop_depth)?;
                discharged = ok;
                stmts.push(checked);
            } else {
                stmts.push(self.check_stmt(m, scope, stmt, relaxed, loop_depth)?);
            }
        }

        if let Obligation::MustReturn(expected) = obligation {
            if !discharged && expected != TypeTable::UNIT {
                return Err(Diagnostic::error(
                    format!(
                        "missing return: expected a value of type `{}`",
                        self.type_name(m, expected)
                    ),
                    block.close,
                )
                .with_code(codes::MISSING_RETURN));
            }
        }
        Ok(CheckedBlock { stmts })
    }

    /// The terminal statement of a MustReturn block. Only `return`, a
    /// nested block, and `if`/`else` with both branches returning can
    /// discharge the obligation; anything else leaves it to the
    /// enclosing block's closing brace to report.
    fn check_terminal_stmt(
        &mut self,
        m: usize,
        scope: ScopeId,
        stmt: &Stmt,
        obligation: Obligation,
        loop_depth: u32,
    ) -> Result<(CheckedStmt, bool), Diagnostic> {
        match stmt {
            Stmt::Return { .. } => {
                let checked = self.check_stmt(m, scope, stmt, obligation, loop_depth)?;
                Ok((checked, true))
            }
            Stmt::Block(inner) => {
                let block = self.check_block(m, scope, inner, obligation, loop_depth)?;
                Ok((CheckedStmt::Block(block), true))
            }
            Stmt::If {
                cond,
                then_block,
                else_block: Some(else_block),
                ..
            } => {
                let cond = self.check_condition(m, scope, cond)?;
                let then_block =
                    self.check_block(m, scope, then_block, obligation, loop_depth)?;
                let else_block =
                    self.check_block(m, scope, else_block, obligation, loop_depth)?;
                Ok((
                    CheckedStmt::If {
                        cond,
                        then_block,
                        else_block: Some(else_block),
                    },
                    true,
                ))
            }
            _ => {
                let relaxed = match obligation {
                    Obligation::MustReturn(t) => Obligation::MayReturn(t),
                    other => other,
                };
                let checked = self.check_stmt(m, scope, stmt, relaxed, loop_depth)?;
                Ok((checked, false))
            }
        }
    }

    fn check_stmt(
        &mut self,
        m: usize,
        scope: ScopeId,
        stmt: &Stmt,
        obligation: Obligation,
        loop_depth: u32,
    ) -> Result<CheckedStmt, Diagnostic> {
        match stmt {
            Stmt::Var { name, value, .. } => {
                let value = self.check_expr(m, scope, value)?;
                let ty = value.ty;
                self.modules[m]
                    .scope_mut(scope)
                    .variables
                    .insert(name.clone(), ty);
                Ok(CheckedStmt::Var {
                    name: name.clone(),
                    ty,
                    value,
                })
            }
            Stmt::Expr(expr) => Ok(CheckedStmt::Expr(self.check_expr(m, scope, expr)?)),
            Stmt::Block(block) => Ok(CheckedStmt::Block(self.check_block(
                m, scope, block, obligation, loop_depth,
            )?)),
            Stmt::Return { value, position } => {
                let expected = match obligation {
                    Obligation::MustReturn(t) | Obligation::MayReturn(t) => t,
                };
                match value {
                    None => {
                        if expected != TypeTable::UNIT {
                            return Err(Diagnostic::error(
                                format!(
                                    "expected a return value of type `{}`",
                                    self.type_name(m, expected)
                                ),
                                *position,
                            )
                            .with_code(codes::RETURN_TYPE_MISMATCH));
                        }
                        Ok(CheckedStmt::Return(None))
                    }
                    Some(expr) => {
                        let checked = self.check_expr(m, scope, expr)?;
                        if !self.types_equal(m, checked.ty, m, expected) {
                            return Err(Diagnostic::error(
                                format!(
                                    "expected a return value of type `{}`, but got `{}`",
                                    self.type_name(m, expected),
                                    self.type_name(m, checked.ty)
                                ),
                                checked.position,
                            )
                            .with_code(codes::RETURN_TYPE_MISMATCH));
                        }
                        Ok(CheckedStmt::Return(Some(checked)))
                    }
                }
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
                ..
            } => {
                let cond = self.check_condition(m, scope, cond)?;
                let then_block =
                    self.check_block(m, scope, then_block, obligation, loop_depth)?;
                let else_block = match else_block {
                    Some(block) => {
                        Some(self.check_block(m, scope, block, obligation, loop_depth)?)
                    }
                    None => None,
                };
                Ok(CheckedStmt::If {
                    cond,
                    then_block,
                    else_block,
                })
            }
            Stmt::While { cond, body, .. } => {
                let cond = self.check_condition(m, scope, cond)?;
                let body = self.check_block(m, scope, body, obligation, loop_depth + 1)?;
                Ok(CheckedStmt::While { cond, body })
            }
            Stmt::Break { position } => {
                if loop_depth == 0 {
                    return Err(Diagnostic::error("`break` outside of a loop", *position)
                        .with_code(codes::BREAK_OUTSIDE_LOOP));
                }
                Ok(CheckedStmt::Break)
            }
            Stmt::Continue { position } => {
                if loop_depth == 0 {
                    return Err(Diagnostic::error(
                        "`continue` outside of a loop",
                        *position,
                    )
                    .with_code(codes::BREAK_OUTSIDE_LOOP));
                }
                Ok(CheckedStmt::Continue)
            }
        }
    }

    fn check_condition(
        &mut self,
        m: usize,
        scope: ScopeId,
        cond: &Expr,
    ) -> Result<CheckedExpr, Diagnostic> {
        let checked = self.check_expr(m, scope, cond)?;
        if !self.is_bool(m, checked.ty) {
            return Err(Diagnostic::error(
                format!(
                    "condition must have type `bool`, but got `{}`",
                    self.type_name(m, checked.ty)
                ),
                checked.position,
            )
            .with_code(codes::ARGUMENT_TYPE_MISMATCH));
        }
        Ok(checked)
    }

    // -- expressions ---------------------------------------------------

    fn check_expr(
        &mut self,
        m: usize,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<CheckedExpr, Diagnostic> {
        match expr {
            Expr::IntLiteral { value, position } => Ok(CheckedExpr {
                kind: CheckedExprKind::Int(*value),
                ty: TypeTable::INT,
                position: *position,
            }),
            Expr::FloatLiteral { value, position } => Ok(CheckedExpr {
                kind: CheckedExprKind::Float(*value),
                ty: TypeTable::FLOAT,
                position: *position,
            }),
            Expr::StringLiteral { value, position } => {
                let ty = self.modules[m]
                    .types
                    .intern(Type::Pointer { to: TypeTable::CHAR });
                Ok(CheckedExpr {
                    kind: CheckedExprKind::Str(value.clone()),
                    ty,
                    position: *position,
                })
            }
            Expr::BoolLiteral { value, position } => Ok(CheckedExpr {
                kind: CheckedExprKind::Bool(*value),
                ty: TypeTable::BOOL,
                position: *position,
            }),
            Expr::Identifier { name, position } => {
                match self.modules[m].lookup_value(scope, name) {
                    Some(ValueDef::Variable(ty)) => Ok(CheckedExpr {
                        kind: CheckedExprKind::Variable(name.clone()),
                        ty,
                        position: *position,
                    }),
                    Some(ValueDef::Function(ty)) => Ok(CheckedExpr {
                        kind: CheckedExprKind::Function(name.clone()),
                        ty,
                        position: *position,
                    }),
                    None => Err(Diagnostic::error(
                        format!("undeclared identifier `{name}`"),
                        *position,
                    )
                    .with_code(codes::UNDECLARED)),
                }
            }
            Expr::Grouped { inner, .. } => self.check_expr(m, scope, inner),
            Expr::Unary {
                op,
                operand,
                position,
            } => {
                let operand = self.check_expr(m, scope, operand)?;
                if !self.is_numeric(m, operand.ty) {
                    return Err(Diagnostic::error(
                        format!(
                            "operator `{}` is not implemented for type `{}`",
                            op.symbol(),
                            self.type_name(m, operand.ty)
                        ),
                        *position,
                    )
                    .with_code(codes::OPERATOR_NOT_IMPLEMENTED));
                }
                let ty = operand.ty;
                Ok(CheckedExpr {
                    kind: CheckedExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    ty,
                    position: *position,
                })
            }
            Expr::Binary {
                op: BinaryOp::Assign,
                lhs,
                rhs,
                position,
            } => self.check_assignment(m, scope, lhs, rhs, *position),
            Expr::Binary {
                op,
                lhs,
                rhs,
                position,
            } => self.check_binary(m, scope, *op, lhs, rhs, *position),
            Expr::Call {
                callee,
                args,
                position,
            } => self.check_call(m, scope, callee, args, *position),
            Expr::StructInit {
                name,
                fields,
                position,
            } => self.check_struct_init(m, scope, name, fields, *position),
            Expr::ObjectAccess {
                object,
                field,
                position,
            } => {
                let object = self.check_expr(m, scope, object)?;
                let Some(ty) = self.field_type(m, object.ty, field, true) else {
                    return Err(Diagnostic::error(
                        format!(
                            "type `{}` has no field `{}`",
                            self.type_name(m, object.ty),
                            field
                        ),
                        *position,
                    )
                    .with_code(codes::FIELD_MISMATCH));
                };
                Ok(CheckedExpr {
                    kind: CheckedExprKind::Field {
                        object: Box::new(object),
                        field: field.clone(),
                    },
                    ty,
                    position: *position,
                })
            }
            Expr::ModuleAccess {
                module,
                member,
                position,
            } => {
                let Some(import) = self.modules[m].lookup_import(scope, module) else {
                    return Err(Diagnostic::error(
                        format!("undeclared module `{module}`"),
                        *position,
                    )
                    .with_code(codes::UNDECLARED));
                };
                let target = self.modules[m].import_target(import).0 as usize;
                if let Some(ty) = self.modules[target].lookup_function(Module::GLOBAL, member) {
                    let ty = self.import_type(m, import, ty);
                    return Ok(CheckedExpr {
                        kind: CheckedExprKind::ModuleFunction {
                            import,
                            name: member.clone(),
                        },
                        ty,
                        position: *position,
                    });
                }
                if self.modules[target]
                    .lookup_type(Module::GLOBAL, member)
                    .is_some()
                {
                    return Err(Diagnostic::error(
                        format!("`{module}::{member}` is a type, not a value"),
                        *position,
                    )
                    .with_code(codes::UNDECLARED));
                }
                Err(Diagnostic::error(
                    format!("module `{module}` has no member `{member}`"),
                    *position,
                )
                .with_code(codes::UNDECLARED))
            }
            Expr::As {
                value,
                ty,
                position,
            } => {
                let value = self.check_expr(m, scope, value)?;
                let target = self.check_type_ref(m, scope, ty)?;
                let numeric = self.is_numeric(m, value.ty) && self.is_numeric(m, target);
                let pointer = self.is_pointer(m, value.ty) && self.is_pointer(m, target);
                if !numeric && !pointer {
                    return Err(Diagnostic::error(
                        format!(
                            "cannot cast `{}` to `{}`",
                            self.type_name(m, value.ty),
                            self.type_name(m, target)
                        ),
                        *position,
                    )
                    .with_code(codes::ILLEGAL_CAST));
                }
                Ok(CheckedExpr {
                    kind: CheckedExprKind::Cast {
                        value: Box::new(value),
                    },
                    ty: target,
                    position: *position,
                })
            }
        }
    }

    fn check_assignment(
        &mut self,
        m: usize,
        scope: ScopeId,
        lhs: &Expr,
        rhs: &Expr,
        position: Position,
    ) -> Result<CheckedExpr, Diagnostic> {
        let lhs = self.check_expr(m, scope, lhs)?;
        if !matches!(
            lhs.kind,
            CheckedExprKind::Variable(_) | CheckedExprKind::Field { .. }
        ) {
            return Err(Diagnostic::error(
                "left-hand side of `=` is not assignable",
                lhs.position,
            )
            .with_code(codes::OPERATOR_NOT_IMPLEMENTED));
        }
        let rhs = self.check_expr(m, scope, rhs)?;
        if !self.types_equal(m, lhs.ty, m, rhs.ty) {
            return Err(Diagnostic::error(
                format!(
                    "cannot assign `{}` to a place of type `{}`",
                    self.type_name(m, rhs.ty),
                    self.type_name(m, lhs.ty)
                ),
                rhs.position,
            )
            .with_code(codes::ARGUMENT_TYPE_MISMATCH));
        }
        let ty = lhs.ty;
        Ok(CheckedExpr {
            kind: CheckedExprKind::Binary {
                op: BinaryOp::Assign,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            position,
        })
    }

    fn check_binary(
        &mut self,
        m: usize,
        scope: ScopeId,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        position: Position,
    ) -> Result<CheckedExpr, Diagnostic> {
        let lhs = self.check_expr(m, scope, lhs)?;
        let rhs = self.check_expr(m, scope, rhs)?;

        let equal = self.types_equal(m, lhs.ty, m, rhs.ty);
        let numeric = self.is_numeric(m, lhs.ty);
        let supported = equal
            && match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => numeric,
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => numeric,
                BinaryOp::Eq | BinaryOp::Ne => {
                    numeric || self.is_bool(m, lhs.ty) || self.is_pointer(m, lhs.ty)
                }
                BinaryOp::Assign => unreachable!("assignment is checked separately"),
            };
        if !supported {
            return Err(Diagnostic::error(
                format!(
                    "operator `{}` is not implemented for types `{}` and `{}`",
                    op.symbol(),
                    self.type_name(m, lhs.ty),
                    self.type_name(m, rhs.ty)
                ),
                position,
            )
            .with_code(codes::OPERATOR_NOT_IMPLEMENTED));
        }

        let ty = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => lhs.ty,
            _ => TypeTable::BOOL,
        };
        Ok(CheckedExpr {
            kind: CheckedExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            position,
        })
    }

    fn check_call(
        &mut self,
        m: usize,
        scope: ScopeId,
        callee: &Expr,
        args: &[Expr],
        position: Position,
    ) -> Result<CheckedExpr, Diagnostic> {
        let callee = self.check_expr(m, scope, callee)?;
        let (fm, ft) = self.resolve(m, callee.ty);
        let Type::Function { params, .. } = self.modules[fm].types.get(ft).clone() else {
            return Err(Diagnostic::error(
                format!(
                    "expression of type `{}` is not callable",
                    self.type_name(m, callee.ty)
                ),
                position,
            )
            .with_code(codes::OPERATOR_NOT_IMPLEMENTED));
        };

        if args.len() != params.len() {
            return Err(Diagnostic::error(
                format!("expected {} arguments, but got {}", params.len(), args.len()),
                position,
            )
            .with_code(codes::ARITY_MISMATCH));
        }

        let mut checked_args = Vec::with_capacity(args.len());
        for (i, (arg, param)) in args.iter().zip(&params).enumerate() {
            let arg = self.check_expr(m, scope, arg)?;
            if !self.types_equal(m, arg.ty, fm, *param) {
                return Err(Diagnostic::error(
                    format!(
                        "argument {} has type `{}`, but the parameter expects `{}`",
                        i + 1,
                        self.type_name(m, arg.ty),
                        self.type_name(fm, *param)
                    ),
                    arg.position,
                )
                .with_code(codes::ARGUMENT_TYPE_MISMATCH));
            }
            checked_args.push(arg);
        }

        let ty = self
            .callee_return_type(m, callee.ty)
            .unwrap_or(TypeTable::UNIT);
        Ok(CheckedExpr {
            kind: CheckedExprKind::Call {
                callee: Box::new(callee),
                args: checked_args,
            },
            ty,
            position,
        })
    }

    fn check_struct_init(
        &mut self,
        m: usize,
        scope: ScopeId,
        name: &str,
        inits: &[ast::FieldInit],
        position: Position,
    ) -> Result<CheckedExpr, Diagnostic> {
        let Some(struct_ty) = self.modules[m].lookup_type(scope, name) else {
            return Err(Diagnostic::error(
                format!("undeclared type `{name}`"),
                position,
            )
            .with_code(codes::UNDECLARED_TYPE));
        };
        let (sm, st) = self.resolve(m, struct_ty);
        let Type::Struct { fields, .. } = self.modules[sm].types.get(st).clone() else {
            return Err(Diagnostic::error(
                format!("`{name}` is not a struct"),
                position,
            )
            .with_code(codes::FIELD_MISMATCH));
        };

        let mut seen: Vec<&str> = Vec::with_capacity(inits.len());
        for init in inits {
            if !fields.iter().any(|(n, _)| n == &init.name) {
                return Err(Diagnostic::error(
                    format!("struct `{name}` has no field `{}`", init.name),
                    init.position,
                )
                .with_code(codes::FIELD_MISMATCH));
            }
            // the repeated occurrence is the one reported
            if seen.contains(&init.name.as_str()) {
                return Err(Diagnostic::error(
                    format!("field `{}` is initialized twice", init.name),
                    init.position,
                )
                .with_code(codes::FIELD_MISMATCH));
            }
            seen.push(&init.name);
        }

        // reorder to declared order, checking each value
        let mut checked_fields = Vec::with_capacity(fields.len());
        for (field_name, field_ty) in &fields {
            let Some(init) = inits.iter().find(|i| &i.name == field_name) else {
                return Err(Diagnostic::error(
                    format!("missing field `{field_name}` in initializer of `{name}`"),
                    position,
                )
                .with_code(codes::FIELD_MISMATCH));
            };
            let value = self.check_expr(m, scope, &init.value)?;
            if !self.types_equal(m, value.ty, sm, *field_ty) {
                return Err(Diagnostic::error(
                    format!(
                        "field `{}` has type `{}`, but the initializer has type `{}`",
                        field_name,
                        self.type_name(sm, *field_ty),
                        self.type_name(m, value.ty)
                    ),
                    value.position,
                )
                .with_code(codes::FIELD_MISMATCH));
            }
            checked_fields.push((field_name.clone(), value));
        }

        Ok(CheckedExpr {
            kind: CheckedExprKind::StructInit {
                struct_ty,
                fields: checked_fields,
            },
            ty: struct_ty,
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse_file;

    fn parse(file: FileId, source: &str) -> ParsedFile {
        let tokens = lex(file, source).expect("lex");
        parse_file(file, tokens).expect("parse")
    }

    fn check_source(source: &str) -> Result<CheckedProgram, Diagnostic> {
        check(FileId(0), &[parse(FileId(0), source)])
    }

    /// Two-file program; every `import` in one file points at the
    /// other, as the loader would have resolved it.
    fn check_pair(a: &str, b: &str) -> Result<CheckedProgram, Diagnostic> {
        let mut files = vec![parse(FileId(0), a), parse(FileId(1), b)];
        for (i, file) in files.iter_mut().enumerate() {
            for def in &mut file.defs {
                if let Definition::Import(import) = def {
                    import.target = Some(FileId(1 - i as u32));
                }
            }
        }
        check(FileId(0), &files)
    }

    #[test]
    fn arithmetic_body_checks_to_int() {
        let program = check_source("fun main() int { return 1 + 2 * 3 }\n").expect("check");
        let main = &program.module(FileId(0)).functions[0];
        assert_eq!(main.returns, TypeTable::INT);
        let CheckedStmt::Return(Some(expr)) = &main.body.stmts[0] else {
            panic!("expected a return statement");
        };
        assert_eq!(expr.ty, TypeTable::INT);
    }

    #[test]
    fn parameter_resolves_inside_the_body() {
        let program = check_source("fun id(x int) int { return x }\n").expect("check");
        let id = &program.module(FileId(0)).functions[0];
        let CheckedStmt::Return(Some(expr)) = &id.body.stmts[0] else {
            panic!("expected a return statement");
        };
        assert!(matches!(&expr.kind, CheckedExprKind::Variable(name) if name == "x"));
        assert_eq!(expr.ty, TypeTable::INT);
    }

    #[test]
    fn undeclared_identifier_fails() {
        let err = check_source("fun f() int { return y }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::UNDECLARED));
    }

    #[test]
    fn duplicate_function_fails_at_the_second_definition() {
        let err = check_source("fun f() {}\nfun f() {}\n").unwrap_err();
        assert_eq!(err.code, Some(codes::DUPLICATE_DECLARATION));
        assert_eq!(err.position.line, 2);
    }

    #[test]
    fn type_and_value_namespaces_are_disjoint() {
        check_source("struct f { x int }\nfun f() {}\n").expect("check");
    }

    #[test]
    fn missing_return_points_at_the_closing_brace() {
        let err = check_source("fun f() int {\n}\n").unwrap_err();
        assert_eq!(err.code, Some(codes::MISSING_RETURN));
        assert_eq!(err.position.line, 2);
    }

    #[test]
    fn unit_function_may_fall_off_the_end() {
        check_source("fun f() { var x = 1 }\n").expect("check");
        check_source("fun f() {}\n").expect("check");
    }

    #[test]
    fn if_else_discharges_a_required_return() {
        check_source(
            "fun f(c bool) int { if c { return 1 } else { return 2 } }\n",
        )
        .expect("check");
    }

    #[test]
    fn if_without_else_does_not_discharge() {
        let err =
            check_source("fun f(c bool) int { if c { return 1 } }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::MISSING_RETURN));
    }

    #[test]
    fn duplicate_struct_field_fails_at_the_second_field() {
        let err = check_source("struct P { x int, x float }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::DUPLICATE_FIELD));
    }

    #[test]
    fn break_outside_a_loop_fails() {
        let err = check_source("fun f() { break }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::BREAK_OUTSIDE_LOOP));
        check_source("fun f() { while true { break } }\n").expect("check");
    }

    #[test]
    fn condition_must_be_bool() {
        let err = check_source("fun f() { if 1 { return } }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::ARGUMENT_TYPE_MISMATCH));
    }

    #[test]
    fn mixed_operand_types_fail() {
        let err = check_source("fun f() int { return 1 + 1.5 }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::OPERATOR_NOT_IMPLEMENTED));
    }

    #[test]
    fn assignment_requires_a_place() {
        let err = check_source("fun f() { var x = 1\n(x + 1) = 2 }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::OPERATOR_NOT_IMPLEMENTED));
        check_source("fun f() { var x = 1\nx = 2 }\n").expect("check");
    }

    #[test]
    fn string_literals_are_char_pointers() {
        let program =
            check_source("fun f() *char { return \"hi\" }\n").expect("check");
        let module = program.module(FileId(0));
        let f = &module.functions[0];
        assert!(matches!(
            module.module.types.get(f.returns),
            Type::Pointer { to } if *to == TypeTable::CHAR
        ));
    }

    #[test]
    fn call_arity_and_argument_types_are_enforced() {
        let err = check_source("fun g(x int) {}\nfun f() { g() }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::ARITY_MISMATCH));
        let err = check_source("fun g(x int) {}\nfun f() { g(true) }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::ARGUMENT_TYPE_MISMATCH));
    }

    #[test]
    fn struct_init_reorders_fields_to_declared_order() {
        let program = check_source(
            "struct P { x int, y int }\nfun f() P { return P { y: 2, x: 1 } }\n",
        )
        .expect("check");
        let f = &program.module(FileId(0)).functions[0];
        let CheckedStmt::Return(Some(expr)) = &f.body.stmts[0] else {
            panic!("expected a return statement");
        };
        let CheckedExprKind::StructInit { fields, .. } = &expr.kind else {
            panic!("expected a struct initializer");
        };
        let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn struct_init_rejects_missing_and_unknown_fields() {
        let err = check_source(
            "struct P { x int, y int }\nfun f() P { return P { x: 1 } }\n",
        )
        .unwrap_err();
        assert_eq!(err.code, Some(codes::FIELD_MISMATCH));
        let err = check_source(
            "struct P { x int }\nfun f() P { return P { x: 1, z: 2 } }\n",
        )
        .unwrap_err();
        assert_eq!(err.code, Some(codes::FIELD_MISMATCH));
    }

    #[test]
    fn field_access_through_a_pointer_is_transparent() {
        check_source(
            "struct P { x int }\nfun f(p *P) int { return p.x }\n",
        )
        .expect("check");
    }

    #[test]
    fn casts_are_numeric_or_pointer_only() {
        check_source("fun f() float { return 1 as float }\n").expect("check");
        check_source("fun f(p *char) *int { return p as *int }\n").expect("check");
        let err = check_source("fun f() int { return true as int }\n").unwrap_err();
        assert_eq!(err.code, Some(codes::ILLEGAL_CAST));
    }

    #[test]
    fn typealias_is_the_same_type_as_its_target() {
        check_source(
            "typealias N = int\nfun f(x N) int { return x }\n",
        )
        .expect("check");
    }

    #[test]
    fn block_scopes_allow_shadowing() {
        check_source(
            "fun f() int { var x = 1\n{ var x = true }\nreturn x }\n",
        )
        .expect("check");
    }

    #[test]
    fn cyclic_imports_check_once_per_module() {
        let program = check_pair("import B\nfun a() {}\n", "import A\nfun b() {}\n")
            .expect("check");
        assert_eq!(program.modules.len(), 2);
        assert_eq!(program.module(FileId(0)).functions[0].name, "a");
        assert_eq!(program.module(FileId(1)).functions[0].name, "b");
    }

    #[test]
    fn imported_functions_check_argument_types() {
        check_pair(
            "import B\nfun f() int { return B::g(1) }\n",
            "fun g(x int) int { return x }\n",
        )
        .expect("check");
        let err = check_pair(
            "import B\nfun f() int { return B::g(true) }\n",
            "fun g(x int) int { return x }\n",
        )
        .unwrap_err();
        assert_eq!(err.code, Some(codes::ARGUMENT_TYPE_MISMATCH));
    }

    #[test]
    fn imported_struct_types_are_nominal_across_modules() {
        check_pair(
            "import B\nfun f(p B::P) int { return B::x(p) }\n",
            "struct P { v int }\nfun x(p P) int { return p.v }\n",
        )
        .expect("check");
    }

    #[test]
    fn module_member_must_be_a_value() {
        let err = check_pair(
            "import B\nfun f() { B::P }\n",
            "struct P { v int }\n",
        )
        .unwrap_err();
        assert_eq!(err.code, Some(codes::UNDECLARED));
        assert!(err.message.contains("is a type, not a value"));
    }

    #[test]
    fn doubly_initialized_field_is_reported_at_the_repetition() {
        let err = check_source(
            "struct P { x int }\nfun f() P { return P { x: 1,\nx: 2 } }\n",
        )
        .unwrap_err();
        assert_eq!(err.code, Some(codes::FIELD_MISMATCH));
        assert!(err.message.contains("initialized twice"));
        assert_eq!(err.position.line, 3);
    }

    #[test]
    fn checked_programs_are_debug_printable() {
        let program = check_source("fun main() int { return 0 }\n").expect("check");
        let text = format!("{program:?}");
        assert!(text.contains("CheckedProgram"));
        assert!(text.contains("main"));
    }

    #[test]
    fn empty_file_checks() {
        let program = check_source("").expect("check");
        assert!(program.module(FileId(0)).functions.is_empty());
    }
}
