//! Checked representation.
//!
//! Mirrors the parsed AST, but every expression carries its `TypeId`,
//! identifiers are resolved to a symbol kind, grouping parentheses
//! are gone, and struct initializers hold their fields in declared
//! order. Positions are kept for the back end's line mapping.

use crate::ast::{BinaryOp, UnaryOp};
use crate::module::Module;
use crate::source::{FileId, Position};
use crate::types::{ImportId, TypeId};

/// The analyzer's output: one checked module per loaded file, dense
/// in `FileId`, so `modules[file.0]` is that file's module.
#[derive(Debug)]
pub struct CheckedProgram {
    pub entry: FileId,
    pub modules: Vec<CheckedModule>,
}

impl CheckedProgram {
    pub fn module(&self, file: FileId) -> &CheckedModule {
        &self.modules[file.0 as usize]
    }
}

#[derive(Debug)]
pub struct CheckedModule {
    pub module: Module,
    pub functions: Vec<CheckedFunction>,
    /// Emptied by extern lowering.
    pub externs: Vec<CheckedExtern>,
}

#[derive(Debug, Clone)]
pub struct CheckedParam {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug)]
pub struct CheckedFunction {
    pub name: String,
    pub params: Vec<CheckedParam>,
    pub returns: TypeId,
    pub body: CheckedBlock,
    pub position: Position,
}

#[derive(Debug)]
pub struct CheckedExtern {
    pub name: String,
    pub params: Vec<CheckedParam>,
    pub returns: TypeId,
    pub position: Position,
}

#[derive(Debug)]
pub struct CheckedBlock {
    pub stmts: Vec<CheckedStmt>,
}

#[derive(Debug)]
pub enum CheckedStmt {
    Var {
        name: String,
        ty: TypeId,
        value: CheckedExpr,
    },
    Expr(CheckedExpr),
    Block(CheckedBlock),
    Return(Option<CheckedExpr>),
    If {
        cond: CheckedExpr,
        then_block: CheckedBlock,
        else_block: Option<CheckedBlock>,
    },
    While {
        cond: CheckedExpr,
        body: CheckedBlock,
    },
    Break,
    Continue,
}

#[derive(Debug)]
pub struct CheckedExpr {
    pub kind: CheckedExprKind,
    pub ty: TypeId,
    pub position: Position,
}

#[derive(Debug)]
pub enum CheckedExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// A local or parameter binding.
    Variable(String),
    /// A function in the current module (or the prelude).
    Function(String),
    /// A function reached through `Module::name`.
    ModuleFunction { import: ImportId, name: String },
    Unary {
        op: UnaryOp,
        operand: Box<CheckedExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<CheckedExpr>,
        rhs: Box<CheckedExpr>,
    },
    Call {
        callee: Box<CheckedExpr>,
        args: Vec<CheckedExpr>,
    },
    StructInit {
        struct_ty: TypeId,
        /// Declared field order, not source order.
        fields: Vec<(String, CheckedExpr)>,
    },
    Field {
        object: Box<CheckedExpr>,
        field: String,
    },
    /// `e as T`; the target type is the expression's `ty`.
    Cast { value: Box<CheckedExpr> },
}
