//! Parsed AST for WL source files.
//!
//! Three mutually recursive families: definitions, statements, and
//! expressions, plus surface type references. Every node carries a
//! `Position`. The tree is name-only; symbol resolution and types
//! are attached by the checker in `hir`.

use std::fmt;

use crate::source::{FileId, Position};

/// A parsed source file: the unit the loader caches and the checker
/// turns into a module.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub file: FileId,
    pub defs: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Function(FunctionDef),
    ExternFunction(ExternFunctionDef),
    Struct(StructDef),
    Typealias(TypealiasDef),
    Import(ImportDef),
}

impl Definition {
    pub fn position(&self) -> Position {
        match self {
            Definition::Function(d) => d.position,
            Definition::ExternFunction(d) => d.position,
            Definition::Struct(d) => d.position,
            Definition::Typealias(d) => d.position,
            Definition::Import(d) => d.position,
        }
    }

    /// The declared name, used for duplicate detection.
    pub fn name(&self) -> &str {
        match self {
            Definition::Function(d) => &d.name,
            Definition::ExternFunction(d) => &d.name,
            Definition::Struct(d) => &d.name,
            Definition::Typealias(d) => &d.name,
            Definition::Import(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    /// `None` means the function returns unit.
    pub ret: Option<TypeRef>,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternFunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<TypeRef>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypealiasDef {
    pub name: String,
    /// The alias carries a surface type reference, not a type.
    pub target: TypeRef,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDef {
    pub name: String,
    /// Filled in by the loader once the imported file is parsed.
    pub target: Option<FileId>,
    pub position: Position,
}

/// A brace-delimited statement sequence. The delimiter positions are
/// kept so the checker can point at the closing brace.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub open: Position,
    pub close: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var {
        name: String,
        value: Expr,
        position: Position,
    },
    Block(Block),
    Expr(Expr),
    Return {
        value: Option<Expr>,
        position: Position,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        position: Position,
    },
    While {
        cond: Expr,
        body: Block,
        position: Position,
    },
    Break {
        position: Position,
    },
    Continue {
        position: Position,
    },
}

impl Stmt {
    pub fn position(&self) -> Position {
        match self {
            Stmt::Var { position, .. }
            | Stmt::Return { position, .. }
            | Stmt::If { position, .. }
            | Stmt::While { position, .. }
            | Stmt::Break { position }
            | Stmt::Continue { position } => *position,
            Stmt::Block(block) => block.open,
            Stmt::Expr(expr) => expr.position(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Assign => "=",
        }
    }

    /// Binding power; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul | BinaryOp::Div => 20,
            BinaryOp::Add | BinaryOp::Sub => 15,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 10,
            BinaryOp::Eq | BinaryOp::Ne => 5,
            BinaryOp::Assign => 1,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        matches!(self, BinaryOp::Assign)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral {
        value: i64,
        position: Position,
    },
    FloatLiteral {
        value: f64,
        position: Position,
    },
    StringLiteral {
        value: String,
        position: Position,
    },
    BoolLiteral {
        value: bool,
        position: Position,
    },
    Identifier {
        name: String,
        position: Position,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        position: Position,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        position: Position,
    },
    Grouped {
        inner: Box<Expr>,
        position: Position,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        position: Position,
    },
    StructInit {
        name: String,
        /// Field initializers in source order.
        fields: Vec<FieldInit>,
        position: Position,
    },
    ObjectAccess {
        object: Box<Expr>,
        field: String,
        position: Position,
    },
    ModuleAccess {
        module: String,
        member: String,
        position: Position,
    },
    As {
        value: Box<Expr>,
        ty: TypeRef,
        position: Position,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
    pub position: Position,
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Expr::IntLiteral { position, .. }
            | Expr::FloatLiteral { position, .. }
            | Expr::StringLiteral { position, .. }
            | Expr::BoolLiteral { position, .. }
            | Expr::Identifier { position, .. }
            | Expr::Unary { position, .. }
            | Expr::Binary { position, .. }
            | Expr::Grouped { position, .. }
            | Expr::Call { position, .. }
            | Expr::StructInit { position, .. }
            | Expr::ObjectAccess { position, .. }
            | Expr::ModuleAccess { position, .. }
            | Expr::As { position, .. } => *position,
        }
    }

    /// Structural equality ignoring grouping parentheses; used by the
    /// round-trip property test and nowhere in the pipeline itself.
    pub fn same_shape(&self, other: &Expr) -> bool {
        use Expr::*;
        match (self.peel(), other.peel()) {
            (IntLiteral { value: a, .. }, IntLiteral { value: b, .. }) => a == b,
            (FloatLiteral { value: a, .. }, FloatLiteral { value: b, .. }) => a == b,
            (StringLiteral { value: a, .. }, StringLiteral { value: b, .. }) => a == b,
            (BoolLiteral { value: a, .. }, BoolLiteral { value: b, .. }) => a == b,
            (Identifier { name: a, .. }, Identifier { name: b, .. }) => a == b,
            (
                Unary { op: ao, operand: ae, .. },
                Unary { op: bo, operand: be, .. },
            ) => ao == bo && ae.same_shape(be),
            (
                Binary { op: ao, lhs: al, rhs: ar, .. },
                Binary { op: bo, lhs: bl, rhs: br, .. },
            ) => ao == bo && al.same_shape(bl) && ar.same_shape(br),
            (
                Call { callee: ac, args: aa, .. },
                Call { callee: bc, args: ba, .. },
            ) => {
                ac.same_shape(bc)
                    && aa.len() == ba.len()
                    && aa.iter().zip(ba).all(|(x, y)| x.same_shape(y))
            }
            (
                StructInit { name: an, fields: af, .. },
                StructInit { name: bn, fields: bf, .. },
            ) => {
                an == bn
                    && af.len() == bf.len()
                    && af
                        .iter()
                        .zip(bf)
                        .all(|(x, y)| x.name == y.name && x.value.same_shape(&y.value))
            }
            (
                ObjectAccess { object: ao, field: af, .. },
                ObjectAccess { object: bo, field: bf, .. },
            ) => af == bf && ao.same_shape(bo),
            (
                ModuleAccess { module: am, member: ax, .. },
                ModuleAccess { module: bm, member: bx, .. },
            ) => am == bm && ax == bx,
            (As { value: av, .. }, As { value: bv, .. }) => av.same_shape(bv),
            _ => false,
        }
    }

    fn peel(&self) -> &Expr {
        match self {
            Expr::Grouped { inner, .. } => inner.peel(),
            other => other,
        }
    }
}

/// Surface reference to a type, resolved by the checker.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named {
        name: String,
        position: Position,
    },
    Pointer {
        inner: Box<TypeRef>,
        position: Position,
    },
    Module {
        module: String,
        name: String,
        position: Position,
    },
}

impl TypeRef {
    pub fn position(&self) -> Position {
        match self {
            TypeRef::Named { position, .. }
            | TypeRef::Pointer { position, .. }
            | TypeRef::Module { position, .. } => *position,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, .. } => write!(f, "{name}"),
            TypeRef::Pointer { inner, .. } => write!(f, "*{inner}"),
            TypeRef::Module { module, name, .. } => write!(f, "{module}::{name}"),
        }
    }
}

// Canonical printer: renders an expression back to parseable source,
// inserting parentheses only where precedence demands them.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr(f, self, 0)
    }
}

const POSTFIX_PRECEDENCE: u8 = 25;

fn fmt_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, min_prec: u8) -> fmt::Result {
    match expr {
        Expr::IntLiteral { value, .. } => write!(f, "{value}"),
        Expr::FloatLiteral { value, .. } => {
            if value.fract() == 0.0 {
                write!(f, "{value:.1}")
            } else {
                write!(f, "{value}")
            }
        }
        Expr::StringLiteral { value, .. } => {
            write!(f, "\"")?;
            for ch in value.chars() {
                match ch {
                    '\\' => write!(f, "\\\\")?,
                    '"' => write!(f, "\\\"")?,
                    '\n' => write!(f, "\\n")?,
                    '\t' => write!(f, "\\t")?,
                    '\r' => write!(f, "\\r")?,
                    other => write!(f, "{other}")?,
                }
            }
            write!(f, "\"")
        }
        Expr::BoolLiteral { value, .. } => write!(f, "{value}"),
        Expr::Identifier { name, .. } => write!(f, "{name}"),
        Expr::Unary { op, operand, .. } => {
            write!(f, "{}", op.symbol())?;
            fmt_expr(f, operand, POSTFIX_PRECEDENCE)
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            let prec = op.precedence();
            let parens = prec < min_prec;
            if parens {
                write!(f, "(")?;
            }
            let (lmin, rmin) = if op.is_right_assoc() {
                (prec + 1, prec)
            } else {
                (prec, prec + 1)
            };
            fmt_expr(f, lhs, lmin)?;
            write!(f, " {} ", op.symbol())?;
            fmt_expr(f, rhs, rmin)?;
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
        Expr::Grouped { inner, .. } => fmt_expr(f, inner, min_prec),
        Expr::Call { callee, args, .. } => {
            fmt_expr(f, callee, POSTFIX_PRECEDENCE)?;
            write!(f, "(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_expr(f, arg, 0)?;
            }
            write!(f, ")")
        }
        Expr::StructInit { name, fields, .. } => {
            write!(f, "{name} {{ ")?;
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: ", field.name)?;
                fmt_expr(f, &field.value, 0)?;
            }
            write!(f, " }}")
        }
        Expr::ObjectAccess { object, field, .. } => {
            fmt_expr(f, object, POSTFIX_PRECEDENCE)?;
            write!(f, ".{field}")
        }
        Expr::ModuleAccess { module, member, .. } => write!(f, "{module}::{member}"),
        Expr::As { value, ty, .. } => {
            let parens = min_prec > 0;
            if parens {
                write!(f, "(")?;
            }
            fmt_expr(f, value, 1)?;
            write!(f, " as {ty}")?;
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::new(FileId(0), 1)
    }

    fn ident(name: &str) -> Expr {
        Expr::Identifier {
            name: name.to_string(),
            position: pos(),
        }
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            position: pos(),
        }
    }

    #[test]
    fn printer_adds_parens_only_where_needed() {
        // (a - b) * c keeps its parens; a - (b - c) keeps its parens.
        let left = binary(
            BinaryOp::Mul,
            binary(BinaryOp::Sub, ident("a"), ident("b")),
            ident("c"),
        );
        assert_eq!(left.to_string(), "(a - b) * c");

        let right = binary(
            BinaryOp::Sub,
            ident("a"),
            binary(BinaryOp::Sub, ident("b"), ident("c")),
        );
        assert_eq!(right.to_string(), "a - (b - c)");

        let natural = binary(
            BinaryOp::Add,
            ident("a"),
            binary(BinaryOp::Mul, ident("b"), ident("c")),
        );
        assert_eq!(natural.to_string(), "a + b * c");
    }

    #[test]
    fn printer_renders_postfix_chains() {
        let expr = Expr::Call {
            callee: Box::new(Expr::ObjectAccess {
                object: Box::new(ident("p")),
                field: "f".to_string(),
                position: pos(),
            }),
            args: vec![ident("x")],
            position: pos(),
        };
        assert_eq!(expr.to_string(), "p.f(x)");
    }

    #[test]
    fn same_shape_ignores_grouping() {
        let bare = ident("a");
        let grouped = Expr::Grouped {
            inner: Box::new(ident("a")),
            position: pos(),
        };
        assert!(bare.same_shape(&grouped));
    }
}
