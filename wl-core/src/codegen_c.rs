//! C code generation from the checked, lowered program.
//!
//! Every symbol except `main` is renamed to `wl_<stem>_<name>`, where
//! stem is the defining file's name without extension. The renaming
//! keeps modules from colliding and keeps extern wrappers from
//! shadowing the C functions they splice in: the wrapper for `puts`
//! is emitted as `wl_main_puts`, so its `inlineC("puts(s)")` body
//! calls the real `puts`.
//!
//! int maps to `int64_t`, float to `double`, unit to `void`; structs
//! become typedefs and struct literals compound literals.

use crate::ast::BinaryOp;
use crate::hir::{
    CheckedBlock, CheckedExpr, CheckedExprKind, CheckedFunction, CheckedProgram,
    CheckedStmt,
};
use crate::source::{FileId, SourceMap};
use crate::types::{Builtin, Type, TypeId, TypeTable};

pub fn generate(program: &CheckedProgram, sources: &SourceMap) -> String {
    Codegen {
        program,
        sources,
        out: String::new(),
    }
    .run()
}

struct Codegen<'a> {
    program: &'a CheckedProgram,
    sources: &'a SourceMap,
    out: String,
}

impl Codegen<'_> {
    fn run(mut self) -> String {
        self.out.push_str("#include <stdbool.h>\n");
        self.out.push_str("#include <stdint.h>\n\n");

        self.emit_structs();
        self.emit_prototypes();
        for m in 0..self.program.modules.len() {
            for function in &self.program.modules[m].functions {
                self.emit_function(m, function);
            }
        }
        self.out
    }

    // -- naming --------------------------------------------------------

    fn stem(&self, file: FileId) -> String {
        let name = self.sources.name(file);
        let stem = name.strip_suffix(".wl").unwrap_or(&name);
        stem.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    fn mangle(&self, file: FileId, name: &str) -> String {
        if name == "main" {
            return "main".to_string();
        }
        format!("wl_{}_{}", self.stem(file), name)
    }

    // -- types ---------------------------------------------------------

    fn resolve(&self, m: usize, ty: TypeId) -> (usize, TypeId) {
        let (mut m, mut ty) = (m, ty);
        loop {
            let module = &self.program.modules[m].module;
            match module.types.get(ty) {
                Type::Extern { import, ty: inner } => {
                    let inner = *inner;
                    m = module.import_target(*import).0 as usize;
                    ty = inner;
                }
                _ => return (m, ty),
            }
        }
    }

    fn struct_c_name(&self, m: usize, ty: TypeId) -> String {
        let (m, ty) = self.resolve(m, ty);
        let module = &self.program.modules[m].module;
        match module.types.get(ty) {
            Type::Struct { name, .. } => self.mangle(module.file, name),
            other => panic!("expected a struct type, got {other:?}"),
        }
    }

    fn c_type(&self, m: usize, ty: TypeId) -> String {
        let (m, ty) = self.resolve(m, ty);
        match self.program.modules[m].module.types.get(ty) {
            Type::Builtin(b) => match b {
                Builtin::Unit => "void",
                Builtin::Int => "int64_t",
                Builtin::Float => "double",
                Builtin::Char => "char",
                Builtin::Bool => "bool",
            }
            .to_string(),
            Type::Pointer { to } => format!("{}*", self.c_type(m, *to)),
            Type::Struct { .. } => self.struct_c_name(m, ty),
            Type::Function { .. } => "void*".to_string(),
            Type::Extern { .. } => unreachable!("resolved above"),
        }
    }

    /// A declaration of `name` with the given type; function types
    /// need the name woven into the pointer syntax.
    fn c_decl(&self, m: usize, ty: TypeId, name: &str) -> String {
        let (rm, rt) = self.resolve(m, ty);
        if let Type::Function { params, returns } =
            self.program.modules[rm].module.types.get(rt)
        {
            let params: Vec<String> =
                params.iter().map(|p| self.c_type(rm, *p)).collect();
            let params = if params.is_empty() {
                "void".to_string()
            } else {
                params.join(", ")
            };
            return format!("{} (*{})({})", self.c_type(rm, *returns), name, params);
        }
        format!("{} {}", self.c_type(m, ty), name)
    }

    fn is_unit(&self, m: usize, ty: TypeId) -> bool {
        self.resolve(m, ty).1 == TypeTable::UNIT
    }

    fn is_pointer(&self, m: usize, ty: TypeId) -> bool {
        let (m, ty) = self.resolve(m, ty);
        matches!(
            self.program.modules[m].module.types.get(ty),
            Type::Pointer { .. }
        )
    }

    // -- struct definitions --------------------------------------------

    /// Structs in dependency order: a struct containing another by
    /// value is emitted after it. Pointer fields only need the
    /// forward typedefs.
    fn emit_structs(&mut self) {
        let mut nodes = Vec::new();
        for (m, checked) in self.program.modules.iter().enumerate() {
            for i in 0..checked.module.types.len() {
                let ty = TypeId(i as u32);
                if matches!(checked.module.types.get(ty), Type::Struct { .. }) {
                    nodes.push((m, ty));
                }
            }
        }

        for &(m, ty) in &nodes {
            let name = self.struct_c_name(m, ty);
            self.out
                .push_str(&format!("typedef struct {name} {name};\n"));
        }
        if !nodes.is_empty() {
            self.out.push('\n');
        }

        let mut emitted = Vec::new();
        for &(m, ty) in &nodes {
            self.emit_struct_def(m, ty, &mut emitted);
        }
    }

    fn emit_struct_def(&mut self, m: usize, ty: TypeId, emitted: &mut Vec<(usize, TypeId)>) {
        let key = self.resolve(m, ty);
        if emitted.contains(&key) {
            return;
        }
        emitted.push(key);

        let (m, ty) = key;
        let Type::Struct { fields, .. } =
            self.program.modules[m].module.types.get(ty).clone()
        else {
            return;
        };
        // by-value struct fields first
        for (_, field_ty) in &fields {
            let (fm, ft) = self.resolve(m, *field_ty);
            if matches!(
                self.program.modules[fm].module.types.get(ft),
                Type::Struct { .. }
            ) {
                self.emit_struct_def(fm, ft, emitted);
            }
        }

        let name = self.struct_c_name(m, ty);
        self.out.push_str(&format!("struct {name} {{\n"));
        for (field_name, field_ty) in &fields {
            let decl = self.c_decl(m, *field_ty, field_name);
            self.out.push_str(&format!("    {decl};\n"));
        }
        self.out.push_str("};\n\n");
    }

    // -- functions -----------------------------------------------------

    fn signature(&self, m: usize, function: &CheckedFunction) -> String {
        let file = self.program.modules[m].module.file;
        let params: Vec<String> = function
            .params
            .iter()
            .map(|p| self.c_decl(m, p.ty, &p.name))
            .collect();
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        format!(
            "{} {}({})",
            self.c_type(m, function.returns),
            self.mangle(file, &function.name),
            params
        )
    }

    fn emit_prototypes(&mut self) {
        let mut any = false;
        for (m, checked) in self.program.modules.iter().enumerate() {
            for function in &checked.functions {
                let sig = self.signature(m, function);
                self.out.push_str(&format!("{sig};\n"));
                any = true;
            }
        }
        if any {
            self.out.push('\n');
        }
    }

    fn emit_function(&mut self, m: usize, function: &CheckedFunction) {
        let sig = self.signature(m, function);
        self.out.push_str(&format!("{sig} {{\n"));
        self.emit_block_stmts(m, &function.body, 1);
        self.out.push_str("}\n\n");
    }

    fn emit_block_stmts(&mut self, m: usize, block: &CheckedBlock, depth: usize) {
        for stmt in &block.stmts {
            self.emit_stmt(m, stmt, depth);
        }
    }

    fn emit_stmt(&mut self, m: usize, stmt: &CheckedStmt, depth: usize) {
        let pad = "    ".repeat(depth);
        match stmt {
            CheckedStmt::Var { name, ty, value } => {
                let value = self.expr(m, value);
                if self.is_unit(m, *ty) {
                    // no C object to declare for a unit binding
                    self.out.push_str(&format!("{pad}{value};\n"));
                } else {
                    let decl = self.c_decl(m, *ty, name);
                    self.out.push_str(&format!("{pad}{decl} = {value};\n"));
                }
            }
            CheckedStmt::Expr(expr) => {
                let expr = self.expr(m, expr);
                self.out.push_str(&format!("{pad}{expr};\n"));
            }
            CheckedStmt::Block(block) => {
                self.out.push_str(&format!("{pad}{{\n"));
                self.emit_block_stmts(m, block, depth + 1);
                self.out.push_str(&format!("{pad}}}\n"));
            }
            CheckedStmt::Return(None) => {
                self.out.push_str(&format!("{pad}return;\n"));
            }
            CheckedStmt::Return(Some(expr)) => {
                let text = self.expr(m, expr);
                if self.is_unit(m, expr.ty) {
                    self.out.push_str(&format!("{pad}{text};\n"));
                    self.out.push_str(&format!("{pad}return;\n"));
                } else {
                    self.out.push_str(&format!("{pad}return {text};\n"));
                }
            }
            CheckedStmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.expr(m, cond);
                self.out.push_str(&format!("{pad}if ({cond}) {{\n"));
                self.emit_block_stmts(m, then_block, depth + 1);
                match else_block {
                    Some(block) => {
                        self.out.push_str(&format!("{pad}}} else {{\n"));
                        self.emit_block_stmts(m, block, depth + 1);
                        self.out.push_str(&format!("{pad}}}\n"));
                    }
                    None => self.out.push_str(&format!("{pad}}}\n")),
                }
            }
            CheckedStmt::While { cond, body } => {
                let cond = self.expr(m, cond);
                self.out.push_str(&format!("{pad}while ({cond}) {{\n"));
                self.emit_block_stmts(m, body, depth + 1);
                self.out.push_str(&format!("{pad}}}\n"));
            }
            CheckedStmt::Break => self.out.push_str(&format!("{pad}break;\n")),
            CheckedStmt::Continue => self.out.push_str(&format!("{pad}continue;\n")),
        }
    }

    // -- expressions ---------------------------------------------------

    fn expr(&self, m: usize, expr: &CheckedExpr) -> String {
        match &expr.kind {
            CheckedExprKind::Int(value) => value.to_string(),
            CheckedExprKind::Float(value) => format!("{value:?}"),
            CheckedExprKind::Str(value) => c_string(value),
            CheckedExprKind::Bool(value) => value.to_string(),
            CheckedExprKind::Variable(name) => name.clone(),
            CheckedExprKind::Function(name) => {
                let file = self.program.modules[m].module.file;
                self.mangle(file, name)
            }
            CheckedExprKind::ModuleFunction { import, name } => {
                let target = self.program.modules[m].module.import_target(*import);
                self.mangle(target, name)
            }
            CheckedExprKind::Unary { op, operand } => {
                format!("({}{})", op.symbol(), self.expr(m, operand))
            }
            CheckedExprKind::Binary { op, lhs, rhs } => {
                let symbol = match op {
                    BinaryOp::Assign => "=",
                    other => other.symbol(),
                };
                format!("({} {} {})", self.expr(m, lhs), symbol, self.expr(m, rhs))
            }
            CheckedExprKind::Call { callee, args } => {
                // inlineC splices its literal argument verbatim
                if let CheckedExprKind::Function(name) = &callee.kind {
                    if name == "inlineC" {
                        if let Some(CheckedExpr {
                            kind: CheckedExprKind::Str(text),
                            ..
                        }) = args.first()
                        {
                            return format!("({text})");
                        }
                    }
                }
                let args: Vec<String> = args.iter().map(|a| self.expr(m, a)).collect();
                format!("{}({})", self.expr(m, callee), args.join(", "))
            }
            CheckedExprKind::StructInit { struct_ty, fields } => {
                let name = self.struct_c_name(m, *struct_ty);
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(n, v)| format!(".{} = {}", n, self.expr(m, v)))
                    .collect();
                format!("(({name}){{ {} }})", fields.join(", "))
            }
            CheckedExprKind::Field { object, field } => {
                let access = if self.is_pointer(m, object.ty) { "->" } else { "." };
                format!("{}{}{}", self.expr(m, object), access, field)
            }
            CheckedExprKind::Cast { value } => {
                format!("(({}){})", self.c_type(m, expr.ty), self.expr(m, value))
            }
        }
    }
}

/// Re-encode a decoded string as a C string literal.
fn c_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check;
    use crate::lexer::lex;
    use crate::lower::lower;
    use crate::parser::parse_file;
    use std::path::PathBuf;

    fn compile(source: &str) -> String {
        let mut sources = SourceMap::new();
        let file = sources.add(PathBuf::from("main.wl"), source.to_string());
        let tokens = lex(file, source).expect("lex");
        let parsed = parse_file(file, tokens).expect("parse");
        let mut program = check(file, &[parsed]).expect("check");
        lower(&mut program);
        generate(&program, &sources)
    }

    #[test]
    fn main_keeps_its_name_and_other_functions_are_renamed() {
        let output = compile("fun helper() int { return 1 }\nfun main() int { return helper() }\n");
        assert!(output.contains("int64_t wl_main_helper(void)"));
        assert!(output.contains("int64_t main(void)"));
        assert!(output.contains("return wl_main_helper();"));
    }

    #[test]
    fn extern_wrapper_splices_the_real_call() {
        let output = compile(
            "extern fun puts(s *char) int\nfun main() int { return puts(\"hi\") }\n",
        );
        // the wrapper is renamed, so its body reaches the C puts
        assert!(output.contains("int64_t wl_main_puts(char* s)"));
        assert!(output.contains("return (puts(s));"));
        assert!(output.contains("return wl_main_puts(\"hi\");"));
    }

    #[test]
    fn structs_become_typedefs_and_compound_literals() {
        let output = compile(
            "struct Point { x int, y int }\n\
             fun main() int { var p = Point { y: 2, x: 1 }\nreturn p.x }\n",
        );
        assert!(output.contains("typedef struct wl_main_Point wl_main_Point;"));
        assert!(output.contains("int64_t x;"));
        assert!(output.contains("((wl_main_Point){ .x = 1, .y = 2 })"));
        assert!(output.contains("return p.x;"));
    }

    #[test]
    fn pointer_field_access_uses_the_arrow() {
        let output = compile(
            "struct Point { x int }\nfun get(p *Point) int { return p.x }\n",
        );
        assert!(output.contains("return p->x;"));
    }

    #[test]
    fn nested_by_value_structs_are_ordered() {
        let output = compile(
            "struct Outer { i Inner }\nstruct Inner { v int }\nfun main() int { return 0 }\n",
        );
        let inner = output.find("struct wl_main_Inner {").expect("inner def");
        let outer = output.find("struct wl_main_Outer {").expect("outer def");
        assert!(inner < outer, "Inner must be defined before Outer");
    }

    #[test]
    fn casts_and_string_escapes_render_as_c() {
        let output = compile(
            "extern fun puts(s *char) int\n\
             fun main() int { puts(\"a\\nb\")\nreturn 1.5 as int }\n",
        );
        assert!(output.contains("\"a\\nb\""));
        assert!(output.contains("((int64_t)1.5)"));
    }
}
