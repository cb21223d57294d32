//! Extern lowering.
//!
//! Every `extern fun` declaration becomes a concrete function with
//! the same name, parameters and return type, whose body is a single
//! `return inlineC("name(p1, p2)")`. The `inlineC` intrinsic exists
//! in every module's prelude; the back end splices its argument into
//! the output verbatim. After lowering, no module has externs left
//! and every former extern call site resolves to the wrapper.

use crate::hir::{
    CheckedBlock, CheckedExpr, CheckedExprKind, CheckedExtern, CheckedFunction,
    CheckedProgram, CheckedStmt,
};
use crate::module::Module;
use crate::types::{Type, TypeTable};

pub fn lower(program: &mut CheckedProgram) {
    for module in &mut program.modules {
        let externs = std::mem::take(&mut module.externs);
        for ext in externs {
            let wrapper = lower_extern(&mut module.module, ext);
            module.functions.push(wrapper);
        }
    }
}

fn lower_extern(module: &mut Module, ext: CheckedExtern) -> CheckedFunction {
    let names: Vec<&str> = ext.params.iter().map(|p| p.name.as_str()).collect();
    let text = format!("{}({})", ext.name, names.join(", "));

    let string_ty = module.types.intern(Type::Pointer { to: TypeTable::CHAR });
    // interning makes this the same id the prelude registered
    let inline_ty = module.types.intern(Type::Function {
        params: vec![string_ty],
        returns: TypeTable::UNIT,
    });

    let call = CheckedExpr {
        kind: CheckedExprKind::Call {
            callee: Box::new(CheckedExpr {
                kind: CheckedExprKind::Function("inlineC".to_string()),
                ty: inline_ty,
                position: ext.position,
            }),
            args: vec![CheckedExpr {
                kind: CheckedExprKind::Str(text),
                ty: string_ty,
                position: ext.position,
            }],
        },
        ty: ext.returns,
        position: ext.position,
    };

    CheckedFunction {
        name: ext.name,
        params: ext.params,
        returns: ext.returns,
        body: CheckedBlock {
            stmts: vec![CheckedStmt::Return(Some(call))],
        },
        position: ext.position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check;
    use crate::lexer::lex;
    use crate::parser::parse_file;
    use crate::source::FileId;

    fn lowered(source: &str) -> CheckedProgram {
        let tokens = lex(FileId(0), source).expect("lex");
        let parsed = parse_file(FileId(0), tokens).expect("parse");
        let mut program = check(FileId(0), &[parsed]).expect("check");
        lower(&mut program);
        program
    }

    #[test]
    fn externs_become_inline_c_wrappers() {
        let program = lowered(
            "extern fun puts(s *char) int\nfun main() int { return puts(\"hi\") }\n",
        );
        let module = program.module(FileId(0));
        assert!(module.externs.is_empty());

        let puts = module
            .functions
            .iter()
            .find(|f| f.name == "puts")
            .expect("wrapper function must exist");
        assert_eq!(puts.params.len(), 1);
        assert_eq!(puts.params[0].name, "s");
        assert_eq!(puts.returns, TypeTable::INT);

        let CheckedStmt::Return(Some(expr)) = &puts.body.stmts[0] else {
            panic!("wrapper body must be a single return");
        };
        assert_eq!(expr.ty, TypeTable::INT);
        let CheckedExprKind::Call { callee, args } = &expr.kind else {
            panic!("wrapper must return a call");
        };
        assert!(matches!(&callee.kind, CheckedExprKind::Function(n) if n == "inlineC"));
        assert!(matches!(&args[0].kind, CheckedExprKind::Str(s) if s == "puts(s)"));
    }

    #[test]
    fn main_is_untouched_by_lowering() {
        let program = lowered(
            "extern fun puts(s *char) int\nfun main() int { return puts(\"hi\") }\n",
        );
        let module = program.module(FileId(0));
        let main = module
            .functions
            .iter()
            .find(|f| f.name == "main")
            .expect("main must exist");
        let CheckedStmt::Return(Some(expr)) = &main.body.stmts[0] else {
            panic!("main body must be a return");
        };
        assert!(matches!(expr.kind, CheckedExprKind::Call { .. }));
    }

    #[test]
    fn lowering_without_externs_is_a_no_op() {
        let program = lowered("fun main() int { return 0 }\n");
        let module = program.module(FileId(0));
        assert_eq!(module.functions.len(), 1);
        assert!(module.externs.is_empty());
    }
}
