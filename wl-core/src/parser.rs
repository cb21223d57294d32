//! Parser for WL token streams.
//!
//! Definitions and statements are plain recursive descent; the
//! expression grammar is precedence climbing with explicit minimum
//! precedence arguments. The parser has several entry points (file,
//! definition, statement, expression) so the REPL and tests can
//! parse fragments; the complete ones verify the trailing Eof.
//!
//! The first failure aborts and is returned as a diagnostic shaped
//! "expected X, but got Y". Duplicate names are not detected here;
//! that is the checker's job.

use crate::ast::*;
use crate::diagnostic::{Diagnostic, codes};
use crate::lexer::{Token, TokenKind};
use crate::source::FileId;

/// Parse a complete source file into definitions.
pub fn parse_file(file: FileId, tokens: Vec<Token>) -> Result<ParsedFile, Diagnostic> {
    let mut parser = Parser::new(tokens);
    let mut defs = Vec::new();
    loop {
        parser.skip_newlines();
        if parser.check(TokenKind::Eof) {
            return Ok(ParsedFile { file, defs });
        }
        let def = parser.parse_definition()?;
        parser.expect_terminator()?;
        defs.push(def);
    }
}

/// Parse a single definition followed by end of input.
pub fn parse_definition(tokens: Vec<Token>) -> Result<Definition, Diagnostic> {
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let def = parser.parse_definition()?;
    parser.expect_end()?;
    Ok(def)
}

/// Parse a single statement followed by end of input.
pub fn parse_statement(tokens: Vec<Token>) -> Result<Stmt, Diagnostic> {
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let stmt = parser.parse_stmt()?;
    parser.expect_end()?;
    Ok(stmt)
}

/// Parse a single expression followed by end of input.
pub fn parse_expression(tokens: Vec<Token>) -> Result<Expr, Diagnostic> {
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let expr = parser.parse_expr(0)?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Set while parsing `if`/`while` conditions: a `{` after an
    /// identifier opens the statement's block there, not a struct
    /// literal. Parenthesized literals are still allowed.
    no_struct_literal: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Parser {
        Parser {
            tokens,
            pos: 0,
            no_struct_literal: false,
        }
    }

    // -- token plumbing ------------------------------------------------

    fn peek(&self) -> &Token {
        // The token vector always ends in Eof.
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens.last().expect("token stream must not be empty")
        })
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_next_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) { Some(self.advance()) } else { None }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let found = self.peek();
        Diagnostic::error(
            format!("expected {}, but got {}", expected, found.kind.describe()),
            found.position,
        )
        .with_code(codes::UNEXPECTED_TOKEN)
    }

    /// Skips newline tokens; returns true if any were consumed.
    fn skip_newlines(&mut self) -> bool {
        let mut skipped = false;
        while self.check(TokenKind::Newline) {
            self.advance();
            skipped = true;
        }
        skipped
    }

    /// A definition ends at a newline or end of file.
    fn expect_terminator(&mut self) -> Result<(), Diagnostic> {
        if self.check(TokenKind::Eof) || self.skip_newlines() {
            Ok(())
        } else {
            Err(self.unexpected("newline"))
        }
    }

    fn expect_end(&mut self) -> Result<(), Diagnostic> {
        self.skip_newlines();
        self.expect(TokenKind::Eof)?;
        Ok(())
    }

    // -- definitions ---------------------------------------------------

    fn parse_definition(&mut self) -> Result<Definition, Diagnostic> {
        match self.peek_kind() {
            TokenKind::KwImport => {
                let kw = self.advance();
                let name = self.expect(TokenKind::Ident)?;
                Ok(Definition::Import(ImportDef {
                    name: name.content,
                    target: None,
                    position: kw.position,
                }))
            }
            TokenKind::KwFun => {
                let kw = self.advance();
                let (name, params, ret) = self.parse_fun_signature(false)?;
                let body = self.parse_block()?;
                Ok(Definition::Function(FunctionDef {
                    name,
                    params,
                    ret,
                    body,
                    position: kw.position,
                }))
            }
            TokenKind::KwExtern => {
                let kw = self.advance();
                self.expect(TokenKind::KwFun)?;
                let (name, params, ret) = self.parse_fun_signature(true)?;
                Ok(Definition::ExternFunction(ExternFunctionDef {
                    name,
                    params,
                    ret,
                    position: kw.position,
                }))
            }
            TokenKind::KwStruct => {
                let kw = self.advance();
                let name = self.expect(TokenKind::Ident)?;
                let fields = self.parse_struct_fields()?;
                Ok(Definition::Struct(StructDef {
                    name: name.content,
                    fields,
                    position: kw.position,
                }))
            }
            TokenKind::KwTypealias => {
                let kw = self.advance();
                let name = self.expect(TokenKind::Ident)?;
                self.expect(TokenKind::Equal)?;
                let target = self.parse_type_ref()?;
                Ok(Definition::Typealias(TypealiasDef {
                    name: name.content,
                    target,
                    position: kw.position,
                }))
            }
            _ => Err(self.unexpected("a definition")),
        }
    }

    /// `IDENT ( name type, ... ) [type]` shared by `fun` and
    /// `extern fun`. An extern has no body, so its optional return
    /// type ends at the statement terminator instead of `{`.
    fn parse_fun_signature(
        &mut self,
        is_extern: bool,
    ) -> Result<(String, Vec<Param>, Option<TypeRef>), Diagnostic> {
        let name = self.expect(TokenKind::Ident)?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let pname = self.expect(TokenKind::Ident)?;
                let ty = self.parse_type_ref()?;
                params.push(Param {
                    name: pname.content,
                    ty,
                    position: pname.position,
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let at_end = if is_extern {
            matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof)
        } else {
            self.check(TokenKind::LBrace)
        };
        let ret = if at_end { None } else { Some(self.parse_type_ref()?) };
        Ok((name.content, params, ret))
    }

    fn parse_struct_fields(&mut self) -> Result<Vec<FieldDef>, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                self.advance();
                return Ok(fields);
            }
            let name = self.expect(TokenKind::Ident)?;
            let ty = self.parse_type_ref()?;
            fields.push(FieldDef {
                name: name.content,
                ty,
                position: name.position,
            });
            let separated = self.eat(TokenKind::Comma).is_some() | self.skip_newlines();
            if !separated && !self.check(TokenKind::RBrace) {
                return Err(self.unexpected("`,` or `}`"));
            }
        }
    }

    fn parse_type_ref(&mut self) -> Result<TypeRef, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Star => {
                let star = self.advance();
                let inner = self.parse_type_ref()?;
                Ok(TypeRef::Pointer {
                    inner: Box::new(inner),
                    position: star.position,
                })
            }
            TokenKind::Ident => {
                let name = self.advance();
                if self.eat(TokenKind::ColonColon).is_some() {
                    let member = self.expect(TokenKind::Ident)?;
                    Ok(TypeRef::Module {
                        module: name.content,
                        name: member.content,
                        position: name.position,
                    })
                } else {
                    Ok(TypeRef::Named {
                        name: name.content,
                        position: name.position,
                    })
                }
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    // -- statements ----------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, Diagnostic> {
        let open = self.expect(TokenKind::LBrace)?.position;
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                let close = self.advance().position;
                return Ok(Block { stmts, open, close });
            }
            if self.check(TokenKind::Eof) {
                return Err(self.unexpected("`}`"));
            }
            let stmt = self.parse_stmt()?;
            if !self.check(TokenKind::Newline) && !self.check(TokenKind::RBrace) {
                return Err(self.unexpected("newline"));
            }
            stmts.push(stmt);
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek_kind() {
            TokenKind::KwVar => {
                let kw = self.advance();
                let name = self.expect(TokenKind::Ident)?;
                self.expect(TokenKind::Equal)?;
                let value = self.parse_expr(0)?;
                Ok(Stmt::Var {
                    name: name.content,
                    value,
                    position: kw.position,
                })
            }
            TokenKind::Ident if self.peek_next_kind() == TokenKind::ColonEqual => {
                let name = self.advance();
                self.advance(); // :=
                let value = self.parse_expr(0)?;
                Ok(Stmt::Var {
                    name: name.content,
                    value,
                    position: name.position,
                })
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::KwReturn => {
                let kw = self.advance();
                let value = if matches!(
                    self.peek_kind(),
                    TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
                ) {
                    None
                } else {
                    Some(self.parse_expr(0)?)
                };
                Ok(Stmt::Return {
                    value,
                    position: kw.position,
                })
            }
            TokenKind::KwIf => {
                let kw = self.advance();
                let cond = self.parse_condition()?;
                let then_block = self.parse_block()?;
                let else_block = if self.eat(TokenKind::KwElse).is_some() {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_block,
                    else_block,
                    position: kw.position,
                })
            }
            TokenKind::KwWhile => {
                let kw = self.advance();
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                Ok(Stmt::While {
                    cond,
                    body,
                    position: kw.position,
                })
            }
            TokenKind::KwBreak => {
                let kw = self.advance();
                Ok(Stmt::Break {
                    position: kw.position,
                })
            }
            TokenKind::KwContinue => {
                let kw = self.advance();
                Ok(Stmt::Continue {
                    position: kw.position,
                })
            }
            _ => Ok(Stmt::Expr(self.parse_expr(0)?)),
        }
    }

    fn parse_condition(&mut self) -> Result<Expr, Diagnostic> {
        let saved = self.no_struct_literal;
        self.no_struct_literal = true;
        let result = self.parse_expr(0);
        self.no_struct_literal = saved;
        result
    }

    // -- expressions ---------------------------------------------------

    /// Precedence-climbing loop. Left-associative operators recurse
    /// with `precedence + 1`, the right-associative `=` with the same
    /// precedence; `as` sits at level 0 as a postfix.
    fn parse_expr(&mut self, min_prec: u8) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_unary()?;
        loop {
            if let Some(op) = binary_op(self.peek_kind()) {
                let prec = op.precedence();
                if prec < min_prec {
                    break;
                }
                let token = self.advance();
                let next_min = if op.is_right_assoc() { prec } else { prec + 1 };
                let rhs = self.parse_expr(next_min)?;
                lhs = Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    position: token.position,
                };
            } else if self.check(TokenKind::KwAs) && min_prec == 0 {
                let token = self.advance();
                let ty = self.parse_type_ref()?;
                lhs = Expr::As {
                    value: Box::new(lhs),
                    ty,
                    position: token.position,
                };
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek_kind() {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            _ => None,
        };
        if let Some(op) = op {
            let token = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                position: token.position,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let open = self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        let saved = self.no_struct_literal;
                        self.no_struct_literal = false;
                        loop {
                            match self.parse_expr(0) {
                                Ok(arg) => args.push(arg),
                                Err(e) => {
                                    self.no_struct_literal = saved;
                                    return Err(e);
                                }
                            }
                            if self.eat(TokenKind::Comma).is_none() {
                                break;
                            }
                        }
                        self.no_struct_literal = saved;
                    }
                    self.expect(TokenKind::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        position: open.position,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect(TokenKind::Ident)?;
                    expr = Expr::ObjectAccess {
                        object: Box::new(expr),
                        field: field.content,
                        position: field.position,
                    };
                }
                TokenKind::ColonColon => {
                    let token = self.advance();
                    let member = self.expect(TokenKind::Ident)?;
                    let Expr::Identifier { name, position } = expr else {
                        return Err(Diagnostic::error(
                            "expected module name before `::`",
                            token.position,
                        )
                        .with_code(codes::UNEXPECTED_TOKEN));
                    };
                    expr = Expr::ModuleAccess {
                        module: name,
                        member: member.content,
                        position,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Int => {
                let token = self.advance();
                let value = token.content.parse::<i64>().map_err(|_| {
                    Diagnostic::error(
                        format!("integer literal `{}` is out of range", token.content),
                        token.position,
                    )
                    .with_code(codes::UNEXPECTED_TOKEN)
                })?;
                Ok(Expr::IntLiteral {
                    value,
                    position: token.position,
                })
            }
            TokenKind::Float => {
                let token = self.advance();
                let value = token.content.parse::<f64>().map_err(|_| {
                    Diagnostic::error(
                        format!("float literal `{}` is out of range", token.content),
                        token.position,
                    )
                    .with_code(codes::UNEXPECTED_TOKEN)
                })?;
                Ok(Expr::FloatLiteral {
                    value,
                    position: token.position,
                })
            }
            TokenKind::Str => {
                let token = self.advance();
                Ok(Expr::StringLiteral {
                    value: token.content,
                    position: token.position,
                })
            }
            TokenKind::KwTrue | TokenKind::KwFalse => {
                let token = self.advance();
                Ok(Expr::BoolLiteral {
                    value: token.kind == TokenKind::KwTrue,
                    position: token.position,
                })
            }
            TokenKind::LParen => {
                let open = self.advance();
                let saved = self.no_struct_literal;
                self.no_struct_literal = false;
                let inner = self.parse_expr(0);
                self.no_struct_literal = saved;
                let inner = inner?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Grouped {
                    inner: Box::new(inner),
                    position: open.position,
                })
            }
            TokenKind::Ident => {
                let token = self.advance();
                if self.check(TokenKind::LBrace) && !self.no_struct_literal {
                    let fields = self.parse_field_inits()?;
                    Ok(Expr::StructInit {
                        name: token.content,
                        fields,
                        position: token.position,
                    })
                } else {
                    Ok(Expr::Identifier {
                        name: token.content,
                        position: token.position,
                    })
                }
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_field_inits(&mut self) -> Result<Vec<FieldInit>, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;
        let result = self.parse_field_inits_inner();
        self.no_struct_literal = saved;
        result
    }

    fn parse_field_inits_inner(&mut self) -> Result<Vec<FieldInit>, Diagnostic> {
        let mut fields = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                self.advance();
                return Ok(fields);
            }
            let name = self.expect(TokenKind::Ident)?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr(0)?;
            fields.push(FieldInit {
                name: name.content,
                value,
                position: name.position,
            });
            let separated = self.eat(TokenKind::Comma).is_some() | self.skip_newlines();
            if !separated && !self.check(TokenKind::RBrace) {
                return Err(self.unexpected("`,` or `}`"));
            }
        }
    }
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::BangEqual => BinaryOp::Ne,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEqual => BinaryOp::Le,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEqual => BinaryOp::Ge,
        TokenKind::Equal => BinaryOp::Assign,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn expr(source: &str) -> Expr {
        let tokens = lex(FileId(0), source).expect("lex");
        parse_expression(tokens).expect("parse")
    }

    fn stmt(source: &str) -> Stmt {
        let tokens = lex(FileId(0), source).expect("lex");
        parse_statement(tokens).expect("parse")
    }

    fn file(source: &str) -> ParsedFile {
        let tokens = lex(FileId(0), source).expect("lex");
        parse_file(FileId(0), tokens).expect("parse")
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let e = expr("1 + 2 * 3");
        let Expr::Binary { op: BinaryOp::Add, rhs, .. } = e else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        // a - b - c => (a - b) - c
        let e = expr("a - b - c");
        let Expr::Binary { op: BinaryOp::Sub, lhs, rhs, .. } = e else {
            panic!("expected subtraction at the root");
        };
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert!(matches!(*rhs, Expr::Identifier { ref name, .. } if name == "c"));
    }

    #[test]
    fn assignment_is_right_associative() {
        // a = b = c => a = (b = c)
        let e = expr("a = b = c");
        let Expr::Binary { op: BinaryOp::Assign, lhs, rhs, .. } = e else {
            panic!("expected assignment at the root");
        };
        assert!(matches!(*lhs, Expr::Identifier { ref name, .. } if name == "a"));
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Assign, .. }));
    }

    #[test]
    fn cast_applies_to_the_whole_expression() {
        let e = expr("1 + 2 as float");
        assert!(matches!(e, Expr::As { .. }));
    }

    #[test]
    fn unary_minus_binds_tighter_than_binary() {
        let e = expr("-a * b");
        let Expr::Binary { op: BinaryOp::Mul, lhs, .. } = e else {
            panic!("expected multiplication at the root");
        };
        assert!(matches!(*lhs, Expr::Unary { op: UnaryOp::Minus, .. }));
    }

    #[test]
    fn postfix_chain_parses_calls_and_fields() {
        let e = expr("p.next.f(1, 2)");
        let Expr::Call { callee, args, .. } = e else {
            panic!("expected a call at the root");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(*callee, Expr::ObjectAccess { .. }));
    }

    #[test]
    fn module_access_is_callable() {
        let e = expr("math::abs(x)");
        let Expr::Call { callee, .. } = e else {
            panic!("expected a call at the root");
        };
        assert!(
            matches!(*callee, Expr::ModuleAccess { ref module, ref member, .. }
                if module == "math" && member == "abs")
        );
    }

    #[test]
    fn struct_literal_fields_keep_source_order() {
        let e = expr("Point { y: 2, x: 1 }");
        let Expr::StructInit { name, fields, .. } = e else {
            panic!("expected a struct literal");
        };
        assert_eq!(name, "Point");
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["y", "x"]);
    }

    #[test]
    fn if_condition_does_not_eat_the_block_as_a_struct_literal() {
        let s = stmt("if x { return }");
        let Stmt::If { cond, then_block, .. } = s else {
            panic!("expected an if statement");
        };
        assert!(matches!(cond, Expr::Identifier { .. }));
        assert_eq!(then_block.stmts.len(), 1);
    }

    #[test]
    fn parenthesized_struct_literal_is_allowed_in_conditions() {
        let s = stmt("if (Point { x: 1, y: 2 }).x == 1 { return }");
        assert!(matches!(s, Stmt::If { .. }));
    }

    #[test]
    fn var_and_colon_equal_are_equivalent() {
        assert!(matches!(stmt("var x = 1"), Stmt::Var { ref name, .. } if name == "x"));
        assert!(matches!(stmt("x := 1"), Stmt::Var { ref name, .. } if name == "x"));
    }

    #[test]
    fn empty_file_parses_to_no_definitions() {
        assert!(file("").defs.is_empty());
        assert!(file("\n\n").defs.is_empty());
    }

    #[test]
    fn parses_function_with_params_and_return_type() {
        let parsed = file("fun id(x int) int { return x }\n");
        assert_eq!(parsed.defs.len(), 1);
        let Definition::Function(f) = &parsed.defs[0] else {
            panic!("expected a function definition");
        };
        assert_eq!(f.name, "id");
        assert_eq!(f.params.len(), 1);
        assert!(f.ret.is_some());
    }

    #[test]
    fn parses_extern_function_without_body() {
        let parsed = file("extern fun puts(s *char) int\n");
        let Definition::ExternFunction(f) = &parsed.defs[0] else {
            panic!("expected an extern function");
        };
        assert_eq!(f.name, "puts");
        assert!(matches!(f.params[0].ty, TypeRef::Pointer { .. }));
    }

    #[test]
    fn reports_expected_but_got() {
        let tokens = lex(FileId(0), "fun 1").expect("lex");
        let err = parse_file(FileId(0), tokens).unwrap_err();
        assert_eq!(err.code, Some(codes::UNEXPECTED_TOKEN));
        assert_eq!(err.message, "expected identifier, but got integer literal");
    }

    #[test]
    fn complete_entry_points_reject_trailing_tokens() {
        let tokens = lex(FileId(0), "1 + 2 3").expect("lex");
        let err = parse_expression(tokens).unwrap_err();
        assert_eq!(err.code, Some(codes::UNEXPECTED_TOKEN));
    }

    #[test]
    fn block_records_closing_brace_position() {
        let parsed = file("fun f() {\n}\n");
        let Definition::Function(f) = &parsed.defs[0] else {
            panic!("expected a function definition");
        };
        assert_eq!(f.body.close.line, 2);
    }

    #[test]
    fn round_trips_through_the_canonical_printer() {
        for source in [
            "1 + 2 * 3",
            "(a - b) - c",
            "a = b = c",
            "-x * y",
            "p.f(1, true) == q::g()",
            "Point { x: 1, y: 2 }.x",
            "1 + 2 as float",
        ] {
            let first = expr(source);
            let reparsed = expr(&first.to_string());
            assert!(
                first.same_shape(&reparsed),
                "round trip changed shape for `{source}`: printed `{first}`"
            );
        }
    }
}
