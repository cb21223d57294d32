use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wl_core::Compiler;
use wl_core::ast::{BinaryOp, Block, Expr, Stmt, TypeRef, UnaryOp};
use wl_core::lexer::lex;
use wl_core::parser::parse_statement;
use wl_core::source::FileId;

#[derive(Parser, Debug)]
#[command(version, about = "WL compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a .wl file and print C to standard output
    Compile { input: PathBuf },
    /// Evaluate statements interactively
    Repl,
}

fn main() -> ExitCode {
    match Cli::parse().command {
        Command::Compile { input } => compile(&input),
        Command::Repl => match repl() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err:#}");
                ExitCode::from(1)
            }
        },
    }
}

fn compile(input: &Path) -> ExitCode {
    if input.extension().and_then(|e| e.to_str()) != Some("wl") {
        eprintln!("error: expected a .wl file, got {}", input.display());
        return ExitCode::from(2);
    }
    let mut compiler = Compiler::new();
    match compiler.compile_file(input) {
        Ok(c) => {
            print!("{c}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", compiler.render(&err));
            ExitCode::from(1)
        }
    }
}

// -- repl --------------------------------------------------------------

/// Reads one statement per brace-balanced input, evaluates it against
/// a persistent environment, prints the result, loops. Errors are
/// printed and the loop continues.
fn repl() -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut env: HashMap<String, Value> = HashMap::new();

    loop {
        prompt("> ")?;
        let Some(line) = lines.next() else { break };
        let mut input = line.context("failed to read input")?;
        while braces_open(&input) {
            prompt("| ")?;
            let Some(line) = lines.next() else { break };
            input.push('\n');
            input.push_str(&line.context("failed to read input")?);
        }
        if input.trim().is_empty() {
            continue;
        }
        match read_stmt(&input) {
            Ok(stmt) => match eval_stmt(&mut env, &stmt) {
                Ok(Flow::Normal(Value::Unit)) => {}
                Ok(Flow::Normal(value)) => println!("{value}"),
                Ok(Flow::Break) => eprintln!("error: `break` outside of a loop"),
                Ok(Flow::Continue) => eprintln!("error: `continue` outside of a loop"),
                Err(message) => eprintln!("error: {message}"),
            },
            Err(message) => eprintln!("error: {message}"),
        }
    }
    Ok(())
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    io::stdout().flush().context("failed to flush stdout")?;
    Ok(())
}

/// Net brace count; strings are rare enough at the prompt that a
/// plain count is good company for a line editor.
fn braces_open(input: &str) -> bool {
    let mut depth = 0i32;
    for c in input.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}

fn read_stmt(input: &str) -> std::result::Result<Stmt, String> {
    let tokens = lex(FileId(0), input).map_err(|d| d.message)?;
    parse_statement(tokens).map_err(|d| d.message)
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Unit => write!(f, "()"),
        }
    }
}

enum Flow {
    Normal(Value),
    Break,
    Continue,
}

fn eval_stmt(env: &mut HashMap<String, Value>, stmt: &Stmt) -> std::result::Result<Flow, String> {
    match stmt {
        Stmt::Var { name, value, .. } => {
            let value = eval_expr(env, value)?;
            env.insert(name.clone(), value);
            Ok(Flow::Normal(Value::Unit))
        }
        Stmt::Expr(expr) => Ok(Flow::Normal(eval_expr(env, expr)?)),
        Stmt::Block(block) => eval_block(env, block),
        Stmt::Return { .. } => Err("return is not allowed here".to_string()),
        Stmt::If {
            cond,
            then_block,
            else_block,
            ..
        } => {
            if truthy(env, cond)? {
                eval_block(env, then_block)
            } else if let Some(block) = else_block {
                eval_block(env, block)
            } else {
                Ok(Flow::Normal(Value::Unit))
            }
        }
        Stmt::While { cond, body, .. } => {
            while truthy(env, cond)? {
                for stmt in &body.stmts {
                    match eval_stmt(env, stmt)? {
                        Flow::Normal(_) => {}
                        Flow::Continue => break,
                        Flow::Break => return Ok(Flow::Normal(Value::Unit)),
                    }
                }
            }
            Ok(Flow::Normal(Value::Unit))
        }
        Stmt::Break { .. } => Ok(Flow::Break),
        Stmt::Continue { .. } => Ok(Flow::Continue),
    }
}

fn eval_block(
    env: &mut HashMap<String, Value>,
    block: &Block,
) -> std::result::Result<Flow, String> {
    for stmt in &block.stmts {
        match eval_stmt(env, stmt)? {
            Flow::Normal(_) => {}
            other => return Ok(other),
        }
    }
    Ok(Flow::Normal(Value::Unit))
}

fn truthy(env: &mut HashMap<String, Value>, cond: &Expr) -> std::result::Result<bool, String> {
    match eval_expr(env, cond)? {
        Value::Bool(b) => Ok(b),
        other => Err(format!("condition must have type `bool`, but got `{other}`")),
    }
}

fn eval_expr(env: &mut HashMap<String, Value>, expr: &Expr) -> std::result::Result<Value, String> {
    match expr {
        Expr::IntLiteral { value, .. } => Ok(Value::Int(*value)),
        Expr::FloatLiteral { value, .. } => Ok(Value::Float(*value)),
        Expr::StringLiteral { value, .. } => Ok(Value::Str(value.clone())),
        Expr::BoolLiteral { value, .. } => Ok(Value::Bool(*value)),
        Expr::Grouped { inner, .. } => eval_expr(env, inner),
        Expr::Identifier { name, .. } => env
            .get(name)
            .cloned()
            .ok_or_else(|| format!("undeclared identifier `{name}`")),
        Expr::Unary { op, operand, .. } => {
            let operand = eval_expr(env, operand)?;
            match (op, operand) {
                (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
                (UnaryOp::Minus, Value::Int(v)) => Ok(Value::Int(-v)),
                (UnaryOp::Minus, Value::Float(v)) => Ok(Value::Float(-v)),
                (op, v) => Err(format!(
                    "operator `{}` is not implemented for `{v}`",
                    op.symbol()
                )),
            }
        }
        Expr::Binary {
            op: BinaryOp::Assign,
            lhs,
            rhs,
            ..
        } => {
            let Expr::Identifier { name, .. } = lhs.as_ref() else {
                return Err("left-hand side of `=` is not assignable".to_string());
            };
            if !env.contains_key(name) {
                return Err(format!("undeclared identifier `{name}`"));
            }
            let value = eval_expr(env, rhs)?;
            env.insert(name.clone(), value.clone());
            Ok(value)
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            let lhs = eval_expr(env, lhs)?;
            let rhs = eval_expr(env, rhs)?;
            eval_binary(*op, lhs, rhs)
        }
        Expr::As { value, ty, .. } => {
            let value = eval_expr(env, value)?;
            match (value, ty) {
                (Value::Int(v), TypeRef::Named { name, .. }) if name == "float" => {
                    Ok(Value::Float(v as f64))
                }
                (Value::Float(v), TypeRef::Named { name, .. }) if name == "int" => {
                    Ok(Value::Int(v as i64))
                }
                (v @ Value::Int(_), TypeRef::Named { name, .. }) if name == "int" => Ok(v),
                (v @ Value::Float(_), TypeRef::Named { name, .. }) if name == "float" => Ok(v),
                (v, ty) => Err(format!("cannot cast `{v}` to `{ty}`")),
            }
        }
        Expr::Call { .. }
        | Expr::StructInit { .. }
        | Expr::ObjectAccess { .. }
        | Expr::ModuleAccess { .. } => {
            Err("only literals, variables and operators are supported in the repl".to_string())
        }
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> std::result::Result<Value, String> {
    use Value::*;
    let value = match (op, &lhs, &rhs) {
        (BinaryOp::Add, Int(a), Int(b)) => Int(a + b),
        (BinaryOp::Sub, Int(a), Int(b)) => Int(a - b),
        (BinaryOp::Mul, Int(a), Int(b)) => Int(a * b),
        (BinaryOp::Div, Int(_), Int(0)) => return Err("division by zero".to_string()),
        (BinaryOp::Div, Int(a), Int(b)) => Int(a / b),
        (BinaryOp::Add, Float(a), Float(b)) => Float(a + b),
        (BinaryOp::Sub, Float(a), Float(b)) => Float(a - b),
        (BinaryOp::Mul, Float(a), Float(b)) => Float(a * b),
        (BinaryOp::Div, Float(a), Float(b)) => Float(a / b),
        (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinaryOp::Le, Int(a), Int(b)) => Bool(a <= b),
        (BinaryOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinaryOp::Ge, Int(a), Int(b)) => Bool(a >= b),
        (BinaryOp::Lt, Float(a), Float(b)) => Bool(a < b),
        (BinaryOp::Le, Float(a), Float(b)) => Bool(a <= b),
        (BinaryOp::Gt, Float(a), Float(b)) => Bool(a > b),
        (BinaryOp::Ge, Float(a), Float(b)) => Bool(a >= b),
        (BinaryOp::Eq, a, b) if same_kind(a, b) => Bool(a == b),
        (BinaryOp::Ne, a, b) if same_kind(a, b) => Bool(a != b),
        (op, a, b) => {
            return Err(format!(
                "operator `{}` is not implemented for `{a}` and `{b}`",
                op.symbol()
            ));
        }
    };
    Ok(value)
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}
