//! Compiles the AST straight into the program segment of a [Vm].
//!
//! Every expression leaves exactly one value on the stack, every statement leaves the
//! stack as it found it. Variables live in heap slots, so reading one is
//! `IPUSH addr; LFH; POP; PUSH`. Operator opcodes are chosen from the types
//! [TypeInferable] reports, which is also where type errors are caught.

use log::debug;
use thiserror::Error;

use crate::core::*;
use crate::type_inference::TypeInferable;
use crate::vm::Vm;

pub trait Compilable {
    fn compile(&self, vm: &mut Vm) -> CompilationResult;
}

pub type CompilationResult = Result<(), CompileError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("{pos}: '{op}' can't be applied to {}", operand_types(.lhs, .rhs))]
    TypeMismatch {
        pos: Position,
        op: String,
        lhs: VarType,
        rhs: Option<VarType>,
    },

    #[error("{pos}: {name} is a {ty}, not a function")]
    NotCallable {
        pos: Position,
        name: String,
        ty: VarType,
    },

    #[error("{pos}: can't assign to {target}")]
    InvalidAssignmentTarget { pos: Position, target: String },

    #[error("{pos}: {construct} is not supported")]
    Unsupported {
        pos: Position,
        construct: &'static str,
    },

    #[error("A compiler bug was detected: the jump at {at} was never patched")]
    UnpatchedJump { at: usize },
}

fn operand_types(lhs: &VarType, rhs: &Option<VarType>) -> String {
    match rhs {
        Some(rhs) => format!("{lhs} and {rhs}"),
        None => lhs.to_string(),
    }
}

macro_rules! compilation_error {
    ($($err:tt)+) => {
        return Err(CompileError::$($err)*)
    };
}

macro_rules! impl_compilable {
    ($t:ty: $self:ident, $vm:ident => $code:tt) => {
        impl Compilable for $t {
            fn compile(&$self, $vm: &mut Vm) -> CompilationResult {
                $code
            }
        }
    };
}

/// Compiles a whole chunk into `vm`. On failure `vm` holds a partial program and must
/// not be run.
pub fn compile_chunk(chunk: &Block, vm: &mut Vm) -> CompilationResult {
    let start = vm.program.here();
    chunk.compile(vm)?;
    if let Some(at) = vm.program.unpatched_jump() {
        compilation_error!(UnpatchedJump { at });
    }
    debug!(
        "compiled {} cells, {} symbols",
        vm.program.here() - start,
        vm.symbols.len()
    );
    Ok(())
}

impl_compilable! { Block: self, vm => {
    for stmt in &self.statements {
        stmt.compile(vm)?;
    }
    Ok(())
}}

impl_compilable! { Statement: self, vm => {
    use OpCode::*;
    match self {
        Statement::Do(body) => body.compile(vm)?,
        Statement::While { cond, body } => {
            let top = vm.program.here();
            cond.compile(vm)?;
            let exit = branch_on_top(vm, Jz);
            body.compile(vm)?;
            vm.program.emit_with(Jmp, top as i64);
            vm.program.patch_here(exit);
        }
        Statement::Repeat { body, cond } => {
            let top = vm.program.here();
            body.compile(vm)?;
            cond.compile(vm)?;
            let exit = branch_on_top(vm, Jnz);
            vm.program.emit_with(Jmp, top as i64);
            vm.program.patch_here(exit);
        }
        Statement::For { init, end, step, body } => compile_for(vm, init, end, step.as_ref(), body)?,
        Statement::If { conds, branches, else_branch } => {
            let mut exits = vec![];
            for (cond, branch) in conds.iter().zip(branches) {
                cond.compile(vm)?;
                let next = branch_on_top(vm, Jz);
                branch.compile(vm)?;
                exits.push(vm.program.emit_jump(Jmp));
                vm.program.patch_here(next);
            }
            if let Some(branch) = else_branch {
                branch.compile(vm)?;
            }
            for exit in exits {
                vm.program.patch_here(exit);
            }
        }
        Statement::Assignment(a) => a.compile(vm)?,
        Statement::Expression(e) => {
            e.compile(vm)?;
            vm.program.emit(Pop);
        }
        Statement::Null => {}
    }
    Ok(())
}}

impl_compilable! { Assignment: self, vm => {
    use OpCode::*;
    let id = assignment_target(self, &mut vm.symbols)?;
    let addr = vm.symbols[id].addr as i64;
    self.target.compile(vm)?;
    vm.program.emit(Pop);
    vm.program.emit_with(IMov, addr);
    vm.program.emit(Push);
    self.value.compile(vm)?;
    let ty = self.value.infer_type(&mut vm.symbols);
    vm.symbols[id].ty = ty;
    vm.program.emit(Top);
    vm.program.emit(Pop);
    vm.program.emit(Sth);
    vm.program.emit(Pop);
    Ok(())
}}

impl_compilable! { Expr: self, vm => {
    use OpCode::*;
    match self {
        Expr::Ident { name, .. } => {
            let id = vm.symbols.resolve(name);
            let addr = vm.symbols[id].addr;
            load_slot(vm, addr);
        }
        Expr::Number { value, .. } => vm.program.emit_with(IPush, *value),
        Expr::True(_) => vm.program.emit_with(IPush, 1),
        Expr::False(_) => vm.program.emit_with(IPush, 0),
        Expr::Nil(_) => vm.program.emit(NPush),
        Expr::Str { value, .. } => {
            let idx = vm.intern_literal(value);
            vm.program.emit_with(SPush, idx as i64);
        }
        Expr::Paren { inner, .. } => inner.compile(vm)?,
        Expr::Call { callee, arg, pos } => {
            let ty = callee.infer_type(&mut vm.symbols);
            if ty != VarType::Function {
                compilation_error!(NotCallable { pos: *pos, name: callee.to_string(), ty });
            }
            arg.compile(vm)?;
            callee.compile(vm)?;
            vm.program.emit(Calls);
            vm.program.emit(Pop);
            vm.program.emit_with(IPush, 0);
        }
        Expr::Index { pos, .. } => {
            compilation_error!(Unsupported { pos: *pos, construct: "indexing" });
        }
        Expr::Unary { op, operand, pos } => {
            let ty = operand.infer_type(&mut vm.symbols);
            let accepted = match op {
                UnaryOp::Length => ty == VarType::String,
                UnaryOp::Neg | UnaryOp::Not => ty.is_numeric(),
            };
            if !accepted {
                compilation_error!(TypeMismatch { pos: *pos, op: op.to_string(), lhs: ty, rhs: None });
            }
            operand.compile(vm)?;
            vm.program.emit(Top);
            vm.program.emit(Pop);
            match op {
                UnaryOp::Length => {
                    vm.program.emit(StrLen);
                    vm.program.emit(Push);
                }
                UnaryOp::Neg => vm.program.emit(Neg),
                UnaryOp::Not => vm.program.emit(Not),
            }
        }
        Expr::Binary { op, lhs, rhs, pos } => {
            let lt = lhs.infer_type(&mut vm.symbols);
            let rt = rhs.infer_type(&mut vm.symbols);
            let mismatch = CompileError::TypeMismatch { pos: *pos, op: op.to_string(), lhs: lt, rhs: Some(rt) };
            match op {
                BinaryOp::Concat => {
                    if !(stringable(lt) && stringable(rt)) {
                        return Err(mismatch);
                    }
                    lhs.compile(vm)?;
                    format_as_string(vm, lt);
                    rhs.compile(vm)?;
                    format_as_string(vm, rt);
                    concat_top_two(vm);
                }
                // appending a number to a string
                BinaryOp::Add if lt == VarType::String && rt == VarType::Int => {
                    lhs.compile(vm)?;
                    rhs.compile(vm)?;
                    format_as_string(vm, rt);
                    concat_top_two(vm);
                }
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
                | BinaryOp::Pow if !(lt.is_numeric() && rt.is_numeric()) => return Err(mismatch),
                _ => {
                    lhs.compile(vm)?;
                    rhs.compile(vm)?;
                    vm.program.emit(Top);
                    vm.program.emit(Pop);
                    vm.program.emit(binary_opcode(*op));
                }
            }
        }
    }
    Ok(())
}}

/// `for v = init, end[, step] do body end`, leaving the loop when `v` equals `end`
fn compile_for(
    vm: &mut Vm,
    init: &Assignment,
    end: &Expr,
    step: Option<&Expr>,
    body: &Block,
) -> CompilationResult {
    use OpCode::*;
    init.compile(vm)?;
    let id = assignment_target(init, &mut vm.symbols)?;
    let addr = vm.symbols[id].addr;
    for bound in [Some(end), step].into_iter().flatten() {
        let ty = bound.infer_type(&mut vm.symbols);
        if !ty.is_numeric() {
            compilation_error!(TypeMismatch { pos: bound.pos(), op: "for".into(), lhs: ty, rhs: None });
        }
    }
    end.compile(vm)?;
    match step {
        Some(step) => step.compile(vm)?,
        None => vm.program.emit_with(IPush, 1),
    }

    // stack: end, step
    let top = vm.program.here();
    load_slot(vm, addr);
    vm.program.emit_with(IPush, -3);
    vm.program.emit(Lfs);
    vm.program.emit(Pop);
    vm.program.emit(Neq);
    let exit = branch_on_top(vm, Jz);
    body.compile(vm)?;

    load_slot(vm, addr);
    vm.program.emit_with(IPush, -2);
    vm.program.emit(Lfs);
    vm.program.emit(Pop);
    vm.program.emit(Add);
    vm.program.emit(Top);
    vm.program.emit(Pop);
    vm.program.emit_with(IPush, addr as i64);
    vm.program.emit(Sth);
    vm.program.emit(Pop);
    vm.program.emit_with(Jmp, top as i64);

    vm.program.patch_here(exit);
    vm.program.emit(Pop);
    vm.program.emit(Pop);
    Ok(())
}

fn assignment_target(a: &Assignment, symbols: &mut SymbolTable) -> Result<SymbolId, CompileError> {
    match a.target.symbol_name() {
        Some(name) => Ok(symbols.resolve(name)),
        None => compilation_error!(InvalidAssignmentTarget {
            pos: a.target.pos(),
            target: a.target.to_string()
        }),
    }
}

/// pushes the value of heap slot `addr`
fn load_slot(vm: &mut Vm, addr: usize) {
    vm.program.emit_with(OpCode::IPush, addr as i64);
    vm.program.emit(OpCode::Lfh);
    vm.program.emit(OpCode::Pop);
    vm.program.emit(OpCode::Push);
}

/// pops the top of the stack into AX and emits a conditional jump on it
fn branch_on_top(vm: &mut Vm, jump: OpCode) -> Placeholder {
    vm.program.emit(OpCode::Top);
    vm.program.emit(OpCode::Pop);
    vm.program.emit_jump(jump)
}

fn stringable(ty: VarType) -> bool {
    matches!(ty, VarType::Nil | VarType::Int | VarType::String)
}

/// replaces the top of the stack, of type `ty`, by its string form
fn format_as_string(vm: &mut Vm, ty: VarType) {
    use OpCode::*;
    match ty {
        VarType::Nil => {
            vm.program.emit(Pop);
            vm.program.emit_with(SPush, 0);
        }
        VarType::Int => {
            vm.program.emit(Top);
            vm.program.emit(Pop);
            vm.program.emit(StrFmt);
            vm.program.emit(Push);
        }
        _ => {}
    }
}

/// replaces the two topmost strings by their concatenation
fn concat_top_two(vm: &mut Vm) {
    use OpCode::*;
    vm.program.emit_with(IPush, -2);
    vm.program.emit(Lfs);
    vm.program.emit(Pop);
    vm.program.emit(StrCon);
    vm.program.emit(Pop);
    vm.program.emit(Push);
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Or => OpCode::Or,
        BinaryOp::And => OpCode::And,
        BinaryOp::Eq => OpCode::Eq,
        BinaryOp::Neq => OpCode::Neq,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Le => OpCode::Le,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Ge => OpCode::Ge,
        BinaryOp::Concat => OpCode::StrCon,
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Pow => OpCode::Pow,
    }
}
