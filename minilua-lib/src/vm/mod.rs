//! The stack machine that executes a [Program].
//!
//! A [Vm] is created empty apart from the built-in functions, filled by the
//! [compiler](crate::compiler) and then run. Running always starts from the state
//! [Vm::reset] produces, so the same program can run any number of times.

use log::debug;
use std::cmp::Ordering;
use std::io::Write;
use thiserror::Error;

use crate::core::*;

pub mod debug;

mod heap;
pub use heap::*;

mod memory;
pub use memory::*;

mod stack;
pub use stack::*;

mod value;
pub use value::*;

/// Everything that can go wrong while executing a single instruction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack offset {offset} is out of range for a stack of size {size}")]
    StackIndex { offset: i64, size: usize },

    #[error("invalid heap slot {0}")]
    HeapSlot(i64),

    #[error("string pool has no entry {0}")]
    StringIndex(i64),

    #[error("substring of length {len} at {start} is out of range for a string of length {size}")]
    Substring { start: i64, len: i64, size: usize },

    #[error("{0} is not a character code")]
    InvalidChar(i64),

    #[error("division by zero")]
    DivisionByZero,

    #[error("TypeError, expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: Value },

    #[error("unknown opcode {0}")]
    UnknownOpcode(i64),

    #[error("program counter {0} is out of range")]
    PcOutOfRange(usize),

    #[error("invalid jump target {0}")]
    JumpTarget(i64),

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("failed to write output: {0}")]
    Output(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Runtime error at pc {pc}: {kind}")]
pub struct RuntimeError {
    pub pc: usize,
    pub kind: Fault,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

macro_rules! bail {
    ($($err:tt)*) => {
        return Err(Fault::$($err)*)
    };
}

/// returned by [Vm::step]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// the program counter left the program, execution is over
    Halted,
}

/// what an instruction does to the program counter
enum Flow {
    Next,
    Jump(usize),
}

#[derive(Debug, Clone)]
struct BuiltIn {
    slot: usize,
    entry: usize,
}

#[derive(Debug, Clone)]
pub struct Vm {
    pub(crate) program: Program,
    pub(crate) symbols: SymbolTable,
    mem: Memory,
    pc: usize,
    /// first instruction after the built-ins
    entry: usize,
    /// number of string pool entries that exist before the program runs
    literals: usize,
    builtins: Vec<BuiltIn>,
    step_limit: Option<u64>,
    steps: u64,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        let mut vm = Vm {
            program: Program::new(),
            symbols: SymbolTable::new(),
            mem: Memory::default(),
            pc: 0,
            entry: 0,
            literals: 0,
            builtins: vec![],
            step_limit: None,
            steps: 0,
        };
        vm.intern_literal("nil");
        vm.install_print();
        vm.entry = vm.program.here();
        vm.reset();
        vm
    }

    /// `print(x)`: reads its argument from below the return address and the callee
    fn install_print(&mut self) {
        use OpCode::*;
        let entry = self.program.here();
        let id = self.symbols.declare("print", VarType::Function, GLOBAL_LEVEL);
        self.program.emit(Push);
        self.program.emit_with(IPush, -3);
        self.program.emit(Lfs);
        self.program.emit(Print);
        self.program.emit(Pop);
        self.program.emit(Top);
        self.program.emit(Pop);
        self.program.emit(Ret);
        self.builtins.push(BuiltIn {
            slot: self.symbols[id].addr,
            entry,
        });
    }

    /// Adds a string literal to the pool and returns its index
    pub(crate) fn intern_literal(&mut self, literal: &str) -> usize {
        self.mem.strings.truncate(self.literals);
        self.mem.strings.push(literal.to_string());
        self.literals = self.mem.strings.len();
        self.literals - 1
    }

    /// Puts the VM into its initial state: PC at the first user instruction, stack empty,
    /// heap holding only the built-ins, no run-time strings, AX nil.
    pub fn reset(&mut self) {
        self.pc = self.entry;
        self.steps = 0;
        self.mem.ax = Value::Nil;
        self.mem.stack.clear();
        self.mem.strings.truncate(self.literals);
        self.mem.heap.clear();
        for b in &self.builtins {
            self.mem.heap.set(b.slot, Value::Func(b.entry));
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn entry_point(&self) -> usize {
        self.entry
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Bounds the number of instructions a run may execute, `None` removes the bound
    pub fn set_step_limit(&mut self, limit: Option<u64>) {
        self.step_limit = limit;
    }

    pub fn is_halted(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Runs until the program counter leaves the program
    pub fn run(&mut self, out: &mut dyn Write) -> Result<()> {
        debug!("running from pc {}", self.pc);
        while self.step(out)? == StepOutcome::Continue {}
        debug!("halted after {} steps", self.steps);
        Ok(())
    }

    /// Executes a single instruction
    pub fn step(&mut self, out: &mut dyn Write) -> Result<StepOutcome> {
        if self.is_halted() {
            return Ok(StepOutcome::Halted);
        }
        let pc = self.pc;
        if let Some(limit) = self.step_limit {
            if self.steps >= limit {
                return Err(RuntimeError {
                    pc,
                    kind: Fault::StepLimit(limit),
                });
            }
        }
        self.steps += 1;
        self.exec(out).map_err(|kind| RuntimeError { pc, kind })?;
        Ok(if self.is_halted() {
            StepOutcome::Halted
        } else {
            StepOutcome::Continue
        })
    }

    fn exec(&mut self, out: &mut dyn Write) -> std::result::Result<(), Fault> {
        use Flow::*;
        use OpCode::*;

        let raw = self
            .program
            .get(self.pc)
            .ok_or(Fault::PcOutOfRange(self.pc))?;
        let op = OpCode::decode(raw).ok_or(Fault::UnknownOpcode(raw))?;
        let imm = match op.operand_count() {
            0 => 0,
            _ => self
                .program
                .get(self.pc + 1)
                .ok_or(Fault::PcOutOfRange(self.pc + 1))?,
        };
        let next = self.pc + op.width();
        let mem = &mut self.mem;

        let flow = match op {
            Nop => Next,
            IMov => {
                mem.ax = Value::Int(imm);
                Next
            }
            Push => {
                mem.push(mem.ax);
                Next
            }
            IPush => {
                mem.push(Value::Int(imm));
                Next
            }
            SPush => {
                let idx = usize::try_from(imm)
                    .ok()
                    .filter(|idx| *idx < mem.strings.len())
                    .ok_or(Fault::StringIndex(imm))?;
                mem.push(Value::Str(idx));
                Next
            }
            NPush => {
                mem.push(Value::Nil);
                Next
            }
            Top => {
                mem.ax = mem.stack.top()?;
                Next
            }
            Pop => {
                mem.pop()?;
                Next
            }
            Lfs => {
                let idx = mem.stack_slot()?;
                mem.ax = mem.stack[idx];
                Next
            }
            Sts => {
                let idx = mem.stack_slot()?;
                mem.stack[idx] = mem.ax;
                Next
            }
            Lfh => {
                let slot = mem.heap_slot()?;
                mem.ax = mem.heap.get(slot);
                Next
            }
            Sth => {
                let slot = mem.heap_slot()?;
                mem.heap.set(slot, mem.ax);
                Next
            }
            Jmp => Jump(jump_target(imm)?),
            Jz if mem.ax.truthy() => Next,
            Jz => Jump(jump_target(imm)?),
            Jnz if mem.ax.truthy() => Jump(jump_target(imm)?),
            Jnz => Next,
            Call => {
                let target = jump_target(imm)?;
                mem.push(Value::Int(next as i64));
                Jump(target)
            }
            Calls => {
                let callee = mem.pop()?;
                let Value::Func(addr) = callee else {
                    bail!(TypeMismatch {
                        expected: "function",
                        found: callee
                    });
                };
                mem.push(Value::Int(next as i64));
                Jump(addr)
            }
            Ret => Jump(mem.pop()?.to_address()?),
            Add => {
                mem.arithmetic(|a, b| Ok(a.wrapping_add(b)))?;
                Next
            }
            Sub => {
                mem.arithmetic(|a, b| Ok(a.wrapping_sub(b)))?;
                Next
            }
            Mul => {
                mem.arithmetic(|a, b| Ok(a.wrapping_mul(b)))?;
                Next
            }
            Div => {
                mem.arithmetic(|a, b| match b {
                    0 => Err(Fault::DivisionByZero),
                    b => Ok(a.wrapping_div(b)),
                })?;
                Next
            }
            Mod => {
                mem.arithmetic(|a, b| match b {
                    0 => Err(Fault::DivisionByZero),
                    b => Ok(a.wrapping_rem(b)),
                })?;
                Next
            }
            Pow => {
                mem.arithmetic(|a, b| Ok(pow(a, b)))?;
                Next
            }
            Neg => {
                let v = mem.ax.to_int()?;
                mem.push(Value::Int(v.wrapping_neg()));
                Next
            }
            And => {
                mem.combine(|_, l, r| Ok((l.truthy() && r.truthy()).into()))?;
                Next
            }
            Or => {
                mem.combine(|_, l, r| Ok((l.truthy() || r.truthy()).into()))?;
                Next
            }
            Not => {
                mem.push((!mem.ax.truthy()).into());
                Next
            }
            Eq => {
                mem.combine(|m, l, r| Ok(m.equal(l, r)?.into()))?;
                Next
            }
            Neq => {
                mem.combine(|m, l, r| Ok((!m.equal(l, r)?).into()))?;
                Next
            }
            Lt => {
                mem.combine(|m, l, r| Ok((m.compare(l, r)? == Ordering::Less).into()))?;
                Next
            }
            Le => {
                mem.combine(|m, l, r| Ok((m.compare(l, r)? != Ordering::Greater).into()))?;
                Next
            }
            Gt => {
                mem.combine(|m, l, r| Ok((m.compare(l, r)? == Ordering::Greater).into()))?;
                Next
            }
            Ge => {
                mem.combine(|m, l, r| Ok((m.compare(l, r)? != Ordering::Less).into()))?;
                Next
            }
            StrSub => {
                let len = mem.pop()?.to_int()?;
                let start = mem.pop()?.to_int()?;
                let chars: Vec<char> = mem.string(mem.ax)?.chars().collect();
                let range = usize::try_from(start)
                    .ok()
                    .zip(usize::try_from(len).ok())
                    .and_then(|(s, l)| Some(s..s.checked_add(l)?))
                    .filter(|r| r.end <= chars.len())
                    .ok_or(Fault::Substring {
                        start,
                        len,
                        size: chars.len(),
                    })?;
                mem.ax = mem.alloc_string(chars[range].iter().collect());
                Next
            }
            StrCon => {
                let rhs = mem.pop()?;
                let joined = format!("{}{}", mem.string(mem.ax)?, mem.string(rhs)?);
                mem.ax = mem.alloc_string(joined);
                Next
            }
            StrLen => {
                mem.ax = Value::Int(mem.string(mem.ax)?.chars().count() as i64);
                Next
            }
            StrCpy => {
                let copy = mem.string(mem.ax)?.to_string();
                mem.ax = mem.alloc_string(copy);
                Next
            }
            StrAdd => {
                let code = mem.pop()?.to_int()?;
                let c = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(Fault::InvalidChar(code))?;
                let appended = format!("{}{c}", mem.string(mem.ax)?);
                mem.ax = mem.alloc_string(appended);
                Next
            }
            StrCmp => {
                let lhs = mem.pop()?;
                mem.ax = Value::Int(strcmp(mem.string(lhs)?, mem.string(mem.ax)?));
                Next
            }
            StrFmt => {
                let text = mem.ax.to_int()?.to_string();
                mem.ax = mem.alloc_string(text);
                Next
            }
            Print => {
                let text = mem.display(mem.ax)?;
                writeln!(out, "{text}").map_err(|e| Fault::Output(e.to_string()))?;
                Next
            }
        };

        self.pc = match flow {
            Next => next,
            Jump(target) => target,
        };
        Ok(())
    }
}

fn jump_target(operand: i64) -> std::result::Result<usize, Fault> {
    usize::try_from(operand).map_err(|_| Fault::JumpTarget(operand))
}

#[cfg(test)]
mod tests {
    use super::*;
    use OpCode::*;

    /// runs whatever was emitted into `vm` and returns the output
    fn run(vm: &mut Vm) -> Result<String> {
        let mut out = vec![];
        vm.reset();
        vm.run(&mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    /// emits `lhs; rhs; TOP; POP; op; TOP; PRINT`
    fn binary(lhs: i64, rhs: i64, op: OpCode) -> Vm {
        let mut vm = Vm::new();
        let p = &mut vm.program;
        p.emit_with(IPush, lhs);
        p.emit_with(IPush, rhs);
        p.emit(Top);
        p.emit(Pop);
        p.emit(op);
        p.emit(Top);
        p.emit(Print);
        vm
    }

    #[test]
    fn a_fresh_vm_only_knows_print() {
        let vm = Vm::new();
        assert_eq!(vm.symbols().len(), 1);
        let print = vm.symbols().iter().next().unwrap();
        assert_eq!(print.name, "print");
        assert_eq!(print.ty, VarType::Function);
        assert_eq!(vm.memory().heap.get(print.addr), Value::Func(0));
        assert_eq!(vm.memory().strings, vec!["nil".to_string()]);
        assert_eq!(vm.pc(), vm.entry_point());
        assert!(vm.is_halted());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run(&mut binary(7, 5, Sub)).unwrap(), "2\n");
        assert_eq!(run(&mut binary(7, 2, Div)).unwrap(), "3\n");
        assert_eq!(run(&mut binary(-7, 2, Mod)).unwrap(), "-1\n");
        assert_eq!(run(&mut binary(2, 10, Pow)).unwrap(), "1024\n");
        assert_eq!(run(&mut binary(i64::MAX, 1, Add)).unwrap(), format!("{}\n", i64::MIN));
        assert_eq!(run(&mut binary(3, 4, Lt)).unwrap(), "1\n");
        assert_eq!(run(&mut binary(4, 4, Ge)).unwrap(), "1\n");
        assert_eq!(run(&mut binary(0, 4, And)).unwrap(), "0\n");
        assert_eq!(run(&mut binary(0, 4, Or)).unwrap(), "1\n");
    }

    #[test]
    fn division_by_zero_reports_the_pc() {
        let mut vm = binary(1, 0, Div);
        let div_at = vm.entry_point() + 6;
        assert_eq!(
            run(&mut vm),
            Err(RuntimeError {
                pc: div_at,
                kind: Fault::DivisionByZero
            })
        );
    }

    #[test]
    fn stack_underflow() {
        let mut vm = Vm::new();
        vm.program.emit(Pop);
        assert_eq!(run(&mut vm).unwrap_err().kind, Fault::StackUnderflow);
    }

    #[test]
    fn jumping_into_an_operand_hits_an_unknown_opcode() {
        let mut vm = Vm::new();
        let entry = vm.entry_point();
        vm.program.emit_with(IPush, 5);
        vm.program.emit_with(Jmp, entry as i64 + 1);
        assert_eq!(run(&mut vm).unwrap_err().kind, Fault::UnknownOpcode(5));
    }

    #[test]
    fn step_limit_stops_endless_loops() {
        let mut vm = Vm::new();
        let entry = vm.entry_point();
        vm.program.emit_with(Jmp, entry as i64);
        vm.set_step_limit(Some(10));
        assert_eq!(run(&mut vm).unwrap_err().kind, Fault::StepLimit(10));
        assert_eq!(vm.steps(), 10);
    }

    #[test]
    fn conditional_jumps() {
        let mut vm = Vm::new();
        let p = &mut vm.program;
        p.emit_with(IMov, 0);
        let skip = p.emit_jump(Jz);
        p.emit_with(IMov, 1);
        p.emit(Print);
        p.patch_here(skip);
        p.emit_with(IMov, 2);
        p.emit(Print);
        assert_eq!(run(&mut vm).unwrap(), "2\n");
    }

    #[test]
    fn call_and_ret() {
        let mut vm = Vm::new();
        let p = &mut vm.program;
        let call = p.emit_jump(Call);
        p.emit_with(IMov, 2);
        p.emit(Print);
        let over = p.emit_jump(Jmp);
        p.patch_here(call);
        p.emit_with(IMov, 1);
        p.emit(Print);
        p.emit(Ret);
        p.patch_here(over);
        assert_eq!(run(&mut vm).unwrap(), "1\n2\n");
        assert!(vm.memory().stack.is_empty());
    }

    #[test]
    fn calling_print_through_the_heap() {
        let mut vm = Vm::new();
        let p = &mut vm.program;
        p.emit_with(IPush, 42);
        p.emit_with(IPush, 0);
        p.emit(Lfh);
        p.emit(Pop);
        p.emit(Push);
        p.emit(Calls);
        p.emit(Pop);
        assert_eq!(run(&mut vm).unwrap(), "42\n");
        assert!(vm.memory().stack.is_empty());
    }

    #[test]
    fn calling_a_non_function_fails() {
        let mut vm = Vm::new();
        vm.program.emit_with(IPush, 3);
        vm.program.emit(Calls);
        assert!(matches!(
            run(&mut vm).unwrap_err().kind,
            Fault::TypeMismatch {
                expected: "function",
                ..
            }
        ));
    }

    #[test]
    fn string_ops_never_mutate_the_pool() {
        let mut vm = Vm::new();
        let hello = vm.intern_literal("Hello") as i64;
        let world = vm.intern_literal(" World") as i64;
        let p = &mut vm.program;
        p.emit_with(SPush, world);
        p.emit_with(SPush, hello);
        p.emit(Top);
        p.emit(Pop);
        p.emit(StrCon);
        p.emit(Print);
        p.emit_with(IPush, 33);
        p.emit(StrAdd);
        p.emit(Print);
        p.emit_with(IPush, 1);
        p.emit_with(IPush, 4);
        p.emit(StrSub);
        p.emit(Print);
        p.emit(StrLen);
        p.emit(Print);
        assert_eq!(run(&mut vm).unwrap(), "Hello World\nHello World!\nello\n4\n");
        let strings = &vm.memory().strings;
        assert_eq!(strings[1], "Hello");
        assert_eq!(strings[2], " World");
        assert_eq!(strings.len(), 6);
    }

    #[test]
    fn substring_out_of_range() {
        let mut vm = Vm::new();
        let abc = vm.intern_literal("abc") as i64;
        let p = &mut vm.program;
        p.emit_with(SPush, abc);
        p.emit(Top);
        p.emit(Pop);
        p.emit_with(IPush, 2);
        p.emit_with(IPush, 5);
        p.emit(StrSub);
        assert_eq!(
            run(&mut vm).unwrap_err().kind,
            Fault::Substring {
                start: 2,
                len: 5,
                size: 3
            }
        );
    }

    #[test]
    fn strcmp_and_equality_use_contents() {
        let mut vm = Vm::new();
        let a = vm.intern_literal("ab") as i64;
        let b = vm.intern_literal("ab") as i64;
        let p = &mut vm.program;
        p.emit_with(SPush, a);
        p.emit_with(SPush, b);
        p.emit(Top);
        p.emit(Pop);
        p.emit(Eq);
        p.emit(Top);
        p.emit(Print);
        p.emit(Pop);
        p.emit_with(SPush, a);
        p.emit_with(SPush, b);
        p.emit(Top);
        p.emit(Pop);
        p.emit(StrCmp);
        p.emit(Print);
        assert_eq!(run(&mut vm).unwrap(), "1\n0\n");
    }

    #[test]
    fn runs_are_repeatable() {
        let mut vm = Vm::new();
        let s = vm.intern_literal("x") as i64;
        let p = &mut vm.program;
        p.emit_with(SPush, s);
        p.emit(Top);
        p.emit(StrCpy);
        p.emit(Print);
        p.emit_with(IPush, 7);
        p.emit(Sth);
        let first = run(&mut vm).unwrap();
        assert_eq!(vm.memory().strings.len(), 3);
        assert_eq!(run(&mut vm).unwrap(), first);
        assert_eq!(vm.memory().strings.len(), 3);
    }

    #[test]
    fn string_index_out_of_range() {
        let mut vm = Vm::new();
        vm.program.emit_with(SPush, -4);
        assert_eq!(run(&mut vm).unwrap_err().kind, Fault::StringIndex(-4));
        assert!(Fault::StringIndex(-4).to_string().ends_with("-4"));
    }

    #[test]
    fn truncated_operand() {
        let mut vm = Vm::new();
        vm.program.emit_with(IPush, 1);
        vm.program.emit(Pop);
        // cut the program in the middle of an instruction
        let mut cells = vm.program.cells().to_vec();
        cells.pop();
        cells.push(IMov.cell());
        vm.program = Program::from(cells);
        assert!(matches!(
            run(&mut vm).unwrap_err().kind,
            Fault::PcOutOfRange(_)
        ));
    }
}
