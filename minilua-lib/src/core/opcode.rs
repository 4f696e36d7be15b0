//! Defines the instruction set. The OpCode derive-macro generates the decoding and
//! sizing helpers, see [proc_macros::OpCode].
//!
//! Conventions used in the docs below: AX is the accumulator, `top` the topmost stack
//! value. Binary operators combine `top` (left) with AX (right) and overwrite `top` with the
//! result. The string opcodes never modify a string in place, they put a new string into
//! the pool and leave a reference to it in AX.

use proc_macros::OpCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, OpCode, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(i64)]
pub enum OpCode {
    Nop = 90,
    /// AX = operand
    #[operand]
    IMov = 128,
    /// push AX
    Push,
    /// push the operand as an integer
    #[operand]
    IPush,
    /// push a reference to string pool entry `operand`
    #[operand]
    SPush,
    /// push nil
    NPush,
    /// AX = top
    Top,
    Pop,
    /// load from stack: AX = stack[len - 1 + top]
    Lfs,
    /// store to stack: stack[len - 1 + top] = AX
    Sts,
    /// load from heap: AX = heap[top]
    Lfh,
    /// store to heap: heap[top] = AX
    Sth,
    #[operand]
    Jmp,
    /// jump if AX is falsy
    #[operand]
    Jz,
    /// jump if AX is truthy
    #[operand]
    Jnz,
    /// push the return address, then jump to the operand
    #[operand]
    Call,
    /// pop a function, push the return address, jump to the function
    Calls,
    /// pop the return address and jump there
    Ret,
    Add,
    Sub,
    /// push -AX
    Neg,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    /// push `not AX`
    Not,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    /// pops a length, then a start index; AX = AX[start..start + length]
    StrSub,
    /// AX = AX .. pop
    StrCon,
    /// AX = #AX
    StrLen,
    /// AX = a copy of AX
    StrCpy,
    /// pops a character code and appends it to AX
    StrAdd,
    /// AX = strcmp(pop, AX)
    StrCmp,
    /// AX = AX formatted as a decimal string
    StrFmt,
    /// writes AX and a newline to the output
    Print,
}

impl OpCode {
    /// the opcodes whose operand is a program offset
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::Jz | Self::Jnz | Self::Call)
    }
}
