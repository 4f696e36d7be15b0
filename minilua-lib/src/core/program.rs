//! The program segment: a flat, append-only sequence of `i64` cells.
//!
//! Forward jumps are emitted with a placeholder operand and patched once the target is
//! known. [Placeholder] is neither `Copy` nor `Clone` and [Program::patch] consumes it, so a
//! slot can't be patched twice. Forgetting to patch one is caught by
//! [Program::unpatched_jump].

use std::fmt;

use super::OpCode;

/// operand value of a jump that hasn't been patched yet
pub const PLACEHOLDER: i64 = -1;

/// A reserved jump operand waiting for its target
#[must_use = "a placeholder has to be patched"]
#[derive(Debug, PartialEq, Eq)]
pub struct Placeholder(usize);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    cells: Vec<i64>,
}

/// one decoded instruction, `op` is None for a cell that isn't an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub raw: i64,
    pub op: Option<OpCode>,
    pub operand: Option<i64>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn get(&self, offset: usize) -> Option<i64> {
        self.cells.get(offset).copied()
    }

    /// the offset the next emitted cell will land at, used as a jump target
    pub fn here(&self) -> usize {
        self.cells.len()
    }

    pub fn emit(&mut self, op: OpCode) {
        debug_assert_eq!(op.operand_count(), 0, "{op} takes an operand");
        self.cells.push(op.cell());
    }

    pub fn emit_with(&mut self, op: OpCode, operand: i64) {
        debug_assert_eq!(op.operand_count(), 1, "{op} takes no operand");
        self.cells.push(op.cell());
        self.cells.push(operand);
    }

    /// Emits a jump whose target is not known yet
    pub fn emit_jump(&mut self, op: OpCode) -> Placeholder {
        debug_assert!(op.is_jump(), "{op} is not a jump");
        self.emit_with(op, PLACEHOLDER);
        Placeholder(self.cells.len() - 1)
    }

    pub fn patch(&mut self, slot: Placeholder, target: usize) {
        self.cells[slot.0] = target as i64;
    }

    /// patches `slot` to point at the next emitted instruction
    pub fn patch_here(&mut self, slot: Placeholder) {
        let here = self.here();
        self.patch(slot, here);
    }

    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            cells: &self.cells,
            offset: 0,
        }
    }

    /// returns the offset of the first jump that still carries the placeholder
    pub fn unpatched_jump(&self) -> Option<usize> {
        self.instructions()
            .find(|i| i.op.is_some_and(OpCode::is_jump) && i.operand == Some(PLACEHOLDER))
            .map(|i| i.offset)
    }
}

impl From<Vec<i64>> for Program {
    fn from(cells: Vec<i64>) -> Self {
        Self { cells }
    }
}

pub struct Instructions<'a> {
    cells: &'a [i64],
    offset: usize,
}

impl Iterator for Instructions<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        let raw = *self.cells.get(self.offset)?;
        let op = OpCode::decode(raw);
        let operand = match op {
            Some(op) if op.operand_count() == 1 => self.cells.get(self.offset + 1).copied(),
            _ => None,
        };
        let instr = Instruction {
            offset: self.offset,
            raw,
            op,
            operand,
        };
        self.offset += op.map_or(1, OpCode::width);
        Some(instr)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, self.operand) {
            (Some(op), Some(operand)) => write!(f, "{op} {operand}"),
            (Some(op), None) if op.operand_count() == 1 => write!(f, "{op} ?"),
            (Some(op), None) => write!(f, "{op}"),
            (None, _) => write!(f, "{}", self.raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OpCode::*;

    #[test]
    fn emit_and_decode() {
        let mut p = Program::new();
        p.emit_with(IPush, 7);
        p.emit(Top);
        p.emit(Print);
        assert_eq!(p.cells(), &[IPush.cell(), 7, Top.cell(), Print.cell()]);
        let listing: Vec<_> = p.instructions().map(|i| i.to_string()).collect();
        assert_eq!(listing, vec!["IPUSH 7", "TOP", "PRINT"]);
        let offsets: Vec<_> = p.instructions().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 2, 3]);
    }

    #[test]
    fn backpatching() {
        let mut p = Program::new();
        let skip = p.emit_jump(Jz);
        assert_eq!(p.unpatched_jump(), Some(0));
        p.emit(Nop);
        p.patch_here(skip);
        assert_eq!(p.unpatched_jump(), None);
        assert_eq!(p.get(1), Some(3));
    }

    #[test]
    fn negative_operands_of_non_jumps_are_no_placeholders() {
        let mut p = Program::new();
        p.emit_with(IPush, PLACEHOLDER);
        assert_eq!(p.unpatched_jump(), None);
    }

    #[test]
    fn garbage_cells_decode_one_at_a_time() {
        let mut p = Program::new();
        p.cells.extend([5, Jmp.cell()]);
        let instrs: Vec<_> = p.instructions().collect();
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].op, None);
        assert_eq!(instrs[1].to_string(), "JMP ?");
    }
}
