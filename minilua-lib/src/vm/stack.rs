use derive_more::{Deref, DerefMut};

use super::{Fault, Value};

/// type that is used at runtime to represent the stack
#[derive(Debug, Clone, Default, Deref, DerefMut)]
pub struct Stack(Vec<Value>);

impl Stack {
    pub fn pop_value(&mut self) -> Result<Value, Fault> {
        self.0.pop().ok_or(Fault::StackUnderflow)
    }

    pub fn top(&self) -> Result<Value, Fault> {
        self.0.last().copied().ok_or(Fault::StackUnderflow)
    }

    pub fn top_mut(&mut self) -> Result<&mut Value, Fault> {
        self.0.last_mut().ok_or(Fault::StackUnderflow)
    }

    /// Resolves an offset relative to the topmost entry, 0 being the top itself
    pub fn relative(&self, offset: i64) -> Result<usize, Fault> {
        let size = self.0.len();
        (size as i64 - 1)
            .checked_add(offset)
            .filter(|idx| (0..size as i64).contains(idx))
            .map(|idx| idx as usize)
            .ok_or(Fault::StackIndex { offset, size })
    }
}
