use std::cmp::Ordering;

use super::{Fault, Heap, Stack, Value, MAX_HEAP_SLOTS};

/// Represents the relevant memory areas of the VM: the stack, the heap, the string pool
/// and the accumulator AX.
///
/// The string pool only ever grows. Entry 0 is `"nil"`, followed by the literals the
/// compiler interned, followed by whatever the string opcodes produced at run time.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    pub stack: Stack,
    pub heap: Heap<Value>,
    pub strings: Vec<String>,
    pub ax: Value,
}

impl Memory {
    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Result<Value, Fault> {
        self.stack.pop_value()
    }

    pub fn string(&self, v: Value) -> Result<&str, Fault> {
        let idx = v.to_str_idx()?;
        self.strings
            .get(idx)
            .map(String::as_str)
            .ok_or(Fault::StringIndex(idx as i64))
    }

    /// appends `s` to the pool and returns a reference to it
    pub fn alloc_string(&mut self, s: String) -> Value {
        self.strings.push(s);
        Value::Str(self.strings.len() - 1)
    }

    /// the heap slot named by the top of the stack
    pub fn heap_slot(&self) -> Result<usize, Fault> {
        let raw = self.stack.top()?.to_int()?;
        usize::try_from(raw)
            .ok()
            .filter(|slot| *slot < MAX_HEAP_SLOTS)
            .ok_or(Fault::HeapSlot(raw))
    }

    /// the stack index named by the top of the stack, relative to the top
    pub fn stack_slot(&self) -> Result<usize, Fault> {
        let offset = self.stack.top()?.to_int()?;
        self.stack.relative(offset)
    }

    /// Replaces the top of the stack with `f(top, AX)`
    pub fn combine<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnOnce(&Self, Value, Value) -> Result<Value, Fault>,
    {
        let lhs = self.stack.top()?;
        let res = f(self, lhs, self.ax)?;
        *self.stack.top_mut()? = res;
        Ok(())
    }

    pub fn arithmetic<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnOnce(i64, i64) -> Result<i64, Fault>,
    {
        self.combine(|_, lhs, rhs| Ok(Value::Int(f(lhs.to_int()?, rhs.to_int()?)?)))
    }

    /// Strings compare by content, nil and integers numerically, functions by address.
    /// Anything else is unequal.
    pub fn equal(&self, lhs: Value, rhs: Value) -> Result<bool, Fault> {
        Ok(match (lhs, rhs) {
            (Value::Str(_), Value::Str(_)) => self.string(lhs)? == self.string(rhs)?,
            (Value::Func(a), Value::Func(b)) => a == b,
            (l, r) if l.is_numeric() && r.is_numeric() => l.to_int()? == r.to_int()?,
            _ => false,
        })
    }

    pub fn compare(&self, lhs: Value, rhs: Value) -> Result<Ordering, Fault> {
        match (lhs, rhs) {
            (Value::Str(_), Value::Str(_)) => {
                Ok(strcmp(self.string(lhs)?, self.string(rhs)?).cmp(&0))
            }
            (l, r) => Ok(l.to_int()?.cmp(&r.to_int()?)),
        }
    }

    /// what PRINT writes for `v`
    pub fn display(&self, v: Value) -> Result<String, Fault> {
        Ok(match v {
            Value::Str(_) => self.string(v)?.to_string(),
            other => other.to_string(),
        })
    }
}

/// C-style comparison: the difference of the first differing characters, or the
/// leftover character (negated if it is `b`'s) when one string is a prefix of the other
pub fn strcmp(a: &str, b: &str) -> i64 {
    let mut a = a.chars();
    let mut b = b.chars();
    loop {
        match (a.next(), b.next()) {
            (None, None) => return 0,
            (None, Some(cb)) => return -i64::from(u32::from(cb)),
            (Some(ca), None) => return i64::from(u32::from(ca)),
            (Some(ca), Some(cb)) if ca != cb => {
                return i64::from(u32::from(ca)) - i64::from(u32::from(cb))
            }
            _ => {}
        }
    }
}

/// `base` multiplied `exp` times, wrapping; 0 for a negative exponent or a zero base
pub fn pow(base: i64, exp: i64) -> i64 {
    if exp < 0 || base == 0 {
        return 0;
    }
    let (mut res, mut base, mut exp) = (1i64, base, exp as u64);
    while exp > 0 {
        if exp & 1 == 1 {
            res = res.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    res
}
