//! Deals with run-time data representation

use std::fmt;

use super::Fault;

/// The content of a stack entry, a heap slot or AX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Nil,
    Int(i64),
    /// index into the string pool
    Str(usize),
    /// entry point of a function in the program
    Func(usize),
}

impl Value {
    /// nil and 0 are false, everything else is true
    pub fn truthy(self) -> bool {
        !matches!(self, Value::Nil | Value::Int(0))
    }

    /// The value as an integer operand, nil counts as 0
    pub fn to_int(self) -> Result<i64, Fault> {
        match self {
            Value::Nil => Ok(0),
            Value::Int(i) => Ok(i),
            found => Err(Fault::TypeMismatch {
                expected: "integer",
                found,
            }),
        }
    }

    pub fn to_str_idx(self) -> Result<usize, Fault> {
        match self {
            Value::Str(idx) => Ok(idx),
            found => Err(Fault::TypeMismatch {
                expected: "string",
                found,
            }),
        }
    }

    /// Interprets the value as a program offset, e.g. a return address
    pub fn to_address(self) -> Result<usize, Fault> {
        match self {
            Value::Func(addr) => Ok(addr),
            Value::Int(i) => usize::try_from(i).map_err(|_| Fault::JumpTarget(i)),
            found => Err(Fault::TypeMismatch {
                expected: "address",
                found,
            }),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Value::Nil | Value::Int(_))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Int(value.into())
    }
}

/// The raw form used in dumps, strings show up as their pool index
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(idx) => write!(f, "str#{idx}"),
            Value::Func(addr) => write!(f, "function: {addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(Value::Str(0).truthy());
        assert!(Value::Func(0).truthy());
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::Nil.to_int(), Ok(0));
        assert_eq!(Value::from(true), Value::Int(1));
        assert!(Value::Str(1).to_int().is_err());
        assert_eq!(Value::Int(5).to_address(), Ok(5));
        assert_eq!(Value::Int(-5).to_address(), Err(Fault::JumpTarget(-5)));
        assert_eq!(Value::Func(3).to_address(), Ok(3));
    }
}
