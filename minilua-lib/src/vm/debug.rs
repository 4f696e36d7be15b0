//! Human readable dumps of a [Vm]'s state, used by the driver and the step debugger

use std::fmt::Write;

use super::Vm;
use crate::utils;

impl Vm {
    /// The program listing, one instruction per line, the one at PC in brackets
    pub fn show_program(&self) -> String {
        let top = match self.mem.stack.top() {
            Ok(v) => v.to_string(),
            Err(_) => "empty".into(),
        };
        let mut res = format!(
            "program segment: PC {}, AX {}, StackTop {}\n",
            self.pc, self.mem.ax, top
        );
        for instr in self.program.instructions() {
            let line = if instr.offset == self.pc {
                format!("[{instr}]")
            } else {
                instr.to_string()
            };
            let marker = if instr.offset == self.entry { " <- entry" } else { "" };
            let _ = writeln!(res, "{:>5}  {line}{marker}", instr.offset);
        }
        res
    }

    pub fn show_heap(&self) -> String {
        let heap = &self.mem.heap;
        let values: Vec<_> = heap.iter().map(|v| v.to_string()).collect();
        format!("{} data in heap:\n{}\n", heap.len(), values.join(" "))
    }

    /// the stack followed by the string pool
    pub fn show_stack(&self) -> String {
        let stack = &self.mem.stack;
        let values: Vec<_> = stack.iter().map(|v| v.to_string()).collect();
        let strings = &self.mem.strings;
        let mut res = format!("{} data in stack:\n{}\n", stack.len(), values.join(" "));
        let _ = writeln!(res, "{} data in string pool:", strings.len());
        for (i, s) in strings.iter().enumerate() {
            let _ = writeln!(res, "{i:>5}  {}", utils::quote(s));
        }
        res
    }

    pub fn show_symbols(&self) -> String {
        let mut res = format!("{} symbols in total:\n", self.symbols.len());
        for s in self.symbols.iter() {
            let _ = writeln!(res, "{}: type {}, addr {}", s.name, s.ty, s.addr);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OpCode;

    #[test]
    fn program_dump_brackets_the_pc() {
        let mut vm = Vm::new();
        vm.program.emit_with(OpCode::IMov, 3);
        vm.program.emit(OpCode::Print);
        vm.reset();
        let dump = vm.show_program();
        assert!(dump.starts_with(&format!("program segment: PC {}, AX nil, StackTop empty\n", vm.pc())));
        assert!(dump.contains("[IMOV 3] <- entry"));
        assert!(dump.contains("    0  PUSH\n"));
        assert!(!dump.contains("[PRINT]"));

        vm.step(&mut std::io::sink()).unwrap();
        assert!(vm.show_program().contains("[PRINT]"));
    }

    #[test]
    fn memory_dumps() {
        let mut vm = Vm::new();
        vm.intern_literal("a\"b");
        assert_eq!(vm.show_heap(), "1 data in heap:\nfunction: 0\n");
        assert_eq!(
            vm.show_stack(),
            "0 data in stack:\n\n2 data in string pool:\n    0  \"nil\"\n    1  \"a\\\"b\"\n"
        );
        assert_eq!(vm.show_symbols(), "1 symbols in total:\nprint: type Function, addr 0\n");
    }
}
