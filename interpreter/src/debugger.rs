use std::io::{Stdout, Write};

use anyhow::{anyhow, bail, Result};
use crossterm::{self as ct, terminal};
use minilua_lib::vm::{StepOutcome, Vm};
use rustyline::{error::ReadlineError, DefaultEditor};

#[derive(PartialEq, Clone, Copy)]
enum UserCommand {
    Next,
    LastCommand,
    Show(Dump),
    Quit,
}

#[derive(PartialEq, Clone, Copy)]
enum Dump {
    Stack,
    Heap,
    Program,
    Symbols,
}

/// Single steps `vm` from its entry point. Whatever the program prints is collected and
/// shown in a panel instead of going to the terminal.
pub fn run(vm: &mut Vm, src: &str, stdout: &mut Stdout) -> Result<()> {
    vm.reset();
    let mut rl = DefaultEditor::new()?;
    let mut output = vec![];
    let mut last_cmd = None;

    use UserCommand::*;
    loop {
        render_state(stdout, vm, src, &output)?;
        stdout.flush()?;
        let mut cmd = read_line(&mut rl)?;
        if cmd == LastCommand {
            if let Some(last) = last_cmd {
                cmd = last;
            }
        }
        match cmd {
            LastCommand => {
                // only reached if there was no last command
            }
            Next => match vm.step(&mut output)? {
                StepOutcome::Continue => {}
                StepOutcome::Halted => println!("The program has halted, q to leave"),
            },
            Show(dump) => {
                let text = match dump {
                    Dump::Stack => vm.show_stack(),
                    Dump::Heap => vm.show_heap(),
                    Dump::Program => vm.show_program(),
                    Dump::Symbols => vm.show_symbols(),
                };
                print!("{text}");
            }
            Quit => return Ok(()),
        }
        last_cmd = Some(cmd);
    }
}

fn read_line(rl: &mut DefaultEditor) -> Result<UserCommand> {
    loop {
        let line = rl.readline("> ");
        use ReadlineError::*;
        match line {
            Ok(line) => match parse_line(&line) {
                Ok(cmd) => return Ok(cmd),
                Err(e) => eprintln!("Error: {}", e),
            },
            Err(Interrupted | Eof) => return Ok(UserCommand::Quit),
            Err(other) => return Err(other.into()),
        }
    }
}

fn parse_line(line: &str) -> Result<UserCommand> {
    use UserCommand::*;
    let elems: Vec<_> = line.split_whitespace().collect();
    match elems.as_slice() {
        [] => Ok(LastCommand),
        ["n" | "next"] => Ok(Next),
        ["q" | "quit"] => Ok(Quit),
        ["s" | "show", what] => parse_show(what),
        ["s" | "show"] => Err(anyhow!("show needs an argument")),
        _ => Err(anyhow!("Invalid Command")),
    }
}

fn parse_show(what: &str) -> Result<UserCommand> {
    let dump = match what {
        "s" | "stack" | "strings" => Dump::Stack,
        "h" | "heap" => Dump::Heap,
        "p" | "program" => Dump::Program,
        "y" | "symbols" => Dump::Symbols,
        _ => bail!("Invalid word after show"),
    };
    Ok(UserCommand::Show(dump))
}

struct Rect {
    w: u16,
    h: u16,
    x: u16,
    y: u16,
}

struct Rects {
    src: Rect,
    program: Rect,
    stack: Rect,
    heap: Rect,
    output: Rect,
}

impl Rect {
    /// draws `lines` clipped to the rect, blanking the rest of it
    pub fn render(
        &self,
        stdout: &mut Stdout,
        lines: impl IntoIterator<Item = String>,
    ) -> Result<()> {
        let wu = self.w as usize;
        let mut lines = lines.into_iter();
        for row in 0..self.h {
            let line: String = lines.next().unwrap_or_default().chars().take(wu).collect();
            ct::queue!(
                stdout,
                ct::cursor::MoveTo(self.x, self.y + row),
                ct::style::Print(format!("{line:<wu$}"))
            )?;
        }
        Ok(())
    }
}

fn render_state(stdout: &mut Stdout, vm: &Vm, src: &str, output: &[u8]) -> Result<()> {
    let curr_cursor = ct::cursor::position()?;
    let rects = compute_rects(terminal::size()?);
    rects.src.render(stdout, src.lines().map(String::from))?;
    render_program(stdout, &rects.program, vm)?;
    render_stack(stdout, &rects.stack, vm)?;
    rects
        .heap
        .render(stdout, vm.show_heap().lines().map(String::from))?;
    render_output(stdout, &rects.output, output)?;
    ct::queue!(stdout, ct::cursor::MoveTo(curr_cursor.0, curr_cursor.1))?;
    Ok(())
}

fn render_program(stdout: &mut Stdout, rect: &Rect, vm: &Vm) -> Result<()> {
    let pc = vm.pc();
    let header = format!("PC {pc}, AX {}", vm.memory().ax);
    let lines = vm
        .program()
        .instructions()
        .skip_while(|i| i.offset < pc)
        .map(|i| format!("{}: {}", i.offset, i));
    rect.render(stdout, std::iter::once(header).chain(lines))
}

/// the stack grows upwards from the bottom of the rect
fn render_stack(stdout: &mut Stdout, rect: &Rect, vm: &Vm) -> Result<()> {
    let stack = &vm.memory().stack;
    let padding = (rect.h as usize).saturating_sub(stack.len());
    let stack_lines = stack
        .iter()
        .enumerate()
        .rev()
        .map(|(i, entry)| format!("{}: {}", i, entry));
    rect.render(
        stdout,
        std::iter::repeat(String::new())
            .take(padding)
            .chain(stack_lines),
    )
}

/// the most recent lines the program printed
fn render_output(stdout: &mut Stdout, rect: &Rect, output: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<_> = text.lines().collect();
    let visible = (rect.h as usize).saturating_sub(1);
    let skip = lines.len().saturating_sub(visible);
    rect.render(
        stdout,
        std::iter::once("Output:".to_string()).chain(lines[skip..].iter().map(|l| l.to_string())),
    )
}

fn compute_rects((term_w, term_h): (u16, u16)) -> Rects {
    let width14 = term_w / 4;
    let width12 = term_w / 2;
    let width34 = term_w * 3 / 4;
    let height45 = term_h * 4 / 5;
    let height13 = height45 / 3;

    Rects {
        src: Rect {
            x: 0,
            y: 0,
            w: width12,
            h: height45,
        },
        program: Rect {
            x: width12,
            y: 0,
            w: width14,
            h: height45,
        },
        stack: Rect {
            x: width34,
            y: 0,
            w: width14,
            h: height13,
        },
        heap: Rect {
            x: width34,
            y: height13,
            w: width14,
            h: height13,
        },
        output: Rect {
            x: width34,
            y: height13 * 2,
            w: width14,
            h: height45 - height13 * 2,
        },
    }
}
