use std::fmt::Write as _;

use crate::bytecode::{
    Constant, Instruction, Program, OP_CALL, OP_HALT, OP_LOAD_CONST, OP_LOOP_END, OP_LOOP_START,
    OP_PRINT_CONST, OP_RESOLVE_LOAD, OP_RESOLVE_PRINT,
};
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("loop target '{path}' is not a sequence")]
    LoopNotSequence { path: String },
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },
    #[error("unknown opcode: {op}")]
    UnknownOpcode { op: u8 },
    #[error("constant index {index} out of range")]
    ConstantOutOfRange { index: u8 },
    #[error("constant {index} is not a string")]
    NonStringConstant { index: u8 },
    #[error("{function} argument {register} was never loaded")]
    MissingArgument { function: String, register: usize },
    #[error("formatDate: invalid RFC 3339 timestamp '{input}'")]
    InvalidDate {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("formatDate: invalid layout '{layout}'")]
    InvalidDateLayout { layout: String },
    #[error("program ended without a halt instruction")]
    MissingHalt,
}

type VmResult<T> = Result<T, RuntimeError>;

/// An active `range` iteration. The frame borrows the sequence for its whole
/// lifetime, which is why a render's context must not be mutated while the
/// render runs.
struct LoopFrame<'v> {
    items: &'v [Value],
    cursor: usize,
    body_start: usize,
}

impl<'v> LoopFrame<'v> {
    fn current(&self) -> Option<&'v Value> {
        self.items.get(self.cursor)
    }
}

/// A register slot. Registers only stage function-call arguments; they are
/// not visible across `Call` boundaries.
#[derive(Clone, Copy)]
enum Slot<'p, 'v> {
    /// Never written.
    Empty,
    Const(&'p Constant),
    Value(&'v Value),
    /// Written by a resolve that found nothing; renders as empty.
    Absent,
}

/// One render: owns its buffer, registers, and loop stack; borrows the
/// program and context and mutates neither. Not shareable; build a fresh VM
/// per render.
pub struct Vm<'p, 'v> {
    instructions: &'p [Instruction],
    constants: &'p [Constant],
    context: &'v Value,
    buffer: String,
    registers: Vec<Slot<'p, 'v>>,
    loop_stack: Vec<LoopFrame<'v>>,
    pc: usize,
}

impl<'p, 'v> Vm<'p, 'v> {
    pub fn new(program: &'p Program, context: &'v Value) -> Self {
        Vm {
            instructions: &program.instructions,
            constants: &program.constants,
            context,
            buffer: String::new(),
            registers: vec![Slot::Empty; 8],
            loop_stack: Vec::new(),
            pc: 0,
        }
    }

    /// Evaluate to completion. Consumes the VM; the accumulated buffer is the
    /// rendered output.
    pub fn run(mut self) -> VmResult<String> {
        while self.pc < self.instructions.len() {
            let instruction = self.instructions[self.pc];
            let (op, a, b, _) = instruction.unpack();

            match op {
                OP_PRINT_CONST => {
                    let text = self.constant_str(a)?;
                    self.buffer.push_str(text);
                }
                OP_RESOLVE_PRINT => {
                    let path = self.constant_str(a)?;
                    if let Some(value) = self.resolve(path) {
                        value.render_to(&mut self.buffer);
                    }
                }
                OP_LOAD_CONST => {
                    let constant = self.constant(b)?;
                    self.set_register(a as usize, Slot::Const(constant));
                }
                OP_RESOLVE_LOAD => {
                    let path = self.constant_str(b)?;
                    let stripped = path.strip_prefix('.').unwrap_or(path);
                    let slot = match self.resolve(stripped) {
                        Some(value) => Slot::Value(value),
                        None => Slot::Absent,
                    };
                    self.set_register(a as usize, slot);
                }
                OP_LOOP_START => self.loop_start(a)?,
                OP_LOOP_END => self.loop_end(),
                OP_CALL => self.call(a)?,
                OP_HALT => return Ok(self.buffer),
                other => return Err(RuntimeError::UnknownOpcode { op: other }),
            }

            self.pc += 1;
        }
        Err(RuntimeError::MissingHalt)
    }

    fn loop_start(&mut self, index: u8) -> VmResult<()> {
        let path = self.constant_str(index)?;
        let items = self
            .resolve(path)
            .and_then(Value::as_seq)
            .ok_or_else(|| RuntimeError::LoopNotSequence {
                path: path.to_string(),
            })?;
        // An empty sequence still pushes; the first LoopEnd pops it.
        self.loop_stack.push(LoopFrame {
            items,
            cursor: 0,
            body_start: self.pc + 1,
        });
        Ok(())
    }

    fn loop_end(&mut self) {
        // A stray `end` with no active frame is a no-op.
        if let Some(frame) = self.loop_stack.last_mut() {
            frame.cursor += 1;
            if frame.cursor < frame.items.len() {
                // The dispatch loop's pc increment lands on body_start.
                self.pc = frame.body_start - 1;
            } else {
                self.loop_stack.pop();
            }
        }
    }

    /// Resolve a path against the context.
    ///
    /// `.` is the current element inside a loop (absent once an empty
    /// sequence's frame is live), the whole context otherwise. A leading-dot
    /// path descends segment by segment, starting from the current element
    /// when a loop is active and that element is a map, else from the root.
    /// Without a leading dot the path is a single top-level key.
    fn resolve(&self, path: &str) -> Option<&'v Value> {
        if path == "." {
            return match self.loop_stack.last() {
                Some(frame) => frame.current(),
                None => Some(self.context),
            };
        }
        if let Some(rest) = path.strip_prefix('.') {
            let mut node = match self.loop_stack.last().and_then(LoopFrame::current) {
                Some(element @ Value::Map(_)) => element,
                _ => self.context,
            };
            for segment in rest.split('.') {
                node = node.get(segment)?;
            }
            return Some(node);
        }
        self.context.get(path)
    }

    fn call(&mut self, index: u8) -> VmResult<()> {
        let name = self.constant_str(index)?;
        let result = match name {
            "upper" => self.argument_text(0, name)?.to_uppercase(),
            "lower" => self.argument_text(0, name)?.to_lowercase(),
            "formatDate" => {
                let input = self.argument_text(0, name)?;
                let layout = self.argument_text(1, name)?;
                format_date(&input, &layout)?
            }
            _ => {
                return Err(RuntimeError::UnknownFunction {
                    name: name.to_string(),
                })
            }
        };
        self.buffer.push_str(&result);
        Ok(())
    }

    /// The string form of a call argument. Absent resolves render as empty;
    /// a register that was never loaded is an arity bug in the bytecode.
    fn argument_text(&self, register: usize, function: &str) -> VmResult<String> {
        match self.registers.get(register) {
            Some(Slot::Const(constant)) => Ok(match constant {
                Constant::Str(s) => s.clone(),
                Constant::Int(n) => n.to_string(),
                Constant::Float(x) => x.to_string(),
                Constant::Bool(b) => b.to_string(),
            }),
            Some(Slot::Value(value)) => {
                let mut out = String::new();
                value.render_to(&mut out);
                Ok(out)
            }
            Some(Slot::Absent) => Ok(String::new()),
            Some(Slot::Empty) | None => Err(RuntimeError::MissingArgument {
                function: function.to_string(),
                register,
            }),
        }
    }

    fn set_register(&mut self, index: usize, slot: Slot<'p, 'v>) {
        if index >= self.registers.len() {
            self.registers.resize(index + 1, Slot::Empty);
        }
        self.registers[index] = slot;
    }

    fn constant(&self, index: u8) -> VmResult<&'p Constant> {
        self.constants
            .get(index as usize)
            .ok_or(RuntimeError::ConstantOutOfRange { index })
    }

    fn constant_str(&self, index: u8) -> VmResult<&'p str> {
        self.constant(index)?
            .as_str()
            .ok_or(RuntimeError::NonStringConstant { index })
    }
}

fn format_date(input: &str, layout: &str) -> VmResult<String> {
    let date = chrono::DateTime::parse_from_rfc3339(input).map_err(|source| {
        RuntimeError::InvalidDate {
            input: input.to_string(),
            source,
        }
    })?;
    // DelayedFormat surfaces bad specifiers as fmt errors; catch them instead
    // of letting to_string() panic.
    let mut out = String::new();
    write!(out, "{}", date.format(layout)).map_err(|_| RuntimeError::InvalidDateLayout {
        layout: layout.to_string(),
    })?;
    Ok(out)
}
