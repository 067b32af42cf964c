use crate::bytecode::{
    Constant, Instruction, Program, OP_CALL, OP_HALT, OP_LOAD_CONST, OP_LOOP_END, OP_LOOP_START,
    OP_PRINT_CONST, OP_RESOLVE_LOAD, OP_RESOLVE_PRINT,
};
use crate::lexer::{Token, TokenKind};

/// Operand fields are 8 bits wide, which bounds both pools.
pub const MAX_CONSTANTS: usize = 256;
pub const MAX_REGISTERS: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("invalid token in template body: {kind} '{text}'")]
    InvalidToken { kind: TokenKind, text: String },
    #[error("unexpected token in action: {kind} '{text}'")]
    UnexpectedInAction { kind: TokenKind, text: String },
    #[error("unexpected token in function call: {kind} '{text}'")]
    UnexpectedInCall { kind: TokenKind, text: String },
    #[error("expected space between 'range' and its target, got {kind} '{text}'")]
    ExpectedSpaceAfterRange { kind: TokenKind, text: String },
    #[error("expected accessor after 'range', got {kind} '{text}'")]
    ExpectedRangeTarget { kind: TokenKind, text: String },
    #[error("expected '}}}}' after range target, got {kind} '{text}'")]
    ExpectedDelimAfterRange { kind: TokenKind, text: String },
    #[error("expected '(' after function name '{name}'")]
    ExpectedCallParen { name: String },
    #[error("unexpected end of input in {context}")]
    UnexpectedEof { context: &'static str },
    #[error("invalid number literal: {text}")]
    InvalidNumber { text: String },
    #[error("constant pool limit of {MAX_CONSTANTS} entries exceeded")]
    TooManyConstants,
    #[error("function call uses more than {MAX_REGISTERS} argument registers")]
    TooManyRegisters,
}

type Result<T> = std::result::Result<T, CompileError>;

/// Compile a token stream into a program.
///
/// One left-to-right pass; the only lookahead is one token (to distinguish a
/// call from a bare identifier), and the only buffering is the per-call
/// instruction stack.
pub fn compile(tokens: &[Token]) -> Result<Program> {
    Compiler::new(tokens).run()
}

struct Compiler<'t> {
    tokens: &'t [Token],
    pos: usize,
    instructions: Vec<Instruction>,
    constants: Vec<Constant>,
}

impl<'t> Compiler<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Compiler {
            tokens,
            pos: 0,
            instructions: Vec::new(),
            constants: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_next(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos + 1)
    }

    fn skip_space(&mut self) {
        while matches!(self.peek(), Some(t) if t.kind == TokenKind::Space) {
            self.pos += 1;
        }
    }

    fn run(mut self) -> Result<Program> {
        loop {
            let token = self.peek().ok_or(CompileError::UnexpectedEof {
                context: "template body",
            })?;
            match token.kind {
                TokenKind::LiteralString => {
                    let index = self.add_constant(Constant::Str(token.text.clone()))?;
                    self.emit(OP_PRINT_CONST, index, 0, 0);
                    self.pos += 1;
                }
                TokenKind::LDelim => {
                    self.pos += 1;
                    self.compile_action()?;
                }
                TokenKind::Eof => {
                    self.emit(OP_HALT, 0, 0, 0);
                    return Ok(Program::new(self.instructions, self.constants));
                }
                _ => {
                    return Err(CompileError::InvalidToken {
                        kind: token.kind,
                        text: token.text.clone(),
                    })
                }
            }
        }
    }

    /// Everything between `{{` and `}}`.
    fn compile_action(&mut self) -> Result<()> {
        loop {
            self.skip_space();
            let token = self
                .peek()
                .ok_or(CompileError::UnexpectedEof { context: "action" })?;
            match token.kind {
                TokenKind::RDelim => {
                    self.pos += 1;
                    return Ok(());
                }
                TokenKind::Accessor => {
                    let index = self.add_constant(Constant::Str(token.text.clone()))?;
                    self.emit(OP_RESOLVE_PRINT, index, 0, 0);
                    self.pos += 1;
                }
                TokenKind::Identifier if token.text == "end" => {
                    self.emit(OP_LOOP_END, 0, 0, 0);
                    self.pos += 1;
                }
                TokenKind::Identifier if token.text == "range" => {
                    self.pos += 1;
                    self.compile_range()?;
                }
                TokenKind::Identifier => {
                    if matches!(self.peek_next(), Some(t) if t.kind == TokenKind::LParen) {
                        let stack = self.compile_call()?;
                        for instruction in stack.into_iter().rev() {
                            self.instructions.push(instruction);
                        }
                    } else {
                        let index = self.add_constant(Constant::Str(token.text.clone()))?;
                        self.emit(OP_RESOLVE_PRINT, index, 0, 0);
                        self.pos += 1;
                    }
                }
                TokenKind::Eof => {
                    return Err(CompileError::UnexpectedEof { context: "action" })
                }
                _ => {
                    return Err(CompileError::UnexpectedInAction {
                        kind: token.kind,
                        text: token.text.clone(),
                    })
                }
            }
        }
    }

    /// `range` has been consumed; whitespace between it and the accessor is
    /// the one place spacing is significant.
    fn compile_range(&mut self) -> Result<()> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Space => self.pos += 1,
            Some(t) => {
                return Err(CompileError::ExpectedSpaceAfterRange {
                    kind: t.kind,
                    text: t.text.clone(),
                })
            }
            None => return Err(CompileError::UnexpectedEof { context: "range" }),
        }
        self.skip_space();

        let target = match self.peek() {
            Some(t) if t.kind == TokenKind::Accessor => {
                self.pos += 1;
                t.text.clone()
            }
            Some(t) => {
                return Err(CompileError::ExpectedRangeTarget {
                    kind: t.kind,
                    text: t.text.clone(),
                })
            }
            None => return Err(CompileError::UnexpectedEof { context: "range" }),
        };
        self.skip_space();

        // The closing delimiter stays put; compile_action consumes it.
        match self.peek() {
            Some(t) if t.kind == TokenKind::RDelim => {}
            Some(t) => {
                return Err(CompileError::ExpectedDelimAfterRange {
                    kind: t.kind,
                    text: t.text.clone(),
                })
            }
            None => return Err(CompileError::UnexpectedEof { context: "range" }),
        }

        let index = self.add_constant(Constant::Str(target))?;
        self.emit(OP_LOOP_START, index, 0, 0);
        Ok(())
    }

    /// Compile `name(args...)` into a local stack: the `Call` first, then the
    /// argument loads with register indices assigned left-to-right from 0,
    /// nested call stacks appended flat. The caller emits the stack in
    /// reverse, so at runtime every load lands before its `Call`.
    fn compile_call(&mut self) -> Result<Vec<Instruction>> {
        let name = match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => t.text.clone(),
            Some(t) => {
                return Err(CompileError::UnexpectedInCall {
                    kind: t.kind,
                    text: t.text.clone(),
                })
            }
            None => {
                return Err(CompileError::UnexpectedEof {
                    context: "function call",
                })
            }
        };
        if !matches!(self.peek_next(), Some(t) if t.kind == TokenKind::LParen) {
            return Err(CompileError::ExpectedCallParen { name });
        }
        self.pos += 2;

        let mut stack = Vec::new();
        let mut register: usize = 0;
        let index = self.add_constant(Constant::Str(name))?;
        stack.push(Instruction::pack(OP_CALL, index, 0, 0));

        loop {
            let token = self.peek().ok_or(CompileError::UnexpectedEof {
                context: "function call",
            })?;
            match token.kind {
                TokenKind::RParen => {
                    self.pos += 1;
                    return Ok(stack);
                }
                TokenKind::Space | TokenKind::Comma => {
                    self.pos += 1;
                }
                TokenKind::Accessor => {
                    let constant = self.add_constant(Constant::Str(token.text.clone()))?;
                    stack.push(Instruction::pack(
                        OP_RESOLVE_LOAD,
                        self.register_index(register)?,
                        constant,
                        0,
                    ));
                    register += 1;
                    self.pos += 1;
                }
                TokenKind::LiteralString => {
                    let constant = self.add_constant(Constant::Str(token.text.clone()))?;
                    stack.push(Instruction::pack(
                        OP_LOAD_CONST,
                        self.register_index(register)?,
                        constant,
                        0,
                    ));
                    register += 1;
                    self.pos += 1;
                }
                TokenKind::LiteralNumber => {
                    let number: i64 =
                        token
                            .text
                            .parse()
                            .map_err(|_| CompileError::InvalidNumber {
                                text: token.text.clone(),
                            })?;
                    let constant = self.add_constant(Constant::Int(number))?;
                    stack.push(Instruction::pack(
                        OP_LOAD_CONST,
                        self.register_index(register)?,
                        constant,
                        0,
                    ));
                    register += 1;
                    self.pos += 1;
                }
                TokenKind::LiteralBoolean => {
                    let constant = self.add_constant(Constant::Bool(token.text == "true"))?;
                    stack.push(Instruction::pack(
                        OP_LOAD_CONST,
                        self.register_index(register)?,
                        constant,
                        0,
                    ));
                    register += 1;
                    self.pos += 1;
                }
                TokenKind::Identifier => {
                    let nested = self.compile_call()?;
                    stack.extend(nested);
                }
                _ => {
                    return Err(CompileError::UnexpectedInCall {
                        kind: token.kind,
                        text: token.text.clone(),
                    })
                }
            }
        }
    }

    fn emit(&mut self, op: u8, a: u8, b: u8, c: u8) {
        self.instructions.push(Instruction::pack(op, a, b, c));
    }

    fn add_constant(&mut self, constant: Constant) -> Result<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CompileError::TooManyConstants);
        }
        self.constants.push(constant);
        Ok((self.constants.len() - 1) as u8)
    }

    fn register_index(&self, register: usize) -> Result<u8> {
        if register >= MAX_REGISTERS {
            return Err(CompileError::TooManyRegisters);
        }
        Ok(register as u8)
    }
}
