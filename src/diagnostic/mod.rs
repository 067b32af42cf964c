pub mod ansi;
pub mod json;
pub mod reporter;
mod source_map;

pub use reporter::{ErrorFormat, Reporter};
pub use source_map::SourceMap;

/// A byte range into the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// A renderable error report: stable code, message, optional source span and
/// snippet, notes, suggestion. Built from the stage error types via `From`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: label.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach the template text so renderers can show the offending line.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- From impls for the stage error types ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        let span = Span {
            start: e.position,
            end: e.position + e.snippet.len().max(1),
        };
        Diagnostic::error(format!("unexpected input '{}'", e.snippet))
            .with_code(e.code)
            .with_span(span, "here")
            .with_suggestion(e.suggestion.clone())
    }
}

impl From<&crate::compiler::CompileError> for Diagnostic {
    fn from(e: &crate::compiler::CompileError) -> Self {
        use crate::compiler::CompileError;
        let code = match e {
            CompileError::InvalidToken { .. } => "WEFT-C001",
            CompileError::UnexpectedInAction { .. } => "WEFT-C002",
            CompileError::UnexpectedInCall { .. } => "WEFT-C003",
            CompileError::ExpectedSpaceAfterRange { .. } => "WEFT-C004",
            CompileError::ExpectedRangeTarget { .. } => "WEFT-C005",
            CompileError::ExpectedDelimAfterRange { .. } => "WEFT-C006",
            CompileError::ExpectedCallParen { .. } => "WEFT-C007",
            CompileError::UnexpectedEof { .. } => "WEFT-C008",
            CompileError::InvalidNumber { .. } => "WEFT-C009",
            CompileError::TooManyConstants => "WEFT-C010",
            CompileError::TooManyRegisters => "WEFT-C011",
        };
        let mut d = Diagnostic::error(e.to_string()).with_code(code);
        if matches!(e, CompileError::ExpectedSpaceAfterRange { .. }) {
            d = d.with_suggestion("write 'range' and its accessor with a space: {{range .items}}");
        }
        d
    }
}

impl From<&crate::bytecode::CodecError> for Diagnostic {
    fn from(e: &crate::bytecode::CodecError) -> Self {
        use crate::bytecode::CodecError;
        let code = match e {
            CodecError::BadMagic(_) => "WEFT-B001",
            CodecError::UnsupportedVersion(_) => "WEFT-B002",
            CodecError::Truncated(_) => "WEFT-B003",
            CodecError::UnknownConstantTag(_) => "WEFT-B004",
            CodecError::InvalidUtf8(_) => "WEFT-B005",
            CodecError::WideOperand { .. } => "WEFT-B006",
        };
        Diagnostic::error(e.to_string()).with_code(code)
    }
}

impl From<&crate::vm::RuntimeError> for Diagnostic {
    fn from(e: &crate::vm::RuntimeError) -> Self {
        use crate::vm::RuntimeError;
        let code = match e {
            RuntimeError::LoopNotSequence { .. } => "WEFT-R001",
            RuntimeError::UnknownFunction { .. } => "WEFT-R002",
            RuntimeError::UnknownOpcode { .. } => "WEFT-R003",
            RuntimeError::ConstantOutOfRange { .. } => "WEFT-R004",
            RuntimeError::NonStringConstant { .. } => "WEFT-R005",
            RuntimeError::MissingArgument { .. } => "WEFT-R006",
            RuntimeError::InvalidDate { .. } => "WEFT-R007",
            RuntimeError::InvalidDateLayout { .. } => "WEFT-R008",
            RuntimeError::MissingHalt => "WEFT-R009",
        };
        let mut d = Diagnostic::error(e.to_string()).with_code(code);
        if let RuntimeError::UnknownFunction { .. } = e {
            d = d.with_note("built-in functions: upper, lower, formatDate");
        }
        d
    }
}

impl From<&crate::engine::Error> for Diagnostic {
    fn from(e: &crate::engine::Error) -> Self {
        use crate::engine::Error;
        match e {
            Error::Lex(inner) => Diagnostic::from(inner),
            Error::Compile(inner) => Diagnostic::from(inner),
            Error::Codec(inner) => Diagnostic::from(inner),
            Error::Runtime(inner) => Diagnostic::from(inner),
            Error::ContextNotMap => Diagnostic::error(e.to_string()).with_code("WEFT-E001"),
        }
    }
}
