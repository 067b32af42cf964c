use logos::Logos;

/// The closed set of token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Identifier,
    LiteralString,
    LiteralNumber,
    LiteralBoolean,
    Space,
    LParen,
    RParen,
    Comma,
    LDelim,
    RDelim,
    Accessor,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Eof => "EOF",
            TokenKind::Identifier => "Identifier",
            TokenKind::LiteralString => "LiteralString",
            TokenKind::LiteralNumber => "LiteralNumber",
            TokenKind::LiteralBoolean => "LiteralBoolean",
            TokenKind::Space => "Space",
            TokenKind::LParen => "LParen",
            TokenKind::RParen => "RParen",
            TokenKind::Comma => "Comma",
            TokenKind::LDelim => "LDelim",
            TokenKind::RDelim => "RDelim",
            TokenKind::Accessor => "Accessor",
        };
        f.write_str(name)
    }
}

/// A token and the text it was lexed from.
///
/// `text` is the consumed substring: verbatim for text runs, quotes stripped
/// (and `\<quote>` unescaped) for quoted literals, and with the leading dot
/// kept for accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Token { kind, text: text.into() }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token({}, {})", self.kind, self.text)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("lex error at byte {position}: '{snippet}'. {suggestion}")]
pub struct LexError {
    pub code: &'static str,
    pub position: usize,
    pub snippet: String,
    pub suggestion: String,
}

fn lex_error_kind(bad_token: &str) -> (&'static str, String) {
    if bad_token.starts_with('"') || bad_token.starts_with('\'') {
        ("WEFT-L002", "unterminated string literal".to_string())
    } else {
        (
            "WEFT-L001",
            format!("unexpected character(s) inside delimiters: '{bad_token}'"),
        )
    }
}

/// Token rules inside `{{ ... }}`.
///
/// Text mode is handled by the `lex` driver; logos only ever sees the region
/// between a `{{` and the next `}}`.
#[derive(Logos, Debug, Clone, PartialEq)]
enum DelimToken {
    #[regex(r"[ \t\r\n]+")]
    Space,

    #[token("}}")]
    RDelim,

    // A dot extending through every byte that is not whitespace or one of
    // `}`, `(`, `)`, `,`. A bare `.` is a valid accessor.
    #[regex(r"\.[^ \t\r\n}(),]*")]
    Accessor,

    // The matching quote is the only escape that produces a different byte;
    // any other backslashed byte is kept as-is by unquote.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice(), '"'))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unquote(lex.slice(), '\''))]
    LiteralString(String),

    #[token("true", priority = 10)]
    #[token("false", priority = 10)]
    LiteralBoolean,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    #[regex(r"[0-9]+")]
    LiteralNumber,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
}

fn unquote(slice: &str, quote: char) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&quote) {
            out.push(quote);
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Lex a template into a token stream ending in exactly one `Eof`.
///
/// Outside delimiters every byte up to the next `{{` becomes a single
/// `LiteralString` with no escape processing. An action left open at end of
/// input is not a lex error; the compiler reports it.
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let delim = rest.find("{{");
        let text_end = delim.unwrap_or(rest.len());
        if text_end > 0 {
            tokens.push(Token::new(TokenKind::LiteralString, &rest[..text_end]));
        }
        pos += text_end;
        if delim.is_none() {
            break;
        }
        tokens.push(Token::new(TokenKind::LDelim, "{{"));
        pos += 2;
        pos = lex_action(input, pos, &mut tokens)?;
    }

    tokens.push(Token::new(TokenKind::Eof, ""));
    Ok(tokens)
}

/// Lex one delimiter-mode region starting at `start`, through the closing
/// `}}` (or end of input). Returns the byte offset where text mode resumes.
fn lex_action(input: &str, start: usize, tokens: &mut Vec<Token>) -> Result<usize, LexError> {
    let mut lexer = DelimToken::lexer(&input[start..]);
    while let Some(result) = lexer.next() {
        let slice = lexer.slice();
        match result {
            Ok(DelimToken::RDelim) => {
                tokens.push(Token::new(TokenKind::RDelim, "}}"));
                return Ok(start + lexer.span().end);
            }
            Ok(token) => tokens.push(convert(token, slice)),
            Err(()) => {
                let position = start + lexer.span().start;
                let (code, suggestion) = lex_error_kind(slice);
                return Err(LexError {
                    code,
                    position,
                    snippet: slice.to_string(),
                    suggestion,
                });
            }
        }
    }
    Ok(input.len())
}

fn convert(token: DelimToken, slice: &str) -> Token {
    match token {
        DelimToken::Space => Token::new(TokenKind::Space, slice),
        DelimToken::Accessor => Token::new(TokenKind::Accessor, slice),
        DelimToken::LiteralString(text) => Token::new(TokenKind::LiteralString, text),
        DelimToken::LiteralBoolean => Token::new(TokenKind::LiteralBoolean, slice),
        DelimToken::Identifier => Token::new(TokenKind::Identifier, slice),
        DelimToken::LiteralNumber => Token::new(TokenKind::LiteralNumber, slice),
        DelimToken::LParen => Token::new(TokenKind::LParen, "("),
        DelimToken::RParen => Token::new(TokenKind::RParen, ")"),
        DelimToken::Comma => Token::new(TokenKind::Comma, ","),
        // Handled by lex_action before conversion.
        DelimToken::RDelim => Token::new(TokenKind::RDelim, "}}"),
    }
}
