//! Crate-wide error taxonomy.
//!
//! Modeled on the teacher's `codegen::error::CodeGenError`: a small tagged
//! enum rather than a generic boxed error, so the driver can report which
//! pass rejected the program (`spec.md` §7) while every individual pass
//! still just writes `.map_err(CompileError::lex)?`-style code.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Lex(String),
    Syntax(String),
    Resolve(String),
    Type(String),
    Loop(String),
    /// An internal contract violation (e.g. a missing type annotation past
    /// the point where one is guaranteed) rather than a malformed input
    /// program.
    Internal(String),
}

impl CompileError {
    pub fn message(&self) -> &str {
        match self {
            CompileError::Lex(m)
            | CompileError::Syntax(m)
            | CompileError::Resolve(m)
            | CompileError::Type(m)
            | CompileError::Loop(m)
            | CompileError::Internal(m) => m,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "lex error",
            CompileError::Syntax(_) => "syntax error",
            CompileError::Resolve(_) => "unbound or duplicate name",
            CompileError::Type(_) => "type error",
            CompileError::Loop(_) => "loop-escape error",
            CompileError::Internal(_) => "internal compiler error",
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for CompileError {}

pub type CResult<T> = Result<T, CompileError>;
