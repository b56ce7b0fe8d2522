// Error and unwinding model
//
// Every primitive returns a Result. The REPL loop is the single top-level
// handler: a diagnosable fault prints an ERROR line and resets the
// per-line state, while Abort / Quit / Bye are control-flow variants that
// carry no message of their own. Data space, the dictionary, HERE and
// BASE always survive an unwind.

use thiserror::Error;

pub type ForthResult = Result<(), ForthError>;

#[derive(Debug, Error, PartialEq)]
pub enum ForthError {
    #[error("{0} not found and not a number")]
    NotFound(String),

    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("return stack underflow")]
    ReturnStackUnderflow,
    #[error("return stack overflow")]
    ReturnStackOverflow,
    #[error("float stack underflow")]
    FloatStackUnderflow,
    #[error("float stack overflow")]
    FloatStackOverflow,

    #[error("invalid address: {0}")]
    InvalidAddress(u32),
    #[error("data space exhausted")]
    OutOfMemory,

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0}")]
    Compile(String),

    #[error("{0}")]
    Message(String),

    // Control-flow variants. The words that raise these perform their own
    // stack / ip / STATE resets before returning, so the catch site only
    // decides where execution resumes.
    #[error("abort")]
    Abort,
    #[error("quit")]
    Quit,
    #[error("bye")]
    Bye,
}
