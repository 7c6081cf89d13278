use crate::machine::code_repo::MAX_ARITY;
use crate::machine::stack_dump::*;

use derive_more::Display;

use std::error::Error;
use std::fmt;

pub type MachineResult<T> = Result<T, MachineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StackKind {
    #[display(fmt = "data stack")]
    Data,
    #[display(fmt = "trail")]
    Trail,
    #[display(fmt = "undo stack")]
    Undo,
    #[display(fmt = "environment stack")]
    Environment,
    #[display(fmt = "choice-point stack")]
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ValidType {
    #[display(fmt = "integer")]
    Integer,
    #[display(fmt = "float")]
    Float,
    #[display(fmt = "number")]
    Number,
    #[display(fmt = "boolean")]
    Boolean,
    #[display(fmt = "reference")]
    Reference,
    #[display(fmt = "symbol")]
    Symbol,
    #[display(fmt = "list")]
    List,
    #[display(fmt = "error")]
    Error,
    #[display(fmt = "callable")]
    Callable,
    #[display(fmt = "table")]
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EvalError {
    #[display(fmt = "zero_divisor")]
    ZeroDivisor,
    #[display(fmt = "int_overflow")]
    IntOverflow,
    #[display(fmt = "index {} out of range for length {}", index, len)]
    IndexOutOfRange { index: i32, len: usize },
}

/// The cause of a fatal error. Logical failure is never an error.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ErrorKind {
    #[display(fmt = "existence_error(procedure, {}/{})", name, arity)]
    UndefinedPredicate { name: String, arity: usize },
    #[display(fmt = "instantiation_error: argument {} of {} is unbound", arg, operation)]
    Instantiation { operation: String, arg: usize },
    #[display(
        fmt = "type_error({}, {}): argument {} of {}",
        expected,
        found,
        arg,
        operation
    )]
    Type {
        operation: String,
        arg: usize,
        expected: ValidType,
        found: String,
    },
    #[display(fmt = "evaluation_error({}) in {}", error, operation)]
    Evaluation { operation: String, error: EvalError },
    #[display(fmt = "resource_error: {} overflow (capacity {})", stack, capacity)]
    Resource { stack: StackKind, capacity: usize },
    #[display(fmt = "thrown: {}", _0)]
    Thrown(String),
    #[display(fmt = "determinism error: {}/{} returned {}", name, arity, result)]
    Determinism {
        name: String,
        arity: usize,
        result: &'static str,
    },
    #[display(fmt = "malformed bytecode at pc {}: {:#04x}", pc, byte)]
    BadBytecode { pc: usize, byte: u8 },
    #[display(fmt = "truncated bytecode at pc {}", pc)]
    Truncated { pc: usize },
    #[display(fmt = "the machine is already running a query")]
    Reentrant,
    #[display(fmt = "{}", _0)]
    Program(ProgramError),
}

/// A fatal error leaving [`Machine::run`](crate::Machine::run), together with
/// the machine's stack at the point it was raised.
#[derive(Debug, Clone)]
pub struct MachineError {
    kind: ErrorKind,
    dump: Option<Box<StackDump>>,
}

impl MachineError {
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn stack_dump(&self) -> Option<&StackDump> {
        self.dump.as_deref()
    }

    pub(crate) fn has_dump(&self) -> bool {
        self.dump.is_some()
    }

    pub(crate) fn with_dump(mut self, dump: StackDump) -> Self {
        self.dump = Some(Box::new(dump));
        self
    }
}

impl From<ErrorKind> for MachineError {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        MachineError { kind, dump: None }
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(dump) = &self.dump {
            write!(f, "\n{}", dump)?;
        }

        Ok(())
    }
}

impl Error for MachineError {}

/// Errors raised while building or modifying the program.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ProgramError {
    #[display(fmt = "permission_error(modify, static_procedure, {}/{})", name, arity)]
    Locked { name: String, arity: usize },
    #[display(fmt = "{}/{} is already defined as {}", name, arity, kind)]
    KindConflict {
        name: String,
        arity: usize,
        kind: &'static str,
    },
    #[display(fmt = "arity mismatch in {}: expected {}, found {}", what, expected, found)]
    ArityMismatch {
        what: String,
        expected: usize,
        found: usize,
    },
    #[display(fmt = "the {} pool is full", _0)]
    PoolOverflow(&'static str),
    #[display(fmt = "{} is not a constant", _0)]
    NonConstant(String),
    #[display(fmt = "slot {} exceeds the environment size {}", slot, env_size)]
    SlotOutOfRange { slot: u8, env_size: u8 },
    #[display(fmt = "head argument emitted after the first goal")]
    HeadAfterBody,
    #[display(fmt = "no predicate with id {}", _0)]
    UnknownPredicate(u16),
    #[display(fmt = "too many predicates")]
    TooManyPredicates,
    #[display(fmt = "{}/{} exceeds the maximum arity {}", name, arity, MAX_ARITY)]
    ArityTooLarge { name: String, arity: usize },
    #[display(fmt = "invalid bytecode: {}", _0)]
    InvalidBytecode(String),
}

impl Error for ProgramError {}

impl From<ProgramError> for MachineError {
    #[inline]
    fn from(err: ProgramError) -> Self {
        ErrorKind::Program(err).into()
    }
}

impl From<MachineError> for ProgramError {
    fn from(err: MachineError) -> Self {
        ProgramError::InvalidBytecode(err.kind.to_string())
    }
}
