//! A bytecode abstract machine for logic programs.
//!
//! Clauses are assembled with [`ClauseBuilder`] (or handed over as raw
//! bytecode), grouped into predicates alongside fact tables and host
//! primitives, and run by a [`Machine`] that unifies flat values, keeps a
//! trail for backtracking and reuses frames for last calls.

#[macro_use]
extern crate static_assertions;

pub mod atom_table;
pub mod codegen;
pub mod instructions;
pub mod machine;
pub mod types;

// Re-exports
pub use atom_table::{Object, ObjectStore, ObjRef};
pub use codegen::{var, Arg, ClauseBuilder, Expr};
pub use instructions::{BuiltinOp, Opcode, Special};
pub use machine::code_repo::{
    CompiledClause, ConstantPools, Determinism, PredId, MAX_ARITY, Predicate, PredicateKey, PredicateKind,
    Primitive, PrimitiveArgs, PrimitiveFlags, PrimitiveResult, Program, SourceLocation,
};
pub use machine::config::*;
pub use machine::lib_machine::*;
pub use machine::machine_errors::{
    ErrorKind, EvalError, MachineError, MachineResult, ProgramError, StackKind, ValidType,
};
pub use machine::stack_dump::{ChoicePointDump, FrameDump, HeadDump, StackDump};
pub use machine::tables::Table;
pub use machine::Machine;
pub use types::{Addr, Value};
