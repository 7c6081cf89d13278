use crate::instructions::*;
use crate::machine::machine_errors::*;
use crate::machine::tables::*;
use crate::machine::Machine;
use crate::types::*;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use std::fmt;
use std::rc::Rc;

/// The 16-bit id under which `CALL` instructions name a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredId(pub(crate) u16);

impl PredId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredicateKey {
    pub name: Rc<str>,
    pub arity: usize,
}

impl PredicateKey {
    pub fn new(name: &str, arity: usize) -> Self {
        PredicateKey {
            name: Rc::from(name),
            arity,
        }
    }
}

impl fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Rc<str>,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// What a head argument was compiled from, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadArgModel {
    Slot(u8),
    Constant(Value),
    Void,
    Expression,
}

/// Immutable clause bytecode plus the metadata needed to run and report it.
#[derive(Debug, Clone)]
pub struct CompiledClause {
    pub(crate) code: Box<[u8]>,
    pub(crate) arity: usize,
    pub(crate) env_size: u8,
    pub(crate) head_model: Option<Vec<HeadArgModel>>,
    pub(crate) var_names: Vec<Option<Rc<str>>>,
    pub(crate) source: Option<SourceLocation>,
}

impl CompiledClause {
    /// Wraps bytecode produced outside the assembler. It is verified when
    /// added to a predicate.
    pub fn from_bytecode(code: Vec<u8>, arity: usize, env_size: u8) -> Self {
        CompiledClause {
            code: code.into_boxed_slice(),
            arity,
            env_size,
            head_model: None,
            var_names: vec![],
            source: None,
        }
    }

    pub fn with_var_names(mut self, names: Vec<Option<Rc<str>>>) -> Self {
        self.var_names = names;
        self
    }

    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline]
    pub fn env_size(&self) -> u8 {
        self.env_size
    }

    pub fn var_name(&self, slot: usize) -> Option<&Rc<str>> {
        self.var_names.get(slot)?.as_ref()
    }

    /// The clause that runs a table or primitive as a query: every argument
    /// is a fresh root variable.
    pub(crate) fn bootstrap(pred: PredId, arity: usize) -> Self {
        let mut code = Vec::with_capacity(4 + 2 * arity);

        code.push(Opcode::Call as u8);
        code.extend_from_slice(&pred.0.to_le_bytes());

        for slot in 0..arity {
            code.push(Opcode::GoalFirstVar as u8);
            code.push(slot as u8);
        }

        code.push(Opcode::End as u8);

        CompiledClause::from_bytecode(code, 0, arity as u8)
    }
}

pub(crate) const POOL_CAPACITY: usize = 256;

/// Slots are addressed by a byte, so a root frame holding every argument
/// can have at most this many.
pub const MAX_ARITY: usize = u8::MAX as usize;

/// Constants referenced by index from the bytecode of one predicate.
#[derive(Debug, Clone, Default)]
pub struct ConstantPools {
    pub(crate) objects: Vec<Value>,
    pub(crate) ints: Vec<i32>,
    pub(crate) floats: Vec<OrderedFloat<f32>>,
}

fn intern_in<T: PartialEq>(pool: &mut Vec<T>, item: T, name: &'static str) -> Result<u8, ProgramError> {
    if let Some(idx) = pool.iter().position(|other| *other == item) {
        return Ok(idx as u8);
    }

    if pool.len() >= POOL_CAPACITY {
        return Err(ProgramError::PoolOverflow(name));
    }

    pool.push(item);
    Ok((pool.len() - 1) as u8)
}

impl ConstantPools {
    pub fn add_int(&mut self, n: i32) -> Result<u8, ProgramError> {
        intern_in(&mut self.ints, n, "int")
    }

    pub fn add_float(&mut self, f: f32) -> Result<u8, ProgramError> {
        intern_in(&mut self.floats, OrderedFloat(f), "float")
    }

    pub fn add_object(&mut self, value: Value) -> Result<u8, ProgramError> {
        if !value.is_constant() {
            return Err(ProgramError::NonConstant(format!("{:?}", value)));
        }

        intern_in(&mut self.objects, value, "object")
    }

    /// Resolves a literal operand to its value.
    pub(crate) fn literal(&self, literal: Literal) -> Option<Value> {
        match literal {
            Literal::SmallInt(n) => Some(Value::Integer(n as i32)),
            Literal::Int(idx) => self.ints.get(idx as usize).map(|&n| Value::Integer(n)),
            Literal::Float(idx) => self.floats.get(idx as usize).map(|&f| Value::Float(f)),
            Literal::Object(idx) => self.objects.get(idx as usize).copied(),
        }
    }

    pub(crate) fn has(&self, literal: Literal) -> bool {
        self.literal(literal).is_some()
    }
}

/// The declared determinism of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Determinism {
    /// Always succeeds exactly once.
    Deterministic,
    /// Succeeds at most once.
    #[default]
    SemiDeterministic,
    /// May be resumed for further solutions.
    NonDeterministic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimitiveFlags {
    /// Raise an instantiation error when any argument is unbound.
    pub mandatory_instantiation: bool,
    pub determinism: Determinism,
    /// Scratch cells allocated after the arguments, initialised unbound.
    pub temp_vars: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveResult {
    Fail,
    DeterministicSuccess,
    /// Succeeded; retrying will call again with the counter incremented.
    NonDeterministicSuccess,
    /// Continue as a call to `target` with the arguments after the first `skip`.
    CallIndirect { target: PredId, skip: u8 },
}

impl PrimitiveResult {
    pub(crate) fn name(self) -> &'static str {
        match self {
            PrimitiveResult::Fail => "fail",
            PrimitiveResult::DeterministicSuccess => "deterministic success",
            PrimitiveResult::NonDeterministicSuccess => "non-deterministic success",
            PrimitiveResult::CallIndirect { .. } => "an indirect call",
        }
    }
}

/// The cells a primitive was called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveArgs {
    pub(crate) base: Addr,
    pub(crate) arity: usize,
    pub(crate) temps: Addr,
    pub(crate) temp_count: usize,
}

impl PrimitiveArgs {
    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// The cell of argument `idx` (0-based).
    #[inline]
    pub fn addr(&self, idx: usize) -> Addr {
        debug_assert!(idx < self.arity);
        self.base + idx as Addr
    }

    /// The cell of temporary `idx` (0-based).
    #[inline]
    pub fn temp(&self, idx: usize) -> Addr {
        debug_assert!(idx < self.temp_count);
        self.temps + idx as Addr
    }
}

pub type PrimitiveFn = dyn Fn(&mut Machine, PrimitiveArgs, u32) -> MachineResult<PrimitiveResult>;

#[derive(Clone)]
pub struct Primitive {
    pub(crate) callback: Rc<PrimitiveFn>,
    pub(crate) flags: PrimitiveFlags,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum PredicateKind {
    Undefined,
    Rules(Vec<Rc<CompiledClause>>),
    Table(Table),
    Primitive(Primitive),
}

impl PredicateKind {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            PredicateKind::Undefined => "undefined",
            PredicateKind::Rules(_) => "a rule predicate",
            PredicateKind::Table(_) => "a table",
            PredicateKind::Primitive(_) => "a primitive",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Predicate {
    pub(crate) key: PredicateKey,
    pub(crate) kind: PredicateKind,
    pub(crate) locked: bool,
    pub(crate) pools: ConstantPools,
}

impl Predicate {
    #[inline]
    pub fn key(&self) -> &PredicateKey {
        &self.key
    }

    #[inline]
    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn conflict(&self) -> ProgramError {
        ProgramError::KindConflict {
            name: self.key.name.to_string(),
            arity: self.key.arity,
            kind: self.kind.name(),
        }
    }

    pub(crate) fn locked_error(&self) -> ProgramError {
        ProgramError::Locked {
            name: self.key.name.to_string(),
            arity: self.key.arity,
        }
    }
}

/// The predicate registry. A predicate's id is its insertion index.
#[derive(Debug, Default)]
pub struct Program {
    preds: IndexMap<PredicateKey, Predicate, FxBuildHasher>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str, arity: usize) -> Option<PredId> {
        self.preds
            .get_index_of(&PredicateKey::new(name, arity))
            .map(|idx| PredId(idx as u16))
    }

    /// Returns the id of `name/arity`, declaring it undefined if needed.
    pub fn declare(&mut self, name: &str, arity: usize) -> Result<PredId, ProgramError> {
        let key = PredicateKey::new(name, arity);

        if let Some(idx) = self.preds.get_index_of(&key) {
            return Ok(PredId(idx as u16));
        }

        if self.preds.len() > u16::MAX as usize {
            return Err(ProgramError::TooManyPredicates);
        }

        if arity > MAX_ARITY {
            return Err(ProgramError::ArityTooLarge {
                name: name.to_string(),
                arity,
            });
        }

        let (idx, _) = self.preds.insert_full(
            key.clone(),
            Predicate {
                key,
                kind: PredicateKind::Undefined,
                locked: false,
                pools: ConstantPools::default(),
            },
        );

        Ok(PredId(idx as u16))
    }

    #[inline]
    pub fn get(&self, pred: PredId) -> Option<&Predicate> {
        self.preds.get_index(pred.index()).map(|(_, p)| p)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, pred: PredId) -> Option<&mut Predicate> {
        self.preds.get_index_mut(pred.index()).map(|(_, p)| p)
    }

    pub(crate) fn expect_mut(&mut self, pred: PredId) -> Result<&mut Predicate, ProgramError> {
        self.get_mut(pred).ok_or(ProgramError::UnknownPredicate(pred.0))
    }

    pub fn arity(&self, pred: PredId) -> Option<usize> {
        self.get(pred).map(|p| p.key.arity)
    }

    pub fn len(&self) -> usize {
        self.preds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PredId, &Predicate)> + '_ {
        self.preds
            .values()
            .enumerate()
            .map(|(idx, p)| (PredId(idx as u16), p))
    }

    /// The display name of `pred`, tolerating unknown ids.
    pub(crate) fn name_of(&self, pred: PredId) -> String {
        match self.get(pred) {
            Some(p) => p.key.to_string(),
            None => format!("#{}", pred.0),
        }
    }
}
