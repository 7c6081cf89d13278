pub mod arithmetic_ops;
pub mod builtins;
pub mod code_repo;
pub mod code_walker;
pub mod config;
pub mod dispatch;
pub mod lib_machine;
pub mod machine_errors;
pub mod machine_state;
#[cfg(test)]
pub(crate) mod mock_wam;
pub mod stack;
pub mod stack_dump;
pub mod system_calls;
pub mod tables;
pub mod unify;

use crate::atom_table::*;
use crate::codegen::*;
use crate::machine::code_repo::*;
use crate::machine::code_walker::*;
use crate::machine::config::*;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::*;
use crate::machine::tables::*;
use crate::types::*;

use std::rc::Rc;

/// A compiled program together with the state of the query running on it.
#[derive(Debug)]
pub struct Machine {
    pub(crate) machine_st: MachineState,
    pub(crate) program: Program,
    /// The predicate of the last successful run, while its state is kept for
    /// [`Machine::next_solution`].
    pub(crate) root: Option<PredId>,
}

impl Default for Machine {
    fn default() -> Self {
        MachineBuilder::default().build()
    }
}

impl Machine {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[inline]
    pub fn lookup(&self, name: &str, arity: usize) -> Option<PredId> {
        self.program.lookup(name, arity)
    }

    /// Returns the id of `name/arity`, declaring it undefined if needed.
    /// Declaring first lets clauses call predicates defined later.
    pub fn declare(&mut self, name: &str, arity: usize) -> Result<PredId, ProgramError> {
        self.program.declare(name, arity)
    }

    fn editable(&mut self, pred: PredId) -> Result<&mut Predicate, ProgramError> {
        let predicate = self.program.expect_mut(pred)?;

        if predicate.locked {
            return Err(predicate.locked_error());
        }

        Ok(predicate)
    }

    /// Assembles a clause against the predicate's constant pools and appends
    /// it.
    pub fn add_clause(&mut self, pred: PredId, clause: ClauseBuilder) -> Result<(), ProgramError> {
        let predicate = self.editable(pred)?;

        if !matches!(predicate.kind, PredicateKind::Undefined | PredicateKind::Rules(_)) {
            return Err(predicate.conflict());
        }

        let compiled = clause.finish(&mut predicate.pools)?;
        self.add_compiled_clause(pred, compiled)
    }

    /// Appends a clause whose bytecode was produced elsewhere. The bytecode is
    /// verified against the predicate's pools and the program's arities.
    pub fn add_compiled_clause(
        &mut self,
        pred: PredId,
        clause: CompiledClause,
    ) -> Result<(), ProgramError> {
        let predicate = self.editable(pred)?;

        if !matches!(predicate.kind, PredicateKind::Undefined | PredicateKind::Rules(_)) {
            return Err(predicate.conflict());
        }

        if clause.arity != predicate.key.arity {
            return Err(ProgramError::ArityMismatch {
                what: format!("clause of {}", predicate.key),
                expected: predicate.key.arity,
                found: clause.arity,
            });
        }

        let pools = &self.program.get(pred).ok_or(ProgramError::UnknownPredicate(pred.0))?.pools;
        verify_clause(&clause, pools, &self.program)?;

        let predicate = self.program.expect_mut(pred)?;

        match &mut predicate.kind {
            PredicateKind::Rules(clauses) => clauses.push(Rc::new(clause)),
            kind => *kind = PredicateKind::Rules(vec![Rc::new(clause)]),
        }

        Ok(())
    }

    /// Declares `name/arity` and adds every clause in order.
    pub fn define_rule(
        &mut self,
        name: &str,
        arity: usize,
        clauses: impl IntoIterator<Item = ClauseBuilder>,
    ) -> Result<PredId, ProgramError> {
        let pred = self.declare(name, arity)?;

        for clause in clauses {
            self.add_clause(pred, clause)?;
        }

        Ok(pred)
    }

    /// Defines `name/arity` as a table holding `rows`.
    pub fn register_table<R>(
        &mut self,
        name: &str,
        arity: usize,
        rows: impl IntoIterator<Item = R>,
    ) -> Result<PredId, ProgramError>
    where
        R: AsRef<[Value]>,
    {
        let pred = self.declare(name, arity)?;
        let predicate = self.editable(pred)?;

        if !matches!(predicate.kind, PredicateKind::Undefined) {
            return Err(predicate.conflict());
        }

        let mut table = Table::new(arity);

        for row in rows {
            table.push(row.as_ref())?;
        }

        predicate.kind = PredicateKind::Table(table);
        Ok(pred)
    }

    /// Defines `name/arity` as a host callback.
    pub fn register_primitive<F>(
        &mut self,
        name: &str,
        arity: usize,
        flags: PrimitiveFlags,
        callback: F,
    ) -> Result<PredId, ProgramError>
    where
        F: Fn(&mut Machine, PrimitiveArgs, u32) -> MachineResult<PrimitiveResult> + 'static,
    {
        let pred = self.declare(name, arity)?;
        let predicate = self.editable(pred)?;

        if !matches!(predicate.kind, PredicateKind::Undefined) {
            return Err(predicate.conflict());
        }

        predicate.kind = PredicateKind::Primitive(Primitive {
            callback: Rc::new(callback),
            flags,
        });

        Ok(pred)
    }

    /// Forbids further clauses. Calling a locked undefined predicate fails
    /// instead of raising an existence error.
    pub fn lock(&mut self, pred: PredId) -> Result<(), ProgramError> {
        self.program.expect_mut(pred)?.locked = true;
        Ok(())
    }

    fn table_mut(&mut self, pred: PredId) -> Result<&mut Table, ProgramError> {
        let predicate = self.editable(pred)?;

        match predicate.kind {
            PredicateKind::Undefined => {
                predicate.kind = PredicateKind::Table(Table::new(predicate.key.arity));
            }
            PredicateKind::Table(_) => {}
            _ => return Err(predicate.conflict()),
        }

        match &mut predicate.kind {
            PredicateKind::Table(table) => Ok(table),
            _ => Err(ProgramError::UnknownPredicate(pred.0)),
        }
    }

    /// Appends a row. An unlocked undefined predicate becomes a table.
    pub fn assert_row(&mut self, pred: PredId, row: &[Value]) -> Result<usize, ProgramError> {
        self.table_mut(pred)?.push(row)
    }

    /// Marks the first live row equal to `row` dead. Returns whether one was
    /// found.
    pub fn retract_row(&mut self, pred: PredId, row: &[Value]) -> Result<bool, ProgramError> {
        Ok(self.table_mut(pred)?.retract(row))
    }

    pub fn update_row(
        &mut self,
        pred: PredId,
        old: &[Value],
        new: &[Value],
    ) -> Result<bool, ProgramError> {
        self.table_mut(pred)?.update(old, new)
    }

    /// Adds a constant to the pools of `pred`, returning its pool index.
    pub fn add_constant(&mut self, pred: PredId, value: Value) -> Result<u8, ProgramError> {
        let pools = &mut self.program.expect_mut(pred)?.pools;

        match value {
            Value::Integer(n) => pools.add_int(n),
            Value::Float(f) => pools.add_float(f.into_inner()),
            _ => pools.add_object(value),
        }
    }

    #[inline]
    pub fn objects(&self) -> &ObjectStore {
        self.machine_st.objects()
    }

    #[inline]
    pub fn objects_mut(&mut self) -> &mut ObjectStore {
        self.machine_st.objects_mut()
    }

    /// Interns a symbol, returning it as a value.
    pub fn intern(&mut self, name: &str) -> Value {
        Value::Reference(self.machine_st.objects.intern(name))
    }

    pub fn capacities(&self) -> StackCapacities {
        let st = &self.machine_st;

        StackCapacities {
            data: st.data.capacity(),
            trail: st.trail.capacity(),
            undo: st.undo.capacity(),
            env: st.env.capacity(),
            choices: st.choices.capacity(),
        }
    }

    /// The dereferenced value of argument `idx` of a primitive call.
    #[inline]
    pub fn arg(&self, args: PrimitiveArgs, idx: usize) -> Value {
        self.machine_st.data.value(args.addr(idx))
    }

    /// The dereferenced value of any cell, typically a primitive temporary.
    #[inline]
    pub fn cell(&self, addr: Addr) -> Value {
        self.machine_st.data.value(addr)
    }

    /// Unifies argument `idx` of a primitive call with a constant. The binding
    /// is trailed.
    pub fn unify_arg(&mut self, args: PrimitiveArgs, idx: usize, value: Value) -> MachineResult<bool> {
        self.unify_cell(args.addr(idx), value)
    }

    pub fn unify_cell(&mut self, addr: Addr, value: Value) -> MachineResult<bool> {
        if !value.is_constant() {
            return Err(self.machine_st.instantiation_error("unify", 2));
        }

        self.machine_st.unify_value(addr, value)
    }

    /// Unifies two cells, aliasing them when both are unbound.
    pub fn unify_cells(&mut self, a1: Addr, a2: Addr) -> MachineResult<bool> {
        self.machine_st.unify_addrs(a1, a2)
    }

    /// Registers an effect to revert when execution backtracks past this
    /// point or the run ends.
    pub fn push_undo(
        &mut self,
        revert: impl FnOnce(&mut ObjectStore) + 'static,
    ) -> MachineResult<()> {
        self.machine_st.push_undo(revert)
    }

    pub fn trail_height(&self) -> usize {
        self.machine_st.trail.len()
    }

    pub fn choice_point_count(&self) -> usize {
        self.machine_st.choices.len()
    }

    pub fn env_depth(&self) -> usize {
        self.machine_st.env.len()
    }

    pub fn data_height(&self) -> usize {
        self.machine_st.data.top() as usize
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.machine_st.running
    }
}
