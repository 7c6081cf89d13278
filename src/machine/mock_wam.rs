pub use crate::codegen::*;
pub use crate::machine::code_repo::*;
pub use crate::machine::config::*;
pub use crate::machine::lib_machine::Bindings;
pub use crate::machine::machine_state::*;
pub use crate::machine::*;
pub use crate::types::*;

use std::ops::{Deref, DerefMut};

// a bare machine state for unit tests that don't need a program.

pub(crate) struct MockState {
    pub(crate) machine_st: MachineState,
}

impl MockState {
    pub(crate) fn new() -> Self {
        MockState {
            machine_st: MachineState::new(&StackCapacities::default()),
        }
    }
}

impl Deref for MockState {
    type Target = MachineState;

    fn deref(&self) -> &MachineState {
        &self.machine_st
    }
}

impl DerefMut for MockState {
    fn deref_mut(&mut self) -> &mut MachineState {
        &mut self.machine_st
    }
}

/// A machine without the primitive library.
pub(crate) fn bare_machine() -> Machine {
    MachineBuilder::new().with_library(false).build()
}

/// Defines `name/arity` from clause builders, panicking on registration errors.
pub(crate) fn rules(
    wam: &mut Machine,
    name: &str,
    arity: usize,
    clauses: impl IntoIterator<Item = ClauseBuilder>,
) -> PredId {
    let pred = wam.declare(name, arity).unwrap();

    for clause in clauses {
        wam.add_clause(pred, clause).unwrap();
    }

    pred
}

/// Collects every solution's bindings, panicking on errors.
pub(crate) fn all_solutions(wam: &mut Machine, pred: PredId) -> Vec<Bindings> {
    wam.query(pred).map(|answer| answer.unwrap()).collect()
}
