use std::collections::BTreeMap;

use crate::machine::code_repo::PredId;
use crate::machine::machine_errors::MachineResult;
use crate::types::{Addr, Value};

use super::Machine;

/// The answer bindings of one solution, keyed by variable name. Unnamed
/// slots appear as `_N`.
pub type Bindings = BTreeMap<String, Value>;

/// A variable of the query's root frame and its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub slot: usize,
    pub name: Option<String>,
    /// Dereferenced. [`Value::Unbound`] for variables left free.
    pub value: Value,
}

impl Binding {
    pub fn key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("_{}", self.slot),
        }
    }
}

impl Machine {
    /// The root frame's variables after a successful run. Empty when no
    /// solution is held.
    pub fn bindings(&self) -> impl Iterator<Item = Binding> + '_ {
        let st = &self.machine_st;

        let root = match self.root {
            Some(_) => st.env.first(),
            None => None,
        };

        root.into_iter().flat_map(move |frame| {
            (0..frame.clause.env_size as usize).map(move |slot| Binding {
                slot,
                name: frame.clause.var_name(slot).map(|name| name.to_string()),
                value: st.data.value(frame.base + slot as Addr),
            })
        })
    }

    pub fn solution(&self) -> Bindings {
        self.bindings()
            .map(|binding| (binding.key(), binding.value))
            .collect()
    }

    /// Drops the state kept for [`Machine::next_solution`].
    pub fn abandon(&mut self) {
        if !self.machine_st.running {
            self.root = None;
            self.machine_st.reset();
        }
    }

    /// Runs `pred` and iterates through its solutions.
    pub fn query(&mut self, pred: PredId) -> QueryState<'_> {
        QueryState {
            machine: self,
            pred,
            called: false,
            done: false,
        }
    }
}

/// An iterator through the solutions of a query. Iteration stops after the
/// first error.
pub struct QueryState<'a> {
    machine: &'a mut Machine,
    pred: PredId,
    called: bool,
    done: bool,
}

impl Drop for QueryState<'_> {
    fn drop(&mut self) {
        self.machine.abandon();
    }
}

impl Iterator for QueryState<'_> {
    type Item = MachineResult<Bindings>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = if self.called {
            self.machine.next_solution()
        } else {
            self.called = true;
            self.machine.run(self.pred)
        };

        match result {
            Ok(true) => Some(Ok(self.machine.solution())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
