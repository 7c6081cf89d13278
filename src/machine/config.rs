use crate::machine::code_repo::*;
use crate::machine::machine_state::*;
use crate::machine::system_calls::*;
use crate::Machine;

/// Fixed capacities of the machine's stacks. Exceeding one is a fatal
/// resource error; stacks never grow past these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackCapacities {
    /// Data-stack cells.
    pub data: usize,
    /// Trail entries.
    pub trail: usize,
    /// Undo records.
    pub undo: usize,
    /// Environment frames.
    pub env: usize,
    /// Choice points.
    pub choices: usize,
}

impl Default for StackCapacities {
    fn default() -> Self {
        StackCapacities {
            data: 256 * 1024,
            trail: 256 * 1024,
            undo: 64 * 1024,
            env: 64 * 1024,
            choices: 64 * 1024,
        }
    }
}

/// Describes how a [`Machine`](crate::Machine) will be configured.
#[derive(Debug, Clone)]
pub struct MachineBuilder {
    pub(crate) capacities: StackCapacities,
    pub(crate) library: bool,
}

impl Default for MachineBuilder {
    /// Defaults to the standard capacities with the primitive library installed.
    fn default() -> Self {
        MachineBuilder {
            capacities: StackCapacities::default(),
            library: true,
        }
    }
}

impl MachineBuilder {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Default::default()
    }

    /// Uses the given capacities for every stack.
    pub fn with_capacities(mut self, capacities: StackCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    pub fn with_data_capacity(mut self, cells: usize) -> Self {
        self.capacities.data = cells;
        self
    }

    pub fn with_trail_capacity(mut self, entries: usize) -> Self {
        self.capacities.trail = entries;
        self
    }

    pub fn with_undo_capacity(mut self, records: usize) -> Self {
        self.capacities.undo = records;
        self
    }

    pub fn with_env_capacity(mut self, frames: usize) -> Self {
        self.capacities.env = frames;
        self
    }

    pub fn with_choice_capacity(mut self, choice_points: usize) -> Self {
        self.capacities.choices = choice_points;
        self
    }

    /// Whether to install `between/3`, `call/N`, `assert/N`, `retract/N` and
    /// the list primitives.
    pub fn with_library(mut self, library: bool) -> Self {
        self.library = library;
        self
    }

    /// Builds the [`Machine`](crate::Machine) from this configuration.
    pub fn build(self) -> Machine {
        let mut wam = Machine {
            machine_st: MachineState::new(&self.capacities),
            program: Program::new(),
            root: None,
        };

        if self.library {
            install_library(&mut wam);
        }

        wam
    }
}
