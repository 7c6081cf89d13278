use crate::atom_table::*;
use crate::machine::config::*;
use crate::machine::machine_errors::*;
use crate::machine::stack::*;
use crate::types::*;

/// The stack heights a call starts from. A choice point pushed for the call
/// restores exactly these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Marks {
    pub(crate) data_top: Addr,
    pub(crate) trail_top: usize,
    pub(crate) undo_top: usize,
    pub(crate) env_top: usize,
    pub(crate) choice_top: usize,
}

/// How far head matching of a freshly entered frame got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeadProgress {
    pub(crate) frame: usize,
    pub(crate) matched: usize,
}

/// The mutable state of a run: the four stacks, the object store and the
/// registers naming the current frame and instruction.
#[derive(Debug)]
pub struct MachineState {
    pub(crate) data: DataStack,
    pub(crate) trail: BoundedStack<Addr>,
    pub(crate) undo: BoundedStack<UndoRecord>,
    pub(crate) env: BoundedStack<Frame>,
    pub(crate) choices: BoundedStack<ChoicePoint>,
    pub(crate) objects: ObjectStore,
    /// The current frame.
    pub(crate) e: usize,
    /// The pc of the next instruction in the current frame's clause.
    pub(crate) p: usize,
    pub(crate) running: bool,
    pub(crate) head_progress: Option<HeadProgress>,
}

impl MachineState {
    pub(crate) fn new(capacities: &StackCapacities) -> Self {
        MachineState {
            data: DataStack::new(capacities.data),
            trail: BoundedStack::new(StackKind::Trail, capacities.trail),
            undo: BoundedStack::new(StackKind::Undo, capacities.undo),
            env: BoundedStack::new(StackKind::Environment, capacities.env),
            choices: BoundedStack::new(StackKind::Choice, capacities.choices),
            objects: ObjectStore::new(),
            e: 0,
            p: 0,
            running: false,
            head_progress: None,
        }
    }

    #[inline]
    pub(crate) fn marks(&self) -> Marks {
        Marks {
            data_top: self.data.top(),
            trail_top: self.trail.len(),
            undo_top: self.undo.len(),
            env_top: self.env.len(),
            choice_top: self.choices.len(),
        }
    }

    /// Binds an existing cell, recording it on the trail.
    #[inline]
    pub(crate) fn bind(&mut self, addr: Addr, value: Value) -> MachineResult<()> {
        self.trail.push(addr)?;
        self.data[addr] = value;
        Ok(())
    }

    /// Unbinds every cell trailed above `mark`, newest first.
    pub(crate) fn unwind_trail(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(addr) = self.trail.pop() {
                self.data[addr] = Value::Unbound;
            }
        }
    }

    pub(crate) fn push_undo(
        &mut self,
        revert: impl FnOnce(&mut ObjectStore) + 'static,
    ) -> MachineResult<()> {
        self.undo.push(UndoRecord {
            revert: Box::new(revert),
        })
    }

    /// Runs undo records above `mark`, newest first.
    pub(crate) fn unwind_undo(&mut self, mark: usize) {
        while self.undo.len() > mark {
            if let Some(record) = self.undo.pop() {
                (record.revert)(&mut self.objects);
            }
        }
    }

    /// Returns every stack to the heights saved in `cp`.
    pub(crate) fn restore(&mut self, cp: &ChoicePoint) {
        self.env.truncate(cp.env_top);
        self.unwind_trail(cp.trail_top);
        self.unwind_undo(cp.undo_top);
        self.data.truncate(cp.data_top);
    }

    #[inline]
    pub(crate) fn cut(&mut self, choice_top: usize) {
        self.choices.truncate(choice_top);
    }

    /// True when frame `e` may be discarded or overwritten: no choice point
    /// still needs it.
    #[inline]
    pub(crate) fn frame_unprotected(&self, e: usize) -> bool {
        self.choices.last().map_or(true, |cp| cp.env_top <= e)
    }

    /// Empties every stack. Undo records are run so that objects mutated by
    /// backtrackable effects return to their state before the run.
    pub(crate) fn reset(&mut self) {
        self.choices.clear();
        self.env.clear();
        self.unwind_trail(0);
        self.unwind_undo(0);
        self.data.reset();
        self.e = 0;
        self.p = 0;
        self.head_progress = None;
    }

    pub(crate) fn render(&self, value: Value) -> String {
        self.objects.display(value).to_string()
    }

    pub(crate) fn instantiation_error(&self, operation: &str, arg: usize) -> MachineError {
        ErrorKind::Instantiation {
            operation: operation.to_string(),
            arg,
        }
        .into()
    }

    pub(crate) fn type_error(
        &self,
        operation: &str,
        arg: usize,
        expected: ValidType,
        found: Value,
    ) -> MachineError {
        ErrorKind::Type {
            operation: operation.to_string(),
            arg,
            expected,
            found: self.render(found),
        }
        .into()
    }

    pub(crate) fn evaluation_error(&self, operation: &str, error: EvalError) -> MachineError {
        ErrorKind::Evaluation {
            operation: operation.to_string(),
            error,
        }
        .into()
    }

    #[inline]
    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    #[inline]
    pub fn objects_mut(&mut self) -> &mut ObjectStore {
        &mut self.objects
    }
}
