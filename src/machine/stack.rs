use crate::atom_table::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;
use crate::types::*;

use std::fmt;
use std::ops::{Deref, Index, IndexMut};
use std::rc::Rc;

/// The cells holding call arguments and clause variables.
///
/// `cells` only ever grows; `top` separates live cells from free ones. The
/// region above `top` doubles as scratch space for expression evaluation.
#[derive(Debug)]
pub(crate) struct DataStack {
    cells: Vec<Value>,
    top: Addr,
    capacity: usize,
}

impl DataStack {
    pub(crate) fn new(capacity: usize) -> Self {
        DataStack {
            cells: Vec::new(),
            top: 0,
            capacity,
        }
    }

    #[inline]
    pub(crate) fn top(&self) -> Addr {
        self.top
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve_to(&mut self, end: usize) -> MachineResult<()> {
        if end > self.capacity {
            return Err(ErrorKind::Resource {
                stack: StackKind::Data,
                capacity: self.capacity,
            }
            .into());
        }

        if self.cells.len() < end {
            self.cells.resize(end, Value::Unbound);
        }

        Ok(())
    }

    /// Allocates `n` cells initialised to `Unbound`, returning the first.
    pub(crate) fn alloc(&mut self, n: usize) -> MachineResult<Addr> {
        let base = self.top;
        let end = base as usize + n;

        self.reserve_to(end)?;

        for cell in &mut self.cells[base as usize..end] {
            *cell = Value::Unbound;
        }

        self.top = end as Addr;
        Ok(base)
    }

    /// Writes a scratch cell at `addr >= top` without moving the top.
    pub(crate) fn write_scratch(&mut self, addr: Addr, value: Value) -> MachineResult<()> {
        debug_assert!(addr >= self.top);
        self.reserve_to(addr as usize + 1)?;
        self.cells[addr as usize] = value;
        Ok(())
    }

    #[inline]
    pub(crate) fn truncate(&mut self, top: Addr) {
        if top < self.top {
            self.top = top;
        }
    }

    /// Follows forwarding links to the representative cell.
    ///
    /// Terminates because every `ForwardTo` in the stack points strictly
    /// downwards.
    pub(crate) fn deref(&self, mut addr: Addr) -> (Addr, Value) {
        loop {
            match self.cells[addr as usize] {
                Value::ForwardTo(next) => {
                    debug_assert!(next < addr);
                    addr = next;
                }
                value => return (addr, value),
            }
        }
    }

    #[inline]
    pub(crate) fn value(&self, addr: Addr) -> Value {
        self.deref(addr).1
    }

    pub(crate) fn live(&self) -> &[Value] {
        &self.cells[..self.top as usize]
    }

    pub(crate) fn reset(&mut self) {
        self.top = 0;
    }
}

impl Index<Addr> for DataStack {
    type Output = Value;

    #[inline]
    fn index(&self, addr: Addr) -> &Value {
        &self.cells[addr as usize]
    }
}

impl IndexMut<Addr> for DataStack {
    #[inline]
    fn index_mut(&mut self, addr: Addr) -> &mut Value {
        &mut self.cells[addr as usize]
    }
}

/// A `Vec` with a hard capacity, for the trail, undo, environment and
/// choice-point stacks.
#[derive(Debug)]
pub(crate) struct BoundedStack<T> {
    items: Vec<T>,
    capacity: usize,
    kind: StackKind,
}

impl<T> BoundedStack<T> {
    pub(crate) fn new(kind: StackKind, capacity: usize) -> Self {
        BoundedStack {
            items: Vec::new(),
            capacity,
            kind,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn push(&mut self, item: T) -> MachineResult<()> {
        if self.items.len() >= self.capacity {
            return Err(ErrorKind::Resource {
                stack: self.kind,
                capacity: self.capacity,
            }
            .into());
        }

        self.items.push(item);
        Ok(())
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    #[inline]
    pub(crate) fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.items.get_mut(idx)
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> Deref for BoundedStack<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.items
    }
}

/// Where a frame resumes its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Continuation {
    pub(crate) frame: usize,
    pub(crate) pc: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub(crate) predicate: PredId,
    pub(crate) clause: Rc<CompiledClause>,
    pub(crate) base: Addr,
    /// `None` only for the query root.
    pub(crate) continuation: Option<Continuation>,
    /// The choice-stack height when the clause was entered; cut returns to it.
    pub(crate) choice_top: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ChoicePoint {
    /// The calling frame, or `None` when retrying the query root.
    pub(crate) frame: Option<usize>,
    /// The pc of the call instruction to retry.
    pub(crate) pc: usize,
    pub(crate) callee: PredId,
    /// Leading argument cells dropped by meta-call indirection.
    pub(crate) shift: u8,
    /// Clause index, table cursor or primitive resumption counter.
    pub(crate) next: u32,
    pub(crate) data_top: Addr,
    pub(crate) trail_top: usize,
    pub(crate) undo_top: usize,
    pub(crate) env_top: usize,
}

/// A backtrackable effect outside the data stack.
pub(crate) struct UndoRecord {
    pub(crate) revert: Box<dyn FnOnce(&mut ObjectStore)>,
}

impl fmt::Debug for UndoRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UndoRecord").finish_non_exhaustive()
    }
}
