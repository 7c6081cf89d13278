use crate::machine::machine_errors::*;
use crate::types::*;

/// An ordered store of constant tuples.
///
/// Retracted rows are tombstoned rather than removed so that row cursors held
/// by choice points stay valid.
#[derive(Debug, Clone)]
pub struct Table {
    arity: usize,
    rows: Vec<Option<Box<[Value]>>>,
    live: usize,
}

impl Table {
    pub fn new(arity: usize) -> Self {
        Table {
            arity,
            rows: vec![],
            live: 0,
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// The number of live rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn check_row(&self, row: &[Value]) -> Result<(), ProgramError> {
        if row.len() != self.arity {
            return Err(ProgramError::ArityMismatch {
                what: "table row".to_string(),
                expected: self.arity,
                found: row.len(),
            });
        }

        match row.iter().find(|value| !value.is_constant()) {
            Some(value) => Err(ProgramError::NonConstant(format!("{:?}", value))),
            None => Ok(()),
        }
    }

    /// Appends a row, returning its position.
    pub fn push(&mut self, row: &[Value]) -> Result<usize, ProgramError> {
        self.check_row(row)?;

        self.rows.push(Some(row.into()));
        self.live += 1;

        Ok(self.rows.len() - 1)
    }

    fn position(&self, row: &[Value]) -> Option<usize> {
        self.rows
            .iter()
            .position(|slot| slot.as_deref() == Some(row))
    }

    /// Tombstones the first live row equal to `row`.
    pub fn retract(&mut self, row: &[Value]) -> bool {
        match self.position(row) {
            Some(idx) => {
                self.rows[idx] = None;
                self.live -= 1;
                true
            }
            None => false,
        }
    }

    /// Replaces the first live row equal to `old` in place.
    pub fn update(&mut self, old: &[Value], new: &[Value]) -> Result<bool, ProgramError> {
        self.check_row(new)?;

        match self.position(old) {
            Some(idx) => {
                self.rows[idx] = Some(new.into());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The position of the first live row at or after `from`.
    pub fn next_live(&self, from: usize) -> Option<usize> {
        self.rows
            .get(from..)?
            .iter()
            .position(Option::is_some)
            .map(|offset| from + offset)
    }

    #[inline]
    pub fn row(&self, idx: usize) -> Option<&[Value]> {
        self.rows.get(idx)?.as_deref()
    }

    /// Live rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> + '_ {
        self.rows.iter().filter_map(|row| row.as_deref())
    }
}
