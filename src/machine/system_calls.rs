use crate::atom_table::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;
use crate::machine::Machine;
use crate::types::*;

use tracing::warn;

use smallvec::SmallVec;

/// The highest arity of the `call/N` family.
pub const MAX_CALL_ARITY: usize = 8;

/// The highest row width `assert/N` and `retract/N` accept.
pub const MAX_ROW_WIDTH: usize = 8;

impl Machine {
    fn integer_arg(&self, args: PrimitiveArgs, idx: usize, operation: &str) -> MachineResult<i32> {
        match self.arg(args, idx) {
            Value::Integer(n) => Ok(n),
            Value::Unbound => Err(self.machine_st.instantiation_error(operation, idx + 1)),
            value => Err(self.machine_st.type_error(operation, idx + 1, ValidType::Integer, value)),
        }
    }

    fn symbol_arg(&self, args: PrimitiveArgs, idx: usize, operation: &str, expected: ValidType) -> MachineResult<String> {
        let value = self.arg(args, idx);

        match value {
            Value::Unbound => Err(self.machine_st.instantiation_error(operation, idx + 1)),
            Value::Reference(r) => match self.objects().symbol_name(r) {
                Some(name) => Ok(name.to_string()),
                None => Err(self.machine_st.type_error(operation, idx + 1, expected, value)),
            },
            _ => Err(self.machine_st.type_error(operation, idx + 1, expected, value)),
        }
    }

    fn list_arg(&self, args: PrimitiveArgs, idx: usize, operation: &str) -> MachineResult<ObjRef> {
        let value = self.arg(args, idx);

        match value {
            Value::Unbound => Err(self.machine_st.instantiation_error(operation, idx + 1)),
            Value::Reference(r) if self.objects().list(r).is_some() => Ok(r),
            _ => Err(self.machine_st.type_error(operation, idx + 1, ValidType::List, value)),
        }
    }

    /// The table a row-editing primitive names in its first argument. An
    /// undefined name is declared.
    fn row_table(&mut self, args: PrimitiveArgs, operation: &str) -> MachineResult<(PredId, SmallVec<[Value; 8]>)> {
        let name = self.symbol_arg(args, 0, operation, ValidType::Table)?;
        let pred = self.declare(&name, args.arity() - 1)?;

        let row = (1..args.arity()).map(|idx| self.arg(args, idx)).collect();
        Ok((pred, row))
    }
}

/// `between(Low, High, X)`: enumerates the integers from `Low` to `High`,
/// or checks a bound `X`.
fn between(wam: &mut Machine, args: PrimitiveArgs, counter: u32) -> MachineResult<PrimitiveResult> {
    let low = wam.integer_arg(args, 0, "between/3")?;
    let high = wam.integer_arg(args, 1, "between/3")?;

    match wam.arg(args, 2) {
        Value::Integer(n) => Ok(if low <= n && n <= high {
            PrimitiveResult::DeterministicSuccess
        } else {
            PrimitiveResult::Fail
        }),
        Value::Unbound => {
            let n = low as i64 + counter as i64;

            if n > high as i64 {
                return Ok(PrimitiveResult::Fail);
            }

            wam.unify_arg(args, 2, Value::Integer(n as i32))?;

            Ok(if n < high as i64 {
                PrimitiveResult::NonDeterministicSuccess
            } else {
                PrimitiveResult::DeterministicSuccess
            })
        }
        value => Err(wam.machine_st.type_error("between/3", 3, ValidType::Integer, value)),
    }
}

/// `call(Goal, Args...)`: calls the predicate named by the symbol `Goal`
/// with the remaining arguments.
fn call_n(wam: &mut Machine, args: PrimitiveArgs, _: u32) -> MachineResult<PrimitiveResult> {
    let operation = format!("call/{}", args.arity());
    let name = wam.symbol_arg(args, 0, &operation, ValidType::Callable)?;
    let arity = args.arity() - 1;

    match wam.lookup(&name, arity) {
        Some(target) => Ok(PrimitiveResult::CallIndirect { target, skip: 1 }),
        None => Err(ErrorKind::UndefinedPredicate { name, arity }.into()),
    }
}

/// `assert(Table, Columns...)`: appends a row. Not undone on backtracking.
fn assert_n(wam: &mut Machine, args: PrimitiveArgs, _: u32) -> MachineResult<PrimitiveResult> {
    let (pred, row) = wam.row_table(args, "assert")?;

    wam.assert_row(pred, &row)?;
    Ok(PrimitiveResult::DeterministicSuccess)
}

/// `retract(Table, Columns...)`: removes the first equal row. Not undone on
/// backtracking.
fn retract_n(wam: &mut Machine, args: PrimitiveArgs, _: u32) -> MachineResult<PrimitiveResult> {
    let (pred, row) = wam.row_table(args, "retract")?;

    match wam.program().get(pred).map(|p| p.kind()) {
        Some(PredicateKind::Table(_)) => {}
        _ => return Ok(PrimitiveResult::Fail),
    }

    Ok(if wam.retract_row(pred, &row)? {
        PrimitiveResult::DeterministicSuccess
    } else {
        PrimitiveResult::Fail
    })
}

/// `list_push(List, Item)`: appends to a list object. Backtracking pops the
/// item again.
fn list_push(wam: &mut Machine, args: PrimitiveArgs, _: u32) -> MachineResult<PrimitiveResult> {
    let list = wam.list_arg(args, 0, "list_push/2")?;
    let item = wam.arg(args, 1);

    let len = match wam.objects_mut().list_mut(list) {
        Some(items) => {
            items.push(item);
            items.len() - 1
        }
        None => return Ok(PrimitiveResult::Fail),
    };

    wam.push_undo(move |objects| {
        if let Some(items) = objects.list_mut(list) {
            items.truncate(len);
        }
    })?;

    Ok(PrimitiveResult::DeterministicSuccess)
}

/// `list_length(List, N)`.
fn list_length(wam: &mut Machine, args: PrimitiveArgs, _: u32) -> MachineResult<PrimitiveResult> {
    let list = wam.list_arg(args, 0, "list_length/2")?;
    let len = wam.objects().list(list).map_or(0, |items| items.len());

    let len = i32::try_from(len).map_err(|_| {
        MachineError::from(ErrorKind::Evaluation {
            operation: "list_length/2".to_string(),
            error: EvalError::IntOverflow,
        })
    })?;

    Ok(if wam.unify_arg(args, 1, Value::Integer(len))? {
        PrimitiveResult::DeterministicSuccess
    } else {
        PrimitiveResult::Fail
    })
}

fn flags(mandatory_instantiation: bool, determinism: Determinism) -> PrimitiveFlags {
    PrimitiveFlags {
        mandatory_instantiation,
        determinism,
        temp_vars: 0,
    }
}

/// Registers the standard primitives. A name already taken by the program
/// is skipped with a warning.
pub(crate) fn install_library(wam: &mut Machine) {
    let mut register = |name: &str,
                        arity: usize,
                        flags: PrimitiveFlags,
                        callback: fn(&mut Machine, PrimitiveArgs, u32) -> MachineResult<PrimitiveResult>| {
        if let Err(err) = wam.register_primitive(name, arity, flags, callback) {
            warn!(target: "logic_machine::library", primitive = name, arity, "not installed: {}", err);
        }
    };

    register(
        "between",
        3,
        flags(false, Determinism::NonDeterministic),
        between,
    );

    for arity in 1..=MAX_CALL_ARITY {
        register("call", arity, flags(false, Determinism::SemiDeterministic), call_n);
    }

    for width in 1..=MAX_ROW_WIDTH {
        register("assert", width + 1, flags(true, Determinism::Deterministic), assert_n);
        register("retract", width + 1, flags(true, Determinism::SemiDeterministic), retract_n);
    }

    register("list_push", 2, flags(true, Determinism::Deterministic), list_push);
    register("list_length", 2, flags(false, Determinism::SemiDeterministic), list_length);
}
