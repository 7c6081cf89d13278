use crate::helper::*;

use logic_machine::*;

use std::rc::Rc;

fn call(pred: PredId) -> [u8; 3] {
    let [lo, hi] = (pred.index() as u16).to_le_bytes();
    [Opcode::Call as u8, lo, hi]
}

/// `name(X) :- target(X).` as raw bytecode, with `X` named.
fn relay(wam: &mut Machine, name: &str, target: PredId) -> PredId {
    let mut code = vec![Opcode::HeadFirstVar as u8, 0];
    code.extend(call(target));
    code.extend([Opcode::GoalMatchVar as u8, 0, Opcode::End as u8]);

    let pred = wam.declare(name, 1).unwrap();
    let clause = CompiledClause::from_bytecode(code, 1, 1).with_var_names(vec![Some(Rc::from("X"))]);

    wam.add_compiled_clause(pred, clause).unwrap();
    pred
}

#[test]
fn hand_assembled_clauses_run() {
    let mut wam = machine();
    let p = wam.declare("p", 1).unwrap();

    wam.add_compiled_clause(
        p,
        CompiledClause::from_bytecode(vec![Opcode::HeadSmallInt as u8, 5, Opcode::End as u8], 1, 0),
    )
    .unwrap();

    let q = relay(&mut wam, "q", p);

    assert_eq!(column(&mut wam, q, "X"), ints(&[5]));
}

#[test]
fn pooled_constants_are_read_by_index() {
    let mut wam = machine();
    let big = wam.declare("big", 1).unwrap();

    let idx = wam.add_constant(big, Value::Integer(70000)).unwrap();

    wam.add_compiled_clause(
        big,
        CompiledClause::from_bytecode(vec![Opcode::HeadInt as u8, idx, Opcode::End as u8], 1, 0),
    )
    .unwrap();

    let q = relay(&mut wam, "q", big);

    assert_eq!(column(&mut wam, q, "X"), ints(&[70000]));
}

#[test]
fn predicate_ids_are_little_endian() {
    let mut wam = machine();

    let fillers: Vec<PredId> = (0..300)
        .map(|n| wam.declare(&format!("filler{}", n), 1).unwrap())
        .collect();

    let last = *fillers.last().unwrap();
    assert!(last.index() > 255);

    wam.add_clause(last, ClauseBuilder::fact(0, [Arg::from(-3)])).unwrap();

    let q = relay(&mut wam, "q", last);

    assert_eq!(column(&mut wam, q, "X"), ints(&[-3]));
}

#[test]
fn malformed_clauses_are_rejected_before_running() {
    let mut wam = machine();
    let p = wam.declare("p", 1).unwrap();
    let nullary = wam.declare("r", 0).unwrap();

    let reject = |wam: &mut Machine, pred, code: Vec<u8>, arity, env_size| {
        wam.add_compiled_clause(pred, CompiledClause::from_bytecode(code, arity, env_size))
            .unwrap_err()
    };

    assert!(matches!(
        reject(&mut wam, nullary, vec![0x30, Opcode::End as u8], 0, 0),
        ProgramError::InvalidBytecode(_)
    ));

    // no END
    assert!(matches!(
        reject(&mut wam, p, vec![Opcode::HeadSmallInt as u8, 5], 1, 0),
        ProgramError::InvalidBytecode(_)
    ));

    assert_eq!(
        reject(&mut wam, p, vec![Opcode::HeadFirstVar as u8, 3, Opcode::End as u8], 1, 1),
        ProgramError::SlotOutOfRange { slot: 3, env_size: 1 }
    );

    assert!(matches!(
        reject(&mut wam, p, vec![Opcode::HeadInt as u8, 0, Opcode::End as u8], 1, 0),
        ProgramError::InvalidBytecode(_)
    ));

    assert_eq!(
        reject(&mut wam, nullary, vec![Opcode::Call as u8, 0xff, 0x00, Opcode::End as u8], 0, 0),
        ProgramError::UnknownPredicate(0xff)
    );

    assert!(matches!(
        reject(&mut wam, p, vec![Opcode::End as u8], 0, 0),
        ProgramError::ArityMismatch { expected: 1, found: 0, .. }
    ));

    // nothing was added
    let err = wam.run(p).unwrap_err();
    assert_eq!(
        err.kind(),
        &ErrorKind::UndefinedPredicate {
            name: "p".into(),
            arity: 1
        }
    );
}

#[test]
fn builder_output_passes_verification() {
    let mut wam = machine();
    let t = wam.register_table("t", 1, [[Value::Integer(4)]]).unwrap();
    let p = wam.declare("p", 1).unwrap();

    let clause = ClauseBuilder::new(2)
        .head(var(0))
        .call(t, [var(1)])
        .unify(var(0), Expr::var(1) * 2);

    assert_eq!(clause.arity(), 1);
    wam.add_clause(p, clause).unwrap();

    let q = relay(&mut wam, "q", p);

    assert_eq!(column(&mut wam, q, "X"), ints(&[8]));
}
