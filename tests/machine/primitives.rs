use crate::helper::*;

use logic_machine::*;

fn flags(determinism: Determinism) -> PrimitiveFlags {
    PrimitiveFlags {
        determinism,
        ..PrimitiveFlags::default()
    }
}

/// `name :- prim.` for a nullary primitive.
fn caller(wam: &mut Machine, name: &str, prim: PredId) -> PredId {
    wam.define_rule(name, 0, [ClauseBuilder::new(0).call(prim, [])]).unwrap()
}

#[test]
fn semideterministic_primitives_may_not_leave_choices() {
    let mut wam = machine();
    let prim = wam
        .register_primitive("once_only", 0, flags(Determinism::SemiDeterministic), |_, _, _| {
            Ok(PrimitiveResult::NonDeterministicSuccess)
        })
        .unwrap();

    let q = caller(&mut wam, "q", prim);
    let err = wam.run(q).unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorKind::Determinism {
            name: "once_only".into(),
            arity: 0,
            result: "non-deterministic success"
        }
    );
    assert_eq!(wam.choice_point_count(), 0);
}

#[test]
fn deterministic_primitives_may_not_fail() {
    let mut wam = machine();
    let prim = wam
        .register_primitive("always", 0, flags(Determinism::Deterministic), |_, _, _| {
            Ok(PrimitiveResult::Fail)
        })
        .unwrap();

    let q = caller(&mut wam, "q", prim);

    assert!(matches!(
        wam.run(q).unwrap_err().kind(),
        ErrorKind::Determinism { result: "fail", .. }
    ));
}

#[test]
fn semideterministic_failure_is_plain_failure() {
    let mut wam = machine();
    let prim = wam
        .register_primitive("never", 0, flags(Determinism::SemiDeterministic), |_, _, _| {
            Ok(PrimitiveResult::Fail)
        })
        .unwrap();

    let q = caller(&mut wam, "q", prim);
    assert!(!wam.run(q).unwrap());
}

#[test]
fn retries_pass_an_incremented_counter() {
    let mut wam = machine();
    let count = wam
        .register_primitive("count", 1, flags(Determinism::NonDeterministic), |wam, args, counter| {
            wam.unify_arg(args, 0, Value::Integer(counter as i32))?;

            Ok(if counter < 2 {
                PrimitiveResult::NonDeterministicSuccess
            } else {
                PrimitiveResult::DeterministicSuccess
            })
        })
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1).name_var(0, "N").call(count, [var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "N"), ints(&[0, 1, 2]));
    assert_eq!(column(&mut wam, count, "_0"), ints(&[0, 1, 2]));
}

#[test]
fn mandatory_instantiation_names_the_unbound_argument() {
    let mut wam = machine();
    let need = wam
        .register_primitive(
            "need",
            2,
            PrimitiveFlags {
                mandatory_instantiation: true,
                determinism: Determinism::Deterministic,
                temp_vars: 0,
            },
            |_, _, _| Ok(PrimitiveResult::DeterministicSuccess),
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1).call(need, [Arg::from(1), var(0)])],
        )
        .unwrap();

    assert_eq!(
        wam.run(q).unwrap_err().kind(),
        &ErrorKind::Instantiation {
            operation: "need/2".into(),
            arg: 2
        }
    );
}

#[test]
fn temporaries_start_unbound() {
    let mut wam = machine();
    let scratch = wam
        .register_primitive(
            "scratch",
            1,
            PrimitiveFlags {
                mandatory_instantiation: false,
                determinism: Determinism::SemiDeterministic,
                temp_vars: 2,
            },
            |wam, args, _| {
                if !wam.cell(args.temp(0)).is_unbound() || !wam.cell(args.temp(1)).is_unbound() {
                    return Ok(PrimitiveResult::Fail);
                }

                wam.unify_cell(args.temp(1), Value::Integer(11))?;
                let value = wam.cell(args.temp(1));

                Ok(if wam.unify_arg(args, 0, value)? {
                    PrimitiveResult::DeterministicSuccess
                } else {
                    PrimitiveResult::Fail
                })
            },
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1)
                .name_var(0, "T")
                .call(scratch, [var(0)])
                .call(scratch, [var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "T"), ints(&[11]));
}

#[test]
fn indirect_calls_resume_the_target_on_retry() {
    let mut wam = machine();
    let call2 = wam.lookup("call", 2).unwrap();
    wam
        .define_rule(
            "two",
            1,
            [
                ClauseBuilder::fact(0, [Arg::from(1)]),
                ClauseBuilder::fact(0, [Arg::from(2)]),
            ],
        )
        .unwrap();
    let name = wam.intern("two");

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1)
                .name_var(0, "X")
                .call(call2, [Arg::from(name), var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "X"), ints(&[1, 2]));
}

#[test]
fn indirect_calls_to_unknown_names_raise() {
    let mut wam = machine();
    let call1 = wam.lookup("call", 1).unwrap();
    let name = wam.intern("missing");

    let q = wam
        .define_rule("q", 0, [ClauseBuilder::new(0).call(call1, [Arg::from(name)])])
        .unwrap();

    assert_eq!(
        wam.run(q).unwrap_err().kind(),
        &ErrorKind::UndefinedPredicate {
            name: "missing".into(),
            arity: 0
        }
    );
}

#[test]
fn undo_records_run_when_a_query_fails() {
    let mut wam = machine();
    let push = wam.lookup("list_push", 2).unwrap();
    let list = wam.objects_mut().new_list(vec![Value::Integer(0)]);

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(0)
                .call(push, [Arg::from(list), Arg::from(1)])
                .call(push, [Arg::from(list), Arg::from(2)])
                .fail()],
        )
        .unwrap();

    assert!(!wam.run(q).unwrap());
    assert_eq!(wam.objects().list(list), Some(&ints(&[0])[..]));
}

#[test]
fn list_primitives_check_their_arguments() {
    let mut wam = machine();
    let length = wam.lookup("list_length", 2).unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1).call(length, [Arg::from(3), var(0)])],
        )
        .unwrap();

    assert!(matches!(
        wam.run(q).unwrap_err().kind(),
        ErrorKind::Type {
            expected: ValidType::List,
            arg: 1,
            ..
        }
    ));
}

#[test]
fn retract_only_touches_tables() {
    let mut wam = machine();
    let retract = wam.lookup("retract", 2).unwrap();
    wam.define_rule("r", 1, [ClauseBuilder::fact(0, [Arg::from(1)])]).unwrap();
    let name = wam.intern("r");

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(0).call(retract, [Arg::from(name), Arg::from(1)])],
        )
        .unwrap();

    assert!(!wam.run(q).unwrap());
}

#[test]
fn library_names_cannot_be_redefined() {
    let mut wam = machine();

    let err = wam
        .register_table("between", 3, Vec::<[Value; 3]>::new())
        .unwrap_err();

    assert!(matches!(err, ProgramError::KindConflict { .. }));
}
