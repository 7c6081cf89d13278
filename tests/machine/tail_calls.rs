use crate::helper::*;

use logic_machine::*;

/// `count(N) :- gauge, N > 0, count(N - 1).`
fn countdown(wam: &mut Machine, gauge: PredId) -> PredId {
    let count = wam.declare("count", 1).unwrap();

    wam.add_clause(
        count,
        ClauseBuilder::new(1)
            .head(var(0))
            .call(gauge, [])
            .compare(BuiltinOp::Gt, Expr::var(0), 0)
            .last_call(count, [Arg::from(Expr::var(0) - 1)]),
    )
    .unwrap();

    count
}

#[test]
fn last_calls_reuse_the_frame() {
    let mut wam = machine_with(MachineBuilder::new().with_env_capacity(8));
    let (gauge, depth, choices) = gauge(&mut wam, "gauge");
    let count = countdown(&mut wam, gauge);

    let q = wam
        .define_rule("q", 0, [ClauseBuilder::new(0).call(count, [Arg::from(10_000)])])
        .unwrap();

    assert!(!wam.run(q).unwrap());
    assert!(depth.get() <= 2, "environment depth reached {}", depth.get());
    assert_eq!(choices.get(), 0);
}

#[test]
fn plain_calls_exhaust_a_small_environment_stack() {
    let mut wam = machine_with(MachineBuilder::new().with_env_capacity(8));
    let count = wam.declare("count", 1).unwrap();

    wam.add_clause(
        count,
        ClauseBuilder::new(1)
            .head(var(0))
            .compare(BuiltinOp::Gt, Expr::var(0), 0)
            .call(count, [Arg::from(Expr::var(0) - 1)]),
    )
    .unwrap();

    let q = wam
        .define_rule("q", 0, [ClauseBuilder::new(0).call(count, [Arg::from(100)])])
        .unwrap();

    assert!(matches!(
        wam.run(q).unwrap_err().kind(),
        ErrorKind::Resource {
            stack: StackKind::Environment,
            capacity: 8
        }
    ));
}

#[test]
fn variables_passed_through_a_reused_frame_stay_linked() {
    let mut wam = machine();

    let sink = wam
        .define_rule("sink", 1, [ClauseBuilder::fact(0, [Arg::from(5)])])
        .unwrap();

    let relay = wam
        .define_rule(
            "relay",
            1,
            [ClauseBuilder::new(1).head(var(0)).last_call(sink, [var(0)])],
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(relay, [var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "X"), ints(&[5]));
}

#[test]
fn fresh_locals_shared_by_two_arguments_survive_the_rewrite() {
    let mut wam = machine();

    // two(A, B, C) :- A = 7, C = B.
    let two = wam
        .define_rule(
            "two",
            3,
            [ClauseBuilder::new(3)
                .head(var(0))
                .head(var(1))
                .head(var(2))
                .unify(var(0), 7)
                .unify(var(2), var(1))],
        )
        .unwrap();

    // swap(X) :- two(Y, Y, X).
    let swap = wam
        .define_rule(
            "swap",
            1,
            [ClauseBuilder::new(2)
                .head(var(0))
                .last_call(two, [var(1), var(1), var(0)])],
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(swap, [var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "X"), ints(&[7]));
}

#[test]
fn frames_below_a_choice_point_are_not_reused() {
    let mut wam = machine();
    let (gauge, depth, _) = gauge(&mut wam, "gauge");

    let t = wam
        .register_table("t", 1, [[Value::Integer(1)], [Value::Integer(2)], [Value::Integer(3)]])
        .unwrap();

    // check(Y, X) :- gauge, Y > 1, X = Y.
    let check = wam
        .define_rule(
            "check",
            2,
            [ClauseBuilder::new(2)
                .head(var(0))
                .head(var(1))
                .call(gauge, [])
                .compare(BuiltinOp::Gt, Expr::var(0), 1)
                .unify(var(1), var(0))],
        )
        .unwrap();

    // pick(X) :- t(Y), check(Y, X).
    let pick = wam
        .define_rule(
            "pick",
            1,
            [ClauseBuilder::new(2)
                .head(var(0))
                .call(t, [var(1)])
                .last_call(check, [var(1), var(0)])],
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(pick, [var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "X"), ints(&[2, 3]));
    assert_eq!(depth.get(), 3);
}

#[test]
fn last_calls_to_several_clauses_keep_the_caller() {
    let mut wam = machine();
    let (gauge, depth, _) = gauge(&mut wam, "gauge");

    let either = wam
        .define_rule(
            "either",
            1,
            [
                ClauseBuilder::new(0).head(1).call(gauge, []),
                ClauseBuilder::new(0).head(2).call(gauge, []),
            ],
        )
        .unwrap();

    let via = wam
        .define_rule(
            "via",
            1,
            [ClauseBuilder::new(1).head(var(0)).last_call(either, [var(0)])],
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(via, [var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "X"), ints(&[1, 2]));
    assert_eq!(depth.get(), 3);
}
