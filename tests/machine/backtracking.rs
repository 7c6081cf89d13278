use crate::helper::*;

use logic_machine::*;

#[test]
fn constant_mismatch_retries_without_trailing() {
    let mut wam = machine();

    let p = wam
        .define_rule(
            "p",
            1,
            [
                ClauseBuilder::fact(0, [Arg::from(1)]),
                ClauseBuilder::fact(0, [Arg::Void]),
            ],
        )
        .unwrap();

    let q = wam
        .define_rule("q", 0, [ClauseBuilder::new(0).call(p, [Arg::from(2)])])
        .unwrap();

    assert!(wam.run(q).unwrap());
    assert_eq!(wam.trail_height(), 0);
    assert_eq!(wam.choice_point_count(), 0);
}

#[test]
fn retry_undoes_the_first_binding() {
    let mut wam = machine();

    let p = wam
        .define_rule(
            "p",
            1,
            [
                ClauseBuilder::fact(0, [Arg::from(1)]),
                ClauseBuilder::fact(0, [Arg::from(2)]),
            ],
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(p, [var(0)])
                .compare(BuiltinOp::Gt, Expr::var(0), 1)],
        )
        .unwrap();

    assert!(wam.run(q).unwrap());
    assert_eq!(wam.solution()["X"], Value::Integer(2));
    assert_eq!(wam.trail_height(), 1);
    assert_eq!(wam.choice_point_count(), 0);
}

#[test]
fn cut_commits_the_clause() {
    let mut wam = machine();
    let (gauge, _, choices) = gauge(&mut wam, "gauge");
    let t = wam.register_table("t", 1, [[Value::Integer(1)], [Value::Integer(2)], [Value::Integer(3)]]).unwrap();

    let first = wam
        .define_rule(
            "first",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(t, [var(0)])
                .cut()
                .call(gauge, [])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, first, "X"), ints(&[1]));
    assert_eq!(choices.get(), 0);
}

#[test]
fn cut_is_local_to_its_clause() {
    let mut wam = machine();
    let t = wam.register_table("t", 1, [[Value::Integer(1)], [Value::Integer(2)], [Value::Integer(3)]]).unwrap();

    let inner = wam
        .define_rule(
            "inner",
            0,
            [ClauseBuilder::new(0).cut(), ClauseBuilder::new(0)],
        )
        .unwrap();

    let outer = wam
        .define_rule(
            "outer",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(t, [var(0)])
                .call(inner, [])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, outer, "X"), ints(&[1, 2, 3]));
}

#[test]
fn clauses_are_tried_in_order() {
    let mut wam = machine();

    let p = wam
        .define_rule(
            "p",
            1,
            [3, 1, 2].map(|n| ClauseBuilder::fact(0, [Arg::from(n)])),
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1).name_var(0, "N").call(p, [var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "N"), ints(&[3, 1, 2]));
}

#[test]
fn failure_empties_every_stack() {
    let mut wam = machine();

    let p = wam
        .define_rule(
            "p",
            1,
            [ClauseBuilder::fact(0, [Arg::from(1)]), ClauseBuilder::fact(0, [Arg::from(2)])],
        )
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1).call(p, [var(0)]).unify(var(0), 3)],
        )
        .unwrap();

    assert!(!wam.run(q).unwrap());
    assert_eq!(wam.trail_height(), 0);
    assert_eq!(wam.env_depth(), 0);
    assert_eq!(wam.choice_point_count(), 0);
    assert_eq!(wam.data_height(), 0);
}

#[test]
fn not_unify_keeps_bindings_untouched() {
    let mut wam = machine();

    let q = wam
        .define_rule(
            "q",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .not_unify(var(0), 1)
                .unify(var(0), 2)],
        )
        .unwrap();

    // an unbound X unifies with 1, so the negation fails
    assert!(!wam.run(q).unwrap());

    let r = wam
        .define_rule(
            "r",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .unify(var(0), 2)
                .not_unify(var(0), 1)],
        )
        .unwrap();

    assert!(wam.run(r).unwrap());
    assert_eq!(wam.solution()["X"], Value::Integer(2));
}

#[test]
fn undefined_predicates_raise_existence_errors() {
    let mut wam = machine();
    let missing = wam.declare("missing", 2).unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(0).call(missing, [Arg::from(1), Arg::Void])],
        )
        .unwrap();

    let err = wam.run(q).unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorKind::UndefinedPredicate {
            name: "missing".into(),
            arity: 2
        }
    );
    assert_eq!(wam.env_depth(), 0);
}

#[test]
fn stack_overflow_is_a_resource_error() {
    let mut wam = machine_with(MachineBuilder::new().with_env_capacity(16));
    let deep = wam.declare("deep", 1).unwrap();

    wam.add_clause(
        deep,
        ClauseBuilder::new(1)
            .head(var(0))
            .call(deep, [Arg::from(Expr::var(0) + 1)]),
    )
    .unwrap();

    let q = wam
        .define_rule("q", 0, [ClauseBuilder::new(0).call(deep, [Arg::from(0)])])
        .unwrap();

    let err = wam.run(q).unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorKind::Resource {
            stack: StackKind::Environment,
            capacity: 16
        }
    );
    assert_eq!(err.stack_dump().unwrap().frames.len(), 16);
}

#[test]
fn thrown_errors_keep_their_message_and_location() {
    let mut wam = machine();
    let ball = wam.objects_mut().new_error("out of range");

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(0).throw(ball).at("limits.pl", 12)],
        )
        .unwrap();

    let err = wam.run(q).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Thrown("out of range".into()));

    let frame = &err.stack_dump().unwrap().frames[0];
    assert_eq!(frame.source.as_ref().map(|s| s.to_string()), Some("limits.pl:12".to_string()));
    assert!(err.to_string().contains("q/0 (limits.pl:12)"));
}
