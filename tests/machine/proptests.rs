use crate::helper::*;

use logic_machine::*;

use proptest::prelude::*;

proptest! {
    #![proptest_config(
        if cfg!(miri) {
            ProptestConfig {
                failure_persistence: None,
                cases: 5,
                ..ProptestConfig::default()
            }
        } else {
            ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            }
        }
    )]

    // the environment stack stays flat however long the loop runs
    #[test]
    fn last_call_depth_is_bounded(n in 0i32..5_000) {
        let mut wam = machine_with(MachineBuilder::new().with_env_capacity(4));
        let (gauge, depth, _) = gauge(&mut wam, "gauge");
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

        let q = wam
            .define_rule("q", 0, [ClauseBuilder::new(0).call(count, [Arg::from(n)])])
            .unwrap();

        prop_assert!(!wam.run(q).unwrap());
        prop_assert!(depth.get() <= 2);
    }

    #[test]
    fn table_lookups_filter_in_insertion_order(
        rows in prop::collection::vec((-3i32..3, any::<i32>()), 0..40),
        key in -3i32..3,
    ) {
        let mut wam = machine();
        let t = wam
            .register_table(
                "t",
                2,
                rows.iter().map(|&(k, v)| [Value::Integer(k), Value::Integer(v)]),
            )
            .unwrap();

        let q = wam
            .define_rule(
                "q",
                0,
                [ClauseBuilder::new(1)
                    .name_var(0, "V")
                    .call(t, [Arg::from(key), var(0)])],
            )
            .unwrap();

        let expected: Vec<Value> = rows
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|&(_, v)| Value::Integer(v))
            .collect();

        prop_assert_eq!(column(&mut wam, q, "V"), expected);
    }

    // retries unwind every binding but the one that held
    #[test]
    fn a_solution_keeps_one_binding(n in 1i32..30, k in 0i32..40) {
        let mut wam = machine();

        let p = wam
            .define_rule(
                "p",
                1,
                (0..n).map(|i| ClauseBuilder::fact(0, [Arg::from(i)])),
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
                    .compare(BuiltinOp::Ge, Expr::var(0), k)],
            )
            .unwrap();

        if k < n {
            prop_assert!(wam.run(q).unwrap());
            prop_assert_eq!(wam.solution()["X"], Value::Integer(k));
            prop_assert_eq!(wam.trail_height(), 1);
            prop_assert_eq!(wam.choice_point_count(), usize::from(k < n - 1));
        } else {
            prop_assert!(!wam.run(q).unwrap());
            prop_assert_eq!(wam.trail_height(), 0);
        }
    }
}
