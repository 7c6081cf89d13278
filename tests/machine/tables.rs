use crate::helper::*;

use logic_machine::*;

fn pairs(rows: &[(i32, i32)]) -> Vec<[Value; 2]> {
    rows.iter()
        .map(|&(k, v)| [Value::Integer(k), Value::Integer(v)])
        .collect()
}

#[test]
fn bound_columns_filter_rows_in_order() {
    let mut wam = machine();
    let edge = wam
        .register_table("edge", 2, pairs(&[(1, 2), (2, 3), (1, 4), (3, 1), (1, 2)]))
        .unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1)
                .name_var(0, "Y")
                .call(edge, [Arg::from(1), var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "Y"), ints(&[2, 4, 2]));
}

#[test]
fn partial_row_matches_leave_no_bindings() {
    let mut wam = machine();
    let pair = wam.register_table("pair", 2, pairs(&[(1, 10), (2, 20)])).unwrap();

    let q = wam
        .define_rule(
            "q",
            0,
            [ClauseBuilder::new(1)
                .call(pair, [var(0), Arg::from(30)])],
        )
        .unwrap();

    assert!(!wam.run(q).unwrap());
    assert_eq!(wam.trail_height(), 0);
}

#[test]
fn the_last_matching_row_leaves_no_choice_point() {
    let mut wam = machine();
    let t = wam.register_table("t", 1, [[Value::Integer(1)], [Value::Integer(2)]]).unwrap();

    let q = wam
        .define_rule("q", 0, [ClauseBuilder::new(0).call(t, [Arg::from(2)])])
        .unwrap();

    assert!(wam.run(q).unwrap());
    assert_eq!(wam.choice_point_count(), 0);

    let r = wam
        .define_rule("r", 0, [ClauseBuilder::new(0).call(t, [Arg::from(1)])])
        .unwrap();

    // row 2 is still live, so the scan may resume
    assert!(wam.run(r).unwrap());
    assert_eq!(wam.choice_point_count(), 1);
    assert!(!wam.next_solution().unwrap());
}

#[test]
fn retracting_during_a_scan_keeps_the_cursor_valid() {
    let mut wam = machine();
    let retract = wam.lookup("retract", 2).unwrap();
    let t = wam
        .register_table("t", 1, [[Value::Integer(1)], [Value::Integer(2)], [Value::Integer(3)]])
        .unwrap();
    let name = wam.intern("t");

    let q = wam
        .define_rule(
            "q",
            1,
            [ClauseBuilder::new(1)
                .head(var(0))
                .name_var(0, "X")
                .call(t, [var(0)])
                .call(retract, [Arg::from(name), var(0)])],
        )
        .unwrap();

    assert_eq!(column(&mut wam, q, "X"), ints(&[1, 2, 3]));
    assert!(!wam.run(t).unwrap());
}

#[test]
fn updated_rows_keep_their_position() {
    let mut wam = machine();
    let t = wam
        .register_table("t", 1, [[Value::Integer(1)], [Value::Integer(2)], [Value::Integer(3)]])
        .unwrap();

    assert!(wam.update_row(t, &ints(&[2]), &ints(&[20])).unwrap());
    assert!(!wam.update_row(t, &ints(&[2]), &ints(&[21])).unwrap());

    assert_eq!(column(&mut wam, t, "_0"), ints(&[1, 20, 3]));
}

#[test]
fn rows_must_be_constant_and_well_sized() {
    let mut wam = machine();

    let err = wam.register_table("bad", 2, [[Value::Integer(1)]]).unwrap_err();
    assert!(matches!(err, ProgramError::ArityMismatch { expected: 2, found: 1, .. }));

    let t = wam.register_table("t", 1, Vec::<[Value; 1]>::new()).unwrap();
    assert!(matches!(
        wam.assert_row(t, &[Value::Unbound]),
        Err(ProgramError::NonConstant(_))
    ));
}

#[test]
fn the_widest_table_runs_as_a_query() {
    let mut wam = machine();

    let err = wam
        .register_table("wide", MAX_ARITY + 1, Vec::<Vec<Value>>::new())
        .unwrap_err();
    assert!(matches!(err, ProgramError::ArityTooLarge { arity: 256, .. }));
    assert_eq!(wam.lookup("wide", MAX_ARITY + 1), None);

    let row: Vec<Value> = (0..MAX_ARITY as i32).map(Value::Integer).collect();
    let widest = wam.register_table("widest", MAX_ARITY, [row]).unwrap();

    assert!(wam.run(widest).unwrap());
    assert_eq!(wam.solution()["_0"], Value::Integer(0));
    assert_eq!(wam.solution()["_254"], Value::Integer(254));
}

#[test]
fn locked_tables_refuse_edits() {
    let mut wam = machine();
    let t = wam.register_table("t", 1, [[Value::Integer(1)]]).unwrap();

    wam.lock(t).unwrap();

    assert_eq!(
        wam.assert_row(t, &ints(&[2])),
        Err(ProgramError::Locked {
            name: "t".into(),
            arity: 1
        })
    );
    assert!(wam.run(t).unwrap());
}

#[test]
fn assert_from_a_rule_creates_the_table() {
    let mut wam = machine();
    let assert3 = wam.lookup("assert", 3).unwrap();
    let between = wam.lookup("between", 3).unwrap();
    let squares = wam.intern("square");

    let fill = wam
        .define_rule(
            "fill",
            0,
            [ClauseBuilder::new(1)
                .call(between, [Arg::from(1), Arg::from(4), var(0)])
                .call(assert3, [Arg::from(squares), var(0), Arg::from(Expr::var(0) * Expr::var(0))])
                .fail()],
        )
        .unwrap();

    assert!(!wam.run(fill).unwrap());

    let square = wam.lookup("square", 2).unwrap();
    assert_eq!(column(&mut wam, square, "_1"), ints(&[1, 4, 9, 16]));
}
