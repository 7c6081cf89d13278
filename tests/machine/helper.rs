use logic_machine::*;

use tracing_subscriber::EnvFilter;

use std::cell::Cell;
use std::rc::Rc;

/// Routes the machine's tracing output through the test harness. Set
/// `RUST_LOG=logic_machine::backtrack=trace` to watch retries.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn machine() -> Machine {
    init_tracing();
    Machine::new()
}

pub fn machine_with(builder: MachineBuilder) -> Machine {
    init_tracing();
    builder.build()
}

pub fn ints(ns: &[i32]) -> Vec<Value> {
    ns.iter().copied().map(Value::Integer).collect()
}

pub fn solutions(wam: &mut Machine, pred: PredId) -> Vec<Bindings> {
    wam.query(pred).map(|answer| answer.unwrap()).collect()
}

/// The values `name` takes across every solution.
pub fn column(wam: &mut Machine, pred: PredId, name: &str) -> Vec<Value> {
    solutions(wam, pred)
        .into_iter()
        .map(|answer| answer[name])
        .collect()
}

/// A deterministic primitive `name/0` that records the deepest environment
/// stack and the most choice points it has seen.
pub fn gauge(wam: &mut Machine, name: &str) -> (PredId, Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let depth = Rc::new(Cell::new(0));
    let choices = Rc::new(Cell::new(0));

    let (d, c) = (depth.clone(), choices.clone());

    let pred = wam
        .register_primitive(
            name,
            0,
            PrimitiveFlags {
                determinism: Determinism::Deterministic,
                ..PrimitiveFlags::default()
            },
            move |wam, _, _| {
                d.set(d.get().max(wam.env_depth()));
                c.set(c.get().max(wam.choice_point_count()));
                Ok(PrimitiveResult::DeterministicSuccess)
            },
        )
        .unwrap();

    (pred, depth, choices)
}
