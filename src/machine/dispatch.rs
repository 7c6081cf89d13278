use crate::instructions::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::*;
use crate::machine::stack::*;
use crate::machine::unify::*;
use crate::machine::Machine;
use crate::types::*;

use smallvec::SmallVec;
use tracing::{debug, error, trace};

use std::rc::Rc;

/// What the run loop does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Execute the instruction at `p` in frame `e`.
    Dispatch,
    /// The current clause reached `END`.
    Return,
    /// Resume the newest choice point.
    Fail,
    Halt(bool),
}

/// Where a call was made from. `frame` is `None` for the root query.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallSite {
    frame: Option<usize>,
    /// The pc of the `CALL` instruction.
    pc: usize,
    /// The pc after its arguments.
    resume: usize,
    /// Leading arguments dropped by indirect calls.
    shift: u8,
}

impl CallSite {
    const ROOT: CallSite = CallSite {
        frame: None,
        pc: 0,
        resume: 0,
        shift: 0,
    };
}

/// Where the arguments of a call come from.
#[derive(Debug, Clone, Copy)]
enum CallArgs {
    /// Goal argument instructions at the pc, in the caller's frame.
    Code(usize),
    /// Materialised cells starting at the address.
    Cells(Addr),
    /// Every argument is a fresh variable.
    Void,
}

/// What a call resolves to, detached from the program so the machine can be
/// borrowed mutably while it runs.
enum Callee {
    Clause { clause: Rc<CompiledClause>, more: bool },
    Exhausted,
    Table { arity: usize },
    Primitive { arity: usize, primitive: Primitive },
    Undefined { key: PredicateKey, locked: bool },
}

/// A goal argument of a tail call, resolved before its frame is reused.
#[derive(Debug, Clone, Copy)]
enum TailArg {
    Value(Value),
    /// An unbound cell below the reused frame.
    Var(Addr),
    /// An unbound cell inside the reused frame.
    Local(Addr),
    Void,
}

/// Where a cell of the reused frame ended up.
#[derive(Debug, Clone, Copy)]
enum Rehomed {
    Value(Value),
    Var(Addr),
}

fn unknown_predicate(pred: PredId) -> MachineError {
    ProgramError::UnknownPredicate(pred.0).into()
}

fn pools_of(program: &Program, pred: PredId) -> MachineResult<&ConstantPools> {
    program
        .get(pred)
        .map(|p| &p.pools)
        .ok_or_else(|| unknown_predicate(pred))
}

impl Machine {
    fn callee(&self, pred: PredId, candidate: u32) -> MachineResult<Callee> {
        let predicate = self.program.get(pred).ok_or_else(|| unknown_predicate(pred))?;
        let arity = predicate.key.arity;

        Ok(match &predicate.kind {
            PredicateKind::Rules(clauses) => match clauses.get(candidate as usize) {
                Some(clause) => Callee::Clause {
                    clause: clause.clone(),
                    more: (candidate as usize + 1) < clauses.len(),
                },
                None => Callee::Exhausted,
            },
            PredicateKind::Table(_) => Callee::Table { arity },
            PredicateKind::Primitive(primitive) => Callee::Primitive {
                arity,
                primitive: primitive.clone(),
            },
            PredicateKind::Undefined => Callee::Undefined {
                key: predicate.key.clone(),
                locked: predicate.locked,
            },
        })
    }

    pub(crate) fn execute(&mut self, mut phase: Phase) -> MachineResult<bool> {
        loop {
            phase = match phase {
                Phase::Dispatch => self.dispatch_goal()?,
                Phase::Return => self.proceed()?,
                Phase::Fail => self.backtrack()?,
                Phase::Halt(succeeded) => return Ok(succeeded),
            };
        }
    }

    fn dispatch_goal(&mut self) -> MachineResult<Phase> {
        let Machine {
            machine_st,
            program,
            ..
        } = self;

        let e = machine_st.e;
        let p = machine_st.p;
        let frame = &machine_st.env[e];
        let clause = frame.clause.clone();
        let base = frame.base;
        let pred = frame.predicate;
        let choice_top = frame.choice_top;

        match decode_goal(&clause.code, p)? {
            GoalInstr::Call { pred: callee, tail, args } => self.call_goal(callee, tail, args),
            GoalInstr::Cut => {
                machine_st.cut(choice_top);
                machine_st.p = p + 1;
                Ok(Phase::Dispatch)
            }
            GoalInstr::End => Ok(Phase::Return),
            GoalInstr::Fail => Ok(Phase::Fail),
            GoalInstr::Special { kind, args } => {
                let pools = pools_of(program, pred)?;
                let (succeeded, next) = machine_st.call_special(kind, &clause.code, args, base, pools)?;

                machine_st.p = next;
                Ok(if succeeded { Phase::Dispatch } else { Phase::Fail })
            }
            GoalInstr::Builtin { op, operands } => {
                let pools = pools_of(program, pred)?;
                let (succeeded, next) =
                    machine_st.execute_builtin(op, &clause.code, operands, base, pools)?;

                machine_st.p = next;
                Ok(if succeeded { Phase::Dispatch } else { Phase::Fail })
            }
        }
    }

    fn call_goal(&mut self, callee: PredId, tail: bool, args: usize) -> MachineResult<Phase> {
        let e = self.machine_st.e;
        let p = self.machine_st.p;
        let clause = self.machine_st.env[e].clause.clone();
        let arity = self.program.arity(callee).ok_or_else(|| unknown_predicate(callee))?;
        let resume = skip_args(&clause.code, args, arity, Side::Goal)?;

        trace!(
            target: "logic_machine::call",
            callee = %self.program.name_of(callee),
            frame = e,
            tail,
            "call"
        );

        if tail && self.can_reuse_frame(callee) {
            return self.tail_call(callee, args);
        }

        let site = CallSite {
            frame: Some(e),
            pc: p,
            resume,
            shift: 0,
        };

        let marks = self.machine_st.marks();
        self.invoke(callee, site, CallArgs::Code(args), 0, marks)
    }

    fn invoke(
        &mut self,
        pred: PredId,
        site: CallSite,
        args: CallArgs,
        candidate: u32,
        marks: Marks,
    ) -> MachineResult<Phase> {
        match self.callee(pred, candidate)? {
            Callee::Clause { clause, more } => {
                self.try_clause(pred, clause, more, site, args, candidate, marks)
            }
            Callee::Exhausted => Ok(Phase::Fail),
            Callee::Table { arity } => {
                let cells = self.argument_cells(arity, site, args)?;
                self.call_table(pred, site, cells, candidate, marks)
            }
            Callee::Primitive { arity, primitive } => {
                let cells = self.argument_cells(arity, site, args)?;
                self.call_primitive(pred, primitive, site, cells, candidate, marks)
            }
            Callee::Undefined { key, locked } => {
                if locked {
                    Ok(Phase::Fail)
                } else {
                    Err(ErrorKind::UndefinedPredicate {
                        name: key.name.to_string(),
                        arity: key.arity,
                    }
                    .into())
                }
            }
        }
    }

    fn argument_cells(&mut self, arity: usize, site: CallSite, args: CallArgs) -> MachineResult<Addr> {
        match (args, site.frame) {
            (CallArgs::Cells(cells), _) => Ok(cells),
            (CallArgs::Code(pc), Some(frame)) => self.materialise_goal_args(frame, pc, arity),
            _ => self.machine_st.data.alloc(arity),
        }
    }

    /// Writes the goal arguments at `pc` of `frame` into fresh cells.
    fn materialise_goal_args(&mut self, frame: usize, pc: usize, arity: usize) -> MachineResult<Addr> {
        let Machine {
            machine_st,
            program,
            ..
        } = self;

        let caller = &machine_st.env[frame];
        let clause = caller.clause.clone();
        let caller_base = caller.base;
        let pools = pools_of(program, caller.predicate)?;

        let cells = machine_st.data.alloc(arity)?;
        let mut pc = pc;

        for i in 0..arity {
            let (arg, next) = machine_st.next_goal_arg(&clause.code, pc, caller_base, pools)?;
            machine_st.materialise(cells + i as Addr, arg);
            pc = next;
        }

        Ok(cells)
    }

    fn push_choice_point(
        &mut self,
        callee: PredId,
        site: CallSite,
        next: u32,
        marks: Marks,
    ) -> MachineResult<()> {
        self.machine_st.choices.push(ChoicePoint {
            frame: site.frame,
            pc: site.pc,
            callee,
            shift: site.shift,
            next,
            data_top: marks.data_top,
            trail_top: marks.trail_top,
            undo_top: marks.undo_top,
            env_top: marks.env_top,
        })
    }

    fn resume_at(&mut self, site: CallSite) -> Phase {
        match site.frame {
            Some(frame) => {
                self.machine_st.e = frame;
                self.machine_st.p = site.resume;
                Phase::Dispatch
            }
            None => Phase::Halt(true),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_clause(
        &mut self,
        pred: PredId,
        clause: Rc<CompiledClause>,
        more: bool,
        site: CallSite,
        args: CallArgs,
        candidate: u32,
        marks: Marks,
    ) -> MachineResult<Phase> {
        if more {
            self.push_choice_point(pred, site, candidate + 1, marks)?;
        }

        let base = self.machine_st.data.alloc(clause.env_size as usize)?;

        self.machine_st.env.push(Frame {
            predicate: pred,
            clause,
            base,
            continuation: site.frame.map(|frame| Continuation {
                frame,
                pc: site.resume,
            }),
            choice_top: marks.choice_top,
        })?;

        let e = self.machine_st.env.len() - 1;

        match self.match_head(e, site, args)? {
            Some(body) => {
                self.machine_st.e = e;
                self.machine_st.p = body;
                Ok(Phase::Dispatch)
            }
            None => Ok(Phase::Fail),
        }
    }

    /// Matches the head of frame `e` against the call's arguments, returning
    /// the pc of the clause body on success.
    fn match_head(&mut self, e: usize, site: CallSite, args: CallArgs) -> MachineResult<Option<usize>> {
        let Machine {
            machine_st,
            program,
            ..
        } = self;

        let frame = &machine_st.env[e];
        let clause = frame.clause.clone();
        let base = frame.base;
        let pools = pools_of(program, frame.predicate)?;

        let caller = match (args, site.frame) {
            (CallArgs::Code(_), Some(f)) => {
                let caller = &machine_st.env[f];
                Some((caller.clause.clone(), caller.base, pools_of(program, caller.predicate)?))
            }
            _ => None,
        };

        let mut head_pc = 0;
        let mut goal_pc = match args {
            CallArgs::Code(pc) => pc,
            _ => 0,
        };

        for i in 0..clause.arity {
            machine_st.head_progress = Some(HeadProgress { frame: e, matched: i });

            let (instr, next) = decode_arg(&clause.code, head_pc, Side::Head)?;
            let head = machine_st.resolve_head(instr, &clause.code, head_pc, base, pools)?;
            head_pc = next;

            let goal = match (args, &caller) {
                (CallArgs::Code(_), Some((code, caller_base, caller_pools))) => {
                    let (goal, next) =
                        machine_st.next_goal_arg(&code.code, goal_pc, *caller_base, caller_pools)?;
                    goal_pc = next;
                    goal
                }
                (CallArgs::Cells(cells), _) => GoalArg::Var(cells + i as Addr),
                _ => GoalArg::Void,
            };

            if !machine_st.match_arg(head, goal)? {
                machine_st.head_progress = None;
                return Ok(None);
            }
        }

        machine_st.head_progress = None;
        Ok(Some(head_pc))
    }

    fn call_table(
        &mut self,
        pred: PredId,
        site: CallSite,
        cells: Addr,
        cursor: u32,
        marks: Marks,
    ) -> MachineResult<Phase> {
        let Machine {
            machine_st,
            program,
            ..
        } = self;

        let table = match program.get(pred).map(|p| &p.kind) {
            Some(PredicateKind::Table(table)) => table,
            _ => return Err(unknown_predicate(pred)),
        };

        let mut found = None;
        let mut next = table.next_live(cursor as usize);

        while let Some(idx) = next {
            let mark = machine_st.trail.len();
            let mut matched = true;

            for (col, &value) in table.row(idx).unwrap_or(&[]).iter().enumerate() {
                if !machine_st.unify_value(cells + col as Addr, value)? {
                    matched = false;
                    break;
                }
            }

            next = table.next_live(idx + 1);

            if matched {
                found = Some((idx, next.is_some()));
                break;
            }

            machine_st.unwind_trail(mark);
        }

        trace!(
            target: "logic_machine::call",
            table = %program.name_of(pred),
            cursor,
            row = ?found.map(|(idx, _)| idx),
            "table scan"
        );

        match found {
            Some((idx, more)) => {
                if more {
                    self.push_choice_point(pred, site, idx as u32 + 1, marks)?;
                }

                self.machine_st.data.truncate(marks.data_top);
                Ok(self.resume_at(site))
            }
            None => Ok(Phase::Fail),
        }
    }

    fn call_primitive(
        &mut self,
        pred: PredId,
        primitive: Primitive,
        site: CallSite,
        cells: Addr,
        counter: u32,
        marks: Marks,
    ) -> MachineResult<Phase> {
        let key = self
            .program
            .get(pred)
            .map(|p| p.key.clone())
            .ok_or_else(|| unknown_predicate(pred))?;

        let flags = primitive.flags;

        if flags.mandatory_instantiation {
            for i in 0..key.arity {
                if self.machine_st.data.value(cells + i as Addr).is_unbound() {
                    return Err(self.machine_st.instantiation_error(&key.to_string(), i + 1));
                }
            }
        }

        let temps = self.machine_st.data.alloc(flags.temp_vars as usize)?;

        let args = PrimitiveArgs {
            base: cells,
            arity: key.arity,
            temps,
            temp_count: flags.temp_vars as usize,
        };

        let result = (primitive.callback)(self, args, counter)?;

        trace!(
            target: "logic_machine::call",
            primitive = %key,
            counter,
            result = result.name(),
            "primitive returned"
        );

        let violates = match (flags.determinism, result) {
            (Determinism::NonDeterministic, _) => false,
            (_, PrimitiveResult::NonDeterministicSuccess) => true,
            (Determinism::Deterministic, PrimitiveResult::Fail) => true,
            _ => false,
        };

        if violates {
            return Err(ErrorKind::Determinism {
                name: key.name.to_string(),
                arity: key.arity,
                result: result.name(),
            }
            .into());
        }

        match result {
            PrimitiveResult::Fail => Ok(Phase::Fail),
            PrimitiveResult::DeterministicSuccess => {
                self.machine_st.data.truncate(marks.data_top);
                Ok(self.resume_at(site))
            }
            PrimitiveResult::NonDeterministicSuccess => {
                self.push_choice_point(pred, site, counter + 1, marks)?;
                self.machine_st.data.truncate(marks.data_top);
                Ok(self.resume_at(site))
            }
            PrimitiveResult::CallIndirect { target, skip } => {
                let target_arity = self.program.arity(target).ok_or_else(|| unknown_predicate(target))?;

                if skip as usize > key.arity || key.arity - skip as usize != target_arity {
                    return Err(ProgramError::ArityMismatch {
                        what: format!("indirect call from {} to {}", key, self.program.name_of(target)),
                        expected: key.arity.saturating_sub(skip as usize),
                        found: target_arity,
                    }
                    .into());
                }

                self.machine_st.data.truncate(temps);

                let site = CallSite {
                    shift: site.shift.saturating_add(skip),
                    ..site
                };

                self.invoke(target, site, CallArgs::Cells(cells + skip as Addr), 0, marks)
            }
        }
    }

    /// A last call may reuse the caller's frame when nothing can return to
    /// it and the callee has a single clause.
    fn can_reuse_frame(&self, callee: PredId) -> bool {
        let st = &self.machine_st;
        let e = st.e;

        let single_clause = matches!(
            self.program.get(callee).map(|p| &p.kind),
            Some(PredicateKind::Rules(clauses)) if clauses.len() == 1
        );

        single_clause
            && e + 1 == st.env.len()
            && st.env[e].continuation.is_some()
            && st.frame_unprotected(e)
    }

    /// Runs a last call in the current frame. Arguments are resolved first,
    /// then the frame's cells are reinitialised for the callee's clause.
    fn tail_call(&mut self, callee: PredId, args: usize) -> MachineResult<Phase> {
        let Machine {
            machine_st,
            program,
            ..
        } = self;

        let e = machine_st.e;
        let frame = &machine_st.env[e];
        let caller = frame.clause.clone();
        let base = frame.base;
        let caller_pools = pools_of(program, frame.predicate)?;

        let clause = match program.get(callee).map(|p| &p.kind) {
            Some(PredicateKind::Rules(clauses)) if clauses.len() == 1 => clauses[0].clone(),
            _ => return Err(unknown_predicate(callee)),
        };

        let callee_pools = pools_of(program, callee)?;

        let mut resolved: SmallVec<[TailArg; 8]> = SmallVec::new();
        let mut pc = args;

        for _ in 0..clause.arity {
            let (arg, next) = machine_st.next_goal_arg(&caller.code, pc, base, caller_pools)?;
            pc = next;

            resolved.push(match arg {
                GoalArg::Value(value) => TailArg::Value(value),
                GoalArg::Void => TailArg::Void,
                GoalArg::Fresh(addr) => {
                    machine_st.data[addr] = Value::Unbound;
                    TailArg::Local(addr)
                }
                GoalArg::Var(addr) => match machine_st.data.deref(addr) {
                    (rep, Value::Unbound) if rep < base => TailArg::Var(rep),
                    (rep, Value::Unbound) => TailArg::Local(rep),
                    (_, value) => TailArg::Value(value),
                },
            });
        }

        if let Some(frame) = machine_st.env.get_mut(e) {
            frame.predicate = callee;
            frame.clause = clause.clone();
            frame.choice_top = machine_st.choices.len();
        }

        machine_st.data.truncate(base);
        machine_st.data.alloc(clause.env_size as usize)?;

        let mut locals: SmallVec<[(Addr, Rehomed); 8]> = SmallVec::new();
        let mut head_pc = 0;

        for (i, &arg) in resolved.iter().enumerate() {
            machine_st.head_progress = Some(HeadProgress { frame: e, matched: i });

            let (instr, next) = decode_arg(&clause.code, head_pc, Side::Head)?;
            let head = machine_st.resolve_head(instr, &clause.code, head_pc, base, callee_pools)?;
            head_pc = next;

            let goal = match arg {
                TailArg::Value(value) => GoalArg::Value(value),
                TailArg::Var(addr) => GoalArg::Var(addr),
                TailArg::Void => GoalArg::Void,
                TailArg::Local(old) => match locals.iter().find(|(addr, _)| *addr == old) {
                    Some((_, Rehomed::Value(value))) => GoalArg::Value(*value),
                    Some((_, Rehomed::Var(addr))) => GoalArg::Var(*addr),
                    None => {
                        match head {
                            HeadArg::First(h) => {
                                machine_st.data[h] = Value::Unbound;
                                locals.push((old, Rehomed::Var(h)));
                            }
                            HeadArg::Match(h) => locals.push((old, Rehomed::Var(h))),
                            HeadArg::Value(value) => locals.push((old, Rehomed::Value(value))),
                            HeadArg::Void => {}
                        }

                        continue;
                    }
                },
            };

            if !machine_st.match_arg(head, goal)? {
                machine_st.head_progress = None;
                return Ok(Phase::Fail);
            }
        }

        machine_st.head_progress = None;
        machine_st.p = head_pc;

        trace!(
            target: "logic_machine::tail_call",
            callee = %program.name_of(callee),
            frame = e,
            "reused frame"
        );

        Ok(Phase::Dispatch)
    }

    /// Returns from the current clause to the nearest continuation that still
    /// has work, popping frames nothing else refers to.
    fn proceed(&mut self) -> MachineResult<Phase> {
        let st = &mut self.machine_st;

        loop {
            let e = st.e;
            let frame = &st.env[e];
            let continuation = frame.continuation;
            let base = frame.base;

            if continuation.is_some() && e + 1 == st.env.len() && st.frame_unprotected(e) {
                st.env.pop();
                st.data.truncate(base);
            }

            match continuation {
                None => return Ok(Phase::Halt(true)),
                Some(Continuation { frame, pc }) => {
                    st.e = frame;

                    if st.env[frame].clause.code.get(pc) == Some(&(Opcode::End as u8)) {
                        continue;
                    }

                    st.p = pc;
                    return Ok(Phase::Dispatch);
                }
            }
        }
    }

    fn backtrack(&mut self) -> MachineResult<Phase> {
        let cp = match self.machine_st.choices.pop() {
            Some(cp) => cp,
            None => return Ok(Phase::Halt(false)),
        };

        self.machine_st.restore(&cp);
        self.machine_st.head_progress = None;

        trace!(
            target: "logic_machine::backtrack",
            callee = %self.program.name_of(cp.callee),
            next = cp.next,
            choice_points = self.machine_st.choices.len(),
            "retry"
        );

        let marks = Marks {
            data_top: cp.data_top,
            trail_top: cp.trail_top,
            undo_top: cp.undo_top,
            env_top: cp.env_top,
            choice_top: self.machine_st.choices.len(),
        };

        let frame = match cp.frame {
            Some(frame) => frame,
            None => return self.invoke(cp.callee, CallSite::ROOT, CallArgs::Void, cp.next, marks),
        };

        self.machine_st.e = frame;
        self.machine_st.p = cp.pc;

        let clause = self.machine_st.env[frame].clause.clone();

        let (pred, args) = match decode_goal(&clause.code, cp.pc)? {
            GoalInstr::Call { pred, args, .. } => (pred, args),
            _ => {
                return Err(ErrorKind::BadBytecode {
                    pc: cp.pc,
                    byte: clause.code.get(cp.pc).copied().unwrap_or(0),
                }
                .into())
            }
        };

        let arity = self.program.arity(pred).ok_or_else(|| unknown_predicate(pred))?;

        let site = CallSite {
            frame: Some(frame),
            pc: cp.pc,
            resume: skip_args(&clause.code, args, arity, Side::Goal)?,
            shift: cp.shift,
        };

        if cp.shift == 0 && pred == cp.callee {
            self.invoke(pred, site, CallArgs::Code(args), cp.next, marks)
        } else {
            // an indirect call: rebuild the original arguments and drop the
            // ones consumed on the way to the callee
            let cells = self.materialise_goal_args(frame, args, arity)?;
            let args = CallArgs::Cells(cells + cp.shift as Addr);

            self.invoke(cp.callee, site, args, cp.next, marks)
        }
    }

    fn enter_root(&mut self, pred: PredId) -> MachineResult<Phase> {
        let marks = self.machine_st.marks();

        let arity = match self.callee(pred, 0)? {
            Callee::Table { arity } | Callee::Primitive { arity, .. } => arity,
            _ => return self.invoke(pred, CallSite::ROOT, CallArgs::Void, 0, marks),
        };

        let clause = Rc::new(CompiledClause::bootstrap(pred, arity));
        let base = self.machine_st.data.alloc(arity)?;

        self.machine_st.env.push(Frame {
            predicate: pred,
            clause,
            base,
            continuation: None,
            choice_top: 0,
        })?;

        self.machine_st.e = 0;
        self.machine_st.p = 0;

        Ok(Phase::Dispatch)
    }

    /// Runs `pred` as a query whose arguments are all fresh variables.
    ///
    /// Returns `Ok(true)` when a solution was found. The machine then keeps
    /// its state so that [`Machine::bindings`] can read the answer and
    /// [`Machine::next_solution`] can resume. On failure or error every
    /// stack is emptied and backtrackable effects are reverted.
    pub fn run(&mut self, pred: PredId) -> MachineResult<bool> {
        if self.machine_st.running {
            return Err(ErrorKind::Reentrant.into());
        }

        self.machine_st.reset();
        self.root = None;

        debug!(
            target: "logic_machine::run",
            predicate = %self.program.name_of(pred),
            "run"
        );

        self.machine_st.running = true;
        let result = self.enter_root(pred).and_then(|phase| self.execute(phase));
        self.machine_st.running = false;

        self.conclude(pred, result)
    }

    /// Resumes the last successful run for its next solution.
    pub fn next_solution(&mut self) -> MachineResult<bool> {
        if self.machine_st.running {
            return Err(ErrorKind::Reentrant.into());
        }

        let pred = match self.root {
            Some(pred) => pred,
            None => return Ok(false),
        };

        self.machine_st.running = true;
        let result = self.execute(Phase::Fail);
        self.machine_st.running = false;

        self.conclude(pred, result)
    }

    fn conclude(&mut self, pred: PredId, result: MachineResult<bool>) -> MachineResult<bool> {
        match result {
            Ok(true) => {
                self.root = Some(pred);

                debug!(
                    target: "logic_machine::run",
                    predicate = %self.program.name_of(pred),
                    choice_points = self.machine_st.choices.len(),
                    "solution"
                );

                Ok(true)
            }
            Ok(false) => {
                self.root = None;
                self.machine_st.reset();

                debug!(
                    target: "logic_machine::run",
                    predicate = %self.program.name_of(pred),
                    "no more solutions"
                );

                Ok(false)
            }
            Err(err) => {
                let err = if err.has_dump() {
                    err
                } else {
                    err.with_dump(self.stack_dump())
                };

                error!(target: "logic_machine::run", "{}", err);

                self.root = None;
                self.machine_st.reset();

                Err(err)
            }
        }
    }
}
