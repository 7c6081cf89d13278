use crate::instructions::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::*;
use crate::types::*;

/// A resolved head argument of the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeadArg {
    Value(Value),
    Void,
    /// First occurrence of the callee cell at the address.
    First(Addr),
    /// Repeat occurrence of the callee cell at the address.
    Match(Addr),
}

/// A resolved goal argument of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GoalArg {
    Value(Value),
    /// First occurrence of the caller cell at the address.
    Fresh(Addr),
    /// A bound or previously seen cell.
    Var(Addr),
    Void,
}

impl MachineState {
    /// Unifies two cells. Two unbound cells are aliased by forwarding the
    /// higher address to the lower one.
    pub(crate) fn unify_addrs(&mut self, a1: Addr, a2: Addr) -> MachineResult<bool> {
        let (r1, v1) = self.data.deref(a1);
        let (r2, v2) = self.data.deref(a2);

        if r1 == r2 {
            return Ok(true);
        }

        match (v1.is_unbound(), v2.is_unbound()) {
            (true, true) => {
                let (lo, hi) = if r1 < r2 { (r1, r2) } else { (r2, r1) };
                self.bind(hi, Value::ForwardTo(lo))?;
                Ok(true)
            }
            (true, false) => {
                self.bind(r1, v2)?;
                Ok(true)
            }
            (false, true) => {
                self.bind(r2, v1)?;
                Ok(true)
            }
            (false, false) => Ok(v1 == v2),
        }
    }

    /// Unifies a cell with a constant.
    pub(crate) fn unify_value(&mut self, addr: Addr, value: Value) -> MachineResult<bool> {
        debug_assert!(value.is_constant());

        let (rep, current) = self.data.deref(addr);

        if current.is_unbound() {
            self.bind(rep, value)?;
            Ok(true)
        } else {
            Ok(current == value)
        }
    }

    /// Makes the first-occurrence cell `fresh` an alias of the unbound cell
    /// `target`. Only a binding of `target` is trailed.
    pub(crate) fn alias_fresh(&mut self, fresh: Addr, target: Addr) -> MachineResult<()> {
        if fresh > target {
            self.data[fresh] = Value::ForwardTo(target);
        } else if fresh < target {
            self.data[fresh] = Value::Unbound;
            self.bind(target, Value::ForwardTo(fresh))?;
        } else {
            self.data[fresh] = Value::Unbound;
        }

        Ok(())
    }

    /// Initialises the first-occurrence cell `fresh` from the cell at `addr`,
    /// copying its value or aliasing it.
    fn copy_or_alias(&mut self, fresh: Addr, addr: Addr) -> MachineResult<()> {
        let (rep, value) = self.data.deref(addr);

        if value.is_unbound() {
            self.alias_fresh(fresh, rep)
        } else {
            self.data[fresh] = value;
            Ok(())
        }
    }

    /// Matches one head argument against one goal argument.
    pub(crate) fn match_arg(&mut self, head: HeadArg, goal: GoalArg) -> MachineResult<bool> {
        match (head, goal) {
            (HeadArg::Value(v1), GoalArg::Value(v2)) => Ok(v1 == v2),
            (HeadArg::Value(v), GoalArg::Fresh(g)) => {
                self.data[g] = v;
                Ok(true)
            }
            (HeadArg::Value(v), GoalArg::Var(g)) => self.unify_value(g, v),
            (HeadArg::First(h), GoalArg::Value(v)) => {
                self.data[h] = v;
                Ok(true)
            }
            (HeadArg::First(h), GoalArg::Fresh(g)) => {
                let (lo, hi) = if h < g { (h, g) } else { (g, h) };

                self.data[lo] = Value::Unbound;

                if hi != lo {
                    self.data[hi] = Value::ForwardTo(lo);
                }

                Ok(true)
            }
            (HeadArg::First(h), GoalArg::Var(g)) => {
                self.copy_or_alias(h, g)?;
                Ok(true)
            }
            (HeadArg::First(h), GoalArg::Void) | (HeadArg::Void, GoalArg::Fresh(h)) => {
                self.data[h] = Value::Unbound;
                Ok(true)
            }
            (HeadArg::Match(h), GoalArg::Value(v)) => self.unify_value(h, v),
            (HeadArg::Match(h), GoalArg::Fresh(g)) => {
                self.copy_or_alias(g, h)?;
                Ok(true)
            }
            (HeadArg::Match(h), GoalArg::Var(g)) => self.unify_addrs(h, g),
            (HeadArg::Value(_), GoalArg::Void)
            | (HeadArg::Match(_), GoalArg::Void)
            | (HeadArg::Void, GoalArg::Value(_))
            | (HeadArg::Void, GoalArg::Var(_))
            | (HeadArg::Void, GoalArg::Void) => Ok(true),
        }
    }

    fn literal(&self, pools: &ConstantPools, literal: Literal, pc: usize) -> MachineResult<Value> {
        pools.literal(literal).ok_or_else(|| {
            let byte = match literal {
                Literal::SmallInt(n) => n as u8,
                Literal::Int(idx) | Literal::Float(idx) | Literal::Object(idx) => idx,
            };

            ErrorKind::BadBytecode { pc, byte }.into()
        })
    }

    /// Resolves a head argument instruction of the frame at `base`, evaluating
    /// functional arguments.
    pub(crate) fn resolve_head(
        &mut self,
        instr: ArgInstr,
        code: &[u8],
        pc: usize,
        base: Addr,
        pools: &ConstantPools,
    ) -> MachineResult<HeadArg> {
        Ok(match instr {
            ArgInstr::Const(literal) => HeadArg::Value(self.literal(pools, literal, pc)?),
            ArgInstr::Void => HeadArg::Void,
            ArgInstr::FirstVar(slot) => HeadArg::First(base + slot as Addr),
            ArgInstr::MatchVar(slot) => HeadArg::Match(base + slot as Addr),
            ArgInstr::Functional(start) => HeadArg::Value(self.eval_expr(code, start, base, pools)?.0),
        })
    }

    /// Resolves a goal argument instruction of the frame at `base`.
    pub(crate) fn resolve_goal(
        &mut self,
        instr: ArgInstr,
        code: &[u8],
        pc: usize,
        base: Addr,
        pools: &ConstantPools,
    ) -> MachineResult<GoalArg> {
        Ok(match instr {
            ArgInstr::Const(literal) => GoalArg::Value(self.literal(pools, literal, pc)?),
            ArgInstr::Void => GoalArg::Void,
            ArgInstr::FirstVar(slot) => GoalArg::Fresh(base + slot as Addr),
            ArgInstr::MatchVar(slot) => GoalArg::Var(base + slot as Addr),
            ArgInstr::Functional(start) => GoalArg::Value(self.eval_expr(code, start, base, pools)?.0),
        })
    }

    /// Decodes and resolves the goal argument at `pc`, returning the pc after it.
    pub(crate) fn next_goal_arg(
        &mut self,
        code: &[u8],
        pc: usize,
        base: Addr,
        pools: &ConstantPools,
    ) -> MachineResult<(GoalArg, usize)> {
        let (instr, next) = decode_arg(code, pc, Side::Goal)?;
        let arg = self.resolve_goal(instr, code, pc, base, pools)?;

        Ok((arg, next))
    }

    /// Writes a goal argument into the argument cell `cell`: a value, or a
    /// forward to the caller's cell.
    pub(crate) fn materialise(&mut self, cell: Addr, arg: GoalArg) {
        self.data[cell] = match arg {
            GoalArg::Value(value) => value,
            GoalArg::Fresh(g) => {
                self.data[g] = Value::Unbound;
                Value::ForwardTo(g)
            }
            GoalArg::Var(g) => match self.data.deref(g) {
                (rep, Value::Unbound) => Value::ForwardTo(rep),
                (_, value) => value,
            },
            GoalArg::Void => Value::Unbound,
        };
    }
}
