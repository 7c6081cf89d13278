use crate::atom_table::*;
use crate::instructions::*;
use crate::machine::arithmetic_ops::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::*;
use crate::machine::unify::*;
use crate::types::*;

use std::cmp::Ordering;

/// A goal argument reduced to something unifiable.
#[derive(Debug, Clone, Copy)]
enum Operand {
    Value(Value),
    Cell(Addr),
    Any,
}

impl MachineState {
    fn operand(&mut self, arg: GoalArg) -> Operand {
        match arg {
            GoalArg::Value(value) => Operand::Value(value),
            GoalArg::Fresh(addr) => {
                self.data[addr] = Value::Unbound;
                Operand::Cell(addr)
            }
            GoalArg::Var(addr) => Operand::Cell(addr),
            GoalArg::Void => Operand::Any,
        }
    }

    fn unify_operands(&mut self, lhs: Operand, rhs: Operand) -> MachineResult<bool> {
        match (lhs, rhs) {
            (Operand::Any, _) | (_, Operand::Any) => Ok(true),
            (Operand::Value(v1), Operand::Value(v2)) => Ok(v1 == v2),
            (Operand::Cell(a), Operand::Value(v)) | (Operand::Value(v), Operand::Cell(a)) => {
                self.unify_value(a, v)
            }
            (Operand::Cell(a1), Operand::Cell(a2)) => self.unify_addrs(a1, a2),
        }
    }

    /// Runs a `CALL_SPECIAL` whose arguments start at `args`, returning whether
    /// it succeeded and the pc after its arguments.
    pub(crate) fn call_special(
        &mut self,
        kind: Special,
        code: &[u8],
        args: usize,
        base: Addr,
        pools: &ConstantPools,
    ) -> MachineResult<(bool, usize)> {
        let (first, pc) = self.next_goal_arg(code, args, base, pools)?;
        let lhs = self.operand(first);

        match kind {
            Special::Unify | Special::NotUnify => {
                let (second, pc) = self.next_goal_arg(code, pc, base, pools)?;
                let rhs = self.operand(second);

                if kind == Special::Unify {
                    return Ok((self.unify_operands(lhs, rhs)?, pc));
                }

                let mark = self.trail.len();
                let unified = self.unify_operands(lhs, rhs)?;

                self.unwind_trail(mark);
                Ok((!unified, pc))
            }
            Special::Throw => {
                let ball = match lhs {
                    Operand::Value(value) => value,
                    Operand::Cell(addr) => self.data.value(addr),
                    Operand::Any => Value::Unbound,
                };

                match ball {
                    Value::Unbound => Err(self.instantiation_error("throw", 1)),
                    Value::Reference(r) => match self.objects.get(r) {
                        Some(Object::Error(message)) => {
                            Err(ErrorKind::Thrown(message.to_string()).into())
                        }
                        _ => Err(self.type_error("throw", 1, ValidType::Error, ball)),
                    },
                    _ => Err(self.type_error("throw", 1, ValidType::Error, ball)),
                }
            }
        }
    }

    fn type_test(&self, op: BuiltinOp, value: Value) -> bool {
        match op {
            BuiltinOp::IsVar => value.is_unbound(),
            BuiltinOp::IsNonVar => !value.is_unbound(),
            BuiltinOp::IsInteger => matches!(value, Value::Integer(_)),
            BuiltinOp::IsFloat => matches!(value, Value::Float(_)),
            BuiltinOp::IsNumber => value.is_number(),
            BuiltinOp::IsBoolean => matches!(value, Value::Boolean(_)),
            BuiltinOp::IsReference => matches!(value, Value::Reference(_)),
            BuiltinOp::IsSymbol => match value {
                Value::Reference(r) => self.objects.symbol_name(r).is_some(),
                _ => false,
            },
            _ => false,
        }
    }

    fn accumulate(&self, op: BuiltinOp, current: Value, value: Value) -> MachineResult<Value> {
        if current.is_unbound() {
            return Ok(value);
        }

        let name = op.name();
        let acc = self.number(current, name, 1)?;
        let n = self.number(value, name, 2)?;

        let result = match op {
            BuiltinOp::AccumulateMin => min(acc, n),
            BuiltinOp::AccumulateMax => max(acc, n),
            _ => add(acc, n).map_err(|err| self.evaluation_error(name, err))?,
        };

        Ok(result.into())
    }

    /// Runs a `BUILTIN` whose operands start at `operands`, returning whether
    /// it succeeded and the pc after its operands.
    pub(crate) fn execute_builtin(
        &mut self,
        op: BuiltinOp,
        code: &[u8],
        operands: usize,
        base: Addr,
        pools: &ConstantPools,
    ) -> MachineResult<(bool, usize)> {
        match op.shape() {
            BuiltinShape::Slot => {
                let addr = base + fetch(code, operands)? as Addr;
                let next = operands + 1;

                let succeeded = match op {
                    BuiltinOp::UnsafeInit => {
                        self.data[addr] = Value::Unbound;
                        true
                    }
                    BuiltinOp::CheckBound => {
                        if self.data.value(addr).is_unbound() {
                            return Err(self.instantiation_error(op.name(), 1));
                        }

                        true
                    }
                    _ => self.type_test(op, self.data.value(addr)),
                };

                Ok((succeeded, next))
            }
            BuiltinShape::TwoExprs => {
                let (lhs, pc) = self.eval_expr(code, operands, base, pools)?;
                let (rhs, pc) = self.eval_expr(code, pc, base, pools)?;

                let n1 = self.number(lhs, op.name(), 1)?;
                let n2 = self.number(rhs, op.name(), 2)?;
                let ordering = compare(n1, n2);

                let succeeded = match op {
                    BuiltinOp::Lt => ordering == Ordering::Less,
                    BuiltinOp::Le => ordering != Ordering::Greater,
                    BuiltinOp::Gt => ordering == Ordering::Greater,
                    BuiltinOp::Ge => ordering != Ordering::Less,
                    BuiltinOp::NumEq => ordering == Ordering::Equal,
                    _ => ordering != Ordering::Equal,
                };

                Ok((succeeded, pc))
            }
            BuiltinShape::SlotExpr => {
                let slot = fetch(code, operands)?;
                let (value, pc) = self.eval_expr(code, operands + 1, base, pools)?;
                let addr = base + slot as Addr;
                let current = self.data.value(addr);

                let value = match op {
                    BuiltinOp::UnsafeSet => value,
                    _ => self.accumulate(op, current, value)?,
                };

                // untrailed, so only the frame's own cell may change
                self.data[addr] = value;

                Ok((true, pc))
            }
        }
    }
}
