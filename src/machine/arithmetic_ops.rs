use crate::atom_table::*;
use crate::instructions::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::*;
use crate::types::*;

use ordered_float::OrderedFloat;

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Number {
    Integer(i32),
    Float(OrderedFloat<f32>),
}

impl Number {
    #[inline]
    fn as_f32(self) -> f32 {
        match self {
            Number::Integer(n) => n as f32,
            Number::Float(OrderedFloat(f)) => f,
        }
    }

    #[inline]
    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(OrderedFloat(f)) => f as f64,
        }
    }

    #[inline]
    fn float(f: f32) -> Self {
        Number::Float(OrderedFloat(f))
    }
}

impl From<Number> for Value {
    #[inline]
    fn from(n: Number) -> Value {
        match n {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(f) => Value::Float(f),
        }
    }
}

fn int_op(
    lhs: Number,
    rhs: Number,
    int: impl FnOnce(i32, i32) -> Option<i32>,
    float: impl FnOnce(f32, f32) -> f32,
) -> Result<Number, EvalError> {
    match (lhs, rhs) {
        (Number::Integer(n1), Number::Integer(n2)) => {
            int(n1, n2).map(Number::Integer).ok_or(EvalError::IntOverflow)
        }
        (n1, n2) => Ok(Number::float(float(n1.as_f32(), n2.as_f32()))),
    }
}

pub(crate) fn add(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    int_op(lhs, rhs, i32::checked_add, |x, y| x + y)
}

pub(crate) fn sub(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    int_op(lhs, rhs, i32::checked_sub, |x, y| x - y)
}

pub(crate) fn mul(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    int_op(lhs, rhs, i32::checked_mul, |x, y| x * y)
}

/// Integer division truncates toward zero.
pub(crate) fn div(lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    if rhs.as_f32() == 0.0 {
        return Err(EvalError::ZeroDivisor);
    }

    int_op(lhs, rhs, i32::checked_div, |x, y| x / y)
}

/// The result takes the sign of the divisor.
pub(crate) fn modulus(lhs: i32, rhs: i32) -> Result<i32, EvalError> {
    if rhs == 0 {
        return Err(EvalError::ZeroDivisor);
    }

    let r = lhs.wrapping_rem(rhs);

    if r != 0 && (r < 0) != (rhs < 0) {
        Ok(r + rhs)
    } else {
        Ok(r)
    }
}

pub(crate) fn neg(n: Number) -> Result<Number, EvalError> {
    match n {
        Number::Integer(n) => n.checked_neg().map(Number::Integer).ok_or(EvalError::IntOverflow),
        Number::Float(f) => Ok(Number::float(-f.0)),
    }
}

pub(crate) fn abs(n: Number) -> Result<Number, EvalError> {
    match n {
        Number::Integer(n) => n.checked_abs().map(Number::Integer).ok_or(EvalError::IntOverflow),
        Number::Float(f) => Ok(Number::float(f.0.abs())),
    }
}

/// Numeric ordering across integers and floats.
pub(crate) fn compare(lhs: Number, rhs: Number) -> Ordering {
    match (lhs, rhs) {
        (Number::Integer(n1), Number::Integer(n2)) => n1.cmp(&n2),
        (n1, n2) => OrderedFloat(n1.as_f64()).cmp(&OrderedFloat(n2.as_f64())),
    }
}

pub(crate) fn min(lhs: Number, rhs: Number) -> Number {
    if compare(lhs, rhs) == Ordering::Greater {
        rhs
    } else {
        lhs
    }
}

pub(crate) fn max(lhs: Number, rhs: Number) -> Number {
    if compare(lhs, rhs) == Ordering::Less {
        rhs
    } else {
        lhs
    }
}

impl MachineState {
    pub(crate) fn number(&self, value: Value, operation: &str, arg: usize) -> MachineResult<Number> {
        match value {
            Value::Integer(n) => Ok(Number::Integer(n)),
            Value::Float(f) => Ok(Number::Float(f)),
            Value::Unbound | Value::ForwardTo(_) => Err(self.instantiation_error(operation, arg)),
            _ => Err(self.type_error(operation, arg, ValidType::Number, value)),
        }
    }

    fn integer(&self, value: Value, operation: &str, arg: usize) -> MachineResult<i32> {
        match value {
            Value::Integer(n) => Ok(n),
            Value::Unbound | Value::ForwardTo(_) => Err(self.instantiation_error(operation, arg)),
            _ => Err(self.type_error(operation, arg, ValidType::Integer, value)),
        }
    }

    fn length(&self, value: Value) -> MachineResult<i32> {
        let len = match value {
            Value::Reference(r) => match self.objects.get(r) {
                Some(Object::List(items)) => Some(items.len()),
                Some(Object::Str(text)) | Some(Object::Symbol(text)) => Some(text.chars().count()),
                _ => None,
            },
            Value::Unbound | Value::ForwardTo(_) => {
                return Err(self.instantiation_error("length", 1));
            }
            _ => None,
        };

        match len {
            Some(len) => i32::try_from(len)
                .map_err(|_| self.evaluation_error("length", EvalError::IntOverflow)),
            None => Err(self.type_error("length", 1, ValidType::List, value)),
        }
    }

    fn item(&self, list: Value, index: Value) -> MachineResult<Value> {
        let idx = self.integer(index, "item", 2)?;

        let items = match list {
            Value::Reference(r) => self.objects.list(r),
            Value::Unbound | Value::ForwardTo(_) => {
                return Err(self.instantiation_error("item", 1));
            }
            _ => None,
        };

        let items = items.ok_or_else(|| self.type_error("item", 1, ValidType::List, list))?;

        usize::try_from(idx)
            .ok()
            .and_then(|i| items.get(i).copied())
            .ok_or_else(|| {
                self.evaluation_error(
                    "item",
                    EvalError::IndexOutOfRange {
                        index: idx,
                        len: items.len(),
                    },
                )
            })
    }

    fn binary(&self, op: Opcode, lhs: Value, rhs: Value) -> MachineResult<Value> {
        let name = op.name();

        if op == Opcode::Item {
            return self.item(lhs, rhs);
        }

        if op == Opcode::Mod {
            let n1 = self.integer(lhs, name, 1)?;
            let n2 = self.integer(rhs, name, 2)?;

            return modulus(n1, n2)
                .map(Value::Integer)
                .map_err(|err| self.evaluation_error(name, err));
        }

        let n1 = self.number(lhs, name, 1)?;
        let n2 = self.number(rhs, name, 2)?;

        let result = match op {
            Opcode::Add => add(n1, n2),
            Opcode::Sub => sub(n1, n2),
            Opcode::Mul => mul(n1, n2),
            Opcode::Div => div(n1, n2),
            Opcode::Min => Ok(min(n1, n2)),
            _ => Ok(max(n1, n2)),
        };

        result
            .map(Value::from)
            .map_err(|err| self.evaluation_error(name, err))
    }

    fn unary(&self, op: Opcode, value: Value) -> MachineResult<Value> {
        let name = op.name();

        if op == Opcode::Length {
            return self.length(value).map(Value::Integer);
        }

        let n = self.number(value, name, 1)?;
        let result = if op == Opcode::Neg { neg(n) } else { abs(n) };

        result
            .map(Value::from)
            .map_err(|err| self.evaluation_error(name, err))
    }

    /// Evaluates the expression starting at `pc` against the frame at `base`,
    /// returning its value and the pc after its `RETURN`.
    ///
    /// Operands live in scratch cells above the data-stack top.
    pub(crate) fn eval_expr(
        &mut self,
        code: &[u8],
        mut pc: usize,
        base: Addr,
        pools: &ConstantPools,
    ) -> MachineResult<(Value, usize)> {
        let floor = self.data.top();
        let mut sp = floor;

        macro_rules! pop {
            () => {{
                debug_assert!(sp > floor);
                sp -= 1;
                self.data[sp]
            }};
        }

        loop {
            let op = fetch_opcode(code, pc)?;

            let pushed = match op {
                Opcode::PushSmallInt => Value::Integer(fetch(code, pc + 1)? as i8 as i32),
                Opcode::PushInt | Opcode::PushFloat | Opcode::PushObject => {
                    let idx = fetch(code, pc + 1)?;
                    let literal = match op {
                        Opcode::PushInt => Literal::Int(idx),
                        Opcode::PushFloat => Literal::Float(idx),
                        _ => Literal::Object(idx),
                    };

                    pools
                        .literal(literal)
                        .ok_or(ErrorKind::BadBytecode { pc: pc + 1, byte: idx })?
                }
                Opcode::Load => {
                    let slot = fetch(code, pc + 1)?;
                    self.data.value(base + slot as Addr)
                }
                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Min
                | Opcode::Max
                | Opcode::Item => {
                    if sp < floor + 2 {
                        return Err(ErrorKind::BadBytecode { pc, byte: op as u8 }.into());
                    }

                    let rhs = pop!();
                    let lhs = pop!();

                    self.binary(op, lhs, rhs)?
                }
                Opcode::Neg | Opcode::Abs | Opcode::Length => {
                    if sp == floor {
                        return Err(ErrorKind::BadBytecode { pc, byte: op as u8 }.into());
                    }

                    let value = pop!();
                    self.unary(op, value)?
                }
                Opcode::Return => {
                    if sp != floor + 1 {
                        return Err(ErrorKind::BadBytecode { pc, byte: op as u8 }.into());
                    }

                    let value = pop!();

                    if value.is_unbound() {
                        return Err(self.instantiation_error("return", 1));
                    }

                    return Ok((value, pc + 1));
                }
                _ => return Err(ErrorKind::BadBytecode { pc, byte: op as u8 }.into()),
            };

            self.data.write_scratch(sp, pushed)?;
            sp += 1;

            pc += match op {
                Opcode::PushSmallInt
                | Opcode::PushInt
                | Opcode::PushFloat
                | Opcode::PushObject
                | Opcode::Load => 2,
                _ => 1,
            };
        }
    }
}
