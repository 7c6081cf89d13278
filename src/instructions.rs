//! The clause bytecode.
//!
//! A clause is `arity` head argument instructions followed by goals and a
//! terminating `END`. Argument instructions come in a head and a goal
//! variant; the goal variant of an opcode is the head variant plus
//! [`GOAL_STRIDE`].

use crate::machine::code_repo::PredId;
use crate::machine::machine_errors::*;

use std::fmt;

pub const GOAL_STRIDE: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    HeadSmallInt = 0,
    HeadInt = 1,
    HeadFloat = 2,
    HeadObject = 3,
    HeadVoid = 4,
    HeadFirstVar = 5,
    HeadMatchVar = 6,
    HeadFunctional = 7,

    GoalSmallInt = 16,
    GoalInt = 17,
    GoalFloat = 18,
    GoalObject = 19,
    GoalVoid = 20,
    GoalFirstVar = 21,
    GoalMatchVar = 22,
    GoalFunctional = 23,

    Call = 0x40,
    LastCall = 0x41,
    Cut = 0x42,
    End = 0x43,
    Fail = 0x44,
    CallSpecial = 0x45,
    Builtin = 0x46,

    PushSmallInt = 0x80,
    PushInt = 0x81,
    PushFloat = 0x82,
    PushObject = 0x83,
    Load = 0x84,
    Add = 0x85,
    Sub = 0x86,
    Mul = 0x87,
    Div = 0x88,
    Mod = 0x89,
    Neg = 0x8a,
    Abs = 0x8b,
    Min = 0x8c,
    Max = 0x8d,
    Length = 0x8e,
    Item = 0x8f,
    Return = 0x90,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        use Opcode::*;

        Ok(match byte {
            0 => HeadSmallInt,
            1 => HeadInt,
            2 => HeadFloat,
            3 => HeadObject,
            4 => HeadVoid,
            5 => HeadFirstVar,
            6 => HeadMatchVar,
            7 => HeadFunctional,
            16 => GoalSmallInt,
            17 => GoalInt,
            18 => GoalFloat,
            19 => GoalObject,
            20 => GoalVoid,
            21 => GoalFirstVar,
            22 => GoalMatchVar,
            23 => GoalFunctional,
            0x40 => Call,
            0x41 => LastCall,
            0x42 => Cut,
            0x43 => End,
            0x44 => Fail,
            0x45 => CallSpecial,
            0x46 => Builtin,
            0x80 => PushSmallInt,
            0x81 => PushInt,
            0x82 => PushFloat,
            0x83 => PushObject,
            0x84 => Load,
            0x85 => Add,
            0x86 => Sub,
            0x87 => Mul,
            0x88 => Div,
            0x89 => Mod,
            0x8a => Neg,
            0x8b => Abs,
            0x8c => Min,
            0x8d => Max,
            0x8e => Length,
            0x8f => Item,
            0x90 => Return,
            _ => return Err(byte),
        })
    }
}

impl Opcode {
    #[inline]
    pub fn is_head_arg(self) -> bool {
        (self as u8) < GOAL_STRIDE
    }

    #[inline]
    pub fn is_goal_arg(self) -> bool {
        (GOAL_STRIDE..2 * GOAL_STRIDE).contains(&(self as u8))
    }

    /// The goal variant of a head argument opcode.
    pub fn as_goal(self) -> Self {
        debug_assert!(self.is_head_arg());
        Opcode::try_from(self as u8 + GOAL_STRIDE).unwrap_or(self)
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;

        match self {
            HeadSmallInt | GoalSmallInt => "small_int",
            HeadInt | GoalInt => "int",
            HeadFloat | GoalFloat => "float",
            HeadObject | GoalObject => "object",
            HeadVoid | GoalVoid => "void",
            HeadFirstVar | GoalFirstVar => "first_var",
            HeadMatchVar | GoalMatchVar => "match_var",
            HeadFunctional | GoalFunctional => "functional",
            Call => "call",
            LastCall => "last_call",
            Cut => "cut",
            End => "end",
            Fail => "fail",
            CallSpecial => "call_special",
            Builtin => "builtin",
            PushSmallInt => "push_small_int",
            PushInt => "push_int",
            PushFloat => "push_float",
            PushObject => "push_object",
            Load => "load",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Neg => "neg",
            Abs => "abs",
            Min => "min",
            Max => "max",
            Length => "length",
            Item => "item",
            Return => "return",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_head_arg() {
            write!(f, "head_{}", self.name())
        } else if self.is_goal_arg() {
            write!(f, "goal_{}", self.name())
        } else {
            write!(f, "{}", self.name())
        }
    }
}

/// Predicates with dedicated call instructions instead of a predicate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Special {
    Unify = 0,
    NotUnify = 1,
    Throw = 2,
}

impl Special {
    pub fn arity(self) -> usize {
        match self {
            Special::Unify | Special::NotUnify => 2,
            Special::Throw => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Special::Unify => "=",
            Special::NotUnify => "\\=",
            Special::Throw => "throw",
        }
    }

    fn decode(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Special::Unify),
            1 => Some(Special::NotUnify),
            2 => Some(Special::Throw),
            _ => None,
        }
    }
}

/// Operations compiled inline into the goal stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BuiltinOp {
    IsVar = 0,
    IsNonVar = 1,
    IsInteger = 2,
    IsFloat = 3,
    IsNumber = 4,
    IsBoolean = 5,
    IsReference = 6,
    IsSymbol = 7,
    Lt = 8,
    Le = 9,
    Gt = 10,
    Ge = 11,
    NumEq = 12,
    NumNe = 13,
    UnsafeInit = 14,
    UnsafeSet = 15,
    AccumulateMin = 16,
    AccumulateMax = 17,
    AccumulateSum = 18,
    CheckBound = 19,
}

/// The operand layout of a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltinShape {
    Slot,
    TwoExprs,
    SlotExpr,
}

impl BuiltinOp {
    fn decode(byte: u8) -> Option<Self> {
        use BuiltinOp::*;

        Some(match byte {
            0 => IsVar,
            1 => IsNonVar,
            2 => IsInteger,
            3 => IsFloat,
            4 => IsNumber,
            5 => IsBoolean,
            6 => IsReference,
            7 => IsSymbol,
            8 => Lt,
            9 => Le,
            10 => Gt,
            11 => Ge,
            12 => NumEq,
            13 => NumNe,
            14 => UnsafeInit,
            15 => UnsafeSet,
            16 => AccumulateMin,
            17 => AccumulateMax,
            18 => AccumulateSum,
            19 => CheckBound,
            _ => return None,
        })
    }

    pub(crate) fn shape(self) -> BuiltinShape {
        use BuiltinOp::*;

        match self {
            IsVar | IsNonVar | IsInteger | IsFloat | IsNumber | IsBoolean | IsReference
            | IsSymbol | UnsafeInit | CheckBound => BuiltinShape::Slot,
            Lt | Le | Gt | Ge | NumEq | NumNe => BuiltinShape::TwoExprs,
            UnsafeSet | AccumulateMin | AccumulateMax | AccumulateSum => BuiltinShape::SlotExpr,
        }
    }

    pub fn name(self) -> &'static str {
        use BuiltinOp::*;

        match self {
            IsVar => "var",
            IsNonVar => "nonvar",
            IsInteger => "integer",
            IsFloat => "float",
            IsNumber => "number",
            IsBoolean => "boolean",
            IsReference => "reference",
            IsSymbol => "symbol",
            Lt => "<",
            Le => "=<",
            Gt => ">",
            Ge => ">=",
            NumEq => "=:=",
            NumNe => "=\\=",
            UnsafeInit => "unsafe_init",
            UnsafeSet => "unsafe_set",
            AccumulateMin => "accumulate_min",
            AccumulateMax => "accumulate_max",
            AccumulateSum => "accumulate_sum",
            CheckBound => "check_bound",
        }
    }
}

/// A constant operand, still indirected through the owning predicate's pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Literal {
    SmallInt(i8),
    Int(u8),
    Float(u8),
    Object(u8),
}

/// A decoded head or goal argument instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgInstr {
    Const(Literal),
    Void,
    FirstVar(u8),
    MatchVar(u8),
    /// An expression starting at the given pc.
    Functional(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Head,
    Goal,
}

/// A decoded goal-level instruction. `args` is the pc of the first operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GoalInstr {
    Call { pred: PredId, tail: bool, args: usize },
    Cut,
    End,
    Fail,
    Special { kind: Special, args: usize },
    Builtin { op: BuiltinOp, operands: usize },
}

#[inline]
pub(crate) fn fetch(code: &[u8], pc: usize) -> MachineResult<u8> {
    code.get(pc)
        .copied()
        .ok_or_else(|| ErrorKind::Truncated { pc }.into())
}

#[inline]
pub(crate) fn fetch_opcode(code: &[u8], pc: usize) -> MachineResult<Opcode> {
    let byte = fetch(code, pc)?;
    Opcode::try_from(byte).map_err(|byte| ErrorKind::BadBytecode { pc, byte }.into())
}

/// Decodes the argument instruction at `pc`, returning it and the pc of the
/// next instruction.
pub(crate) fn decode_arg(code: &[u8], pc: usize, side: Side) -> MachineResult<(ArgInstr, usize)> {
    let byte = fetch(code, pc)?;

    let head_byte = match side {
        Side::Head if byte < GOAL_STRIDE => byte,
        Side::Goal if (GOAL_STRIDE..2 * GOAL_STRIDE).contains(&byte) => byte - GOAL_STRIDE,
        _ => return Err(ErrorKind::BadBytecode { pc, byte }.into()),
    };

    let opcode = Opcode::try_from(head_byte)
        .map_err(|_| MachineError::from(ErrorKind::BadBytecode { pc, byte }))?;

    Ok(match opcode {
        Opcode::HeadSmallInt => (
            ArgInstr::Const(Literal::SmallInt(fetch(code, pc + 1)? as i8)),
            pc + 2,
        ),
        Opcode::HeadInt => (ArgInstr::Const(Literal::Int(fetch(code, pc + 1)?)), pc + 2),
        Opcode::HeadFloat => (ArgInstr::Const(Literal::Float(fetch(code, pc + 1)?)), pc + 2),
        Opcode::HeadObject => (ArgInstr::Const(Literal::Object(fetch(code, pc + 1)?)), pc + 2),
        Opcode::HeadVoid => (ArgInstr::Void, pc + 1),
        Opcode::HeadFirstVar => (ArgInstr::FirstVar(fetch(code, pc + 1)?), pc + 2),
        Opcode::HeadMatchVar => (ArgInstr::MatchVar(fetch(code, pc + 1)?), pc + 2),
        Opcode::HeadFunctional => (ArgInstr::Functional(pc + 1), skip_expr(code, pc + 1)?),
        _ => return Err(ErrorKind::BadBytecode { pc, byte }.into()),
    })
}

/// Skips `count` argument instructions starting at `pc`.
pub(crate) fn skip_args(code: &[u8], mut pc: usize, count: usize, side: Side) -> MachineResult<usize> {
    for _ in 0..count {
        pc = decode_arg(code, pc, side)?.1;
    }

    Ok(pc)
}

/// Returns the pc just past the `RETURN` closing the expression at `pc`.
pub(crate) fn skip_expr(code: &[u8], mut pc: usize) -> MachineResult<usize> {
    loop {
        match fetch_opcode(code, pc)? {
            Opcode::PushSmallInt
            | Opcode::PushInt
            | Opcode::PushFloat
            | Opcode::PushObject
            | Opcode::Load => pc += 2,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Neg
            | Opcode::Abs
            | Opcode::Min
            | Opcode::Max
            | Opcode::Length
            | Opcode::Item => pc += 1,
            Opcode::Return => return Ok(pc + 1),
            _ => {
                let byte = code[pc];
                return Err(ErrorKind::BadBytecode { pc, byte }.into());
            }
        }
    }
}

pub(crate) fn decode_goal(code: &[u8], pc: usize) -> MachineResult<GoalInstr> {
    Ok(match fetch_opcode(code, pc)? {
        opcode @ (Opcode::Call | Opcode::LastCall) => {
            let lo = fetch(code, pc + 1)? as u16;
            let hi = fetch(code, pc + 2)? as u16;

            GoalInstr::Call {
                pred: PredId(lo | (hi << 8)),
                tail: opcode == Opcode::LastCall,
                args: pc + 3,
            }
        }
        Opcode::Cut => GoalInstr::Cut,
        Opcode::End => GoalInstr::End,
        Opcode::Fail => GoalInstr::Fail,
        Opcode::CallSpecial => {
            let byte = fetch(code, pc + 1)?;
            let kind = Special::decode(byte)
                .ok_or(ErrorKind::BadBytecode { pc: pc + 1, byte })?;

            GoalInstr::Special { kind, args: pc + 2 }
        }
        Opcode::Builtin => {
            let byte = fetch(code, pc + 1)?;
            let op = BuiltinOp::decode(byte)
                .ok_or(ErrorKind::BadBytecode { pc: pc + 1, byte })?;

            GoalInstr::Builtin { op, operands: pc + 2 }
        }
        _ => {
            let byte = code[pc];
            return Err(ErrorKind::BadBytecode { pc, byte }.into());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_variants_sit_at_the_stride() {
        for op in [
            Opcode::HeadSmallInt,
            Opcode::HeadInt,
            Opcode::HeadFloat,
            Opcode::HeadObject,
            Opcode::HeadVoid,
            Opcode::HeadFirstVar,
            Opcode::HeadMatchVar,
            Opcode::HeadFunctional,
        ] {
            let goal = op.as_goal();

            assert!(goal.is_goal_arg());
            assert_eq!(goal as u8, op as u8 + GOAL_STRIDE);
            assert_eq!(goal.name(), op.name());
        }
    }

    #[test]
    fn decodes_arguments_on_the_right_side() {
        let code = [Opcode::GoalSmallInt as u8, 0xff, Opcode::HeadMatchVar as u8, 3];

        assert_eq!(
            decode_arg(&code, 0, Side::Goal).ok(),
            Some((ArgInstr::Const(Literal::SmallInt(-1)), 2))
        );
        assert_eq!(
            decode_arg(&code, 2, Side::Head).ok(),
            Some((ArgInstr::MatchVar(3), 4))
        );
        assert!(decode_arg(&code, 0, Side::Head).is_err());
    }

    #[test]
    fn skips_expressions() {
        let code = [
            Opcode::HeadFunctional as u8,
            Opcode::Load as u8,
            0,
            Opcode::PushSmallInt as u8,
            1,
            Opcode::Add as u8,
            Opcode::Return as u8,
            Opcode::HeadVoid as u8,
        ];

        let (instr, next) = decode_arg(&code, 0, Side::Head).unwrap();

        assert_eq!(instr, ArgInstr::Functional(1));
        assert_eq!(next, 7);
    }

    #[test]
    fn truncated_code_is_an_error() {
        let code = [Opcode::Call as u8, 1];

        match decode_goal(&code, 0) {
            Err(err) => assert_eq!(err.kind(), &ErrorKind::Truncated { pc: 2 }),
            Ok(instr) => panic!("decoded {:?}", instr),
        }
    }

    #[test]
    fn decodes_calls_little_endian() {
        let code = [Opcode::LastCall as u8, 0x02, 0x01];

        assert_eq!(
            decode_goal(&code, 0).ok(),
            Some(GoalInstr::Call {
                pred: PredId(0x0102),
                tail: true,
                args: 3
            })
        );
    }
}
