//! An assembler for clause bytecode.
//!
//! Parsing and compiling source text happen outside this crate; hosts and
//! tests describe clauses with [`ClauseBuilder`] instead. The builder decides
//! first and repeat occurrences of variables, records the head model used by
//! diagnostics, and leaves pool indices to be linked when the clause is added
//! to a predicate.

use crate::atom_table::*;
use crate::instructions::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;
use crate::types::*;

use std::ops;
use std::rc::Rc;

/// An argument of a clause head or goal.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    /// The clause variable in the given slot.
    Var(u8),
    Void,
    Expr(Expr),
}

/// The clause variable in `slot`.
#[inline]
pub fn var(slot: u8) -> Arg {
    Arg::Var(slot)
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Arg::Value(Value::Integer(n))
    }
}

impl From<f32> for Arg {
    fn from(f: f32) -> Self {
        Arg::Value(Value::float(f))
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Value(Value::Boolean(b))
    }
}

impl From<ObjRef> for Arg {
    fn from(r: ObjRef) -> Self {
        Arg::Value(Value::Reference(r))
    }
}

impl From<Expr> for Arg {
    fn from(expr: Expr) -> Self {
        Arg::Expr(expr)
    }
}

/// An arithmetic or collection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Value),
    Var(u8),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
    /// The element of a list at a 0-based index.
    Item(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Abs(Box<Expr>),
    /// The length of a list, string or symbol.
    Length(Box<Expr>),
}

impl Expr {
    pub fn var(slot: u8) -> Self {
        Expr::Var(slot)
    }

    pub fn int(n: i32) -> Self {
        Expr::Const(Value::Integer(n))
    }

    pub fn float(f: f32) -> Self {
        Expr::Const(Value::float(f))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Const(value.into())
    }

    pub fn min(self, other: impl Into<Expr>) -> Self {
        Expr::Min(Box::new(self), Box::new(other.into()))
    }

    pub fn max(self, other: impl Into<Expr>) -> Self {
        Expr::Max(Box::new(self), Box::new(other.into()))
    }

    pub fn item(self, index: impl Into<Expr>) -> Self {
        Expr::Item(Box::new(self), Box::new(index.into()))
    }

    pub fn abs(self) -> Self {
        Expr::Abs(Box::new(self))
    }

    pub fn length(self) -> Self {
        Expr::Length(Box::new(self))
    }

    fn for_each_slot(&self, f: &mut impl FnMut(u8)) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(slot) => f(*slot),
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Div(lhs, rhs)
            | Expr::Mod(lhs, rhs)
            | Expr::Min(lhs, rhs)
            | Expr::Max(lhs, rhs)
            | Expr::Item(lhs, rhs) => {
                lhs.for_each_slot(f);
                rhs.for_each_slot(f);
            }
            Expr::Neg(e) | Expr::Abs(e) | Expr::Length(e) => e.for_each_slot(f),
        }
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::int(n)
    }
}

impl From<f32> for Expr {
    fn from(f: f32) -> Self {
        Expr::float(f)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Const(value)
    }
}

macro_rules! expr_binop {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl<T: Into<Expr>> ops::$trait<T> for Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                Expr::$variant(Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

expr_binop!(Add, add, Add);
expr_binop!(Sub, sub, Sub);
expr_binop!(Mul, mul, Mul);
expr_binop!(Div, div, Div);
expr_binop!(Rem, rem, Mod);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

/// A constant operand whose pool index is filled in at link time.
#[derive(Debug, Clone, Copy)]
struct Patch {
    operand: usize,
    value: Value,
}

/// Assembles one clause. Head arguments come first, then goals.
#[derive(Debug, Clone)]
pub struct ClauseBuilder {
    code: Vec<u8>,
    arity: usize,
    env_size: u8,
    seen: Vec<bool>,
    in_body: bool,
    head_model: Vec<HeadArgModel>,
    patches: Vec<Patch>,
    var_names: Vec<Option<Rc<str>>>,
    source: Option<SourceLocation>,
    error: Option<ProgramError>,
}

impl ClauseBuilder {
    /// Starts a clause with `env_size` variable slots.
    pub fn new(env_size: u8) -> Self {
        ClauseBuilder {
            code: vec![],
            arity: 0,
            env_size,
            seen: vec![false; env_size as usize],
            in_body: false,
            head_model: vec![],
            patches: vec![],
            var_names: vec![None; env_size as usize],
            source: None,
            error: None,
        }
    }

    /// A fact: a clause with the given head arguments and no goals.
    pub fn fact(env_size: u8, args: impl IntoIterator<Item = Arg>) -> Self {
        args.into_iter()
            .fold(ClauseBuilder::new(env_size), |clause, arg| clause.head(arg))
    }

    fn fail_with(&mut self, err: ProgramError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn check_slot(&mut self, slot: u8) -> bool {
        if slot < self.env_size {
            true
        } else {
            self.fail_with(ProgramError::SlotOutOfRange {
                slot,
                env_size: self.env_size,
            });
            false
        }
    }

    fn emit_constant(&mut self, value: Value, small: Opcode, int: Opcode, float: Opcode, object: Opcode) {
        let opcode = match value {
            Value::Integer(n) if i8::try_from(n).is_ok() => {
                self.code.push(small as u8);
                self.code.push(n as i8 as u8);
                return;
            }
            Value::Integer(_) => int,
            Value::Float(_) => float,
            Value::Unbound | Value::ForwardTo(_) => {
                self.fail_with(ProgramError::NonConstant(format!("{:?}", value)));
                return;
            }
            _ => object,
        };

        self.code.push(opcode as u8);
        self.patches.push(Patch {
            operand: self.code.len(),
            value,
        });
        self.code.push(0);
    }

    fn emit_expr(&mut self, expr: &Expr) {
        let op = match expr {
            Expr::Const(value) => {
                self.emit_constant(
                    *value,
                    Opcode::PushSmallInt,
                    Opcode::PushInt,
                    Opcode::PushFloat,
                    Opcode::PushObject,
                );
                return;
            }
            Expr::Var(slot) => {
                if self.check_slot(*slot) {
                    self.code.push(Opcode::Load as u8);
                    self.code.push(*slot);
                }
                return;
            }
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Div(lhs, rhs)
            | Expr::Mod(lhs, rhs)
            | Expr::Min(lhs, rhs)
            | Expr::Max(lhs, rhs)
            | Expr::Item(lhs, rhs) => {
                self.emit_expr(lhs);
                self.emit_expr(rhs);

                match expr {
                    Expr::Add(..) => Opcode::Add,
                    Expr::Sub(..) => Opcode::Sub,
                    Expr::Mul(..) => Opcode::Mul,
                    Expr::Div(..) => Opcode::Div,
                    Expr::Mod(..) => Opcode::Mod,
                    Expr::Min(..) => Opcode::Min,
                    Expr::Max(..) => Opcode::Max,
                    _ => Opcode::Item,
                }
            }
            Expr::Neg(e) | Expr::Abs(e) | Expr::Length(e) => {
                self.emit_expr(e);

                match expr {
                    Expr::Neg(_) => Opcode::Neg,
                    Expr::Abs(_) => Opcode::Abs,
                    _ => Opcode::Length,
                }
            }
        };

        self.code.push(op as u8);
    }

    fn emit_full_expr(&mut self, expr: &Expr) {
        self.emit_expr(expr);
        self.code.push(Opcode::Return as u8);
    }

    fn emit_arg(&mut self, arg: &Arg, side: Side) {
        let op = |head: Opcode| match side {
            Side::Head => head,
            Side::Goal => head.as_goal(),
        };

        match arg {
            Arg::Value(value) => self.emit_constant(
                *value,
                op(Opcode::HeadSmallInt),
                op(Opcode::HeadInt),
                op(Opcode::HeadFloat),
                op(Opcode::HeadObject),
            ),
            Arg::Var(slot) => {
                let slot = *slot;

                if self.check_slot(slot) {
                    let first = !self.seen[slot as usize];
                    self.seen[slot as usize] = true;

                    let opcode = if first {
                        op(Opcode::HeadFirstVar)
                    } else {
                        op(Opcode::HeadMatchVar)
                    };

                    self.code.push(opcode as u8);
                    self.code.push(slot);
                }
            }
            Arg::Void => self.code.push(op(Opcode::HeadVoid) as u8),
            Arg::Expr(expr) => {
                self.code.push(op(Opcode::HeadFunctional) as u8);
                self.emit_full_expr(expr);
            }
        }
    }

    /// Slots read before any occurrence may hold stale values after
    /// backtracking; reset them before the instruction that reads them.
    fn init_unseen(&mut self, slots: impl IntoIterator<Item = u8>) {
        for slot in slots {
            if slot < self.env_size && !self.seen[slot as usize] {
                self.seen[slot as usize] = true;
                self.code.push(Opcode::Builtin as u8);
                self.code.push(BuiltinOp::UnsafeInit as u8);
                self.code.push(slot);
            }
        }
    }

    fn expr_slots<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> Vec<u8> {
        let mut slots = vec![];

        for expr in exprs {
            expr.for_each_slot(&mut |slot| slots.push(slot));
        }

        slots
    }

    fn arg_expr_slots(args: &[Arg]) -> Vec<u8> {
        Self::expr_slots(args.iter().filter_map(|arg| match arg {
            Arg::Expr(expr) => Some(expr),
            _ => None,
        }))
    }

    /// Appends a head argument.
    pub fn head(mut self, arg: impl Into<Arg>) -> Self {
        let arg = arg.into();

        if self.in_body {
            self.fail_with(ProgramError::HeadAfterBody);
            return self;
        }

        self.head_model.push(match &arg {
            Arg::Value(value) => HeadArgModel::Constant(*value),
            Arg::Var(slot) => HeadArgModel::Slot(*slot),
            Arg::Void => HeadArgModel::Void,
            Arg::Expr(_) => HeadArgModel::Expression,
        });

        self.emit_arg(&arg, Side::Head);
        self.arity += 1;
        self
    }

    fn goal_args(&mut self, args: impl IntoIterator<Item = Arg>) -> Vec<Arg> {
        self.in_body = true;

        let args: Vec<Arg> = args.into_iter().collect();
        let slots = Self::arg_expr_slots(&args);

        self.init_unseen(slots);
        args
    }

    fn emit_call(&mut self, opcode: Opcode, pred: PredId, args: impl IntoIterator<Item = Arg>) {
        let args = self.goal_args(args);

        self.code.push(opcode as u8);
        self.code.extend_from_slice(&pred.0.to_le_bytes());

        for arg in &args {
            self.emit_arg(arg, Side::Goal);
        }
    }

    /// Calls `pred`, returning to this clause afterwards.
    pub fn call(mut self, pred: PredId, args: impl IntoIterator<Item = Arg>) -> Self {
        self.emit_call(Opcode::Call, pred, args);
        self
    }

    /// Calls `pred` as the clause's final goal, allowing frame reuse.
    pub fn last_call(mut self, pred: PredId, args: impl IntoIterator<Item = Arg>) -> Self {
        self.emit_call(Opcode::LastCall, pred, args);
        self
    }

    fn special(mut self, kind: Special, args: Vec<Arg>) -> Self {
        let args = self.goal_args(args);

        self.code.push(Opcode::CallSpecial as u8);
        self.code.push(kind as u8);

        for arg in &args {
            self.emit_arg(arg, Side::Goal);
        }

        self
    }

    /// `lhs = rhs`
    pub fn unify(self, lhs: impl Into<Arg>, rhs: impl Into<Arg>) -> Self {
        self.special(Special::Unify, vec![lhs.into(), rhs.into()])
    }

    /// `lhs \= rhs`
    pub fn not_unify(self, lhs: impl Into<Arg>, rhs: impl Into<Arg>) -> Self {
        self.special(Special::NotUnify, vec![lhs.into(), rhs.into()])
    }

    pub fn throw(self, ball: impl Into<Arg>) -> Self {
        self.special(Special::Throw, vec![ball.into()])
    }

    pub fn cut(mut self) -> Self {
        self.in_body = true;
        self.code.push(Opcode::Cut as u8);
        self
    }

    pub fn fail(mut self) -> Self {
        self.in_body = true;
        self.code.push(Opcode::Fail as u8);
        self
    }

    fn builtin_slot(&mut self, op: BuiltinOp, slot: u8) {
        self.in_body = true;

        if self.check_slot(slot) {
            if op != BuiltinOp::UnsafeInit {
                self.init_unseen([slot]);
            }

            self.seen[slot as usize] = true;
            self.code.push(Opcode::Builtin as u8);
            self.code.push(op as u8);
            self.code.push(slot);
        }
    }

    /// A type test on `slot`; `op` is one of the `Is*` builtins.
    pub fn type_test(mut self, op: BuiltinOp, slot: u8) -> Self {
        debug_assert!(matches!(
            op,
            BuiltinOp::IsVar
                | BuiltinOp::IsNonVar
                | BuiltinOp::IsInteger
                | BuiltinOp::IsFloat
                | BuiltinOp::IsNumber
                | BuiltinOp::IsBoolean
                | BuiltinOp::IsReference
                | BuiltinOp::IsSymbol
        ));

        self.builtin_slot(op, slot);
        self
    }

    /// A numeric comparison; `op` is one of `Lt`, `Le`, `Gt`, `Ge`, `NumEq`, `NumNe`.
    pub fn compare(mut self, op: BuiltinOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        debug_assert_eq!(op.shape(), BuiltinShape::TwoExprs);

        let (lhs, rhs) = (lhs.into(), rhs.into());

        self.in_body = true;
        self.init_unseen(Self::expr_slots([&lhs, &rhs]));

        self.code.push(Opcode::Builtin as u8);
        self.code.push(op as u8);
        self.emit_full_expr(&lhs);
        self.emit_full_expr(&rhs);
        self
    }

    /// Resets `slot` to unbound without trailing.
    pub fn unsafe_init(mut self, slot: u8) -> Self {
        self.builtin_slot(BuiltinOp::UnsafeInit, slot);
        self
    }

    fn slot_expr(mut self, op: BuiltinOp, slot: u8, expr: Expr) -> Self {
        self.in_body = true;

        if !self.check_slot(slot) {
            return self;
        }

        let mut slots = vec![slot];
        slots.extend(Self::expr_slots([&expr]));
        self.init_unseen(slots);

        self.code.push(Opcode::Builtin as u8);
        self.code.push(op as u8);
        self.code.push(slot);
        self.emit_full_expr(&expr);
        self
    }

    /// Assigns the value of `expr` to `slot` without trailing.
    pub fn unsafe_set(self, slot: u8, expr: impl Into<Expr>) -> Self {
        self.slot_expr(BuiltinOp::UnsafeSet, slot, expr.into())
    }

    /// Folds `expr` into the accumulator in `slot`; `op` is one of the
    /// `Accumulate*` builtins.
    pub fn accumulate(self, op: BuiltinOp, slot: u8, expr: impl Into<Expr>) -> Self {
        debug_assert!(matches!(
            op,
            BuiltinOp::AccumulateMin | BuiltinOp::AccumulateMax | BuiltinOp::AccumulateSum
        ));

        self.slot_expr(op, slot, expr.into())
    }

    /// Raises an instantiation error unless `slot` is bound.
    pub fn check_bound(mut self, slot: u8) -> Self {
        self.builtin_slot(BuiltinOp::CheckBound, slot);
        self
    }

    /// Names the variable in `slot` for reported bindings.
    pub fn name_var(mut self, slot: u8, name: &str) -> Self {
        if self.check_slot(slot) {
            self.var_names[slot as usize] = Some(Rc::from(name));
        }

        self
    }

    pub fn at(mut self, file: &str, line: u32) -> Self {
        self.source = Some(SourceLocation {
            file: Rc::from(file),
            line,
        });
        self
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Terminates the clause and links its constants into `pools`.
    pub(crate) fn finish(mut self, pools: &mut ConstantPools) -> Result<CompiledClause, ProgramError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        self.code.push(Opcode::End as u8);

        for patch in &self.patches {
            self.code[patch.operand] = match patch.value {
                Value::Integer(n) => pools.add_int(n)?,
                Value::Float(f) => pools.add_float(f.0)?,
                value => pools.add_object(value)?,
            };
        }

        Ok(CompiledClause {
            code: self.code.into_boxed_slice(),
            arity: self.arity,
            env_size: self.env_size,
            head_model: Some(self.head_model),
            var_names: self.var_names,
            source: self.source,
        })
    }
}
