use crate::atom_table::*;

use ordered_float::OrderedFloat;

use std::fmt;

/// An index into the data stack.
pub type Addr = u32;

/// A data-stack cell.
///
/// `ForwardTo` links a variable to the cell it has been aliased with. It only
/// ever occurs in data-stack cells and always points at a strictly lower
/// address, so following a chain of forwards terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// A 32-bit integer.
    Integer(i32),
    /// A 32-bit float. Equality is total (NaN equals NaN).
    Float(OrderedFloat<f32>),
    /// A boolean.
    Boolean(bool),
    /// A handle to an object owned by the machine's [`ObjectStore`].
    Reference(ObjRef),
    /// An unbound variable.
    #[default]
    Unbound,
    /// An alias of the cell at the given (lower) address.
    ForwardTo(Addr),
}

assert_eq_size!(Value, u64);

impl Value {
    #[inline]
    pub fn float(f: f32) -> Self {
        Value::Float(OrderedFloat(f))
    }

    #[inline]
    pub fn is_unbound(self) -> bool {
        matches!(self, Value::Unbound)
    }

    #[inline]
    pub fn is_forward(self) -> bool {
        matches!(self, Value::ForwardTo(_))
    }

    /// True of values that may live in constant pools and table rows.
    #[inline]
    pub fn is_constant(self) -> bool {
        !matches!(self, Value::Unbound | Value::ForwardTo(_))
    }

    #[inline]
    pub fn is_number(self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(n: i32) -> Self {
        Value::Integer(n)
    }
}

impl From<f32> for Value {
    #[inline]
    fn from(f: f32) -> Self {
        Value::float(f)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<ObjRef> for Value {
    #[inline]
    fn from(r: ObjRef) -> Self {
        Value::Reference(r)
    }
}

/// Renders a value, resolving references through an object store.
pub struct ValueDisplay<'a> {
    pub(crate) value: Value,
    pub(crate) objects: &'a ObjectStore,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.0.fract() == 0.0 && x.0.is_finite() {
                    write!(f, "{:.1}", x.0)
                } else {
                    write!(f, "{}", x.0)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Reference(r) => self.objects.fmt_object(r, f),
            Value::Unbound => write!(f, "_"),
            Value::ForwardTo(a) => write!(f, "_G{}", a),
        }
    }
}
