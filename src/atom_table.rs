use crate::types::*;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use std::fmt;
use std::rc::Rc;

/// An opaque handle to an object owned by an [`ObjectStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The objects a [`Value::Reference`] can designate.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// An interned symbol. Two references to the same symbol are the same handle.
    Symbol(Rc<str>),
    /// An immutable string.
    Str(Rc<str>),
    /// A mutable list. Backtrackable mutation goes through the undo stack.
    List(Vec<Value>),
    /// A value flagged as an error; `throw/1` turns it into a fatal error.
    Error(Rc<str>),
}

/// Owner of every object a reference can point to.
///
/// Objects are never freed: the machine performs no garbage collection.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: Vec<Object>,
    symbols: IndexMap<Rc<str>, ObjRef, FxBuildHasher>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, object: Object) -> ObjRef {
        let r = ObjRef(self.objects.len() as u32);
        self.objects.push(object);
        r
    }

    /// Interns `name`, returning the same handle for equal names.
    pub fn intern(&mut self, name: &str) -> ObjRef {
        if let Some(&r) = self.symbols.get(name) {
            return r;
        }

        let name: Rc<str> = Rc::from(name);
        let r = self.alloc(Object::Symbol(name.clone()));

        self.symbols.insert(name, r);
        r
    }

    /// Looks up an already interned symbol.
    pub fn symbol(&self, name: &str) -> Option<ObjRef> {
        self.symbols.get(name).copied()
    }

    pub fn new_string(&mut self, text: &str) -> ObjRef {
        self.alloc(Object::Str(Rc::from(text)))
    }

    pub fn new_list(&mut self, items: Vec<Value>) -> ObjRef {
        self.alloc(Object::List(items))
    }

    pub fn new_error(&mut self, message: &str) -> ObjRef {
        self.alloc(Object::Error(Rc::from(message)))
    }

    #[inline]
    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        self.objects.get(r.index())
    }

    #[inline]
    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        self.objects.get_mut(r.index())
    }

    pub fn symbol_name(&self, r: ObjRef) -> Option<&str> {
        match self.get(r) {
            Some(Object::Symbol(name)) => Some(name),
            _ => None,
        }
    }

    pub fn list(&self, r: ObjRef) -> Option<&[Value]> {
        match self.get(r) {
            Some(Object::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn list_mut(&mut self, r: ObjRef) -> Option<&mut Vec<Value>> {
        match self.get_mut(r) {
            Some(Object::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn error_message(&self, r: ObjRef) -> Option<&str> {
        match self.get(r) {
            Some(Object::Error(message)) => Some(message),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Wraps `value` for printing.
    pub fn display(&self, value: Value) -> ValueDisplay<'_> {
        ValueDisplay {
            value,
            objects: self,
        }
    }

    pub(crate) fn fmt_object(&self, r: ObjRef, f: &mut fmt::Formatter) -> fmt::Result {
        match self.get(r) {
            Some(Object::Symbol(name)) => write!(f, "{}", name),
            Some(Object::Str(text)) => write!(f, "{:?}", text),
            Some(Object::List(items)) => {
                write!(f, "[")?;

                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }

                    write!(f, "{}", self.display(*item))?;
                }

                write!(f, "]")
            }
            Some(Object::Error(message)) => write!(f, "error({:?})", message),
            None => write!(f, "<dangling #{}>", r.0),
        }
    }
}
