use std::{fmt, sync::Arc};

use crate::{
    Closure, Context, FarReference, Fragment, Method, NativeField, ObjectId,
    RuntimeError, RuntimeResult, Symbol,
};

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Fixnum(i64),
    Float(f64),
    Text(Arc<str>),
    Symbol(Symbol),
    Table(Arc<[Value]>),
    Object(ObjectId),
    Closure(Arc<Closure>),
    Method(Arc<Method>),
    Field(Arc<NativeField>),
    TypeTag(Arc<TypeTag>),
    Context(Arc<Context>),
    Fragment(Arc<dyn Fragment>),
    FarReference(FarReference),
}

/// Nominal tag attached to objects at creation time.
#[derive(Debug)]
pub struct TypeTag {
    pub name: Symbol,
    pub supertypes: Vec<Arc<TypeTag>>,
}

impl TypeTag {
    pub fn new(name: &str, supertypes: &[Arc<TypeTag>]) -> Arc<Self> {
        Arc::new(Self {
            name: Symbol::intern(name),
            supertypes: supertypes.to_vec(),
        })
    }

    pub fn is_subtype_of(&self, other: &TypeTag) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let mut pending: Vec<&TypeTag> =
            self.supertypes.iter().map(|t| &**t).collect();
        while let Some(tag) = pending.pop() {
            if std::ptr::eq(tag, other) {
                return true;
            }
            pending.extend(tag.supertypes.iter().map(|t| &**t));
        }
        false
    }
}

impl Value {
    pub fn text(value: &str) -> Self {
        Value::Text(Arc::from(value))
    }

    pub fn symbol(value: &str) -> Self {
        Value::Symbol(Symbol::intern(value))
    }

    pub fn table(values: &[Value]) -> Self {
        Value::Table(Arc::from(values))
    }

    pub fn closure(closure: Closure) -> Self {
        Value::Closure(Arc::new(closure))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_fixnum(&self) -> Option<i64> {
        match self {
            Value::Fixnum(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&Arc<Closure>> {
        match self {
            Value::Closure(closure) => Some(closure),
            _ => None,
        }
    }

    pub fn expect_object(&self, what: &str) -> RuntimeResult<ObjectId> {
        self.as_object().ok_or_else(|| expected(what, self))
    }

    pub fn expect_symbol(&self, what: &str) -> RuntimeResult<Symbol> {
        match self {
            Value::Symbol(symbol) => Ok(*symbol),
            other => Err(expected(what, other)),
        }
    }

    pub fn expect_bool(&self, what: &str) -> RuntimeResult<bool> {
        self.as_bool().ok_or_else(|| expected(what, self))
    }

    pub fn expect_table(&self, what: &str) -> RuntimeResult<Arc<[Value]>> {
        match self {
            Value::Table(values) => Ok(values.clone()),
            other => Err(expected(what, other)),
        }
    }

    pub fn expect_closure(&self, what: &str) -> RuntimeResult<Arc<Closure>> {
        match self {
            Value::Closure(closure) => Ok(closure.clone()),
            other => Err(expected(what, other)),
        }
    }

    pub fn expect_method(&self, what: &str) -> RuntimeResult<Arc<Method>> {
        match self {
            Value::Method(method) => Ok(method.clone()),
            other => Err(expected(what, other)),
        }
    }

    pub fn expect_type_tag(&self, what: &str) -> RuntimeResult<Arc<TypeTag>> {
        match self {
            Value::TypeTag(tag) => Ok(tag.clone()),
            other => Err(expected(what, other)),
        }
    }

    pub fn expect_context(&self, what: &str) -> RuntimeResult<Arc<Context>> {
        match self {
            Value::Context(ctx) => Ok(ctx.clone()),
            other => Err(expected(what, other)),
        }
    }

    /// Identity comparison: immediates compare by value, everything else by
    /// reference.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Fixnum(a), Value::Fixnum(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Arc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Arc::ptr_eq(a, b),
            (Value::Field(a), Value::Field(b)) => a == b,
            (Value::TypeTag(a), Value::TypeTag(b)) => Arc::ptr_eq(a, b),
            (Value::Context(a), Value::Context(b)) => Arc::ptr_eq(a, b),
            (Value::Fragment(a), Value::Fragment(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Value::FarReference(a), Value::FarReference(b)) => a == b,
            _ => false,
        }
    }

    /// Values that cross an actor boundary by copy without consulting any
    /// object's meta-level.
    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            Value::Nil
                | Value::Bool(_)
                | Value::Fixnum(_)
                | Value::Float(_)
                | Value::Text(_)
                | Value::Symbol(_)
                | Value::TypeTag(_)
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Fixnum(_) => "fixnum",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Symbol(_) => "symbol",
            Value::Table(_) => "table",
            Value::Object(_) => "object",
            Value::Closure(_) => "closure",
            Value::Method(_) => "method",
            Value::Field(_) => "field",
            Value::TypeTag(_) => "type tag",
            Value::Context(_) => "context",
            Value::Fragment(_) => "fragment",
            Value::FarReference(_) => "far reference",
        }
    }
}

fn expected(what: &str, got: &Value) -> RuntimeError {
    RuntimeError::illegal_argument(format!(
        "expected {what}, got {} {got}",
        got.kind_name()
    ))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Fixnum(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "\"{s}\""),
            Value::Symbol(s) => write!(f, "`{s}"),
            Value::Table(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Object(id) => write!(f, "<object:{id}>"),
            Value::Closure(c) => write!(f, "<closure:{}>", c.method.name),
            Value::Method(m) => write!(f, "<method:{}>", m.name),
            Value::Field(field) => {
                write!(f, "<field:{} of object:{}>", field.name, field.host)
            }
            Value::TypeTag(tag) => write!(f, "<type tag:{}>", tag.name),
            Value::Context(ctx) => {
                write!(f, "<context scope:{}>", ctx.lexical_scope)
            }
            Value::Fragment(fragment) => write!(f, "<fragment:{fragment:?}>"),
            Value::FarReference(far) => write!(
                f,
                "<far reference to object:{} in actor {}>",
                far.target, far.owner.0
            ),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Fixnum(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Symbol> for Value {
    fn from(value: Symbol) -> Self {
        Value::Symbol(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtyping_is_reflexive_and_transitive() {
        let top = TypeTag::new("Top", &[]);
        let mid = TypeTag::new("Mid", &[top.clone()]);
        let leaf = TypeTag::new("Leaf", &[mid.clone()]);
        let other = TypeTag::new("Other", &[]);

        assert!(leaf.is_subtype_of(&leaf));
        assert!(leaf.is_subtype_of(&mid));
        assert!(leaf.is_subtype_of(&top));
        assert!(!top.is_subtype_of(&leaf));
        assert!(!leaf.is_subtype_of(&other));
    }

    #[test]
    fn identity_of_shared_payloads() {
        let table = Value::table(&[Value::Fixnum(1)]);
        let same = table.clone();
        let equal_but_distinct = Value::table(&[Value::Fixnum(1)]);
        assert!(table.is_identical(&same));
        assert!(!table.is_identical(&equal_but_distinct));
        assert!(Value::symbol("a").is_identical(&Value::symbol("a")));
    }

    #[test]
    fn expectations_report_illegal_arguments() {
        let err = Value::Fixnum(3).expect_symbol("selector").unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalArgument { .. }));
        assert_eq!(Value::Fixnum(3).as_fixnum(), Some(3));
    }
}
