use crate::{
    CallFrame, Context, HeapObject, Method, MethodBody, Mirage, ObjectId,
    PrototypeObject, SlotStorage, Value,
};

pub trait Visitable {
    fn visit_edges(&self, visitor: &mut impl Visitor);
}

pub trait Visitor: Sized {
    fn visit(&mut self, id: ObjectId);
}

// visiting a node reports only its direct edges; the visitor decides
// whether to walk further.
impl Visitable for HeapObject {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        match self {
            HeapObject::Object(object) => object.visit_edges(visitor),
            HeapObject::Frame(frame) => frame.visit_edges(visitor),
            HeapObject::Mirage(mirage) => mirage.visit_edges(visitor),
        }
    }
}

impl Visitable for PrototypeObject {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        self.slots.visit_edges(visitor);
        self.dynamic_parent.visit_edges(visitor);
        if let Some(parent) = self.lexical_parent {
            visitor.visit(parent);
        }
    }
}

impl Visitable for CallFrame {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        self.slots.visit_edges(visitor);
        visitor.visit(self.lexical_parent);
    }
}

impl Visitable for Mirage {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        self.object.visit_edges(visitor);
        if let Some(mirror) = self.mirror {
            visitor.visit(mirror);
        }
    }
}

impl Visitable for SlotStorage {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        self.values().iter().for_each(|v| v.visit_edges(visitor));
        self.methods().iter().for_each(|m| m.visit_edges(visitor));
        self.custom_fields()
            .iter()
            .for_each(|f| f.field.visit_edges(visitor));
    }
}

impl Visitable for Method {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        // native bodies are opaque; they must not capture heap handles
        if let MethodBody::Fragment(fragment) = &self.body {
            fragment.for_each_value(&mut |v| v.visit_edges(visitor));
        }
    }
}

impl Visitable for Context {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit(self.lexical_scope);
        self.receiver.visit_edges(visitor);
        self.super_view.visit_edges(visitor);
    }
}

impl Visitable for Value {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        match self {
            Value::Object(id) => visitor.visit(*id),
            Value::Table(values) => {
                values.iter().for_each(|v| v.visit_edges(visitor))
            }
            Value::Closure(closure) => {
                closure.method.visit_edges(visitor);
                closure.context.visit_edges(visitor);
            }
            Value::Method(method) => method.visit_edges(visitor),
            Value::Field(field) => visitor.visit(field.host),
            Value::Context(ctx) => ctx.visit_edges(visitor),
            Value::Fragment(fragment) => {
                fragment.for_each_value(&mut |v| v.visit_edges(visitor))
            }
            Value::FarReference(far) => visitor.visit(far.target),
            Value::Nil
            | Value::Bool(_)
            | Value::Fixnum(_)
            | Value::Float(_)
            | Value::Text(_)
            | Value::Symbol(_)
            | Value::TypeTag(_) => (),
        }
    }
}
