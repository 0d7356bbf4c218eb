use std::sync::Arc;

use log::debug;

use crate::{
    Context, HeapObject, MetaOp, ObjectId, ParentLink, PrototypeObject, RuntimeError,
    RuntimeResult, SlotFlags, TypeTag, VM, Value,
};

/// An object whose meta-level lives in a separate mirror object.
///
/// The mirror points back through its read-only `base` field; the two form
/// a cycle that the heap reclaims as a unit.
#[derive(Debug, Clone)]
pub struct Mirage {
    pub object: PrototypeObject,
    /// `None` only between allocation and binding
    pub mirror: Option<ObjectId>,
}

impl Mirage {
    pub fn new(object: PrototypeObject) -> Self {
        Self {
            object,
            mirror: None,
        }
    }
}

impl VM {
    /// Sends the meta-level selector of `op` to the mirage's mirror, with
    /// the mirror as both implementor and receiver. A mirror that inherits
    /// the mirror root's method for `op` is not sent anything: the default
    /// runs on its base directly.
    pub(crate) fn forward(
        &mut self,
        mirage: ObjectId,
        op: MetaOp,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let mirror = self.mirror_of(mirage)?;
        self.trace_meta(op, mirage, "forwarding");
        if let Some(base) = self.default_target(mirage, op)? {
            return self.perform_default(base, op, args);
        }
        let mirror = Value::Object(mirror);
        let result = self.meta_invoke(&mirror, &mirror, op.selector(), args)?;
        self.unwrap_meta_result(op, result)
    }

    pub fn mirror_of(&self, mirage: ObjectId) -> RuntimeResult<ObjectId> {
        match self.heap.get(mirage) {
            HeapObject::Mirage(Mirage {
                mirror: Some(mirror),
                ..
            }) => Ok(*mirror),
            HeapObject::Mirage(_) => Err(RuntimeError::illegal_operation(format!(
                "mirage {mirage} is not bound to a mirror"
            ))),
            _ => Err(RuntimeError::illegal_argument(format!(
                "{} is not a mirage",
                Value::Object(mirage)
            ))),
        }
    }

    /// Mirrors answer arbitrary values; bring them back to what the
    /// operation promises its callers.
    fn unwrap_meta_result(&self, op: MetaOp, result: Value) -> RuntimeResult<Value> {
        let what = op.name();
        match op {
            MetaOp::IsCloneOf
            | MetaOp::IsRelatedTo
            | MetaOp::RespondsTo
            | MetaOp::IsTaggedAs => result.expect_bool(what).map(Value::Bool),
            MetaOp::ListFields
            | MetaOp::ListMethods
            | MetaOp::ListSlots
            | MetaOp::TypeTags => result.expect_table(what).map(Value::Table),
            MetaOp::Print => match result {
                Value::Text(_) => Ok(result),
                Value::Symbol(symbol) => Ok(Value::Text(symbol.as_str())),
                other => Err(RuntimeError::illegal_argument(format!(
                    "expected text from `{what}`, got {} {other}",
                    other.kind_name()
                ))),
            },
            _ => Ok(result),
        }
    }

    /// Allocates an unbound mirage.
    pub fn new_mirage(
        &mut self,
        parent: Value,
        link: ParentLink,
        lexical_parent: Option<ObjectId>,
        tags: &[Arc<TypeTag>],
    ) -> ObjectId {
        let family = self.heap.new_family();
        let object =
            PrototypeObject::new(parent, link, lexical_parent, family).with_type_tags(tags);
        self.heap.allocate(HeapObject::Mirage(Mirage::new(object)))
    }

    /// Ties `mirror` to a fresh, unbound `mirage`.
    pub fn bind_mirror(&mut self, mirror: &Value, mirage: &Value) -> RuntimeResult<()> {
        let mirror_id = mirror.expect_object("mirror")?;
        let mirage_id = mirage.expect_object("mirage")?;
        match self.heap.get(mirage_id) {
            HeapObject::Mirage(Mirage { mirror: None, .. }) => (),
            HeapObject::Mirage(_) => {
                return Err(RuntimeError::illegal_argument(format!(
                    "{mirage} already has a mirror"
                )));
            }
            _ => {
                return Err(RuntimeError::illegal_argument(format!(
                    "cannot reflect on {mirage}: not a mirage"
                )));
            }
        }
        if mirror_id == self.specials.mirror_root {
            return Err(RuntimeError::illegal_operation(
                "the mirror root is shared and cannot be bound",
            ));
        }
        let base = self.names.base;
        let storage = self.heap.storage_mut(mirror_id);
        if storage.field_index(base).is_some() {
            return Err(RuntimeError::illegal_operation(format!(
                "{mirror} is already bound"
            )));
        }
        storage.put_field(base, mirage.clone(), SlotFlags::empty())?;

        if let HeapObject::Mirage(node) = self.heap.get_mut(mirage_id) {
            node.mirror = Some(mirror_id);
        }
        debug!("bound mirror {mirror_id} to mirage {mirage_id}");
        Ok(())
    }

    /// Creates a mirage whose meta-level is an instance of `mirror`, then
    /// runs `code` with the mirage as scope and receiver.
    ///
    /// The instance is `mirror.newInstance(mirage)`, which clones the
    /// prototype and binds the clone through its `init`. The mirror root
    /// itself is never bound; a bare extension of it is used instead.
    pub fn create_mirage(&mut self, code: &Value, mirror: &Value) -> RuntimeResult<Value> {
        self.create_tagged_mirage(code, mirror, &[])
    }

    pub fn create_tagged_mirage(
        &mut self,
        code: &Value,
        mirror: &Value,
        tags: &[Arc<TypeTag>],
    ) -> RuntimeResult<Value> {
        let closure = code.expect_closure("mirage code")?;
        let mirror_id = mirror.expect_object("mirror")?;
        let scope = closure.context.lexical_scope;
        let id = self.new_mirage(Value::Nil, ParentLink::IsA, Some(scope), tags);
        let mirage = Value::Object(id);

        if mirror_id == self.specials.mirror_root {
            let instance = self.fresh_mirror();
            self.bind_mirror(&instance, &mirage)?;
        } else {
            self.new_instance(mirror, std::slice::from_ref(&mirage))?;
        }

        let ctx = Context::new(id, mirage.clone(), Value::Nil);
        self.apply_in_scope(&closure, &[], &ctx)?;
        Ok(mirage)
    }

    /// A copy of the mirage bound to a copy of its mirror.
    pub(crate) fn clone_mirage(&mut self, id: ObjectId) -> RuntimeResult<ObjectId> {
        let mirror = self.mirror_of(id)?;
        let parent = self.cloned_parent(id)?;
        let copy = self.clone_node(id, parent, |object| {
            HeapObject::Mirage(Mirage::new(object))
        })?;

        let mirror_copy = self
            .clone_value(&Value::Object(mirror))?
            .expect_object("mirror clone")?;
        if mirror_copy == mirror {
            return Err(RuntimeError::illegal_operation(format!(
                "mirror {mirror} of {} cannot be cloned",
                Value::Object(id)
            )));
        }
        let base = self.names.base;
        let storage = self.heap.storage_mut(mirror_copy);
        match storage.field_index(base) {
            Some(index) => storage.write(index, Value::Object(copy)),
            None => {
                storage.put_field(base, Value::Object(copy), SlotFlags::empty())?;
            }
        }
        if let HeapObject::Mirage(node) = self.heap.get_mut(copy) {
            node.mirror = Some(mirror_copy);
        }
        debug!("cloned mirage {id} into {copy} with mirror {mirror_copy}");
        Ok(copy)
    }
}
