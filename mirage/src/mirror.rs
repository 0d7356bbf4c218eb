use std::sync::Arc;

use log::trace;

use crate::{
    Heap, HeapObject, LookupResult, META_OPERATIONS, MetaOp, Method, Mirage,
    ObjectFlags, ObjectId, Parameter, ParentLink, PrototypeObject, RuntimeError,
    RuntimeResult, Slot, SlotFlags, Symbol, VM, Value,
};

/// Builds the mirror root: one method per meta operation, each performing
/// the default semantics on the mirror's `base`, plus `init` to bind a new
/// mirror instance and an unbound `base` field.
///
/// Also answers the meta methods themselves, indexed by [`MetaOp`], so that
/// forwarding can recognize a mirror that inherits one unchanged.
pub(crate) fn bootstrap_mirror_root(
    heap: &mut Heap,
    lexical_root: ObjectId,
) -> (ObjectId, Box<[Arc<Method>]>) {
    let family = heap.new_family();
    let mut root =
        PrototypeObject::new(Value::Nil, ParentLink::IsA, Some(lexical_root), family);
    root.flags = ObjectFlags::SINGLETON | ObjectFlags::MIRROR_ROOT;

    let mut defaults = Vec::with_capacity(META_OPERATIONS.len());
    for desc in META_OPERATIONS {
        let op = desc.op;
        let parameters = desc
            .parameters
            .iter()
            .map(|name| Parameter::Required(Symbol::intern(name)))
            .collect();
        let method = Method::builtin(op.selector(), parameters, move |vm, ctx, args| {
            vm.mirror_root_dispatch(op, &ctx.receiver, args)
        });
        // the table has no duplicate names
        let _ = root.slots.add_method(Arc::clone(&method));
        defaults.push(method);
    }

    let init = Method::builtin(
        Symbol::intern("init"),
        vec![Parameter::Required(Symbol::intern("base"))],
        |vm, ctx, args| {
            vm.bind_mirror(&ctx.receiver, &args[0])?;
            Ok(Value::Nil)
        },
    );
    let _ = root.slots.add_method(init);
    let _ = root
        .slots
        .put_field(Symbol::intern("base"), Value::Nil, SlotFlags::empty());

    (heap.allocate(HeapObject::Object(root)), defaults.into_boxed_slice())
}

impl VM {
    /// The mirage `mirror` reflects on. A plain `base` field is read in
    /// place; anything else is asked for it.
    pub fn mirror_base(&mut self, mirror: &Value) -> RuntimeResult<ObjectId> {
        let base = self.names.base;
        let stored = match mirror.as_object() {
            Some(id) if self.heap.is_plain_object(id) => {
                match self.heap.search_dynamic(id, base) {
                    LookupResult::Found {
                        holder,
                        slot: Slot::Field { index, .. },
                    } => Some(self.heap.storage(holder).read(index)),
                    _ => None,
                }
            }
            _ => None,
        };
        let value = match stored {
            Some(value) => value,
            None => self.invoke(mirror, base, &[])?,
        };
        match value {
            Value::Object(id) if self.heap.is_mirage(id) => Ok(id),
            _ => Err(RuntimeError::illegal_operation(format!(
                "{mirror} is not bound to a mirage"
            ))),
        }
    }

    /// Body of every mirror root method: default semantics applied straight
    /// to the base, bypassing the base's own forwarding.
    pub(crate) fn mirror_root_dispatch(
        &mut self,
        op: MetaOp,
        mirror: &Value,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let base = self.mirror_base(mirror)?;
        if self.trace_forwarding {
            trace!("mirror {mirror} performs default `{op}` on {base}");
        }
        self.perform_default(base, op, args)
    }

    /// The base on which the mirror of `mirage` would perform the default
    /// semantics of `op`, when that mirror inherits the mirror root's method
    /// for `op` untouched. Callers then skip the meta-level send.
    pub(crate) fn default_target(
        &mut self,
        mirage: ObjectId,
        op: MetaOp,
    ) -> RuntimeResult<Option<ObjectId>> {
        let mirror = match self.heap.get(mirage) {
            HeapObject::Mirage(Mirage {
                mirror: Some(mirror),
                ..
            }) if self.heap.is_plain_object(*mirror) => *mirror,
            _ => return Ok(None),
        };
        let inherited = match self.heap.search_dynamic(mirror, op.selector()) {
            LookupResult::Found {
                holder,
                slot: Slot::Method(method),
            } => {
                holder == self.specials.mirror_root
                    && Arc::ptr_eq(&method, &self.specials.mirror_defaults[op as usize])
            }
            _ => false,
        };
        if !inherited {
            return Ok(None);
        }
        let mirror = Value::Object(mirror);
        let base = self.mirror_base(&mirror)?;
        if self.trace_forwarding {
            trace!("mirror {mirror} performs default `{op}` on {base}");
        }
        Ok(Some(base))
    }

    /// An unbound mirror instance: a bare is-a child of the mirror root.
    pub fn fresh_mirror(&mut self) -> Value {
        let root = self.specials.mirror_root;
        let family = self.heap.new_family();
        let lexical = Some(self.specials.lexical_root);
        let mirror = PrototypeObject::new(Value::Object(root), ParentLink::IsA, lexical, family);
        Value::Object(self.heap.allocate(HeapObject::Object(mirror)))
    }

    pub fn is_mirror_root(&self, value: &Value) -> bool {
        value.as_object().is_some_and(|id| {
            self.heap
                .body(id)
                .is_some_and(|body| body.flags.contains(ObjectFlags::MIRROR_ROOT))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Closure, VMCreateInfo};

    #[test]
    fn root_answers_every_meta_operation() {
        let mut vm = VM::new(VMCreateInfo::default());
        let root = vm.default_mirror();
        assert!(vm.is_mirror_root(&root));
        for desc in META_OPERATIONS {
            assert!(
                vm.responds_to(&root, desc.op.selector()).unwrap(),
                "missing {}",
                desc.name
            );
        }
    }

    #[test]
    fn root_is_a_singleton() {
        let mut vm = VM::new(VMCreateInfo::default());
        let root = vm.default_mirror();
        let copy = vm.clone_value(&root).unwrap();
        assert!(copy.is_identical(&root));
    }

    #[test]
    fn unbound_mirrors_cannot_perform_defaults() {
        let mut vm = VM::new(VMCreateInfo::default());
        let mirror = vm.fresh_mirror();
        let err = vm.invoke(&mirror, Symbol::intern("print"), &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalOperation { .. }));
    }

    #[test]
    fn mirrors_see_their_base() {
        let mut vm = VM::new(VMCreateInfo::default());
        let code = Value::closure(Closure::new(
            Method::native("code", &[], |_, _, _| Ok(Value::Nil)).unwrap(),
            vm.top_level_context(),
        ));
        let root = vm.default_mirror();
        let mirage = vm.create_mirage(&code, &root).unwrap();
        let mirror = Value::Object(vm.mirror_of(mirage.as_object().unwrap()).unwrap());
        assert_eq!(vm.mirror_base(&mirror).unwrap(), mirage.as_object().unwrap());

        // the base field is read-only
        assert!(matches!(
            vm.assign_field(&mirror, Symbol::intern("base"), Value::Nil),
            Err(RuntimeError::IllegalOperation { .. })
        ));
        // and binding again is refused
        let other = Value::Object(vm.new_mirage(Value::Nil, ParentLink::IsA, None, &[]));
        assert!(matches!(
            vm.invoke(&mirror, Symbol::intern("init"), &[other]),
            Err(RuntimeError::IllegalOperation { .. })
        ));
    }

    #[test]
    fn only_inherited_meta_methods_are_short_circuited() {
        let mut vm = VM::new(VMCreateInfo::default());
        let empty = Value::closure(Closure::new(
            Method::native("code", &[], |_, _, _| Ok(Value::Nil)).unwrap(),
            vm.top_level_context(),
        ));
        let root = vm.default_mirror();
        let plain = vm.create_mirage(&empty, &root).unwrap();
        let plain = plain.as_object().unwrap();
        assert_eq!(vm.default_target(plain, MetaOp::Invoke).unwrap(), Some(plain));

        let body = Value::closure(Closure::new(
            Method::native("code", &[], |vm, ctx, _| {
                let invoke = Method::native(
                    "invoke",
                    &["receiver", "selector", "arguments"],
                    |vm, ctx, args| vm.super_send(ctx, Symbol::intern("invoke"), args),
                )?;
                vm.add_method(&Value::Object(ctx.lexical_scope), Value::Method(invoke))?;
                Ok(Value::Nil)
            })
            .unwrap(),
            vm.top_level_context(),
        ));
        let overriding = vm.extend(&root, &body).unwrap();
        let mirage = vm.create_mirage(&empty, &overriding).unwrap();
        let id = mirage.as_object().unwrap();
        assert_eq!(vm.default_target(id, MetaOp::Invoke).unwrap(), None);
        assert_eq!(vm.default_target(id, MetaOp::Select).unwrap(), Some(id));

        // an ordinary object has no mirror to skip
        let object = vm.new_object().as_object().unwrap();
        assert_eq!(vm.default_target(object, MetaOp::Invoke).unwrap(), None);
    }
}
