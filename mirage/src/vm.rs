use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, warn};

use crate::{
    ActorId, Closure, Context, GarbageCollectionStats, Heap, HeapObject,
    HeapSettings, Method, ObjectId, PRIMITIVES, ParentLink, PrimitiveMessage,
    PrototypeObject, RuntimeResult, SlotFlags, Symbol, TypeTag, Value,
    mirror::bootstrap_mirror_root, selector_from_host_name,
};

#[derive(Debug)]
pub struct SpecialObjects {
    /// outermost lexical scope
    pub lexical_root: ObjectId,
    pub mirror_root: ObjectId,
    /// the mirror root's meta methods, indexed by [`MetaOp`](crate::MetaOp)
    pub mirror_defaults: Box<[Arc<Method>]>,
    /// marks objects that pass by copy
    pub isolate_tag: Arc<TypeTag>,
}

/// Selectors the runtime itself sends.
#[derive(Debug, Clone, Copy)]
pub struct Names {
    pub apply: Symbol,
    pub base: Symbol,
    pub init: Symbol,
    pub name: Symbol,
    pub new: Symbol,
    pub read_field: Symbol,
    pub write_field: Symbol,
}

impl Names {
    fn new() -> Self {
        Self {
            apply: Symbol::intern("apply"),
            base: Symbol::intern("base"),
            init: Symbol::intern("init"),
            name: Symbol::intern("name"),
            new: Symbol::intern("new"),
            read_field: Symbol::intern("readField"),
            write_field: Symbol::intern("writeField"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VMCreateInfo {
    pub heap: HeapSettings,
    /// log every mirror forwarding and mirror root escape at trace level
    pub trace_forwarding: bool,
    pub actor: ActorId,
}

/// One actor's object world.
#[derive(Debug)]
pub struct VM {
    pub(crate) heap: Heap,
    pub(crate) specials: SpecialObjects,
    pub(crate) names: Names,
    pub(crate) primitives: AHashMap<Symbol, &'static PrimitiveMessage>,
    pub(crate) actor: ActorId,
    pub(crate) trace_forwarding: bool,
}

impl VM {
    pub fn new(info: VMCreateInfo) -> Self {
        let mut heap = Heap::new(info.heap);

        let family = heap.new_family();
        let lexical_root = PrototypeObject::new(Value::Nil, ParentLink::IsA, None, family);
        let lexical_root = heap.allocate(HeapObject::Object(lexical_root));
        let (mirror_root, mirror_defaults) = bootstrap_mirror_root(&mut heap, lexical_root);

        // the root mirror is reachable from code, but cannot be replaced
        let _ = heap.storage_mut(lexical_root).put_field(
            Symbol::intern("defaultMirror"),
            Value::Object(mirror_root),
            SlotFlags::empty(),
        );

        let mut primitives = AHashMap::new();
        for primitive in PRIMITIVES {
            match selector_from_host_name(primitive.name) {
                Ok(selector) => {
                    primitives.insert(selector, primitive);
                }
                Err(err) => warn!("skipping primitive {}: {err}", primitive.name),
            }
        }

        debug!(
            "vm for actor {} ready: lexical root {lexical_root}, mirror root {mirror_root}",
            info.actor.0
        );
        Self {
            heap,
            specials: SpecialObjects {
                lexical_root,
                mirror_root,
                mirror_defaults,
                isolate_tag: TypeTag::new("Isolate", &[]),
            },
            names: Names::new(),
            primitives,
            actor: info.actor,
            trace_forwarding: info.trace_forwarding,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn specials(&self) -> &SpecialObjects {
        &self.specials
    }

    pub fn top_level_context(&self) -> Context {
        let root = self.specials.lexical_root;
        Context::new(root, Value::Object(root), Value::Nil)
    }

    pub fn default_mirror(&self) -> Value {
        Value::Object(self.specials.mirror_root)
    }

    pub fn isolate_tag(&self) -> Arc<TypeTag> {
        Arc::clone(&self.specials.isolate_tag)
    }

    /// An empty orphan nested in the top-level scope.
    pub fn new_object(&mut self) -> Value {
        let family = self.heap.new_family();
        let object = PrototypeObject::new(
            Value::Nil,
            ParentLink::IsA,
            Some(self.specials.lexical_root),
            family,
        );
        Value::Object(self.heap.allocate(HeapObject::Object(object)))
    }

    /// `object: { code }`
    pub fn object_literal(&mut self, code: &Value) -> RuntimeResult<Value> {
        self.default_extend(Value::Nil, code, ParentLink::IsA, &[])
    }

    /// A new object on `parent` carrying `tags`. The parent's meta-level is
    /// not consulted; tags can only be attached at creation.
    pub fn object_with(
        &mut self,
        parent: &Value,
        link: ParentLink,
        code: &Value,
        tags: &[Arc<TypeTag>],
    ) -> RuntimeResult<Value> {
        self.default_extend(parent.clone(), code, link, tags)
    }

    /// An orphan tagged as pass-by-copy.
    pub fn isolate(&mut self, code: &Value) -> RuntimeResult<Value> {
        let tag = self.isolate_tag();
        self.default_extend(Value::Nil, code, ParentLink::IsA, &[tag])
    }

    /// A closure over the top-level scope around a host function.
    pub fn native_closure<F>(
        &self,
        name: &str,
        parameters: &[&str],
        body: F,
    ) -> RuntimeResult<Value>
    where
        F: Fn(&mut VM, &Context, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        let method = Method::native(name, parameters, body)?;
        Ok(Value::closure(Closure::new(method, self.top_level_context())))
    }

    /// Collects everything unreachable from the roots of this VM and
    /// `extra_roots`. Must not run while any activation is in progress.
    pub fn collect_garbage(&mut self, extra_roots: &[Value]) -> GarbageCollectionStats {
        let mut roots = vec![
            Value::Object(self.specials.lexical_root),
            Value::Object(self.specials.mirror_root),
        ];
        roots.extend_from_slice(extra_roots);
        self.heap.collect(&roots)
    }

    pub fn maybe_collect(&mut self, extra_roots: &[Value]) -> Option<GarbageCollectionStats> {
        self.heap
            .should_collect()
            .then(|| self.collect_garbage(extra_roots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mirror_is_visible_and_constant() {
        let mut vm = VM::new(VMCreateInfo::default());
        let root = vm.top_level_context().lexical_scope;
        let name = Symbol::intern("defaultMirror");
        let mirror = vm.lookup(root, name).unwrap();
        assert!(mirror.is_identical(&vm.default_mirror()));
        assert!(vm.assign_variable(root, name, Value::Nil).is_err());
    }

    #[test]
    fn unreachable_objects_are_collected() {
        let mut vm = VM::new(VMCreateInfo::default());
        let kept = vm.new_object();
        let _dropped = vm.new_object();
        let before = vm.heap().live_count();
        let stats = vm.collect_garbage(&[kept.clone()]);
        assert_eq!(stats.freed, 1);
        assert_eq!(stats.live, before - 1);
        assert!(vm.heap().contains(kept.as_object().unwrap()));
    }

    #[test]
    fn mirror_cycles_are_collected_together() {
        let mut vm = VM::new(VMCreateInfo::default());
        let code = vm.native_closure("code", &[], |_, _, _| Ok(Value::Nil)).unwrap();
        let root = vm.default_mirror();
        let mirage = vm.create_mirage(&code, &root).unwrap();
        let id = mirage.as_object().unwrap();
        let mirror = vm.mirror_of(id).unwrap();

        vm.collect_garbage(&[mirage.clone()]);
        assert!(vm.heap().contains(mirror));

        vm.collect_garbage(&[]);
        assert!(!vm.heap().contains(id));
        assert!(!vm.heap().contains(mirror));
    }

    #[test]
    fn collection_waits_for_the_threshold() {
        let mut vm = VM::new(VMCreateInfo {
            heap: HeapSettings {
                initial_capacity: 8,
                collect_threshold: 4,
            },
            ..VMCreateInfo::default()
        });
        // bootstrap allocated the two roots
        assert!(vm.maybe_collect(&[]).is_none());
        vm.new_object();
        vm.new_object();
        assert_eq!(vm.maybe_collect(&[]).map(|s| s.freed), Some(2));
    }
}
