use std::sync::Arc;

use bitflags::bitflags;
use log::debug;

use crate::{
    Arity, Closure, Context, FarReference, HeapObject, LookupResult, MetaOp, Method,
    NativeField, ObjectId, Parameter, RuntimeError, RuntimeResult, Slot,
    SlotFlags, SlotStorage, Symbol, TypeTag, VM, Value,
};

/// Kind of the dynamic-parent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink {
    /// cloning the child clones the parent too
    IsA,
    /// clones keep pointing at the same parent
    SharesA,
}

/// Objects created by cloning share the family of their original; allocation
/// from scratch and extension start a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloneFamily(pub(crate) u64);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u8 {
        /// clone answers the object itself
        const SINGLETON = 1 << 0;
        const MIRROR_ROOT = 1 << 1;
    }
}

#[derive(Debug, Clone)]
pub struct PrototypeObject {
    pub slots: SlotStorage,
    pub dynamic_parent: Value,
    pub lexical_parent: Option<ObjectId>,
    pub link: ParentLink,
    pub type_tags: Arc<[Arc<TypeTag>]>,
    pub family: CloneFamily,
    pub flags: ObjectFlags,
}

impl PrototypeObject {
    pub fn new(
        dynamic_parent: Value,
        link: ParentLink,
        lexical_parent: Option<ObjectId>,
        family: CloneFamily,
    ) -> Self {
        Self {
            slots: SlotStorage::new(),
            dynamic_parent,
            lexical_parent,
            link,
            type_tags: Arc::from([]),
            family,
            flags: ObjectFlags::empty(),
        }
    }

    pub fn with_type_tags(mut self, tags: &[Arc<TypeTag>]) -> Self {
        self.type_tags = Arc::from(tags);
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.flags.contains(ObjectFlags::SINGLETON)
    }
}

fn not_found(selector: Symbol, receiver: &Value) -> RuntimeError {
    RuntimeError::SelectorNotFound {
        selector,
        receiver: receiver.to_string(),
    }
}

// Default semantics of every meta operation. These operate on the node
// itself and never consult its mirror; `meta.rs` decides when they apply.
impl VM {
    pub(crate) fn parent_of(&self, id: ObjectId) -> Value {
        self.heap
            .body(id)
            .map(|body| body.dynamic_parent.clone())
            .unwrap_or(Value::Nil)
    }

    pub(crate) fn method_closure(
        &self,
        holder: ObjectId,
        method: Arc<Method>,
        receiver: &Value,
    ) -> Closure {
        let super_view = self.parent_of(holder);
        Closure::new(method, Context::new(holder, receiver.clone(), super_view))
    }

    /// The object whose slot an accessor closure reads: the frame's
    /// lexical parent when applied normally.
    fn slot_owner(&self, ctx: &Context) -> RuntimeResult<ObjectId> {
        let scope = ctx.lexical_scope;
        if !self.heap.is_frame(scope) {
            return Ok(scope);
        }
        self.heap.lexical_parent(scope).ok_or_else(|| {
            RuntimeError::internal(format!("frame {scope} has no lexical parent"))
        })
    }

    pub(crate) fn read_slot(
        &mut self,
        holder: ObjectId,
        name: Symbol,
    ) -> RuntimeResult<Value> {
        let storage = self.heap.storage(holder);
        if let Some(index) = storage.field_index(name) {
            return Ok(storage.read(index));
        }
        match storage.grab_custom(name) {
            Some(field) => {
                let read = self.names.read_field;
                self.invoke(&field, read, &[])
            }
            None => Err(not_found(name, &Value::Object(holder))),
        }
    }

    pub(crate) fn write_slot(
        &mut self,
        holder: ObjectId,
        name: Symbol,
        value: Value,
    ) -> RuntimeResult<()> {
        let storage = self.heap.storage_mut(holder);
        if let Some(index) = storage.field_index(name) {
            if !storage.field_info(index).flags.contains(SlotFlags::MUTABLE) {
                return Err(RuntimeError::illegal_operation(format!(
                    "field `{name}` of {} has no mutator",
                    Value::Object(holder)
                )));
            }
            storage.write(index, value);
            return Ok(());
        }
        match storage.grab_custom(name) {
            Some(field) => {
                let write = self.names.write_field;
                self.invoke(&field, write, &[value]).map(|_| ())
            }
            None => Err(not_found(name, &Value::Object(holder))),
        }
    }

    fn accessor(&self, holder: ObjectId, receiver: &Value, name: Symbol) -> Value {
        let method = Method::builtin(name, Vec::new(), move |vm, ctx, _| {
            let holder = vm.slot_owner(ctx)?;
            vm.read_slot(holder, name)
        });
        let ctx = Context::new(holder, receiver.clone(), Value::Nil);
        Value::closure(Closure::new(method, ctx))
    }

    fn mutator(
        &self,
        holder: ObjectId,
        receiver: &Value,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        let name = selector.assignment_target().ok_or_else(|| {
            RuntimeError::internal(format!("`{selector}` is not an assignment"))
        })?;
        let parameters = vec![Parameter::Required(Symbol::intern("value"))];
        let method = Method::builtin(selector, parameters, move |vm, ctx, args| {
            let holder = vm.slot_owner(ctx)?;
            vm.write_slot(holder, name, args[0].clone())?;
            Ok(args[0].clone())
        });
        let ctx = Context::new(holder, receiver.clone(), Value::Nil);
        Ok(Value::closure(Closure::new(method, ctx)))
    }

    fn check_mutable(
        &self,
        holder: ObjectId,
        selector: Symbol,
        flags: SlotFlags,
    ) -> RuntimeResult<()> {
        if flags.contains(SlotFlags::MUTABLE) {
            Ok(())
        } else {
            Err(RuntimeError::illegal_operation(format!(
                "`{selector}` of {} has no mutator",
                Value::Object(holder)
            )))
        }
    }

    /// Fields holding closures are applied by invoke; any other value is
    /// only readable.
    fn apply_field_value(
        &mut self,
        selector: Symbol,
        value: Value,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        match value {
            Value::Closure(closure) => self.apply(&closure, args),
            value if args.is_empty() => Ok(value),
            _ => Err(RuntimeError::ArityMismatch {
                selector,
                expected: Arity::exact(0),
                got: args.len(),
            }),
        }
    }

    fn invoke_slot(
        &mut self,
        holder: ObjectId,
        slot: Slot,
        receiver: &Value,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        match slot {
            Slot::Field { index, .. } => {
                let value = self.heap.storage(holder).read(index);
                self.apply_field_value(selector, value, args)
            }
            Slot::Custom(field) => {
                let read = self.names.read_field;
                let value = self.invoke(&field, read, &[])?;
                self.apply_field_value(selector, value, args)
            }
            Slot::Mutator { .. } | Slot::CustomMutator(_) => {
                let [value] = args else {
                    return Err(RuntimeError::ArityMismatch {
                        selector,
                        expected: Arity::exact(1),
                        got: args.len(),
                    });
                };
                let name = selector.assignment_target().ok_or_else(|| {
                    RuntimeError::internal(format!("`{selector}` is not an assignment"))
                })?;
                self.write_slot(holder, name, value.clone())?;
                Ok(value.clone())
            }
            Slot::Method(method) => {
                let closure = self.method_closure(holder, method, receiver);
                self.apply(&closure, args)
            }
        }
    }

    /// End of the dynamic chain: base primitives, then `doesNotUnderstand`
    /// sent to the receiver.
    pub(crate) fn invoke_fallback(
        &mut self,
        receiver: &Value,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        if let Some(primitive) = self.base_primitive(selector) {
            return self.call_primitive(primitive, receiver, selector, args);
        }
        let handler = self.does_not_understand(receiver, selector)?;
        self.apply_value(&handler, args)
    }

    pub(crate) fn select_fallback(
        &mut self,
        receiver: &Value,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        if let Some(primitive) = self.base_primitive(selector) {
            let parameters = vec![Parameter::Rest(Symbol::intern("arguments"))];
            let method = Method::builtin(selector, parameters, move |vm, ctx, args| {
                vm.call_primitive(primitive, &ctx.receiver, selector, args)
            });
            let ctx = Context::new(self.specials.lexical_root, receiver.clone(), Value::Nil);
            return Ok(Value::closure(Closure::new(method, ctx)));
        }
        self.does_not_understand(receiver, selector)
    }

    /// A mirage parent whose mirror would answer `op` with the default is
    /// searched in place instead of being sent the meta-level message.
    fn delegated_default(
        &mut self,
        parent: &Value,
        op: MetaOp,
    ) -> RuntimeResult<Option<ObjectId>> {
        match parent {
            Value::Object(id) if self.heap.is_mirage(*id) => self.default_target(*id, op),
            _ => Ok(None),
        }
    }

    pub(crate) fn default_invoke(
        &mut self,
        target: ObjectId,
        receiver: &Value,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let mut target = target;
        loop {
            match self.heap.search_dynamic(target, selector) {
                LookupResult::Found { holder, slot } => {
                    return self.invoke_slot(holder, slot, receiver, selector, args);
                }
                LookupResult::Delegate(parent) => {
                    match self.delegated_default(&parent, MetaOp::Invoke)? {
                        Some(base) => target = base,
                        None => return self.meta_invoke(&parent, receiver, selector, args),
                    }
                }
                LookupResult::None => return self.invoke_fallback(receiver, selector, args),
            }
        }
    }

    pub(crate) fn default_select(
        &mut self,
        target: ObjectId,
        receiver: &Value,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        let mut target = target;
        let (holder, slot) = loop {
            match self.heap.search_dynamic(target, selector) {
                LookupResult::Found { holder, slot } => break (holder, slot),
                LookupResult::Delegate(parent) => {
                    match self.delegated_default(&parent, MetaOp::Select)? {
                        Some(base) => target = base,
                        None => return self.meta_select(&parent, receiver, selector),
                    }
                }
                LookupResult::None => return self.select_fallback(receiver, selector),
            }
        };
        match slot {
            Slot::Field { .. } | Slot::Custom(_) => Ok(self.accessor(holder, receiver, selector)),
            Slot::Mutator { flags, .. } => {
                self.check_mutable(holder, selector, flags)?;
                self.mutator(holder, receiver, selector)
            }
            Slot::CustomMutator(_) => self.mutator(holder, receiver, selector),
            Slot::Method(method) => Ok(Value::closure(
                self.method_closure(holder, method, receiver),
            )),
        }
    }

    pub(crate) fn default_lookup(
        &mut self,
        scope: ObjectId,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        match self.heap.search_lexical(scope, selector) {
            LookupResult::Found { holder, slot } => {
                let owner = Value::Object(holder);
                match slot {
                    Slot::Field { index, .. } => Ok(self.heap.storage(holder).read(index)),
                    Slot::Custom(field) => {
                        let read = self.names.read_field;
                        self.invoke(&field, read, &[])
                    }
                    Slot::Mutator { flags, .. } => {
                        self.check_mutable(holder, selector, flags)?;
                        self.mutator(holder, &owner, selector)
                    }
                    Slot::CustomMutator(_) => self.mutator(holder, &owner, selector),
                    Slot::Method(method) => {
                        Ok(Value::closure(self.method_closure(holder, method, &owner)))
                    }
                }
            }
            LookupResult::Delegate(enclosing) => {
                let enclosing = enclosing.expect_object("lexical scope")?;
                self.lookup(enclosing, selector)
            }
            LookupResult::None => Err(not_found(selector, &Value::Object(scope))),
        }
    }

    pub(crate) fn default_call(
        &mut self,
        scope: ObjectId,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        match self.default_lookup(scope, selector)? {
            Value::Closure(closure) => self.apply(&closure, args),
            value if args.is_empty() => Ok(value),
            value => self.apply_value(&value, args),
        }
    }

    pub(crate) fn default_assign_field(
        &mut self,
        target: ObjectId,
        selector: Symbol,
        value: Value,
    ) -> RuntimeResult<()> {
        let mut target = target;
        loop {
            match self.heap.search_dynamic(target, selector) {
                LookupResult::Found {
                    holder,
                    slot: Slot::Field { .. } | Slot::Custom(_),
                } => return self.write_slot(holder, selector, value),
                LookupResult::Found { holder, .. } => {
                    return Err(RuntimeError::illegal_operation(format!(
                        "`{selector}` of {} is not a field",
                        Value::Object(holder)
                    )));
                }
                LookupResult::Delegate(parent) => {
                    match self.delegated_default(&parent, MetaOp::AssignField)? {
                        Some(base) => target = base,
                        None => return self.assign_field(&parent, selector, value),
                    }
                }
                LookupResult::None => {
                    return Err(not_found(selector, &Value::Object(target)));
                }
            }
        }
    }

    pub(crate) fn default_assign_variable(
        &mut self,
        scope: ObjectId,
        selector: Symbol,
        value: Value,
    ) -> RuntimeResult<()> {
        match self.heap.search_lexical(scope, selector) {
            LookupResult::Found {
                holder,
                slot: Slot::Field { .. } | Slot::Custom(_),
            } => self.write_slot(holder, selector, value),
            LookupResult::Found { holder, .. } => {
                Err(RuntimeError::illegal_operation(format!(
                    "`{selector}` of {} is not a variable",
                    Value::Object(holder)
                )))
            }
            LookupResult::Delegate(enclosing) => {
                let enclosing = enclosing.expect_object("lexical scope")?;
                self.assign_variable(enclosing, selector, value)
            }
            LookupResult::None => Err(not_found(selector, &Value::Object(scope))),
        }
    }

    pub(crate) fn default_define_field(
        &mut self,
        target: ObjectId,
        selector: Symbol,
        value: Value,
    ) -> RuntimeResult<()> {
        self.heap
            .storage_mut(target)
            .put_field(selector, value, SlotFlags::MUTABLE)
            .map(|_| ())
    }

    /// Copies one node onto `parent`, re-instantiating its custom fields
    /// against the copy.
    pub(crate) fn clone_node(
        &mut self,
        original: ObjectId,
        parent: Value,
        wrap: impl FnOnce(PrototypeObject) -> HeapObject,
    ) -> RuntimeResult<ObjectId> {
        let body = self.heap.body(original).ok_or_else(|| {
            RuntimeError::illegal_operation(format!("{original} cannot be cloned"))
        })?;
        let (slots, custom) = body.slots.clone_layout();
        let copy = PrototypeObject {
            slots,
            dynamic_parent: parent,
            lexical_parent: body.lexical_parent,
            link: body.link,
            type_tags: Arc::clone(&body.type_tags),
            family: body.family,
            flags: body.flags,
        };
        let copy = self.heap.allocate(wrap(copy));

        let new = self.names.new;
        for field in custom {
            let instance = self.invoke(&field.field, new, &[Value::Object(copy)])?;
            self.heap.storage_mut(copy).add_custom(field.name, instance)?;
        }
        Ok(copy)
    }

    /// Parent for a copy of `id`: is-a parents are cloned (through their own
    /// meta-level), shares-a parents are kept.
    pub(crate) fn cloned_parent(&mut self, id: ObjectId) -> RuntimeResult<Value> {
        let Some(body) = self.heap.body(id) else {
            return Ok(Value::Nil);
        };
        let (link, parent) = (body.link, body.dynamic_parent.clone());
        match link {
            ParentLink::IsA => self.clone_value(&parent),
            ParentLink::SharesA => Ok(parent),
        }
    }

    pub(crate) fn default_clone(&mut self, id: ObjectId) -> RuntimeResult<ObjectId> {
        if self.heap.is_mirage(id) {
            return self.clone_mirage(id);
        }
        if self.heap.body(id).is_some_and(PrototypeObject::is_singleton) {
            return Ok(id);
        }

        // the is-a stretch of ordinary objects above `id`, cloned top-down
        let mut stretch = vec![id];
        let mut current = id;
        while let Some(body) = self.heap.body(current) {
            let next = match (&body.link, &body.dynamic_parent) {
                (ParentLink::IsA, Value::Object(parent)) => *parent,
                _ => break,
            };
            let plain = matches!(
                self.heap.get(next),
                HeapObject::Object(parent) if !parent.is_singleton()
            );
            if !plain {
                break;
            }
            stretch.push(next);
            current = next;
        }

        let mut parent = self.cloned_parent(current)?;
        let mut copy = id;
        for &original in stretch.iter().rev() {
            copy = self.clone_node(original, parent, HeapObject::Object)?;
            parent = Value::Object(copy);
        }
        debug!("cloned {id} into {copy} ({} level(s))", stretch.len());
        Ok(copy)
    }

    /// A new object whose dynamic parent is `parent`; `code` runs with the
    /// new object as scope and receiver.
    pub(crate) fn default_extend(
        &mut self,
        parent: Value,
        code: &Value,
        link: ParentLink,
        tags: &[Arc<TypeTag>],
    ) -> RuntimeResult<Value> {
        let code = code.expect_closure("extension code")?;
        let family = self.heap.new_family();
        let object = PrototypeObject::new(
            parent.clone(),
            link,
            Some(code.context.lexical_scope),
            family,
        )
        .with_type_tags(tags);
        let id = self.heap.allocate(HeapObject::Object(object));
        debug!("extended {parent} into {id} ({link:?})");

        let ctx = Context::new(id, Value::Object(id), parent);
        self.apply_in_scope(&code, &[], &ctx)?;
        Ok(Value::Object(id))
    }

    /// A handler that fails with `SelectorNotFound` once applied.
    pub(crate) fn default_dnu(&self, receiver: &Value, selector: Symbol) -> Value {
        let parameters = vec![Parameter::Rest(Symbol::intern("arguments"))];
        let method = Method::builtin(selector, parameters, move |_, ctx, _| {
            Err(not_found(selector, &ctx.receiver))
        });
        let scope = receiver.as_object().unwrap_or(self.specials.lexical_root);
        let ctx = Context::new(scope, receiver.clone(), Value::Nil);
        Value::closure(Closure::new(method, ctx))
    }

    pub(crate) fn family_of(&self, value: &Value) -> Option<CloneFamily> {
        let id = value.as_object()?;
        self.heap.body(id).map(|body| body.family)
    }

    pub(crate) fn default_is_clone_of(&self, id: ObjectId, other: &Value) -> bool {
        match (self.family_of(&Value::Object(id)), self.family_of(other)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn default_is_related_to(
        &mut self,
        id: ObjectId,
        other: &Value,
    ) -> RuntimeResult<bool> {
        let mut current = id;
        loop {
            if self.default_is_clone_of(current, other) {
                return Ok(true);
            }
            match self.parent_of(current) {
                Value::Nil => return Ok(false),
                Value::Object(parent) if self.heap.is_plain_object(parent) => {
                    current = parent;
                }
                parent => return self.is_related_to(&parent, other),
            }
        }
    }

    pub(crate) fn default_add_field(
        &mut self,
        target: ObjectId,
        field: &Value,
    ) -> RuntimeResult<()> {
        match field {
            Value::Field(native) => {
                let value = self.read_slot(native.host, native.name)?;
                let host = self.heap.storage(native.host);
                let flags = host
                    .field_index(native.name)
                    .map_or(SlotFlags::MUTABLE, |i| host.field_info(i).flags);
                self.heap
                    .storage_mut(target)
                    .put_field(native.name, value, flags)
                    .map(|_| ())
            }
            Value::Method(_) | Value::Closure(_) => Err(RuntimeError::illegal_argument(
                format!("{field} is not a field"),
            )),
            custom => {
                let name = self.names.name;
                let name = self.invoke(custom, name, &[])?.expect_symbol("field name")?;
                if self.heap.storage(target).has_slot(name) {
                    return Err(RuntimeError::DuplicateSlot { selector: name });
                }
                let new = self.names.new;
                let instance = self.invoke(custom, new, &[Value::Object(target)])?;
                self.heap.storage_mut(target).add_custom(name, instance)
            }
        }
    }

    pub(crate) fn default_grab_field(
        &self,
        target: ObjectId,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        let storage = self.heap.storage(target);
        if storage.field_index(selector).is_some() {
            return Ok(Value::Field(Arc::new(NativeField {
                host: target,
                name: selector,
            })));
        }
        storage
            .grab_custom(selector)
            .ok_or_else(|| not_found(selector, &Value::Object(target)))
    }

    pub(crate) fn default_list_fields(&self, target: ObjectId) -> Vec<Value> {
        let storage = self.heap.storage(target);
        let native = storage.field_map().iter().map(|info| {
            Value::Field(Arc::new(NativeField {
                host: target,
                name: info.name,
            }))
        });
        let custom = storage.custom_fields().iter().map(|f| f.field.clone());
        native.chain(custom).collect()
    }

    pub(crate) fn default_add_method(
        &mut self,
        target: ObjectId,
        method: &Value,
    ) -> RuntimeResult<()> {
        let method = match method {
            Value::Closure(closure) => Arc::clone(&closure.method),
            other => other.expect_method("method")?,
        };
        self.heap.storage_mut(target).add_method(method)
    }

    pub(crate) fn default_grab_method(
        &self,
        target: ObjectId,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        self.heap
            .storage(target)
            .grab_method(selector)
            .map(Value::Method)
            .ok_or_else(|| not_found(selector, &Value::Object(target)))
    }

    pub(crate) fn default_list_methods(&self, target: ObjectId) -> Vec<Value> {
        let storage = self.heap.storage(target);
        storage.methods().iter().cloned().map(Value::Method).collect()
    }

    pub(crate) fn default_add_slot(
        &mut self,
        target: ObjectId,
        slot: &Value,
    ) -> RuntimeResult<()> {
        match slot {
            Value::Method(_) | Value::Closure(_) => self.default_add_method(target, slot),
            field => self.default_add_field(target, field),
        }
    }

    pub(crate) fn default_grab_slot(
        &self,
        target: ObjectId,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        if self.heap.storage(target).methods().contains(selector) {
            self.default_grab_method(target, selector)
        } else {
            self.default_grab_field(target, selector)
        }
    }

    /// Removes a local slot and answers what it held: the field's value, the
    /// method, or the custom field object.
    pub(crate) fn default_remove_slot(
        &mut self,
        target: ObjectId,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        let storage = self.heap.storage_mut(target);
        if let Some(value) = storage.remove_field(selector) {
            return Ok(value);
        }
        if let Some(method) = storage.remove_method(selector) {
            return Ok(Value::Method(method));
        }
        storage
            .remove_custom(selector)
            .ok_or_else(|| not_found(selector, &Value::Object(target)))
    }

    pub(crate) fn default_list_slots(&self, target: ObjectId) -> Vec<Value> {
        let mut slots = self.default_list_fields(target);
        slots.extend(self.default_list_methods(target));
        slots
    }

    pub(crate) fn default_responds_to(
        &mut self,
        target: ObjectId,
        selector: Symbol,
    ) -> RuntimeResult<bool> {
        let mut target = target;
        loop {
            match self.heap.search_dynamic(target, selector) {
                LookupResult::Found {
                    slot: Slot::Mutator { flags, .. },
                    ..
                } => return Ok(flags.contains(SlotFlags::MUTABLE)),
                LookupResult::Found { .. } => return Ok(true),
                LookupResult::Delegate(parent) => {
                    match self.delegated_default(&parent, MetaOp::RespondsTo)? {
                        Some(base) => target = base,
                        None => return self.responds_to(&parent, selector),
                    }
                }
                LookupResult::None => return Ok(self.base_primitive(selector).is_some()),
            }
        }
    }

    /// Isolates travel by copy, everything else as a far reference.
    pub(crate) fn default_pass(&mut self, id: ObjectId) -> RuntimeResult<Value> {
        let isolate = Arc::clone(&self.specials.isolate_tag);
        if self.default_is_tagged_as(id, &isolate)? {
            return Ok(Value::Object(id));
        }
        Ok(Value::FarReference(FarReference {
            target: id,
            owner: self.actor,
        }))
    }

    pub(crate) fn default_print(&self, id: ObjectId) -> Value {
        let text = match self.heap.get(id) {
            HeapObject::Mirage(_) => format!("<mirage:{id}>"),
            HeapObject::Frame(_) => format!("<frame:{id}>"),
            HeapObject::Object(_) => format!("<object:{id}>"),
        };
        Value::text(&text)
    }

    pub(crate) fn default_is_tagged_as(
        &mut self,
        id: ObjectId,
        tag: &Arc<TypeTag>,
    ) -> RuntimeResult<bool> {
        let mut current = id;
        loop {
            let Some(body) = self.heap.body(current) else {
                return Ok(false);
            };
            if body.type_tags.iter().any(|t| t.is_subtype_of(tag)) {
                return Ok(true);
            }
            match body.dynamic_parent.clone() {
                Value::Nil => return Ok(false),
                Value::Object(parent) if self.heap.is_plain_object(parent) => {
                    current = parent;
                }
                parent => return self.is_tagged_as(&parent, tag),
            }
        }
    }

    pub(crate) fn default_type_tags(&self, id: ObjectId) -> Vec<Value> {
        self.heap
            .body(id)
            .map(|body| body.type_tags.iter().cloned().map(Value::TypeTag).collect())
            .unwrap_or_default()
    }
}
