use std::{fmt, sync::Arc};

use log::trace;

use crate::{
    Arity, Closure, Context, HeapObject, Method, NativeField, ObjectId,
    Parameter, ParentLink, RuntimeError, RuntimeResult, Symbol, TypeTag, VM,
    Value, selector,
};

/// Every reflective operation an object answers.
///
/// The discriminant indexes [`META_OPERATIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaOp {
    Invoke,
    Select,
    Lookup,
    Call,
    AssignField,
    AssignVariable,
    DefineField,
    Clone,
    NewInstance,
    Extend,
    Share,
    DoesNotUnderstand,
    IsCloneOf,
    IsRelatedTo,
    AddField,
    GrabField,
    ListFields,
    AddMethod,
    GrabMethod,
    ListMethods,
    AddSlot,
    GrabSlot,
    RemoveSlot,
    ListSlots,
    RespondsTo,
    Eval,
    Quote,
    Pass,
    Resolve,
    Print,
    IsTaggedAs,
    TypeTags,
}

/// A meta operation as seen by mirrors: the selector a mirror implements it
/// under and the parameters the mirror receives.
#[derive(Debug, Copy, Clone)]
pub struct MetaOperation {
    pub op: MetaOp,
    pub name: &'static str,
    pub parameters: &'static [&'static str],
}

impl MetaOperation {
    pub const fn new(
        op: MetaOp,
        name: &'static str,
        parameters: &'static [&'static str],
    ) -> Self {
        Self {
            op,
            name,
            parameters,
        }
    }
}

pub const META_OPERATIONS: &[MetaOperation] = &[
    MetaOperation::new(MetaOp::Invoke, "invoke", &["receiver", "selector", "arguments"]),
    MetaOperation::new(MetaOp::Select, "select", &["receiver", "selector"]),
    MetaOperation::new(MetaOp::Lookup, "lookup", &["selector"]),
    MetaOperation::new(MetaOp::Call, "call", &["selector", "arguments"]),
    MetaOperation::new(MetaOp::AssignField, "assignField", &["selector", "value"]),
    MetaOperation::new(MetaOp::AssignVariable, "assignVariable", &["selector", "value"]),
    MetaOperation::new(MetaOp::DefineField, "defineField", &["selector", "value"]),
    MetaOperation::new(MetaOp::Clone, "clone", &[]),
    MetaOperation::new(MetaOp::NewInstance, "newInstance", &["arguments"]),
    MetaOperation::new(MetaOp::Extend, "extend", &["code"]),
    MetaOperation::new(MetaOp::Share, "share", &["code"]),
    MetaOperation::new(MetaOp::DoesNotUnderstand, "doesNotUnderstand", &["selector"]),
    MetaOperation::new(MetaOp::IsCloneOf, "isCloneOf", &["other"]),
    MetaOperation::new(MetaOp::IsRelatedTo, "isRelatedTo", &["other"]),
    MetaOperation::new(MetaOp::AddField, "addField", &["field"]),
    MetaOperation::new(MetaOp::GrabField, "grabField", &["selector"]),
    MetaOperation::new(MetaOp::ListFields, "listFields", &[]),
    MetaOperation::new(MetaOp::AddMethod, "addMethod", &["method"]),
    MetaOperation::new(MetaOp::GrabMethod, "grabMethod", &["selector"]),
    MetaOperation::new(MetaOp::ListMethods, "listMethods", &[]),
    MetaOperation::new(MetaOp::AddSlot, "addSlot", &["slot"]),
    MetaOperation::new(MetaOp::GrabSlot, "grabSlot", &["selector"]),
    MetaOperation::new(MetaOp::RemoveSlot, "removeSlot", &["selector"]),
    MetaOperation::new(MetaOp::ListSlots, "listSlots", &[]),
    MetaOperation::new(MetaOp::RespondsTo, "respondsTo", &["selector"]),
    MetaOperation::new(MetaOp::Eval, "eval", &["context"]),
    MetaOperation::new(MetaOp::Quote, "quote", &["context"]),
    MetaOperation::new(MetaOp::Pass, "pass", &[]),
    MetaOperation::new(MetaOp::Resolve, "resolve", &[]),
    MetaOperation::new(MetaOp::Print, "print", &[]),
    MetaOperation::new(MetaOp::IsTaggedAs, "isTaggedAs", &["tag"]),
    MetaOperation::new(MetaOp::TypeTags, "typeTags", &[]),
];

impl MetaOp {
    pub fn descriptor(self) -> &'static MetaOperation {
        &META_OPERATIONS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Selector a mirror implements this operation under.
    pub fn selector(self) -> Symbol {
        Symbol::intern(self.name())
    }

    /// Name in the meta-level host namespace, e.g. `meta_invoke`.
    pub fn host_name(self) -> String {
        selector::to_meta_name(self.selector())
    }

    pub fn arity(self) -> Arity {
        Arity::exact(self.descriptor().parameters.len())
    }

    pub fn from_selector(selector: Symbol) -> Option<MetaOp> {
        let name = selector.as_str();
        META_OPERATIONS
            .iter()
            .find(|desc| desc.name == &*name)
            .map(|desc| desc.op)
    }

    /// Frames are only lexical scopes.
    fn applies_to_frames(self) -> bool {
        matches!(
            self,
            MetaOp::Lookup | MetaOp::Call | MetaOp::AssignVariable | MetaOp::DefineField
        )
    }
}

impl fmt::Display for MetaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn symbol_arg(args: &[Value], index: usize) -> RuntimeResult<Symbol> {
    args[index].expect_symbol("selector")
}

fn table_arg(args: &[Value], index: usize) -> RuntimeResult<Arc<[Value]>> {
    args[index].expect_table("argument table")
}

impl VM {
    /// Routes `op` to whatever implements the target's meta-level: the
    /// default semantics for ordinary objects, the mirror for mirages and
    /// the value protocol for everything that is not a heap object.
    pub(crate) fn dispatch(
        &mut self,
        target: &Value,
        op: MetaOp,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let Value::Object(id) = target else {
            return self.perform_on_value(target, op, args);
        };
        match self.heap.get(*id) {
            HeapObject::Object(_) => self.perform_default(*id, op, args),
            HeapObject::Mirage(_) => self.forward(*id, op, args),
            HeapObject::Frame(_) if op.applies_to_frames() => {
                self.perform_default(*id, op, args)
            }
            HeapObject::Frame(_) => Err(RuntimeError::illegal_operation(format!(
                "`{op}` cannot be applied to call frame {id}"
            ))),
        }
    }

    /// Default semantics of `op` on `id`, whatever kind of node it is. This
    /// is the entry point the mirror root uses on mirages: it never looks at
    /// the node's mirror.
    pub(crate) fn perform_default(
        &mut self,
        id: ObjectId,
        op: MetaOp,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let arity = op.arity();
        if !arity.accepts(args.len()) {
            return Err(RuntimeError::ArityMismatch {
                selector: op.selector(),
                expected: arity,
                got: args.len(),
            });
        }
        let this = Value::Object(id);
        match op {
            MetaOp::Invoke => {
                let selector = symbol_arg(args, 1)?;
                let arguments = table_arg(args, 2)?;
                self.default_invoke(id, &args[0], selector, &arguments)
            }
            MetaOp::Select => self.default_select(id, &args[0], symbol_arg(args, 1)?),
            MetaOp::Lookup => self.default_lookup(id, symbol_arg(args, 0)?),
            MetaOp::Call => {
                let arguments = table_arg(args, 1)?;
                self.default_call(id, symbol_arg(args, 0)?, &arguments)
            }
            MetaOp::AssignField => self
                .default_assign_field(id, symbol_arg(args, 0)?, args[1].clone())
                .map(|_| Value::Nil),
            MetaOp::AssignVariable => self
                .default_assign_variable(id, symbol_arg(args, 0)?, args[1].clone())
                .map(|_| Value::Nil),
            MetaOp::DefineField => self
                .default_define_field(id, symbol_arg(args, 0)?, args[1].clone())
                .map(|_| Value::Nil),
            MetaOp::Clone => self.default_clone(id).map(Value::Object),
            MetaOp::NewInstance => {
                let arguments = table_arg(args, 0)?;
                let copy = Value::Object(self.default_clone(id)?);
                let init = self.names.init;
                self.invoke(&copy, init, &arguments)?;
                Ok(copy)
            }
            MetaOp::Extend => self.default_extend(this, &args[0], ParentLink::IsA, &[]),
            MetaOp::Share => self.default_extend(this, &args[0], ParentLink::SharesA, &[]),
            MetaOp::DoesNotUnderstand => Ok(self.default_dnu(&this, symbol_arg(args, 0)?)),
            MetaOp::IsCloneOf => Ok(Value::Bool(self.default_is_clone_of(id, &args[0]))),
            MetaOp::IsRelatedTo => self.default_is_related_to(id, &args[0]).map(Value::Bool),
            MetaOp::AddField => self.default_add_field(id, &args[0]).map(|_| Value::Nil),
            MetaOp::GrabField => self.default_grab_field(id, symbol_arg(args, 0)?),
            MetaOp::ListFields => Ok(Value::table(&self.default_list_fields(id))),
            MetaOp::AddMethod => self.default_add_method(id, &args[0]).map(|_| Value::Nil),
            MetaOp::GrabMethod => self.default_grab_method(id, symbol_arg(args, 0)?),
            MetaOp::ListMethods => Ok(Value::table(&self.default_list_methods(id))),
            MetaOp::AddSlot => self.default_add_slot(id, &args[0]).map(|_| Value::Nil),
            MetaOp::GrabSlot => self.default_grab_slot(id, symbol_arg(args, 0)?),
            MetaOp::RemoveSlot => self.default_remove_slot(id, symbol_arg(args, 0)?),
            MetaOp::ListSlots => Ok(Value::table(&self.default_list_slots(id))),
            MetaOp::RespondsTo => self
                .default_responds_to(id, symbol_arg(args, 0)?)
                .map(Value::Bool),
            MetaOp::Eval | MetaOp::Quote | MetaOp::Resolve => Ok(this),
            MetaOp::Pass => self.default_pass(id),
            MetaOp::Print => Ok(self.default_print(id)),
            MetaOp::IsTaggedAs => {
                let tag = args[0].expect_type_tag("type tag")?;
                self.default_is_tagged_as(id, &tag).map(Value::Bool)
            }
            MetaOp::TypeTags => Ok(Value::table(&self.default_type_tags(id))),
        }
    }

    /// Meta-level of values that do not live on the heap. They are
    /// immutable and have no slots of their own, only the small protocol of
    /// [`VM::value_protocol`] and the base primitives.
    fn perform_on_value(
        &mut self,
        value: &Value,
        op: MetaOp,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let arity = op.arity();
        if !arity.accepts(args.len()) {
            return Err(RuntimeError::ArityMismatch {
                selector: op.selector(),
                expected: arity,
                got: args.len(),
            });
        }
        match op {
            MetaOp::Invoke => {
                let selector = symbol_arg(args, 1)?;
                let arguments = table_arg(args, 2)?;
                match self.value_protocol(value, selector, &arguments)? {
                    Some(result) => Ok(result),
                    None => self.invoke_fallback(&args[0], selector, &arguments),
                }
            }
            MetaOp::Select => {
                let selector = symbol_arg(args, 1)?;
                if !self.value_responds_to(value, selector) {
                    return self.select_fallback(&args[0], selector);
                }
                let parameters = vec![Parameter::Rest(Symbol::intern("arguments"))];
                let method = Method::builtin(selector, parameters, move |vm, ctx, args| {
                    vm.meta_invoke(&ctx.super_view, &ctx.receiver, selector, args)
                });
                let ctx = Context::new(
                    self.specials.lexical_root,
                    args[0].clone(),
                    value.clone(),
                );
                Ok(Value::closure(Closure::new(method, ctx)))
            }
            MetaOp::Clone => Ok(value.clone()),
            MetaOp::NewInstance => {
                let arguments = table_arg(args, 0)?;
                let init = self.names.init;
                self.invoke(value, init, &arguments)?;
                Ok(value.clone())
            }
            MetaOp::Extend => self.default_extend(value.clone(), &args[0], ParentLink::IsA, &[]),
            MetaOp::Share => {
                self.default_extend(value.clone(), &args[0], ParentLink::SharesA, &[])
            }
            MetaOp::DoesNotUnderstand => Ok(self.default_dnu(value, symbol_arg(args, 0)?)),
            MetaOp::IsCloneOf | MetaOp::IsRelatedTo => {
                Ok(Value::Bool(value.is_identical(&args[0])))
            }
            MetaOp::RespondsTo => {
                let selector = symbol_arg(args, 0)?;
                let responds = self.value_responds_to(value, selector)
                    || self.base_primitive(selector).is_some();
                Ok(Value::Bool(responds))
            }
            MetaOp::Eval => {
                let ctx = args[0].expect_context("evaluation context")?;
                match value {
                    Value::Fragment(fragment) => fragment.eval(self, &ctx),
                    other => Ok(other.clone()),
                }
            }
            MetaOp::Quote => {
                let ctx = args[0].expect_context("evaluation context")?;
                match value {
                    Value::Fragment(fragment) => fragment.quote(self, &ctx),
                    other => Ok(other.clone()),
                }
            }
            MetaOp::Pass => Ok(value.clone()),
            MetaOp::Resolve => match value {
                Value::FarReference(far) if far.owner == self.actor => {
                    Ok(Value::Object(far.target))
                }
                other => Ok(other.clone()),
            },
            MetaOp::Print => Ok(Value::text(&value.to_string())),
            MetaOp::IsTaggedAs => Ok(Value::Bool(false)),
            MetaOp::TypeTags => Ok(Value::table(&[])),
            _ => Err(RuntimeError::illegal_operation(format!(
                "{} {value} does not support `{op}`",
                value.kind_name()
            ))),
        }
    }

    /// Messages non-object values understand themselves. `None` when the
    /// selector is not part of the value's protocol.
    fn value_protocol(
        &mut self,
        value: &Value,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Option<Value>> {
        if !self.value_responds_to(value, selector) {
            return Ok(None);
        }
        let names = &self.names;
        let expected = match value {
            Value::Closure(_) => 1,
            Value::Field(_) if selector == names.name || selector == names.read_field => 0,
            _ => 1,
        };
        if args.len() != expected {
            return Err(RuntimeError::ArityMismatch {
                selector,
                expected: Arity::exact(expected),
                got: args.len(),
            });
        }

        let result = match value {
            Value::Closure(closure) => {
                let arguments = table_arg(args, 0)?;
                self.apply(closure, &arguments)?
            }
            Value::Field(field) if selector == self.names.name => Value::Symbol(field.name),
            Value::Field(field) if selector == self.names.read_field => {
                self.read_slot(field.host, field.name)?
            }
            Value::Field(field) if selector == self.names.write_field => {
                self.write_slot(field.host, field.name, args[0].clone())?;
                Value::Nil
            }
            Value::Field(field) => {
                let host = args[0].expect_object("field host")?;
                Value::Field(Arc::new(NativeField {
                    host,
                    name: field.name,
                }))
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    fn value_responds_to(&self, value: &Value, selector: Symbol) -> bool {
        let names = &self.names;
        match value {
            Value::Closure(_) => selector == names.apply,
            Value::Field(_) => [names.name, names.read_field, names.write_field, names.new]
                .contains(&selector),
            _ => false,
        }
    }

    pub fn invoke(
        &mut self,
        receiver: &Value,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        self.meta_invoke(receiver, receiver, selector, args)
    }

    /// Sends `selector` starting the search at `target` while keeping
    /// `receiver` bound as `self`.
    pub fn meta_invoke(
        &mut self,
        target: &Value,
        receiver: &Value,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let args = [receiver.clone(), Value::Symbol(selector), Value::table(args)];
        self.dispatch(target, MetaOp::Invoke, &args)
    }

    /// Resumes the search at the parent of the method's holder.
    pub fn super_send(
        &mut self,
        ctx: &Context,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        self.meta_invoke(&ctx.super_view, &ctx.receiver, selector, args)
    }

    pub fn select(&mut self, receiver: &Value, selector: Symbol) -> RuntimeResult<Value> {
        self.meta_select(receiver, receiver, selector)
    }

    pub fn meta_select(
        &mut self,
        target: &Value,
        receiver: &Value,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        let args = [receiver.clone(), Value::Symbol(selector)];
        self.dispatch(target, MetaOp::Select, &args)
    }

    pub fn lookup(&mut self, scope: ObjectId, selector: Symbol) -> RuntimeResult<Value> {
        self.dispatch(&Value::Object(scope), MetaOp::Lookup, &[Value::Symbol(selector)])
    }

    pub fn call(
        &mut self,
        scope: ObjectId,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let args = [Value::Symbol(selector), Value::table(args)];
        self.dispatch(&Value::Object(scope), MetaOp::Call, &args)
    }

    pub fn assign_field(
        &mut self,
        target: &Value,
        selector: Symbol,
        value: Value,
    ) -> RuntimeResult<()> {
        let args = [Value::Symbol(selector), value];
        self.dispatch(target, MetaOp::AssignField, &args).map(|_| ())
    }

    pub fn assign_variable(
        &mut self,
        scope: ObjectId,
        selector: Symbol,
        value: Value,
    ) -> RuntimeResult<()> {
        let args = [Value::Symbol(selector), value];
        self.dispatch(&Value::Object(scope), MetaOp::AssignVariable, &args)
            .map(|_| ())
    }

    pub fn define_field(
        &mut self,
        target: &Value,
        selector: Symbol,
        value: Value,
    ) -> RuntimeResult<()> {
        let args = [Value::Symbol(selector), value];
        self.dispatch(target, MetaOp::DefineField, &args).map(|_| ())
    }

    pub fn clone_value(&mut self, value: &Value) -> RuntimeResult<Value> {
        self.dispatch(value, MetaOp::Clone, &[])
    }

    /// Clone, then send `init` to the clone.
    pub fn new_instance(&mut self, value: &Value, args: &[Value]) -> RuntimeResult<Value> {
        self.dispatch(value, MetaOp::NewInstance, &[Value::table(args)])
    }

    pub fn extend(&mut self, parent: &Value, code: &Value) -> RuntimeResult<Value> {
        self.dispatch(parent, MetaOp::Extend, std::slice::from_ref(code))
    }

    pub fn share(&mut self, parent: &Value, code: &Value) -> RuntimeResult<Value> {
        self.dispatch(parent, MetaOp::Share, std::slice::from_ref(code))
    }

    pub fn does_not_understand(
        &mut self,
        receiver: &Value,
        selector: Symbol,
    ) -> RuntimeResult<Value> {
        self.dispatch(receiver, MetaOp::DoesNotUnderstand, &[Value::Symbol(selector)])
    }

    pub fn is_clone_of(&mut self, value: &Value, other: &Value) -> RuntimeResult<bool> {
        self.dispatch(value, MetaOp::IsCloneOf, std::slice::from_ref(other))?
            .expect_bool("isCloneOf result")
    }

    pub fn is_related_to(&mut self, value: &Value, other: &Value) -> RuntimeResult<bool> {
        self.dispatch(value, MetaOp::IsRelatedTo, std::slice::from_ref(other))?
            .expect_bool("isRelatedTo result")
    }

    pub fn add_field(&mut self, target: &Value, field: Value) -> RuntimeResult<()> {
        self.dispatch(target, MetaOp::AddField, &[field]).map(|_| ())
    }

    pub fn grab_field(&mut self, target: &Value, selector: Symbol) -> RuntimeResult<Value> {
        self.dispatch(target, MetaOp::GrabField, &[Value::Symbol(selector)])
    }

    pub fn list_fields(&mut self, target: &Value) -> RuntimeResult<Arc<[Value]>> {
        self.dispatch(target, MetaOp::ListFields, &[])?
            .expect_table("field list")
    }

    pub fn add_method(&mut self, target: &Value, method: Value) -> RuntimeResult<()> {
        self.dispatch(target, MetaOp::AddMethod, &[method]).map(|_| ())
    }

    pub fn grab_method(&mut self, target: &Value, selector: Symbol) -> RuntimeResult<Value> {
        self.dispatch(target, MetaOp::GrabMethod, &[Value::Symbol(selector)])
    }

    pub fn list_methods(&mut self, target: &Value) -> RuntimeResult<Arc<[Value]>> {
        self.dispatch(target, MetaOp::ListMethods, &[])?
            .expect_table("method list")
    }

    pub fn add_slot(&mut self, target: &Value, slot: Value) -> RuntimeResult<()> {
        self.dispatch(target, MetaOp::AddSlot, &[slot]).map(|_| ())
    }

    pub fn grab_slot(&mut self, target: &Value, selector: Symbol) -> RuntimeResult<Value> {
        self.dispatch(target, MetaOp::GrabSlot, &[Value::Symbol(selector)])
    }

    pub fn remove_slot(&mut self, target: &Value, selector: Symbol) -> RuntimeResult<Value> {
        self.dispatch(target, MetaOp::RemoveSlot, &[Value::Symbol(selector)])
    }

    pub fn list_slots(&mut self, target: &Value) -> RuntimeResult<Arc<[Value]>> {
        self.dispatch(target, MetaOp::ListSlots, &[])?
            .expect_table("slot list")
    }

    pub fn responds_to(&mut self, target: &Value, selector: Symbol) -> RuntimeResult<bool> {
        self.dispatch(target, MetaOp::RespondsTo, &[Value::Symbol(selector)])?
            .expect_bool("respondsTo result")
    }

    pub fn eval(&mut self, value: &Value, ctx: &Context) -> RuntimeResult<Value> {
        let ctx = Value::Context(Arc::new(ctx.clone()));
        self.dispatch(value, MetaOp::Eval, &[ctx])
    }

    pub fn quote(&mut self, value: &Value, ctx: &Context) -> RuntimeResult<Value> {
        let ctx = Value::Context(Arc::new(ctx.clone()));
        self.dispatch(value, MetaOp::Quote, &[ctx])
    }

    /// What to transmit when `value` leaves this actor.
    pub fn pass(&mut self, value: &Value) -> RuntimeResult<Value> {
        self.dispatch(value, MetaOp::Pass, &[])
    }

    /// What to materialize when `value` arrives in this actor.
    pub fn resolve(&mut self, value: &Value) -> RuntimeResult<Value> {
        self.dispatch(value, MetaOp::Resolve, &[])
    }

    pub fn print(&mut self, value: &Value) -> RuntimeResult<String> {
        match self.dispatch(value, MetaOp::Print, &[])? {
            Value::Text(text) => Ok(text.to_string()),
            other => Err(RuntimeError::illegal_argument(format!(
                "print answered {} {other} instead of text",
                other.kind_name()
            ))),
        }
    }

    pub fn is_tagged_as(&mut self, value: &Value, tag: &Arc<TypeTag>) -> RuntimeResult<bool> {
        let tag = Value::TypeTag(Arc::clone(tag));
        self.dispatch(value, MetaOp::IsTaggedAs, &[tag])?
            .expect_bool("isTaggedAs result")
    }

    pub fn type_tags(&mut self, value: &Value) -> RuntimeResult<Arc<[Value]>> {
        self.dispatch(value, MetaOp::TypeTags, &[])?
            .expect_table("type tag list")
    }

    pub(crate) fn trace_meta(&self, op: MetaOp, target: ObjectId, what: &str) {
        if self.trace_forwarding {
            trace!("{what} `{op}` on {target}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Stratum, VMCreateInfo};

    #[test]
    fn table_is_indexed_by_discriminant() {
        for (index, desc) in META_OPERATIONS.iter().enumerate() {
            assert_eq!(desc.op as usize, index, "{} out of place", desc.name);
            assert_eq!(MetaOp::from_selector(desc.op.selector()), Some(desc.op));
        }
    }

    #[test]
    fn host_names_live_in_the_meta_namespace() {
        for desc in META_OPERATIONS {
            let host = desc.op.host_name();
            assert!(host.starts_with(crate::META_PREFIX));
            let (stratum, selector) = crate::from_host_name(&host).unwrap();
            assert_eq!(stratum, Stratum::Meta);
            assert_eq!(selector, desc.op.selector());
        }
        assert_eq!(MetaOp::AssignField.host_name(), "meta_assignField");
    }

    #[test]
    fn closures_answer_apply() {
        let mut vm = VM::new(VMCreateInfo::default());
        let double = Method::native("double", &["n"], |vm, ctx, _| {
            let n = vm.lookup(ctx.lexical_scope, Symbol::intern("n"))?;
            Ok(Value::Fixnum(n.as_fixnum().unwrap_or_default() * 2))
        })
        .unwrap();
        let closure = Value::closure(Closure::new(double, vm.top_level_context()));

        let apply = Symbol::intern("apply");
        let args = [Value::table(&[Value::Fixnum(21)])];
        assert_eq!(vm.invoke(&closure, apply, &args).unwrap().as_fixnum(), Some(42));
        assert!(matches!(
            vm.invoke(&closure, apply, &[]),
            Err(RuntimeError::ArityMismatch { .. })
        ));
        assert!(vm.responds_to(&closure, apply).unwrap());
    }

    #[test]
    fn values_fall_through_to_primitives_and_dnu() {
        let mut vm = VM::new(VMCreateInfo::default());
        let five = Value::Fixnum(5);
        let eq = Symbol::intern("==");
        assert_eq!(
            vm.invoke(&five, eq, &[Value::Fixnum(5)]).unwrap().as_bool(),
            Some(true)
        );
        assert!(matches!(
            vm.invoke(&five, Symbol::intern("frobnicate"), &[]),
            Err(RuntimeError::SelectorNotFound { .. })
        ));
        assert_eq!(vm.print(&five).unwrap(), "5");
        assert!(vm.clone_value(&five).unwrap().is_identical(&five));
    }

    #[test]
    fn meta_operations_check_arity() {
        let mut vm = VM::new(VMCreateInfo::default());
        let object = vm.new_object();
        assert!(matches!(
            vm.dispatch(&object, MetaOp::Select, &[]),
            Err(RuntimeError::ArityMismatch { got: 0, .. })
        ));
    }
}
