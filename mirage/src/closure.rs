use std::sync::Arc;

use crate::{
    CallFrame, HeapObject, Method, MethodBody, ObjectId, RuntimeResult,
    SlotFlags, Symbol, VM, Value,
};

/// Lexical scope + dynamic receiver + the receiver's parent seen as a
/// delegation target (`super`). Contexts are values: deriving one never
/// touches the original.
#[derive(Debug, Clone)]
pub struct Context {
    pub lexical_scope: ObjectId,
    pub receiver: Value,
    pub super_view: Value,
}

impl Context {
    pub fn new(lexical_scope: ObjectId, receiver: Value, super_view: Value) -> Self {
        Self {
            lexical_scope,
            receiver,
            super_view,
        }
    }

    pub fn with_lexical_scope(&self, lexical_scope: ObjectId) -> Self {
        Self {
            lexical_scope,
            receiver: self.receiver.clone(),
            super_view: self.super_view.clone(),
        }
    }

    pub fn with_receiver(&self, receiver: Value, super_view: Value) -> Self {
        Self {
            lexical_scope: self.lexical_scope,
            receiver,
            super_view,
        }
    }
}

#[derive(Debug)]
pub struct Closure {
    pub method: Arc<Method>,
    pub context: Context,
}

impl Closure {
    pub fn new(method: Arc<Method>, context: Context) -> Self {
        Self { method, context }
    }

    pub fn name(&self) -> Symbol {
        self.method.name
    }
}

impl VM {
    /// Runs the closure in a fresh call frame nested in its captured scope.
    pub fn apply(
        &mut self,
        closure: &Closure,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let bindings = closure.method.bind_arguments(args)?;
        let frame = self.heap.allocate(HeapObject::Frame(CallFrame::new(
            closure.context.lexical_scope,
        )));
        let storage = self.heap.storage_mut(frame);
        for (name, value) in bindings {
            storage.put_field(name, value, SlotFlags::MUTABLE)?;
        }
        let ctx = closure.context.with_lexical_scope(frame);
        self.run_method(&closure.method, &ctx, args)
    }

    /// Binds the parameters straight into `ctx`'s scope and runs the body
    /// there, without a new activation.
    pub fn apply_in_scope(
        &mut self,
        closure: &Closure,
        args: &[Value],
        ctx: &Context,
    ) -> RuntimeResult<Value> {
        let bindings = closure.method.bind_arguments(args)?;
        let scope = Value::Object(ctx.lexical_scope);
        for (name, value) in bindings {
            self.define_field(&scope, name, value)?;
        }
        self.run_method(&closure.method, ctx, args)
    }

    /// Applies any appliable value: closures directly, everything else
    /// through its `apply` selector.
    pub fn apply_value(
        &mut self,
        callee: &Value,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        match callee {
            Value::Closure(closure) => self.apply(closure, args),
            other => {
                let apply = self.names.apply;
                self.invoke(other, apply, &[Value::table(args)])
            }
        }
    }

    fn run_method(
        &mut self,
        method: &Method,
        ctx: &Context,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        match &method.body {
            MethodBody::Native(body) => {
                let body = Arc::clone(body);
                body(self, ctx, args)
            }
            MethodBody::Fragment(fragment) => {
                let fragment = Arc::clone(fragment);
                fragment.eval(self, ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RuntimeError, VMCreateInfo};

    fn code(
        vm: &VM,
        params: &[&str],
        body: impl Fn(&mut VM, &Context, &[Value]) -> RuntimeResult<Value>
        + 'static,
    ) -> Closure {
        let method = Method::native("code", params, body).unwrap();
        Closure::new(method, vm.top_level_context())
    }

    #[test]
    fn apply_binds_parameters_in_a_new_frame() {
        let mut vm = VM::new(VMCreateInfo::default());
        let add = code(&vm, &["a", "b"], |vm, ctx, _| {
            let a = vm.lookup(ctx.lexical_scope, Symbol::intern("a"))?;
            let b = vm.lookup(ctx.lexical_scope, Symbol::intern("b"))?;
            Ok(Value::Fixnum(a.as_fixnum().unwrap() + b.as_fixnum().unwrap()))
        });
        let result = vm.apply(&add, &[Value::Fixnum(2), Value::Fixnum(3)]);
        assert_eq!(result.unwrap().as_fixnum(), Some(5));

        // parameters did not leak into the captured scope
        let root = vm.top_level_context().lexical_scope;
        assert!(vm.lookup(root, Symbol::intern("a")).is_err());
    }

    #[test]
    fn apply_rejects_wrong_argument_count() {
        let mut vm = VM::new(VMCreateInfo::default());
        let one = code(&vm, &["a"], |_, _, _| Ok(Value::Nil));
        assert!(matches!(
            vm.apply(&one, &[]),
            Err(RuntimeError::ArityMismatch { got: 0, .. })
        ));
    }

    #[test]
    fn apply_in_scope_reuses_the_given_context() {
        let mut vm = VM::new(VMCreateInfo::default());
        let object = vm.new_object();
        let scope = object.as_object().unwrap();
        let body = code(&vm, &["x"], |vm, ctx, _| {
            vm.lookup(ctx.lexical_scope, Symbol::intern("x"))
        });
        let ctx = Context::new(scope, object.clone(), Value::Nil);
        let result = vm.apply_in_scope(&body, &[Value::Fixnum(4)], &ctx);
        assert_eq!(result.unwrap().as_fixnum(), Some(4));

        // the parameter became a field of the scope object itself
        let x = vm.select(&object, Symbol::intern("x")).unwrap();
        assert_eq!(vm.apply_value(&x, &[]).unwrap().as_fixnum(), Some(4));
    }

    #[test]
    fn deriving_contexts_leaves_the_original_alone() {
        let vm = VM::new(VMCreateInfo::default());
        let ctx = vm.top_level_context();
        let derived = ctx.with_receiver(Value::Fixnum(1), Value::Nil);
        assert!(!ctx.receiver.is_identical(&derived.receiver));
        assert_eq!(ctx.lexical_scope, derived.lexical_scope);
    }
}
