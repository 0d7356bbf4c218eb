use crate::{ObjectId, SlotStorage};

/// Activation record of one method application.
///
/// Holds parameter bindings and local definitions; its method dictionary
/// stays empty and it never takes part in dynamic delegation, only in
/// lexical lookup through `lexical_parent`.
#[derive(Debug)]
pub struct CallFrame {
    pub slots: SlotStorage,
    pub lexical_parent: ObjectId,
}

impl CallFrame {
    pub fn new(lexical_parent: ObjectId) -> Self {
        Self {
            slots: SlotStorage::new(),
            lexical_parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        HeapObject, Method, RuntimeError, Symbol, VM, VMCreateInfo, Value,
    };

    #[test]
    fn frames_see_their_lexical_parent() {
        let mut vm = VM::new(VMCreateInfo::default());
        let root = vm.top_level_context().lexical_scope;
        vm.define_field(&Value::Object(root), Symbol::intern("outer"), Value::Fixnum(1))
            .unwrap();

        let method = Method::native("probe", &["p"], |vm, ctx, _| {
            let frame = ctx.lexical_scope;
            assert!(matches!(vm.heap().get(frame), HeapObject::Frame(_)));
            let outer = vm.lookup(frame, Symbol::intern("outer"))?;
            let p = vm.lookup(frame, Symbol::intern("p"))?;
            Ok(Value::Fixnum(outer.as_fixnum().unwrap() + p.as_fixnum().unwrap()))
        })
        .unwrap();
        let closure = crate::Closure::new(method, vm.top_level_context());
        let result = vm.apply(&closure, &[Value::Fixnum(41)]).unwrap();
        assert_eq!(result.as_fixnum(), Some(42));
    }

    #[test]
    fn frames_are_not_message_targets() {
        let mut vm = VM::new(VMCreateInfo::default());
        let method = Method::native("leak", &[], |_, ctx, _| {
            Ok(Value::Object(ctx.lexical_scope))
        })
        .unwrap();
        let closure = crate::Closure::new(method, vm.top_level_context());
        let frame = vm.apply(&closure, &[]).unwrap();

        assert!(matches!(
            vm.invoke(&frame, Symbol::intern("anything"), &[]),
            Err(RuntimeError::IllegalOperation { .. })
        ));
        assert!(matches!(
            vm.select(&frame, Symbol::intern("anything")),
            Err(RuntimeError::IllegalOperation { .. })
        ));
        assert!(matches!(
            vm.clone_value(&frame),
            Err(RuntimeError::IllegalOperation { .. })
        ));
    }

    #[test]
    fn frames_allow_local_definitions() {
        let mut vm = VM::new(VMCreateInfo::default());
        let method = Method::native("locals", &[], |vm, ctx, _| {
            let scope = Value::Object(ctx.lexical_scope);
            let tmp = Symbol::intern("tmp");
            vm.define_field(&scope, tmp, Value::Fixnum(1))?;
            vm.assign_variable(ctx.lexical_scope, tmp, Value::Fixnum(2))?;
            vm.lookup(ctx.lexical_scope, tmp)
        })
        .unwrap();
        let closure = crate::Closure::new(method, vm.top_level_context());
        assert_eq!(vm.apply(&closure, &[]).unwrap().as_fixnum(), Some(2));
    }
}
