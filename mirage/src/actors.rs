use crate::ObjectId;

/// Identity of the actor owning a [`VM`](crate::VM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ActorId(pub u64);

/// What a by-reference object turns into when it leaves its actor. Only the
/// owning actor can resolve it back into the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarReference {
    pub target: ObjectId,
    pub owner: ActorId,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{Closure, Method, Value, VM, VMCreateInfo};

    use super::*;

    fn empty_code(vm: &VM) -> Value {
        let method = Method::native("code", &[], |_, _, _| Ok(Value::Nil)).unwrap();
        Value::closure(Closure::new(method, vm.top_level_context()))
    }

    #[test]
    fn objects_pass_by_reference() {
        let mut vm = VM::new(VMCreateInfo {
            actor: ActorId(3),
            ..VMCreateInfo::default()
        });
        let object = vm.new_object();
        let passed = vm.pass(&object).unwrap();
        let Value::FarReference(far) = passed.clone() else {
            panic!("expected a far reference, got {passed}");
        };
        assert_eq!(far.owner, ActorId(3));
        assert_eq!(Value::Object(far.target).as_object(), object.as_object());

        // the owner resolves it back, anyone else keeps the reference
        assert!(vm.resolve(&passed).unwrap().is_identical(&object));
        let mut other = VM::new(VMCreateInfo::default());
        assert!(matches!(other.resolve(&passed).unwrap(), Value::FarReference(_)));
    }

    #[test]
    fn isolates_and_immediates_pass_by_copy() {
        let mut vm = VM::new(VMCreateInfo::default());
        let code = empty_code(&vm);
        let isolate = vm.isolate(&code).unwrap();
        assert!(vm.pass(&isolate).unwrap().is_identical(&isolate));

        // tags are inherited along is-a links
        let child = vm.extend(&isolate, &code).unwrap();
        assert!(vm.pass(&child).unwrap().is_identical(&child));

        let text = Value::text("hello");
        assert!(vm.pass(&text).unwrap().is_identical(&text));
        let table = Value::Table(Arc::from([Value::Fixnum(1)]));
        assert!(vm.pass(&table).unwrap().is_identical(&table));
    }
}
