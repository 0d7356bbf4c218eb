use std::sync::Arc;

use crate::{
    Arity, Method, Parameter, RuntimeError, RuntimeResult, Stratum, Symbol, VM,
    Value, from_host_name,
};

pub type PrimitiveFunction = fn(&mut VM, &Value, &[Value]) -> RuntimeResult<Value>;

// self does not count as input
// e.g. `==` => `a == b` has inputs: 1
#[derive(Debug, Copy, Clone)]
pub struct PrimitiveMessage {
    /// base-level host name, see [`crate::to_base_name`]
    pub name: &'static str,
    pub arity: Arity,
    pub ptr: PrimitiveFunction,
}

impl PrimitiveMessage {
    pub const fn new(name: &'static str, arity: Arity, ptr: PrimitiveFunction) -> Self {
        Self { name, arity, ptr }
    }
}

/// Understood by every value once its dynamic chain is exhausted.
pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("base__opeql__opeql_", Arity::exact(1), identical),
    PrimitiveMessage::new("base__opnot__opeql_", Arity::exact(1), not_identical),
    PrimitiveMessage::new("base_new", Arity::at_least(0), new),
    PrimitiveMessage::new("base_init", Arity::at_least(0), init),
];

fn identical(_vm: &mut VM, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Bool(receiver.is_identical(&args[0])))
}

fn not_identical(_vm: &mut VM, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Bool(!receiver.is_identical(&args[0])))
}

fn new(vm: &mut VM, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
    vm.new_instance(receiver, args)
}

fn init(_vm: &mut VM, _receiver: &Value, _args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Nil)
}

impl VM {
    pub(crate) fn base_primitive(&self, selector: Symbol) -> Option<&'static PrimitiveMessage> {
        self.primitives.get(&selector).copied()
    }

    pub(crate) fn call_primitive(
        &mut self,
        primitive: &'static PrimitiveMessage,
        receiver: &Value,
        selector: Symbol,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        if !primitive.arity.accepts(args.len()) {
            return Err(RuntimeError::ArityMismatch {
                selector,
                expected: primitive.arity,
                got: args.len(),
            });
        }
        (primitive.ptr)(self, receiver, args)
    }

    /// Installs a host function as a method of `target`, named by its host
    /// name. Base names become ordinary methods; meta names must denote a
    /// meta operation and are meant for mirrors.
    pub fn expose_native<F>(
        &mut self,
        target: &Value,
        host_name: &str,
        parameters: &[&str],
        body: F,
    ) -> RuntimeResult<()>
    where
        F: Fn(&mut VM, &crate::Context, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        let (stratum, selector) = from_host_name(host_name)?;
        if stratum == Stratum::Meta && crate::MetaOp::from_selector(selector).is_none() {
            return Err(RuntimeError::illegal_argument(format!(
                "`{host_name}` names no meta operation"
            )));
        }
        let parameters = parameters.iter().map(|p| Parameter::parse(p)).collect();
        let method = Method::new(
            selector,
            parameters,
            crate::MethodBody::Native(Arc::new(body)),
        )?;
        self.add_method(target, Value::Method(Arc::new(method)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VMCreateInfo, selector_from_host_name};

    #[test]
    fn every_primitive_name_decodes() {
        for primitive in PRIMITIVES {
            let (stratum, _) = from_host_name(primitive.name).unwrap();
            assert_eq!(stratum, Stratum::Base);
        }
        assert_eq!(
            selector_from_host_name(PRIMITIVES[0].name).unwrap(),
            Symbol::intern("==")
        );
    }

    #[test]
    fn identity_primitives() {
        let mut vm = VM::new(VMCreateInfo::default());
        let a = vm.new_object();
        let b = vm.new_object();
        let (eq, ne) = (Symbol::intern("=="), Symbol::intern("!="));
        assert_eq!(vm.invoke(&a, eq, &[a.clone()]).unwrap().as_bool(), Some(true));
        assert_eq!(vm.invoke(&a, eq, &[b.clone()]).unwrap().as_bool(), Some(false));
        assert_eq!(vm.invoke(&a, ne, &[b]).unwrap().as_bool(), Some(true));
        assert!(matches!(
            vm.invoke(&a, eq, &[]),
            Err(RuntimeError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn new_clones_and_initializes() {
        let mut vm = VM::new(VMCreateInfo::default());
        let prototype = vm.new_object();
        vm.define_field(&prototype, Symbol::intern("n"), Value::Fixnum(0))
            .unwrap();
        vm.expose_native(&prototype, "base_init", &["n"], |vm, ctx, args| {
            vm.assign_field(&ctx.receiver, Symbol::intern("n"), args[0].clone())?;
            Ok(Value::Nil)
        })
        .unwrap();

        let n = Symbol::intern("n");
        let instance = vm
            .invoke(&prototype, Symbol::intern("new"), &[Value::Fixnum(7)])
            .unwrap();
        assert_eq!(vm.invoke(&instance, n, &[]).unwrap().as_fixnum(), Some(7));
        assert_eq!(vm.invoke(&prototype, n, &[]).unwrap().as_fixnum(), Some(0));
        assert!(vm.is_clone_of(&instance, &prototype).unwrap());
    }

    #[test]
    fn exposed_operators_are_ordinary_methods() {
        let mut vm = VM::new(VMCreateInfo::default());
        let object = vm.new_object();
        vm.expose_native(&object, "base__oppls_", &["other"], |_, _, args| {
            Ok(Value::Fixnum(args[0].as_fixnum().unwrap_or_default() + 1))
        })
        .unwrap();
        let plus = Symbol::intern("+");
        let result = vm.invoke(&object, plus, &[Value::Fixnum(1)]).unwrap();
        assert_eq!(result.as_fixnum(), Some(2));
        assert!(vm.grab_method(&object, plus).is_ok());

        assert!(matches!(
            vm.expose_native(&object, "meta_frobnicate", &[], |_, _, _| Ok(Value::Nil)),
            Err(RuntimeError::IllegalArgument { .. })
        ));
        assert!(matches!(
            vm.expose_native(&object, "host_thing", &[], |_, _, _| Ok(Value::Nil)),
            Err(RuntimeError::Internal { .. })
        ));
    }
}
