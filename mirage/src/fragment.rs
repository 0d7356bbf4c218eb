use std::{fmt, sync::Arc};

use crate::{Context, Method, MethodBody, RuntimeError, RuntimeResult, Symbol, VM, Value};

/// A piece of code handed to the object model by the evaluator.
///
/// `eval` runs it, `quote` rebuilds it with every unquotation replaced by
/// what it evaluates to.
pub trait Fragment: fmt::Debug {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value>;

    fn quote(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value>;

    /// Reports heap values embedded in the fragment.
    fn for_each_value(&self, _f: &mut dyn FnMut(&Value)) {}
}

fn fragment(value: impl Fragment + 'static) -> Value {
    Value::Fragment(Arc::new(value))
}

/// Quoting a child may produce a plain value (from an unquotation); it is
/// spliced back in as a literal.
fn splice(value: Value) -> Arc<dyn Fragment> {
    match value {
        Value::Fragment(fragment) => fragment,
        other => Arc::new(Literal(other)),
    }
}

fn quote_all(
    fragments: &[Arc<dyn Fragment>],
    vm: &mut VM,
    ctx: &Context,
) -> RuntimeResult<Vec<Arc<dyn Fragment>>> {
    fragments
        .iter()
        .map(|f| f.quote(vm, ctx).map(splice))
        .collect()
}

#[derive(Debug)]
pub struct Literal(pub Value);

impl Fragment for Literal {
    fn eval(&self, _vm: &mut VM, _ctx: &Context) -> RuntimeResult<Value> {
        Ok(self.0.clone())
    }

    fn quote(&self, _vm: &mut VM, _ctx: &Context) -> RuntimeResult<Value> {
        Ok(fragment(Literal(self.0.clone())))
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        f(&self.0)
    }
}

#[derive(Debug)]
pub struct SelfReference;

impl Fragment for SelfReference {
    fn eval(&self, _vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        Ok(ctx.receiver.clone())
    }

    fn quote(&self, _vm: &mut VM, _ctx: &Context) -> RuntimeResult<Value> {
        Ok(fragment(SelfReference))
    }
}

#[derive(Debug)]
pub struct VariableReference(pub Symbol);

impl Fragment for VariableReference {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        vm.lookup(ctx.lexical_scope, self.0)
    }

    fn quote(&self, _vm: &mut VM, _ctx: &Context) -> RuntimeResult<Value> {
        Ok(fragment(VariableReference(self.0)))
    }
}

/// `def name := value` in the current scope.
#[derive(Debug)]
pub struct Definition {
    pub name: Symbol,
    pub value: Arc<dyn Fragment>,
}

impl Fragment for Definition {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let value = self.value.eval(vm, ctx)?;
        vm.define_field(&Value::Object(ctx.lexical_scope), self.name, value.clone())?;
        Ok(value)
    }

    fn quote(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let value = splice(self.value.quote(vm, ctx)?);
        Ok(fragment(Definition {
            name: self.name,
            value,
        }))
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        self.value.for_each_value(f)
    }
}

/// `name := value` on the nearest lexical definition.
#[derive(Debug)]
pub struct Assignment {
    pub name: Symbol,
    pub value: Arc<dyn Fragment>,
}

impl Fragment for Assignment {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let value = self.value.eval(vm, ctx)?;
        vm.assign_variable(ctx.lexical_scope, self.name, value.clone())?;
        Ok(value)
    }

    fn quote(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let value = splice(self.value.quote(vm, ctx)?);
        Ok(fragment(Assignment {
            name: self.name,
            value,
        }))
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        self.value.for_each_value(f)
    }
}

/// `def name(params) { body }` in the current scope.
#[derive(Debug)]
pub struct MethodDefinition(pub Arc<Method>);

impl Fragment for MethodDefinition {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let method = Value::Method(Arc::clone(&self.0));
        vm.add_method(&Value::Object(ctx.lexical_scope), method.clone())?;
        Ok(method)
    }

    fn quote(&self, _vm: &mut VM, _ctx: &Context) -> RuntimeResult<Value> {
        Ok(fragment(MethodDefinition(Arc::clone(&self.0))))
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        if let MethodBody::Fragment(body) = &self.0.body {
            body.for_each_value(f)
        }
    }
}

/// `receiver.selector(arguments)`
#[derive(Debug)]
pub struct MessageSend {
    pub receiver: Arc<dyn Fragment>,
    pub selector: Symbol,
    pub arguments: Vec<Arc<dyn Fragment>>,
}

impl Fragment for MessageSend {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let receiver = self.receiver.eval(vm, ctx)?;
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.eval(vm, ctx))
            .collect::<RuntimeResult<Vec<_>>>()?;
        vm.invoke(&receiver, self.selector, &arguments)
    }

    fn quote(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let receiver = splice(self.receiver.quote(vm, ctx)?);
        let arguments = quote_all(&self.arguments, vm, ctx)?;
        Ok(fragment(MessageSend {
            receiver,
            selector: self.selector,
            arguments,
        }))
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        self.receiver.for_each_value(f);
        self.arguments.iter().for_each(|a| a.for_each_value(f));
    }
}

/// Evaluates in order and answers the last value.
#[derive(Debug)]
pub struct Sequence(pub Vec<Arc<dyn Fragment>>);

impl Fragment for Sequence {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let mut last = Value::Nil;
        for statement in &self.0 {
            last = statement.eval(vm, ctx)?;
        }
        Ok(last)
    }

    fn quote(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        Ok(fragment(Sequence(quote_all(&self.0, vm, ctx)?)))
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        self.0.iter().for_each(|s| s.for_each_value(f));
    }
}

/// `` `(expression) ``: evaluating it quotes the inner fragment.
#[derive(Debug)]
pub struct Quotation(pub Arc<dyn Fragment>);

impl Fragment for Quotation {
    fn eval(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        self.0.quote(vm, ctx)
    }

    fn quote(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        let inner = splice(self.0.quote(vm, ctx)?);
        Ok(fragment(Quotation(inner)))
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        self.0.for_each_value(f)
    }
}

/// `#(expression)` inside a quotation: switches back to evaluation.
#[derive(Debug)]
pub struct Unquotation(pub Arc<dyn Fragment>);

impl Fragment for Unquotation {
    fn eval(&self, _vm: &mut VM, _ctx: &Context) -> RuntimeResult<Value> {
        Err(RuntimeError::illegal_operation(
            "unquotation evaluated outside of a quotation",
        ))
    }

    fn quote(&self, vm: &mut VM, ctx: &Context) -> RuntimeResult<Value> {
        self.0.eval(vm, ctx)
    }

    fn for_each_value(&self, f: &mut dyn FnMut(&Value)) {
        self.0.for_each_value(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VMCreateInfo;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    fn lit(value: Value) -> Arc<dyn Fragment> {
        Arc::new(Literal(value))
    }

    #[test]
    fn definitions_and_sends() {
        let mut vm = VM::new(VMCreateInfo::default());
        let object = vm.new_object();
        let ctx = Context::new(object.as_object().unwrap(), object.clone(), Value::Nil);
        let program = Sequence(vec![
            Arc::new(Definition {
                name: sym("x"),
                value: lit(Value::Fixnum(3)),
            }),
            Arc::new(Assignment {
                name: sym("x"),
                value: lit(Value::Fixnum(4)),
            }),
            Arc::new(MessageSend {
                receiver: Arc::new(SelfReference),
                selector: sym("x"),
                arguments: Vec::new(),
            }),
        ]);
        assert_eq!(program.eval(&mut vm, &ctx).unwrap().as_fixnum(), Some(4));
        assert_eq!(
            VariableReference(sym("x")).eval(&mut vm, &ctx).unwrap().as_fixnum(),
            Some(4)
        );
    }

    #[test]
    fn quotation_switches_back_at_unquotes() {
        let mut vm = VM::new(VMCreateInfo::default());
        let ctx = vm.top_level_context();
        vm.define_field(&Value::Object(ctx.lexical_scope), sym("y"), Value::Fixnum(9))
            .unwrap();

        let quoted = Quotation(Arc::new(MessageSend {
            receiver: Arc::new(VariableReference(sym("x"))),
            selector: sym("+"),
            arguments: vec![Arc::new(Unquotation(Arc::new(VariableReference(sym("y")))))],
        }));
        let Value::Fragment(result) = quoted.eval(&mut vm, &ctx).unwrap() else {
            panic!("quotation must produce a fragment");
        };
        let text = format!("{result:?}");
        assert!(text.contains("VariableReference"), "{text}");
        assert!(text.contains("Fixnum(9)"), "{text}");
        assert!(!text.contains("Unquotation"), "{text}");
    }

    #[test]
    fn bare_unquotation_is_illegal() {
        let mut vm = VM::new(VMCreateInfo::default());
        let ctx = vm.top_level_context();
        let unquote = Unquotation(lit(Value::Nil));
        assert!(matches!(
            unquote.eval(&mut vm, &ctx),
            Err(RuntimeError::IllegalOperation { .. })
        ));
    }

    #[test]
    fn objects_evaluate_and_quote_to_themselves() {
        let mut vm = VM::new(VMCreateInfo::default());
        let ctx = vm.top_level_context();
        let object = vm.new_object();
        assert!(vm.eval(&object, &ctx).unwrap().is_identical(&object));
        assert!(vm.quote(&object, &ctx).unwrap().is_identical(&object));

        let code = fragment(Literal(Value::Fixnum(1)));
        assert_eq!(vm.eval(&code, &ctx).unwrap().as_fixnum(), Some(1));
    }
}
