use std::{fmt, sync::Arc};

use crate::{
    Arity, Context, Fragment, RuntimeError, RuntimeResult, Symbol, VM, Value,
};

/// Host-implemented method body. Receives the activation context and the
/// raw (already arity-checked) arguments.
pub type NativeFn =
    dyn Fn(&mut VM, &Context, &[Value]) -> RuntimeResult<Value>;

#[derive(Clone)]
pub enum MethodBody {
    Native(Arc<NativeFn>),
    Fragment(Arc<dyn Fragment>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Required(Symbol),
    /// collects the remaining arguments into a table, must be last
    Rest(Symbol),
}

/// A bare method: no captured environment, it only becomes appliable once
/// bound into a [`Closure`](crate::Closure).
pub struct Method {
    pub name: Symbol,
    pub parameters: Vec<Parameter>,
    pub body: MethodBody,
}

impl Parameter {
    /// `@rest` declares a rest parameter.
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix('@') {
            Some(name) => Parameter::Rest(Symbol::intern(name)),
            None => Parameter::Required(Symbol::intern(text)),
        }
    }

    pub fn name(self) -> Symbol {
        match self {
            Parameter::Required(name) | Parameter::Rest(name) => name,
        }
    }
}

impl Method {
    pub fn new(
        name: Symbol,
        parameters: Vec<Parameter>,
        body: MethodBody,
    ) -> RuntimeResult<Self> {
        let last = parameters.len().saturating_sub(1);
        for (i, parameter) in parameters.iter().enumerate() {
            if matches!(parameter, Parameter::Rest(_)) && i != last {
                return Err(RuntimeError::illegal_argument(format!(
                    "rest parameter `{}` of `{name}` must come last",
                    parameter.name()
                )));
            }
            if parameters[..i].iter().any(|p| p.name() == parameter.name()) {
                return Err(RuntimeError::DuplicateSlot {
                    selector: parameter.name(),
                });
            }
        }
        Ok(Self {
            name,
            parameters,
            body,
        })
    }

    pub fn native<F>(
        name: &str,
        parameters: &[&str],
        body: F,
    ) -> RuntimeResult<Arc<Self>>
    where
        F: Fn(&mut VM, &Context, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        let parameters = parameters.iter().map(|p| Parameter::parse(p));
        Method::new(
            Symbol::intern(name),
            parameters.collect(),
            MethodBody::Native(Arc::new(body)),
        )
        .map(Arc::new)
    }

    pub fn fragment(
        name: &str,
        parameters: &[&str],
        body: Arc<dyn Fragment>,
    ) -> RuntimeResult<Arc<Self>> {
        let parameters = parameters.iter().map(|p| Parameter::parse(p));
        Method::new(
            Symbol::intern(name),
            parameters.collect(),
            MethodBody::Fragment(body),
        )
        .map(Arc::new)
    }

    /// For methods synthesized by the runtime itself, whose parameter lists
    /// are well-formed by construction.
    pub(crate) fn builtin<F>(
        name: Symbol,
        parameters: Vec<Parameter>,
        body: F,
    ) -> Arc<Self>
    where
        F: Fn(&mut VM, &Context, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        Arc::new(Self {
            name,
            parameters,
            body: MethodBody::Native(Arc::new(body)),
        })
    }

    pub fn arity(&self) -> Arity {
        match self.parameters.last() {
            Some(Parameter::Rest(_)) => {
                Arity::at_least(self.parameters.len() - 1)
            }
            _ => Arity::exact(self.parameters.len()),
        }
    }

    /// Positional binding; a rest parameter receives the remainder as a
    /// table.
    pub fn bind_arguments(
        &self,
        args: &[Value],
    ) -> RuntimeResult<Vec<(Symbol, Value)>> {
        let arity = self.arity();
        if !arity.accepts(args.len()) {
            return Err(RuntimeError::ArityMismatch {
                selector: self.name,
                expected: arity,
                got: args.len(),
            });
        }
        let bound = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, parameter)| match parameter {
                Parameter::Required(name) => (*name, args[i].clone()),
                Parameter::Rest(name) => (*name, Value::table(&args[i..])),
            })
            .collect();
        Ok(bound)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            MethodBody::Native(_) => "native".to_string(),
            MethodBody::Fragment(fragment) => format!("{fragment:?}"),
        };
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("body", &body)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &mut VM, _: &Context, _: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Nil)
    }

    #[test]
    fn binds_positionally_and_collects_rest() {
        let method = Method::native("m", &["a", "@rest"], nop).unwrap();
        assert_eq!(method.arity(), Arity::at_least(1));

        let bound = method
            .bind_arguments(&[Value::Fixnum(1), Value::Fixnum(2), Value::Fixnum(3)])
            .unwrap();
        assert_eq!(bound[0].0, Symbol::intern("a"));
        assert_eq!(bound[0].1.as_fixnum(), Some(1));
        match &bound[1].1 {
            Value::Table(rest) => assert_eq!(rest.len(), 2),
            other => panic!("expected rest table, got {other}"),
        }

        let empty_rest = method.bind_arguments(&[Value::Nil]).unwrap();
        assert!(matches!(&empty_rest[1].1, Value::Table(t) if t.is_empty()));
    }

    #[test]
    fn arity_mismatch() {
        let method = Method::native("m", &["a", "b"], nop).unwrap();
        let err = method.bind_arguments(&[Value::Nil]).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::ArityMismatch { expected, got: 1, .. }
                if expected == Arity::exact(2)
        ));
        let variadic = Method::native("v", &["a", "@r"], nop).unwrap();
        assert!(variadic.bind_arguments(&[]).is_err());
    }

    #[test]
    fn malformed_parameter_lists() {
        assert!(matches!(
            Method::native("m", &["@r", "a"], nop),
            Err(RuntimeError::IllegalArgument { .. })
        ));
        assert!(matches!(
            Method::native("m", &["a", "a"], nop),
            Err(RuntimeError::DuplicateSlot { .. })
        ));
    }
}
