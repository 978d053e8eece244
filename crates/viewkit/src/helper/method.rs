//! Callables and their return contract.

use std::fmt;
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr};
use minijinja::{Error, ErrorKind, State, Value};

use crate::error::ValidationError;

type HelperFn = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

/// Return types a helper callable may produce.
///
/// `ARITY` is the number of values the callable hands back to a template.
/// A callable is installable when it returns exactly one value, or two
/// values where the second is error-shaped. `Result<T, E>` is the two-value
/// form when `T` is a single value; `()` is zero values and tuples are two or
/// three plain values, all of which are refused at registration.
pub trait HelperReturn {
    const ARITY: usize;
    const ERROR_SHAPED: bool = false;

    fn into_value(self) -> Result<Value, Error>;
}

macro_rules! single_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HelperReturn for $ty {
                const ARITY: usize = 1;

                fn into_value(self) -> Result<Value, Error> {
                    Ok(Value::from(self))
                }
            }
        )*
    };
}

single_value!(
    String,
    &'static str,
    bool,
    i32,
    i64,
    u32,
    u64,
    usize,
    f32,
    f64,
    Value,
    Vec<Value>,
    Vec<String>,
);

impl HelperReturn for () {
    const ARITY: usize = 0;

    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::UNDEFINED)
    }
}

impl<A: HelperReturn, B: HelperReturn> HelperReturn for (A, B) {
    const ARITY: usize = 2;

    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::from(vec![self.0.into_value()?, self.1.into_value()?]))
    }
}

impl<A: HelperReturn, B: HelperReturn, C: HelperReturn> HelperReturn for (A, B, C) {
    const ARITY: usize = 3;

    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::from(vec![
            self.0.into_value()?,
            self.1.into_value()?,
            self.2.into_value()?,
        ]))
    }
}

impl<T: HelperReturn, E: fmt::Display> HelperReturn for Result<T, E> {
    const ARITY: usize = T::ARITY + 1;
    const ERROR_SHAPED: bool = T::ARITY == 1;

    fn into_value(self) -> Result<Value, Error> {
        match self {
            Ok(value) => value.into_value(),
            Err(err) => Err(Error::new(ErrorKind::InvalidOperation, err.to_string())),
        }
    }
}

/// A named callable exposed to templates.
///
/// Arguments arrive as template values; [`minijinja::value::from_args`] is
/// the usual way to unpack them:
///
/// ```rust
/// use minijinja::value::from_args;
/// use viewkit::HelperMethod;
///
/// let greet = HelperMethod::new("Greet", |args: &[minijinja::Value]| {
///     let (name,): (String,) = from_args(args)?;
///     Ok::<_, minijinja::Error>(format!("hello {name}"))
/// });
/// assert_eq!(greet.returns(), 2);
/// ```
#[derive(Clone)]
pub struct HelperMethod {
    name: String,
    returns: usize,
    error_shaped: bool,
    func: Arc<HelperFn>,
}

impl HelperMethod {
    pub fn new<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> R + Send + Sync + 'static,
        R: HelperReturn,
    {
        Self {
            name: name.into(),
            returns: R::ARITY,
            error_shaped: R::ERROR_SHAPED,
            func: Arc::new(move |args: &[Value]| f(args).into_value()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of values the callable returns.
    pub fn returns(&self) -> usize {
        self.returns
    }

    /// Checks the one-value / value-plus-error contract.
    pub(crate) fn check_contract(&self, owner: &str) -> Result<(), ValidationError> {
        match (self.returns, self.error_shaped) {
            (1, _) | (2, true) => Ok(()),
            (count, _) => Err(ValidationError::BadReturn {
                owner: owner.to_string(),
                method: self.name.clone(),
                count,
            }),
        }
    }

    /// Calls the helper directly.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Error> {
        (self.func)(args)
    }

    pub(crate) fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl fmt::Debug for HelperMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperMethod")
            .field("name", &self.name)
            .field("returns", &self.returns)
            .field("error_shaped", &self.error_shaped)
            .finish_non_exhaustive()
    }
}

impl Object for HelperMethod {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call(self: &Arc<Self>, _state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
        tracing::trace!(helper = %self.name, args = args.len(), "calling helper");
        self.invoke(args)
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<helper {}>", self.name)
    }
}
