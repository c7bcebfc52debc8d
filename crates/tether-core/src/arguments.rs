//! Packaged call arguments, return values and call signatures.
//!
//! Extensions are invoked dynamically, so a call's actual parameters travel
//! as a [`PackagedArguments`] list of type-erased values. A [`Signature`]
//! describes the argument shape an extension expects, and a [`ReturnValue`]
//! carries an optional type-erased result back.
//!
//! # Example
//!
//! ```
//! use tether_core::{PackagedArguments, Signature};
//!
//! let args = PackagedArguments::new().with(42_i32).with(String::from("hello"));
//! let signature = Signature::new().arg::<i32>().arg::<String>();
//!
//! assert!(signature.verify(&args));
//! assert_eq!(*args.get::<i32>(0).unwrap(), 42);
//! assert!(args.get::<u8>(0).is_err());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::ArgumentError;

/// A single type-erased value.
#[derive(Clone)]
pub struct Argument {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Argument {
    /// Erase `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the erased value.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The type name of the erased value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the value as `T`, if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Argument").field(&self.type_name).finish()
    }
}

/// The actual parameters of one call, in order.
///
/// Cloning is cheap: the values themselves are shared.
#[derive(Clone, Debug, Default)]
pub struct PackagedArguments {
    args: Vec<Argument>,
}

impl PackagedArguments {
    /// An empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` and return the list, for chained construction.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Append `value`.
    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.args.push(Argument::new(value));
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The erased argument at `index`.
    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.args.get(index)
    }

    /// Borrow the argument at `index` as `T`.
    pub fn get<T: Any>(&self, index: usize) -> Result<&T, ArgumentError> {
        let argument = self.args.get(index).ok_or(ArgumentError::OutOfRange {
            index,
            len: self.args.len(),
        })?;
        argument
            .downcast_ref::<T>()
            .ok_or(ArgumentError::TypeMismatch {
                index,
                expected: std::any::type_name::<T>(),
                got: argument.type_name(),
            })
    }

    /// Iterate the erased arguments.
    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.args.iter()
    }

    /// The `TypeId`s of the arguments, in order.
    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.args.iter().map(Argument::type_id)
    }
}

/// The optional result of running an extension.
#[derive(Clone, Debug, Default)]
pub struct ReturnValue(Option<Argument>);

impl ReturnValue {
    /// A result carrying no value.
    pub fn empty() -> Self {
        Self(None)
    }

    /// A result carrying `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Argument::new(value)))
    }

    /// Whether no value is carried.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the carried value as `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(Argument::downcast_ref::<T>)
    }
}

/// One expected parameter of a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Param {
    type_id: TypeId,
    type_name: &'static str,
}

/// The argument shape an extension accepts.
///
/// [`Signature::any`] (the default) accepts every argument list. A signature
/// built with [`Signature::new`] and [`arg`](Signature::arg) accepts exactly
/// the listed types in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    params: Option<Vec<Param>>,
}

impl Signature {
    /// A signature accepting any arguments.
    pub fn any() -> Self {
        Self { params: None }
    }

    /// An exact signature with no parameters yet.
    pub fn new() -> Self {
        Self {
            params: Some(Vec::new()),
        }
    }

    /// Append a parameter of type `T`.
    ///
    /// Calling this on [`Signature::any`] turns it into an exact signature.
    pub fn arg<T: Any>(mut self) -> Self {
        self.params.get_or_insert_with(Vec::new).push(Param {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        });
        self
    }

    /// Whether this signature accepts anything.
    pub fn is_any(&self) -> bool {
        self.params.is_none()
    }

    /// Number of parameters, or `None` for [`Signature::any`].
    pub fn arity(&self) -> Option<usize> {
        self.params.as_ref().map(Vec::len)
    }

    /// Check `args` against this signature.
    pub fn verify(&self, args: &PackagedArguments) -> bool {
        match &self.params {
            None => true,
            Some(params) => {
                params.len() == args.len()
                    && params
                        .iter()
                        .zip(args.type_ids())
                        .all(|(param, type_id)| param.type_id == type_id)
            }
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.params {
            None => write!(f, "(..)"),
            Some(params) => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param.type_name)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_typed_argument() {
        let args = PackagedArguments::new().with(7_u32).with("text");
        assert_eq!(args.len(), 2);
        assert_eq!(*args.get::<u32>(0).unwrap(), 7);
        assert_eq!(*args.get::<&str>(1).unwrap(), "text");
    }

    #[test]
    fn test_get_errors() {
        let args = PackagedArguments::new().with(7_u32);
        assert_eq!(
            args.get::<u32>(3),
            Err(ArgumentError::OutOfRange { index: 3, len: 1 })
        );
        assert!(matches!(
            args.get::<i64>(0),
            Err(ArgumentError::TypeMismatch { index: 0, got: "u32", .. })
        ));
    }

    #[test]
    fn test_signature_verification() {
        let exact = Signature::new().arg::<i32>().arg::<bool>();
        assert!(exact.verify(&PackagedArguments::new().with(1_i32).with(true)));
        assert!(!exact.verify(&PackagedArguments::new().with(true).with(1_i32)));
        assert!(!exact.verify(&PackagedArguments::new().with(1_i32)));

        let empty = Signature::new();
        assert!(empty.verify(&PackagedArguments::new()));
        assert!(!empty.verify(&PackagedArguments::new().with(1_i32)));

        assert!(Signature::any().verify(&PackagedArguments::new().with("x")));
        assert_eq!(Signature::default(), Signature::any());
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(Signature::any().to_string(), "(..)");
        assert_eq!(Signature::new().arg::<i32>().arg::<bool>().to_string(), "(i32, bool)");
    }

    #[test]
    fn test_return_value() {
        assert!(ReturnValue::empty().is_empty());
        let value = ReturnValue::new(3_usize);
        assert_eq!(value.get::<usize>(), Some(&3));
        assert_eq!(value.get::<i32>(), None);
    }
}
