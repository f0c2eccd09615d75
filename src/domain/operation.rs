//! Operation identity for scoping fallback policy.
//!
//! An operation identity names "which method, on which capability" without
//! reference to the arguments of any particular call. It is built from:
//! - The declaring capability's type name
//! - The method name
//! - The ordered list of parameter type names
//!
//! The same identity is supplied when registering an exclusion rule and when
//! invoking the operation, so a rule applies regardless of argument values.

use ahash::AHasher;
use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Signature-level identity of one operation on a capability.
///
/// Two identities are equal only when capability, method name and parameter
/// types all match, so overloads that differ only in parameter types are
/// distinct operations.
///
/// # Example
/// ```
/// use resilient_fallback::{operation, OperationId};
///
/// trait Repository: Send + Sync {
///     fn send(&self, payload: &str) -> Result<(), std::io::Error>;
/// }
///
/// let explicit = OperationId::of::<dyn Repository>("send", &[std::any::type_name::<&str>()]);
/// let from_macro = operation!(dyn Repository => send(&str));
///
/// assert_eq!(explicit, from_macro);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId {
    capability: Cow<'static, str>,
    method: Cow<'static, str>,
    parameters: Vec<Cow<'static, str>>,
}

impl OperationId {
    /// Create an identity from its raw parts.
    ///
    /// # Arguments
    /// * `capability` - Name of the declaring capability
    /// * `method` - Method name
    /// * `parameters` - Parameter type names, in declaration order
    pub fn new(
        capability: impl Into<Cow<'static, str>>,
        method: impl Into<Cow<'static, str>>,
        parameters: impl IntoIterator<Item = impl Into<Cow<'static, str>>>,
    ) -> Self {
        Self {
            capability: capability.into(),
            method: method.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an identity whose capability name is taken from the type `C`.
    pub fn of<C: ?Sized>(method: &'static str, parameters: &[&'static str]) -> Self {
        Self::new(type_name::<C>(), method, parameters.iter().copied())
    }

    /// Name of the declaring capability.
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parameter type names in declaration order.
    pub fn parameters(&self) -> impl ExactSizeIterator<Item = &str> {
        self.parameters.iter().map(|p| p.as_ref())
    }

    /// Compact 64-bit fingerprint of this identity, stable within a process.
    ///
    /// Used as a short structured field in log events.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = AHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.capability, self.method)?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(parameter)?;
        }
        f.write_str(")")
    }
}

/// Build an [`OperationId`] from a signature-like expression.
///
/// Only types are written, never argument values:
///
/// ```
/// use resilient_fallback::operation;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self, times: u32, name: &str) -> Result<String, std::fmt::Error>;
///     fn ping(&self) -> Result<(), std::fmt::Error>;
/// }
///
/// let greet = operation!(dyn Greeter => greet(u32, &str));
/// let ping = operation!(dyn Greeter => ping());
///
/// assert_eq!(greet.method(), "greet");
/// assert_eq!(greet.parameters().len(), 2);
/// assert_ne!(greet, ping);
/// ```
#[macro_export]
macro_rules! operation {
    ($capability:ty => $method:ident ( $($param:ty),* $(,)? )) => {
        $crate::OperationId::of::<$capability>(
            ::std::stringify!($method),
            &[$(::std::any::type_name::<$param>()),*],
        )
    };
}
