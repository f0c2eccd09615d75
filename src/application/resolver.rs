//! Implementation slots and their resolution into callable instances.
//!
//! A slot is one ordered entry of a fallback chain. Slots are resolved one at
//! a time, right before the attempt that uses them, so an early success never
//! builds the implementations behind it.

use crate::application::context::ResolutionContext;
use crate::domain::failure::ResolveError;
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

/// Declares that a concrete type serves the capability `C`.
///
/// Needed by type-token slots, which resolve the concrete type through the
/// [`ResolutionContext`] and then hand it out as the capability. Usually
/// implemented with the [`implements!`](crate::implements) macro.
pub trait Implements<C: ?Sized>: Send + Sync + 'static {
    /// Convert a shared concrete instance into the capability.
    fn upcast(self: Arc<Self>) -> Arc<C>;
}

/// Implement [`Implements`] for one or more concrete types.
///
/// ```
/// use resilient_fallback::implements;
///
/// trait Store: Send + Sync {}
///
/// struct Primary;
/// struct Backup;
/// impl Store for Primary {}
/// impl Store for Backup {}
///
/// implements!(dyn Store => Primary, Backup);
/// ```
#[macro_export]
macro_rules! implements {
    ($capability:ty => $($concrete:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$capability> for $concrete {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$capability> {
                    self
                }
            }
        )+
    };
}

/// Factory producing an implementation from the resolution context.
pub type SlotFactory<C> =
    Arc<dyn Fn(&ResolutionContext) -> Result<Arc<C>, ResolveError> + Send + Sync>;

/// A concrete type resolved lazily through the [`ResolutionContext`].
pub struct TypeToken<C: ?Sized> {
    type_id: TypeId,
    type_name: &'static str,
    resolve: fn(&ResolutionContext) -> Result<Arc<C>, ResolveError>,
}

fn resolve_as<C, T>(context: &ResolutionContext) -> Result<Arc<C>, ResolveError>
where
    C: ?Sized,
    T: Implements<C>,
{
    context.resolve::<T>().map(<T as Implements<C>>::upcast)
}

impl<C: ?Sized> TypeToken<C> {
    /// Token for the concrete type `T`.
    pub fn of<T: Implements<C>>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            resolve: resolve_as::<C, T>,
        }
    }

    /// Type id of the concrete type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the concrete type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl<C: ?Sized> Clone for TypeToken<C> {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            resolve: self.resolve,
        }
    }
}

impl<C: ?Sized> fmt::Debug for TypeToken<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeToken").field(&self.type_name).finish()
    }
}

/// One ordered entry of a fallback chain.
pub enum ImplementationSlot<C: ?Sized> {
    /// A pre-built instance, handed out as-is
    Instance(Arc<C>),
    /// A factory called with the resolution context on every attempt
    Factory(SlotFactory<C>),
    /// A concrete type resolved through the resolution context
    Type(TypeToken<C>),
}

impl<C: ?Sized> ImplementationSlot<C> {
    /// Slot holding a pre-built instance.
    pub fn instance(instance: Arc<C>) -> Self {
        ImplementationSlot::Instance(instance)
    }

    /// Slot built by a factory on every attempt.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&ResolutionContext) -> Result<Arc<C>, ResolveError> + Send + Sync + 'static,
    {
        ImplementationSlot::Factory(Arc::new(factory))
    }

    /// Slot resolved from the concrete type `T`.
    pub fn of_type<T: Implements<C>>() -> Self {
        ImplementationSlot::Type(TypeToken::of::<T>())
    }

    /// Short label used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            ImplementationSlot::Instance(_) => "instance",
            ImplementationSlot::Factory(_) => "factory",
            ImplementationSlot::Type(_) => "type",
        }
    }

    /// Resolve this slot into a ready-to-call instance for one attempt.
    ///
    /// # Errors
    /// Returns the factory's or the context's [`ResolveError`]; the executor
    /// treats it as a failure of this attempt.
    pub fn resolve(&self, context: &ResolutionContext) -> Result<Arc<C>, ResolveError> {
        match self {
            ImplementationSlot::Instance(instance) => Ok(Arc::clone(instance)),
            ImplementationSlot::Factory(factory) => factory(context),
            ImplementationSlot::Type(token) => (token.resolve)(context),
        }
    }
}

impl<C: ?Sized> Clone for ImplementationSlot<C> {
    fn clone(&self) -> Self {
        match self {
            ImplementationSlot::Instance(instance) => {
                ImplementationSlot::Instance(Arc::clone(instance))
            }
            ImplementationSlot::Factory(factory) => {
                ImplementationSlot::Factory(Arc::clone(factory))
            }
            ImplementationSlot::Type(token) => ImplementationSlot::Type(token.clone()),
        }
    }
}

impl<C: ?Sized> fmt::Debug for ImplementationSlot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImplementationSlot::Instance(_) => f.write_str("Instance(<instance>)"),
            ImplementationSlot::Factory(_) => f.write_str("Factory(<fn>)"),
            ImplementationSlot::Type(token) => f.debug_tuple("Type").field(token).finish(),
        }
    }
}
