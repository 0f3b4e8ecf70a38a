//! Reconstructed type members: fields, methods, properties and events.
//!
//! Members are owned by their declaring [`crate::metadata::typesystem::ManagedType`]
//! through strong references; any reference from a member back into the type
//! graph goes through weak [`crate::metadata::typesystem::ManagedTypeRef`]
//! handles, keeping ownership acyclic.

mod event;
mod field;
mod method;
mod property;

pub use event::{EventList, ManagedEvent, ManagedEventRc};
pub use field::{FieldLayoutEntry, FieldList, FieldModifiers, ManagedField, ManagedFieldRc};
pub use method::{
    ManagedMethod, MethodList, MethodModifiers, MethodOverride, MethodRc, Param, ParamList,
    ParamRc, StubBody, NO_SLOT,
};
pub use property::{ManagedProperty, ManagedPropertyRc, PropertyList};
