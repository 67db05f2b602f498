//! Runtime reflection: type signatures, reflected objects, and factories

pub mod attributed;
pub mod factory;
pub mod signature;

pub use attributed::{
    append_auxiliary, is_attribute, is_auxiliary_attribute, is_prescribed_attribute, Reflected,
};
pub use factory::{CreateFn, FactoryRegistry};
pub use signature::{Binding, Signature, TypeRegistry};
