//! Sessions: authenticated clients bound to a simulation entity.

#[allow(clippy::module_inception)]
mod session;
mod registry;

pub use registry::SessionRegistry;
pub use session::Session;
