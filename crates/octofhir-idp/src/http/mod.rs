//! HTTP plumbing shared by the assembly and the embedded engine.

pub mod origin;

pub use origin::{OriginPolicy, RequestOrigin, resolve_origin};
