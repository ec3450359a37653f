//! Domain types shared by the loader, registry, resolver and engine.

pub mod account;
pub mod client;
pub mod profile;

pub use account::{AccountClaims, AccountRecord};
pub use client::{ClientSpec, GrantType, ResponseType, TokenEndpointAuthMethod};
pub use profile::FlowProfile;
