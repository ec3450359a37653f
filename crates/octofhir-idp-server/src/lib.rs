pub mod observability;
pub mod server;

pub use observability::{apply_logging_level, init_tracing, init_tracing_with_level};
pub use server::{IdpServer, ServerBuilder, build_app};
