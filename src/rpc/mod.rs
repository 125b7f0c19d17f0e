//! JSON-RPC 2.0 stdio transport: wire types, the read/dispatch
//! loop, and the exposed tool surface.

pub mod protocol;
pub mod server;
pub mod tools;
