//! OPC UA Device Integration server
//!
//! This crate hosts the DI address space: the node tree built from the type
//! registry, the method dispatcher, and the lock services and software update
//! machines bound to DI objects.

pub mod address_space;
pub mod bindings;
pub mod config;
pub mod dispatcher;
pub mod server;

pub use address_space::{AddressSpace, Node, NodeChange};
pub use bindings::{LiveValue, LockMethodHandler, LockOperation, UpdateMethodHandler, UpdateOperation};
pub use config::ServerConfig;
pub use dispatcher::{CallContext, Dispatcher, MethodHandler};
pub use server::{DiServer, SessionId};
