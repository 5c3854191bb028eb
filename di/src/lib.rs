//! OPC UA Device Integration address space
//!
//! The library is organized as a workspace with multiple crates:
//!
//! - `di-core`: node ids, namespaces, values and the error type
//! - `di-model`: the DI type model, locking service, software update
//!   state machines and alarm field layout
//! - `di-server`: address space tree, method dispatcher and the server
//!   binding behavior to DI objects
//!
//! # Usage
//!
//! ```no_run
//! use di::server::{DiServer, ServerConfig};
//! use di::model::well_known::{di as di_ids, names};
//!
//! # async fn example() -> di::DiResult<()> {
//! let server = DiServer::new(ServerConfig::default())?;
//! let device_type = server.di_type(di_ids::DEVICE_TYPE)?;
//! let pump = server
//!     .create_object(&device_type, "Pump01", &server.objects_folder())
//!     .await?;
//! let health = server
//!     .find_child(&pump.node_id, &server.di_name(names::DEVICE_HEALTH), true)
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use di_core::{
    DataType, DiError, DiResult, LocalizedText, NamespaceTable, NodeId, QualifiedName, StatusCode,
    ValueRank, Variant,
};

// Re-export the information model
pub mod model {
    pub use di_model::*;
}

// Re-export server API
pub mod server {
    pub use di_server::*;
}
