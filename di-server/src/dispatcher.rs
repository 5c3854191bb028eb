//! Method invocation dispatcher
//!
//! Method behavior is injected as [`MethodHandler`]s registered per method
//! node id. The dispatcher validates inputs against the method's argument
//! schema before a handler runs, and validates the handler's outputs
//! against the output schema before they are returned.

use crate::address_space::AddressSpace;
use async_trait::async_trait;
use di_core::{DiError, DiResult, NodeId, Variant};
use di_model::{Argument, CallerIdentity, TypeRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Information a handler gets about the call it serves
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub caller: CallerIdentity,
    /// Object the method belongs to
    pub object_id: NodeId,
    pub method_id: NodeId,
}

/// Behavior bound to a method node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the method
    ///
    /// `inputs` already match the method's input schema. The returned list
    /// must match its output schema.
    async fn call(&self, context: &CallContext, inputs: &[Variant]) -> DiResult<Vec<Variant>>;
}

/// Handler registry and call entry point
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<NodeId, Arc<dyn MethodHandler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a method node, replacing any previous one
    pub async fn register(&self, method_id: NodeId, handler: Arc<dyn MethodHandler>) {
        log::debug!("Bound handler to method {}", method_id);
        self.handlers.write().await.insert(method_id, handler);
    }

    pub async fn unregister(&self, method_id: &NodeId) -> bool {
        self.handlers.write().await.remove(method_id).is_some()
    }

    pub async fn has_handler(&self, method_id: &NodeId) -> bool {
        self.handlers.read().await.contains_key(method_id)
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Invoke a method
    ///
    /// # Arguments
    /// * `space` - Address space holding the method node
    /// * `caller` - Identity of the calling session
    /// * `method_id` - Method node to invoke
    /// * `inputs` - Positional input arguments
    ///
    /// # Errors
    /// - `DiError::NotFound` if the method node does not exist
    /// - `DiError::BadArgument` if the node is not a method or the inputs do
    ///   not match the input schema; the handler is not run
    /// - `DiError::NotImplemented` if no handler is bound
    /// - `DiError::InvalidData` if the handler's outputs do not match the
    ///   output schema
    /// - any error the handler returns
    pub async fn invoke(
        &self,
        space: &AddressSpace,
        caller: &CallerIdentity,
        method_id: &NodeId,
        inputs: &[Variant],
    ) -> DiResult<Vec<Variant>> {
        let method = space
            .node(method_id)
            .await
            .ok_or_else(|| DiError::NotFound(format!("Method {}", method_id)))?;
        let Some(signature) = method.signature.as_ref().filter(|_| method.is_method()) else {
            return Err(DiError::BadArgument(format!("{} is not a method", method.browse_name)));
        };

        let handler = self
            .handlers
            .read()
            .await
            .get(method_id)
            .cloned()
            .ok_or_else(|| {
                log::warn!("Call to unbound method {} ({})", method.browse_name, method_id);
                DiError::NotImplemented(format!("{}", method.browse_name))
            })?;

        check_arguments(space.registry(), &signature.input_arguments, inputs).map_err(|reason| {
            log::warn!("Rejected call to {}: {}", method.browse_name, reason);
            DiError::BadArgument(format!("{}: {}", method.browse_name, reason))
        })?;

        let context = CallContext {
            caller: caller.clone(),
            object_id: method.parent.clone().unwrap_or_else(NodeId::null),
            method_id: method_id.clone(),
        };
        let outputs = handler.call(&context, inputs).await?;

        check_arguments(space.registry(), &signature.output_arguments, &outputs).map_err(|reason| {
            log::warn!("Handler of {} returned bad outputs: {}", method.browse_name, reason);
            DiError::InvalidData(format!("{} outputs: {}", method.browse_name, reason))
        })?;
        Ok(outputs)
    }
}

/// Check a positional argument list against its schema
fn check_arguments(registry: &TypeRegistry, schema: &[Argument], values: &[Variant]) -> Result<(), String> {
    if schema.len() != values.len() {
        return Err(format!("expected {} arguments, got {}", schema.len(), values.len()));
    }
    for (index, (argument, value)) in schema.iter().zip(values).enumerate() {
        if !registry.accepts_value(&argument.data_type, argument.value_rank, value) {
            return Err(format!(
                "argument {} ({}) does not accept a {:?} value",
                index,
                argument.name,
                value.get_type()
            ));
        }
    }
    Ok(())
}
