//! Device Integration server
//!
//! [`DiServer`] ties the address space, the dispatcher and the behavior bound
//! to DI objects together. Every instance created through the server is
//! scanned for LockingServices and SoftwareUpdate objects, which get their
//! lock service or update machines and the method handlers driving them.

use crate::address_space::{AddressSpace, Node, NodeChange};
use crate::bindings::{
    LiveValue, LockField, LockMethodHandler, LockOperation, MachineField, UpdateMethodHandler,
    UpdateOperation,
};
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use di_core::{DiError, DiResult, NamespaceTable, NodeId, QualifiedName, Variant};
use di_model::alarm::{self, FieldPath};
use di_model::well_known::{self, di, di_node_id, names};
use di_model::{
    CallerIdentity, ConditionFields, LockingService, ModelDocument, SoftwareUpdate, TypeRegistry,
    standard_registry,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast};

/// State machines of a SoftwareUpdate object
const UPDATE_MACHINES: [&str; 4] = [
    names::PREPARE_FOR_UPDATE,
    names::INSTALLATION,
    names::POWER_CYCLE,
    names::CONFIRMATION,
];

/// Handle of an open client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Behavior bound to nodes of the address space
#[derive(Default)]
struct Bindings {
    /// Lock service per lockable topology element
    locks: HashMap<NodeId, Arc<LockingService>>,
    /// LockingServices object to the element it locks
    lock_objects: HashMap<NodeId, NodeId>,
    /// Methods of LockingServices objects; exempt from the lock check
    lock_methods: HashSet<NodeId>,
    updates: HashMap<NodeId, Arc<SoftwareUpdate>>,
    live_values: HashMap<NodeId, LiveValue>,
}

/// Device Integration server
///
/// Owns:
/// - the namespace table and the type registry built from the model documents
/// - the address space holding every instance
/// - the method dispatcher
/// - open sessions, each supplying the caller identity of its calls
/// - per-element lock services and per-object software update machines
///
/// # Usage Example
/// ```rust,no_run
/// use di_core::QualifiedName;
/// use di_model::well_known::{di, names};
/// use di_server::{DiServer, ServerConfig};
///
/// # async fn example() -> di_core::DiResult<()> {
/// let server = DiServer::new(ServerConfig::default())?;
/// let device_type = server.di_type(di::DEVICE_TYPE)?;
/// let device = server
///     .create_object(&device_type, "Pump01", &server.objects_folder())
///     .await?;
/// let lock = server
///     .find_child(&device.node_id, &server.di_name(names::LOCK), true)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DiServer {
    config: ServerConfig,
    namespaces: NamespaceTable,
    registry: Arc<TypeRegistry>,
    address_space: Arc<AddressSpace>,
    dispatcher: Dispatcher,
    di_namespace: u16,
    locking_services_type: NodeId,
    software_update_type: NodeId,
    next_session: AtomicU64,
    sessions: RwLock<HashMap<SessionId, CallerIdentity>>,
    bindings: RwLock<Bindings>,
    /// Serializes binding so an object is never bound twice
    binding: Mutex<()>,
}

impl DiServer {
    /// Create a server with the shipped base and DI models
    ///
    /// With `model_path` set, the DI model is read from that file instead.
    ///
    /// # Errors
    /// Returns `DiError::InvalidData` for an invalid configuration and any
    /// error raised while loading or registering the model documents
    pub fn new(config: ServerConfig) -> DiResult<Self> {
        config.validate()?;

        let mut namespaces = NamespaceTable::new();
        let registry = match &config.model_path {
            Some(path) => {
                let mut registry = TypeRegistry::new();
                ModelDocument::builtin_base()?.register(&mut namespaces, &mut registry)?;
                ModelDocument::from_path(path)?.register(&mut namespaces, &mut registry)?;
                registry
            }
            None => standard_registry(&mut namespaces)?,
        };
        let registry = Arc::new(registry);

        let di_namespace = namespaces
            .index_of(di_core::DI_NAMESPACE_URI)
            .ok_or_else(|| DiError::Model("DI model is not registered".to_string()))?;
        let locking_services_type = di_node_id(&namespaces, di::LOCKING_SERVICES_TYPE)?;
        let software_update_type = di_node_id(&namespaces, di::SOFTWARE_UPDATE_TYPE)?;

        let instance_namespace = namespaces.register(&config.namespace_uri);
        let address_space = Arc::new(AddressSpace::new(
            Arc::clone(&registry),
            instance_namespace,
            config.change_channel_capacity,
        ));

        log::info!(
            "DI server {} ready: {} types, instances in namespace {}",
            config.application_uri,
            registry.len(),
            instance_namespace
        );

        Ok(Self {
            config,
            namespaces,
            registry,
            address_space,
            dispatcher: Dispatcher::new(),
            di_namespace,
            locking_services_type,
            software_update_type,
            next_session: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
            bindings: RwLock::new(Bindings::default()),
            binding: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn address_space(&self) -> &Arc<AddressSpace> {
        &self.address_space
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn objects_folder(&self) -> NodeId {
        self.address_space.objects_folder()
    }

    /// Namespace in which instances are allocated
    pub fn namespace_index(&self) -> u16 {
        self.address_space.namespace_index()
    }

    /// Node id of a DI type, e.g. `di::DEVICE_TYPE`
    pub fn di_type(&self, id: u32) -> DiResult<NodeId> {
        di_node_id(&self.namespaces, id)
    }

    /// Browse name in the DI namespace
    pub fn di_name(&self, name: &str) -> QualifiedName {
        QualifiedName::new(self.di_namespace, name)
    }

    /// Open a session for a client
    pub async fn open_session(&self, client_id: &str, user_id: &str) -> SessionId {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        self.sessions
            .write()
            .await
            .insert(session, CallerIdentity::new(client_id, user_id));
        log::info!("Opened {} for client {} (user {})", session, client_id, user_id);
        session
    }

    /// Close a session
    ///
    /// Locks its client holds are released once no other session of the same
    /// client remains open.
    ///
    /// # Errors
    /// Returns `DiError::NotFound` for an unknown session
    pub async fn close_session(&self, session: SessionId) -> DiResult<()> {
        let caller = self
            .sessions
            .write()
            .await
            .remove(&session)
            .ok_or_else(|| DiError::NotFound(format!("{}", session)))?;
        log::info!("Closed {} of client {}", session, caller.client_id);

        let client_still_connected = self
            .sessions
            .read()
            .await
            .values()
            .any(|c| c.client_id == caller.client_id);
        if client_still_connected {
            return Ok(());
        }

        let services: Vec<Arc<LockingService>> =
            self.bindings.read().await.locks.values().cloned().collect();
        for service in services {
            if service.is_locked_by(&caller.client_id).await {
                if let Err(e) = service.exit_lock(&caller).await {
                    log::warn!("Failed to release {} for {}: {}", service.name(), caller.client_id, e);
                }
            }
        }
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Instantiate `type_id` below `parent` and bind its behavior
    ///
    /// # Arguments
    /// * `type_id` - Object type to instantiate
    /// * `browse_name` - Name of the new object in the instance namespace
    /// * `parent` - Node the object is added to
    ///
    /// # Errors
    /// Returns `DiError::NotFound` for an unknown parent or type and
    /// `DiError::BadArgument` for an abstract type or a duplicate name
    pub async fn create_object(&self, type_id: &NodeId, browse_name: &str, parent: &NodeId) -> DiResult<Node> {
        let name = QualifiedName::new(self.namespace_index(), browse_name);
        let node = self.address_space.instantiate(type_id, name, parent).await?;
        self.bind_subtree(&node).await?;
        Ok(node)
    }

    /// Look up a child by browse name, optionally creating it
    ///
    /// Children created here get their behavior bound like those of
    /// [`create_object`](Self::create_object). Existing children are
    /// returned as they are.
    pub async fn find_child(
        &self,
        parent: &NodeId,
        browse_name: &QualifiedName,
        create_if_missing: bool,
    ) -> DiResult<Option<Node>> {
        let existing = self.address_space.find_child(parent, browse_name, false).await?;
        if existing.is_some() || !create_if_missing {
            return Ok(existing);
        }
        let created = self.address_space.find_child(parent, browse_name, true).await?;
        if let Some(node) = &created {
            self.bind_subtree(node).await?;
        }
        Ok(created)
    }

    /// Children of a node, type-declared children first
    pub async fn browse(&self, node_id: &NodeId) -> DiResult<Vec<Node>> {
        self.address_space.get_children(node_id).await
    }

    pub async fn node(&self, node_id: &NodeId) -> Option<Node> {
        self.address_space.node(node_id).await
    }

    /// Remove a node and its subtree, dropping the behavior bound to it
    pub async fn remove_node(&self, node_id: &NodeId) -> DiResult<Vec<NodeId>> {
        let _binding = self.binding.lock().await;
        let removed = self.address_space.remove_node(node_id).await?;

        let mut bindings = self.bindings.write().await;
        for id in &removed {
            if let Some(element) = bindings.lock_objects.remove(id) {
                bindings.locks.remove(&element);
            }
            bindings.locks.remove(id);
            bindings.lock_methods.remove(id);
            bindings.updates.remove(id);
            bindings.live_values.remove(id);
            self.dispatcher.unregister(id).await;
        }
        Ok(removed)
    }

    /// Call a method on behalf of a session
    ///
    /// # Errors
    /// - `DiError::NotFound` for an unknown session or method
    /// - `DiError::AccessDenied` if an element above the method is locked by
    ///   another client; the lock's own methods are exempt
    /// - any error of [`Dispatcher::invoke`]
    pub async fn call(&self, session: SessionId, method_id: &NodeId, inputs: &[Variant]) -> DiResult<Vec<Variant>> {
        let caller = self.caller(session).await?;
        let method = self
            .address_space
            .node(method_id)
            .await
            .ok_or_else(|| DiError::NotFound(format!("Method {}", method_id)))?;

        let exempt = self.bindings.read().await.lock_methods.contains(method_id);
        if !exempt {
            let target = method.parent.clone().unwrap_or_else(|| method_id.clone());
            self.check_access(&caller, &target).await?;
        }

        self.dispatcher
            .invoke(&self.address_space, &caller, method_id, inputs)
            .await
    }

    /// Read a variable value
    ///
    /// Lock variables and update machine state read the live state behind
    /// them; other variables read their stored value.
    pub async fn read_value(&self, node_id: &NodeId) -> DiResult<Variant> {
        let live = self.bindings.read().await.live_values.get(node_id).cloned();
        match live {
            Some(live) => Ok(live.read().await),
            None => self.address_space.read_value(node_id).await,
        }
    }

    /// Write a variable value on behalf of a session
    ///
    /// # Errors
    /// Returns `DiError::AccessDenied` for live variables and for variables
    /// below an element locked by another client
    pub async fn write_value(&self, session: SessionId, node_id: &NodeId, value: Variant) -> DiResult<()> {
        let caller = self.caller(session).await?;
        if self.bindings.read().await.live_values.contains_key(node_id) {
            return Err(DiError::AccessDenied(format!("{} is read-only", node_id)));
        }
        self.check_access(&caller, node_id).await?;
        self.address_space.write_value(node_id, value).await
    }

    /// Subscribe to structural and value changes
    pub fn subscribe_changes(&self) -> broadcast::Receiver<NodeChange> {
        self.address_space.subscribe()
    }

    /// Lock service of a topology element
    pub async fn lock_service(&self, element: &NodeId) -> Option<Arc<LockingService>> {
        self.bindings.read().await.locks.get(element).cloned()
    }

    /// Update machines of a SoftwareUpdate object
    pub async fn software_update(&self, node_id: &NodeId) -> Option<Arc<SoftwareUpdate>> {
        self.bindings.read().await.updates.get(node_id).cloned()
    }

    /// Write a snapshot of condition fields onto a condition node
    ///
    /// # Errors
    /// Returns `DiError::BadArgument` if the node is not a condition and
    /// `DiError::Model` if its type lacks one of the fields
    pub async fn write_condition(&self, condition_id: &NodeId, fields: &ConditionFields) -> DiResult<()> {
        self.check_condition(condition_id).await?;
        for (path, value) in fields.field_values() {
            let field = self.condition_field(condition_id, path).await?;
            self.address_space.write_value(&field.node_id, value).await?;
        }
        log::debug!(
            "Updated condition {} (severity {}, active {})",
            condition_id,
            fields.severity,
            fields.active
        );
        Ok(())
    }

    /// Read the fields of a condition node
    pub async fn read_condition(&self, condition_id: &NodeId) -> DiResult<ConditionFields> {
        self.check_condition(condition_id).await?;
        let mut values = Vec::with_capacity(alarm::FIELD_PATHS.len());
        for path in alarm::FIELD_PATHS {
            let field = self.condition_field(condition_id, path).await?;
            values.push((path, self.address_space.read_value(&field.node_id).await?));
        }
        ConditionFields::from_values(&values)
    }

    async fn caller(&self, session: SessionId) -> DiResult<CallerIdentity> {
        self.sessions
            .read()
            .await
            .get(&session)
            .cloned()
            .ok_or_else(|| DiError::NotFound(format!("{}", session)))
    }

    /// Fail if `node_id` or one of its ancestors is locked by another client
    async fn check_access(&self, caller: &CallerIdentity, node_id: &NodeId) -> DiResult<()> {
        let mut current = Some(node_id.clone());
        while let Some(id) = current {
            let service = self.bindings.read().await.locks.get(&id).cloned();
            if let Some(service) = service {
                let state = service.state().await;
                if state.locked && state.locking_client != caller.client_id {
                    log::debug!(
                        "Denied {} access to {}: locked by {}",
                        caller.client_id,
                        node_id,
                        state.locking_client
                    );
                    return Err(DiError::AccessDenied(format!(
                        "{} is locked by {}",
                        id, state.locking_client
                    )));
                }
            }
            current = self.address_space.node(&id).await.and_then(|n| n.parent);
        }
        Ok(())
    }

    async fn check_condition(&self, condition_id: &NodeId) -> DiResult<()> {
        let node = self
            .address_space
            .node(condition_id)
            .await
            .ok_or_else(|| DiError::NotFound(format!("Node {}", condition_id)))?;
        let is_condition = node
            .type_definition
            .as_ref()
            .is_some_and(|t| self.registry.is_subtype_of(t, &well_known::condition_type()));
        if !is_condition {
            return Err(DiError::BadArgument(format!("{} is not a condition", node.browse_name)));
        }
        Ok(())
    }

    async fn condition_field(&self, condition_id: &NodeId, path: FieldPath) -> DiResult<Node> {
        let names: Vec<QualifiedName> = path.iter().map(|name| QualifiedName::new(0, *name)).collect();
        self.address_space
            .resolve_path(condition_id, &names)
            .await?
            .ok_or_else(|| DiError::Model(format!("Condition {} has no field {}", condition_id, path.join("/"))))
    }

    /// Bind behavior to every LockingServices and SoftwareUpdate object
    /// at or below `root`; already bound objects are skipped
    async fn bind_subtree(&self, root: &Node) -> DiResult<()> {
        let _binding = self.binding.lock().await;
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if let Some(type_id) = &node.type_definition {
                if self.registry.is_subtype_of(type_id, &self.locking_services_type) {
                    self.bind_lock(&node).await?;
                } else if self.registry.is_subtype_of(type_id, &self.software_update_type) {
                    self.bind_update(&node).await?;
                }
            }
            stack.extend(self.address_space.get_children(&node.node_id).await?);
        }
        Ok(())
    }

    async fn bind_lock(&self, lock_node: &Node) -> DiResult<()> {
        if self.bindings.read().await.lock_objects.contains_key(&lock_node.node_id) {
            return Ok(());
        }
        let element = lock_node
            .parent
            .clone()
            .ok_or_else(|| DiError::Model(format!("{} has no parent to lock", lock_node.browse_name)))?;
        let service = Arc::new(LockingService::new(element.to_string(), self.config.lock_lease()));

        let mut methods = Vec::new();
        let mut live_values = Vec::new();
        for child in self.address_space.get_children(&lock_node.node_id).await? {
            let name = child.browse_name.name.as_str();
            if child.is_method() {
                if let Some(operation) = LockOperation::ALL.into_iter().find(|op| op.browse_name() == name) {
                    self.dispatcher
                        .register(
                            child.node_id.clone(),
                            Arc::new(LockMethodHandler::new(Arc::clone(&service), operation)),
                        )
                        .await;
                    methods.push(child.node_id);
                }
            } else if let Some(field) = LockField::from_browse_name(name) {
                live_values.push((
                    child.node_id,
                    LiveValue::Lock {
                        service: Arc::clone(&service),
                        field,
                    },
                ));
            }
        }

        let mut bindings = self.bindings.write().await;
        bindings.lock_methods.extend(methods);
        bindings.live_values.extend(live_values);
        bindings.lock_objects.insert(lock_node.node_id.clone(), element.clone());
        bindings.locks.insert(element.clone(), service);
        log::info!("Bound lock service of {}", element);
        Ok(())
    }

    async fn bind_update(&self, update_node: &Node) -> DiResult<()> {
        if self.bindings.read().await.updates.contains_key(&update_node.node_id) {
            return Ok(());
        }
        let update = Arc::new(SoftwareUpdate::new(self.config.confirmation_timeout()));
        let mut live_values = Vec::new();

        for machine in UPDATE_MACHINES {
            let Some(machine_node) = self
                .address_space
                .find_child(&update_node.node_id, &self.di_name(machine), true)
                .await?
            else {
                continue;
            };

            for operation in UpdateOperation::ALL.into_iter().filter(|op| op.machine() == machine) {
                let method = self
                    .address_space
                    .find_child(&machine_node.node_id, &self.di_name(operation.browse_name()), true)
                    .await?;
                if let Some(method) = method {
                    self.dispatcher
                        .register(
                            method.node_id,
                            Arc::new(UpdateMethodHandler::new(Arc::clone(&update), operation)),
                        )
                        .await;
                }
            }
            self.address_space
                .find_child(&machine_node.node_id, &self.di_name(names::PERCENT_COMPLETE), true)
                .await?;

            for child in self.address_space.get_children(&machine_node.node_id).await? {
                let name = child.browse_name.name.as_str();
                if let Some(field) = MachineField::from_browse_name(name) {
                    live_values.push((
                        child.node_id,
                        LiveValue::UpdateMachine {
                            update: Arc::clone(&update),
                            machine,
                            field,
                        },
                    ));
                } else if name == names::CONFIRMATION_TIMEOUT {
                    let timeout_ms = update.confirmation.confirmation_timeout().as_secs_f64() * 1000.0;
                    self.address_space
                        .write_value(&child.node_id, Variant::Double(timeout_ms))
                        .await?;
                }
            }
        }

        let mut bindings = self.bindings.write().await;
        bindings.live_values.extend(live_values);
        bindings.updates.insert(update_node.node_id.clone(), update);
        log::info!("Bound software update machines of {}", update_node.node_id);
        Ok(())
    }
}
