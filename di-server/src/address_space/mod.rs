//! Address space tree
//!
//! Owns every node of the server. Children are looked up by browse name; an
//! optional child declared by the parent's type can be created on demand.
//! Structural changes and value writes are published on a broadcast channel.

pub mod node;

pub use node::{Node, NodeChange};

use di_core::{DataType, DiError, DiResult, NodeId, QualifiedName, ValueRank, Variant};
use di_model::{ChildSlot, NodeClass, TypeRegistry, well_known};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast};

/// Deepest chain of mandatory children created for one instance
const MAX_INSTANCE_DEPTH: usize = 32;

#[derive(Debug, Default)]
struct Tree {
    nodes: HashMap<NodeId, Node>,
    /// Child ids per parent, in insertion order
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl Tree {
    fn child_by_name(&self, parent: &NodeId, browse_name: &QualifiedName) -> Option<&Node> {
        self.children
            .get(parent)?
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|n| &n.browse_name == browse_name)
    }

    fn insert(&mut self, node: Node) {
        if let Some(parent) = &node.parent {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(node.node_id.clone());
        }
        self.nodes.insert(node.node_id.clone(), node);
    }
}

/// Node registry of one server
pub struct AddressSpace {
    registry: Arc<TypeRegistry>,
    /// Namespace in which instance node ids are allocated
    namespace_index: u16,
    next_id: AtomicU32,
    tree: RwLock<Tree>,
    /// One guard per parent serializes creation of its children
    creation_guards: RwLock<HashMap<NodeId, Arc<Mutex<()>>>>,
    changes: broadcast::Sender<NodeChange>,
}

impl AddressSpace {
    /// Create an address space holding only the Objects folder
    ///
    /// # Arguments
    /// * `registry` - Types instances are created from
    /// * `namespace_index` - Namespace of allocated instance ids
    /// * `change_capacity` - Buffer size of the change channel
    pub fn new(registry: Arc<TypeRegistry>, namespace_index: u16, change_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(change_capacity.max(1));
        let mut tree = Tree::default();
        tree.insert(
            Node::object(QualifiedName::new(0, "Objects"), well_known::folder_type())
                .with_node_id(well_known::objects_folder()),
        );
        Self {
            registry,
            namespace_index,
            next_id: AtomicU32::new(1),
            tree: RwLock::new(tree),
            creation_guards: RwLock::new(HashMap::new()),
            changes,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn namespace_index(&self) -> u16 {
        self.namespace_index
    }

    /// Root folder every instance hangs below
    pub fn objects_folder(&self) -> NodeId {
        well_known::objects_folder()
    }

    /// Subscribe to structural and value changes
    pub fn subscribe(&self) -> broadcast::Receiver<NodeChange> {
        self.changes.subscribe()
    }

    pub async fn len(&self) -> usize {
        self.tree.read().await.nodes.len()
    }

    pub async fn node(&self, node_id: &NodeId) -> Option<Node> {
        self.tree.read().await.nodes.get(node_id).cloned()
    }

    /// Create an instance of `type_id` with all its mandatory children
    ///
    /// # Errors
    /// Returns `DiError::NotFound` for an unknown parent or type and
    /// `DiError::BadArgument` for an abstract type or a browse name already
    /// used under `parent`
    pub async fn instantiate(
        &self,
        type_id: &NodeId,
        browse_name: QualifiedName,
        parent: &NodeId,
    ) -> DiResult<Node> {
        let guard = self.creation_guard(parent).await;
        let _creating = guard.lock().await;

        self.check_new_child(parent, &browse_name).await?;
        let mut nodes = Vec::new();
        self.build_instance(type_id, &browse_name, parent, None, 0, &mut nodes)?;
        let root = nodes
            .first()
            .cloned()
            .ok_or_else(|| DiError::Model(format!("Type {} produced no node", type_id)))?;
        let count = nodes.len();
        self.attach(nodes).await?;

        log::info!(
            "Instantiated {} ({}) under {} with {} nodes",
            root.browse_name,
            root.node_id,
            parent,
            count
        );
        Ok(root)
    }

    /// Look up a child by browse name, optionally creating it
    ///
    /// A missing child is only created if the parent's type declares a
    /// non-placeholder slot with that browse name. A miss yields `Ok(None)`.
    ///
    /// # Errors
    /// Returns `DiError::NotFound` if `parent` does not exist
    pub async fn find_child(
        &self,
        parent: &NodeId,
        browse_name: &QualifiedName,
        create_if_missing: bool,
    ) -> DiResult<Option<Node>> {
        let parent_type = {
            let tree = self.tree.read().await;
            let parent_node = tree
                .nodes
                .get(parent)
                .ok_or_else(|| DiError::NotFound(format!("Node {}", parent)))?;
            if let Some(child) = tree.child_by_name(parent, browse_name) {
                return Ok(Some(child.clone()));
            }
            if !create_if_missing {
                return Ok(None);
            }
            parent_node.type_definition.clone()
        };

        let Some(parent_type) = parent_type else {
            return Ok(None);
        };
        let Some(slot) = self.registry.declared_slot(&parent_type, browse_name) else {
            return Ok(None);
        };
        if slot.modelling_rule.is_placeholder() {
            return Ok(None);
        }

        let guard = self.creation_guard(parent).await;
        let _creating = guard.lock().await;

        let existing = self
            .tree
            .read()
            .await
            .child_by_name(parent, browse_name)
            .cloned();
        if existing.is_some() {
            return Ok(existing);
        }

        let mut nodes = Vec::new();
        self.build_slot(slot, parent, 0, &mut nodes)?;
        let created = nodes.first().cloned();
        self.attach(nodes).await?;

        if let Some(node) = &created {
            log::debug!("Created {} ({}) under {}", node.browse_name, node.node_id, parent);
        }
        Ok(created)
    }

    /// Children of `parent`
    ///
    /// Children declared by the parent's type come first, in declaration
    /// order of the most derived type and then of each base type. Children
    /// no type declares follow in insertion order.
    pub async fn get_children(&self, parent: &NodeId) -> DiResult<Vec<Node>> {
        let tree = self.tree.read().await;
        let parent_node = tree
            .nodes
            .get(parent)
            .ok_or_else(|| DiError::NotFound(format!("Node {}", parent)))?;

        let mut remaining: Vec<&Node> = tree
            .children
            .get(parent)
            .map(|ids| ids.iter().filter_map(|id| tree.nodes.get(id)).collect())
            .unwrap_or_default();
        let mut ordered = Vec::with_capacity(remaining.len());

        if let Some(type_id) = &parent_node.type_definition {
            for slot in self.registry.slots_in_order(type_id) {
                if let Some(pos) = remaining.iter().position(|n| n.browse_name == slot.browse_name) {
                    ordered.push(remaining.remove(pos).clone());
                }
            }
        }
        ordered.extend(remaining.into_iter().cloned());
        Ok(ordered)
    }

    /// Follow a chain of browse names from `start` without creating anything
    pub async fn resolve_path(&self, start: &NodeId, path: &[QualifiedName]) -> DiResult<Option<Node>> {
        let tree = self.tree.read().await;
        let mut current = tree
            .nodes
            .get(start)
            .ok_or_else(|| DiError::NotFound(format!("Node {}", start)))?;
        for browse_name in path {
            match tree.child_by_name(&current.node_id, browse_name) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current.clone()))
    }

    /// Attach a node built by the caller
    ///
    /// A null node id is replaced by a freshly allocated one.
    ///
    /// # Errors
    /// Returns `DiError::NotFound` for an unknown parent and
    /// `DiError::BadArgument` for a type node, a duplicate id or browse name,
    /// or a variable value that does not match its data type
    pub async fn add_child(&self, parent: &NodeId, mut node: Node) -> DiResult<Node> {
        if node.node_class.is_type() {
            return Err(DiError::BadArgument(format!(
                "{} is a {}, types are not part of the instance tree",
                node.browse_name, node.node_class
            )));
        }
        if let (Some(data_type), Some(value)) = (&node.data_type, &node.value) {
            if !self.registry.accepts_value(data_type, node.value_rank, value) {
                return Err(DiError::BadArgument(format!(
                    "Value of {} does not match data type {}",
                    node.browse_name, data_type
                )));
            }
        }

        let guard = self.creation_guard(parent).await;
        let _creating = guard.lock().await;

        self.check_new_child(parent, &node.browse_name).await?;
        if node.node_id.is_null() {
            node.node_id = self.allocate_id();
        } else if self.tree.read().await.nodes.contains_key(&node.node_id) {
            return Err(DiError::BadArgument(format!(
                "Node {} already exists",
                node.node_id
            )));
        }
        node.parent = Some(parent.clone());

        let added = node.clone();
        self.attach(vec![node]).await?;
        log::debug!("Added {} ({}) under {}", added.browse_name, added.node_id, parent);
        Ok(added)
    }

    /// Remove a node and everything below it
    ///
    /// Returns the ids of all removed nodes.
    ///
    /// # Errors
    /// Returns `DiError::NotFound` for an unknown node and
    /// `DiError::BadArgument` for the Objects folder
    pub async fn remove_node(&self, node_id: &NodeId) -> DiResult<Vec<NodeId>> {
        if *node_id == well_known::objects_folder() {
            return Err(DiError::BadArgument("The Objects folder cannot be removed".to_string()));
        }

        let mut removed = Vec::new();
        {
            let mut tree = self.tree.write().await;
            let parent = tree
                .nodes
                .get(node_id)
                .ok_or_else(|| DiError::NotFound(format!("Node {}", node_id)))?
                .parent
                .clone();
            if let Some(siblings) = parent.as_ref().and_then(|p| tree.children.get_mut(p)) {
                siblings.retain(|id| id != node_id);
            }

            let mut stack = vec![node_id.clone()];
            while let Some(id) = stack.pop() {
                if let Some(children) = tree.children.remove(&id) {
                    stack.extend(children);
                }
                if let Some(node) = tree.nodes.remove(&id) {
                    removed.push((node.parent, id));
                }
            }
        }

        {
            let mut guards = self.creation_guards.write().await;
            for (_, id) in &removed {
                guards.remove(id);
            }
        }

        log::info!("Removed {} and {} descendants", node_id, removed.len().saturating_sub(1));
        let mut ids = Vec::with_capacity(removed.len());
        for (parent, id) in removed {
            let _ = self.changes.send(NodeChange::NodeRemoved {
                parent,
                node_id: id.clone(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    /// Stored value of a variable
    ///
    /// # Errors
    /// Returns `DiError::NotFound` for an unknown node and
    /// `DiError::BadArgument` if the node is not a variable
    pub async fn read_value(&self, node_id: &NodeId) -> DiResult<Variant> {
        let tree = self.tree.read().await;
        let node = tree
            .nodes
            .get(node_id)
            .ok_or_else(|| DiError::NotFound(format!("Node {}", node_id)))?;
        if !node.is_variable() {
            return Err(DiError::BadArgument(format!("{} is not a variable", node.browse_name)));
        }
        Ok(node.value.clone().unwrap_or_default())
    }

    /// Write a variable value, checked against its data type and value rank
    ///
    /// # Errors
    /// Returns `DiError::NotFound` for an unknown node and
    /// `DiError::BadArgument` for a non-variable or a mismatching value
    pub async fn write_value(&self, node_id: &NodeId, value: Variant) -> DiResult<()> {
        {
            let mut tree = self.tree.write().await;
            let node = tree
                .nodes
                .get_mut(node_id)
                .ok_or_else(|| DiError::NotFound(format!("Node {}", node_id)))?;
            if !node.is_variable() {
                return Err(DiError::BadArgument(format!("{} is not a variable", node.browse_name)));
            }
            if let Some(data_type) = &node.data_type {
                if !self.registry.accepts_value(data_type, node.value_rank, &value) {
                    return Err(DiError::BadArgument(format!(
                        "{} does not accept a {:?} value",
                        node.browse_name,
                        value.get_type()
                    )));
                }
            }
            node.value = Some(value.clone());
        }
        let _ = self.changes.send(NodeChange::ValueChanged {
            node_id: node_id.clone(),
            value,
        });
        Ok(())
    }

    fn allocate_id(&self) -> NodeId {
        NodeId::numeric(self.namespace_index, self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn creation_guard(&self, parent: &NodeId) -> Arc<Mutex<()>> {
        if let Some(guard) = self.creation_guards.read().await.get(parent) {
            return Arc::clone(guard);
        }
        let mut guards = self.creation_guards.write().await;
        Arc::clone(guards.entry(parent.clone()).or_default())
    }

    async fn check_new_child(&self, parent: &NodeId, browse_name: &QualifiedName) -> DiResult<()> {
        let tree = self.tree.read().await;
        if !tree.nodes.contains_key(parent) {
            return Err(DiError::NotFound(format!("Node {}", parent)));
        }
        if tree.child_by_name(parent, browse_name).is_some() {
            return Err(DiError::BadArgument(format!(
                "{} already has a child named {}",
                parent, browse_name
            )));
        }
        Ok(())
    }

    /// Insert freshly built nodes, parents before children
    async fn attach(&self, nodes: Vec<Node>) -> DiResult<()> {
        let mut added = Vec::with_capacity(nodes.len());
        {
            let mut tree = self.tree.write().await;
            if let Some(parent) = nodes.first().and_then(|n| n.parent.as_ref()) {
                if !tree.nodes.contains_key(parent) {
                    return Err(DiError::NotFound(format!("Node {}", parent)));
                }
            }
            for node in nodes {
                added.push(NodeChange::NodeAdded {
                    parent: node.parent.clone(),
                    node_id: node.node_id.clone(),
                });
                tree.insert(node);
            }
        }
        for change in added {
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn build_instance(
        &self,
        type_id: &NodeId,
        browse_name: &QualifiedName,
        parent: &NodeId,
        slot: Option<&ChildSlot>,
        depth: usize,
        out: &mut Vec<Node>,
    ) -> DiResult<NodeId> {
        if depth > MAX_INSTANCE_DEPTH {
            return Err(DiError::Model(format!(
                "Mandatory children of {} nest deeper than {} levels",
                browse_name, MAX_INSTANCE_DEPTH
            )));
        }
        let definition = self
            .registry
            .get(type_id)
            .ok_or_else(|| DiError::NotFound(format!("Type {}", type_id)))?;
        if definition.is_abstract {
            return Err(DiError::BadArgument(format!(
                "{} is abstract and cannot be instantiated",
                definition.browse_name
            )));
        }

        let mut node = match definition.node_class.instance_class() {
            Some(NodeClass::Object) => Node::object(browse_name.clone(), type_id.clone()),
            Some(NodeClass::Variable) => {
                let data_type = slot
                    .and_then(|s| s.data_type.clone())
                    .or_else(|| self.registry.variable_type_data_type(type_id))
                    .unwrap_or_else(|| DataType::BaseDataType.node_id());
                let value_rank = slot.map(|s| s.value_rank).unwrap_or_default();
                let value = slot
                    .and_then(|s| s.default_value.clone())
                    .unwrap_or_else(|| self.initial_value(&data_type, value_rank));
                Node::variable(browse_name.clone(), type_id.clone(), data_type, value)
                    .with_value_rank(value_rank)
            }
            _ => {
                return Err(DiError::BadArgument(format!(
                    "{} is not an object or variable type",
                    definition.browse_name
                )));
            }
        };
        let node_id = self.allocate_id();
        node.node_id = node_id.clone();
        node.parent = Some(parent.clone());
        out.push(node);

        for child in self.registry.mandatory_slots(type_id) {
            self.build_slot(child, &node_id, depth + 1, out)?;
        }
        Ok(node_id)
    }

    fn build_slot(
        &self,
        slot: &ChildSlot,
        parent: &NodeId,
        depth: usize,
        out: &mut Vec<Node>,
    ) -> DiResult<NodeId> {
        if slot.node_class == NodeClass::Method {
            let node_id = self.allocate_id();
            let mut node = Node::method(slot.browse_name.clone(), slot.signature.clone().unwrap_or_default())
                .with_node_id(node_id.clone());
            node.parent = Some(parent.clone());
            out.push(node);
            return Ok(node_id);
        }
        let type_id = slot
            .type_definition
            .clone()
            .or_else(|| self.registry.default_type_definition(slot.node_class))
            .ok_or_else(|| DiError::Model(format!("Slot {} has no type definition", slot.browse_name)))?;
        self.build_instance(&type_id, &slot.browse_name, parent, Some(slot), depth, out)
    }

    fn initial_value(&self, data_type: &NodeId, value_rank: ValueRank) -> Variant {
        match value_rank {
            ValueRank::OneDimension => Variant::Array(Vec::new()),
            ValueRank::Scalar => self
                .registry
                .resolve_data_type(data_type)
                .map(DataType::default_value)
                .unwrap_or_default(),
        }
    }
}
