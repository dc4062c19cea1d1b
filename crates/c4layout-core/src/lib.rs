use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub mod error;
pub mod geometry;

pub use error::LayoutError;
pub use geometry::{Rect, Vec2};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum NodeKind {
    // Actors
    PERSON,
    EXTERNAL_PERSON,

    // Structural C4 elements
    SOFTWARE_SYSTEM,
    EXTERNAL_SYSTEM,
    CONTAINER,
    EXTERNAL_CONTAINER,
    COMPONENT,
    EXTERNAL_COMPONENT,

    // Data
    DATABASE,
    QUEUE,
    TOPIC,
    CACHE,
    FILE_SYSTEM,

    // Specialised roles
    REPOSITORY,
    CONTROLLER,
    GATEWAY,
    BFF,
    API,
    WEB_APP,
    MOBILE_APP,
    SERVICE,

    // Grouping
    BOUNDARY,

    UNKNOWN,
}

impl NodeKind {
    pub fn is_external(self) -> bool {
        matches!(
            self,
            NodeKind::EXTERNAL_PERSON
                | NodeKind::EXTERNAL_SYSTEM
                | NodeKind::EXTERNAL_CONTAINER
                | NodeKind::EXTERNAL_COMPONENT
        )
    }

    pub fn is_person(self) -> bool {
        matches!(self, NodeKind::PERSON | NodeKind::EXTERNAL_PERSON)
    }

    pub fn is_data_store(self) -> bool {
        matches!(
            self,
            NodeKind::DATABASE
                | NodeKind::QUEUE
                | NodeKind::TOPIC
                | NodeKind::CACHE
                | NodeKind::FILE_SYSTEM
        )
    }

    /// Lower-case name used when matching kinds lexically.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::PERSON => "person",
            NodeKind::EXTERNAL_PERSON => "external_person",
            NodeKind::SOFTWARE_SYSTEM => "software_system",
            NodeKind::EXTERNAL_SYSTEM => "external_system",
            NodeKind::CONTAINER => "container",
            NodeKind::EXTERNAL_CONTAINER => "external_container",
            NodeKind::COMPONENT => "component",
            NodeKind::EXTERNAL_COMPONENT => "external_component",
            NodeKind::DATABASE => "database",
            NodeKind::QUEUE => "queue",
            NodeKind::TOPIC => "topic",
            NodeKind::CACHE => "cache",
            NodeKind::FILE_SYSTEM => "file_system",
            NodeKind::REPOSITORY => "repository",
            NodeKind::CONTROLLER => "controller",
            NodeKind::GATEWAY => "gateway",
            NodeKind::BFF => "bff",
            NodeKind::API => "api",
            NodeKind::WEB_APP => "web_app",
            NodeKind::MOBILE_APP => "mobile_app",
            NodeKind::SERVICE => "service",
            NodeKind::BOUNDARY => "boundary",
            NodeKind::UNKNOWN => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[allow(non_camel_case_types)]
pub enum RelationshipKind {
    #[default]
    USES,
    CALLS,
    READS,
    WRITES,
    PUBLISHES,
    SUBSCRIBES,
    DEPENDS_ON,
    UNKNOWN,
}

/// Preferred geometry for a relationship's connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RouteKind {
    Direct,
    #[default]
    Orthogonal,
    Curved,
}

/// C4 abstraction level a view is rendered at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ViewLevel {
    /// Low-level overview of every system in the landscape.
    Landscape,
    #[default]
    Context,
    Container,
    Component,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct C4Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub level: ViewLevel,
    pub label: String,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Explicit top-left position requested by the caller.
    #[serde(default)]
    pub position: Option<Vec2>,
    /// Explicit size requested by the caller; still clamped by kind constraints.
    #[serde(default)]
    pub size: Option<Vec2>,
    #[serde(default)]
    pub collapsed: bool,
    /// Higher values are placed earlier within their layer.
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl C4Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            kind,
            level: ViewLevel::default(),
            label: label.into(),
            technology: None,
            description: None,
            parent: None,
            position: None,
            size: None,
            collapsed: false,
            priority: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(NodeId::new(parent));
        self
    }

    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_level(mut self, level: ViewLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Vec2::new(x, y));
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Some(Vec2::new(width, height));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.collapsed = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct C4Relationship {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: RelationshipKind,
    #[serde(default)]
    pub preferred_route: Option<RouteKind>,
}

impl C4Relationship {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: EdgeId::new(id),
            from: NodeId::new(from),
            to: NodeId::new(to),
            label: String::new(),
            kind: RelationshipKind::default(),
            preferred_route: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_kind(mut self, kind: RelationshipKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_route(mut self, route: RouteKind) -> Self {
        self.preferred_route = Some(route);
        self
    }
}

/// Abstract architecture graph handed to the layout engine.
///
/// Nodes are keyed by id in an ordered map so that every traversal is
/// deterministic; relationships keep their insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct C4Graph {
    pub nodes: BTreeMap<NodeId, C4Node>,
    pub relationships: Vec<C4Relationship>,
}

impl C4Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any node with the same id.
    pub fn add_node(&mut self, node: C4Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_relationship(&mut self, relationship: C4Relationship) {
        self.relationships.push(relationship);
    }

    pub fn node(&self, id: &NodeId) -> Option<&C4Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reject graphs the engine cannot lay out at all.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.nodes.is_empty() {
            return Err(LayoutError::EmptyGraph);
        }

        for node in self.nodes.values() {
            for (field, hint) in [("position", node.position), ("size", node.size)] {
                if hint.is_some_and(|v| !v.is_finite()) {
                    return Err(LayoutError::NonFiniteGeometry {
                        node: node.id.clone(),
                        field,
                    });
                }
            }
        }

        for relationship in &self.relationships {
            for endpoint in [&relationship.from, &relationship.to] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(LayoutError::DanglingRelationship {
                        relationship: relationship.id.clone(),
                        endpoint: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Caller-owned view state supplied with every layout request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewState {
    pub level: ViewLevel,
    #[serde(default)]
    pub expanded: BTreeSet<NodeId>,
    #[serde(default)]
    pub hidden: BTreeSet<NodeId>,
    #[serde(default = "ViewState::default_grid_size")]
    pub grid_size: f32,
    #[serde(default)]
    pub snap_to_grid: bool,
}

impl ViewState {
    pub const DEFAULT_GRID_SIZE: f32 = 10.0;

    fn default_grid_size() -> f32 {
        Self::DEFAULT_GRID_SIZE
    }

    pub fn new(level: ViewLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn is_hidden(&self, id: &NodeId) -> bool {
        self.hidden.contains(id)
    }

    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded.contains(id)
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            level: ViewLevel::default(),
            expanded: BTreeSet::new(),
            hidden: BTreeSet::new(),
            grid_size: Self::DEFAULT_GRID_SIZE,
            snap_to_grid: false,
        }
    }
}
