//! Core types for workflow designer graphs
//!
//! A graph is a list of typed nodes plus the edges connecting them. Each
//! node carries a kind-specific data payload; the kind is fixed when the
//! node is created and is carried by the payload variant itself.
//!
//! The serialized shape is the persistence unit handed to the host:
//!
//! ```text
//! { "nodes": [{ "id", "type", "position": { "x", "y" }, "data" }],
//!   "edges": [{ "id", "source", "target", "sourceHandle"?, "type", "animated", "style" }] }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::conditions::ConditionRule;
use crate::error::{DesignerError, Result};
use crate::schema::FormField;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Name of a node output handle
pub type HandleId = String;

/// Identifier of an external record (form, role)
///
/// Backing stores hand out either numeric or textual keys, so both are
/// accepted and written back in the shape they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Canvas position of a node (display only)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The kind of a workflow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Start,
    End,
    AssignTask,
    FillForm,
    Condition,
    ChangeStatus,
    Decision,
    Process,
}

impl NodeKind {
    /// Every node kind, in palette order
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::AssignTask,
        NodeKind::FillForm,
        NodeKind::Condition,
        NodeKind::ChangeStatus,
        NodeKind::Decision,
        NodeKind::Process,
    ];

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::AssignTask => "assign-task",
            NodeKind::FillForm => "fill-form",
            NodeKind::Condition => "condition",
            NodeKind::ChangeStatus => "change-status",
            NodeKind::Decision => "decision",
            NodeKind::Process => "process",
        }
    }

    /// Whether nodes of this kind have one output handle per branch
    ///
    /// All other kinds allow a single outgoing edge.
    pub fn is_branching(&self) -> bool {
        matches!(self, NodeKind::Condition | NodeKind::Decision)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown node kind name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNodeKind(pub String);

impl fmt::Display for UnknownNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown node kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownNodeKind {}

impl FromStr for NodeKind {
    type Err = UnknownNodeKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownNodeKind(s.to_string()))
    }
}

/// Reference to a role that tasks can be assigned to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: RecordId,
    pub name: String,
}

/// Reference to a form, optionally with a snapshot of its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRef {
    pub id: RecordId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FormField>>,
}

impl FormRef {
    /// Create a form reference without a field snapshot
    pub fn new(id: impl Into<RecordId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            fields: None,
        }
    }

    /// Attach a field snapshot
    pub fn with_fields(mut self, fields: Vec<FormField>) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Data for start, end and process nodes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BasicData {
    pub label: String,
    pub description: String,
    /// Keys this crate does not interpret, kept for the round trip
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Data for an assign-task node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssignTaskData {
    pub label: String,
    pub description: String,
    pub role: Option<RoleRef>,
    pub form: Option<FormRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Data for a fill-form node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FillFormData {
    pub label: String,
    pub description: String,
    pub form: Option<FormRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Data for a change-status node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangeStatusData {
    pub label: String,
    pub description: String,
    pub status_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_value: Option<String>,
    pub status_color: String,
    pub assign_to_role: Option<RoleRef>,
    pub should_reassign: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChangeStatusData {
    /// Machine value of the status, falling back to the label
    pub fn effective_status_value(&self) -> &str {
        match self.status_value.as_deref() {
            Some(value) if !value.is_empty() => value,
            _ => &self.status_label,
        }
    }
}

/// Data for a condition node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionData {
    pub label: String,
    pub description: String,
    pub selected_form_id: Option<RecordId>,
    pub selected_form: Option<FormRef>,
    pub condition_rules: Vec<ConditionRule>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Data for a decision node (legacy branching node)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecisionData {
    pub label: String,
    pub description: String,
    /// Branch labels; each one is an output handle
    pub conditions: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Kind-specific node payload
///
/// The variant determines the node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Start(BasicData),
    End(BasicData),
    AssignTask(AssignTaskData),
    FillForm(FillFormData),
    Condition(ConditionData),
    ChangeStatus(ChangeStatusData),
    Decision(DecisionData),
    Process(BasicData),
}

impl NodeData {
    /// The node kind this payload belongs to
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Start(_) => NodeKind::Start,
            NodeData::End(_) => NodeKind::End,
            NodeData::AssignTask(_) => NodeKind::AssignTask,
            NodeData::FillForm(_) => NodeKind::FillForm,
            NodeData::Condition(_) => NodeKind::Condition,
            NodeData::ChangeStatus(_) => NodeKind::ChangeStatus,
            NodeData::Decision(_) => NodeKind::Decision,
            NodeData::Process(_) => NodeKind::Process,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            NodeData::Start(d) | NodeData::End(d) | NodeData::Process(d) => &d.label,
            NodeData::AssignTask(d) => &d.label,
            NodeData::FillForm(d) => &d.label,
            NodeData::Condition(d) => &d.label,
            NodeData::ChangeStatus(d) => &d.label,
            NodeData::Decision(d) => &d.label,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            NodeData::Start(d) | NodeData::End(d) | NodeData::Process(d) => &d.description,
            NodeData::AssignTask(d) => &d.description,
            NodeData::FillForm(d) => &d.description,
            NodeData::Condition(d) => &d.description,
            NodeData::ChangeStatus(d) => &d.description,
            NodeData::Decision(d) => &d.description,
        }
    }

    /// Decode a payload of the given kind from its JSON data bag
    ///
    /// `null` is treated as an empty bag, so every field takes its default.
    pub fn from_value(kind: NodeKind, value: serde_json::Value) -> Result<Self> {
        let value = if value.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            value
        };
        let data = match kind {
            NodeKind::Start => NodeData::Start(serde_json::from_value(value)?),
            NodeKind::End => NodeData::End(serde_json::from_value(value)?),
            NodeKind::AssignTask => NodeData::AssignTask(serde_json::from_value(value)?),
            NodeKind::FillForm => NodeData::FillForm(serde_json::from_value(value)?),
            NodeKind::Condition => NodeData::Condition(serde_json::from_value(value)?),
            NodeKind::ChangeStatus => NodeData::ChangeStatus(serde_json::from_value(value)?),
            NodeKind::Decision => NodeData::Decision(serde_json::from_value(value)?),
            NodeKind::Process => NodeData::Process(serde_json::from_value(value)?),
        };
        Ok(data)
    }

    /// Encode the payload as its JSON data bag
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Shallow-merge a JSON object into the payload
    ///
    /// Keys in `patch` replace the matching top-level keys of the data bag.
    /// The kind never changes; a patch whose values do not fit the kind's
    /// fields is an error and leaves `self` untouched.
    pub fn merge_patch(&mut self, node_id: &str, patch: serde_json::Value) -> Result<bool> {
        let serde_json::Value::Object(patch) = patch else {
            return Err(DesignerError::invalid_patch(node_id, "patch must be a JSON object"));
        };

        let mut bag = match self.to_value()? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in patch {
            bag.insert(key, value);
        }

        let merged = NodeData::from_value(self.kind(), serde_json::Value::Object(bag))
            .map_err(|e| DesignerError::invalid_patch(node_id, e.to_string()))?;
        if merged == *self {
            return Ok(false);
        }
        *self = merged;
        Ok(true)
    }
}

impl Serialize for NodeData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NodeData::Start(d) | NodeData::End(d) | NodeData::Process(d) => d.serialize(serializer),
            NodeData::AssignTask(d) => d.serialize(serializer),
            NodeData::FillForm(d) => d.serialize(serializer),
            NodeData::Condition(d) => d.serialize(serializer),
            NodeData::ChangeStatus(d) => d.serialize(serializer),
            NodeData::Decision(d) => d.serialize(serializer),
        }
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawNode")]
pub struct Node {
    /// Unique identifier for this node
    pub id: NodeId,
    /// Position in the editor canvas
    pub position: Position,
    data: NodeData,
    /// Top-level keys owned by the canvas (size, selection state, ...)
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, data: NodeData, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            data,
            extra: serde_json::Map::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Mutable access to the payload
    ///
    /// Kept crate-private so the kind cannot be swapped from outside;
    /// [`crate::editor::GraphEditor`] guards the kind on every write.
    pub(crate) fn data_mut(&mut self) -> &mut NodeData {
        &mut self.data
    }

    pub fn as_condition(&self) -> Option<&ConditionData> {
        match &self.data {
            NodeData::Condition(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_fill_form(&self) -> Option<&FillFormData> {
        match &self.data {
            NodeData::FillForm(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_decision(&self) -> Option<&DecisionData> {
        match &self.data {
            NodeData::Decision(d) => Some(d),
            _ => None,
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4 + self.extra.len()))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", &self.kind())?;
        map.serialize_entry("position", &self.position)?;
        map.serialize_entry("data", &self.data)?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Wire form of a node before its data bag is decoded against its kind
#[derive(Deserialize)]
struct RawNode {
    id: NodeId,
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    position: Position,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl TryFrom<RawNode> for Node {
    type Error = DesignerError;

    fn try_from(raw: RawNode) -> Result<Self> {
        let data = NodeData::from_value(raw.kind, raw.data)?;
        let mut node = Node::new(raw.id, data, raw.position);
        node.extra = raw.extra;
        Ok(node)
    }
}

/// Visual styling of an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: f64,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke: "#64748b".to_string(),
            stroke_width: 2.0,
        }
    }
}

fn default_edge_type() -> String {
    "smoothstep".to_string()
}

/// A directed edge between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID; `None` while the edge is detached awaiting reconnection
    pub target: Option<NodeId>,
    /// Output handle on the source node (branching kinds only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<HandleId>,
    /// Edge renderer type
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Edge {
    /// Whether the edge currently has no target
    pub fn is_detached(&self) -> bool {
        self.target.is_none()
    }

    /// Whether the edge touches the given node on either end
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target.as_deref() == Some(node_id)
    }
}

/// A complete workflow graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Nodes in the graph
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges connecting nodes
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a graph from its persisted JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode the graph into its persisted JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.target.as_deref() == Some(node_id))
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Whether a node with the given ID exists
    pub fn contains_node(&self, id: &str) -> bool {
        self.find_node(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Operator;
    use crate::schema::FieldType;

    #[test]
    fn test_node_kind_wire_names() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("merge".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_node_serialized_shape() {
        let node = Node::new(
            "fill-1",
            NodeData::FillForm(FillFormData {
                label: "Fill Form".to_string(),
                description: String::new(),
                form: Some(FormRef::new(7, "Leave Request")),
                ..Default::default()
            }),
            Position::new(10.0, 20.0),
        );

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "fill-form");
        assert_eq!(json["position"]["x"], 10.0);
        assert_eq!(json["data"]["form"]["id"], 7);
        assert_eq!(json["data"]["form"]["title"], "Leave Request");
        assert!(json["data"]["form"].get("fields").is_none());
    }

    #[test]
    fn test_node_data_defaults_on_partial_bag() {
        let json = r#"{"id":"c1","type":"condition","position":{"x":0,"y":0},"data":{"label":"Check"}}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        let data = node.as_condition().unwrap();
        assert_eq!(data.label, "Check");
        assert!(data.selected_form_id.is_none());
        assert!(data.condition_rules.is_empty());
    }

    #[test]
    fn test_unknown_kind_rejected_on_load() {
        let json = r#"{"nodes":[{"id":"x","type":"teleport","data":{}}],"edges":[]}"#;
        assert!(WorkflowGraph::from_json(json).is_err());
    }

    #[test]
    fn test_merge_patch_is_shallow_and_keeps_kind() {
        let mut data = NodeData::ChangeStatus(ChangeStatusData {
            label: "Change Status".to_string(),
            status_label: "Approved".to_string(),
            status_color: "#22c55e".to_string(),
            ..Default::default()
        });

        let changed = data
            .merge_patch("s1", serde_json::json!({"statusValue": "approved", "shouldReassign": true}))
            .unwrap();
        assert!(changed);
        assert_eq!(data.kind(), NodeKind::ChangeStatus);
        let NodeData::ChangeStatus(status) = &data else {
            panic!("kind changed");
        };
        assert_eq!(status.status_label, "Approved");
        assert_eq!(status.effective_status_value(), "approved");
        assert!(status.should_reassign);
    }

    #[test]
    fn test_merge_patch_rejects_mistyped_values() {
        let mut data = NodeData::Decision(DecisionData::default());
        let before = data.clone();
        assert!(data
            .merge_patch("d1", serde_json::json!({"conditions": "yes"}))
            .is_err());
        assert!(data.merge_patch("d1", serde_json::json!(["not", "an", "object"])).is_err());
        assert_eq!(data, before);
    }

    #[test]
    fn test_status_value_falls_back_to_label() {
        let status = ChangeStatusData {
            status_label: "In Review".to_string(),
            status_value: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(status.effective_status_value(), "In Review");
    }

    #[test]
    fn test_graph_round_trip_every_kind() {
        let rule = ConditionRule {
            field_id: "3".to_string(),
            field_label: "Days".to_string(),
            field_type: FieldType::Number,
            operator: Operator::GreaterThan,
            value: "10".to_string(),
        };
        let nodes = vec![
            Node::new("s", NodeData::Start(BasicData::default()), Position::new(0.0, 0.0)),
            Node::new(
                "a",
                NodeData::AssignTask(AssignTaskData {
                    role: Some(RoleRef { id: RecordId::from("r-1"), name: "Manager".to_string() }),
                    ..Default::default()
                }),
                Position::new(0.5, 100.25),
            ),
            Node::new("f", NodeData::FillForm(FillFormData::default()), Position::new(1.0, 2.0)),
            Node::new(
                "c",
                NodeData::Condition(ConditionData {
                    selected_form_id: Some(RecordId::Number(7)),
                    selected_form: Some(FormRef::new(7, "Leave Request")),
                    condition_rules: vec![rule],
                    ..Default::default()
                }),
                Position::new(3.0, 4.0),
            ),
            Node::new("cs", NodeData::ChangeStatus(ChangeStatusData::default()), Position::default()),
            Node::new(
                "d",
                NodeData::Decision(DecisionData {
                    conditions: vec!["Yes".to_string(), "No".to_string()],
                    ..Default::default()
                }),
                Position::default(),
            ),
            Node::new("p", NodeData::Process(BasicData::default()), Position::default()),
            Node::new("e", NodeData::End(BasicData::default()), Position::default()),
        ];
        let edges = vec![
            Edge {
                id: "e1".to_string(),
                source: "s".to_string(),
                target: Some("a".to_string()),
                source_handle: None,
                edge_type: default_edge_type(),
                animated: true,
                style: EdgeStyle::default(),
                extra: Default::default(),
            },
            Edge {
                id: "e2".to_string(),
                source: "d".to_string(),
                target: None,
                source_handle: Some("Yes".to_string()),
                edge_type: default_edge_type(),
                animated: false,
                style: EdgeStyle::default(),
                extra: Default::default(),
            },
        ];
        let graph = WorkflowGraph { nodes, edges };

        let first = graph.to_json().unwrap();
        let reloaded = WorkflowGraph::from_json(&first).unwrap();
        assert_eq!(reloaded, graph);
        assert_eq!(reloaded.to_json().unwrap(), first);
    }

    #[test]
    fn test_unrecognised_names_and_keys_survive_reload() {
        let stored = serde_json::json!({
            "nodes": [
                {
                    "id": "c",
                    "type": "condition",
                    "position": {"x": 10.5, "y": 20.5},
                    "data": {
                        "label": "Check",
                        "description": "",
                        "selectedFormId": 7,
                        "selectedForm": {"id": 7, "title": "Leave Request"},
                        "conditionRules": [{
                            "fieldId": "3",
                            "fieldLabel": "Phone",
                            "fieldType": "phone",
                            "operator": "matches",
                            "value": "^0"
                        }],
                        "color": "red"
                    },
                    "width": 180.5
                },
                {
                    "id": "e",
                    "type": "end",
                    "position": {"x": 10.5, "y": 200.5},
                    "data": {"label": "End", "description": "", "icon": {"name": "flag"}}
                }
            ],
            "edges": [{
                "id": "e1",
                "source": "c",
                "target": "e",
                "sourceHandle": "rule-0",
                "type": "smoothstep",
                "animated": true,
                "style": {"stroke": "#64748b", "strokeWidth": 2.5},
                "label": "phone starts with 0"
            }]
        });

        let graph: WorkflowGraph = serde_json::from_value(stored.clone()).unwrap();
        let rule = &graph.find_node("c").unwrap().as_condition().unwrap().condition_rules[0];
        assert_eq!(rule.operator, Operator::Other("matches".to_string()));
        assert!(rule.is_valid());
        assert!(crate::validation::validate_structure(&graph).is_empty());

        assert_eq!(serde_json::to_value(&graph).unwrap(), stored);
    }

    #[test]
    fn test_graph_edges() {
        let mut graph = WorkflowGraph::new();
        graph.nodes.push(Node::new("n1", NodeData::Start(BasicData::default()), Position::default()));
        graph.nodes.push(Node::new("n2", NodeData::End(BasicData::default()), Position::default()));
        graph.edges.push(Edge {
            id: "edge1".to_string(),
            source: "n1".to_string(),
            target: Some("n2".to_string()),
            source_handle: None,
            edge_type: default_edge_type(),
            animated: true,
            style: EdgeStyle::default(),
            extra: Default::default(),
        });

        assert_eq!(graph.incoming_edges("n2").count(), 1);
        assert_eq!(graph.outgoing_edges("n1").count(), 1);
        assert!(graph.edges[0].touches("n2"));
        assert!(!graph.edges[0].is_detached());
    }
}
