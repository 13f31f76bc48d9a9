use crate::overlay::NodeKind;

#[derive(Clone, Debug)]
pub struct GraphNode {
	/// Vault path, or `#tag` for tag nodes.
	pub id: String,
	pub label: Option<String>,
	pub kind: NodeKind,
}

#[derive(Clone, Debug)]
pub struct GraphLink {
	pub source: String,
	pub target: String,
}

#[derive(Clone, Debug, Default)]
pub struct GraphData {
	pub nodes: Vec<GraphNode>,
	pub links: Vec<GraphLink>,
}
