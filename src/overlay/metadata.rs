use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::host::NodeKind;

/// Membership of one element: category key to its values.
pub type TypeMap = BTreeMap<String, BTreeSet<String>>;

/// A way of grouping elements into values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
	/// Frontmatter and inline tags.
	Tag,
	/// Parent folder.
	Folder,
	/// Types of outgoing links.
	Link,
	/// Values of one frontmatter key.
	Property(String),
}

impl Category {
	/// Reads a settings key; anything unknown is taken as a property name.
	pub fn parse(key: &str) -> Self {
		match key {
			"tag" => Category::Tag,
			"folder" => Category::Folder,
			"link" => Category::Link,
			other => Category::Property(other.strip_prefix("property:").unwrap_or(other).to_owned()),
		}
	}

	/// Settings key, the inverse of [`parse`](Self::parse).
	pub fn key(&self) -> String {
		self.to_string()
	}

	/// Only links carry this category.
	pub fn is_link_category(&self) -> bool {
		matches!(self, Category::Link)
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Category::Tag => f.write_str("tag"),
			Category::Folder => f.write_str("folder"),
			Category::Link => f.write_str("link"),
			Category::Property(name) => write!(f, "property:{name}"),
		}
	}
}

/// File metadata lookups the overlay depends on but does not own.
pub trait MetadataSource {
	/// Tags without the leading `#`.
	fn tags(&self, path: &str) -> Vec<String>;
	/// Parent folder; `None` at the vault root.
	fn folder(&self, path: &str) -> Option<String>;
	/// Every value stored under frontmatter `key`.
	fn property(&self, path: &str, key: &str) -> Vec<String>;
	/// Types of the references `source` makes to `target`.
	fn link_types(&self, source: &str, target: &str) -> Vec<String>;
	/// Image shown on the node, if any.
	fn image(&self, _path: &str) -> Option<String> {
		None
	}
}

/// Values of `category` for a node, before the "none" sentinel is applied.
pub fn node_values(
	meta: &dyn MetadataSource,
	path: &str,
	kind: NodeKind,
	category: &Category,
) -> BTreeSet<String> {
	match (kind, category) {
		(NodeKind::Tag, Category::Tag) => {
			BTreeSet::from([path.trim_start_matches('#').to_owned()])
		}
		(NodeKind::Tag | NodeKind::Unresolved, _) => BTreeSet::new(),
		(_, Category::Tag) => meta.tags(path).into_iter().collect(),
		(_, Category::Folder) => meta.folder(path).into_iter().collect(),
		(_, Category::Property(key)) => meta.property(path, key).into_iter().collect(),
		(_, Category::Link) => BTreeSet::new(),
	}
}

/// What the vault knows about one file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMeta {
	/// Tags without the leading `#`.
	pub tags: Vec<String>,
	/// Frontmatter; every key holds a list.
	pub properties: BTreeMap<String, Vec<String>>,
	/// Image path or URL.
	pub image: Option<String>,
}

/// Metadata kept in memory, keyed by path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryVault {
	files: BTreeMap<String, FileMeta>,
}

impl InMemoryVault {
	/// An empty vault.
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the metadata of `path`.
	pub fn insert(&mut self, path: impl Into<String>, meta: FileMeta) {
		self.files.insert(path.into(), meta);
	}

	/// Metadata of `path`, created empty on first use.
	pub fn file_mut(&mut self, path: &str) -> &mut FileMeta {
		self.files.entry(path.to_owned()).or_default()
	}

	/// Builder form: appends `tags` to `path`.
	pub fn with_tags(mut self, path: &str, tags: &[&str]) -> Self {
		self.file_mut(path)
			.tags
			.extend(tags.iter().map(|t| t.to_string()));
		self
	}

	/// Builder form: appends `values` under `key` on `path`.
	pub fn with_property(mut self, path: &str, key: &str, values: &[&str]) -> Self {
		self.file_mut(path)
			.properties
			.entry(key.to_owned())
			.or_default()
			.extend(values.iter().map(|v| v.to_string()));
		self
	}
}

fn stem(path: &str) -> &str {
	let name = path.rsplit('/').next().unwrap_or(path);
	name.strip_suffix(".md").unwrap_or(name)
}

fn references(value: &str, target: &str) -> bool {
	let inner = value
		.trim()
		.strip_prefix("[[")
		.and_then(|v| v.strip_suffix("]]"))
		.map(|v| v.split('|').next().unwrap_or(v));
	match inner {
		Some(link) => {
			link == target || Some(link) == target.strip_suffix(".md") || link == stem(target)
		}
		None => value == target,
	}
}

impl MetadataSource for InMemoryVault {
	fn tags(&self, path: &str) -> Vec<String> {
		self.files
			.get(path)
			.map(|f| {
				f.tags
					.iter()
					.map(|t| t.trim_start_matches('#').to_owned())
					.collect()
			})
			.unwrap_or_default()
	}

	fn folder(&self, path: &str) -> Option<String> {
		let (dir, _) = path.rsplit_once('/')?;
		Some(dir.to_owned())
	}

	fn property(&self, path: &str, key: &str) -> Vec<String> {
		self.files
			.get(path)
			.and_then(|f| f.properties.get(key))
			.cloned()
			.unwrap_or_default()
	}

	fn link_types(&self, source: &str, target: &str) -> Vec<String> {
		let Some(file) = self.files.get(source) else {
			return Vec::new();
		};
		file.properties
			.iter()
			.filter(|(_, values)| values.iter().any(|v| references(v, target)))
			.map(|(key, _)| key.clone())
			.collect()
	}

	fn image(&self, path: &str) -> Option<String> {
		self.files.get(path).and_then(|f| f.image.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn category_keys_round_trip() {
		for key in ["tag", "folder", "link", "property:status"] {
			assert_eq!(Category::parse(key).key(), key);
		}
		assert_eq!(Category::parse("status"), Category::Property("status".to_owned()));
	}

	#[test]
	fn link_types_come_from_referencing_properties() {
		let vault = InMemoryVault::new()
			.with_property("a.md", "parent", &["[[notes/b]]"])
			.with_property("a.md", "related", &["[[b|alias]]", "c.md"])
			.with_property("a.md", "status", &["draft"]);
		assert_eq!(
			vault.link_types("a.md", "notes/b.md"),
			vec!["parent".to_owned(), "related".to_owned()]
		);
		assert_eq!(vault.link_types("a.md", "c.md"), vec!["related".to_owned()]);
		assert!(vault.link_types("a.md", "d.md").is_empty());
	}

	#[test]
	fn tag_nodes_are_their_own_tag() {
		let vault = InMemoryVault::new().with_tags("a.md", &["#x"]);
		assert_eq!(
			node_values(&vault, "#project", NodeKind::Tag, &Category::Tag),
			BTreeSet::from(["project".to_owned()])
		);
		assert_eq!(
			node_values(&vault, "a.md", NodeKind::File, &Category::Tag),
			BTreeSet::from(["x".to_owned()])
		);
		assert!(node_values(&vault, "a.md", NodeKind::File, &Category::Folder).is_empty());
		assert!(node_values(&vault, "ghost", NodeKind::Unresolved, &Category::Tag).is_empty());
	}
}
