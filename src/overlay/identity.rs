use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{OverlayError, Result};

const LINK_SEPARATOR: &str = "--to--";

/// Stable key of a node (its path) or a link (`source--to--target`).
///
/// Core elements come and go; this is the only thing compared across rebinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
	/// Identity of the node at `path`.
	pub fn node(path: impl Into<String>) -> Self {
		Self(path.into())
	}

	/// Identity of the link from `source` to `target`.
	pub fn link(source: &str, target: &str) -> Self {
		Self(format!("{source}{LINK_SEPARATOR}{target}"))
	}

	#[allow(missing_docs)]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Splits a link identity back into its endpoints.
	pub fn link_endpoints(&self) -> Result<(&str, &str)> {
		self.0
			.split_once(LINK_SEPARATOR)
			.filter(|(s, t)| !s.is_empty() && !t.is_empty())
			.ok_or_else(|| OverlayError::MalformedLinkId(self.0.clone()))
	}

	/// Identity of the link running the other way.
	pub fn reversed_link(&self) -> Result<Self> {
		let (source, target) = self.link_endpoints()?;
		Ok(Self::link(target, source))
	}
}

impl fmt::Display for LogicalId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for LogicalId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for LogicalId {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn link_identity_splits_on_separator() {
		let id = LogicalId::link("a.md", "notes/b.md");
		assert_eq!(id.as_str(), "a.md--to--notes/b.md");
		assert_eq!(id.link_endpoints().expect("endpoints"), ("a.md", "notes/b.md"));
		assert_eq!(
			id.reversed_link().expect("reverse"),
			LogicalId::link("notes/b.md", "a.md")
		);
	}

	#[test]
	fn node_identity_is_not_a_link() {
		let id = LogicalId::node("a.md");
		assert!(matches!(
			id.link_endpoints(),
			Err(OverlayError::MalformedLinkId(_))
		));
	}
}
