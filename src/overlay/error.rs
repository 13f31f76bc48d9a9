use thiserror::Error;

use super::identity::LogicalId;
use super::scene::GraphicsId;

/// Result with [`OverlayError`] as the default error.
pub type Result<T, E = OverlayError> = std::result::Result<T, E>;

/// Failures the overlay reports instead of panicking.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum OverlayError {
	#[error("malformed link identity `{0}`, expected `source--to--target`")]
	MalformedLinkId(String),

	#[error("graphics {anchor:?} is already decorated by `{owner}`")]
	DecorationConflict { owner: LogicalId, anchor: GraphicsId },

	#[error("no live core element for `{0}`")]
	MissingCoreElement(LogicalId),

	#[error("graphics handle {0:?} was destroyed")]
	DeadGraphics(GraphicsId),

	#[error("invalid overlay settings: {0}")]
	Settings(#[from] serde_json::Error),

	#[error("asset for `{id}` unavailable: {reason}")]
	AssetUnavailable { id: LogicalId, reason: String },
}
