//! Typed, filterable decorations over a force graph the overlay does not own.
//!
//! The host keeps creating and destroying its own nodes and links. A
//! [`GraphInstance`] follows them by logical identity, moves its decorations
//! onto whatever object currently stands for that identity, and rewrites a
//! few host property writes through the [`InterceptorRegistry`].

mod assets;
mod color;
mod decoration;
mod element;
mod element_set;
mod error;
mod events;
mod host;
mod identity;
mod instance;
mod intercept;
mod interactive;
mod layers;
mod metadata;
mod scene;
mod settings;

pub use assets::{AssetCompletion, AssetLoader, AssetRequest, Delivery, QueuedLoader};
pub use color::{Color, Palette};
pub use decoration::{Channel, ChannelShape, Decoration};
pub use element::{Decoratable, DecorationContext, ElementKind, ElementState, ExtendedElement, ImageState};
pub use element_set::{ElementSet, Outlines, SyncContext, SyncReport};
pub use error::{OverlayError, Result};
pub use events::{EventBus, ListenerId};
pub use host::{
	CoreElement, CoreHandle, CoreLink, CoreNode, ForceNode, Host, HostFilter, HostFrame, LiveCollections,
	MemoryHost, NodeKind, WorkerMessage,
};
pub use identity::LogicalId;
pub use instance::{GraphInstance, Notice, Theme};
pub use intercept::{InterceptorRegistry, Override, Property, PropertyValue, Registration};
pub use interactive::{DEFAULT_NONE_VALUE, InteractiveManager, ManagerEvent, Managers};
pub use layers::{GraphicsRole, Layer, LayerGroup, LayersEngine, parse_level_label};
pub use metadata::{Category, FileMeta, InMemoryVault, MetadataSource, TypeMap};
pub use scene::{GraphicsId, GraphicsKind, GraphicsObject, Scene};
pub use settings::{
	CategorySettings, EngineOptions, Features, LayerOrder, LayerSettings, OverlaySettings, Point, ViewState,
};
