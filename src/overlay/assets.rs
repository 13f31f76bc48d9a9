//! Image loading for node decorations.
//!
//! Loads finish on their own schedule. A completion names the identity and
//! the core handle it was requested for, and is dropped unless both still
//! match the live element when it arrives.

use std::collections::VecDeque;

use log::{debug, warn};

use super::element::{DecorationContext, ImageState};
use super::element_set::ElementSet;
use super::error::OverlayError;
use super::host::{CoreElement, CoreHandle, CoreNode};
use super::identity::LogicalId;
use super::metadata::MetadataSource;
use super::scene::Scene;

/// One image load, stamped with the core it was asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
	/// Element the image belongs to.
	pub id: LogicalId,
	/// Core bound when the load started.
	pub handle: CoreHandle,
	/// Path or URL as found in metadata.
	pub source: String,
}

/// A finished load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetCompletion {
	/// What was asked for.
	pub request: AssetRequest,
	/// Texture key on success, failure reason otherwise.
	pub result: Result<String, String>,
}

/// Where image loads go.
pub trait AssetLoader {
	/// Starts a load; the result shows up in a later [`poll`](Self::poll).
	fn request(&mut self, request: AssetRequest);

	/// Completions that arrived since the last poll.
	fn poll(&mut self) -> Vec<AssetCompletion>;
}

/// Holds requests until someone resolves them.
#[derive(Debug, Default)]
pub struct QueuedLoader {
	pending: VecDeque<AssetRequest>,
	ready: Vec<AssetCompletion>,
}

impl QueuedLoader {
	/// An empty queue.
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests nobody resolved yet.
	pub fn pending(&self) -> impl Iterator<Item = &AssetRequest> {
		self.pending.iter()
	}

	/// Resolves every pending request for `source`.
	pub fn complete(&mut self, source: &str, result: Result<String, String>) -> usize {
		let (done, rest): (VecDeque<_>, VecDeque<_>) =
			self.pending.drain(..).partition(|r| r.source == source);
		self.pending = rest;
		let n = done.len();
		self.ready.extend(done.into_iter().map(|request| AssetCompletion {
			request,
			result: result.clone(),
		}));
		n
	}

	/// Resolves everything still pending through `resolve`.
	pub fn complete_all(&mut self, mut resolve: impl FnMut(&AssetRequest) -> Result<String, String>) {
		while let Some(request) = self.pending.pop_front() {
			let result = resolve(&request);
			self.ready.push(AssetCompletion { request, result });
		}
	}
}

impl AssetLoader for QueuedLoader {
	fn request(&mut self, request: AssetRequest) {
		self.pending.push_back(request);
	}

	fn poll(&mut self) -> Vec<AssetCompletion> {
		std::mem::take(&mut self.ready)
	}
}

/// What happened to one completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
	/// The image is on the element.
	Applied,
	/// The load failed with this reason.
	Failed(String),
	/// The element vanished or was rebound while the load was in flight.
	Stale,
}

/// Starts a load for every active node with an image and none requested yet.
pub fn request_images(
	nodes: &mut ElementSet<CoreNode>,
	meta: &dyn MetadataSource,
	loader: &mut dyn AssetLoader,
) -> usize {
	let mut started = 0;
	for element in nodes.iter_mut() {
		if !element.is_active() || element.image != ImageState::Unrequested {
			continue;
		}
		let Some(core) = element.core() else {
			continue;
		};
		let Some(source) = meta.image(&core.id) else {
			continue;
		};
		let handle = core.handle();
		element.image = ImageState::Pending(handle);
		loader.request(AssetRequest {
			id: element.id().clone(),
			handle,
			source,
		});
		started += 1;
	}
	started
}

/// Applies one completion if its element still matches the request.
pub fn deliver(
	nodes: &mut ElementSet<CoreNode>,
	scene: &mut Scene,
	completion: AssetCompletion,
	ctx: &DecorationContext<'_>,
) -> Delivery {
	let request = &completion.request;
	let Some(element) = nodes.get_mut(&request.id) else {
		debug!("{}: image arrived for an unknown element", request.id);
		return Delivery::Stale;
	};
	if element.image != ImageState::Pending(request.handle)
		|| element.core_handle() != Some(request.handle)
	{
		debug!("{}: dropping stale image", request.id);
		return Delivery::Stale;
	}
	match completion.result {
		Ok(texture) => {
			element.image = ImageState::Loaded(texture.clone());
			if !ctx.features.images {
				return Delivery::Applied;
			}
			if element.decoration().is_some() {
				element.set_icon(scene, &texture);
			} else if let Err(err) = element.rebuild_decoration(scene, ctx) {
				warn!("{}: image loaded but decoration failed: {err}", request.id);
			}
			Delivery::Applied
		}
		Err(reason) => {
			let err = OverlayError::AssetUnavailable {
				id: request.id.clone(),
				reason: format!("`{}`: {reason}", request.source),
			};
			warn!("{err}");
			element.image = ImageState::Failed;
			Delivery::Failed(reason)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::overlay::color::Color;
	use crate::overlay::element_set::SyncContext;
	use crate::overlay::host::{Host, MemoryHost, NodeKind};
	use crate::overlay::interactive::Managers;
	use crate::overlay::metadata::{FileMeta, InMemoryVault};
	use crate::overlay::settings::Features;

	fn setup() -> (MemoryHost, InMemoryVault, Managers, Features, ElementSet<CoreNode>) {
		let mut host = MemoryHost::new();
		host.add_node("a.md", NodeKind::File);
		let mut vault = InMemoryVault::new();
		vault.insert(
			"a.md",
			FileMeta {
				image: Some("cover.png".to_owned()),
				..FileMeta::default()
			},
		);
		let features = Features {
			images: true,
			..Features::default()
		};
		let mut managers = Managers::new();
		let mut nodes = ElementSet::new();
		let mut ctx = SyncContext {
			metadata: &vault,
			managers: &mut managers,
			features: &features,
			background: Color::BLACK,
			grace_ticks: 0,
		};
		let frame = host.frame();
		nodes.sync(frame.scene, frame.live, &mut ctx);
		(host, vault, managers, features, nodes)
	}

	#[test]
	fn loaded_image_becomes_an_icon() {
		let (mut host, vault, managers, features, mut nodes) = setup();
		let mut loader = QueuedLoader::new();
		assert_eq!(request_images(&mut nodes, &vault, &mut loader), 1);
		assert_eq!(request_images(&mut nodes, &vault, &mut loader), 0);

		loader.complete("cover.png", Ok("tex:cover".to_owned()));
		let ctx = DecorationContext {
			managers: &managers,
			features: &features,
			background: Color::BLACK,
		};
		let [completion] = loader.poll().try_into().expect("one completion");
		let delivery = deliver(&mut nodes, host.scene_mut(), completion, &ctx);
		assert_eq!(delivery, Delivery::Applied);

		let a = nodes.get(&LogicalId::node("a.md")).expect("a");
		let icon = a.decoration().and_then(|d| d.icon()).expect("icon");
		assert_eq!(host.scene().get(icon).and_then(|o| o.texture.clone()), Some("tex:cover".to_owned()));
	}

	#[test]
	fn result_for_a_rebound_element_is_dropped() {
		let (mut host, vault, mut managers, features, mut nodes) = setup();
		let mut loader = QueuedLoader::new();
		request_images(&mut nodes, &vault, &mut loader);

		host.recreate_node("a.md");
		let mut ctx = SyncContext {
			metadata: &vault,
			managers: &mut managers,
			features: &features,
			background: Color::BLACK,
			grace_ticks: 0,
		};
		let frame = host.frame();
		nodes.sync(frame.scene, frame.live, &mut ctx);

		loader.complete_all(|_| Ok("tex:old".to_owned()));
		let ctx = DecorationContext {
			managers: &managers,
			features: &features,
			background: Color::BLACK,
		};
		for completion in loader.poll() {
			assert_eq!(deliver(&mut nodes, host.scene_mut(), completion, &ctx), Delivery::Stale);
		}
		let a = nodes.get(&LogicalId::node("a.md")).expect("a");
		assert_eq!(a.image, ImageState::Unrequested);
		assert!(a.decoration().and_then(|d| d.icon()).is_none());
	}

	#[test]
	fn failure_is_reported_once() {
		let (mut host, vault, managers, features, mut nodes) = setup();
		let mut loader = QueuedLoader::new();
		request_images(&mut nodes, &vault, &mut loader);
		loader.complete("cover.png", Err("404".to_owned()));
		let ctx = DecorationContext {
			managers: &managers,
			features: &features,
			background: Color::BLACK,
		};
		let deliveries: Vec<_> = loader
			.poll()
			.into_iter()
			.map(|c| deliver(&mut nodes, host.scene_mut(), c, &ctx))
			.collect();
		assert_eq!(deliveries, vec![Delivery::Failed("404".to_owned())]);
		assert_eq!(request_images(&mut nodes, &vault, &mut loader), 0);
	}
}
