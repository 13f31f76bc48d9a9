use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent, Window};

use crate::overlay::{GraphInstance, InMemoryVault, Notice, OverlaySettings, Theme};

use super::render;
use super::state::ForceGraphState;
use super::types::GraphData;

/// Host simulation and the overlay decorating it, driven by one frame loop.
struct Session {
	graph: ForceGraphState,
	overlay: GraphInstance,
	vault: InMemoryVault,
}

impl Session {
	fn frame(&mut self, ctx: &CanvasRenderingContext2d) {
		if self.graph.animation_running {
			self.graph.tick(0.016);
		}
		if self.overlay.is_ready() {
			let report = self.overlay.sync(&mut self.graph, &self.vault);
			if !report.is_quiet() {
				debug!("overlay sync touched {} elements", report.touched().count());
			}
		} else {
			self.overlay.on_graph_ready(&mut self.graph, &self.vault);
		}
		for notice in self.overlay.take_notices() {
			match notice {
				Notice::AssetUnavailable { id, reason } => warn!("{id}: {reason}"),
				Notice::StateSaved { view } => info!("saved view {view}"),
			}
		}
		render::render(&self.graph, ctx);
	}
}

fn window_size(window: &Window) -> Option<(f64, f64)> {
	Some((
		window.inner_width().ok()?.as_f64()?,
		window.inner_height().ok()?.as_f64()?,
	))
}

fn canvas_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

#[component]
pub fn ForceGraphCanvas(
	#[prop(into)] data: Signal<GraphData>,
	#[prop(into)] vault: Signal<InMemoryVault>,
	#[prop(default = OverlaySettings::default())] settings: OverlaySettings,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let session: Rc<RefCell<Option<Session>>> = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (session_init, animate_init, resize_cb_init) =
		(session.clone(), animate.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window).unwrap_or((800.0, 600.0))
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			warn!("canvas has no 2d context");
			return;
		};

		let mut graph = ForceGraphState::new(&data.get(), w, h);
		let mut overlay = GraphInstance::new(settings.clone());
		overlay.on_theme_change(&mut graph, Theme::Dark);
		*session_init.borrow_mut() = Some(Session {
			graph,
			overlay,
			vault: vault.get(),
		});

		if fullscreen {
			let (session_resize, canvas_resize) = (session_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some((nw, nh)) = web_sys::window().as_ref().and_then(window_size) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *session_resize.borrow_mut() {
					s.graph.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (session_anim, animate_inner) = (session_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Some(ref mut s) = *session_anim.borrow_mut() {
				s.frame(&ctx);
			}
			if let (Some(cb), Some(win)) = (animate_inner.borrow().as_ref(), web_sys::window()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	// Metadata edits land on the next frame's sync.
	let session_vault = session.clone();
	Effect::new(move |_| {
		let next = vault.get();
		if let Some(ref mut s) = *session_vault.borrow_mut() {
			s.vault = next;
		}
	});

	let session_md = session.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		let mut guard = session_md.borrow_mut();
		let Some(s) = guard.as_mut() else {
			return;
		};
		let g = &mut s.graph;
		if let Some(idx) = g.node_at_position(x, y) {
			g.drag.active = true;
			g.drag.node_idx = Some(idx);
			g.drag.start_x = x;
			g.drag.start_y = y;
			let mut start = (0.0_f32, 0.0_f32);
			g.graph.visit_nodes(|node| {
				if node.index() == idx {
					start = (node.x(), node.y());
				}
			});
			(g.drag.node_start_x, g.drag.node_start_y) = start;
		} else {
			g.pan.active = true;
			g.pan.start_x = x;
			g.pan.start_y = y;
			g.pan.transform_start_x = g.transform.x;
			g.pan.transform_start_y = g.transform.y;
		}
	};

	let session_mm = session.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		let mut guard = session_mm.borrow_mut();
		let Some(s) = guard.as_mut() else {
			return;
		};
		let g = &mut s.graph;
		if !g.drag.active {
			let hovered = g.node_at_position(x, y);
			g.set_hover(hovered);
		}

		if g.drag.active {
			if let Some(idx) = g.drag.node_idx {
				let (dx, dy) = (
					(x - g.drag.start_x) / g.transform.k,
					(y - g.drag.start_y) / g.transform.k,
				);
				let (nx, ny) = (
					g.drag.node_start_x + dx as f32,
					g.drag.node_start_y + dy as f32,
				);
				g.graph.visit_nodes_mut(|node| {
					if node.index() == idx {
						node.data.x = nx;
						node.data.y = ny;
						node.data.is_anchor = true;
					}
				});
			}
		} else if g.pan.active {
			g.transform.x = g.pan.transform_start_x + (x - g.pan.start_x);
			g.transform.y = g.pan.transform_start_y + (y - g.pan.start_y);
		}
	};

	// A dropped node stays where it was dropped.
	let session_mu = session.clone();
	let on_mouseup = move |_: MouseEvent| {
		let mut guard = session_mu.borrow_mut();
		let Some(s) = guard.as_mut() else {
			return;
		};
		if let Some(idx) = s.graph.drag.node_idx.filter(|_| s.graph.drag.active) {
			let dropped = s
				.graph
				.node_id(idx)
				.map(str::to_owned)
				.and_then(|id| s.graph.position(&id).map(|(x, y)| (id, x, y)));
			if let Some((id, x, y)) = dropped {
				s.overlay.note_dragged(&id);
				s.overlay.pin(&mut s.graph, &id, x, y);
			}
		}
		s.graph.drag.active = false;
		s.graph.drag.node_idx = None;
		s.graph.pan.active = false;
	};

	let session_ml = session.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *session_ml.borrow_mut() {
			s.graph.drag.active = false;
			s.graph.drag.node_idx = None;
			s.graph.pan.active = false;
			s.graph.set_hover(None);
		}
	};

	let session_wh = session.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *session_wh.borrow_mut() {
			let t = &mut s.graph.transform;
			let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
			let new_k = (t.k * factor).clamp(0.1, 10.0);
			let ratio = new_k / t.k;
			t.x = x - (x - t.x) * ratio;
			t.y = y - (y - t.y) * ratio;
			t.k = new_k;
		}
	};

	let session_kd = session.clone();
	let on_keydown = move |ev: KeyboardEvent| {
		let mut guard = session_kd.borrow_mut();
		let Some(s) = guard.as_mut() else {
			return;
		};
		let Session { graph, overlay, vault } = s;
		match ev.key().as_str() {
			"]" => {
				if let Some(level) = overlay.level_up(graph) {
					info!("layer level {level}");
				}
			}
			"[" => {
				if let Some(level) = overlay.level_down(graph) {
					info!("layer level {level}");
				}
			}
			"l" => {
				if overlay.layers().is_enabled() {
					overlay.disable_layers(graph);
				} else {
					overlay.enable_layers(graph, vault);
				}
			}
			"=" | "+" | "-" => {
				let window = overlay.settings().layers.window_size;
				let window = if ev.key() == "-" { window.saturating_sub(1) } else { window + 1 };
				overlay.set_layer_window(graph, window);
			}
			"p" => {
				if !overlay.pin_last_dragged(graph) {
					debug!("nothing dragged yet");
				}
			}
			"u" => overlay.unpin_all(graph),
			_ => return,
		}
		ev.prevent_default();
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="force-graph-canvas"
			tabindex="0"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			on:keydown=on_keydown
			style="display: block; cursor: grab; outline: none;"
		/>
	}
}

