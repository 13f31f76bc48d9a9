use std::f64::consts::{PI, TAU};

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use crate::overlay::{GraphicsId, GraphicsKind, GraphicsObject};

use super::state::{ForceGraphState, HostGraphic, NODE_RADIUS};

const CURVE_STEPS: usize = 12;

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

/// Where an object sits: on a node, or along a link.
#[derive(Clone, Copy, Debug)]
enum Placement {
	Point(f64, f64),
	Segment(f64, f64, f64, f64),
}

pub fn render(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw(state, ctx, state.stage(), 1.0, None, 0.0);
	let _ = ctx.set_line_dash(&js_sys::Array::new());
	ctx.set_global_alpha(1.0);
	ctx.restore();
}

/// Paints `id` and its subtree in child order, so later siblings land on top.
/// A nonzero `bend` on an object bows every line below it.
fn draw(
	state: &ForceGraphState,
	ctx: &CanvasRenderingContext2d,
	id: GraphicsId,
	alpha: f64,
	inherited: Option<Placement>,
	bend: f64,
) {
	let Some(obj) = state.scene().get(id) else {
		return;
	};
	if !obj.visible || obj.alpha <= 0.0 {
		return;
	}
	let alpha = alpha * obj.alpha;
	let bend = if obj.bend != 0.0 { obj.bend } else { bend };
	let placement = placement_of(state, id, obj).or(inherited);
	// Node decorations hang off the host circle but sit behind it.
	let underlay = obj.kind == GraphicsKind::Circle && state.graphic(id).is_some();
	if underlay {
		for &child in obj.children() {
			draw(state, ctx, child, alpha, placement, bend);
		}
	}

	if let Some(placement) = placement {
		ctx.set_global_alpha(alpha.clamp(0.0, 1.0));
		match (obj.kind, placement) {
			(GraphicsKind::Circle, Placement::Point(x, y)) => draw_circle(state, ctx, id, obj, x, y),
			(GraphicsKind::Text, Placement::Point(x, y)) => draw_label(state, ctx, id, obj, x, y),
			(GraphicsKind::Arc, Placement::Point(x, y)) => draw_arc(state, ctx, obj, x, y),
			(GraphicsKind::Sprite, Placement::Point(x, y)) => draw_icon(state, ctx, obj, x, y),
			(GraphicsKind::Line, Placement::Segment(x1, y1, x2, y2)) => {
				draw_line(state, ctx, id, obj, (x1, y1, x2, y2), bend)
			}
			(GraphicsKind::Arrow, Placement::Segment(x1, y1, x2, y2)) => {
				draw_arrow(state, ctx, obj, (x1, y1, x2, y2))
			}
			_ => {}
		}
	}

	if !underlay {
		for &child in obj.children() {
			draw(state, ctx, child, alpha, placement, bend);
		}
	}
}

fn placement_of(state: &ForceGraphState, id: GraphicsId, obj: &GraphicsObject) -> Option<Placement> {
	let host = state
		.graphic(id)
		.or_else(|| obj.anchor().and_then(|a| state.graphic(a)));
	if let Some(graphic) = host {
		return match graphic {
			HostGraphic::Circle(node) | HostGraphic::Label(node) => {
				state.position(node).map(|(x, y)| Placement::Point(x, y))
			}
			HostGraphic::Line(s, t) | HostGraphic::Arrow(s, t) => segment(state, s, t),
		};
	}
	let owner = obj.owner.as_ref()?;
	match owner.link_endpoints() {
		Ok((s, t)) => segment(state, s, t),
		Err(_) => state.position(owner.as_str()).map(|(x, y)| Placement::Point(x, y)),
	}
}

fn segment(state: &ForceGraphState, source: &str, target: &str) -> Option<Placement> {
	let (x1, y1) = state.position(source)?;
	let (x2, y2) = state.position(target)?;
	Some(Placement::Segment(x1, y1, x2, y2))
}

/// Point at `t` on the quadratic from start to end whose middle sits
/// `bend` of the length off to the left. Reversed links bow the other way.
fn along((x1, y1, x2, y2): (f64, f64, f64, f64), bend: f64, t: f64) -> (f64, f64) {
	let (dx, dy) = (x2 - x1, y2 - y1);
	let (cx, cy) = ((x1 + x2) / 2.0 - dy * bend * 2.0, (y1 + y2) / 2.0 + dx * bend * 2.0);
	let s = 1.0 - t;
	(
		s * s * x1 + 2.0 * s * t * cx + t * t * x2,
		s * s * y1 + 2.0 * s * t * cy + t * t * y2,
	)
}

/// Highlight factor for a node: brightened while hovered, dimmed otherwise.
fn emphasis(state: &ForceGraphState, node: &str) -> (bool, f64) {
	let t = ease_out_cubic(state.hover.highlight_t);
	if !state.has_active_highlight() {
		return (false, 0.0);
	}
	let lit = state.index(node).is_some_and(|idx| state.is_highlighted(idx));
	(lit, t)
}

fn node_of(state: &ForceGraphState, id: GraphicsId) -> Option<&str> {
	match state.graphic(id)? {
		HostGraphic::Circle(node) | HostGraphic::Label(node) => Some(node),
		_ => None,
	}
}

fn draw_circle(state: &ForceGraphState, ctx: &CanvasRenderingContext2d, id: GraphicsId, obj: &GraphicsObject, x: f64, y: f64) {
	let k = state.transform.k;
	let Some(node) = node_of(state, id) else {
		// Decoration background behind the host circle.
		ctx.begin_path();
		let _ = ctx.arc(x, y, NODE_RADIUS * 1.6, 0.0, TAU);
		ctx.set_fill_style_str(&obj.tint.css(1.0));
		ctx.fill();
		return;
	};

	let (lit, t) = emphasis(state, node);
	let hovered = state.index(node).is_some_and(|idx| state.is_hovered(idx));
	let radius = match (lit, hovered) {
		(true, true) => NODE_RADIUS * (1.0 + 0.35 * t),
		(true, false) => NODE_RADIUS * (1.0 + 0.2 * t),
		(false, _) => NODE_RADIUS * (1.0 - 0.15 * t),
	};
	if !lit && t > 0.0 {
		ctx.set_global_alpha(ctx.global_alpha() * (1.0 - 0.7 * t));
	}

	if lit && t > 0.01 {
		let glow_radius = if hovered {
			NODE_RADIUS * (1.8 + 1.2 * t)
		} else {
			NODE_RADIUS * (1.4 + 0.6 * t)
		};
		if let Ok(gradient) = ctx.create_radial_gradient(x, y, radius * 0.3, x, y, glow_radius) {
			let alpha = if hovered { 0.35 * t } else { 0.2 * t };
			let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {alpha})"));
			let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", alpha * 0.3));
			let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
			ctx.begin_path();
			let _ = ctx.arc(x, y, glow_radius, 0.0, TAU);
			#[allow(deprecated)]
			ctx.set_fill_style(&gradient);
			ctx.fill();
		}
	}

	ctx.begin_path();
	let _ = ctx.arc(x, y, radius, 0.0, TAU);
	ctx.set_fill_style_str(&obj.tint.css(1.0));
	ctx.fill();

	if hovered && t > 0.01 {
		ctx.begin_path();
		let _ = ctx.arc(x, y, radius + 2.0 / k, 0.0, TAU);
		ctx.set_stroke_style_str(&format!("rgba(255, 255, 255, {})", 0.7 * t));
		ctx.set_line_width(1.5 / k);
		ctx.stroke();
	}
}

fn draw_label(state: &ForceGraphState, ctx: &CanvasRenderingContext2d, id: GraphicsId, obj: &GraphicsObject, x: f64, y: f64) {
	let Some(text) = &obj.text else {
		return;
	};
	let k = state.transform.k;
	// Unzoomed, only hovered neighbourhoods are labelled.
	if let Some(node) = node_of(state, id) {
		let (lit, t) = emphasis(state, node);
		if k < 0.6 && !lit {
			return;
		}
		if !lit && t > 0.0 {
			ctx.set_global_alpha(ctx.global_alpha() * (1.0 - 0.7 * t));
		}
	}
	ctx.set_fill_style_str("rgba(255, 255, 255, 0.8)");
	ctx.set_font(&format!("{}px sans-serif", 10.0 / k.max(0.5)));
	let _ = ctx.fill_text(text, x + NODE_RADIUS + 3.0, y + 3.0);
}

fn draw_arc(state: &ForceGraphState, ctx: &CanvasRenderingContext2d, obj: &GraphicsObject, x: f64, y: f64) {
	let (start, end) = obj.span.unwrap_or((0.0, 1.0));
	let k = state.transform.k;
	ctx.begin_path();
	let _ = ctx.arc(x, y, NODE_RADIUS + 2.5 / k, start * TAU - PI / 2.0, end * TAU - PI / 2.0);
	ctx.set_stroke_style_str(&obj.tint.css(1.0));
	ctx.set_line_width(2.0 / k);
	ctx.stroke();
}

fn draw_icon(state: &ForceGraphState, ctx: &CanvasRenderingContext2d, obj: &GraphicsObject, x: f64, y: f64) {
	if obj.texture.is_none() {
		return;
	}
	let size = 4.0 / state.transform.k.max(0.5);
	ctx.set_fill_style_str(&obj.tint.css(1.0));
	ctx.fill_rect(x + NODE_RADIUS * 0.6, y - NODE_RADIUS * 0.6 - size, size, size);
}

fn draw_line(
	state: &ForceGraphState,
	ctx: &CanvasRenderingContext2d,
	id: GraphicsId,
	obj: &GraphicsObject,
	(x1, y1, x2, y2): (f64, f64, f64, f64),
	bend: f64,
) {
	let (dx, dy) = (x2 - x1, y2 - y1);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < 0.001 {
		return;
	}
	let (ux, uy) = (dx / dist, dy / dist);
	let k = state.transform.k;
	let arrow_size = 8.0 / k;

	let Some(HostGraphic::Line(source, target)) = state.graphic(id) else {
		// Overlay lines: category stripes carry a span, sibling outlines do not.
		match obj.span {
			Some((from, to)) if bend == 0.0 => {
				let usable = dist - 2.0 * NODE_RADIUS;
				let (a, b) = (NODE_RADIUS + usable * from, NODE_RADIUS + usable * to);
				ctx.set_stroke_style_str(&obj.tint.css(1.0));
				ctx.set_line_width(3.0 / k);
				ctx.begin_path();
				ctx.move_to(x1 + ux * a, y1 + uy * a);
				ctx.line_to(x1 + ux * b, y1 + uy * b);
				ctx.stroke();
			}
			Some((from, to)) => {
				let inset = NODE_RADIUS / dist;
				let usable = 1.0 - 2.0 * inset;
				let (a, b) = (inset + usable * from, inset + usable * to);
				ctx.set_stroke_style_str(&obj.tint.css(1.0));
				ctx.set_line_width(3.0 / k);
				ctx.begin_path();
				let (sx, sy) = along((x1, y1, x2, y2), bend, a);
				ctx.move_to(sx, sy);
				for step in 1..=CURVE_STEPS {
					let t = a + (b - a) * step as f64 / CURVE_STEPS as f64;
					let (px, py) = along((x1, y1, x2, y2), bend, t);
					ctx.line_to(px, py);
				}
				ctx.stroke();
			}
			None => {
				ctx.set_stroke_style_str(&obj.tint.css(0.5));
				ctx.set_line_width(4.0 / k);
				ctx.begin_path();
				ctx.move_to(x1, y1);
				ctx.line_to(x2, y2);
				ctx.stroke();
			}
		}
		return;
	};

	let (dash, gap) = (8.0 / k, 4.0 / k);
	let dash_offset = -(state.flow_time * 30.0) % (dash + gap);
	let (lit_a, t) = emphasis(state, source);
	let (lit_b, _) = emphasis(state, target);
	let base = 1.5 / k;
	let (edge_alpha, width) = if lit_a && lit_b {
		(0.6 + 0.3 * t, base * (1.0 + 0.3 * t))
	} else {
		(0.6 - 0.45 * t, base * (1.0 - 0.3 * t))
	};

	ctx.set_stroke_style_str(&obj.tint.css(edge_alpha));
	ctx.set_line_width(width);
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(dash),
		&JsValue::from_f64(gap),
	));
	ctx.set_line_dash_offset(dash_offset);
	ctx.begin_path();
	ctx.move_to(x1 + ux * NODE_RADIUS, y1 + uy * NODE_RADIUS);
	ctx.line_to(
		x2 - ux * (NODE_RADIUS + arrow_size),
		y2 - uy * (NODE_RADIUS + arrow_size),
	);
	ctx.stroke();
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

/// The arrow sits at the target end; its heading is whatever the scene holds,
/// so an inverted link points back at its source.
fn draw_arrow(state: &ForceGraphState, ctx: &CanvasRenderingContext2d, obj: &GraphicsObject, (x1, y1, x2, y2): (f64, f64, f64, f64)) {
	let (dx, dy) = (x2 - x1, y2 - y1);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < 0.001 {
		return;
	}
	let arrow_size = 8.0 / state.transform.k;
	let (ux, uy) = (dx / dist, dy / dist);
	let (hx, hy) = (obj.rotation.cos(), obj.rotation.sin());
	// A reversed heading keeps the arrow in the same slot before the node.
	let inset = if hx * ux + hy * uy < 0.0 { NODE_RADIUS + arrow_size } else { NODE_RADIUS };
	let (tip_x, tip_y) = (x2 - ux * inset, y2 - uy * inset);
	let (base_x, base_y) = (tip_x - hx * arrow_size, tip_y - hy * arrow_size);
	let (px, py) = (-hy * arrow_size * 0.5, hx * arrow_size * 0.5);

	ctx.set_fill_style_str(&obj.tint.css(0.8));
	ctx.begin_path();
	ctx.move_to(tip_x, tip_y);
	ctx.line_to(base_x + px, base_y + py);
	ctx.line_to(base_x - px, base_y - py);
	ctx.close_path();
	ctx.fill();
}
