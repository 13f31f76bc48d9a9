use leptos::prelude::*;

use crate::components::force_graph::{ForceGraphCanvas, GraphData, GraphLink, GraphNode};
use crate::overlay::{CategorySettings, InMemoryVault, MetadataSource, NodeKind, OverlaySettings};

const FOLDERS: [&str; 4] = ["inbox", "projects", "areas", "archive"];
const TAGS: [&str; 5] = ["idea", "draft", "review", "reference", "todo"];
const LAYERS: [&str; 4] = ["1_Sources", "2_Notes", "3_Topics", "4_Maps"];

fn note_path(i: usize) -> String {
	format!("{}/note-{i}.md", FOLDERS[i % FOLDERS.len()])
}

/// Sample vault: notes in folders, tagged, most placed on a layer.
fn sample_vault(n: usize) -> InMemoryVault {
	(0..n).fold(InMemoryVault::new(), |vault, i| {
		let path = note_path(i);
		let tags: Vec<&str> = TAGS
			.iter()
			.enumerate()
			.filter(|(t, _)| rand_simple(i * 7 + t) < 0.3)
			.map(|(_, tag)| *tag)
			.collect();
		let vault = vault.with_tags(&path, &tags);
		// Every ninth note is left off the layers on purpose.
		if i % 9 == 8 {
			vault
		} else {
			vault.with_property(&path, "layer", &[LAYERS[(i * LAYERS.len() / n.max(1)).min(LAYERS.len() - 1)]])
		}
	})
}

/// Random tree of notes, plus one node per tag linked from its notes.
fn sample_graph(n: usize, vault: &InMemoryVault) -> GraphData {
	let mut nodes: Vec<GraphNode> = (0..n)
		.map(|i| GraphNode {
			id: note_path(i),
			label: (i < 12).then(|| format!("Note {i}")),
			kind: NodeKind::File,
		})
		.collect();
	nodes.extend(TAGS.iter().map(|tag| GraphNode {
		id: format!("#{tag}"),
		label: Some(format!("#{tag}")),
		kind: NodeKind::Tag,
	}));

	let mut links: Vec<GraphLink> = (1..n)
		.map(|i| {
			let target = (rand_simple(i) * (i as f64)) as usize;
			GraphLink {
				source: note_path(i),
				target: note_path(target),
			}
		})
		.collect();
	for i in 0..n {
		let path = note_path(i);
		for tag in vault.tags(&path) {
			links.push(GraphLink {
				source: path.clone(),
				target: format!("#{tag}"),
			});
		}
	}
	// A few back-links so sibling outlines have something to show.
	links.extend((1..n).step_by(11).map(|i| {
		let target = (rand_simple(i) * (i as f64)) as usize;
		GraphLink {
			source: note_path(target),
			target: note_path(i),
		}
	}));

	GraphData { nodes, links }
}

/// Simple pseudo-random number generator (deterministic for consistency).
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

fn sample_settings() -> OverlaySettings {
	let mut settings = OverlaySettings::default();
	settings
		.categories
		.insert("folder".to_owned(), CategorySettings::default());
	settings.features.outlines = true;
	settings.features.opacity_layer = true;
	settings.layers.enabled = true;
	// Culled nodes come back within a few frames while panning.
	settings.absent_grace_ticks = 30;
	settings
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let vault = sample_vault(80);
	let graph_data = Signal::derive({
		let vault = vault.clone();
		move || sample_graph(80, &vault)
	});
	let vault = Signal::derive(move || vault.clone());

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<ForceGraphCanvas data=graph_data vault=vault settings=sample_settings() fullscreen=true />
				<div class="graph-overlay">
					<h1>"Decorated Graph"</h1>
					<p class="subtitle">
						"Drag to pin. [ and ] walk layers, + and - resize the window, l toggles layers, u unpins all."
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
