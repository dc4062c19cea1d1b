//! Sugiyama-style layered placement.
//!
//! Layers follow semantic tier bands first (actors above presentation above
//! logic above data) and relationship direction second: inside one band a
//! target sits at least one layer below its source.

use super::{GroupEdge, PlacementItem, PlacementSpacing, semantic_order};
use c4layout_core::Vec2;
use std::collections::BTreeMap;

const MAX_RANKING_ITERATIONS: usize = 64;
const BARYCENTER_PASSES: usize = 2;

/// Layer index per item, compressed to `0..layer_count`.
pub fn assign_layers(items: &[PlacementItem], edges: &[GroupEdge]) -> Vec<usize> {
    let band: Vec<usize> = items.iter().map(|item| item.semantic.tier.band()).collect();
    let mut sub = vec![0usize; items.len()];

    let intra_band: Vec<GroupEdge> = edges
        .iter()
        .copied()
        .filter(|&(from, to)| from != to && band[from] == band[to])
        .collect();

    let max_iterations = (items.len() + 2).min(MAX_RANKING_ITERATIONS);
    let mut converged = intra_band.is_empty();
    for _ in 0..max_iterations {
        if converged {
            break;
        }
        let mut changed = false;
        for &(from, to) in &intra_band {
            if sub[to] <= sub[from] {
                sub[to] = sub[from] + 1;
                changed = true;
            }
        }
        converged = !changed;
    }

    if !converged {
        // Cyclic relationships inside one band; ranks stay bounded by the iteration cap.
        tracing::warn!(
            "layer assignment did not converge after {} iterations",
            max_iterations
        );
    }

    compress_layers(&band, &sub)
}

fn compress_layers(band: &[usize], sub: &[usize]) -> Vec<usize> {
    let mut keys: Vec<(usize, usize)> = band.iter().copied().zip(sub.iter().copied()).collect();
    keys.sort_unstable();
    keys.dedup();
    let remap: BTreeMap<(usize, usize), usize> =
        keys.into_iter().enumerate().map(|(i, key)| (key, i)).collect();

    band.iter()
        .zip(sub)
        .map(|(b, s)| remap.get(&(*b, *s)).copied().unwrap_or(0))
        .collect()
}

fn order_layer_by_barycenter(layer: &mut [usize], coords: &[f32], neighbors: &[Vec<usize>]) {
    let barycenters: Vec<(usize, f32)> = layer
        .iter()
        .map(|&node| {
            let list = &neighbors[node];
            let value = if list.is_empty() {
                coords[node]
            } else {
                list.iter().map(|&n| coords[n]).sum::<f32>() / list.len() as f32
            };
            (node, value)
        })
        .collect();

    let mut sorted = barycenters;
    // stable: equal barycenters keep the previous order
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
    for (slot, (node, _)) in layer.iter_mut().zip(sorted) {
        *slot = node;
    }
}

/// Item indices per layer, ordered to reduce crossings.
pub fn order_layers(
    items: &[PlacementItem],
    edges: &[GroupEdge],
    layer_of: &[usize],
) -> Vec<Vec<usize>> {
    let layer_count = layer_of.iter().copied().max().map_or(0, |m| m + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
    for index in semantic_order(items) {
        layers[layer_of[index]].push(index);
    }

    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for &(from, to) in edges {
        if from == to {
            continue;
        }
        // orient by layer so back edges still pull their endpoints together
        let (upper, lower) = if layer_of[from] <= layer_of[to] {
            (from, to)
        } else {
            (to, from)
        };
        if layer_of[upper] == layer_of[lower] {
            continue;
        }
        incoming[lower].push(upper);
        outgoing[upper].push(lower);
    }

    let mut coords = vec![0.0f32; items.len()];
    let refresh = |layer: &[usize], coords: &mut [f32]| {
        for (j, &node) in layer.iter().enumerate() {
            coords[node] = j as f32;
        }
    };
    for layer in &layers {
        refresh(layer, &mut coords);
    }

    for _ in 0..BARYCENTER_PASSES {
        for layer in layers.iter_mut().skip(1) {
            order_layer_by_barycenter(layer, &coords, &incoming);
            refresh(layer, &mut coords);
        }
        for i in (0..layer_count.saturating_sub(1)).rev() {
            order_layer_by_barycenter(&mut layers[i], &coords, &outgoing);
            refresh(&layers[i], &mut coords);
        }
    }

    layers
}

pub fn arrange(
    items: &[PlacementItem],
    edges: &[GroupEdge],
    spacing: &PlacementSpacing,
) -> Vec<Vec2> {
    if items.is_empty() {
        return Vec::new();
    }

    let layer_of = assign_layers(items, edges);
    let layers = order_layers(items, edges, &layer_of);

    let widths: Vec<f32> = layers
        .iter()
        .map(|layer| {
            layer.iter().map(|&i| items[i].size.x).sum::<f32>()
                + spacing.horizontal * layer.len().saturating_sub(1) as f32
        })
        .collect();
    let max_width = widths.iter().copied().fold(0.0, f32::max);

    let mut positions = vec![Vec2::ZERO; items.len()];
    let mut y = 0.0;
    for (layer, width) in layers.iter().zip(&widths) {
        let height = layer.iter().map(|&i| items[i].size.y).fold(0.0, f32::max);
        let mut x = if spacing.center_layers {
            (max_width - width) * 0.5
        } else {
            0.0
        };
        for &index in layer {
            let size = items[index].size;
            positions[index] = Vec2::new(x, y + (height - size.y) * 0.5);
            x += size.x + spacing.horizontal;
        }
        y += height + spacing.vertical;
    }
    positions
}
