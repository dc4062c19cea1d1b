//! Radial placement for context views.
//!
//! The primary systems form a hub row around the origin; every other item is
//! a satellite on a ring. Satellites from upper tiers take the upper half of
//! the ring and lower tiers the lower half, so the vertical tier order holds.

use super::{GroupEdge, PlacementItem, PlacementSpacing, semantic_order};
use crate::classifier::Role;
use c4layout_core::Vec2;
use std::f32::consts::SQRT_2;

fn half_diagonal(size: Vec2) -> f32 {
    size.length() * 0.5
}

fn pick_hub(items: &[PlacementItem], edges: &[GroupEdge], order: &[usize]) -> Vec<usize> {
    let primaries: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| items[i].semantic.role == Role::System)
        .collect();
    if !primaries.is_empty() {
        return primaries;
    }

    let mut degree = vec![0usize; items.len()];
    for &(from, to) in edges {
        degree[from] += 1;
        degree[to] += 1;
    }
    // max_by_key keeps the last maximum; iterate reversed to prefer the first
    order
        .iter()
        .rev()
        .copied()
        .max_by_key(|&i| degree[i])
        .into_iter()
        .collect()
}

/// Angles in degrees for satellites already sorted by rank.
fn satellite_angles(bands: &[usize], hub_band: usize) -> Vec<f32> {
    let m = bands.len();
    let above = bands.iter().filter(|&&b| b < hub_band).count();
    let below = bands.iter().filter(|&&b| b > hub_band).count();
    let level = m - above - below;
    let step = 180.0 / m as f32;

    let mut angles = Vec::with_capacity(m);
    let step_above = if above > 0 { step.min(90.0 / above as f32) } else { step };
    let step_below = if below > 0 { step.min(90.0 / below as f32) } else { step };

    let above_angles: Vec<f32> = (0..above)
        .map(|i| -90.0 + (i as f32 + 0.5) * step_above)
        .collect();
    let below_angles: Vec<f32> = (0..below)
        .map(|j| 90.0 - (below - j) as f32 * step_below + 0.5 * step_below)
        .collect();

    let start = above_angles.last().copied().unwrap_or(-90.0);
    let end = below_angles.first().copied().unwrap_or(90.0);
    let level_angles: Vec<f32> = (0..level)
        .map(|k| start + (k as f32 + 1.0) * (end - start) / (level as f32 + 1.0))
        .collect();

    // each band group hands out its angles in rank order
    let (mut a, mut l, mut b) = (0, 0, 0);
    for &band in bands {
        if band < hub_band {
            angles.push(above_angles[a]);
            a += 1;
        } else if band > hub_band {
            angles.push(below_angles[b]);
            b += 1;
        } else {
            angles.push(level_angles[l]);
            l += 1;
        }
    }
    angles
}

pub fn arrange(
    items: &[PlacementItem],
    edges: &[GroupEdge],
    spacing: &PlacementSpacing,
) -> Vec<Vec2> {
    let mut positions = vec![Vec2::ZERO; items.len()];
    if items.len() <= 1 {
        return positions;
    }

    let order = semantic_order(items);
    let hub = pick_hub(items, edges, &order);

    // hub row centered on the origin
    let hub_width = hub.iter().map(|&i| items[i].size.x).sum::<f32>()
        + spacing.horizontal * hub.len().saturating_sub(1) as f32;
    let mut x = -hub_width * 0.5;
    let mut hub_radius: f32 = 0.0;
    for &i in &hub {
        let size = items[i].size;
        let min = Vec2::new(x, -size.y * 0.5);
        positions[i] = min;
        for corner in [
            min,
            min + size,
            Vec2::new(min.x, min.y + size.y),
            Vec2::new(min.x + size.x, min.y),
        ] {
            hub_radius = hub_radius.max(corner.length());
        }
        x += size.x + spacing.horizontal;
    }

    let satellites: Vec<usize> = order.into_iter().filter(|i| !hub.contains(i)).collect();
    if satellites.is_empty() {
        return positions;
    }

    let hub_band = hub
        .first()
        .map(|&i| items[i].semantic.tier.band())
        .unwrap_or(2);
    let bands: Vec<usize> = satellites
        .iter()
        .map(|&i| items[i].semantic.tier.band())
        .collect();
    let angles = satellite_angles(&bands, hub_band);

    let units: Vec<Vec2> = angles
        .iter()
        .enumerate()
        .map(|(k, deg)| {
            let rad = deg.to_radians();
            let side = if k % 2 == 0 { 1.0 } else { -1.0 };
            Vec2::new(side * rad.cos(), rad.sin())
        })
        .collect();

    let max_half_diag = satellites
        .iter()
        .map(|&i| half_diagonal(items[i].size))
        .fold(0.0, f32::max);
    // Euclidean clearance of sqrt(2) * gap keeps an axis gap of at least `gap`.
    let clearance = spacing.horizontal * SQRT_2;

    let mut radius = hub_radius + max_half_diag + spacing.radial_gap;
    let mut min_unit = f32::INFINITY;
    for (i, a) in units.iter().enumerate() {
        for b in units.iter().skip(i + 1) {
            min_unit = min_unit.min(a.distance(*b));
        }
    }
    if min_unit.is_finite() && min_unit > f32::EPSILON {
        radius = radius.max((2.0 * max_half_diag + clearance) / min_unit);
    }

    for (&i, unit) in satellites.iter().zip(&units) {
        let center = *unit * radius;
        positions[i] = center - items[i].size * 0.5;
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{assert_separated, boxes, item, spacing};
    use c4layout_core::NodeKind;

    fn center_y(items: &[PlacementItem], positions: &[Vec2], i: usize) -> f32 {
        positions[i].y + items[i].size.y * 0.5
    }

    #[test]
    fn test_primary_system_sits_in_the_middle() {
        let items = vec![
            item("core", NodeKind::SOFTWARE_SYSTEM, 200.0, 120.0),
            item("user", NodeKind::PERSON, 150.0, 120.0),
            item("mail", NodeKind::EXTERNAL_SYSTEM, 180.0, 100.0),
        ];
        let positions = arrange(&items, &[(1, 0), (0, 2)], &spacing());
        let hub_center = positions[0] + items[0].size * 0.5;
        assert!(hub_center.length() < 1e-3);
        assert_separated(&boxes(&items, &positions), 80.0);
    }

    #[test]
    fn test_upper_tiers_stay_above_many_satellites() {
        let mut items = vec![item("core", NodeKind::SOFTWARE_SYSTEM, 200.0, 120.0)];
        for i in 0..4 {
            items.push(item(&format!("p{i}"), NodeKind::PERSON, 150.0, 120.0));
        }
        items.push(item("db", NodeKind::DATABASE, 160.0, 100.0));

        let positions = arrange(&items, &[], &spacing());
        let hub_y = center_y(&items, &positions, 0);
        for i in 1..5 {
            assert!(center_y(&items, &positions, i) < hub_y);
        }
        assert!(center_y(&items, &positions, 5) > hub_y);
        assert_separated(&boxes(&items, &positions), 80.0);
    }

    #[test]
    fn test_hub_falls_back_to_most_connected() {
        let items = vec![
            item("a", NodeKind::CONTAINER, 100.0, 60.0),
            item("b", NodeKind::CONTAINER, 100.0, 60.0),
            item("c", NodeKind::CONTAINER, 100.0, 60.0),
        ];
        let order = semantic_order(&items);
        assert_eq!(pick_hub(&items, &[(0, 1), (2, 1)], &order), vec![1]);
        assert_eq!(pick_hub(&items, &[], &order), vec![0]);
    }

    #[test]
    fn test_angles_are_monotonic() {
        let angles = satellite_angles(&[0, 0, 1, 2, 3, 3], 2);
        for pair in angles.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(angles[2] < 0.0);
        assert!(angles[4] > 0.0);
    }
}
