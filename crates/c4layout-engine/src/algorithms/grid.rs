use super::{PlacementItem, PlacementSpacing, semantic_order};
use c4layout_core::Vec2;

/// Columns used for `n` items: the smallest square that fits them.
pub fn columns_for(n: usize) -> usize {
    ((n as f32).sqrt().ceil() as usize).max(1)
}

/// Row-major flow in semantic order; each item is centered in a cell sized
/// by the widest item of its column and the tallest item of its row.
pub fn arrange(items: &[PlacementItem], spacing: &PlacementSpacing) -> Vec<Vec2> {
    let order = semantic_order(items);
    let cols = columns_for(items.len());
    let rows = order.len().div_ceil(cols);

    let mut col_widths = vec![0.0f32; cols];
    let mut row_heights = vec![0.0f32; rows];
    for (slot, &index) in order.iter().enumerate() {
        let size = items[index].size;
        col_widths[slot % cols] = col_widths[slot % cols].max(size.x);
        row_heights[slot / cols] = row_heights[slot / cols].max(size.y);
    }

    let col_x: Vec<f32> = col_widths
        .iter()
        .scan(0.0, |x, width| {
            let start = *x;
            *x += width + spacing.horizontal;
            Some(start)
        })
        .collect();
    let row_y: Vec<f32> = row_heights
        .iter()
        .scan(0.0, |y, height| {
            let start = *y;
            *y += height + spacing.vertical;
            Some(start)
        })
        .collect();

    let mut positions = vec![Vec2::ZERO; items.len()];
    for (slot, &index) in order.iter().enumerate() {
        let (col, row) = (slot % cols, slot / cols);
        let size = items[index].size;
        positions[index] = Vec2::new(
            col_x[col] + (col_widths[col] - size.x) * 0.5,
            row_y[row] + (row_heights[row] - size.y) * 0.5,
        );
    }
    positions
}

/// Size of the grid the items would pack into, without placing them.
pub fn packed_size(sizes: &[Vec2], horizontal: f32, vertical: f32) -> Vec2 {
    if sizes.is_empty() {
        return Vec2::ZERO;
    }
    let cols = columns_for(sizes.len());
    let rows = sizes.len().div_ceil(cols);
    let mut col_widths = vec![0.0f32; cols];
    let mut row_heights = vec![0.0f32; rows];
    for (slot, size) in sizes.iter().enumerate() {
        col_widths[slot % cols] = col_widths[slot % cols].max(size.x);
        row_heights[slot / cols] = row_heights[slot / cols].max(size.y);
    }
    Vec2::new(
        col_widths.iter().sum::<f32>() + horizontal * (cols - 1) as f32,
        row_heights.iter().sum::<f32>() + vertical * (rows - 1) as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{assert_separated, boxes, item, spacing};
    use c4layout_core::NodeKind;

    #[test]
    fn test_grid_is_square_and_separated() {
        let items: Vec<_> = (0..5)
            .map(|i| {
                let width = 100.0 + i as f32 * 10.0;
                item(&format!("s{i}"), NodeKind::SOFTWARE_SYSTEM, width, 80.0)
            })
            .collect();
        let positions = arrange(&items, &spacing());

        assert_eq!(columns_for(5), 3);
        assert_separated(&boxes(&items, &positions), 80.0);
    }

    #[test]
    fn test_grid_orders_by_rank() {
        let items = vec![
            item("db", NodeKind::DATABASE, 100.0, 80.0),
            item("user", NodeKind::PERSON, 100.0, 80.0),
        ];
        let positions = arrange(&items, &spacing());
        // person has the lower rank, so it takes the first cell
        assert!(positions[1].x < positions[0].x);
    }

    #[test]
    fn test_packed_size_matches_arrangement() {
        let items: Vec<_> = (0..4)
            .map(|i| item(&format!("c{i}"), NodeKind::CONTAINER, 120.0, 60.0))
            .collect();
        let positions = arrange(&items, &spacing());
        let sizes: Vec<Vec2> = items.iter().map(|i| i.size).collect();
        let packed = packed_size(&sizes, 80.0, 100.0);
        let extent = crate::algorithms::extent(&positions, &items);
        assert!((packed.x - extent.x).abs() < 1e-3);
        assert!((packed.y - extent.y).abs() < 1e-3);
    }
}
