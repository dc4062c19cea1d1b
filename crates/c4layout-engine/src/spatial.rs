//! Quadtree over node bounding boxes.
//!
//! Used by routing (obstacle lookup) and the overlap passes (neighbour lookup).
//! Query results are returned sorted by id so callers stay deterministic.

use c4layout_core::{NodeId, Rect, Vec2};
use std::collections::BTreeMap;

const DEFAULT_MAX_ITEMS: usize = 8;
const DEFAULT_MAX_DEPTH: usize = 8;
const DEFAULT_EXTENT: f32 = 1024.0;

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: Rect,
    depth: usize,
    items: Vec<(NodeId, Rect)>,
    children: Option<Box<[QuadNode; 4]>>,
}

impl QuadNode {
    fn new(bounds: Rect, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn child_for(&self, rect: &Rect) -> Option<usize> {
        let children = self.children.as_ref()?;
        children
            .iter()
            .position(|child| child.bounds.contains_rect(rect))
    }

    fn split(&mut self) {
        let c = self.bounds.center();
        let (min, max) = (self.bounds.min, self.bounds.max);
        let depth = self.depth + 1;
        self.children = Some(Box::new([
            QuadNode::new(Rect::from_min_max(min, c), depth),
            QuadNode::new(
                Rect::from_min_max(Vec2::new(c.x, min.y), Vec2::new(max.x, c.y)),
                depth,
            ),
            QuadNode::new(
                Rect::from_min_max(Vec2::new(min.x, c.y), Vec2::new(c.x, max.y)),
                depth,
            ),
            QuadNode::new(Rect::from_min_max(c, max), depth),
        ]));

        let items = std::mem::take(&mut self.items);
        for (id, rect) in items {
            self.insert(id, rect, usize::MAX, 0);
        }
    }

    fn insert(&mut self, id: NodeId, rect: Rect, max_items: usize, max_depth: usize) {
        if let Some(index) = self.child_for(&rect)
            && let Some(children) = self.children.as_mut()
        {
            children[index].insert(id, rect, max_items, max_depth);
            return;
        }

        self.items.push((id, rect));

        if self.children.is_none() && self.items.len() > max_items && self.depth < max_depth {
            self.split();
        }
    }

    fn remove(&mut self, id: &NodeId, rect: &Rect) -> bool {
        if let Some(index) = self.child_for(rect)
            && let Some(children) = self.children.as_mut()
            && children[index].remove(id, rect)
        {
            return true;
        }

        if let Some(pos) = self.items.iter().position(|(item, _)| item == id) {
            self.items.swap_remove(pos);
            return true;
        }
        false
    }

    fn query(&self, area: &Rect, out: &mut Vec<NodeId>) {
        if !self.bounds.intersects(area) {
            return;
        }
        for (id, rect) in &self.items {
            if rect.intersects(area) {
                out.push(id.clone());
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(area, out);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadTree {
    root: QuadNode,
    entries: BTreeMap<NodeId, Rect>,
    max_items: usize,
    max_depth: usize,
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new(Rect::from_min_max(
            Vec2::new(-DEFAULT_EXTENT, -DEFAULT_EXTENT),
            Vec2::new(DEFAULT_EXTENT, DEFAULT_EXTENT),
        ))
    }
}

impl QuadTree {
    pub fn new(bounds: Rect) -> Self {
        Self {
            root: QuadNode::new(bounds, 0),
            entries: BTreeMap::new(),
            max_items: DEFAULT_MAX_ITEMS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Build a tree sized to fit every rectangle.
    pub fn from_rects(items: impl IntoIterator<Item = (NodeId, Rect)>) -> Self {
        let entries: BTreeMap<NodeId, Rect> = items.into_iter().collect();
        let bounds = Rect::bounding(entries.values())
            .map(|b| b.expand(1.0))
            .unwrap_or(QuadTree::default().root.bounds);
        let mut tree = Self::new(bounds);
        for (id, rect) in entries {
            tree.insert(id, rect);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bounds(&self) -> Rect {
        self.root.bounds
    }

    pub fn get(&self, id: &NodeId) -> Option<Rect> {
        self.entries.get(id).copied()
    }

    pub fn clear(&mut self) {
        let bounds = self.root.bounds;
        self.root = QuadNode::new(bounds, 0);
        self.entries.clear();
    }

    /// Insert or move an entry.
    pub fn insert(&mut self, id: NodeId, rect: Rect) {
        self.remove(&id);

        if !self.root.bounds.contains_rect(&rect) {
            self.grow_to_fit(&rect);
        }

        self.root
            .insert(id.clone(), rect, self.max_items, self.max_depth);
        self.entries.insert(id, rect);
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Rect> {
        let rect = self.entries.remove(id)?;
        self.root.remove(id, &rect);
        Some(rect)
    }

    /// Ids of every entry whose box touches `area`, sorted by id.
    pub fn query(&self, area: &Rect) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.root.query(area, &mut out);
        out.sort();
        out.dedup();
        out
    }

    pub fn query_point(&self, point: Vec2) -> Vec<NodeId> {
        self.query(&Rect::from_min_max(point, point))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Rect)> {
        self.entries.iter()
    }

    fn grow_to_fit(&mut self, rect: &Rect) {
        let current = self.root.bounds;
        let mut bounds = current.union(rect);
        // Double the extent so repeated growth stays logarithmic.
        let grow = bounds.width().max(bounds.height()) * 0.5;
        bounds = bounds.expand(grow.max(1.0));

        let entries = std::mem::take(&mut self.entries);
        self.root = QuadNode::new(bounds, 0);
        for (id, r) in entries {
            self.root.insert(id.clone(), r, self.max_items, self.max_depth);
            self.entries.insert(id, r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::from_pos_size(Vec2::new(x, y), Vec2::new(w, h))
    }

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    #[test]
    fn test_query_returns_sorted_hits() {
        let mut tree = QuadTree::default();
        tree.insert(id("b"), rect(0.0, 0.0, 10.0, 10.0));
        tree.insert(id("a"), rect(5.0, 5.0, 10.0, 10.0));
        tree.insert(id("c"), rect(500.0, 500.0, 10.0, 10.0));

        let hits = tree.query(&rect(0.0, 0.0, 20.0, 20.0));
        assert_eq!(hits, vec![id("a"), id("b")]);
    }

    #[test]
    fn test_insert_outside_bounds_grows_tree() {
        let mut tree = QuadTree::new(rect(0.0, 0.0, 100.0, 100.0));
        tree.insert(id("far"), rect(5000.0, -3000.0, 50.0, 50.0));

        assert!(tree.bounds().contains_rect(&rect(5000.0, -3000.0, 50.0, 50.0)));
        assert_eq!(tree.query_point(Vec2::new(5010.0, -2990.0)), vec![id("far")]);
    }

    #[test]
    fn test_reinsert_moves_entry() {
        let mut tree = QuadTree::default();
        tree.insert(id("n"), rect(0.0, 0.0, 10.0, 10.0));
        tree.insert(id("n"), rect(200.0, 200.0, 10.0, 10.0));

        assert_eq!(tree.len(), 1);
        assert!(tree.query_point(Vec2::new(5.0, 5.0)).is_empty());
        assert_eq!(tree.query_point(Vec2::new(205.0, 205.0)), vec![id("n")]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut tree = QuadTree::default();
        for i in 0..40 {
            tree.insert(id(&format!("n{i:02}")), rect(i as f32 * 20.0, 0.0, 10.0, 10.0));
        }
        assert_eq!(tree.len(), 40);
        assert_eq!(tree.remove(&id("n03")), Some(rect(60.0, 0.0, 10.0, 10.0)));
        assert!(tree.query_point(Vec2::new(65.0, 5.0)).is_empty());

        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.query(&rect(-1000.0, -1000.0, 5000.0, 5000.0)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_query_matches_brute_force(
            boxes in proptest::collection::vec(
                (-800.0f32..800.0, -800.0f32..800.0, 1.0f32..120.0, 1.0f32..120.0),
                1..60,
            ),
            qx in -900.0f32..900.0, qy in -900.0f32..900.0,
            qw in 1.0f32..400.0, qh in 1.0f32..400.0,
        ) {
            let items: Vec<(NodeId, Rect)> = boxes
                .iter()
                .enumerate()
                .map(|(i, (x, y, w, h))| (NodeId::new(format!("n{i:03}")), rect(*x, *y, *w, *h)))
                .collect();
            let tree = QuadTree::from_rects(items.clone());
            let area = rect(qx, qy, qw, qh);

            let mut expected: Vec<NodeId> = items
                .iter()
                .filter(|(_, r)| r.intersects(&area))
                .map(|(id, _)| id.clone())
                .collect();
            expected.sort();

            prop_assert_eq!(tree.query(&area), expected);
        }
    }
}
