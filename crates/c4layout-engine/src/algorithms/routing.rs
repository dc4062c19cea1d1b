//! Port selection and path routing for relationships.
//!
//! Sides are chosen per edge by travel distance plus a load penalty so one
//! side of a busy node does not collect every connector. Ports on a side are
//! then spread along it in the order of the nodes they lead to. Orthogonal
//! paths are picked from a small set of elbow candidates scored by obstacle
//! hits, crossings with already routed edges, length and bends.

use crate::context::{ancestors, subtree};
use crate::model::{LayoutEdge, LayoutNode, Port, PortSide, SegmentType};
use crate::options::EdgeRoutingOptions;
use crate::spatial::QuadTree;
use c4layout_core::geometry::{EPSILON, polyline_length, segment_hits_rect, segments_cross};
use c4layout_core::{EdgeId, NodeId, Rect, RouteKind, Vec2};
use std::collections::{BTreeMap, BTreeSet};

/// Control points never reach further than this from their anchor.
pub const MAX_CONTROL_LEN: f32 = 260.0;

const HIT_PENALTY: f32 = 10_000.0;
const CROSSING_PENALTY: f32 = 400.0;
const BEND_PENALTY: f32 = 20.0;

/// A cubic bezier curve segment defined by four control points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub start: Vec2,
    pub control1: Vec2,
    pub control2: Vec2,
    pub end: Vec2,
}

impl CubicBezier {
    /// Sample the curve at parameter t [0, 1]
    pub fn sample(&self, t: f32) -> Vec2 {
        let mt = 1.0 - t;
        self.start * (mt * mt * mt)
            + self.control1 * (3.0 * mt * mt * t)
            + self.control2 * (3.0 * mt * t * t)
            + self.end * (t * t * t)
    }
}

fn side_slot(side: PortSide) -> usize {
    match side {
        PortSide::Top => 0,
        PortSide::Bottom => 1,
        PortSide::Left => 2,
        PortSide::Right => 3,
    }
}

/// Drop repeated points and interior points on a straight run.
pub fn compress_path(points: &[Vec2]) -> Vec<Vec2> {
    let mut out: Vec<Vec2> = Vec::with_capacity(points.len());
    for &point in points {
        if out.last().is_some_and(|last: &Vec2| last.approx_eq(point)) {
            continue;
        }
        if out.len() >= 2 {
            let prev = out[out.len() - 2];
            let curr = out[out.len() - 1];
            let vertical =
                (prev.x - curr.x).abs() <= EPSILON && (curr.x - point.x).abs() <= EPSILON;
            let horizontal =
                (prev.y - curr.y).abs() <= EPSILON && (curr.y - point.y).abs() <= EPSILON;
            if vertical || horizontal {
                out.pop();
            }
        }
        out.push(point);
    }
    if out.len() == 1 {
        out.push(out[0]);
    }
    out
}

pub fn bend_count(points: &[Vec2]) -> usize {
    points
        .windows(3)
        .filter(|w| SegmentType::between(w[0], w[1]) != SegmentType::between(w[1], w[2]))
        .count()
}

/// Split every orthogonal corner into two points joined by an arc.
pub fn round_corners(
    points: &[Vec2],
    types: &[SegmentType],
    radius: f32,
) -> (Vec<Vec2>, Vec<SegmentType>) {
    if points.len() < 3 || radius <= EPSILON || types.len() + 1 != points.len() {
        return (points.to_vec(), types.to_vec());
    }

    let mut out_points = vec![points[0]];
    let mut out_types = Vec::with_capacity(types.len() * 2);
    for i in 1..points.len() - 1 {
        let (q, p, r) = (points[i - 1], points[i], points[i + 1]);
        let (len_in, len_out) = (q.distance(p), p.distance(r));
        let corner = types[i - 1] != types[i]
            && matches!(types[i - 1], SegmentType::Horizontal | SegmentType::Vertical)
            && matches!(types[i], SegmentType::Horizontal | SegmentType::Vertical);
        let rr = radius.min(len_in * 0.5).min(len_out * 0.5);

        if !corner || rr <= EPSILON {
            out_points.push(p);
            out_types.push(types[i - 1]);
            continue;
        }

        let d_in = (p - q) * (1.0 / len_in);
        let d_out = (r - p) * (1.0 / len_out);
        out_points.push(p - d_in * rr);
        out_types.push(types[i - 1]);
        out_points.push(p + d_out * rr);
        out_types.push(SegmentType::Arc);
    }
    out_points.push(points[points.len() - 1]);
    out_types.push(types[types.len() - 1]);
    (out_points, out_types)
}

/// Number of `others` whose path crosses `points`.
fn crossings_with(
    points: &[Vec2],
    edge: &LayoutEdge,
    others: &BTreeMap<EdgeId, LayoutEdge>,
) -> usize {
    others
        .values()
        .filter(|other| other.id != edge.id && other.is_routed())
        .filter(|other| {
            !(other.source == edge.source
                || other.source == edge.target
                || other.target == edge.source
                || other.target == edge.target)
        })
        .filter(|other| {
            points.windows(2).any(|a| {
                other
                    .points
                    .windows(2)
                    .any(|b| segments_cross(a[0], a[1], b[0], b[1]))
            })
        })
        .count()
}

struct Route {
    points: Vec<Vec2>,
    segment_types: Vec<SegmentType>,
    control_points: Vec<Vec2>,
}

pub struct EdgeRouter<'a> {
    nodes: &'a BTreeMap<NodeId, LayoutNode>,
    spatial: &'a QuadTree,
    options: &'a EdgeRoutingOptions,
    use_index: bool,
}

impl<'a> EdgeRouter<'a> {
    pub fn new(
        nodes: &'a BTreeMap<NodeId, LayoutNode>,
        spatial: &'a QuadTree,
        options: &'a EdgeRoutingOptions,
    ) -> Self {
        Self {
            nodes,
            spatial,
            options,
            use_index: true,
        }
    }

    /// Scan every node for obstacles instead of querying the quadtree.
    pub fn with_spatial_index(mut self, enabled: bool) -> Self {
        self.use_index = enabled;
        self
    }

    fn rect(&self, id: &NodeId) -> Rect {
        self.nodes.get(id).map(|node| node.bbox).unwrap_or(Rect::NOTHING)
    }

    /// Route every edge from scratch.
    pub fn route_all(&self, edges: &mut BTreeMap<EdgeId, LayoutEdge>) {
        for edge in edges.values_mut() {
            edge.points.clear();
            edge.segment_types.clear();
            edge.control_points.clear();
            edge.bundle = None;
        }

        self.assign_ports(edges);

        let ids: Vec<EdgeId> = edges.keys().cloned().collect();
        for id in &ids {
            let Some(edge) = edges.get(id) else {
                continue;
            };
            let route = self.route_edge(edge, edges, self.options.minimize_crossings);
            if let Some(edge) = edges.get_mut(id) {
                apply(edge, route);
            }
        }

        if self.options.minimize_crossings {
            self.reduce_crossings(edges);
        }
        if self.options.bundling {
            bundle_edges(edges, self.options.bundle_threshold);
        }
        if self.options.rounded_corners {
            for edge in edges.values_mut() {
                if edge.route == RouteKind::Orthogonal {
                    let radius = self.options.corner_radius;
                    let (points, types) = round_corners(&edge.points, &edge.segment_types, radius);
                    edge.points = points;
                    edge.segment_types = types;
                }
            }
        }
        for edge in edges.values_mut() {
            edge.recompute_metrics();
        }
    }

    fn choose_sides(
        &self,
        edge: &LayoutEdge,
        loads: &BTreeMap<NodeId, [usize; 4]>,
    ) -> (PortSide, PortSide) {
        let source = self.rect(&edge.source);
        let target = self.rect(&edge.target);
        let facing = |rect: &Rect, other: &Rect| -> Vec<PortSide> {
            let toward = other.center() - rect.center();
            let sides: Vec<PortSide> = PortSide::ALL
                .into_iter()
                .filter(|side| {
                    let n = side.normal();
                    n.x * toward.x + n.y * toward.y > EPSILON
                })
                .collect();
            if sides.is_empty() {
                PortSide::ALL.to_vec()
            } else {
                sides
            }
        };
        let load = |id: &NodeId, side: PortSide| -> usize {
            loads.get(id).map(|slots| slots[side_slot(side)]).unwrap_or(0)
        };

        let mut best = (PortSide::Right, PortSide::Left);
        let mut best_cost = f32::INFINITY;
        for s in facing(&source, &target) {
            for t in facing(&target, &source) {
                let travel = s.point_on(&source, 0.5).manhattan(t.point_on(&target, 0.5));
                let balance = self.options.port_balance_weight
                    * (load(&edge.source, s) + load(&edge.target, t)) as f32;
                let cost = travel + balance;
                if cost < best_cost - EPSILON {
                    best_cost = cost;
                    best = (s, t);
                }
            }
        }
        best
    }

    /// Choose sides for every edge, then spread the ports of each side.
    pub fn assign_ports(&self, edges: &mut BTreeMap<EdgeId, LayoutEdge>) {
        let mut loads: BTreeMap<NodeId, [usize; 4]> = BTreeMap::new();
        let mut sides: BTreeMap<EdgeId, (PortSide, PortSide)> = BTreeMap::new();
        for edge in edges.values() {
            let (s, t) = self.choose_sides(edge, &loads);
            loads.entry(edge.source.clone()).or_insert([0; 4])[side_slot(s)] += 1;
            loads.entry(edge.target.clone()).or_insert([0; 4])[side_slot(t)] += 1;
            sides.insert(edge.id.clone(), (s, t));
        }

        // (node, side) -> [(sort key, edge, is_source)]
        let mut groups: BTreeMap<(NodeId, PortSide), Vec<(f32, EdgeId, bool)>> = BTreeMap::new();
        for edge in edges.values() {
            let Some(&(s, t)) = sides.get(&edge.id) else {
                continue;
            };
            for (node, side, other, is_source) in [
                (&edge.source, s, &edge.target, true),
                (&edge.target, t, &edge.source, false),
            ] {
                let center = self.rect(other).center();
                let key = if side.is_horizontal() { center.y } else { center.x };
                groups
                    .entry((node.clone(), side))
                    .or_default()
                    .push((key, edge.id.clone(), is_source));
            }
        }

        for ((node, side), mut members) in groups {
            members.sort_by(|a, b| {
                a.0.total_cmp(&b.0)
                    .then_with(|| a.1.cmp(&b.1))
                    .then(b.2.cmp(&a.2))
            });
            let rect = self.rect(&node);
            let count = members.len();
            for (index, (_, edge_id, is_source)) in members.into_iter().enumerate() {
                let t = (index + 1) as f32 / (count + 1) as f32;
                let port = Port {
                    id: format!("{}-{}-{}", node, side.as_str(), index),
                    side,
                    position: side.point_on(&rect, t),
                    edge: edge_id.clone(),
                };
                if let Some(edge) = edges.get_mut(&edge_id) {
                    if is_source {
                        edge.source_port = Some(port);
                    } else {
                        edge.target_port = Some(port);
                    }
                }
            }
        }
    }

    fn route_edge(
        &self,
        edge: &LayoutEdge,
        routed: &BTreeMap<EdgeId, LayoutEdge>,
        avoid_crossings: bool,
    ) -> Route {
        let (Some(sp), Some(tp)) = (&edge.source_port, &edge.target_port) else {
            let a = self.rect(&edge.source).center();
            let b = self.rect(&edge.target).center();
            return Route {
                points: vec![a, b],
                segment_types: vec![SegmentType::Line],
                control_points: Vec::new(),
            };
        };

        match edge.route {
            RouteKind::Direct => Route {
                points: vec![sp.position, tp.position],
                segment_types: vec![SegmentType::Line],
                control_points: Vec::new(),
            },
            RouteKind::Curved => {
                let curve = self.calculate_curve(sp, tp);
                Route {
                    points: vec![curve.start, curve.end],
                    segment_types: vec![SegmentType::Curve],
                    control_points: vec![curve.control1, curve.control2],
                }
            }
            RouteKind::Orthogonal => {
                let points = self.route_orthogonal(edge, sp, tp, routed, avoid_crossings);
                let segment_types = points
                    .windows(2)
                    .map(|w| SegmentType::between(w[0], w[1]))
                    .collect();
                Route {
                    points,
                    segment_types,
                    control_points: Vec::new(),
                }
            }
        }
    }

    fn calculate_curve(&self, sp: &Port, tp: &Port) -> CubicBezier {
        let (start, end) = (sp.position, tp.position);
        let delta = end - start;
        let primary_dist = delta.x.abs().max(delta.y.abs() * 0.5);
        let control_dist = primary_dist * self.options.curvature;
        let margin = self.options.port_stub;

        let mut curve_len = if primary_dist < margin * 2.0 {
            // close nodes: short handles avoid loops
            control_dist
        } else {
            control_dist.max(margin)
        };
        curve_len = if curve_len.is_finite() {
            curve_len.min(MAX_CONTROL_LEN)
        } else {
            margin.min(MAX_CONTROL_LEN)
        };
        // a zero handle would collapse the curve onto its chord
        curve_len = curve_len.max(EPSILON * 10.0);

        CubicBezier {
            start,
            control1: start + sp.side.normal() * curve_len,
            control2: end + tp.side.normal() * curve_len,
            end,
        }
    }

    /// Ids that never count as obstacles for this edge.
    fn excluded(&self, edge: &LayoutEdge) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        for endpoint in [&edge.source, &edge.target] {
            out.extend(subtree(self.nodes, endpoint));
            out.extend(ancestors(self.nodes, endpoint));
        }
        out
    }

    fn obstacles_in(&self, area: &Rect, excluded: &BTreeSet<NodeId>) -> Vec<Rect> {
        if self.use_index {
            self.spatial
                .query(area)
                .into_iter()
                .filter(|id| !excluded.contains(id))
                .filter_map(|id| self.nodes.get(&id).map(|node| node.bbox))
                .collect()
        } else {
            self.nodes
                .values()
                .filter(|node| node.visible && !excluded.contains(&node.id))
                .filter(|node| node.bbox.intersects(area))
                .map(|node| node.bbox)
                .collect()
        }
    }

    fn route_orthogonal(
        &self,
        edge: &LayoutEdge,
        sp: &Port,
        tp: &Port,
        routed: &BTreeMap<EdgeId, LayoutEdge>,
        avoid_crossings: bool,
    ) -> Vec<Vec2> {
        let stub = self.options.port_stub;
        let margin = self.options.obstacle_margin;
        let a = sp.position + sp.side.normal() * stub;
        let b = tp.position + tp.side.normal() * stub;

        let excluded = self.excluded(edge);
        let source_rect = self.rect(&edge.source);
        let target_rect = self.rect(&edge.target);
        let nested = crate::context::related(self.nodes, &edge.source, &edge.target);

        let window = Rect::from_min_max(
            Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        )
        .expand(stub + margin);
        let nearby = self.obstacles_in(&window, &excluded);

        let mut xs = vec![(a.x + b.x) * 0.5];
        let mut ys = vec![(a.y + b.y) * 0.5];
        for rect in nearby.iter().chain([&source_rect, &target_rect]) {
            xs.extend([rect.min.x - margin, rect.max.x + margin]);
            ys.extend([rect.min.y - margin, rect.max.y + margin]);
        }

        let mut middles: Vec<Vec<Vec2>> =
            vec![vec![Vec2::new(b.x, a.y)], vec![Vec2::new(a.x, b.y)]];
        middles.extend(xs.iter().map(|&x| vec![Vec2::new(x, a.y), Vec2::new(x, b.y)]));
        middles.extend(ys.iter().map(|&y| vec![Vec2::new(a.x, y), Vec2::new(b.x, y)]));

        let mut best: Option<(f32, Vec<Vec2>)> = None;
        for middle in middles {
            let mut raw = Vec::with_capacity(middle.len() + 4);
            raw.push(sp.position);
            raw.push(a);
            raw.extend(middle);
            raw.push(b);
            raw.push(tp.position);
            let path = compress_path(&raw);

            let bounds = path
                .iter()
                .fold(Rect::from_min_max(path[0], path[0]), |acc, p| {
                    acc.union(&Rect::from_min_max(*p, *p))
                });
            let mut obstacles = self.obstacles_in(&bounds, &excluded);
            if !nested {
                obstacles.push(source_rect);
                obstacles.push(target_rect);
            }

            let hits = path
                .windows(2)
                .map(|w| {
                    obstacles
                        .iter()
                        .filter(|rect| segment_hits_rect(w[0], w[1], rect))
                        .count()
                })
                .sum::<usize>();
            let crossings = if avoid_crossings {
                crossings_with(&path, edge, routed)
            } else {
                0
            };
            let score = hits as f32 * HIT_PENALTY
                + crossings as f32 * CROSSING_PENALTY
                + polyline_length(&path)
                + bend_count(&path) as f32 * BEND_PENALTY;

            if best.as_ref().is_none_or(|(current, _)| score < *current - EPSILON) {
                best = Some((score, path));
            }
        }

        best.map(|(_, path)| path)
            .unwrap_or_else(|| vec![sp.position, tp.position])
    }

    /// Re-route orthogonal edges that cross others while that strictly lowers their crossings.
    fn reduce_crossings(&self, edges: &mut BTreeMap<EdgeId, LayoutEdge>) {
        for pass in 0..self.options.crossing_passes {
            let crossing = crate::analysis::edge_crossings(edges);
            if crossing.is_empty() {
                break;
            }
            let involved: BTreeSet<EdgeId> = crossing
                .into_iter()
                .flat_map(|(a, b)| [a, b])
                .collect();

            let mut improved = false;
            for id in involved {
                let Some(edge) = edges.get(&id) else {
                    continue;
                };
                if edge.route != RouteKind::Orthogonal {
                    continue;
                }
                let before = crossings_with(&edge.points, edge, edges);
                let route = self.route_edge(edge, edges, true);
                let after = crossings_with(&route.points, edge, edges);
                if after < before {
                    if let Some(edge) = edges.get_mut(&id) {
                        apply(edge, route);
                        improved = true;
                    }
                }
            }

            tracing::debug!(pass, improved, "crossing reduction pass");
            if !improved {
                break;
            }
        }
    }
}

fn apply(edge: &mut LayoutEdge, route: Route) {
    edge.points = route.points;
    edge.segment_types = route.segment_types;
    edge.control_points = route.control_points;
}

/// Give edges that join the same two nodes one shared route once a group reaches `threshold`.
///
/// Direction does not split a group: members running against the leader get
/// its path reversed and its ports swapped. Returns the number of bundles formed.
pub fn bundle_edges(edges: &mut BTreeMap<EdgeId, LayoutEdge>, threshold: usize) -> usize {
    let mut groups: BTreeMap<(NodeId, NodeId), Vec<EdgeId>> = BTreeMap::new();
    for edge in edges.values() {
        let key = if edge.source <= edge.target {
            (edge.source.clone(), edge.target.clone())
        } else {
            (edge.target.clone(), edge.source.clone())
        };
        groups.entry(key).or_default().push(edge.id.clone());
    }

    let mut bundle = 0;
    for members in groups.into_values() {
        if members.len() < threshold.max(2) {
            continue;
        }
        let Some(leader) = edges.get(&members[0]).cloned() else {
            continue;
        };
        for id in &members {
            let Some(edge) = edges.get_mut(id) else {
                continue;
            };
            edge.route = leader.route;
            edge.points = leader.points.clone();
            edge.segment_types = leader.segment_types.clone();
            edge.control_points = leader.control_points.clone();
            edge.source_port = leader.source_port.clone();
            edge.target_port = leader.target_port.clone();
            if edge.source != leader.source {
                edge.points.reverse();
                edge.segment_types.reverse();
                edge.control_points.reverse();
                std::mem::swap(&mut edge.source_port, &mut edge.target_port);
            }
            for port in [&mut edge.source_port, &mut edge.target_port].into_iter().flatten() {
                port.edge = id.clone();
            }
            edge.bundle = Some(bundle);
        }
        bundle += 1;
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use c4layout_core::{C4Node, C4Relationship, NodeKind};
    use proptest::prelude::*;

    fn node(id: &str, x: f32, y: f32) -> LayoutNode {
        let mut node = LayoutNode::new(C4Node::new(id, NodeKind::CONTAINER, id));
        node.bbox = Rect::from_pos_size(Vec2::new(x, y), Vec2::new(120.0, 80.0));
        node
    }

    fn setup(nodes: Vec<LayoutNode>) -> (BTreeMap<NodeId, LayoutNode>, QuadTree) {
        let map: BTreeMap<NodeId, LayoutNode> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let tree = QuadTree::from_rects(map.values().map(|n| (n.id.clone(), n.bbox)));
        (map, tree)
    }

    fn edge(id: &str, from: &str, to: &str, route: Option<RouteKind>) -> LayoutEdge {
        let mut rel = C4Relationship::new(id, from, to);
        rel.preferred_route = route;
        LayoutEdge::new(rel, NodeId::new(from), NodeId::new(to))
    }

    fn edges(list: Vec<LayoutEdge>) -> BTreeMap<EdgeId, LayoutEdge> {
        list.into_iter().map(|e| (e.id.clone(), e)).collect()
    }

    #[test]
    fn test_direct_route_has_two_points() {
        let (nodes, tree) = setup(vec![node("a", 0.0, 0.0), node("b", 400.0, 300.0)]);
        let options = EdgeRoutingOptions::default();
        let mut map = edges(vec![edge("e", "a", "b", Some(RouteKind::Direct))]);
        EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

        let e = &map[&EdgeId::new("e")];
        assert_eq!(e.points.len(), 2);
        assert_eq!(e.segment_types, vec![SegmentType::Line]);
        assert_eq!(e.bend_count, 0);
    }

    #[test]
    fn test_orthogonal_diagonal_route_bends() {
        let (nodes, tree) = setup(vec![node("a", 0.0, 0.0), node("b", 400.0, 300.0)]);
        let options = EdgeRoutingOptions::default();
        let mut map = edges(vec![edge("e", "a", "b", None)]);
        EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

        let e = &map[&EdgeId::new("e")];
        assert!(e.points.len() > 2);
        assert_eq!(e.segment_types.len(), e.points.len() - 1);
        assert!(e.bend_count >= 1);
        for t in &e.segment_types {
            assert!(matches!(t, SegmentType::Horizontal | SegmentType::Vertical));
        }
    }

    #[test]
    fn test_orthogonal_route_avoids_obstacle() {
        let (nodes, tree) = setup(vec![
            node("a", 0.0, 0.0),
            node("wall", 250.0, 0.0),
            node("b", 500.0, 0.0),
        ]);
        let options = EdgeRoutingOptions::default();
        let mut map = edges(vec![edge("e", "a", "b", None)]);
        EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

        let wall = nodes[&NodeId::new("wall")].bbox;
        let e = &map[&EdgeId::new("e")];
        for w in e.points.windows(2) {
            assert!(
                !segment_hits_rect(w[0], w[1], &wall),
                "route cuts through obstacle: {:?}",
                e.points
            );
        }
    }

    #[test]
    fn test_curved_route_has_control_points() {
        let (nodes, tree) = setup(vec![node("a", 0.0, 0.0), node("b", 400.0, 300.0)]);
        let options = EdgeRoutingOptions::default();
        let mut map = edges(vec![edge("e", "a", "b", Some(RouteKind::Curved))]);
        EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

        let e = &map[&EdgeId::new("e")];
        assert_eq!(e.control_points.len(), 2);
        assert_eq!(e.segment_types, vec![SegmentType::Curve]);
        for c in &e.control_points {
            assert!(c.distance(e.points[0]).min(c.distance(e.points[1])) <= MAX_CONTROL_LEN + 1e-3);
        }
    }

    #[test]
    fn test_ports_balance_across_sides() {
        let mut list = vec![node("hub", 0.0, 0.0)];
        for i in 0..6 {
            list.push(node(&format!("leaf{i}"), 400.0, -300.0 + i as f32 * 120.0));
        }
        let (nodes, tree) = setup(list);
        let options = EdgeRoutingOptions::default();
        let mut map = edges(
            (0..6)
                .map(|i| edge(&format!("e{i}"), "hub", &format!("leaf{i}"), None))
                .collect(),
        );
        EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

        let usage = crate::analysis::port_usage(&map);
        let hub = &usage[&NodeId::new("hub")];
        assert!(hub.len() > 1, "all ports on one side: {hub:?}");

        // ports on one side never coincide
        let mut seen: Vec<Vec2> = Vec::new();
        for e in map.values() {
            let p = e.source_port.as_ref().map(|p| p.position).unwrap_or(Vec2::ZERO);
            assert!(seen.iter().all(|q| !q.approx_eq(p)));
            seen.push(p);
        }
    }

    #[test]
    fn test_bundling_shares_route() {
        let (nodes, tree) = setup(vec![node("a", 0.0, 0.0), node("b", 400.0, 300.0)]);
        let options = EdgeRoutingOptions {
            bundling: true,
            ..EdgeRoutingOptions::default()
        };
        let mut map = edges((0..3).map(|i| edge(&format!("e{i}"), "a", "b", None)).collect());
        EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

        let first = map[&EdgeId::new("e0")].points.clone();
        for e in map.values() {
            assert_eq!(e.bundle, Some(0));
            assert_eq!(e.points, first);
        }
    }

    #[test]
    fn test_bundling_joins_opposite_directions() {
        let (nodes, tree) = setup(vec![node("a", 0.0, 0.0), node("b", 400.0, 300.0)]);
        let options = EdgeRoutingOptions {
            bundling: true,
            ..EdgeRoutingOptions::default()
        };
        let mut map = edges(vec![
            edge("e0", "a", "b", None),
            edge("e1", "a", "b", None),
            edge("e2", "b", "a", None),
        ]);
        EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

        let leader = map[&EdgeId::new("e0")].clone();
        let back = &map[&EdgeId::new("e2")];
        assert!(map.values().all(|e| e.bundle == Some(0)));
        assert_eq!(map[&EdgeId::new("e1")].points, leader.points);

        let mut reversed = leader.points.clone();
        reversed.reverse();
        assert_eq!(back.points, reversed);
        assert_eq!(back.segment_types.len(), back.points.len() - 1);
        let port = |p: &Option<Port>| p.as_ref().map(|p| p.position);
        assert_eq!(port(&back.source_port), port(&leader.target_port));
        assert_eq!(port(&back.target_port), port(&leader.source_port));
        assert_eq!(back.source_port.as_ref().map(|p| &p.edge), Some(&back.id));
    }

    #[test]
    fn test_bundling_waits_for_the_threshold() {
        let mut map = edges(vec![edge("e0", "a", "b", None), edge("e1", "b", "a", None)]);
        assert_eq!(bundle_edges(&mut map, 3), 0);
        assert!(map.values().all(|e| e.bundle.is_none()));
        assert_eq!(bundle_edges(&mut map, 2), 1);
        assert!(map.values().all(|e| e.bundle == Some(0)));
    }

    #[test]
    fn test_crossing_reduction_reroutes_a_detour() {
        let (nodes, tree) = setup(vec![
            node("a", 0.0, 0.0),
            node("b", 400.0, 0.0),
            node("c", 0.0, 400.0),
            node("d", 400.0, 400.0),
        ]);
        let detour = vec![
            Vec2::new(120.0, 40.0),
            Vec2::new(200.0, 40.0),
            Vec2::new(200.0, 600.0),
            Vec2::new(300.0, 600.0),
            Vec2::new(300.0, 40.0),
            Vec2::new(400.0, 40.0),
        ];
        let crossed = |crossing_passes: usize| {
            let options = EdgeRoutingOptions {
                crossing_passes,
                ..EdgeRoutingOptions::default()
            };
            let router = EdgeRouter::new(&nodes, &tree, &options);
            let mut map = edges(vec![edge("ab", "a", "b", None), edge("cd", "c", "d", None)]);
            router.route_all(&mut map);
            assert!(crate::analysis::edge_crossings(&map).is_empty());

            // drag a-b down through c-d
            if let Some(ab) = map.get_mut(&EdgeId::new("ab")) {
                ab.segment_types = detour
                    .windows(2)
                    .map(|w| SegmentType::between(w[0], w[1]))
                    .collect();
                ab.points = detour.clone();
            }
            assert_eq!(crate::analysis::edge_crossings(&map).len(), 1);

            router.reduce_crossings(&mut map);
            crate::analysis::edge_crossings(&map).len()
        };

        assert_eq!(crossed(4), 0);
        assert_eq!(crossed(0), 1);
    }

    #[test]
    fn test_obstacle_scan_without_index() {
        let (nodes, _) = setup(vec![
            node("a", 0.0, 0.0),
            node("wall", 250.0, 0.0),
            node("b", 500.0, 0.0),
        ]);
        let wall = nodes[&NodeId::new("wall")].bbox;
        let options = EdgeRoutingOptions::default();
        let empty = QuadTree::default();
        let hits = |use_index: bool| {
            let mut map = edges(vec![edge("e", "a", "b", None)]);
            EdgeRouter::new(&nodes, &empty, &options)
                .with_spatial_index(use_index)
                .route_all(&mut map);
            let e = &map[&EdgeId::new("e")];
            e.points.windows(2).filter(|w| segment_hits_rect(w[0], w[1], &wall)).count()
        };

        // the scan finds the wall even though the index is empty
        assert_eq!(hits(false), 0);
        assert!(hits(true) > 0);
    }

    #[test]
    fn test_round_corners_keeps_segment_invariant() {
        let points = vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0)];
        let types = vec![SegmentType::Horizontal, SegmentType::Vertical];
        let (p, t) = round_corners(&points, &types, 8.0);
        assert_eq!(p.len(), 4);
        assert_eq!(t, vec![SegmentType::Horizontal, SegmentType::Arc, SegmentType::Vertical]);
        assert_eq!(p[1], Vec2::new(92.0, 0.0));
        assert_eq!(p[2], Vec2::new(100.0, 8.0));
    }

    #[test]
    fn test_compress_path() {
        let raw = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(50.0, 0.0),
            Vec2::new(50.0, 40.0),
        ];
        assert_eq!(
            compress_path(&raw),
            vec![Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0), Vec2::new(50.0, 40.0)]
        );
        assert_eq!(compress_path(&[Vec2::ZERO]).len(), 2);
    }

    proptest! {
        #[test]
        fn prop_routes_keep_segment_count(
            bx in -600.0f32..600.0, by in -600.0f32..600.0,
            kind in 0usize..3,
        ) {
            let b_rect = Rect::from_pos_size(Vec2::new(bx, by), Vec2::new(120.0, 80.0));
            let a_rect = Rect::from_pos_size(Vec2::ZERO, Vec2::new(120.0, 80.0));
            prop_assume!(!a_rect.intersects(&b_rect.expand(20.0)));

            let (nodes, tree) = setup(vec![node("a", 0.0, 0.0), node("b", bx, by)]);
            let route = [RouteKind::Direct, RouteKind::Orthogonal, RouteKind::Curved][kind];
            let options = EdgeRoutingOptions {
                rounded_corners: kind == 1,
                ..EdgeRoutingOptions::default()
            };
            let mut map = edges(vec![edge("e", "a", "b", Some(route))]);
            EdgeRouter::new(&nodes, &tree, &options).route_all(&mut map);

            let e = &map[&EdgeId::new("e")];
            prop_assert!(e.points.len() >= 2);
            prop_assert_eq!(e.segment_types.len(), e.points.len() - 1);
            if route == RouteKind::Direct {
                prop_assert_eq!(e.points.len(), 2);
            }
        }
    }
}
