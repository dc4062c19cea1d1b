use c4layout_core::{NodeId, Rect, Vec2};
use c4layout_engine::QuadTree;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn grid_rects(count: usize) -> Vec<(NodeId, Rect)> {
    let columns = (count as f32).sqrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let x = (i % columns) as f32 * 250.0;
            let y = (i / columns) as f32 * 150.0;
            let rect = Rect::from_pos_size(Vec2::new(x, y), Vec2::new(200.0, 100.0));
            (NodeId::new(format!("n{i}")), rect)
        })
        .collect()
}

fn bench_build_1000(c: &mut Criterion) {
    let rects = grid_rects(1000);
    c.bench_function("quadtree_build_1000", |b| {
        b.iter(|| {
            let tree = QuadTree::from_rects(black_box(rects.clone()));
            black_box(tree.len());
        })
    });
}

fn bench_query_1000(c: &mut Criterion) {
    let tree = QuadTree::from_rects(grid_rects(1000));
    let area = Rect::from_pos_size(Vec2::new(1000.0, 1000.0), Vec2::new(600.0, 400.0));
    c.bench_function("quadtree_query_1000", |b| {
        b.iter(|| black_box(tree.query(black_box(&area))))
    });
}

criterion_group!(benches, bench_build_1000, bench_query_1000);
criterion_main!(benches);
