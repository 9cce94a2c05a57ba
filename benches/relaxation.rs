use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use photomap_overlay::config::{Config, LayoutConfig};
use photomap_overlay::layout::{
    AnchorNode, GeometryEngine, LabelNode, LayoutProblem, SpringRelaxation,
};
use photomap_overlay::map::ScreenPoint;
use photomap_overlay::{
    GeoCoord, ManualScheduler, MercatorMap, OverlayDeps, Photo, Scene, SyncController, render_svg,
};
use std::hint::black_box;

/// `pins` anchors spread over `clusters` tight groups, the way search
/// results bunch up around landmarks.
fn clustered_problem(pins: usize, clusters: usize, config: &LayoutConfig) -> LayoutProblem {
    let mut problem = LayoutProblem::with_capacity(pins);
    let clusters = clusters.max(1);
    for i in 0..pins {
        let cluster = i % clusters;
        let cx = 100.0 + (cluster % 4) as f64 * 220.0;
        let cy = 100.0 + (cluster / 4) as f64 * 180.0;
        let jitter = (i / clusters) as f64;
        let anchor = AnchorNode::at(ScreenPoint::new(
            cx + (jitter * 3.7) % 30.0,
            cy + (jitter * 5.3) % 30.0,
        ));
        let label = LabelNode::seeded(&anchor, config.callout_width, config.callout_height);
        problem.push_pair(anchor, label, 10.0 + (i % 16) as f64);
    }
    problem
}

fn relax_to_convergence(engine: &mut SpringRelaxation, mut problem: LayoutProblem) -> usize {
    let mut session = engine.create_session(&problem);
    let mut steps = 0;
    loop {
        steps += 1;
        let Ok(outcome) = engine.step(&mut session, &problem) else {
            return steps;
        };
        for (idx, at) in &outcome.positions {
            problem.labels[*idx].position = *at;
        }
        if outcome.converged {
            return steps;
        }
    }
}

fn bench_relaxation(c: &mut Criterion) {
    let mut group = c.benchmark_group("relaxation");
    let config = LayoutConfig::default();
    for (pins, clusters) in [(10, 2), (50, 5), (200, 8), (500, 12)] {
        let problem = clustered_problem(pins, clusters, &config);
        let mut engine = SpringRelaxation::new(config.clone());
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{pins}x{clusters}")),
            &problem,
            |b, problem| {
                b.iter(|| black_box(relax_to_convergence(&mut engine, problem.clone())));
            },
        );
    }
    group.finish();
}

fn bench_single_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("relaxation_step");
    let config = LayoutConfig::default();
    for pins in [50, 500] {
        let problem = clustered_problem(pins, 4, &config);
        let mut engine = SpringRelaxation::new(config.clone());
        group.bench_with_input(BenchmarkId::from_parameter(pins), &problem, |b, problem| {
            b.iter(|| {
                let mut session = engine.create_session(problem);
                black_box(engine.step(&mut session, black_box(problem)).ok());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    for count in [20usize, 100] {
        let photos: Vec<Photo> = (0..count)
            .map(|i| {
                Photo::located(
                    format!("photo-{i}"),
                    47.60 + (i % 10) as f64 * 0.002,
                    -122.33 + (i / 10) as f64 * 0.002,
                )
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &photos, |b, photos| {
            b.iter(|| {
                let mut config = Config::default();
                config.layout.separation_seed = Some(17);
                let mut ctl = SyncController::new(
                    OverlayDeps {
                        map: MercatorMap::new(GeoCoord::new(47.61, -122.32), 14.0, 1200.0, 800.0),
                        renderer: Scene::new(),
                        engine: SpringRelaxation::new(config.layout.clone()),
                        scheduler: ManualScheduler::new(),
                    },
                    config,
                );
                ctl.on_photo_set_changed(photos.clone(), true);
                ctl.run_pending(10_000);
                let svg = render_svg(ctl.renderer(), &ctl.config().render);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_relaxation, bench_single_step, bench_end_to_end
);
criterion_main!(benches);
