// Force-directed relaxation of callout positions around fixed pins.
// Springs pull each callout to its connector's target separation, callout
// boxes push each other apart, and foreign pins push callouts off them.

use super::{GeometryEngine, GeometryFailure, LabelIndex, LayoutProblem, StepOutcome};
use crate::config::LayoutConfig;
use crate::map::ScreenPoint;
use std::collections::{HashMap, HashSet};

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
const MIN_DISTANCE: f64 = 1e-9;
const MIN_GRID_CELL: f64 = 16.0;
const ENERGY_GAIN_RATIO: f64 = 0.95;

type Rect = (f64, f64, f64, f64);
type Force = (f64, f64);

/// Default [`GeometryEngine`]: damped spring/overlap relaxation with
/// SFDP-style adaptive step sizing.
#[derive(Debug, Clone)]
pub struct SpringRelaxation {
    config: LayoutConfig,
}

/// Per-session state of [`SpringRelaxation`].
#[derive(Debug, Clone)]
pub struct RelaxationState {
    step: f64,
    prev_energy: f64,
    iteration: usize,
}

impl RelaxationState {
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn step_size(&self) -> f64 {
        self.step
    }
}

impl Default for SpringRelaxation {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl SpringRelaxation {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    fn accumulate_springs(&self, problem: &LayoutProblem, forces: &mut [Force]) {
        for connector in &problem.connectors {
            let anchor = problem.anchors[connector.anchor].position;
            let label = problem.labels[connector.label].position;
            let dx = label.x - anchor.x;
            let dy = label.y - anchor.y;
            let dist = (dx * dx + dy * dy).sqrt();
            let (ux, uy) = if dist < MIN_DISTANCE {
                symmetry_direction(connector.label)
            } else {
                (dx / dist, dy / dist)
            };
            // Positive when stretched beyond the target separation.
            let stretch = dist - connector.separation;
            let f = -self.config.spring_strength * stretch;
            forces[connector.label].0 += f * ux;
            forces[connector.label].1 += f * uy;
        }
    }

    fn accumulate_overlaps(&self, problem: &LayoutProblem, forces: &mut [Force]) {
        let rects: Vec<Rect> = problem.labels.iter().map(label_rect).collect();
        let cell = self
            .config
            .callout_width
            .max(self.config.callout_height)
            .max(MIN_GRID_CELL);
        let grid = SpatialGrid::new(cell, &rects);

        for (i, rect) in rects.iter().enumerate() {
            let a = &problem.labels[i];
            for j in grid.query(rect) {
                if j <= i {
                    continue;
                }
                let b = &problem.labels[j];
                let dx = b.position.x - a.position.x;
                let dy = b.position.y - a.position.y;
                let overlap_x = (a.width + b.width) * 0.5 - dx.abs();
                let overlap_y = (a.height + b.height) * 0.5 - dy.abs();
                if overlap_x <= 0.0 || overlap_y <= 0.0 {
                    continue;
                }
                let (ux, uy) = if dx.abs() < MIN_DISTANCE && dy.abs() < MIN_DISTANCE {
                    symmetry_direction(j)
                } else if overlap_x <= overlap_y {
                    (dx.signum(), 0.0)
                } else {
                    (0.0, dy.signum())
                };
                let depth = overlap_x.min(overlap_y);
                let f = 0.5 * self.config.repulsion_strength * depth;
                forces[i].0 -= f * ux;
                forces[i].1 -= f * uy;
                forces[j].0 += f * ux;
                forces[j].1 += f * uy;
            }
        }
    }

    fn accumulate_pin_pushes(&self, problem: &LayoutProblem, forces: &mut [Force]) {
        let radius = self.config.pin_radius.max(0.0);
        let pins: Vec<Rect> = problem
            .anchors
            .iter()
            .map(|anchor| {
                (
                    anchor.position.x - radius,
                    anchor.position.y - radius,
                    radius * 2.0,
                    radius * 2.0,
                )
            })
            .collect();
        let cell = self
            .config
            .callout_width
            .max(self.config.callout_height)
            .max(MIN_GRID_CELL);
        let grid = SpatialGrid::new(cell, &pins);

        let mut own_anchor: HashMap<LabelIndex, usize> = HashMap::new();
        for connector in &problem.connectors {
            own_anchor.insert(connector.label, connector.anchor);
        }

        for (idx, label) in problem.labels.iter().enumerate() {
            let rect = label_rect(label);
            for anchor_idx in grid.query(&rect) {
                if own_anchor.get(&idx) == Some(&anchor_idx) {
                    continue;
                }
                let pin = problem.anchors[anchor_idx].position;
                let dx = label.position.x - pin.x;
                let dy = label.position.y - pin.y;
                let overlap_x = label.width * 0.5 + radius - dx.abs();
                let overlap_y = label.height * 0.5 + radius - dy.abs();
                if overlap_x <= 0.0 || overlap_y <= 0.0 {
                    continue;
                }
                let (ux, uy) = if dx.abs() < MIN_DISTANCE && dy.abs() < MIN_DISTANCE {
                    symmetry_direction(idx)
                } else if overlap_x <= overlap_y {
                    (dx.signum(), 0.0)
                } else {
                    (0.0, dy.signum())
                };
                let f = self.config.pin_repulsion_strength * overlap_x.min(overlap_y);
                forces[idx].0 += f * ux;
                forces[idx].1 += f * uy;
            }
        }
    }
}

impl GeometryEngine for SpringRelaxation {
    type Session = RelaxationState;

    fn create_session(&mut self, _problem: &LayoutProblem) -> RelaxationState {
        RelaxationState {
            step: self.config.initial_step_size,
            prev_energy: f64::MAX,
            iteration: 0,
        }
    }

    fn step(
        &mut self,
        session: &mut RelaxationState,
        problem: &LayoutProblem,
    ) -> Result<StepOutcome, GeometryFailure> {
        validate(problem)?;
        if problem.is_empty() {
            return Ok(StepOutcome {
                positions: Vec::new(),
                converged: true,
            });
        }

        let mut forces: Vec<Force> = vec![(0.0, 0.0); problem.labels.len()];
        self.accumulate_springs(problem, &mut forces);
        self.accumulate_overlaps(problem, &mut forces);
        self.accumulate_pin_pushes(problem, &mut forces);

        let mut energy = 0.0;
        let mut max_move: f64 = 0.0;
        let mut positions = Vec::with_capacity(forces.len());
        for (idx, (fx, fy)) in forces.iter().enumerate() {
            energy += (fx * fx + fy * fy).sqrt();
            let mut mx = session.step * fx;
            let mut my = session.step * fy;
            let len = (mx * mx + my * my).sqrt();
            if len > self.config.max_displacement {
                let scale = self.config.max_displacement / len;
                mx *= scale;
                my *= scale;
            }
            let current = problem.labels[idx].position;
            let next = ScreenPoint::new(current.x + mx, current.y + my);
            if !next.is_finite() {
                return Err(GeometryFailure::NonFinite {
                    label: idx,
                    x: next.x,
                    y: next.y,
                });
            }
            max_move = max_move.max(len.min(self.config.max_displacement));
            positions.push((idx, next));
        }
        if !energy.is_finite() {
            return Err(GeometryFailure::Diverged(format!(
                "energy became {energy} at iteration {}",
                session.iteration
            )));
        }

        // Adaptive cooling: cool when energy rises, grow back (up to the
        // initial step) while it keeps dropping.
        if energy >= session.prev_energy {
            session.step *= self.config.cooling_factor;
        } else if energy <= ENERGY_GAIN_RATIO * session.prev_energy {
            session.step = (session.step * 0.99 / self.config.cooling_factor)
                .min(self.config.initial_step_size);
        }
        session.prev_energy = energy;
        session.iteration += 1;

        let converged = max_move < self.config.convergence_threshold
            || session.iteration >= self.config.max_iterations
            || session.step < f64::EPSILON;
        Ok(StepOutcome {
            positions,
            converged,
        })
    }
}

fn validate(problem: &LayoutProblem) -> Result<(), GeometryFailure> {
    let len = problem.labels.len();
    for connector in &problem.connectors {
        if connector.label >= len {
            return Err(GeometryFailure::UnknownLabel {
                label: connector.label,
                len,
            });
        }
        if connector.anchor >= problem.anchors.len() {
            return Err(GeometryFailure::Diverged(format!(
                "connector references missing anchor {}",
                connector.anchor
            )));
        }
    }
    Ok(())
}

fn label_rect(label: &super::LabelNode) -> Rect {
    (
        label.position.x - label.width * 0.5,
        label.position.y - label.height * 0.5,
        label.width,
        label.height,
    )
}

/// Deterministic unit direction used when two points coincide.
fn symmetry_direction(index: usize) -> (f64, f64) {
    let angle = index as f64 * GOLDEN_ANGLE;
    (angle.cos(), angle.sin())
}

/// Uniform grid over rectangles for neighbour queries.
struct SpatialGrid {
    cell: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    fn new(cell: f64, rects: &[Rect]) -> Self {
        let mut grid = Self {
            cell: cell.max(MIN_GRID_CELL),
            cells: HashMap::new(),
        };
        for (i, rect) in rects.iter().enumerate() {
            grid.insert(i, rect);
        }
        grid
    }

    fn span(&self, rect: &Rect) -> (i64, i64, i64, i64) {
        let x0 = (rect.0 / self.cell).floor() as i64;
        let y0 = (rect.1 / self.cell).floor() as i64;
        let x1 = ((rect.0 + rect.2) / self.cell).floor() as i64;
        let y1 = ((rect.1 + rect.3) / self.cell).floor() as i64;
        (x0, y0, x1, y1)
    }

    fn insert(&mut self, idx: usize, rect: &Rect) {
        let (x0, y0, x1, y1) = self.span(rect);
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                self.cells.entry((ix, iy)).or_default().push(idx);
            }
        }
    }

    /// Indices of rectangles sharing at least one cell with `rect`.
    fn query(&self, rect: &Rect) -> impl Iterator<Item = usize> + '_ {
        let (x0, y0, x1, y1) = self.span(rect);
        let mut seen = HashSet::new();
        (x0..=x1)
            .flat_map(move |ix| (y0..=y1).map(move |iy| (ix, iy)))
            .flat_map(move |key| {
                self.cells
                    .get(&key)
                    .map(|v| v.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .copied()
            })
            .filter(move |idx| seen.insert(*idx))
    }
}
