//! Guard that keeps layout work away from a viewport in motion.
//!
//! `Idle -> start -> Transitioning -> settle -> Idle`. Repeated starts while
//! transitioning are coalesced and the zoom level seen at the first start
//! is what the settle compares against.

use crate::config::GateConfig;

const ZOOM_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateState {
    Idle,
    Transitioning { start_zoom: f64, coalesced: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing visible changed; keep the current layout.
    Ignore,
    /// Anchors must be reprojected and a new layout session started.
    Refresh,
}

#[derive(Debug, Clone)]
pub struct ViewportGate {
    state: GateState,
    anchor_epsilon: f64,
}

impl ViewportGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            state: GateState::Idle,
            anchor_epsilon: config.anchor_epsilon,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, GateState::Transitioning { .. })
    }

    pub fn transition_started(&mut self, zoom: f64) {
        self.state = match self.state {
            GateState::Idle => GateState::Transitioning {
                start_zoom: zoom,
                coalesced: 0,
            },
            GateState::Transitioning {
                start_zoom,
                coalesced,
            } => GateState::Transitioning {
                start_zoom,
                coalesced: coalesced + 1,
            },
        };
    }

    /// Close the transition. `anchors_moved` is only consulted when the zoom
    /// level is unchanged; it receives the pixel tolerance to compare with.
    pub fn transition_settled(
        &mut self,
        zoom: f64,
        anchors_moved: impl FnOnce(f64) -> bool,
    ) -> GateDecision {
        let GateState::Transitioning { start_zoom, .. } = self.state else {
            return GateDecision::Ignore;
        };
        self.state = GateState::Idle;
        if (start_zoom - zoom).abs() > ZOOM_EPSILON {
            return GateDecision::Refresh;
        }
        if anchors_moved(self.anchor_epsilon) {
            GateDecision::Refresh
        } else {
            GateDecision::Ignore
        }
    }
}
