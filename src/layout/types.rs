use crate::map::ScreenPoint;

/// Index of a label node inside one [`LayoutProblem`].
pub type LabelIndex = usize;
/// Index of an anchor node inside one [`LayoutProblem`].
pub type AnchorIndex = usize;

/// Screen position of a photo's pin. Never moved by relaxation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorNode {
    pub position: ScreenPoint,
}

impl AnchorNode {
    pub fn at(position: ScreenPoint) -> Self {
        Self { position }
    }
}

/// Screen position of a photo's callout; the only thing relaxation moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelNode {
    pub position: ScreenPoint,
    pub width: f64,
    pub height: f64,
}

impl LabelNode {
    /// Label seeded on top of its anchor.
    pub fn seeded(anchor: &AnchorNode, width: f64, height: f64) -> Self {
        Self {
            position: anchor.position,
            width,
            height,
        }
    }
}

/// Spring linking an anchor to its label with a target separation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connector {
    pub anchor: AnchorIndex,
    pub label: LabelIndex,
    pub separation: f64,
}

/// Borrowed-for-one-step view of the nodes and constraints of a session.
#[derive(Debug, Clone, Default)]
pub struct LayoutProblem {
    pub anchors: Vec<AnchorNode>,
    pub labels: Vec<LabelNode>,
    pub connectors: Vec<Connector>,
}

impl LayoutProblem {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            anchors: Vec::with_capacity(capacity),
            labels: Vec::with_capacity(capacity),
            connectors: Vec::with_capacity(capacity),
        }
    }

    /// Append one anchor/label pair joined by a connector.
    pub fn push_pair(
        &mut self,
        anchor: AnchorNode,
        label: LabelNode,
        separation: f64,
    ) -> LabelIndex {
        let anchor_idx = self.anchors.len();
        let label_idx = self.labels.len();
        self.anchors.push(anchor);
        self.labels.push(label);
        self.connectors.push(Connector {
            anchor: anchor_idx,
            label: label_idx,
            separation,
        });
        label_idx
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn clear(&mut self) {
        self.anchors.clear();
        self.labels.clear();
        self.connectors.clear();
    }
}

/// Result of advancing a session by one relaxation step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// New positions of relaxable nodes. Anchors never appear here.
    pub positions: Vec<(LabelIndex, ScreenPoint)>,
    pub converged: bool,
}
