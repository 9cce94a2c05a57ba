//! Geometry problem handed to the relaxation engine, and the engine boundary.

mod error;
mod relaxation;
mod types;

pub use error::GeometryFailure;
pub use relaxation::{RelaxationState, SpringRelaxation};
pub use types::{
    AnchorIndex, AnchorNode, Connector, LabelIndex, LabelNode, LayoutProblem, StepOutcome,
};

/// Pluggable relaxation engine driven one step at a time.
///
/// The engine must not keep references to the problem between steps: every
/// call to [`GeometryEngine::step`] receives the live node set, so positions
/// reset from outside (for example after a viewport refresh) are picked up
/// on the next step.
pub trait GeometryEngine {
    /// Engine-private bookkeeping for one layout session.
    type Session;

    fn create_session(&mut self, problem: &LayoutProblem) -> Self::Session;

    fn step(
        &mut self,
        session: &mut Self::Session,
        problem: &LayoutProblem,
    ) -> Result<StepOutcome, GeometryFailure>;
}
