use crate::ir::PhotoId;
use crate::layout::GeometryFailure;
use crate::schedule::SessionId;
use thiserror::Error;

/// Conditions the controller detects and absorbs. None of these reach the
/// callers of the public operations; they surface as log events and as
/// `TickOutcome` values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverlayError {
    #[error("tick for layout session {session} which is no longer running")]
    StaleSession { session: SessionId },
    #[error("layout session {session} abandoned: {source}")]
    Geometry {
        session: SessionId,
        #[source]
        source: GeometryFailure,
    },
    #[error("no overlay entity for photo {id}")]
    MissingEntity { id: PhotoId },
}
