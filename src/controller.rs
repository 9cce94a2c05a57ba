//! The overlay synchronization controller.
//!
//! `SyncController` is the single owner of the entity registry and the
//! active layout session. Every external notification enters through
//! [`SyncController::handle`] (or the matching `on_*` method) and runs to
//! completion; the only suspension is the gap between animation ticks.

use crate::config::{Config, LayoutConfig, SeparationBand};
use crate::error::OverlayError;
use crate::gate::{GateDecision, ViewportGate};
use crate::ir::{GeoCoord, Photo, PhotoId, SearchRequest};
use crate::layout::{AnchorNode, GeometryEngine, GeometryFailure, LabelNode, LayoutProblem};
use crate::map::{MapWidget, ScreenPoint};
use crate::registry::{EntityVisuals, OverlayEntity, OverlayEntityRegistry};
use crate::render::{CalloutSpec, OverlayRenderer, PinSpec};
use crate::schedule::{ManualScheduler, SessionId, TickScheduler, TickToken};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::{debug, info, trace, warn};

/// Collaborators injected into the controller.
#[derive(Debug)]
pub struct OverlayDeps<M, R, G, S> {
    pub map: M,
    pub renderer: R,
    pub engine: G,
    pub scheduler: S,
}

/// Notifications the controller consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    /// A search finished. `full_replace` is set when a new search supersedes
    /// the previous result set.
    PhotosChanged {
        photos: Vec<Photo>,
        full_replace: bool,
    },
    TransitionStarted,
    /// Debounced end of a viewport transition.
    TransitionSettled,
    CalloutSelected(PhotoId),
    FocusCleared,
    /// The geolocation provider resolved the user's position.
    LocationResolved(GeoCoord),
    Tick(TickToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Converged,
    /// Abandoned after a geometry failure; entities keep their last good
    /// positions.
    Failed,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Stepped,
    Converged,
    Failed,
    /// The viewport is moving; the tick was rescheduled without stepping.
    Deferred,
    /// The token belongs to a session that is no longer running.
    Stale,
}

#[derive(Debug)]
struct LayoutSession<S> {
    id: SessionId,
    state: SessionState,
    members: Vec<PhotoId>,
    engine: S,
    steps: usize,
}

/// Read-only view of the current layout session.
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo<'a> {
    pub id: SessionId,
    pub state: SessionState,
    pub members: &'a [PhotoId],
    pub steps: usize,
}

/// Draws connector target separations from the configured band.
#[derive(Debug, Clone)]
pub struct SeparationSampler {
    rng: StdRng,
    band: SeparationBand,
}

impl SeparationSampler {
    pub fn seeded(seed: u64, band: SeparationBand) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            band,
        }
    }

    pub fn from_rng(rng: StdRng, band: SeparationBand) -> Self {
        Self { rng, band }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        match config.separation_seed {
            Some(seed) => Self::seeded(seed, config.separation),
            None => Self::from_rng(StdRng::from_os_rng(), config.separation),
        }
    }

    pub fn sample(&mut self) -> f64 {
        if self.band.min >= self.band.max {
            return self.band.min;
        }
        self.rng.random_range(self.band.min..=self.band.max)
    }
}

pub struct SyncController<M, R, G: GeometryEngine, S> {
    map: M,
    renderer: R,
    engine: G,
    scheduler: S,
    config: Config,
    registry: OverlayEntityRegistry,
    // Current data set order; sessions are built in this order.
    order: Vec<PhotoId>,
    gate: ViewportGate,
    session: Option<LayoutSession<G::Session>>,
    next_session: u64,
    sampler: SeparationSampler,
    focused: Option<PhotoId>,
    problem: LayoutProblem,
    present: Vec<PhotoId>,
}

impl<M, R, G, S> SyncController<M, R, G, S>
where
    M: MapWidget,
    R: OverlayRenderer,
    G: GeometryEngine,
    S: TickScheduler,
{
    pub fn new(deps: OverlayDeps<M, R, G, S>, config: Config) -> Self {
        let sampler = SeparationSampler::from_config(&config.layout);
        Self::with_sampler(deps, config, sampler)
    }

    pub fn with_sampler(
        deps: OverlayDeps<M, R, G, S>,
        config: Config,
        sampler: SeparationSampler,
    ) -> Self {
        let gate = ViewportGate::new(&config.gate);
        Self {
            map: deps.map,
            renderer: deps.renderer,
            engine: deps.engine,
            scheduler: deps.scheduler,
            config,
            registry: OverlayEntityRegistry::new(),
            order: Vec::new(),
            gate,
            session: None,
            next_session: 0,
            sampler,
            focused: None,
            problem: LayoutProblem::default(),
            present: Vec::new(),
        }
    }

    /// Tear down every visual and hand the collaborators back.
    pub fn dispose(mut self) -> OverlayDeps<M, R, G, S> {
        self.supersede();
        if self.focused.take().is_some() {
            self.renderer.show_focus(None);
        }
        let removed = self.registry.remove_all(&mut self.renderer);
        debug!(removed, "overlay disposed");
        OverlayDeps {
            map: self.map,
            renderer: self.renderer,
            engine: self.engine,
            scheduler: self.scheduler,
        }
    }

    pub fn handle(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::PhotosChanged {
                photos,
                full_replace,
            } => self.on_photo_set_changed(photos, full_replace),
            OverlayEvent::TransitionStarted => self.on_transition_started(),
            OverlayEvent::TransitionSettled => {
                self.on_transition_settled();
            }
            OverlayEvent::CalloutSelected(id) => {
                self.on_select(&id);
            }
            OverlayEvent::FocusCleared => self.clear_focus(),
            OverlayEvent::LocationResolved(coord) => self.on_location_resolved(coord),
            OverlayEvent::Tick(token) => {
                self.tick(token);
            }
        }
    }

    /// Reconcile the overlay with a new photo set.
    pub fn on_photo_set_changed(&mut self, photos: Vec<Photo>, full_replace: bool) {
        self.clear_focus();

        let mut seen: HashSet<PhotoId> = HashSet::with_capacity(photos.len());
        let photos: Vec<Photo> = photos
            .into_iter()
            .filter(|photo| seen.insert(photo.id.clone()))
            .collect();

        if full_replace {
            let removed = self.registry.remove_all(&mut self.renderer);
            info!(removed, incoming = photos.len(), "photo set replaced");
        } else {
            let removed = self.registry.retain(&seen, &mut self.renderer);
            if !removed.is_empty() {
                debug!(removed = removed.len(), "photos left the data set");
            }
        }

        let mut created = 0usize;
        self.order.clear();
        for photo in photos {
            let id = photo.id.clone();
            let anchor = self.map.project_to_screen(photo.coord);
            if let Some(entity) = self.registry.get_mut(&id) {
                entity.replace_photo(photo);
                reposition_entity(entity, anchor, &mut self.renderer);
            } else {
                let entity = self.create_entity(photo, anchor);
                if let Some(displaced) = self.registry.upsert(id.clone(), entity) {
                    self.destroy_visuals(displaced.visuals());
                }
                created += 1;
            }
            self.order.push(id);
        }
        trace!(created, total = self.order.len(), "photo set reconciled");

        if self.order.is_empty() {
            self.supersede();
            return;
        }
        self.start_session();
    }

    /// Reproject every entity through the current viewport and relayout.
    ///
    /// Ignored while the viewport is mid-transition. Returns whether a
    /// refresh ran.
    pub fn on_viewport_transform_changed(&mut self) -> bool {
        if self.gate.is_transitioning() {
            trace!("viewport refresh suppressed during transition");
            return false;
        }
        for id in &self.order {
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };
            let anchor = self.map.project_to_screen(entity.photo().coord);
            reposition_entity(entity, anchor, &mut self.renderer);
        }
        if self.order.is_empty() {
            return false;
        }
        self.start_session();
        true
    }

    pub fn on_transition_started(&mut self) {
        self.gate.transition_started(self.map.zoom_level());
    }

    /// Close a viewport transition; refreshes when the zoom changed or the
    /// anchors no longer sit where the map now projects them.
    pub fn on_transition_settled(&mut self) -> GateDecision {
        let zoom = self.map.zoom_level();
        let map = &self.map;
        let registry = &self.registry;
        let order = &self.order;
        let decision = self
            .gate
            .transition_settled(zoom, |epsilon| anchors_moved(map, registry, order, epsilon));
        if decision == GateDecision::Refresh {
            self.on_viewport_transform_changed();
        }
        decision
    }

    /// Focus a photo in response to its callout being selected. Unknown
    /// identities are ignored.
    pub fn on_select(&mut self, id: &PhotoId) -> bool {
        let Some(entity) = self.registry.get(id) else {
            let err = OverlayError::MissingEntity { id: id.clone() };
            debug!(%err, "selection ignored");
            return false;
        };
        self.renderer.show_focus(Some(entity.photo()));
        self.focused = Some(id.clone());
        true
    }

    pub fn clear_focus(&mut self) {
        if self.focused.take().is_some() {
            self.renderer.show_focus(None);
        }
    }

    pub fn on_location_resolved(&mut self, coord: GeoCoord) {
        let zoom = self.config.session.locate_zoom;
        info!(
            latitude = coord.latitude,
            longitude = coord.longitude,
            zoom,
            "centering map on resolved location"
        );
        self.map.set_view(coord, zoom, true);
    }

    /// Search request for `text` within the visible map region.
    pub fn search_region(&self, text: impl Into<String>) -> SearchRequest {
        SearchRequest::Region {
            text: text.into(),
            bounds: self.map.viewport_bounds(),
        }
    }

    /// Search request for photos like the focused one. Closes the focus.
    pub fn search_similar(&mut self) -> Option<SearchRequest> {
        let id = self.focused.clone()?;
        let photo = self.registry.get(&id)?.photo();
        let request = SearchRequest::Nearby {
            tags: photo.tags.clone(),
            coord: photo.coord,
        };
        self.clear_focus();
        Some(request)
    }

    /// Advance the session the token was issued for by one relaxation step.
    pub fn tick(&mut self, token: TickToken) -> TickOutcome {
        let interval = self.config.session.tick_interval();
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Stale;
        };
        if session.id != token.session() || session.state != SessionState::Running {
            let err = OverlayError::StaleSession {
                session: token.session(),
            };
            trace!(%err, "tick discarded");
            return TickOutcome::Stale;
        }
        if self.gate.is_transitioning() {
            self.scheduler.schedule(interval, token);
            return TickOutcome::Deferred;
        }

        fill_problem(
            &mut self.problem,
            &mut self.present,
            &self.registry,
            &session.members,
        );
        let result = self
            .engine
            .step(&mut session.engine, &self.problem)
            .and_then(|outcome| {
                validate_positions(&outcome.positions, self.problem.labels.len())?;
                Ok(outcome)
            });
        session.steps += 1;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(source) => {
                session.state = SessionState::Failed;
                let err = OverlayError::Geometry {
                    session: session.id,
                    source,
                };
                warn!(%err, steps = session.steps, "layout session abandoned");
                return TickOutcome::Failed;
            }
        };

        for (idx, position) in &outcome.positions {
            let id = &self.present[*idx];
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };
            entity.set_label_position(*position);
            let visuals = entity.visuals();
            let anchor = entity.anchor().position;
            self.renderer.set_position(visuals.callout, *position);
            self.renderer.set_segment(visuals.connector, anchor, *position);
        }

        if outcome.converged {
            session.state = SessionState::Converged;
            debug!(session = %session.id, steps = session.steps, "layout converged");
            TickOutcome::Converged
        } else {
            self.scheduler.schedule(interval, token);
            TickOutcome::Stepped
        }
    }

    fn start_session(&mut self) {
        self.supersede();
        self.next_session += 1;
        let id = SessionId::new(self.next_session);
        let members = self.order.clone();
        fill_problem(&mut self.problem, &mut self.present, &self.registry, &members);
        let engine = self.engine.create_session(&self.problem);
        debug!(session = %id, members = members.len(), "layout session started");
        self.session = Some(LayoutSession {
            id,
            state: SessionState::Running,
            members,
            engine,
            steps: 0,
        });
        self.scheduler
            .schedule(self.config.session.tick_interval(), TickToken::new(id));
    }

    fn supersede(&mut self) {
        if let Some(session) = self.session.as_mut()
            && session.state == SessionState::Running
        {
            session.state = SessionState::Superseded;
            trace!(session = %session.id, steps = session.steps, "layout session superseded");
        }
    }

    fn create_entity(&mut self, photo: Photo, at: ScreenPoint) -> OverlayEntity {
        let layout = &self.config.layout;
        let render = &self.config.render;
        let pin = PinSpec {
            size: render.pin_size,
            anchor: (render.pin_size / 2.0, render.pin_size / 2.0),
        };
        let callout = CalloutSpec {
            title: photo.title.clone(),
            thumbnail_url: photo.thumbnail_url.clone(),
            width: layout.callout_width,
            height: layout.callout_height,
            offset: render.callout_offset,
        };
        let visuals = EntityVisuals {
            pin: self.renderer.create_pin(at, &pin),
            connector: self.renderer.create_connector(at, at),
            callout: self.renderer.create_callout(at, &callout),
        };
        self.renderer.bind_selection(visuals.callout, &photo.id);

        let anchor = AnchorNode::at(at);
        let label = LabelNode::seeded(&anchor, layout.callout_width, layout.callout_height);
        let separation = self.sampler.sample();
        OverlayEntity::new(photo, visuals, anchor, label, separation)
    }

    fn destroy_visuals(&mut self, visuals: EntityVisuals) {
        self.renderer.destroy(visuals.connector);
        self.renderer.destroy(visuals.callout);
        self.renderer.destroy(visuals.pin);
    }

    pub fn registry(&self) -> &OverlayEntityRegistry {
        &self.registry
    }

    /// Identities in the current data set, in arrival order.
    pub fn photo_ids(&self) -> &[PhotoId] {
        &self.order
    }

    pub fn session(&self) -> Option<SessionInfo<'_>> {
        self.session.as_ref().map(|session| SessionInfo {
            id: session.id,
            state: session.state,
            members: &session.members,
            steps: session.steps,
        })
    }

    pub fn is_animating(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.state == SessionState::Running)
    }

    pub fn focused(&self) -> Option<&PhotoId> {
        self.focused.as_ref()
    }

    /// The focused photo, e.g. to open its page through `Photo::url`.
    pub fn focused_photo(&self) -> Option<&Photo> {
        self.focused
            .as_ref()
            .and_then(|id| self.registry.get(id))
            .map(OverlayEntity::photo)
    }

    pub fn gate(&self) -> &ViewportGate {
        &self.gate
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn engine(&self) -> &G {
        &self.engine
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

impl<M, R, G> SyncController<M, R, G, ManualScheduler>
where
    M: MapWidget,
    R: OverlayRenderer,
    G: GeometryEngine,
{
    /// Fire pending ticks in due order until none remain or `limit` ticks
    /// have run. Returns the number of ticks fired.
    pub fn run_pending(&mut self, limit: usize) -> usize {
        let mut fired = 0;
        while fired < limit {
            let Some(token) = self.scheduler.pop_next() else {
                break;
            };
            self.tick(token);
            fired += 1;
        }
        fired
    }
}

/// Move an entity's anchor and collapse its callout and connector onto the
/// new pin, so the overlay stays consistent until the next tick lands.
fn reposition_entity<R: OverlayRenderer>(
    entity: &mut OverlayEntity,
    anchor: ScreenPoint,
    renderer: &mut R,
) {
    entity.reposition(anchor);
    let visuals = entity.visuals();
    let label = entity.label().position;
    renderer.set_position(visuals.pin, anchor);
    renderer.set_position(visuals.callout, label);
    renderer.set_segment(visuals.connector, anchor, label);
}

/// Rebuild the step problem from live entities. `present[i]` is the photo
/// owning label `i`; members missing from the registry are skipped.
fn fill_problem(
    problem: &mut LayoutProblem,
    present: &mut Vec<PhotoId>,
    registry: &OverlayEntityRegistry,
    members: &[PhotoId],
) {
    problem.clear();
    present.clear();
    for id in members {
        let Some(entity) = registry.get(id) else {
            let err = OverlayError::MissingEntity { id: id.clone() };
            trace!(%err, "session member skipped");
            continue;
        };
        problem.push_pair(*entity.anchor(), *entity.label(), entity.separation());
        present.push(id.clone());
    }
}

fn validate_positions(
    positions: &[(usize, ScreenPoint)],
    len: usize,
) -> Result<(), GeometryFailure> {
    for &(label, at) in positions {
        if label >= len {
            return Err(GeometryFailure::UnknownLabel { label, len });
        }
        if !at.is_finite() {
            return Err(GeometryFailure::NonFinite {
                label,
                x: at.x,
                y: at.y,
            });
        }
    }
    Ok(())
}

fn anchors_moved<M: MapWidget>(
    map: &M,
    registry: &OverlayEntityRegistry,
    order: &[PhotoId],
    epsilon: f64,
) -> bool {
    order.iter().any(|id| {
        registry.get(id).is_some_and(|entity| {
            let projected = map.project_to_screen(entity.photo().coord);
            projected.distance(entity.anchor().position) > epsilon
        })
    })
}
