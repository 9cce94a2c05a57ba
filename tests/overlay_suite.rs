use photomap_overlay::config::{Config, SeparationBand};
use photomap_overlay::layout::{GeometryFailure, LayoutProblem, StepOutcome};
use photomap_overlay::render::Visual;
use photomap_overlay::{
    GateDecision, GeoCoord, GeometryEngine, ManualScheduler, MapWidget, MercatorMap, OverlayDeps,
    OverlayEvent, Photo, PhotoId, Scene, ScreenPoint, SeparationSampler, SessionState,
    SyncController, TickOutcome,
};

/// Engine stub: nudges every label one pixel right per step and converges
/// after `converge_after` steps. Records which session each step ran for;
/// every step of session `fail_session` fails.
#[derive(Default)]
struct CountingEngine {
    converge_after: usize,
    fail_session: Option<u64>,
    sessions_created: u64,
    steps: Vec<u64>,
}

struct CountingSession {
    serial: u64,
    steps: usize,
}

impl GeometryEngine for CountingEngine {
    type Session = CountingSession;

    fn create_session(&mut self, _problem: &LayoutProblem) -> CountingSession {
        self.sessions_created += 1;
        CountingSession {
            serial: self.sessions_created,
            steps: 0,
        }
    }

    fn step(
        &mut self,
        session: &mut CountingSession,
        problem: &LayoutProblem,
    ) -> Result<StepOutcome, GeometryFailure> {
        session.steps += 1;
        self.steps.push(session.serial);
        if self.fail_session == Some(session.serial) {
            return Err(GeometryFailure::Diverged(format!(
                "session {} blew up",
                session.serial
            )));
        }
        let positions = problem
            .labels
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                (
                    idx,
                    ScreenPoint::new(label.position.x + 1.0, label.position.y),
                )
            })
            .collect();
        Ok(StepOutcome {
            positions,
            converged: session.steps >= self.converge_after,
        })
    }
}

type Controller = SyncController<MercatorMap, Scene, CountingEngine, ManualScheduler>;

const SEED: u64 = 7;

fn controller(converge_after: usize) -> Controller {
    controller_with(CountingEngine {
        converge_after,
        ..Default::default()
    })
}

fn controller_with(engine: CountingEngine) -> Controller {
    let config = Config::default();
    let sampler = SeparationSampler::seeded(SEED, config.layout.separation);
    SyncController::with_sampler(
        OverlayDeps {
            map: MercatorMap::new(GeoCoord::new(10.5, 20.5), 7.0, 1024.0, 768.0),
            renderer: Scene::new(),
            engine,
            scheduler: ManualScheduler::new(),
        },
        config,
        sampler,
    )
}

fn scenario_photos() -> Vec<Photo> {
    vec![Photo::located("a", 10.0, 20.0), Photo::located("b", 11.0, 21.0)]
}

fn ids(ctl: &Controller) -> Vec<String> {
    ctl.registry().ids().map(|id| id.to_string()).collect()
}

fn anchor_of(ctl: &Controller, id: &str) -> ScreenPoint {
    ctl.registry()
        .get(&PhotoId::new(id))
        .expect("entity")
        .anchor()
        .position
}

#[test]
fn incremental_update_destroys_missing_and_keeps_survivors() {
    let mut ctl = controller(50);
    ctl.handle(OverlayEvent::PhotosChanged {
        photos: scenario_photos(),
        full_replace: true,
    });
    assert_eq!(ids(&ctl), vec!["a", "b"]);
    let first_session = ctl.session().expect("session").id;
    let anchor_a = anchor_of(&ctl, "a");

    ctl.handle(OverlayEvent::PhotosChanged {
        photos: vec![Photo::located("a", 10.0, 20.0)],
        full_replace: false,
    });
    assert_eq!(ids(&ctl), vec!["a"]);
    assert_eq!(anchor_of(&ctl, "a"), anchor_a);
    assert_eq!(ctl.renderer().len(), 3);

    let session = ctl.session().expect("session");
    assert!(session.id > first_session);
    assert_eq!(session.state, SessionState::Running);
    assert_eq!(session.members, &[PhotoId::new("a")]);
}

#[test]
fn surviving_entity_keeps_its_connector_separation() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let before = ctl
        .registry()
        .get(&PhotoId::new("a"))
        .expect("entity")
        .separation();
    let callout_before = ctl.registry().get(&PhotoId::new("a")).expect("entity").visuals();

    ctl.on_photo_set_changed(
        vec![Photo::located("a", 10.0, 20.0), Photo::located("c", 12.0, 22.0)],
        false,
    );
    let entity = ctl.registry().get(&PhotoId::new("a")).expect("entity");
    assert_eq!(entity.separation(), before);
    assert_eq!(entity.visuals(), callout_before);
}

#[test]
fn separations_follow_the_injected_sampler() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);

    let mut expected = SeparationSampler::seeded(SEED, SeparationBand::new(10.0, 25.0));
    let sep_a = expected.sample();
    let sep_b = expected.sample();
    let registry = ctl.registry();
    assert_eq!(registry.get(&PhotoId::new("a")).expect("a").separation(), sep_a);
    assert_eq!(registry.get(&PhotoId::new("b")).expect("b").separation(), sep_b);
    assert!((10.0..=25.0).contains(&sep_a));
}

#[test]
fn full_replace_recreates_every_entity() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let old = ctl.registry().get(&PhotoId::new("a")).expect("a").visuals();

    ctl.on_photo_set_changed(scenario_photos(), true);
    let new = ctl.registry().get(&PhotoId::new("a")).expect("a").visuals();
    assert_ne!(old, new);
    assert!(ctl.renderer().visual(old.pin).is_none());
    assert_eq!(ctl.renderer().len(), 6);
    assert_eq!(ctl.renderer().destroyed_count(), 6);
}

#[test]
fn convergence_after_k_steps_stops_ticking() {
    let k = 5;
    let mut ctl = controller(k);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let fired = ctl.run_pending(1_000);
    assert_eq!(fired, k);
    assert_eq!(ctl.engine().steps.len(), k);
    assert_eq!(ctl.scheduler().pending(), 0);
    let session = ctl.session().expect("session");
    assert_eq!(session.state, SessionState::Converged);
    assert_eq!(session.steps, k);
    assert!(!ctl.is_animating());
}

#[test]
fn superseded_session_never_writes_again() {
    let mut ctl = controller(3);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let stale = ctl.scheduler_mut().pop_next().expect("first session tick");

    // Second session starts before the first ever ticks.
    ctl.on_photo_set_changed(scenario_photos(), false);
    ctl.renderer_mut().take_writes();

    assert_eq!(ctl.tick(stale), TickOutcome::Stale);
    assert!(ctl.renderer().writes().is_empty());

    ctl.run_pending(100);
    assert!(ctl.engine().steps.iter().all(|serial| *serial == 2));

    // Labels were re-seeded on the anchors, so after n steps of the stub
    // every callout sits exactly n pixels right of its anchor.
    let writes = ctl.renderer().writes().to_vec();
    assert_eq!(writes.len(), 3 * 2);
    for entity in ctl.registry().values() {
        let anchor = entity.anchor().position;
        let callout = entity.visuals().callout;
        let own: Vec<ScreenPoint> = writes
            .iter()
            .filter(|w| w.handle == callout)
            .map(|w| w.at)
            .collect();
        assert_eq!(own.len(), 3);
        for (n, at) in own.iter().enumerate() {
            let expected = ScreenPoint::new(anchor.x + (n + 1) as f64, anchor.y);
            assert!(at.distance(expected) < 1e-9, "{at:?} != {expected:?}");
        }
    }
}

#[test]
fn connector_follows_anchor_to_label_segment() {
    let mut ctl = controller(1);
    ctl.on_photo_set_changed(scenario_photos(), true);
    ctl.run_pending(10);
    for entity in ctl.registry().values() {
        let visuals = entity.visuals();
        match ctl.renderer().visual(visuals.connector) {
            Some(Visual::Connector { from, to }) => {
                assert_eq!(*from, entity.anchor().position);
                assert_eq!(*to, entity.label().position);
            }
            other => panic!("expected connector, got {other:?}"),
        }
    }
}

#[test]
fn viewport_refresh_is_suppressed_while_transitioning() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let session = ctl.session().expect("session").id;
    let scheduled = ctl.scheduler().scheduled_count();
    let anchor = anchor_of(&ctl, "a");

    ctl.handle(OverlayEvent::TransitionStarted);
    ctl.map_mut().set_zoom(9.0);
    assert!(!ctl.on_viewport_transform_changed());

    assert_eq!(ctl.session().expect("session").id, session);
    assert_eq!(ctl.scheduler().scheduled_count(), scheduled);
    assert_eq!(anchor_of(&ctl, "a"), anchor);
    assert_eq!(ids(&ctl), vec!["a", "b"]);
}

#[test]
fn settle_without_zoom_or_pixel_change_is_ignored() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let session = ctl.session().expect("session").id;
    let scheduled = ctl.scheduler().scheduled_count();

    ctl.handle(OverlayEvent::TransitionStarted);
    ctl.handle(OverlayEvent::TransitionStarted);
    assert_eq!(ctl.on_transition_settled(), GateDecision::Ignore);

    assert_eq!(ctl.session().expect("session").id, session);
    assert_eq!(ctl.scheduler().scheduled_count(), scheduled);
}

#[test]
fn settle_after_zoom_change_starts_reprojected_session() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let first = ctl.session().expect("session").id;
    let stale = ctl.scheduler_mut().pop_next().expect("tick");

    ctl.handle(OverlayEvent::TransitionStarted);
    ctl.map_mut().set_zoom(8.0);
    assert_eq!(ctl.on_transition_settled(), GateDecision::Refresh);

    let session = ctl.session().expect("session");
    assert!(session.id > first);
    assert_eq!(session.state, SessionState::Running);
    for entity in ctl.registry().values() {
        let projected = ctl.map().project_to_screen(entity.photo().coord);
        assert_eq!(entity.anchor().position, projected);
        assert_eq!(entity.label().position, projected);
    }
    assert_eq!(ctl.tick(stale), TickOutcome::Stale);
}

#[test]
fn settle_after_pan_refreshes_moved_anchors() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let first = ctl.session().expect("session").id;

    ctl.handle(OverlayEvent::TransitionStarted);
    ctl.map_mut().pan_by(40.0, 0.0);
    assert_eq!(ctl.on_transition_settled(), GateDecision::Refresh);
    assert!(ctl.session().expect("session").id > first);

    let projected = ctl.map().project_to_screen(GeoCoord::new(10.0, 20.0));
    assert_eq!(anchor_of(&ctl, "a"), projected);
}

#[test]
fn selecting_a_callout_does_not_touch_layout() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let session = ctl.session().expect("session").id;
    let scheduled = ctl.scheduler().scheduled_count();

    let callout = ctl.registry().get(&PhotoId::new("b")).expect("b").visuals().callout;
    let target = ctl
        .renderer()
        .selection_target(callout)
        .cloned()
        .expect("binding");
    ctl.handle(OverlayEvent::CalloutSelected(target));

    assert_eq!(ctl.focused(), Some(&PhotoId::new("b")));
    assert_eq!(ctl.session().expect("session").id, session);
    assert_eq!(ctl.scheduler().scheduled_count(), scheduled);

    ctl.handle(OverlayEvent::FocusCleared);
    assert!(ctl.renderer().focused().is_none());
}

#[test]
fn removed_photo_selection_is_a_no_op() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    ctl.on_photo_set_changed(vec![Photo::located("a", 10.0, 20.0)], false);
    assert!(!ctl.on_select(&PhotoId::new("b")));
    assert!(ctl.focused().is_none());
}

#[test]
fn geolocation_only_moves_the_map() {
    let mut ctl = controller(50);
    ctl.on_photo_set_changed(scenario_photos(), true);
    let session = ctl.session().expect("session").id;
    ctl.handle(OverlayEvent::LocationResolved(GeoCoord::new(48.85, 2.35)));
    assert_eq!(ctl.map().zoom_level(), ctl.config().session.locate_zoom);
    assert_eq!(ctl.session().expect("session").id, session);
}

#[test]
fn failed_refresh_leaves_visuals_attached_to_pins() {
    let mut ctl = controller_with(CountingEngine {
        converge_after: 2,
        fail_session: Some(2),
        ..Default::default()
    });
    ctl.on_photo_set_changed(scenario_photos(), true);
    ctl.run_pending(10);
    assert_eq!(ctl.session().expect("session").state, SessionState::Converged);

    ctl.handle(OverlayEvent::TransitionStarted);
    ctl.map_mut().set_zoom(9.0);
    assert_eq!(ctl.on_transition_settled(), GateDecision::Refresh);
    let token = ctl.scheduler_mut().pop_next().expect("refresh tick");
    assert_eq!(ctl.tick(token), TickOutcome::Failed);
    assert_eq!(ctl.session().expect("session").state, SessionState::Failed);

    for entity in ctl.registry().values() {
        let visuals = entity.visuals();
        let anchor = entity.anchor().position;
        let label = entity.label().position;
        match ctl.renderer().visual(visuals.pin) {
            Some(Visual::Pin { at, .. }) => assert_eq!(*at, anchor),
            other => panic!("expected pin, got {other:?}"),
        }
        match ctl.renderer().visual(visuals.callout) {
            Some(Visual::Callout { at, .. }) => assert_eq!(*at, label),
            other => panic!("expected callout, got {other:?}"),
        }
        match ctl.renderer().visual(visuals.connector) {
            Some(Visual::Connector { from, to }) => {
                assert_eq!(*from, anchor);
                assert_eq!(*to, label);
            }
            other => panic!("expected connector, got {other:?}"),
        }
    }
}
