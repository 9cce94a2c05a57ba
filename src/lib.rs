pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod map;
pub mod registry;
pub mod render;
pub mod schedule;

pub use config::{Config, LayoutConfig, load_config};
pub use controller::{
    OverlayDeps, OverlayEvent, SeparationSampler, SessionInfo, SessionState, SyncController,
    TickOutcome,
};
pub use gate::{GateDecision, ViewportGate};
pub use ir::{GeoBounds, GeoCoord, Photo, PhotoId, SearchRequest};
pub use layout::{GeometryEngine, SpringRelaxation};
pub use map::{MapWidget, MercatorMap, ScreenPoint};
pub use render::{OverlayRenderer, Scene, render_svg};
pub use schedule::{ManualScheduler, TickScheduler, TickToken};
