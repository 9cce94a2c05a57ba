use crate::config::RenderConfig;
use crate::ir::{Photo, PhotoId};
use crate::map::ScreenPoint;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Opaque handle to a visual owned by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VisualHandle(u64);

impl VisualHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinSpec {
    pub size: f64,
    /// Offset of the pin's hotspot from its top-left corner.
    pub anchor: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalloutSpec {
    pub title: String,
    pub thumbnail_url: String,
    pub width: f64,
    pub height: f64,
    /// Bottom-left corner of the callout box relative to its position.
    pub offset: (f64, f64),
}

impl CalloutSpec {
    /// Top-left corner of the callout box drawn for `at`.
    pub fn origin(&self, at: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(at.x + self.offset.0, at.y + self.offset.1 - self.height)
    }
}

/// Visual layer the overlay draws into.
///
/// Selection is reported back by the host as an event carrying the
/// [`PhotoId`] bound through [`OverlayRenderer::bind_selection`].
pub trait OverlayRenderer {
    fn create_pin(&mut self, at: ScreenPoint, spec: &PinSpec) -> VisualHandle;
    fn create_connector(&mut self, from: ScreenPoint, to: ScreenPoint) -> VisualHandle;
    fn create_callout(&mut self, at: ScreenPoint, spec: &CalloutSpec) -> VisualHandle;
    fn set_position(&mut self, handle: VisualHandle, at: ScreenPoint);
    fn set_segment(&mut self, handle: VisualHandle, from: ScreenPoint, to: ScreenPoint);
    fn bind_selection(&mut self, callout: VisualHandle, photo: &PhotoId);
    /// Show a photo focused over the map, or hide the focused photo.
    fn show_focus(&mut self, photo: Option<&Photo>);
    fn destroy(&mut self, handle: VisualHandle);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Visual {
    Pin { at: ScreenPoint, spec: PinSpec },
    Connector { from: ScreenPoint, to: ScreenPoint },
    Callout { at: ScreenPoint, spec: CalloutSpec },
}

/// One position update observed by a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionWrite {
    pub handle: VisualHandle,
    pub at: ScreenPoint,
}

/// In-memory renderer. Keeps every live visual and a log of position
/// writes, which makes it usable both headless and in tests.
#[derive(Debug, Default)]
pub struct Scene {
    next_handle: u64,
    visuals: BTreeMap<VisualHandle, Visual>,
    selection: BTreeMap<VisualHandle, PhotoId>,
    focused: Option<PhotoId>,
    writes: Vec<PositionWrite>,
    created: usize,
    destroyed: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visual(&self, handle: VisualHandle) -> Option<&Visual> {
        self.visuals.get(&handle)
    }

    pub fn visuals(&self) -> impl Iterator<Item = (VisualHandle, &Visual)> {
        self.visuals.iter().map(|(handle, visual)| (*handle, visual))
    }

    pub fn len(&self) -> usize {
        self.visuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visuals.is_empty()
    }

    /// Photo a click on `handle` should select.
    pub fn selection_target(&self, handle: VisualHandle) -> Option<&PhotoId> {
        self.selection.get(&handle)
    }

    pub fn focused(&self) -> Option<&PhotoId> {
        self.focused.as_ref()
    }

    pub fn writes(&self) -> &[PositionWrite] {
        &self.writes
    }

    pub fn take_writes(&mut self) -> Vec<PositionWrite> {
        std::mem::take(&mut self.writes)
    }

    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    fn insert(&mut self, visual: Visual) -> VisualHandle {
        self.next_handle += 1;
        let handle = VisualHandle(self.next_handle);
        self.visuals.insert(handle, visual);
        self.created += 1;
        handle
    }
}

impl OverlayRenderer for Scene {
    fn create_pin(&mut self, at: ScreenPoint, spec: &PinSpec) -> VisualHandle {
        self.insert(Visual::Pin {
            at,
            spec: spec.clone(),
        })
    }

    fn create_connector(&mut self, from: ScreenPoint, to: ScreenPoint) -> VisualHandle {
        self.insert(Visual::Connector { from, to })
    }

    fn create_callout(&mut self, at: ScreenPoint, spec: &CalloutSpec) -> VisualHandle {
        self.insert(Visual::Callout {
            at,
            spec: spec.clone(),
        })
    }

    fn set_position(&mut self, handle: VisualHandle, at: ScreenPoint) {
        match self.visuals.get_mut(&handle) {
            Some(Visual::Pin { at: pos, .. }) | Some(Visual::Callout { at: pos, .. }) => {
                *pos = at;
                self.writes.push(PositionWrite { handle, at });
            }
            _ => {}
        }
    }

    fn set_segment(&mut self, handle: VisualHandle, from: ScreenPoint, to: ScreenPoint) {
        if let Some(Visual::Connector { from: a, to: b }) = self.visuals.get_mut(&handle) {
            *a = from;
            *b = to;
        }
    }

    fn bind_selection(&mut self, callout: VisualHandle, photo: &PhotoId) {
        if self.visuals.contains_key(&callout) {
            self.selection.insert(callout, photo.clone());
        }
    }

    fn show_focus(&mut self, photo: Option<&Photo>) {
        self.focused = photo.map(|p| p.id.clone());
    }

    fn destroy(&mut self, handle: VisualHandle) {
        if self.visuals.remove(&handle).is_some() {
            self.destroyed += 1;
        }
        self.selection.remove(&handle);
    }
}

pub fn render_svg(scene: &Scene, config: &RenderConfig) -> String {
    let mut svg = String::new();
    let width = config.width.max(200.0);
    let height = config.height.max(200.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.background
    ));

    // Connectors below pins, callouts on top.
    for (_, visual) in scene.visuals() {
        if let Visual::Connector { from, to } = visual {
            svg.push_str(&format!(
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{}\"/>",
                from.x, from.y, to.x, to.y, config.connector_color, config.connector_width
            ));
        }
    }

    for (_, visual) in scene.visuals() {
        if let Visual::Pin { at, spec } = visual {
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\"/>",
                at.x,
                at.y,
                spec.size / 2.0,
                config.pin_color
            ));
        }
    }

    for (handle, visual) in scene.visuals() {
        if let Visual::Callout { at, spec } = visual {
            let ScreenPoint { x, y } = spec.origin(*at);
            let focused = scene
                .selection_target(handle)
                .is_some_and(|id| scene.focused() == Some(id));
            let stroke_width = if focused { 3.0 } else { 1.0 };
            svg.push_str("<g>");
            svg.push_str(&format!("<title>{}</title>", escape_xml(&spec.title)));
            svg.push_str(&format!(
                "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"#DDDDDD\" stroke=\"{}\" stroke-width=\"{stroke_width}\"/>",
                spec.width, spec.height, config.callout_border
            ));
            if !spec.thumbnail_url.is_empty() {
                svg.push_str(&format!(
                    "<image x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" preserveAspectRatio=\"xMidYMid slice\" xlink:href=\"{}\"/>",
                    spec.width,
                    spec.height,
                    escape_xml(&spec.thumbnail_url)
                ));
            }
            svg.push_str("</g>");
        }
    }

    svg.push_str("</svg>");
    svg
}

/// Render the scene and write the SVG snapshot to `path`.
pub fn write_svg(path: &Path, scene: &Scene, config: &RenderConfig) -> Result<()> {
    let svg = render_svg(scene, config);
    std::fs::write(path, svg).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
