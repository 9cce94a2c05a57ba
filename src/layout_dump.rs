use crate::render::{Scene, Visual};
use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct SceneDump {
    pub focused: Option<String>,
    pub pins: Vec<PointDump>,
    pub callouts: Vec<CalloutDump>,
    pub connectors: Vec<ConnectorDump>,
}

#[derive(Debug, Serialize)]
pub struct PointDump {
    pub handle: u64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize)]
pub struct CalloutDump {
    pub handle: u64,
    pub photo: Option<String>,
    pub title: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub handle: u64,
    pub points: [[f64; 2]; 2],
    pub length: f64,
}

impl SceneDump {
    pub fn from_scene(scene: &Scene) -> Self {
        let mut pins = Vec::new();
        let mut callouts = Vec::new();
        let mut connectors = Vec::new();
        for (handle, visual) in scene.visuals() {
            match visual {
                Visual::Pin { at, .. } => pins.push(PointDump {
                    handle: handle.raw(),
                    x: at.x,
                    y: at.y,
                }),
                Visual::Callout { at, spec } => callouts.push(CalloutDump {
                    handle: handle.raw(),
                    photo: scene.selection_target(handle).map(|id| id.to_string()),
                    title: spec.title.clone(),
                    x: at.x,
                    y: at.y,
                    width: spec.width,
                    height: spec.height,
                }),
                Visual::Connector { from, to } => connectors.push(ConnectorDump {
                    handle: handle.raw(),
                    points: [[from.x, from.y], [to.x, to.y]],
                    length: from.distance(*to),
                }),
            }
        }
        Self {
            focused: scene.focused().map(|id| id.to_string()),
            pins,
            callouts,
            connectors,
        }
    }
}

pub fn write_dump(path: &Path, scene: &Scene) -> Result<()> {
    let dump = SceneDump::from_scene(scene);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
