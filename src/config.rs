use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_TICK_INTERVAL_MS: u64 = 30;

/// Inclusive range the connector target separation is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparationBand {
    pub min: f64,
    pub max: f64,
}

impl SeparationBand {
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for SeparationBand {
    fn default() -> Self {
        Self {
            min: 10.0,
            max: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub separation: SeparationBand,
    /// Seed for the separation sampler. `None` draws from OS entropy.
    pub separation_seed: Option<u64>,
    pub callout_width: f64,
    pub callout_height: f64,
    /// Radius around a pin that foreign callouts are pushed out of.
    pub pin_radius: f64,
    pub spring_strength: f64,
    pub repulsion_strength: f64,
    pub pin_repulsion_strength: f64,
    pub initial_step_size: f64,
    pub max_displacement: f64,
    pub cooling_factor: f64,
    pub convergence_threshold: f64,
    pub max_iterations: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            separation: SeparationBand::default(),
            separation_seed: None,
            callout_width: 50.0,
            callout_height: 50.0,
            pin_radius: 5.0,
            spring_strength: 0.35,
            repulsion_strength: 0.5,
            pin_repulsion_strength: 0.25,
            initial_step_size: 1.0,
            max_displacement: 12.0,
            cooling_factor: 0.9,
            convergence_threshold: 0.05,
            max_iterations: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub tick_interval_ms: u64,
    /// Zoom level the map animates to when the user's location resolves.
    pub locate_zoom: f64,
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            locate_zoom: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Pixel distance under which a reprojected anchor counts as unmoved.
    pub anchor_epsilon: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            anchor_epsilon: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f64,
    pub height: f64,
    pub background: String,
    pub pin_size: f64,
    pub pin_color: String,
    pub connector_color: String,
    pub connector_width: f64,
    pub callout_border: String,
    /// Offset of the callout's bottom-left corner from its position, in
    /// pixels. The default centres a 50x50 callout on its position.
    pub callout_offset: (f64, f64),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            pin_size: 10.0,
            pin_color: "#2B2B2B".to_string(),
            connector_color: "#4ED34E".to_string(),
            connector_width: 2.0,
            callout_border: "#FFFFFF".to_string(),
            callout_offset: (-25.0, 25.0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub session: SessionConfig,
    pub gate: GateConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOverrides {
    separation_min: Option<f64>,
    separation_max: Option<f64>,
    separation_seed: Option<u64>,
    callout_width: Option<f64>,
    callout_height: Option<f64>,
    pin_radius: Option<f64>,
    spring_strength: Option<f64>,
    repulsion_strength: Option<f64>,
    pin_repulsion_strength: Option<f64>,
    initial_step_size: Option<f64>,
    max_displacement: Option<f64>,
    cooling_factor: Option<f64>,
    convergence_threshold: Option<f64>,
    max_iterations: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionOverrides {
    tick_interval_ms: Option<u64>,
    locate_zoom: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GateOverrides {
    anchor_epsilon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderOverrides {
    width: Option<f64>,
    height: Option<f64>,
    background: Option<String>,
    pin_size: Option<f64>,
    pin_color: Option<String>,
    connector_color: Option<String>,
    connector_width: Option<f64>,
    callout_border: Option<String>,
    callout_offset: Option<(f64, f64)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutOverrides>,
    session: Option<SessionOverrides>,
    gate: Option<GateOverrides>,
    render: Option<RenderOverrides>,
}

/// Load a configuration file (JSON5) and layer it over the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    let mut config = Config::default();

    if let Some(vars) = parsed.layout {
        let layout = &mut config.layout;
        let min = vars.separation_min.unwrap_or(layout.separation.min);
        let max = vars.separation_max.unwrap_or(layout.separation.max);
        layout.separation = SeparationBand::new(min, max);
        if vars.separation_seed.is_some() {
            layout.separation_seed = vars.separation_seed;
        }
        if let Some(v) = vars.callout_width {
            layout.callout_width = v;
        }
        if let Some(v) = vars.callout_height {
            layout.callout_height = v;
        }
        if let Some(v) = vars.pin_radius {
            layout.pin_radius = v;
        }
        if let Some(v) = vars.spring_strength {
            layout.spring_strength = v;
        }
        if let Some(v) = vars.repulsion_strength {
            layout.repulsion_strength = v;
        }
        if let Some(v) = vars.pin_repulsion_strength {
            layout.pin_repulsion_strength = v;
        }
        if let Some(v) = vars.initial_step_size {
            layout.initial_step_size = v;
        }
        if let Some(v) = vars.max_displacement {
            layout.max_displacement = v;
        }
        if let Some(v) = vars.cooling_factor {
            layout.cooling_factor = v;
        }
        if let Some(v) = vars.convergence_threshold {
            layout.convergence_threshold = v;
        }
        if let Some(v) = vars.max_iterations {
            layout.max_iterations = v;
        }
    }

    if let Some(vars) = parsed.session {
        if let Some(v) = vars.tick_interval_ms {
            // A zero cadence would spin the host timer.
            if v > 0 {
                config.session.tick_interval_ms = v;
            }
        }
        if let Some(v) = vars.locate_zoom {
            config.session.locate_zoom = v;
        }
    }

    if let Some(vars) = parsed.gate {
        if let Some(v) = vars.anchor_epsilon {
            config.gate.anchor_epsilon = v.max(0.0);
        }
    }

    if let Some(vars) = parsed.render {
        let render = &mut config.render;
        if let Some(v) = vars.width {
            render.width = v;
        }
        if let Some(v) = vars.height {
            render.height = v;
        }
        if let Some(v) = vars.background {
            render.background = v;
        }
        if let Some(v) = vars.pin_size {
            render.pin_size = v;
        }
        if let Some(v) = vars.pin_color {
            render.pin_color = v;
        }
        if let Some(v) = vars.connector_color {
            render.connector_color = v;
        }
        if let Some(v) = vars.connector_width {
            render.connector_width = v;
        }
        if let Some(v) = vars.callout_border {
            render.callout_border = v;
        }
        if let Some(v) = vars.callout_offset {
            render.callout_offset = v;
        }
    }

    Ok(config)
}
