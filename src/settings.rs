use std::time::Duration;

use anyhow::{Context, ensure};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

use figure8_kinematics::{CurveFamily, CurveParameters};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const LOCAL_CONFIG_PATH: &str = "config/local.toml";
const ENV_PREFIX: &str = "FIGURE8";

/// Upper bound on the pre-allocated path buffer (points).
const MAX_PATH_PREALLOC: usize = 1 << 20;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub curve: CurveSettings,
    pub control: ControlSettings,
    pub frame: FrameSettings,
    #[serde(default)]
    pub bus: BusSettings,
    #[serde(default)]
    pub visualization: VisualizationSettings,
    #[serde(default)]
    pub watchdog: WatchdogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurveSettings {
    pub family: CurveFamily,
    pub width: f64,
    pub height: f64,
    pub period: f64,
}

impl CurveSettings {
    pub fn parameters(&self) -> CurveParameters {
        CurveParameters::new(self.width, self.height, self.period)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlSettings {
    pub tick_rate_hz: f64,
    #[serde(default = "default_path_publish_every")]
    pub path_publish_every: u32,
}

fn default_path_publish_every() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameSettings {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub yaw: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    pub velocity_capacity: usize,
    pub path_capacity: usize,
    /// Every command goes out on each of these. The first one feeds telemetry.
    #[serde(default = "default_velocity_topics")]
    pub velocity_topics: Vec<String>,
}

fn default_velocity_topics() -> Vec<String> {
    vec!["cmd_vel".to_string()]
}

impl Default for BusSettings {
    fn default() -> Self {
        BusSettings { velocity_capacity: 16, path_capacity: 4, velocity_topics: default_velocity_topics() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualizationSettings {
    pub enabled: bool,
    /// Pixels per meter.
    pub scale: f32,
}

impl Default for VisualizationSettings {
    fn default() -> Self {
        VisualizationSettings { enabled: true, scale: 60.0 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WatchdogSettings {
    pub period_ms: u64,
    pub stall_timeout_ms: u64,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        WatchdogSettings { period_ms: 25, stall_timeout_ms: 100 }
    }
}

impl Settings {
    /// Checks everything the libraries don't check themselves. Curve
    /// parameters are validated when the curve is bound.
    pub fn validate(&self) -> anyhow::Result<()> {
        let rate = self.control.tick_rate_hz;
        ensure!(rate.is_finite() && rate > 0.0, "control.tick_rate_hz must be positive, got {}", rate);
        ensure!(
            Duration::try_from_secs_f64(1.0 / rate).is_ok(),
            "control.tick_rate_hz is too low, got {}",
            rate
        );
        ensure!(self.control.path_publish_every >= 1, "control.path_publish_every must be at least 1");
        ensure!(self.bus.velocity_capacity >= 1, "bus.velocity_capacity must be at least 1");
        ensure!(self.bus.path_capacity >= 1, "bus.path_capacity must be at least 1");
        ensure!(!self.bus.velocity_topics.is_empty(), "bus.velocity_topics must name at least one topic");
        for (i, name) in self.bus.velocity_topics.iter().enumerate() {
            ensure!(!name.trim().is_empty(), "bus.velocity_topics[{}] is empty", i);
            ensure!(
                !self.bus.velocity_topics[..i].contains(name),
                "bus.velocity_topics lists `{}` twice",
                name
            );
        }
        ensure!(self.watchdog.period_ms >= 1, "watchdog.period_ms must be at least 1");
        ensure!(self.visualization.scale > 0.0, "visualization.scale must be positive");
        Ok(())
    }

    /// Points one traversal produces, used to pre-allocate the path buffer.
    pub fn path_capacity_hint(&self) -> usize {
        let points = self.curve.period * self.control.tick_rate_hz;
        if points.is_finite() && points > 0.0 {
            (points.ceil() as usize).min(MAX_PATH_PREALLOC)
        } else {
            0
        }
    }
}

/// `FIGURE8_<SECTION>__<KEY>`, e.g. `FIGURE8_CURVE__PERIOD=30`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__").try_parsing(true)
}

pub fn load_config() -> Result<Config, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let settings = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true))
        .add_source(File::new(LOCAL_CONFIG_PATH, FileFormat::Toml).required(false))
        .add_source(environment())
        .build();

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

pub fn settings_from(config: Config) -> anyhow::Result<Settings> {
    let settings: Settings = config.try_deserialize().context("malformed configuration")?;
    settings.validate().context("invalid configuration")?;
    Ok(settings)
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let config = load_config().context("failed to load configuration")?;
    settings_from(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;

    const DEFAULT_TOML: &str = include_str!("../config/default.toml");

    fn parse(toml: &str) -> anyhow::Result<Settings> {
        let config = Config::builder().add_source(File::from_str(toml, FileFormat::Toml)).build()?;
        settings_from(config)
    }

    #[test]
    fn test_default_file_parses() {
        let settings = parse(DEFAULT_TOML).unwrap();
        assert_eq!(settings.curve.family, CurveFamily::FigureEight);
        assert_eq!(settings.curve.parameters(), CurveParameters::new(5.0, 4.0, 60.0));
        assert_eq!(settings.control.tick_rate_hz, 1000.0);
        assert_eq!(settings.frame.parent, "world");
        assert_eq!(settings.frame.yaw, None);
        assert_eq!(settings.path_capacity_hint(), 60_000);
        assert_eq!(settings.bus.velocity_topics, ["cmd_vel", "turtle1/cmd_vel"]);
    }

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let toml = r#"
            [curve]
            family = "periodic_circle"
            width = 1.0
            height = 1.0
            period = 30.0

            [control]
            tick_rate_hz = 50.0

            [frame]
            parent = "world"
            child = "odom"
            yaw = 1.08
        "#;
        let settings = parse(toml).unwrap();
        assert_eq!(settings.curve.family, CurveFamily::PeriodicCircle);
        assert_eq!(settings.control.path_publish_every, 1);
        assert_eq!(settings.frame.yaw, Some(1.08));
        assert_eq!(settings.bus.velocity_capacity, 16);
        assert_eq!(settings.bus.velocity_topics, ["cmd_vel"]);
        assert!(settings.visualization.enabled);
        assert_eq!(settings.watchdog.stall_timeout_ms, 100);
    }

    #[test]
    fn test_rejects_non_positive_tick_rate() {
        let toml = DEFAULT_TOML.replace("tick_rate_hz = 1000.0", "tick_rate_hz = 0.0");
        let err = parse(&toml).unwrap_err();
        assert!(format!("{:#}", err).contains("tick_rate_hz"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let vars = Map::from([
            ("FIGURE8_CURVE__PERIOD".to_string(), "30".to_string()),
            ("FIGURE8_VISUALIZATION__ENABLED".to_string(), "false".to_string()),
            ("OTHER_CURVE__PERIOD".to_string(), "5".to_string()),
        ]);
        let config = Config::builder()
            .add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml))
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap();
        let settings = settings_from(config).unwrap();
        assert_eq!(settings.curve.period, 30.0);
        assert_eq!(settings.curve.width, 5.0);
        assert!(!settings.visualization.enabled);
    }

    #[test]
    fn test_rejects_tick_rate_with_unrepresentable_period() {
        let toml = DEFAULT_TOML.replace("tick_rate_hz = 1000.0", "tick_rate_hz = 1e-25");
        let err = parse(&toml).unwrap_err();
        assert!(format!("{:#}", err).contains("too low"));
    }

    #[test]
    fn test_rejects_duplicate_velocity_topics() {
        let toml = DEFAULT_TOML.replace("\"turtle1/cmd_vel\"", "\"cmd_vel\"");
        let err = parse(&toml).unwrap_err();
        assert!(format!("{:#}", err).contains("twice"));
    }

    #[test]
    fn test_rejects_unknown_family() {
        let toml = DEFAULT_TOML.replace("\"figure_eight\"", "\"spiral\"");
        assert!(parse(&toml).is_err());
    }
}
