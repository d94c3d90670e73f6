use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_RADAR_URL: &str = "https://v6.bvg.transport.rest/radar";

/// The line whose movements get recorded
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineFilter {
    /// Product type as reported by the API (e.g. "bus", "tram")
    pub product: String,

    /// Line name, matched exactly and case-sensitively (e.g. "142")
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Half-height and half-width of the bounding box, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Offsets {
    pub latitude: f64,
    pub longitude: f64,
}

/// Fixed parameters sent with every radar request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RadarParams {
    pub base_url: String,
    pub results: u32,
    pub duration: u32,
    pub frames: u32,
    pub timeout_secs: u64,
}

impl Default for RadarParams {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RADAR_URL.to_string(),
            results: 256,
            duration: 60,
            frames: 3,
            timeout_secs: 10,
        }
    }
}

/// Process-lifetime configuration. Built once at startup and handed to each component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub line: LineFilter,
    pub center: Coordinate,
    pub offsets: Offsets,
    pub radar: RadarParams,
    pub interval_secs: u64,
    pub output: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line: LineFilter {
                product: "bus".to_string(),
                name: "142".to_string(),
            },
            center: Coordinate {
                latitude: 52.530282,
                longitude: 13.362429,
            },
            offsets: Offsets {
                latitude: 0.027027,
                longitude: 0.044427,
            },
            radar: RadarParams::default(),
            interval_secs: 10,
            output: PathBuf::from("data/processed/bus_tracking.csv"),
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub product: Option<String>,
    pub line: Option<String>,
    pub output: Option<PathBuf>,
    pub interval_secs: Option<u64>,
}

impl Config {
    /// Load a YAML config file. Keys that are left out keep their default value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading config {}", path_ref.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(product) = overrides.product {
            self.line.product = product;
        }
        if let Some(line) = overrides.line {
            self.line.name = line;
        }
        if let Some(output) = overrides.output {
            self.output = output;
        }
        if let Some(interval) = overrides.interval_secs {
            self.interval_secs = interval;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.line.product.is_empty() {
            anyhow::bail!("line product must not be empty");
        }
        if self.line.name.is_empty() {
            anyhow::bail!("line name must not be empty");
        }
        for (axis, offset) in [
            ("latitude", self.offsets.latitude),
            ("longitude", self.offsets.longitude),
        ] {
            if !offset.is_finite() || offset <= 0.0 {
                anyhow::bail!("{} offset must be a positive number, got {}", axis, offset);
            }
        }
        if !self.center.latitude.is_finite() || !self.center.longitude.is_finite() {
            anyhow::bail!("center coordinate must be finite");
        }
        if self.interval_secs == 0 {
            anyhow::bail!("poll interval must be at least one second");
        }
        if self.radar.timeout_secs == 0 {
            anyhow::bail!("request timeout must be at least one second");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.radar.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.line.name, "142");
        assert_eq!(cfg.interval(), Duration::from_secs(10));
    }

    #[test]
    fn load_fills_missing_keys_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"line:\n  product: tram\n  name: M10\ninterval_secs: 30\n")
            .unwrap();
        let path = temp.into_temp_path();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.line.product, "tram");
        assert_eq!(cfg.line.name, "M10");
        assert_eq!(cfg.interval_secs, 30);
        assert_eq!(cfg.radar, RadarParams::default());
        assert_eq!(cfg.center, Config::default().center);
    }

    #[test]
    fn load_reports_bad_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"interval_secs: [not, a, number]\n").unwrap();
        let path = temp.into_temp_path();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }

    #[test]
    fn overrides_take_precedence() {
        let cfg = Config::default().with_overrides(Overrides {
            line: Some("100".to_string()),
            output: Some(PathBuf::from("/tmp/x.csv")),
            ..Default::default()
        });
        assert_eq!(cfg.line.name, "100");
        assert_eq!(cfg.line.product, "bus");
        assert_eq!(cfg.output, PathBuf::from("/tmp/x.csv"));
    }

    #[test]
    fn validate_rejects_non_positive_offsets() {
        let mut cfg = Config::default();
        cfg.offsets.latitude = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.offsets.longitude = -0.01;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_line() {
        let mut cfg = Config::default();
        cfg.line.name.clear();
        assert!(cfg.validate().is_err());
    }
}
