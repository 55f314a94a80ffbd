use dotenv::var;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse {value:?}")]
    Parse { name: &'static str, value: String },
    #[error("{name}: expected {expected} pins, got {got}")]
    PinCount {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{0}: unknown GPIO backend, expected `gpiod` or `sim`")]
    Backend(String),
    #[error("{}: cannot read config", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: malformed config", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the pin writes go.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Backend {
    /// A Linux GPIO character device.
    Gpiod(PathBuf),
    /// In-memory lines, for running without hardware.
    Sim,
}

/// Wiring of the display, read from the environment (and `.env`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PinConfig {
    pub backend: Backend,
    pub pin_rs: usize,
    pub pin_e: usize,
    /// D4, D5, D6, D7.
    pub pins_data: [usize; 4],
    pub cols: u8,
    pub lines: u8,
    pub data_active_low: bool,
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Parse { name, value }),
        Err(_) => Ok(default),
    }
}

/// Parses a list of pin numbers separated by commas, spaces or semicolons.
pub fn parse_pin_bus<const N: usize>(name: &'static str, pin_str: &str) -> Result<[usize; N], ConfigError> {
    let pins = pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::Parse {
                name,
                value: s.to_string(),
            })
        })
        .collect::<Result<Vec<usize>, _>>()?;
    let got = pins.len();
    pins.try_into().map_err(|_| ConfigError::PinCount {
        name,
        expected: N,
        got,
    })
}

impl PinConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match var("PILCD_GPIO_BACKEND").as_deref().unwrap_or("gpiod") {
            "gpiod" => Backend::Gpiod(env_or("PILCD_GPIO_CHIP", PathBuf::from("/dev/gpiochip0"))?),
            "sim" => Backend::Sim,
            other => return Err(ConfigError::Backend(other.to_string())),
        };

        let pins_data = match var("PILCD_LCD_PINS_DATA") {
            Ok(pins) => parse_pin_bus("PILCD_LCD_PINS_DATA", &pins)?,
            Err(_) => [17, 18, 27, 22],
        };

        Ok(PinConfig {
            backend,
            pin_rs: env_or("PILCD_LCD_PIN_RS", 24)?,
            pin_e: env_or("PILCD_LCD_PIN_E", 23)?,
            pins_data,
            cols: env_or("PILCD_LCD_COLS", 16)?,
            lines: env_or("PILCD_LCD_LINES", 2)?,
            data_active_low: env_or("PILCD_LCD_DATA_ACTIVE_LOW", false)?,
        })
    }

    /// Highest pin number used, for sizing a simulated chip.
    pub fn max_pin(&self) -> usize {
        self.pins_data
            .iter()
            .copied()
            .chain([self.pin_rs, self.pin_e])
            .max()
            .unwrap_or_default()
    }
}

/// Messages to cycle through, stored as JSON.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct Config {
    pub messages: Vec<String>,
    /// Time each message stays on the display.
    pub interval_ms: u64,
}

impl Config {
    fn path() -> PathBuf {
        PathBuf::from(var("PILCD_CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string()))
    }

    /// Loads the config file named by `PILCD_CONFIG_FILE`, `config.json` by default.
    pub fn try_load() -> Result<Option<Self>, ConfigError> {
        Self::load_from(&Self::path())
    }

    /// Reads the config at `path`. A missing file is `Ok(None)`. A file that exists but can't be
    /// read or parsed is an error, so it never gets replaced by the defaults.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map(Some)
            .map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(Self::path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            messages: vec![
                " LCD 1602 Test \n123456789ABCDEF".to_string(),
                " Hello, geeks !\nHello World ! :)".to_string(),
                "  Raspberry Pi\n  HD44780 4-bit".to_string(),
            ],
            interval_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_bus_accepts_mixed_separators() {
        let pins: [usize; 4] = parse_pin_bus("TEST", "17, 18;27 22").unwrap();
        assert_eq!(pins, [17, 18, 27, 22]);
    }

    #[test]
    fn pin_bus_rejects_wrong_count() {
        let err = parse_pin_bus::<4>("TEST", "1,2,3").unwrap_err();
        assert!(matches!(err, ConfigError::PinCount { expected: 4, got: 3, .. }));
    }

    #[test]
    fn pin_bus_rejects_garbage() {
        let err = parse_pin_bus::<4>("TEST", "1,2,x,4").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref value, .. } if value == "x"));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<Config>(&json).unwrap(), config);
    }

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pilcd-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn missing_config_loads_as_none() {
        let path = scratch_file("missing");
        let _ = std::fs::remove_file(&path);
        assert!(Config::load_from(&path).unwrap().is_none());
    }

    #[test]
    fn valid_config_loads() {
        let path = scratch_file("valid");
        std::fs::write(&path, r#"{"messages":["hi"],"interval_ms":500}"#).unwrap();

        let config = Config::load_from(&path).unwrap().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.messages, ["hi"]);
        assert_eq!(config.interval_ms, 500);
    }

    #[test]
    fn malformed_config_is_an_error_and_left_alone() {
        let path = scratch_file("malformed");
        let content = r#"{"messages":["hi"],"interval_ms":"#;
        std::fs::write(&path, content).unwrap();

        let err = Config::load_from(&path).unwrap_err();
        let left = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, ConfigError::Malformed { path: ref at, .. } if *at == path));
        assert_eq!(left, content);
    }

    #[test]
    fn max_pin_covers_every_line() {
        let pins = PinConfig {
            backend: Backend::Sim,
            pin_rs: 24,
            pin_e: 23,
            pins_data: [17, 18, 27, 22],
            cols: 16,
            lines: 2,
            data_active_low: false,
        };
        assert_eq!(pins.max_pin(), 27);
    }
}
