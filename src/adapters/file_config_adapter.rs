//! INI file configuration adapter.

use crate::domain::error::SentiquantError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SentiquantError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| SentiquantError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    /// Section names present in the file, lowercased and sorted.
    pub fn sections(&self) -> Vec<String> {
        let mut sections = self.config.sections();
        sections.sort();
        sections
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const SAMPLE: &str = r#"
[backtest]
symbol = BTC/USDT
strategy = combined
initial_capital = 25000.5
min_bars = 80

[strategy]
buy_threshold = 0.4

[sentiment]
enabled = no
cache_dir = /var/cache/sentiquant
"#;

    #[test]
    fn from_string_reads_every_section() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.sections(), vec!["backtest", "sentiment", "strategy"]);
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("BTC/USDT".to_string())
        );
        assert_eq!(adapter.get_int("backtest", "min_bars", 60), 80);
        assert_eq!(adapter.get_double("backtest", "initial_capital", 0.0), 25000.5);
        assert_eq!(adapter.get_double("strategy", "buy_threshold", 0.45), 0.4);
        assert!(!adapter.get_bool("sentiment", "enabled", true));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("backtest", "timeframe"), None);
        assert_eq!(adapter.get_string("results", "path"), None);
        assert_eq!(adapter.get_int("results", "capacity", 100), 100);
        assert_eq!(adapter.get_double("strategy", "sell_threshold", 0.45), 0.45);
        assert!(adapter.get_bool("backtest", "missing", true));
    }

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nmin_bars = many\ninitial_capital = rich\n[sentiment]\nenabled = maybe\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("backtest", "min_bars", 60), 60);
        assert_eq!(adapter.get_double("backtest", "initial_capital", 1.0), 1.0);
        assert!(adapter.get_bool("sentiment", "enabled", true));
    }

    #[test]
    fn bool_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[sentiment]\na = true\nb = YES\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        for key in ["a", "b", "c"] {
            assert!(adapter.get_bool("sentiment", key, false), "{key}");
        }
        for key in ["d", "e", "f"] {
            assert!(!adapter.get_bool("sentiment", key, true), "{key}");
        }
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config(SAMPLE);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sentiment", "cache_dir"),
            Some("/var/cache/sentiquant".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/sentiquant.ini")
            .err()
            .unwrap();
        match err {
            SentiquantError::ConfigParse { file, .. } => {
                assert_eq!(file, "/nonexistent/path/sentiquant.ini")
            }
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }
}
