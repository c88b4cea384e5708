// Runtime settings for the console front end.
//
// Defaults suit running from a directory holding the two upload files;
// each one can be overridden from the environment.
use std::path::PathBuf;

pub const ENV_GRADER_CSV: &str = "PROMO_GRADER_CSV";
pub const ENV_HISTORICAL_CSV: &str = "PROMO_HISTORICAL_CSV";
pub const ENV_OUTPUT_DIR: &str = "PROMO_OUTPUT_DIR";
pub const ENV_PREVIEW_ROWS: &str = "PROMO_PREVIEW_ROWS";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub grader_input: PathBuf,
    pub historical_input: PathBuf,
    pub output_dir: PathBuf,
    pub preview_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grader_input: PathBuf::from("promotions.csv"),
            historical_input: PathBuf::from("historical_promotions.csv"),
            output_dir: PathBuf::from("."),
            preview_rows: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; unset, blank or unparsable values keep
    /// the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();
        if let Some(p) = get(ENV_GRADER_CSV) {
            cfg.grader_input = PathBuf::from(p);
        }
        if let Some(p) = get(ENV_HISTORICAL_CSV) {
            cfg.historical_input = PathBuf::from(p);
        }
        if let Some(p) = get(ENV_OUTPUT_DIR) {
            cfg.output_dir = PathBuf::from(p);
        }
        if let Some(n) = get(ENV_PREVIEW_ROWS).and_then(|v| v.parse::<usize>().ok()) {
            cfg.preview_rows = n.max(1);
        }
        cfg
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}
