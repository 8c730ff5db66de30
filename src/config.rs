use std::path::{Path, PathBuf};

use crate::engine::AcquisitionRequest;
use crate::locale::locale_tag_from_env;

pub const ENV_FILE: &str = ".scanner_env";

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub request: AcquisitionRequest,
    pub output_dir: PathBuf,
    pub locale_tag: String,
    pub demo_pages: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            request: AcquisitionRequest::default(),
            output_dir: PathBuf::from("scans"),
            locale_tag: locale_tag_from_env(),
            demo_pages: 2,
        }
    }
}

pub fn load_config() -> Result<ScanConfig, String> {
    load_config_from(Path::new(ENV_FILE))
}

pub fn load_config_from(env_path: &Path) -> Result<ScanConfig, String> {
    if !env_path.exists() {
        return Err(format!("{} file not found", env_path.display()));
    }

    let entries: Vec<(String, String)> = dotenvy::from_path_iter(env_path)
        .map_err(|e| format!("Failed to read {}: {e}", env_path.display()))?
        .filter_map(|item| item.ok())
        .collect();

    let get = |key: &str| -> Option<String> {
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    let mut config = ScanConfig::default();

    // A profile provides the base request; individual keys override it.
    if let Some(profile) = get("SCAN_PROFILE") {
        let profile_path = env_path
            .parent()
            .map(|dir| dir.join(&profile))
            .unwrap_or_else(|| PathBuf::from(&profile));
        config.request = load_profile(&profile_path)?;
    }

    if let Some(v) = get("SCAN_PIXEL_TYPE") {
        config.request.pixel_type = v.parse()?;
    }
    if let Some(v) = get("SCAN_RESOLUTION") {
        config.request.resolution = v
            .parse::<f32>()
            .map_err(|e| format!("Invalid SCAN_RESOLUTION: {e}"))?;
    }
    if let Some(v) = get("SCAN_DUPLEX") {
        config.request.duplex = parse_flag("SCAN_DUPLEX", &v)?;
    }
    if let Some(v) = get("SCAN_FEEDER") {
        config.request.feeder = parse_flag("SCAN_FEEDER", &v)?;
    }
    if let Some(v) = get("SCAN_SHOW_DIALOG") {
        config.request.show_selection_dialog = parse_flag("SCAN_SHOW_DIALOG", &v)?;
    }
    if let Some(v) = get("SCAN_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(v);
    }
    if let Some(v) = get("SCAN_LOCALE") {
        config.locale_tag = v;
    }
    if let Some(v) = get("SCAN_DEMO_PAGES") {
        config.demo_pages = v
            .parse::<u32>()
            .map_err(|e| format!("Invalid SCAN_DEMO_PAGES: {e}"))?;
    }

    Ok(config)
}

pub fn load_profile(path: &Path) -> Result<AcquisitionRequest, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read profile {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("Invalid profile {}: {e}", path.display()))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("Invalid {key}: '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::models::PixelType;

    #[test]
    fn missing_env_file_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_from(&dir.path().join(".scanner_env"));
        assert!(result.unwrap_err().contains("not found"));
    }

    #[test]
    fn env_keys_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".scanner_env");
        std::fs::write(
            &path,
            "SCAN_PIXEL_TYPE=gray\nSCAN_RESOLUTION=300\nSCAN_DUPLEX=no\nSCAN_LOCALE=es-ES\nSCAN_OUTPUT_DIR=/tmp/out\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.request.pixel_type, PixelType::Gray);
        assert_eq!(config.request.resolution, 300.0);
        assert!(!config.request.duplex);
        assert!(config.request.feeder);
        assert_eq!(config.locale_tag, "es-ES");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.demo_pages, 2);
    }

    #[test]
    fn profile_is_read_relative_to_env_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("office.json"),
            r#"{ "pixel_type": "rgb", "resolution": 600, "duplex": false }"#,
        )
        .unwrap();
        let path = dir.path().join(".scanner_env");
        std::fs::write(&path, "SCAN_PROFILE=office.json\nSCAN_RESOLUTION=300\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.request.pixel_type, PixelType::Rgb);
        assert_eq!(config.request.resolution, 300.0);
        assert!(!config.request.duplex);
    }

    #[test]
    fn bad_values_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".scanner_env");
        std::fs::write(&path, "SCAN_DUPLEX=maybe\n").unwrap();

        assert_eq!(
            load_config_from(&path).unwrap_err(),
            "Invalid SCAN_DUPLEX: 'maybe'"
        );
    }
}
