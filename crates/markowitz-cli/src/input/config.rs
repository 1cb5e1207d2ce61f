use markowitz_core::config::EngineConfig;

use super::file;

/// Load an engine configuration from JSON, or YAML when the file ends in
/// `.yaml` / `.yml`.
pub fn read_config(path: &str) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let (canonical, contents) = file::read_text(path)?;
    let is_yaml = canonical
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let config = if is_yaml {
        parse_yaml(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    } else {
        EngineConfig::from_json_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    };
    config.validate()?;
    Ok(config)
}

fn parse_yaml(contents: &str) -> Result<EngineConfig, serde_yaml::Error> {
    serde_yaml::from_str(contents)
}
