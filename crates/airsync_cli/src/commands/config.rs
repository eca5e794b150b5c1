//! Config command implementation.

use airsync_engine::EngineConfig;
use std::fs;
use std::path::Path;
use tracing::info;

/// Loads the engine configuration, falling back to the defaults when no
/// file is given. Missing fields take their default values.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    info!("Loading configuration from {:?}", path);
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read configuration {}: {e}", path.display()))?;
    let config = parse(&text)?;
    Ok(config)
}

fn parse(text: &str) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config: EngineConfig = serde_json::from_str(text)?;
    if config.default_window_size == 0 || config.max_window_size == 0 {
        return Err("window sizes must be positive".into());
    }
    if config.ping_interval.is_zero() {
        return Err("ping_interval must be positive".into());
    }
    Ok(config)
}

/// Prints the effective configuration as JSON.
pub fn run(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse(r#"{ "ping_interval": 10, "provisioning": true }"#).unwrap();
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert!(config.provisioning);
        assert_eq!(config.max_window_size, EngineConfig::default().max_window_size);
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(parse(r#"{ "max_window_size": 0 }"#).is_err());
        assert!(parse(r#"{ "ping_interval": 0 }"#).is_err());
    }
}
