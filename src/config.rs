use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;

use crate::clock;
use crate::models::Config;

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    validate(&config).with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    timezone(config)?;
    config.workday.window()?;
    config.workday.granularity()?;
    if config.api.resync_secs == 0 {
        bail!("api.resync_secs must be at least 1");
    }

    let mut seen = HashSet::new();
    for b in &config.boxes {
        if !seen.insert(b.id) {
            bail!("Box {} is listed twice", b.id);
        }
    }
    Ok(())
}

pub fn timezone(config: &Config) -> Result<Tz> {
    clock::parse_timezone(&config.timezone)
        .with_context(|| format!("Unknown timezone '{}'", config.timezone))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
timezone = "America/Santiago"

[api]
base_url = "http://localhost:8000/api"
push_url = "ws://localhost:8000/ws/boxes/"

[workday]
start = "08:00"
end = "18:00"
granularity_minutes = 30

[[boxes]]
id = 1
corridor = "A"

[[boxes]]
id = 2
"#;

    #[test]
    fn test_parse_sample() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.api.timeout_secs, 10);
        assert_eq!(cfg.api.reconnect_secs, 5);
        assert_eq!(cfg.api.resync_secs, 60);
        assert_eq!(cfg.boxes.len(), 2);
        assert_eq!(cfg.boxes[0].corridor.as_deref(), Some("A"));
        assert_eq!(cfg.workday.window().unwrap().minutes(), 600);
    }

    #[test]
    fn test_workday_defaults() {
        let cfg: Config = toml::from_str("[api]\nbase_url = \"http://x\"\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.workday.granularity_minutes, 30);
        assert!(cfg.boxes.is_empty());
    }

    #[test]
    fn test_rejects_bad_values() {
        let inverted = SAMPLE.replace("end = \"18:00\"", "end = \"07:00\"");
        let cfg: Config = toml::from_str(&inverted).unwrap();
        assert!(validate(&cfg).is_err());

        let duplicate = SAMPLE.replace("id = 2", "id = 1");
        let cfg: Config = toml::from_str(&duplicate).unwrap();
        assert!(validate(&cfg).is_err());

        let tz = SAMPLE.replace("America/Santiago", "Nowhere/City");
        let cfg: Config = toml::from_str(&tz).unwrap();
        assert!(validate(&cfg).is_err());

        let no_resync = SAMPLE.replace("[api]\n", "[api]\nresync_secs = 0\n");
        let cfg: Config = toml::from_str(&no_resync).unwrap();
        assert_eq!(cfg.api.resync_secs, 0);
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.boxes[1].id, 2);
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
