//! Configuration loader for the metatracker service.
//!
//! Loads a mission configuration YAML file and merges it over the built-in
//! HERMES defaults: any top-level key the file leaves out keeps its default.
//!
//! Supports environment variable substitution using ${VAR} syntax.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use tracker_common::MissionConfig;

// ============================================================================
// Loading Functions
// ============================================================================

/// Load a mission configuration YAML file with environment variable substitution.
///
/// The result is not yet validated; see [`resolve_mission_config`].
pub fn load_mission_config<P: AsRef<Path>>(path: P) -> Result<MissionConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read mission config from {:?}", path))?;

    let expanded = expand_env_vars(&content)?;
    if expanded.trim().is_empty() {
        debug!(path = ?path, "Mission config is empty, using defaults");
        return Ok(MissionConfig::default());
    }

    let config: MissionConfig = serde_yaml::from_str(&expanded)
        .with_context(|| format!("Failed to parse mission config from {:?}", path))?;

    Ok(config)
}

/// Build the effective configuration.
///
/// Precedence, lowest first: built-in defaults, the YAML file,
/// `METATRACKER_DB_HOST`, and finally an explicit `db_host` override.
pub fn resolve_mission_config(path: Option<&Path>, db_host: Option<&str>) -> Result<MissionConfig> {
    let mut config = match path {
        Some(path) => load_mission_config(path)?,
        None => MissionConfig::default(),
    };

    config.apply_env_overrides();
    if let Some(db_host) = db_host.filter(|h| !h.trim().is_empty()) {
        config.db_host = db_host.to_string();
    }

    config.validate().context("Invalid mission configuration")?;

    info!(
        mission = %config.mission_name,
        db_host = %config.db_host,
        instruments = config.instruments.len(),
        configurations = config.instrument_configurations.len(),
        "Loaded mission configuration"
    );
    Ok(config)
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content.
/// Supports ${VAR} and ${VAR:-default} syntax. Full-line `#` comments are
/// copied unchanged.
pub(crate) fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
        } else {
            expand_line(line, &mut result)?;
        }
    }
    Ok(result)
}

fn expand_line(line: &str, result: &mut String) -> Result<()> {
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next(); // consume '{'

        let mut var_expr = String::new();
        let mut depth = 1;
        while depth > 0 {
            match chars.next() {
                Some('{') => {
                    depth += 1;
                    var_expr.push('{');
                }
                Some('}') => {
                    depth -= 1;
                    if depth > 0 {
                        var_expr.push('}');
                    }
                }
                Some(c) => var_expr.push(c),
                None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
            }
        }

        result.push_str(&resolve_var_expr(&var_expr)?);
    }

    Ok(())
}

/// Resolve a variable expression (`VAR` or `VAR:-default`).
fn resolve_var_expr(expr: &str) -> Result<String> {
    match expr.split_once(":-") {
        Some((name, default)) => match std::env::var(name.trim()) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Ok(default.to_string()),
        },
        None => std::env::var(expr.trim())
            .with_context(|| format!("Environment variable {} not set", expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("METATRACKER_TEST_MISSION", "padre");
        let result = expand_env_vars("mission_name: ${METATRACKER_TEST_MISSION}").unwrap();
        assert_eq!(result, "mission_name: padre");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("METATRACKER_TEST_UNSET");
        let result = expand_env_vars("db_host: ${METATRACKER_TEST_UNSET:-sqlite::memory:}").unwrap();
        assert_eq!(result, "db_host: sqlite::memory:");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("METATRACKER_TEST_REQUIRED");
        assert!(expand_env_vars("${METATRACKER_TEST_REQUIRED}").is_err());
        assert!(expand_env_vars("${UNCLOSED").is_err());
    }

    #[test]
    fn test_comment_lines_are_not_expanded() {
        std::env::remove_var("METATRACKER_TEST_COMMENTED");
        let content = "# set ${METATRACKER_TEST_COMMENTED} to override\n  # ${ALSO_UNSET:-x}\nmission_name: hermes\n";
        assert_eq!(expand_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_plain_dollar_is_kept() {
        assert_eq!(expand_env_vars("cost: $5").unwrap(), "cost: $5");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mission_name: padre").unwrap();
        let config = load_mission_config(file.path()).unwrap();
        assert_eq!(config.mission_name, "padre");
        assert_eq!(config.file_types.len(), 2);
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(load_mission_config(file.path()).unwrap(), MissionConfig::default());
    }

    #[test]
    fn test_db_host_override_wins() {
        let config = resolve_mission_config(None, Some("sqlite:///tmp/override.db")).unwrap();
        assert_eq!(config.db_host, "sqlite:///tmp/override.db");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mission_name: \"bad name\"").unwrap();
        assert!(resolve_mission_config(Some(file.path()), None).is_err());
    }
}
