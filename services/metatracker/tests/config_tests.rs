//! Tests for the sample mission configurations.

use metatracker::{load_mission_config, resolve_mission_config};
use test_utils::{sample_config, seeded_catalog};
use tracker_common::MissionConfig;

#[test]
fn test_hermes_sample_matches_defaults() {
    let config = load_mission_config(sample_config("hermes.yaml")).unwrap();
    config.validate().unwrap();

    let defaults = MissionConfig::default();
    assert_eq!(config.mission_name, defaults.mission_name);
    assert_eq!(config.instruments, defaults.instruments);
    assert_eq!(config.file_levels, defaults.file_levels);
    assert_eq!(config.file_types, defaults.file_types);
    assert_eq!(config.instrument_codes, defaults.instrument_codes);
    assert_eq!(config.instrument_configurations.len(), 4);
    for (sample, default) in config
        .instrument_configurations
        .iter()
        .zip(&defaults.instrument_configurations)
    {
        assert_eq!(sample.instrument_ids(), default.instrument_ids());
    }
}

#[test]
fn test_padre_sample_is_valid() {
    let config = load_mission_config(sample_config("padre.yaml")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.mission_name, "padre");
    assert_eq!(config.slot_count(), 2);
    assert_eq!(config.table_name("science_file"), "padre_science_file");
}

#[tokio::test]
async fn test_padre_sample_seeds_multi_instrument_configuration() {
    let mut config = load_mission_config(sample_config("padre.yaml")).unwrap();
    config.db_host = "sqlite::memory:".to_string();
    let catalog = seeded_catalog(&config).await;

    let mut conn = catalog.acquire().await.unwrap();
    let configurations = catalog.instrument_configurations(&mut conn).await.unwrap();
    assert_eq!(configurations.len(), 3);
}

#[test]
fn test_resolve_hermes_sample_with_and_without_env() {
    let path = sample_config("hermes.yaml");

    std::env::remove_var("METATRACKER_DB_HOST");
    let config = resolve_mission_config(Some(&path), None).unwrap();
    assert_eq!(config.mission_name, "hermes");
    assert_eq!(config.db_host, "sqlite://hermes_catalog.db?mode=rwc");

    std::env::set_var("METATRACKER_DB_HOST", "sqlite::memory:");
    let from_env = resolve_mission_config(Some(&path), None);
    let with_flag = resolve_mission_config(Some(&path), Some("sqlite:///tmp/flag.db"));
    std::env::remove_var("METATRACKER_DB_HOST");

    assert_eq!(from_env.unwrap().db_host, "sqlite::memory:");
    assert_eq!(with_flag.unwrap().db_host, "sqlite:///tmp/flag.db");
}

#[test]
fn test_resolve_padre_sample() {
    let config = resolve_mission_config(Some(&sample_config("padre.yaml")), Some("sqlite::memory:")).unwrap();
    assert_eq!(config.mission_name, "padre");
    assert_eq!(config.instrument_codes["SHP"], "sharp");
}
