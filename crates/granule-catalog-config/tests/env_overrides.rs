//! Environment override tests for granule-catalog-config.
// crates/granule-catalog-config/tests/env_overrides.rs
// =============================================================================
// Module: Environment Override Tests
// Description: Validate database overrides from deployment variables.
// Purpose: Ensure the environment layer wins over file values and fails closed.
// =============================================================================

use std::collections::HashMap;
use std::io::Write;

use granule_catalog_config::GranuleCatalogConfig;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

/// Builds an environment lookup from key/value pairs.
fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn env_overrides_every_database_field() -> TestResult {
    let mut config = GranuleCatalogConfig::default();
    let lookup = env_of(&[
        ("DATABASE_HOST", "db.prod"),
        ("DATABASE_PORT", "6432"),
        ("DATABASE_NAME", "orca"),
        ("APPLICATION_USER", "orca_app"),
        ("APPLICATION_PASSWORD", "app-pw"),
        ("ADMIN_DATABASE", "template1"),
        ("ADMIN_USER", "root"),
        ("ADMIN_PASSWORD", "root-pw"),
    ]);
    config.apply_env_overrides(lookup).map_err(|err| err.to_string())?;
    let db = &config.database;
    let actual = (
        db.host.as_str(),
        db.port,
        db.user_database.as_str(),
        db.user_username.as_str(),
        db.user_password.as_str(),
        db.admin_database.as_str(),
        db.admin_username.as_str(),
        db.admin_password.as_str(),
    );
    let expected =
        ("db.prod", 6432, "orca", "orca_app", "app-pw", "template1", "root", "root-pw");
    if actual != expected {
        return Err("environment overrides not applied".to_string());
    }
    Ok(())
}

#[test]
fn env_overrides_ignore_empty_values() -> TestResult {
    let mut config = GranuleCatalogConfig::default();
    let before = config.database.clone();
    config
        .apply_env_overrides(env_of(&[("DATABASE_HOST", ""), ("DATABASE_PORT", "  ")]))
        .map_err(|err| err.to_string())?;
    if config.database != before {
        return Err("empty variables must not override".to_string());
    }
    Ok(())
}

#[test]
fn env_overrides_reject_bad_port() -> TestResult {
    for port in ["not-a-port", "70000", "-1"] {
        let mut config = GranuleCatalogConfig::default();
        match config.apply_env_overrides(env_of(&[("DATABASE_PORT", port)])) {
            Err(err) if err.to_string().contains("DATABASE_PORT") => {}
            Err(err) => return Err(format!("unexpected error for {port}: {err}")),
            Ok(()) => return Err(format!("port {port} should be rejected")),
        }
    }
    Ok(())
}

#[test]
fn env_overrides_win_over_file_values() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[database]\nhost = \"file-host\"\nuser_database = \"file-db\"\n")
        .map_err(|err| err.to_string())?;
    let config = GranuleCatalogConfig::load_with_env(
        Some(file.path()),
        env_of(&[("DATABASE_HOST", "env-host")]),
    )
    .map_err(|err| err.to_string())?;
    if config.database.host != "env-host" {
        return Err("environment should override the file host".to_string());
    }
    if config.database.user_database != "file-db" {
        return Err("unset variables should keep file values".to_string());
    }
    Ok(())
}

#[test]
fn config_env_var_selects_the_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[database]\nhost = \"selected\"\n").map_err(|err| err.to_string())?;
    let path = file.path().to_string_lossy().into_owned();
    let lookup = env_of(&[("GRANULE_CATALOG_CONFIG", path.as_str())]);
    let config =
        GranuleCatalogConfig::load_with_env(None, lookup).map_err(|err| err.to_string())?;
    if config.database.host != "selected" {
        return Err("config path from environment not used".to_string());
    }
    Ok(())
}

#[test]
fn env_overrides_are_validated() -> TestResult {
    match GranuleCatalogConfig::resolve_with_env(None, env_of(&[("DATABASE_PORT", "0")])) {
        Err(err) if err.to_string().contains("port must be non-zero") => Ok(()),
        Err(err) => Err(format!("unexpected error {err}")),
        Ok(_) => Err("port 0 from the environment should be rejected".to_string()),
    }
}
