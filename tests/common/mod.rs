//! Shared helpers for the integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Binary command isolated from the caller's home directory and env.
pub fn persona_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stepone-persona").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("STEPONE_CONFIG")
        .env_remove("STEPONE_PERSONA_DIR")
        .env_remove("STEPONE_LOG_LEVEL")
        .env_remove("GROQ_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}
