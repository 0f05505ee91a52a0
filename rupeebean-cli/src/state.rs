use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub fn rupeebean_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".rupeebean"))
}

pub fn ensure_rupeebean_home() -> Result<PathBuf> {
    let dir = rupeebean_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Cached BSE company list.
pub fn bse_path() -> Result<PathBuf> {
    Ok(ensure_rupeebean_home()?.join("bse.json"))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(rupeebean_home()?.join("config.toml"))
}
