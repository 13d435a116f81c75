use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Remote backend coordinates, taken from the environment. Absent when the
/// host runs local-only.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
}

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub remote: Option<RemoteConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "fuelog").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("fuelog.db");

        let remote = match (
            std::env::var("FUELOG_SUPABASE_URL"),
            std::env::var("FUELOG_SUPABASE_ANON_KEY"),
        ) {
            (Ok(url), Ok(anon_key)) if !url.is_empty() && !anon_key.is_empty() => {
                Some(RemoteConfig { url, anon_key })
            }
            _ => None,
        };

        Ok(Config {
            db_path,
            data_dir,
            remote,
        })
    }
}
