use crate::error::{Result, StudioError};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Where the client keeps its durable state (token, active job).
pub fn state_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "StemStudio", "stem-studio")
        .ok_or(StudioError::StateDirUnavailable)?;
    Ok(PathBuf::from(proj.data_dir()))
}
