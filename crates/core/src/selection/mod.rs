//! Pairing of a video file with a script file.
//!
//! Every change of either file re-validates the script and rebuilds the
//! timeline, so the loaded timeline always belongs to the current pair. A
//! script that fails validation leaves nothing loaded.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    script::Script, timeline::Timeline, validator::load_script, PlayerError, Result,
};

/// A validated script together with its timeline.
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub script: Script,
    pub timeline: Timeline,
}

impl LoadedScript {
    pub fn new(script: Script) -> Self {
        let timeline = Timeline::build(&script);
        Self { script, timeline }
    }
}

#[derive(Debug, Default)]
pub struct Selection {
    video: Option<PathBuf>,
    script_path: Option<PathBuf>,
    loaded: Option<LoadedScript>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a selection from saved file identifiers without loading
    /// anything yet; call [`Selection::reload`] afterwards.
    pub fn from_state(state: SelectionState) -> Self {
        Self {
            video: state.video,
            script_path: state.script,
            loaded: None,
        }
    }

    pub fn state(&self) -> SelectionState {
        SelectionState {
            video: self.video.clone(),
            script: self.script_path.clone(),
        }
    }

    pub fn select_video(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.video = Some(path.into());
        self.reload()
    }

    pub fn select_script(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.script_path = Some(path.into());
        self.reload()
    }

    /// Validates the selected script again and rebuilds its timeline.
    pub fn reload(&mut self) -> Result<()> {
        self.loaded = None;
        let Some(path) = self.script_path.as_deref() else {
            return Ok(());
        };

        match load_script(path) {
            Ok(script) => {
                self.loaded = Some(LoadedScript::new(script));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "script rejected");
                Err(err)
            }
        }
    }

    pub fn video(&self) -> Option<&Path> {
        self.video.as_deref()
    }

    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    pub fn loaded(&self) -> Option<&LoadedScript> {
        self.loaded.as_ref()
    }

    /// Playback may start once a video is chosen and a valid script is
    /// loaded.
    pub fn is_ready(&self) -> bool {
        self.video.is_some() && self.loaded.is_some()
    }

    /// Hands the loaded script over to the caller; the paths stay selected.
    pub fn take_loaded(&mut self) -> Option<LoadedScript> {
        self.loaded.take()
    }
}

/// File identifiers remembered between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
}

impl SelectionState {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|err| PlayerError::msg(err.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text =
            serde_json::to_string_pretty(self).map_err(|err| PlayerError::msg(err.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}
