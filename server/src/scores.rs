use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One shooter's running total and the screenshots that earned it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShooterRecord {
    pub score: u64,
    #[serde(default)]
    pub shots: Vec<String>,
}

/// Shooter records keyed by name, mirrored to a JSON file after every change.
///
/// File format: `{"<name>": {"score": <int>, "shots": ["<file>", ...]}, ...}`
pub struct ScoreBook {
    path: PathBuf,
    shooters: BTreeMap<String, ShooterRecord>,
}

impl ScoreBook {
    /// Load the score file, starting empty if it does not exist yet.
    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        let shooters = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| ScoreError::Parse(path.display().to_string(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = path.display().to_string(), "no score file yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(ScoreError::Read(path.display().to_string(), e)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            shooters,
        })
    }

    /// Write the whole book through a temp file so readers never see a torn file.
    pub fn save(&self) -> Result<(), ScoreError> {
        let json = serde_json::to_string(&self.shooters).map_err(ScoreError::Serialize)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| ScoreError::Write(tmp.display().to_string(), e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ScoreError::Write(self.path.display().to_string(), e))?;
        debug!(path = self.path.display().to_string(), shooters = self.shooters.len(), "score file saved");
        Ok(())
    }

    pub fn shooters(&self) -> &BTreeMap<String, ShooterRecord> {
        &self.shooters
    }

    pub fn get(&self, name: &str) -> Option<&ShooterRecord> {
        self.shooters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shooters.contains_key(name)
    }

    /// Register a shooter. Blank or already registered names are ignored.
    /// Returns whether a shooter was added.
    pub fn add_shooter(&mut self, name: &str) -> Result<bool, ScoreError> {
        let name = name.trim();
        if name.is_empty() || self.shooters.contains_key(name) {
            return Ok(false);
        }
        self.shooters.insert(name.to_string(), ShooterRecord::default());
        self.save()?;
        info!(shooter = name, "shooter added");
        Ok(true)
    }

    /// Returns whether a shooter was removed.
    pub fn remove_shooter(&mut self, name: &str) -> Result<bool, ScoreError> {
        if self.shooters.remove(name).is_none() {
            return Ok(false);
        }
        self.save()?;
        info!(shooter = name, "shooter removed");
        Ok(true)
    }

    /// Zero every score and forget every shot, keeping the shooters.
    pub fn reset(&mut self) -> Result<(), ScoreError> {
        for record in self.shooters.values_mut() {
            record.score = 0;
            record.shots.clear();
        }
        self.save()?;
        info!(shooters = self.shooters.len(), "scores reset");
        Ok(())
    }

    /// Add `hits` to a shooter's score and remember the screenshot.
    /// Returns the new score, or `None` for an unknown shooter.
    pub fn record_hits(
        &mut self,
        name: &str,
        hits: u64,
        screenshot: String,
    ) -> Result<Option<u64>, ScoreError> {
        let Some(record) = self.shooters.get_mut(name) else {
            return Ok(None);
        };
        record.score += hits;
        record.shots.push(screenshot);
        let score = record.score;
        if let Err(e) = self.save() {
            // Keep memory in step with the file.
            if let Some(record) = self.shooters.get_mut(name) {
                record.score -= hits;
                record.shots.pop();
            }
            return Err(e);
        }
        Ok(Some(score))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("failed to read score file {0}: {1}")]
    Read(String, std::io::Error),
    #[error("failed to parse score file {0}: {1}")]
    Parse(String, serde_json::Error),
    #[error("failed to write score file {0}: {1}")]
    Write(String, std::io::Error),
    #[error("failed to serialize scores: {0}")]
    Serialize(serde_json::Error),
}
