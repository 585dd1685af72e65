//! Change feed positions and their on-disk checkpoint.

use crate::error::Error;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Position in the remote change feed. `0` means "never scanned".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(u64);

impl Cursor {
    pub const UNSET: Cursor = Cursor(0);
    /// First position of the feed.
    pub const START: Cursor = Cursor(1);

    pub fn new(position: u64) -> Self {
        Cursor(position)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Number of positions between `self` and a later cursor, zero if `later` is behind.
    pub fn distance_to(self, later: Cursor) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cursor {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Cursor)
    }
}

// The feed hands out positions as decimal strings.
impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid page token '{}'", raw)))
    }
}

/// Single-value checkpoint file holding a base-10 cursor.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored cursor. Missing or garbled files yield [`Cursor::UNSET`].
    pub fn load(&self) -> Result<Cursor, Error> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cursor file at {}, scanning from the start", self.path.display());
                return Ok(Cursor::UNSET);
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("Cursor file {} is not text, ignoring it", self.path.display());
                return Ok(Cursor::UNSET);
            }
            Err(e) => return Err(e.into()),
        };

        match contents.parse::<Cursor>() {
            Ok(cursor) => Ok(cursor),
            Err(_) => {
                warn!(
                    "Cursor file {} holds '{}', scanning from the start",
                    self.path.display(),
                    contents.trim()
                );
                Ok(Cursor::UNSET)
            }
        }
    }

    /// Overwrite the stored cursor. The value is staged next to the target and renamed into place.
    pub fn save(&self, cursor: Cursor) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut staged = self.path.clone().into_os_string();
        staged.push(".tmp");
        let staged = PathBuf::from(staged);

        fs::write(&staged, cursor.to_string())?;
        fs::rename(&staged, &self.path)?;
        debug!("Saved cursor {} to {}", cursor, self.path.display());
        Ok(())
    }
}
