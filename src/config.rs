use crate::value::Value;
use rusqlite::OpenFlags;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reserved name for a database living only in memory.
pub const MEMORY: &str = ":memory:";

pub const DEFAULT_EXTENSION: &str = "db";

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Memory,
    File(PathBuf),
}

impl Location {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Location::Memory => None,
            Location::File(path) => Some(path),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Location::Memory)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => f.write_str(MEMORY),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        if path.as_os_str() == MEMORY {
            Location::Memory
        } else {
            Location::File(path.to_path_buf())
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::from(path.as_path())
    }
}

impl From<&PathBuf> for Location {
    fn from(path: &PathBuf) -> Self {
        Location::from(path.as_path())
    }
}

impl From<&str> for Location {
    fn from(path: &str) -> Self {
        Location::from(Path::new(path))
    }
}

impl From<String> for Location {
    fn from(path: String) -> Self {
        Location::from(Path::new(&path))
    }
}

/// Options applied when a handle is opened.
///
/// Engine options (`flags`, `busy_timeout`, `pragmas`) are handed to SQLite
/// as given. `folder` and `extension` only matter for databases opened or
/// attached by name.
#[derive(Debug, Clone, PartialEq)]
pub struct TamerConfig {
    /// Folder holding named databases; empty means the current directory.
    pub folder: PathBuf,
    /// Extension appended to named databases, without the dot.
    pub extension: String,
    pub flags: OpenFlags,
    pub busy_timeout: Option<Duration>,
    /// `PRAGMA name = value` statements run right after opening, in order.
    pub pragmas: Vec<(String, Value)>,
    /// Named databases attached at open, each under its own name.
    pub attach: Vec<String>,
}

impl Default for TamerConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            flags: OpenFlags::default(),
            busy_timeout: None,
            pragmas: Vec::new(),
            attach: Vec::new(),
        }
    }
}

impl TamerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    pub fn with_pragma(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.pragmas.push((name.to_string(), value.into()));
        self
    }

    pub fn with_attach(mut self, name: impl Into<String>) -> Self {
        self.attach.push(name.into());
        self
    }

    /// File path of the database called `name`: `<folder>/<name>.<extension>`.
    pub fn database_path(&self, name: &str) -> PathBuf {
        database_path(&self.folder, name, &self.extension)
    }
}

pub(crate) fn database_path(folder: &Path, name: &str, extension: &str) -> PathBuf {
    if extension.is_empty() {
        folder.join(name)
    } else {
        folder.join(format!("{name}.{extension}"))
    }
}
