use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PathError;

const SEPARATOR: char = '/';

/// Absolute, normalized filesystem path
///
/// Always starts with `/`, never ends with one (except the root itself) and
/// never contains empty, `.` or `..` components. Repeated separators are
/// collapsed on parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FsPath(String);

impl FsPath {
    /// The filesystem root, `/`
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Parse and normalize an absolute path
    pub fn new(raw: impl AsRef<str>) -> Result<Self, PathError> {
        let raw = raw.as_ref();
        if !raw.starts_with(SEPARATOR) {
            return Err(PathError::NotAbsolute(raw.to_string()));
        }

        let mut normalized = String::with_capacity(raw.len());
        for component in raw.split(SEPARATOR).filter(|c| !c.is_empty()) {
            if component == "." || component == ".." {
                return Err(PathError::invalid_component(raw, component));
            }
            normalized.push(SEPARATOR);
            normalized.push_str(component);
        }

        if normalized.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Last component, empty for the root
    pub fn name(&self) -> &str {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(_, name)| name)
            .unwrap_or_default()
    }

    /// Parent directory, `None` for the root
    pub fn parent(&self) -> Option<FsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once(SEPARATOR) {
            Some(("", _)) | None => Some(Self::root()),
            Some((parent, _)) => Some(Self(parent.to_string())),
        }
    }

    /// Append a single child component
    pub fn join(&self, name: &str) -> Result<FsPath, PathError> {
        if name.is_empty() || name.contains(SEPARATOR) || name == "." || name == ".." {
            return Err(PathError::InvalidName(name.to_string()));
        }
        let mut joined = self.0.clone();
        if !self.is_root() {
            joined.push(SEPARATOR);
        }
        joined.push_str(name);
        Ok(Self(joined))
    }

    /// Components from the root down, excluding the root itself
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|c| !c.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Whether `self` equals `ancestor` or lies underneath it
    pub fn starts_with(&self, ancestor: &FsPath) -> bool {
        if ancestor.is_root() || self == ancestor {
            return true;
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FsPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for FsPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FsPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FsPath> for String {
    fn from(path: FsPath) -> Self {
        path.0
    }
}

impl AsRef<str> for FsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
