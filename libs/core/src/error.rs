use thiserror::Error;

/// Rejected filesystem path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path must be absolute: {0:?}")]
    NotAbsolute(String),

    #[error("path component {component:?} is not allowed in {path:?}")]
    InvalidComponent { path: String, component: String },

    #[error("cannot join {0:?}: name must be a single non-empty component")]
    InvalidName(String),
}

impl PathError {
    pub fn invalid_component(path: impl Into<String>, component: impl Into<String>) -> Self {
        Self::InvalidComponent {
            path: path.into(),
            component: component.into(),
        }
    }
}
