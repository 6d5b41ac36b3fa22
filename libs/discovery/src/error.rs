use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// One or more required settings were never provided
    #[error("One or more configuration parameters are invalid [missing: {}]", .missing.join(", "))]
    InvalidConfiguration { missing: Vec<&'static str> },

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Target lookup failed: {0}")]
    Lookup(String),
}

impl DiscoveryError {
    /// Whether this error means the resolver was set up wrong, as opposed to
    /// a lookup that failed at run time
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. } | Self::Credentials(_))
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
