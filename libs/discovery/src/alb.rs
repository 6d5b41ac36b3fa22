use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing::debug;

use crate::error::{DiscoveryError, Result};
use crate::resolver::AddressResolver;

/// Port used for targets that are registered without one
pub const DEFAULT_PORT: u16 = 10500;

/// Access key pair used to query the load balancer
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supplies credentials at lookup time
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
}

/// Provider returning one fixed credential set
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}

/// Fully validated lookup parameters handed to a [`TargetSource`]
#[derive(Debug, Clone)]
pub struct TargetQuery<'a> {
    pub region: &'a str,
    pub target_group_arn: &'a str,
    pub credentials: Credentials,
}

/// A member registered in the target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub ip: IpAddr,
    pub port: Option<u16>,
    pub healthy: bool,
}

/// Backend that lists the members of a target group
#[async_trait::async_trait]
pub trait TargetSource: Send + Sync {
    async fn describe_targets(&self, query: TargetQuery<'_>) -> Result<Vec<Target>>;
}

/// Finds coordinators registered behind an application load balancer
///
/// Region, target group and credentials provider are all required; they are
/// checked together on every lookup, before the target source is contacted.
/// Membership is owned by the load balancer, so registration calls are
/// accepted and ignored.
pub struct AlbAddressFinder {
    region: Option<String>,
    target_group_arn: Option<String>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    default_port: u16,
    source: Arc<dyn TargetSource>,
}

impl AlbAddressFinder {
    pub fn new(source: Arc<dyn TargetSource>) -> Self {
        Self {
            region: None,
            target_group_arn: None,
            credentials: None,
            default_port: DEFAULT_PORT,
            source,
        }
    }

    pub fn set_region(&mut self, region: Option<String>) -> &mut Self {
        self.region = region;
        self
    }

    pub fn set_target_group_arn(&mut self, arn: Option<String>) -> &mut Self {
        self.target_group_arn = arn;
        self
    }

    pub fn set_credentials_provider(
        &mut self,
        provider: Option<Arc<dyn CredentialsProvider>>,
    ) -> &mut Self {
        self.credentials = provider;
        self
    }

    pub fn set_default_port(&mut self, port: u16) -> &mut Self {
        self.default_port = port;
        self
    }

    /// Check that every required setting is present
    pub fn validate(&self) -> Result<()> {
        self.required().map(|_| ())
    }

    fn required(&self) -> Result<(&str, &str, &dyn CredentialsProvider)> {
        match (&self.region, &self.target_group_arn, &self.credentials) {
            (Some(region), Some(arn), Some(provider)) => {
                Ok((region.as_str(), arn.as_str(), provider.as_ref()))
            }
            (region, arn, provider) => {
                let missing = [
                    ("region", region.is_none()),
                    ("target_group_arn", arn.is_none()),
                    ("credentials_provider", provider.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(DiscoveryError::InvalidConfiguration { missing })
            }
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for AlbAddressFinder {
    async fn registered_addresses(&self) -> Result<BTreeSet<SocketAddr>> {
        let (region, arn, provider) = self.required()?;

        let query = TargetQuery {
            region,
            target_group_arn: arn,
            credentials: provider.credentials()?,
        };
        let targets = self.source.describe_targets(query).await?;

        let addrs: BTreeSet<SocketAddr> = targets
            .into_iter()
            .filter(|target| {
                if !target.healthy {
                    debug!(ip = %target.ip, "Skipping unhealthy target");
                }
                target.healthy
            })
            .map(|target| SocketAddr::new(target.ip, target.port.unwrap_or(self.default_port)))
            .collect();

        debug!(region = %region, count = addrs.len(), "Resolved target group members");
        Ok(addrs)
    }

    async fn register_addresses(&self, _addrs: &[SocketAddr]) -> Result<()> {
        Ok(())
    }

    async fn unregister_addresses(&self, _addrs: &[SocketAddr]) -> Result<()> {
        Ok(())
    }
}
