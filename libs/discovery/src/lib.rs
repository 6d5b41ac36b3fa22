//! ripplefs Discovery - locating the coordinator before connecting
//!
//! The client only needs a validated endpoint. How candidate endpoints are
//! found is behind [`AddressResolver`]; this crate ships a fixed-list resolver
//! and a finder backed by a load balancer's target group.

pub mod alb;
pub mod error;
pub mod resolver;

pub use alb::{
    AlbAddressFinder, Credentials, CredentialsProvider, StaticCredentials, Target, TargetQuery,
    TargetSource,
};
pub use error::{DiscoveryError, Result};
pub use resolver::{AddressResolver, StaticAddressResolver};
