use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ripplefs_discovery::{
    AddressResolver, AlbAddressFinder, Credentials, DiscoveryError, StaticCredentials, Target,
    TargetQuery, TargetSource,
};

const INVALID_CONFIG_PREFIX: &str = "One or more configuration parameters are invalid";

/// Target source returning a fixed member list and counting lookups
#[derive(Default)]
struct FakeTargets {
    targets: Vec<Target>,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl TargetSource for FakeTargets {
    async fn describe_targets(
        &self,
        query: TargetQuery<'_>,
    ) -> ripplefs_discovery::Result<Vec<Target>> {
        assert_eq!(query.region, "eu-west-1");
        assert_eq!(query.credentials.access_key_id, "AKIA");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.targets.clone())
    }
}

fn configured(source: Arc<FakeTargets>) -> AlbAddressFinder {
    let mut finder = AlbAddressFinder::new(source);
    finder
        .set_region(Some("eu-west-1".to_string()))
        .set_target_group_arn(Some("arn:aws:elasticloadbalancing:tg/coord".to_string()))
        .set_credentials_provider(Some(Arc::new(StaticCredentials(Credentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
        }))));
    finder
}

async fn assert_invalid_config(finder: AlbAddressFinder, source: &FakeTargets, field: &str) {
    let err = finder.registered_addresses().await.unwrap_err();
    assert!(
        err.to_string().starts_with(INVALID_CONFIG_PREFIX),
        "unexpected message: {err}"
    );
    assert!(err.to_string().contains(field));
    assert!(err.is_configuration());
    assert_eq!(source.calls.load(Ordering::SeqCst), 0, "source must not be queried");
}

#[tokio::test]
async fn missing_region_is_a_configuration_error() {
    let source = Arc::new(FakeTargets::default());
    let mut finder = configured(source.clone());
    finder.set_region(None);
    assert_invalid_config(finder, &source, "region").await;
}

#[tokio::test]
async fn missing_target_group_is_a_configuration_error() {
    let source = Arc::new(FakeTargets::default());
    let mut finder = configured(source.clone());
    finder.set_target_group_arn(None);
    assert_invalid_config(finder, &source, "target_group_arn").await;
}

#[tokio::test]
async fn missing_credentials_provider_is_a_configuration_error() {
    let source = Arc::new(FakeTargets::default());
    let mut finder = configured(source.clone());
    finder.set_credentials_provider(None);
    assert_invalid_config(finder, &source, "credentials_provider").await;
}

#[tokio::test]
async fn all_missing_fields_are_reported_together() {
    let finder = AlbAddressFinder::new(Arc::new(FakeTargets::default()));
    match finder.validate() {
        Err(DiscoveryError::InvalidConfiguration { missing }) => {
            assert_eq!(missing, vec!["region", "target_group_arn", "credentials_provider"]);
        }
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn healthy_targets_resolve_with_default_port() {
    let source = Arc::new(FakeTargets {
        targets: vec![
            Target {
                ip: "10.0.0.2".parse().unwrap(),
                port: Some(7000),
                healthy: true,
            },
            Target {
                ip: "10.0.0.1".parse().unwrap(),
                port: None,
                healthy: true,
            },
            Target {
                ip: "10.0.0.3".parse().unwrap(),
                port: None,
                healthy: false,
            },
        ],
        calls: AtomicUsize::new(0),
    });
    let mut finder = configured(source.clone());
    finder.set_default_port(10800);

    let addrs: Vec<SocketAddr> = finder
        .registered_addresses()
        .await
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(
        addrs,
        vec![
            "10.0.0.1:10800".parse::<SocketAddr>().unwrap(),
            "10.0.0.2:7000".parse().unwrap(),
        ]
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    // Membership belongs to the load balancer
    finder.register_addresses(&addrs).await.unwrap();
    finder.unregister_addresses(&addrs).await.unwrap();
}
