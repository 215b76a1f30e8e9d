use crate::clients::registry::ClientRegistry;
use crate::clients::sabnzbd::SabnzbdClient;
use crate::clients::test_helpers::{FakeSabnzbdProxy, nzbget_config, sab_config};
use crate::clients::{DownloadClient, DownloadProtocol};
use crate::config::{ClientConfig, Config};
use crate::error::Error;
use crate::matcher::AcceptAllMatcher;
use crate::types::ClientId;
use std::sync::Arc;

fn config_with(clients: Vec<ClientConfig>) -> Config {
    Config {
        clients,
        tracking: Default::default(),
        import: Default::default(),
        persistence: Default::default(),
        api: Default::default(),
    }
}

fn fake_client(id: i64, enable: bool) -> Arc<dyn DownloadClient> {
    let mut config = sab_config(id, Some("tv"));
    config.enable = enable;
    Arc::new(SabnzbdClient::new(
        &config,
        Arc::new(FakeSabnzbdProxy::default()),
        Arc::new(AcceptAllMatcher),
    ))
}

#[test]
fn test_from_config_builds_both_backend_kinds() {
    let config = config_with(vec![sab_config(1, Some("tv")), nzbget_config(2, Some("tv"))]);

    let registry = ClientRegistry::from_config(&config, Arc::new(AcceptAllMatcher)).unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.all()[0].definition().name, "sab-1");
    assert_eq!(registry.all()[1].definition().name, "nzbget-2");
}

#[test]
fn test_duplicate_client_ids_are_rejected() {
    let config = config_with(vec![sab_config(1, Some("tv")), nzbget_config(1, Some("tv"))]);

    let result = ClientRegistry::from_config(&config, Arc::new(AcceptAllMatcher));

    match result {
        Err(Error::Config { message, key }) => {
            assert!(message.contains("duplicate"), "got: {}", message);
            assert_eq!(key.as_deref(), Some("clients.nzbget-1.id"));
        }
        Ok(_) => panic!("expected Config error for duplicate ids"),
        Err(other) => panic!("expected Config error, got: {:?}", other),
    }
}

#[test]
fn test_empty_configuration_builds_an_empty_registry() {
    let registry =
        ClientRegistry::from_config(&config_with(vec![]), Arc::new(AcceptAllMatcher)).unwrap();

    assert!(registry.is_empty());
    assert!(registry.first_for_protocol(DownloadProtocol::Usenet).is_none());
}

#[test]
fn test_enabled_skips_disabled_clients() {
    let registry = ClientRegistry::new(vec![
        fake_client(1, false),
        fake_client(2, true),
        fake_client(3, true),
    ]);

    let enabled: Vec<i64> = registry
        .enabled()
        .map(|client| client.definition().id.get())
        .collect();
    assert_eq!(enabled, vec![2, 3]);
}

#[test]
fn test_get_finds_clients_by_id() {
    let registry = ClientRegistry::new(vec![fake_client(1, true), fake_client(2, true)]);

    assert!(registry.get(ClientId::new(2)).is_some());
    assert!(registry.get(ClientId::new(9)).is_none());
}

#[test]
fn test_first_for_protocol_skips_disabled_clients() {
    let registry = ClientRegistry::new(vec![fake_client(1, false), fake_client(2, true)]);

    let client = registry
        .first_for_protocol(DownloadProtocol::Usenet)
        .expect("an enabled usenet client is configured");
    assert_eq!(client.definition().id.get(), 2);
}
