//! Offline mirror of table reads, lookup loading and connectivity handling.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use common::ScriptedTransport;
use common::countries;
use common::person_table;
use metagrid_lib::LookupResolver;
use metagrid_lib::RouteDef;
use metagrid_lib::TableOptions;
use metagrid_lib::error::ApiError;
use metagrid_lib::model::Lookup;
use metagrid_lib::transport::Verb;
use serde_json::json;

fn cacheable_person() -> TableOptions {
    TableOptions::from_value(json!({"tableAPI": "person", "cacheable": true})).unwrap()
}

fn harness() -> Harness {
    let h = Harness::new();
    h.transport.respond(Verb::Get, "Table/person", person_table());
    h.transport.respond(Verb::Get, "Table/GetLookup/country", countries());
    h
}

// =============================================================================
// Table mirror
// =============================================================================

#[tokio::test]
async fn test_offline_reload_reads_mirror() {
    let h = harness();
    let mut table = h.controller("/people");
    table.init(cacheable_person()).await.unwrap();
    assert!(table.state().cache.is_stored());

    // The failed request flips the context offline and the mirror answers.
    h.transport.set_offline(true);
    table.reload().await;
    assert!(!h.ctx.is_online());
    assert!(table.state().cache.is_hit());
    assert_eq!(table.rows().len(), 3);
    assert_eq!(table.columns().len(), 5);
    assert_eq!(h.surface.errors(), vec!["No response from server".to_string()]);
    assert_eq!(h.transport.count(Verb::Get, "Table/person"), 2);

    // The network is retried on every reload and wins once reachable.
    h.transport.set_offline(false);
    table.reload().await;
    assert!(h.ctx.is_online());
    assert!(table.state().cache.is_stored());
    assert_eq!(h.transport.count(Verb::Get, "Table/person"), 3);
}

#[tokio::test]
async fn test_offline_reload_without_mirror_clears_table() {
    let h = harness();
    let mut table = h.controller("/people");
    table.init(TableOptions::from_value(json!({"tableAPI": "person"})).unwrap()).await.unwrap();
    assert_eq!(table.rows().len(), 3);

    h.transport.set_offline(true);
    table.reload().await;
    assert!(!h.ctx.is_online());
    assert!(table.rows().is_empty());
}

#[tokio::test]
async fn test_non_table_sources_never_cache() {
    let h = Harness::new();
    h.transport.respond(Verb::Get, "Table/GetTable", person_table());
    let mut table = h.controller("/report");
    let options = TableOptions::from_value(json!({"dbFunction": "api.people", "cacheable": true})).unwrap();
    table.init(options).await.unwrap();
    assert!(table.state().cache.is_none());
    assert_eq!(table.rows().len(), 3);

    h.transport.set_offline(true);
    h.ctx.set_online(false);
    table.reload().await;
    assert!(table.rows().is_empty());
    assert_eq!(h.transport.count(Verb::Get, "Table/GetTable"), 2);
    assert!(h.api.cache().read("metagrid", "api_people").await.is_none());
}

#[tokio::test]
async fn test_uncacheable_table_is_not_mirrored() {
    let h = harness();
    let mut table = h.controller("/people");
    table.init(TableOptions::from_value(json!({"tableAPI": "person"})).unwrap()).await.unwrap();
    assert!(table.state().cache.is_none());
    assert!(h.api.cache().read("metagrid", "person").await.is_none());
}

#[tokio::test]
async fn test_offline_route_mirrors_tables() {
    let transport = ScriptedTransport::new();
    transport.respond(Verb::Get, "Table/person", person_table());
    let route = RouteDef {
        path: "/field/people".to_string(),
        offline: true,
        ..Default::default()
    };
    let h = Harness::with(transport, vec![route]);

    let mut table = h.controller("/field/people");
    table.init(TableOptions::from_value(json!({"tableAPI": "person"})).unwrap()).await.unwrap();
    assert!(table.state().cache.is_stored());
}

#[tokio::test]
async fn test_edits_refresh_mirror() {
    let h = harness();
    h.transport.respond(Verb::Post, "Table/person", json!(4));
    h.transport.respond(Verb::Delete, "Table/person/1", serde_json::Value::Null);
    let mut table = h.controller("/people");
    table.init(cacheable_person()).await.unwrap();

    table.add_row().await.unwrap();
    table.set_field("name", json!("Dana")).unwrap();
    assert!(table.save_row().await.unwrap());
    let mirrored = h.api.cache().read("metagrid", "person").await.unwrap();
    assert_eq!(mirrored.data().len(), 4);

    assert!(
        table
            .delete_row(0, metagrid_lib::table::DeletePrompt::Confirmed)
            .await
            .unwrap()
    );
    let mirrored = h.api.cache().read("metagrid", "person").await.unwrap();
    assert_eq!(mirrored.data().len(), 3);
    assert!(mirrored.is_cached());
}

// =============================================================================
// Lookups
// =============================================================================

#[tokio::test]
async fn test_concurrent_lookup_loads_once() {
    let h = Harness::with(ScriptedTransport::new().with_delay(Duration::from_millis(20)), Vec::new());
    h.transport.respond(Verb::Get, "Table/GetLookup/country", countries());
    let resolver = LookupResolver::new(h.api.clone());
    let lookup = Arc::new(Lookup::new("country").with_ref_table("country"));

    let (a, b) = tokio::join!(resolver.load(&lookup), resolver.load(&lookup));
    assert!(a && b);
    assert_eq!(h.transport.count(Verb::Get, "Table/GetLookup/country"), 1);
    assert_eq!(lookup.options().unwrap().rows.len(), 3);

    assert!(resolver.load(&lookup).await);
    assert_eq!(h.transport.count(Verb::Get, "Table/GetLookup/country"), 1);
}

#[tokio::test]
async fn test_failed_lookup_can_retry() {
    let h = Harness::new();
    h.transport
        .fail(Verb::Get, "Table/GetLookup/country", ApiError::server(500, "lookup failed"));
    let resolver = LookupResolver::new(h.api.clone());
    let lookup = Lookup::new("country").with_ref_table("country");

    assert!(!resolver.load(&lookup).await);
    assert!(!lookup.is_loaded());

    h.transport.respond(Verb::Get, "Table/GetLookup/country", json!([]));
    assert!(resolver.load(&lookup).await);
    assert!(lookup.is_loaded());
    assert!(lookup.options().unwrap().rows.is_empty());
}

#[tokio::test]
async fn test_static_and_endpoint_lookups() {
    let h = Harness::new();
    h.transport
        .respond(Verb::Get, "Unit/Options", json!([{"code": "kg", "title": "Kilogram"}]));
    let resolver = LookupResolver::new(h.api.clone());

    let endpoint = Lookup::new("unit").with_api("Unit/Options");
    assert!(resolver.load(&endpoint).await);
    assert_eq!(endpoint.options().unwrap().label_field, "title");

    let fixed = Lookup::new("size").with_static_options(vec![
        json!({"id": "s", "name": "Small"}).as_object().cloned().unwrap(),
    ]);
    assert!(resolver.load(&fixed).await);
    assert_eq!(h.transport.requests().len(), 1);
}

#[tokio::test]
async fn test_lookup_options_served_from_store_offline() {
    let h = harness();
    let resolver = LookupResolver::new(h.api.clone());
    assert!(resolver.load(&Lookup::new("country").with_ref_table("country")).await);

    h.transport.set_offline(true);
    h.ctx.set_online(false);
    let again = Lookup::new("country").with_ref_table("country");
    assert!(resolver.load(&again).await);
    assert_eq!(again.options().unwrap().rows.len(), 3);
    assert_eq!(h.transport.count(Verb::Get, "Table/GetLookup/country"), 2);
}

// =============================================================================
// Connectivity and session
// =============================================================================

#[tokio::test]
async fn test_unauthorized_logs_out() {
    let h = Harness::new();
    h.transport
        .fail(Verb::Get, "Table/person", ApiError::Unauthorized { expired: true });
    let mut table = h.controller("/people");
    table.init(cacheable_person()).await.unwrap();

    assert_eq!(*h.surface.logouts.lock().unwrap(), 1);
    assert_eq!(h.surface.errors(), vec!["Session expired - please login again".to_string()]);
    assert!(h.ctx.is_online());
    assert!(!h.ctx.is_working());
}

#[tokio::test]
async fn test_server_message_is_shown() {
    let h = Harness::new();
    h.transport.respond(Verb::Get, "Table/person", person_table());
    h.transport
        .respond(Verb::Post, "Person/Recalculate", json!({"message": "Recalculation started"}));
    let mut table = h.controller("/people");
    table.init(TableOptions::from_value(json!({"tableAPI": "person"})).unwrap()).await.unwrap();

    let action = metagrid_lib::Action::from_value(json!({"restAPI": "Person/Recalculate", "method": "POST"})).unwrap();
    table.run_table_action(&action).await.unwrap();
    assert_eq!(h.surface.messages(), vec!["Recalculation started".to_string()]);
}
