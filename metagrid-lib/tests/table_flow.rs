//! Loading, form editing, deletion and inline editing against a scripted server.

mod common;

use common::Harness;
use common::countries;
use common::person_table;
use metagrid_lib::Error;
use metagrid_lib::RouteDef;
use metagrid_lib::TableController;
use metagrid_lib::TableOptions;
use metagrid_lib::editor::EditorPhase;
use metagrid_lib::editor::Rect;
use metagrid_lib::editor::Widget;
use metagrid_lib::error::ApiError;
use metagrid_lib::model::ColumnIndex;
use metagrid_lib::table::DeletePrompt;
use metagrid_lib::transport::Verb;
use serde_json::Value;
use serde_json::json;

fn person_options() -> TableOptions {
    TableOptions::from_value(json!({"title": "People", "tableAPI": "person"})).unwrap()
}

fn harness() -> Harness {
    let h = Harness::new();
    h.transport.respond(Verb::Get, "Table/person", person_table());
    h.transport.respond(Verb::Get, "Table/GetLookup/country", countries());
    h
}

fn cell(table: &TableController, row: usize, position: usize) -> Value {
    table.rows()[row].value(&ColumnIndex::Position(position))
}

// =============================================================================
// Loading
// =============================================================================

#[tokio::test]
async fn test_init_builds_columns_and_rows() {
    let h = harness();
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    assert!(table.state().loaded);
    assert_eq!(table.rows().len(), 3);
    assert_eq!(h.transport.count(Verb::Get, "Table/person"), 1);

    let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "country_id_val", "country_id", "active"]);

    let id = table.state().column("id").unwrap();
    assert!(id.invisible);
    assert!(id.disabled);

    let label = table.state().column("country_id_val").unwrap();
    let key = table.state().column("country_id").unwrap();
    assert_eq!(label.label, "Country");
    assert!(std::sync::Arc::ptr_eq(
        label.lookup.as_ref().unwrap(),
        key.lookup.as_ref().unwrap()
    ));
    assert!(table.can_edit() && table.can_add() && table.can_delete());
}

#[tokio::test]
async fn test_read_only_route_disables_editing() {
    let transport = common::ScriptedTransport::new();
    transport.respond(Verb::Get, "Table/person", person_table());
    let route = RouteDef {
        path: "/people".to_string(),
        read_only: true,
        ..Default::default()
    };
    let h = Harness::with(transport, vec![route]);

    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();
    assert!(table.state().read_only);
    assert!(!table.can_edit());
    assert!(!table.can_add());
    assert!(!table.can_delete());
}

#[tokio::test]
async fn test_db_function_tables_are_not_editable() {
    let h = Harness::new();
    h.transport.respond(Verb::Get, "Table/GetTable", person_table());
    let mut table = h.controller("/report");
    table
        .init(TableOptions::from_value(json!({"dbFunction": "api.people", "frugal": true})).unwrap())
        .await
        .unwrap();

    assert_eq!(table.rows().len(), 3);
    assert!(!table.can_edit());
    let request = h.transport.last(Verb::Get).unwrap();
    assert_eq!(request.path, "Table/GetTable");
    assert!(request.query.contains(&("dbFunction".to_string(), "api.people".to_string())));
}

#[tokio::test]
async fn test_detail_table_keeps_parent_rows() {
    let h = harness();
    let mut table = h.controller("/country/people");
    let options = TableOptions::from_value(json!({
        "tableAPI": "person",
        "masterKey": "country_id",
        "masterValue": 10
    }))
    .unwrap();
    table.init(options).await.unwrap();

    assert_eq!(table.rows().len(), 2);
    let parent = table.state().column("country_id").unwrap();
    assert!(parent.invisible);
    assert!(parent.lookup.is_none());

    table.add_row().await.unwrap();
    assert_eq!(table.editing().unwrap().row["country_id"], json!(10));
}

#[tokio::test]
async fn test_context_values_scope_and_persist() {
    let h = harness();
    h.transport
        .respond(Verb::Get, "Table/GetParamLookup/years", json!([{"year": 2024}, {"year": 2023}]));
    let options = TableOptions::from_value(json!({
        "tableAPI": "person",
        "contextValues": [{"name": "year", "lookup": "years"}]
    }))
    .unwrap();

    let mut table = h.controller("/people");
    table.init(options.clone()).await.unwrap();
    let request = h.transport.last(Verb::Get).unwrap();
    assert_eq!(request.path, "Table/person");
    assert_eq!(request.query, vec![("pars".to_string(), "{\"year\":2024}".to_string())]);
    assert_eq!(h.ctx.context_value("year"), Some(json!(2024)));

    table.set_context_value("year", json!(2023)).unwrap();
    table.reload().await;
    assert!(table.set_context_value("month", json!(1)).is_err());

    // A later view starts from the remembered value.
    let mut again = h.controller("/people-again");
    again.init(options).await.unwrap();
    assert_eq!(again.state().context_values[0].value, json!(2023));
}

#[tokio::test]
async fn test_failed_fetch_leaves_empty_table() {
    let h = Harness::new();
    h.transport.respond(Verb::Get, "Table/person", json!({"error": "permission denied"}));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    assert!(table.rows().is_empty());
    assert!(table.columns().is_empty());
    assert_eq!(h.surface.errors(), vec!["permission denied".to_string()]);
}

// =============================================================================
// Form editing
// =============================================================================

#[tokio::test]
async fn test_add_row_saves_and_appends() {
    let h = harness();
    h.transport.respond(Verb::Post, "Table/person", json!(4));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    table.add_row().await.unwrap();
    assert_eq!(table.state().editor.phase(), EditorPhase::Adding);
    table.set_field("name", json!("Dana")).unwrap();
    table.set_field("country_id", json!(20)).unwrap();
    assert!(h.ctx.form_changed());
    assert_eq!(table.editing().unwrap().row["country_id_val"], json!("Denmark"));

    assert!(table.save_row().await.unwrap());
    assert_eq!(table.rows().len(), 4);
    assert_eq!(cell(&table, 3, 0), json!(4));
    assert_eq!(cell(&table, 3, 1), json!("Dana"));
    assert_eq!(cell(&table, 3, 3), json!("Denmark"));
    assert_eq!(cell(&table, 3, 4), json!(false));
    assert!(table.editing().is_none());
    assert!(!h.ctx.form_changed());

    let sent = h.transport.last(Verb::Post).unwrap().body.unwrap();
    assert_eq!(sent["name"], json!("Dana"));
    assert_eq!(sent["active"], json!(false));
}

#[tokio::test]
async fn test_json_and_boolean_columns_round_trip() {
    let h = Harness::new();
    h.transport.respond(
        Verb::Get,
        "Table/device",
        json!({
            "attributes": [
                {"name": "id", "type": "integer"},
                {"name": "label", "type": "character varying"},
                {"name": "meta", "type": "json"},
                {"name": "enabled", "type": "boolean"}
            ],
            "data": [[1, "Gate", {"zone": "A"}, true]]
        }),
    );
    h.transport.respond(Verb::Post, "Table/device", json!(2));
    let mut table = h.controller("/devices");
    table
        .init(TableOptions::from_value(json!({"tableAPI": "device"})).unwrap())
        .await
        .unwrap();

    table.edit_row(0).await.unwrap();
    assert_eq!(table.editing().unwrap().row["meta"], json!("{\"zone\":\"A\"}"));
    table.cancel_edit();

    table.add_row().await.unwrap();
    assert_eq!(table.editing().unwrap().row["meta"], json!("{}"));
    assert_eq!(table.editing().unwrap().row["enabled"], json!(false));
    table.set_field("label", json!("Dock")).unwrap();
    assert!(table.save_row().await.unwrap());

    let sent = h.transport.last(Verb::Post).unwrap().body.unwrap();
    assert_eq!(sent["meta"], json!({}));
    assert_eq!(sent["enabled"], json!(false));
    assert_eq!(sent["label"], json!("Dock"));
    assert_eq!(table.rows().len(), 2);
}

#[tokio::test]
async fn test_failed_save_keeps_rows_and_form() {
    let h = harness();
    h.transport.fail(Verb::Put, "Table/person", ApiError::server(500, "boom"));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    table.edit_row(0).await.unwrap();
    table.set_field("name", json!("Anna")).unwrap();
    assert!(!table.save_row().await.unwrap());

    assert_eq!(table.rows().len(), 3);
    assert_eq!(cell(&table, 0, 1), json!("Ana"));
    let editing = table.editing().unwrap();
    assert_eq!(editing.index, Some(0));
    assert_eq!(editing.row["name"], json!("Anna"));
    assert_eq!(h.surface.errors(), vec!["boom".to_string()]);
    assert!(h.ctx.form_changed());
}

#[tokio::test]
async fn test_edit_row_replaces_with_echo() {
    let h = harness();
    h.transport
        .respond(Verb::Put, "Table/person", json!({"id": 2, "name": "Benjamin"}));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    table.edit_row(1).await.unwrap();
    table.set_field("name", json!("Benny")).unwrap();
    assert!(table.save_row().await.unwrap());
    assert_eq!(cell(&table, 1, 1), json!("Benjamin"));
    assert_eq!(table.rows().len(), 3);
}

#[tokio::test]
async fn test_validation_failure_sends_nothing() {
    let h = harness();
    let options = TableOptions::from_value(json!({
        "tableAPI": "person",
        "colAtts": {"name": {"rules": "required"}}
    }))
    .unwrap();
    let mut table = h.controller("/people");
    table.init(options).await.unwrap();

    table.add_row().await.unwrap();
    let err = table.save_row().await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(h.transport.count(Verb::Post, "Table/person"), 0);
    assert!(table.editing().is_some());

    table.cancel_edit();
    assert!(table.editing().is_none());
    assert!(matches!(table.save_row().await, Err(Error::NotEditing)));
}

#[tokio::test]
async fn test_previous_value_is_remembered() {
    let h = harness();
    h.transport.respond(Verb::Post, "Table/person", json!({}));
    let options = TableOptions::from_value(json!({
        "tableAPI": "person",
        "colAtts": {"country_id": {"defaultPrevious": true}}
    }))
    .unwrap();
    let mut table = h.controller("/people");
    table.init(options).await.unwrap();

    table.add_row().await.unwrap();
    table.set_field("name", json!("Eve")).unwrap();
    table.set_field("country_id", json!(30)).unwrap();
    assert!(table.save_row().await.unwrap());

    table.add_row().await.unwrap();
    let row = &table.editing().unwrap().row;
    assert_eq!(row["country_id"], json!(30));
    assert_eq!(row["country_id_val"], json!("Estonia"));
    assert_eq!(row["name"], Value::Null);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_row_asks_first() {
    let h = harness();
    h.transport.respond(Verb::Delete, "Table/person/2", Value::Null);
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    h.surface.answer(false);
    assert!(!table.delete_row(1, DeletePrompt::Ask).await.unwrap());
    assert_eq!(h.transport.count(Verb::Delete, "Table/person/2"), 0);
    assert_eq!(table.rows().len(), 3);

    assert!(table.delete_row(1, DeletePrompt::Ask).await.unwrap());
    assert_eq!(table.rows().len(), 2);
    assert_eq!(cell(&table, 1, 1), json!("Cleo"));
    assert_eq!(h.surface.confirms(), vec!["Delete row?".to_string(), "Delete row?".to_string()]);
}

#[tokio::test]
async fn test_failed_delete_keeps_row() {
    let h = harness();
    h.transport
        .fail(Verb::Delete, "Table/person/1", ApiError::server(409, "row is referenced"));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    assert!(!table.delete_row(0, DeletePrompt::Confirmed).await.unwrap());
    assert_eq!(table.rows().len(), 3);
    assert!(h.surface.confirms().is_empty());
    assert!(matches!(
        table.delete_row(9, DeletePrompt::Confirmed).await,
        Err(Error::RowOutOfRange(9))
    ));
}

// =============================================================================
// Inline editing
// =============================================================================

#[tokio::test]
async fn test_overlay_queues_change_and_bulk_save() {
    let h = harness();
    h.transport.respond(Verb::Put, "Table/person", json!({}));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    let opened = table
        .open_overlay(0, "country_id_val", Rect::new(10.0, 10.0, 120.0, 24.0))
        .await
        .unwrap();
    assert!(opened);
    let overlay = table.state().overlay.clone().unwrap();
    assert_eq!(overlay.widget, Widget::Select);
    assert_eq!(overlay.value_index, ColumnIndex::Position(2));
    assert!(overlay.anchor.width >= 400.0);
    assert!(overlay.lookup.as_ref().unwrap().is_loaded());

    table.overlay_value_changed(json!(20)).unwrap();
    assert_eq!(cell(&table, 0, 2), json!(20));
    assert_eq!(cell(&table, 0, 3), json!("Denmark"));
    assert_eq!(table.state().changed.len(), 1);
    assert!(h.ctx.form_changed());
    assert!(!table.close_overlay().unwrap());

    assert_eq!(table.save_changed_rows().await.unwrap(), 1);
    assert!(table.state().changed.is_empty());
    assert!(!h.ctx.form_changed());
    let sent = h.transport.last(Verb::Put).unwrap().body.unwrap();
    assert_eq!(sent["id"], json!(1));
    assert_eq!(sent["country_id"], json!(20));
}

#[tokio::test]
async fn test_failed_bulk_save_keeps_queue() {
    let h = harness();
    h.transport.fail(Verb::Put, "Table/person", ApiError::server(500, "nope"));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    table.open_overlay(2, "name", Rect::default()).await.unwrap();
    table.overlay_value_changed(json!("Clea")).unwrap();
    assert_eq!(table.save_changed_rows().await.unwrap(), 0);
    assert_eq!(table.state().changed.len(), 1);
    assert!(h.ctx.form_changed());

    table.undo_changes().await;
    assert!(table.state().changed.is_empty());
    assert_eq!(cell(&table, 2, 1), json!("Cleo"));
    assert_eq!(h.transport.count(Verb::Get, "Table/person"), 2);
}

#[tokio::test]
async fn test_overlay_refused_on_disabled_column() {
    let h = harness();
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    assert!(!table.open_overlay(0, "id", Rect::default()).await.unwrap());
    assert!(table.state().overlay.is_none());
    assert!(table.open_overlay(0, "missing", Rect::default()).await.is_err());
}

#[tokio::test]
async fn test_close_overlay_writes_pending_value() {
    let h = harness();
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    table.open_overlay(1, "name", Rect::default()).await.unwrap();
    table.edit_overlay(json!("Benedikt")).unwrap();
    assert_eq!(cell(&table, 1, 1), json!("Ben"));
    assert!(!h.ctx.form_changed());

    assert!(table.close_overlay().unwrap());
    assert!(table.state().overlay.is_none());
    assert_eq!(cell(&table, 1, 1), json!("Benedikt"));
    assert_eq!(table.state().changed.len(), 1);
    assert!(h.ctx.form_changed());
}

#[tokio::test]
async fn test_deleted_row_leaves_save_queue() {
    let h = harness();
    h.transport.respond(Verb::Delete, "Table/person/1", Value::Null);
    h.transport.respond(Verb::Put, "Table/person", json!({}));
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    table.open_overlay(0, "name", Rect::default()).await.unwrap();
    table.overlay_value_changed(json!("Anna")).unwrap();
    table.close_overlay().unwrap();
    table.open_overlay(2, "name", Rect::default()).await.unwrap();
    table.overlay_value_changed(json!("Clea")).unwrap();
    assert_eq!(table.state().changed.len(), 2);

    assert!(table.delete_row(0, DeletePrompt::Confirmed).await.unwrap());
    assert_eq!(table.rows().len(), 2);
    assert_eq!(table.state().changed.len(), 1);
    assert!(h.ctx.form_changed());

    assert_eq!(table.save_changed_rows().await.unwrap(), 1);
    assert_eq!(h.transport.count(Verb::Put, "Table/person"), 1);
    assert_eq!(h.transport.last(Verb::Put).unwrap().body.unwrap()["name"], json!("Clea"));
    assert!(!h.ctx.form_changed());
}

#[tokio::test]
async fn test_deleting_only_changed_row_clears_form_changed() {
    let h = harness();
    h.transport.respond(Verb::Delete, "Table/person/2", Value::Null);
    let mut table = h.controller("/people");
    table.init(person_options()).await.unwrap();

    table.open_overlay(1, "name", Rect::default()).await.unwrap();
    table.overlay_value_changed(json!("Benny")).unwrap();
    assert!(h.ctx.form_changed());

    assert!(table.delete_row(1, DeletePrompt::Confirmed).await.unwrap());
    assert!(table.state().changed.is_empty());
    assert!(!h.ctx.form_changed());
    assert_eq!(table.save_changed_rows().await.unwrap(), 0);
    assert_eq!(h.transport.count(Verb::Put, "Table/person"), 0);
}
