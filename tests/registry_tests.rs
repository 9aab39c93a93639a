/// Tool Registry Tests
///
/// Catalog coverage, name routing and argument validation through the real
/// catalog and the five Workspace servers.
mod common;

use common::{args, manager_with, registry, CATALOG_PATH};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;
use workspace_agent::tools::registry::load_catalog;
use workspace_agent::{ToolRegistry, ToolStatus};

fn unauthorized_registry(dir: &Path) -> ToolRegistry {
    registry("http://127.0.0.1:9", manager_with(dir, "http://127.0.0.1:9/token", None))
}

#[test]
fn test_catalog_matches_dispatch_table() {
    let dir = tempfile::tempdir().unwrap();
    let registry = unauthorized_registry(dir.path());

    let catalog: BTreeSet<String> = load_catalog(Path::new(CATALOG_PATH))
        .into_iter()
        .map(|def| def.name)
        .collect();
    let handlers: BTreeSet<String> = registry.tool_names().map(str::to_string).collect();

    assert_eq!(catalog.len(), 15);
    assert_eq!(catalog, handlers);
    for (tool, domain, action) in registry.dispatch_table() {
        assert_eq!(tool, format!("{}_{}", domain, action));
    }
}

#[test]
fn test_missing_catalog_yields_no_definitions() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_catalog(&dir.path().join("missing.json")).is_empty());
}

#[tokio::test]
async fn test_unknown_domain_is_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let registry = unauthorized_registry(dir.path());

    let result = registry
        .execute("gdrive_list_files", args(json!({})))
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.message.contains("no server for domain 'gdrive'"));
}

#[tokio::test]
async fn test_schema_violation_never_reaches_credentials() {
    // No credential is stored, so reaching the server would be AuthRequired
    let dir = tempfile::tempdir().unwrap();
    let registry = unauthorized_registry(dir.path());

    let result = registry
        .execute("gdocs_read_document", args(json!({"doc": "abc"})))
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.message.starts_with("Invalid arguments:"));
}

#[tokio::test]
async fn test_valid_call_without_credential_requires_auth() {
    let dir = tempfile::tempdir().unwrap();
    let registry = unauthorized_registry(dir.path());

    let result = registry
        .execute("gsheets_create_sheet", args(json!({"title": "Budget"})))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_batch_with_unknown_action_keeps_other_results() {
    let mut server = mockito::Server::new_async().await;
    let _create = server
        .mock("POST", "/spreadsheets")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"spreadsheetId":"sheet-1"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = common::authorized_registry(&server.url(), dir.path());

    let (bad, good) = tokio::join!(
        registry.execute("gsheets_nonexistent_action", args(json!({}))),
        registry.execute("gsheets_create_sheet", args(json!({"title": "Budget"}))),
    );

    assert_eq!(bad.unwrap().status, ToolStatus::Error);
    let good = good.unwrap();
    assert_eq!(good.status, ToolStatus::Success);
    assert_eq!(good.details.unwrap()["id"], "sheet-1");
}

proptest! {
    #[test]
    fn prop_unregistered_names_are_error_envelopes(name in "[a-z_]{0,24}") {
        let dir = tempfile::tempdir().unwrap();
        let registry = unauthorized_registry(dir.path());
        prop_assume!(!registry.tool_names().any(|known| known == name));

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(registry.execute(&name, args(json!({}))));

        let result = result.expect("unregistered names never consult credentials");
        prop_assert_eq!(result.status, ToolStatus::Error);
    }
}
