/// Sheets Server Tests
mod common;

use common::{args, authorized_registry};
use mockito::Matcher;
use serde_json::json;
use workspace_agent::ToolStatus;

#[tokio::test]
async fn test_create_sheet_returns_id_and_url() {
    let mut server = mockito::Server::new_async().await;
    let _create = server
        .mock("POST", "/spreadsheets")
        .match_query(Matcher::Any)
        .match_body(Matcher::Json(json!({"properties": {"title": "Budget"}})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"spreadsheetId":"sheet-1","spreadsheetUrl":"https://docs.google.com/spreadsheets/d/sheet-1/edit"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute("gsheets_create_sheet", args(json!({"title": "Budget"})))
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Success);
    let details = result.details.unwrap();
    assert_eq!(details["id"], "sheet-1");
    assert_eq!(details["url"], "https://docs.google.com/spreadsheets/d/sheet-1/edit");
}

#[tokio::test]
async fn test_read_empty_range_is_success_with_no_rows() {
    let mut server = mockito::Server::new_async().await;
    let _read = server
        .mock("GET", "/spreadsheets/sheet-1/values/Sheet1%21A1%3AB2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"range":"Sheet1!A1:B2","majorDimension":"ROWS"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gsheets_read_sheet",
            args(json!({"spreadsheet_id": "sheet-1", "range": "Sheet1!A1:B2"})),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Success);
    assert_eq!(result.message, "Read 0 rows from range Sheet1!A1:B2.");
    assert_eq!(result.details.unwrap()["values"], json!([]));
}

#[tokio::test]
async fn test_update_sheet_writes_user_entered_values() {
    let mut server = mockito::Server::new_async().await;
    let update = server
        .mock("PUT", "/spreadsheets/sheet-1/values/Sheet1%21A1")
        .match_query(Matcher::UrlEncoded("valueInputOption".into(), "USER_ENTERED".into()))
        .match_body(Matcher::PartialJson(json!({"values": [["Item", "Cost"], ["Coffee", 3]]})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"spreadsheetId":"sheet-1","updatedRange":"Sheet1!A1:B2","updatedCells":4}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gsheets_update_sheet",
            args(json!({
                "spreadsheet_id": "sheet-1",
                "range": "Sheet1!A1",
                "values": [["Item", "Cost"], ["Coffee", 3]]
            })),
        )
        .await
        .unwrap();

    assert_eq!(result.message, "Updated 4 cells in the sheet.");
    assert_eq!(result.details.unwrap()["updatedRange"], "Sheet1!A1:B2");
    update.assert_async().await;
}

#[tokio::test]
async fn test_unknown_sheets_action_names_the_action() {
    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry("http://127.0.0.1:9", dir.path());

    let result = registry
        .execute("gsheets_nonexistent_action", args(json!({})))
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Error);
    assert_eq!(
        result.message,
        "No action 'nonexistent_action' found on server 'gsheets'"
    );
}
