/// Forms Server Tests
mod common;

use common::{args, authorized_registry};
use mockito::Matcher;
use serde_json::json;
use workspace_agent::ToolStatus;

#[tokio::test]
async fn test_create_form_adds_questions_in_order() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/forms")
        .match_body(Matcher::Json(json!({"info": {"title": "Team lunch"}})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"formId":"form-1","responderUri":"https://docs.google.com/forms/d/e/form-1/viewform"}"#)
        .create_async()
        .await;
    let questions = server
        .mock("POST", "/forms/form-1:batchUpdate")
        .match_body(Matcher::PartialJson(json!({"requests": [
            {"createItem": {"item": {"title": "Name"}, "location": {"index": 0}}},
            {"createItem": {"item": {"title": "Cuisine", "questionItem": {"question": {
                "required": true,
                "choiceQuestion": {"type": "RADIO"}
            }}}, "location": {"index": 1}}}
        ]})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gforms_create_form",
            args(json!({
                "title": "Team lunch",
                "questions": [
                    {"question": "Name"},
                    {"question": "Cuisine", "type": "multiple_choice", "options": ["Thai", "Pizza"]}
                ]
            })),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Success);
    let details = result.details.unwrap();
    assert_eq!(details["id"], "form-1");
    assert_eq!(details["submitUrl"], "https://docs.google.com/forms/d/e/form-1/viewform");
    create.assert_async().await;
    questions.assert_async().await;
}

#[tokio::test]
async fn test_invalid_question_type_creates_nothing() {
    let mut server = mockito::Server::new_async().await;
    let create = server.mock("POST", "/forms").expect(0).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gforms_create_form",
            args(json!({"title": "Poll", "questions": [{"question": "Rate us", "type": "slider"}]})),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.message.contains("slider"));
    create.assert_async().await;
}

#[tokio::test]
async fn test_get_responses_counts_submissions() {
    let mut server = mockito::Server::new_async().await;
    let _responses = server
        .mock("GET", "/forms/form-1/responses")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"responses":[{"responseId":"r1"},{"responseId":"r2"}]}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute("gforms_get_responses", args(json!({"form_id": "form-1"})))
        .await
        .unwrap();

    assert_eq!(result.message, "Fetched 2 responses.");
    assert_eq!(result.details.unwrap()["responses"][1]["responseId"], "r2");
}

#[tokio::test]
async fn test_read_form_lists_item_titles() {
    let mut server = mockito::Server::new_async().await;
    let _form = server
        .mock("GET", "/forms/form-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"formId":"form-1","info":{"title":"Team lunch"},"items":[{"title":"Name"},{"title":"Cuisine"}]}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute("gforms_read_form", args(json!({"form_id": "form-1"})))
        .await
        .unwrap();

    let details = result.details.unwrap();
    assert_eq!(details["title"], "Team lunch");
    assert_eq!(details["items"], json!(["Name", "Cuisine"]));
}

#[tokio::test]
async fn test_failed_questions_still_report_created_form() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/forms")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"formId":"form-1","responderUri":"https://docs.google.com/forms/d/e/form-1/viewform"}"#)
        .expect(1)
        .create_async()
        .await;
    let _questions = server
        .mock("POST", "/forms/form-1:batchUpdate")
        .with_status(500)
        .with_body(r#"{"error":{"code":500,"message":"Backend Error"}}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gforms_create_form",
            args(json!({"title": "Team lunch", "questions": [{"question": "Name"}]})),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.message.contains("was created"));
    let details = result.details.unwrap();
    assert_eq!(details["id"], "form-1");
    assert_eq!(details["submitUrl"], "https://docs.google.com/forms/d/e/form-1/viewform");
    create.assert_async().await;
}
