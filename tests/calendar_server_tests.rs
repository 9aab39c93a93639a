/// Calendar Server Tests
///
/// Scheduling defaults, event listing and cancellation against a mocked
/// Calendar API.
mod common;

use common::{args, authorized_registry};
use mockito::Matcher;
use serde_json::json;
use workspace_agent::ToolStatus;

#[tokio::test]
async fn test_schedule_meeting_defaults_to_one_hour_with_meet_link() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/calendars/primary/events")
        .match_query(Matcher::UrlEncoded("conferenceDataVersion".into(), "1".into()))
        .match_body(Matcher::PartialJson(json!({
            "summary": "Planning",
            "start": {"dateTime": "2025-03-10T14:00:00Z"},
            "end": {"dateTime": "2025-03-10T15:00:00Z"},
            "attendees": [{"email": "bob@x.com"}],
            "conferenceData": {"createRequest": {"conferenceSolutionKey": {"type": "hangoutsMeet"}}}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"evt-1","htmlLink":"https://calendar.google.com/event?eid=evt-1","hangoutLink":"https://meet.google.com/abc-defg-hij"}"#,
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gcalendar_schedule_meeting",
            args(json!({
                "summary": "Planning",
                "start_time": "2025-03-10T14:00:00",
                "attendees": ["bob@x.com"]
            })),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Success);
    let details = result.details.unwrap();
    assert_eq!(details["id"], "evt-1");
    assert_eq!(details["meetLink"], "https://meet.google.com/abc-defg-hij");
    assert_eq!(details["end"], "2025-03-10T15:00:00Z");
    create.assert_async().await;
}

#[tokio::test]
async fn test_end_before_start_is_rejected_before_api_call() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gcalendar_schedule_meeting",
            args(json!({
                "summary": "Backwards",
                "start_time": "2025-03-10T14:00:00Z",
                "end_time": "2025-03-10T13:00:00Z"
            })),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.message.starts_with("Failed to schedule meeting."));
    create.assert_async().await;
}

#[tokio::test]
async fn test_list_events_flattens_timed_and_all_day_events() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("timeMin".into(), "2025-03-01T00:00:00Z".into()),
            Matcher::UrlEncoded("maxResults".into(), "10".into()),
            Matcher::UrlEncoded("singleEvents".into(), "true".into()),
            Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"items": [
                {"id": "e1", "summary": "Standup", "start": {"dateTime": "2025-03-03T09:00:00Z"}, "location": "Room 4"},
                {"id": "e2", "start": {"date": "2025-03-04"}}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute("gcalendar_list_events", args(json!({"time_min": "2025-03-01T00:00:00Z"})))
        .await
        .unwrap();

    assert_eq!(result.message, "Found 2 upcoming event(s).");
    let events = &result.details.unwrap()["events"];
    assert_eq!(events[0]["summary"], "Standup");
    assert_eq!(events[0]["location"], "Room 4");
    assert_eq!(events[1]["summary"], "No Title");
    assert_eq!(events[1]["start"], "2025-03-04");
}

#[tokio::test]
async fn test_cancelling_twice_reports_error_envelope() {
    let mut server = mockito::Server::new_async().await;
    let _first = server
        .mock("DELETE", "/calendars/primary/events/evt-1")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute("gcalendar_cancel_event", args(json!({"event_id": "evt-1"})))
        .await
        .unwrap();
    assert_eq!(result.status, ToolStatus::Success);

    // Google answers 410 Gone for an event that was already deleted
    server.reset_async().await;
    let _second = server
        .mock("DELETE", "/calendars/primary/events/evt-1")
        .with_status(410)
        .with_body(r#"{"error":{"code":410,"message":"Resource has been deleted"}}"#)
        .create_async()
        .await;

    let result = registry
        .execute("gcalendar_cancel_event", args(json!({"event_id": "evt-1"})))
        .await
        .unwrap();
    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.message.contains("Resource has been deleted"));
}

#[tokio::test]
async fn test_null_optional_arguments_are_treated_as_omitted() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "summary": "Focus time",
            "end": {"dateTime": "2025-03-10T15:00:00Z"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"evt-2","htmlLink":"https://calendar.google.com/event?eid=evt-2"}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = authorized_registry(&server.url(), dir.path());

    let result = registry
        .execute(
            "gcalendar_schedule_meeting",
            args(json!({
                "summary": "Focus time",
                "start_time": "2025-03-10T14:00:00Z",
                "end_time": null,
                "attendees": null,
                "location": null
            })),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ToolStatus::Success, "{}", result.message);
    assert_eq!(result.details.unwrap()["id"], "evt-2");
    create.assert_async().await;
}
