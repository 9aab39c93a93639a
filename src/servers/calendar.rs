use super::{envelope, segment, unknown_action, DomainServer, ServiceHandle};
use crate::errors::{AuthRequired, ToolError};
use crate::tools::args::{decode_args, parse_max_results};
use crate::tools::{ToolArgs, ToolResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

const DOMAIN: &str = "gcalendar";
const ACTIONS: &[&str] = &["schedule_meeting", "list_events", "cancel_event"];
const CALENDAR_ID: &str = "primary";
const DEFAULT_LIST_RESULTS: u32 = 10;
const DEFAULT_MEETING_MINUTES: i64 = 60;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduleMeetingArgs {
    summary: String,
    start_time: String,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    attendees: Vec<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListEventsArgs {
    #[serde(default)]
    time_min: Option<String>,
    #[serde(default)]
    time_max: Option<String>,
    #[serde(default)]
    max_results: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CancelEventArgs {
    event_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub id: String,
    pub summary: String,
    pub start: Option<String>,
    pub location: String,
}

impl EventSummary {
    pub fn from_event(event: &Value) -> Self {
        // All-day events carry `date` instead of `dateTime`
        let start = event
            .pointer("/start/dateTime")
            .or_else(|| event.pointer("/start/date"))
            .and_then(Value::as_str)
            .map(str::to_string);

        EventSummary {
            id: event
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            summary: event
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or("No Title")
                .to_string(),
            start,
            location: event
                .get("location")
                .and_then(Value::as_str)
                .unwrap_or("N/A")
                .to_string(),
        }
    }
}

/// Parses RFC 3339, or a naive ISO-8601 datetime interpreted as UTC.
pub fn parse_event_time(raw: &str) -> Result<DateTime<Utc>, ToolError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{}' is not an ISO-8601 datetime", raw)))
}

/// Resolves the meeting window; a missing end defaults to one hour after start.
pub fn meeting_window(
    start_time: &str,
    end_time: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ToolError> {
    let start = parse_event_time(start_time)?;
    let end = match end_time.filter(|e| !e.trim().is_empty()) {
        Some(raw) => parse_event_time(raw)?,
        None => start + Duration::minutes(DEFAULT_MEETING_MINUTES),
    };

    if end <= start {
        return Err(ToolError::InvalidArguments(format!(
            "end_time {} must be after start_time {}",
            rfc3339(&end),
            rfc3339(&start)
        )));
    }
    Ok((start, end))
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct CalendarServer {
    service: ServiceHandle,
}

impl CalendarServer {
    pub fn new(service: ServiceHandle) -> Self {
        Self { service }
    }

    async fn schedule_meeting(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: ScheduleMeetingArgs = decode_args(args)?;
        let (start, end) = meeting_window(&args.start_time, args.end_time.as_deref())?;

        let mut event = json!({
            "summary": &args.summary,
            "attendees": args.attendees.iter().map(|email| json!({"email": email})).collect::<Vec<_>>(),
            "start": {"dateTime": rfc3339(&start), "timeZone": "UTC"},
            "end": {"dateTime": rfc3339(&end), "timeZone": "UTC"},
            // Request a Meet link automatically
            "conferenceData": {
                "createRequest": {
                    "requestId": format!("meet-{}", Uuid::new_v4()),
                    "conferenceSolutionKey": {"type": "hangoutsMeet"}
                }
            }
        });
        if let Some(location) = args.location {
            event["location"] = Value::String(location);
        }
        if let Some(description) = args.description {
            event["description"] = Value::String(description);
        }

        let client = self.service.client().await?;
        let created = client
            .post(
                &format!("/calendars/{}/events", CALENDAR_ID),
                &[("conferenceDataVersion", "1".to_string())],
                &event,
            )
            .await?;

        info!("Meeting '{}' scheduled for {}", args.summary, rfc3339(&start));

        Ok(ToolResult::success(
            format!("Meeting '{}' scheduled successfully.", args.summary),
            json!({
                "id": created.get("id").cloned().unwrap_or(Value::Null),
                "link": created.get("htmlLink").cloned().unwrap_or(Value::Null),
                "meetLink": created.get("hangoutLink").cloned().unwrap_or(Value::Null),
                "start": rfc3339(&start),
                "end": rfc3339(&end),
            }),
        ))
    }

    async fn list_events(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: ListEventsArgs = decode_args(args)?;
        let max = parse_max_results(args.max_results, DEFAULT_LIST_RESULTS);

        let time_min = match args.time_min.as_deref() {
            Some(raw) => parse_event_time(raw)?,
            None => Utc::now(),
        };
        let mut query = vec![
            ("timeMin", rfc3339(&time_min)),
            ("maxResults", max.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(raw) = args.time_max.as_deref() {
            query.push(("timeMax", rfc3339(&parse_event_time(raw)?)));
        }
        debug!("Listing events with {:?}", query);

        let client = self.service.client().await?;
        let response = client
            .get(&format!("/calendars/{}/events", CALENDAR_ID), &query)
            .await?;

        let events: Vec<EventSummary> = response
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(EventSummary::from_event).collect())
            .unwrap_or_default();

        Ok(ToolResult::success(
            format!("Found {} upcoming event(s).", events.len()),
            json!({ "events": events }),
        ))
    }

    async fn cancel_event(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: CancelEventArgs = decode_args(args)?;
        let client = self.service.client().await?;
        client
            .delete(&format!(
                "/calendars/{}/events/{}",
                CALENDAR_ID,
                segment(&args.event_id)
            ))
            .await?;

        Ok(ToolResult::success(
            format!("Event with ID {} cancelled successfully.", args.event_id),
            json!({ "id": args.event_id }),
        ))
    }
}

#[async_trait]
impl DomainServer for CalendarServer {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    async fn execute(&self, action: &str, args: ToolArgs) -> Result<ToolResult, AuthRequired> {
        match action {
            "schedule_meeting" => {
                envelope(DOMAIN, "schedule meeting", self.schedule_meeting(args).await)
            }
            "list_events" => envelope(DOMAIN, "list events", self.list_events(args).await),
            "cancel_event" => envelope(DOMAIN, "cancel event", self.cancel_event(args).await),
            other => unknown_action(DOMAIN, other),
        }
    }
}
