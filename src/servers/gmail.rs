use super::{envelope, segment, unknown_action, DomainServer, ServiceHandle};
use crate::errors::{AuthRequired, ToolError};
use crate::tools::args::{decode_args, parse_max_results};
use crate::tools::{ToolArgs, ToolResult};
use async_trait::async_trait;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DOMAIN: &str = "gmail";
const ACTIONS: &[&str] = &["send_email", "read_emails", "delete_email"];
const DEFAULT_READ_RESULTS: u32 = 5;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SendEmailArgs {
    recipient: String,
    subject: String,
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadEmailsArgs {
    #[serde(default)]
    max_results: Option<Value>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteEmailArgs {
    message_id: String,
}

/// Flat summary of one message, built from a `format=metadata` response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmailSummary {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub date: Option<String>,
    pub snippet: String,
}

impl EmailSummary {
    pub fn from_metadata(message: &Value) -> Self {
        let id = message
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!("Summarizing Gmail message {}", id);

        let mut subject = None;
        let mut from = None;
        let mut date = None;

        let headers = message
            .pointer("/payload/headers")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for header in headers {
            let name = header.get("name").and_then(Value::as_str).unwrap_or_default();
            let value = header.get("value").and_then(Value::as_str).map(str::to_string);
            match name.to_ascii_lowercase().as_str() {
                "subject" => subject = value,
                "from" => from = value,
                "date" => date = value,
                _ => {}
            }
        }

        let snippet = message
            .get("snippet")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("No snippet available.")
            .to_string();

        EmailSummary {
            id,
            from: from.unwrap_or_else(|| "Unknown Sender".to_string()),
            subject: subject.unwrap_or_else(|| "No Subject".to_string()),
            date,
            snippet,
        }
    }
}

/// Builds a base64url-encoded RFC 2822 message for `messages.send`.
pub fn build_raw_message(recipient: &str, subject: &str, body: &str) -> Result<String, ToolError> {
    if recipient.contains(['\r', '\n']) || subject.contains(['\r', '\n']) {
        return Err(ToolError::InvalidArguments(
            "recipient and subject must be single-line".to_string(),
        ));
    }
    if !recipient.contains('@') {
        return Err(ToolError::InvalidArguments(format!(
            "'{}' is not an email address",
            recipient
        )));
    }

    let subject_header = if subject.is_ascii() {
        subject.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", base64::encode(subject.as_bytes()))
    };

    let message = format!(
        "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
        recipient, subject_header, body
    );

    Ok(base64::encode_config(message.as_bytes(), base64::URL_SAFE))
}

pub struct GmailServer {
    service: ServiceHandle,
}

impl GmailServer {
    pub fn new(service: ServiceHandle) -> Self {
        Self { service }
    }

    async fn send_email(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: SendEmailArgs = decode_args(args)?;
        let raw = build_raw_message(&args.recipient, &args.subject, &args.body)?;

        let client = self.service.client().await?;
        let sent = client
            .post("/users/me/messages/send", &[], &json!({ "raw": raw }))
            .await?;

        let id = sent.get("id").cloned().unwrap_or(Value::Null);
        info!("Email sent to {} with id {}", args.recipient, id);

        Ok(ToolResult::success(
            format!(
                "Email to {} with subject '{}' has been sent.",
                args.recipient, args.subject
            ),
            json!({ "id": id, "threadId": sent.get("threadId").cloned().unwrap_or(Value::Null) }),
        ))
    }

    async fn read_emails(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: ReadEmailsArgs = decode_args(args)?;
        let max = parse_max_results(args.max_results, DEFAULT_READ_RESULTS);
        debug!("Listing messages with max_results={}, query={:?}", max, args.query);

        let client = self.service.client().await?;

        let mut query = vec![("maxResults", max.to_string())];
        if let Some(q) = args.query.as_deref().filter(|q| !q.trim().is_empty()) {
            query.push(("q", q.to_string()));
        }
        let listing = client.get("/users/me/messages", &query).await?;

        let refs: Vec<String> = listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        info!("Found {} message references", refs.len());

        let metadata_query = [
            ("format", "metadata".to_string()),
            ("metadataHeaders", "Subject".to_string()),
            ("metadataHeaders", "From".to_string()),
            ("metadataHeaders", "Date".to_string()),
        ];

        let mut summaries = Vec::with_capacity(refs.len());
        for (idx, id) in refs.iter().enumerate() {
            debug!("Fetching message {}/{}: ID {}", idx + 1, refs.len(), id);
            match client
                .get(&format!("/users/me/messages/{}", segment(id)), &metadata_query)
                .await
            {
                Ok(message) => summaries.push(EmailSummary::from_metadata(&message)),
                // Continue with other messages instead of failing the listing
                Err(e) => error!("Failed to get message {}: {}", id, e),
            }
        }

        Ok(ToolResult::success(
            format!("Found {} email(s).", summaries.len()),
            json!({ "emails": summaries }),
        ))
    }

    async fn delete_email(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: DeleteEmailArgs = decode_args(args)?;
        let client = self.service.client().await?;
        client
            .post(
                &format!("/users/me/messages/{}/trash", segment(&args.message_id)),
                &[],
                &json!({}),
            )
            .await?;

        Ok(ToolResult::success(
            format!("Email with ID {} moved to trash.", args.message_id),
            json!({ "id": args.message_id }),
        ))
    }
}

#[async_trait]
impl DomainServer for GmailServer {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    async fn execute(&self, action: &str, args: ToolArgs) -> Result<ToolResult, AuthRequired> {
        match action {
            "send_email" => envelope(DOMAIN, "send email", self.send_email(args).await),
            "read_emails" => envelope(DOMAIN, "read emails", self.read_emails(args).await),
            "delete_email" => envelope(DOMAIN, "delete email", self.delete_email(args).await),
            other => unknown_action(DOMAIN, other),
        }
    }
}
