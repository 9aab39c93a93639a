use super::{envelope, segment, unknown_action, DomainServer, ServiceHandle};
use crate::errors::{AuthRequired, ToolError, WorkspaceApiError};
use crate::tools::args::decode_args;
use crate::tools::{ToolArgs, ToolResult};
use async_trait::async_trait;
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::{json, Value};

const DOMAIN: &str = "gdocs";
const ACTIONS: &[&str] = &["create_document", "read_document", "update_document"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateDocumentArgs {
    title: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadDocumentArgs {
    document_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateDocumentArgs {
    document_id: String,
    content: String,
}

/// Concatenates every text run in the document body, descending into tables.
pub fn extract_text(document: &Value) -> String {
    let mut text = String::new();
    if let Some(content) = document.pointer("/body/content").and_then(Value::as_array) {
        collect_text(content, &mut text);
    }
    text.trim().to_string()
}

fn collect_text(elements: &[Value], out: &mut String) {
    for element in elements {
        if let Some(runs) = element
            .pointer("/paragraph/elements")
            .and_then(Value::as_array)
        {
            for run in runs {
                if let Some(content) = run.pointer("/textRun/content").and_then(Value::as_str) {
                    out.push_str(content);
                }
            }
        }

        if let Some(rows) = element.pointer("/table/tableRows").and_then(Value::as_array) {
            for cell in rows
                .iter()
                .filter_map(|row| row.get("tableCells").and_then(Value::as_array))
                .flatten()
            {
                if let Some(content) = cell.get("content").and_then(Value::as_array) {
                    collect_text(content, out);
                }
            }
        }
    }
}

/// Index just before the body's trailing newline: the current end of content.
///
/// Computed from a fresh read so appends never land inside existing text.
pub fn end_of_body_index(document: &Value) -> Result<u64, ToolError> {
    let end = document
        .pointer("/body/content")
        .and_then(Value::as_array)
        .and_then(|content| content.last())
        .and_then(|last| last.get("endIndex"))
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            WorkspaceApiError::FormatError("document body has no endIndex".to_string())
        })?;
    Ok(end.saturating_sub(1).max(1))
}

fn insert_text_request(document_id: &str, index: u64, text: &str) -> (String, Value) {
    (
        format!("/documents/{}:batchUpdate", segment(document_id)),
        json!({
            "requests": [
                {"insertText": {"location": {"index": index}, "text": text}}
            ]
        }),
    )
}

fn document_link(document_id: &str) -> String {
    format!("https://docs.google.com/document/d/{}/edit", document_id)
}

pub struct DocsServer {
    service: ServiceHandle,
}

impl DocsServer {
    pub fn new(service: ServiceHandle) -> Self {
        Self { service }
    }

    async fn create_document(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: CreateDocumentArgs = decode_args(args)?;
        let client = self.service.client().await?;

        let document = client
            .post("/documents", &[], &json!({ "title": &args.title }))
            .await?;
        let document_id = document
            .get("documentId")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkspaceApiError::FormatError("create response has no documentId".to_string()))?
            .to_string();

        if let Some(content) = args.content.as_deref().filter(|c| !c.is_empty()) {
            // A new document's body starts at index 1
            let (path, body) = insert_text_request(&document_id, 1, content);
            if let Err(e) = client.post(&path, &[], &body).await {
                error!("Document {} created but initial content failed: {}", document_id, e);
                return Ok(ToolResult::error_with_details(
                    format!(
                        "Document '{}' was created, but its initial content could not be added. Details: {}",
                        args.title, e
                    ),
                    json!({ "id": document_id, "link": document_link(&document_id) }),
                ));
            }
        }

        info!("Document '{}' created with id {}", args.title, document_id);

        Ok(ToolResult::success(
            format!("Document '{}' created.", args.title),
            json!({ "id": document_id, "link": document_link(&document_id) }),
        ))
    }

    async fn read_document(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: ReadDocumentArgs = decode_args(args)?;
        let client = self.service.client().await?;

        let document = client
            .get(&format!("/documents/{}", segment(&args.document_id)), &[])
            .await?;
        let title = document
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled")
            .to_string();
        let content = extract_text(&document);
        debug!("Read {} characters from document {}", content.len(), args.document_id);

        Ok(ToolResult::success(
            format!("Read document '{}'.", title),
            json!({ "id": args.document_id, "title": title, "content": content }),
        ))
    }

    async fn update_document(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: UpdateDocumentArgs = decode_args(args)?;
        if args.content.is_empty() {
            return Err(ToolError::InvalidArguments("content must not be empty".to_string()));
        }
        let client = self.service.client().await?;

        let document = client
            .get(
                &format!("/documents/{}", segment(&args.document_id)),
                &[("fields", "body.content".to_string())],
            )
            .await?;
        let index = end_of_body_index(&document)?;

        let (path, body) = insert_text_request(&args.document_id, index, &args.content);
        client.post(&path, &[], &body).await?;

        Ok(ToolResult::success(
            format!("Content appended to document ID {}.", args.document_id),
            json!({ "id": args.document_id, "insertedAt": index }),
        ))
    }
}

#[async_trait]
impl DomainServer for DocsServer {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    async fn execute(&self, action: &str, args: ToolArgs) -> Result<ToolResult, AuthRequired> {
        match action {
            "create_document" => envelope(DOMAIN, "create document", self.create_document(args).await),
            "read_document" => envelope(DOMAIN, "read document", self.read_document(args).await),
            "update_document" => envelope(DOMAIN, "update document", self.update_document(args).await),
            other => unknown_action(DOMAIN, other),
        }
    }
}
