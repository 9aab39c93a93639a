use super::{envelope, segment, unknown_action, DomainServer, ServiceHandle};
use crate::errors::{AuthRequired, ToolError, WorkspaceApiError};
use crate::tools::args::decode_args;
use crate::tools::{ToolArgs, ToolResult};
use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

const DOMAIN: &str = "gsheets";
const ACTIONS: &[&str] = &["create_sheet", "read_sheet", "update_sheet"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateSheetArgs {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadSheetArgs {
    spreadsheet_id: String,
    range: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateSheetArgs {
    spreadsheet_id: String,
    range: String,
    values: Vec<Vec<Value>>,
}

fn values_path(spreadsheet_id: &str, range: &str) -> String {
    format!(
        "/spreadsheets/{}/values/{}",
        segment(spreadsheet_id),
        segment(range)
    )
}

pub struct SheetsServer {
    service: ServiceHandle,
}

impl SheetsServer {
    pub fn new(service: ServiceHandle) -> Self {
        Self { service }
    }

    async fn create_sheet(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: CreateSheetArgs = decode_args(args)?;
        let client = self.service.client().await?;

        let spreadsheet = client
            .post(
                "/spreadsheets",
                &[("fields", "spreadsheetId,spreadsheetUrl".to_string())],
                &json!({ "properties": { "title": &args.title } }),
            )
            .await?;
        let id = spreadsheet
            .get("spreadsheetId")
            .cloned()
            .ok_or_else(|| WorkspaceApiError::FormatError("create response has no spreadsheetId".to_string()))?;

        info!("Spreadsheet '{}' created with id {}", args.title, id);

        Ok(ToolResult::success(
            format!("Spreadsheet '{}' created.", args.title),
            json!({
                "id": id,
                "url": spreadsheet.get("spreadsheetUrl").cloned().unwrap_or(Value::Null),
            }),
        ))
    }

    async fn read_sheet(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: ReadSheetArgs = decode_args(args)?;
        let client = self.service.client().await?;

        let result = client
            .get(&values_path(&args.spreadsheet_id, &args.range), &[])
            .await?;
        // Google omits `values` entirely for an empty range
        let values = result
            .get("values")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let rows = values.as_array().map_or(0, Vec::len);

        Ok(ToolResult::success(
            format!("Read {} rows from range {}.", rows, args.range),
            json!({
                "range": result.get("range").cloned().unwrap_or(Value::String(args.range.clone())),
                "values": values,
            }),
        ))
    }

    async fn update_sheet(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: UpdateSheetArgs = decode_args(args)?;
        if args.values.is_empty() {
            return Err(ToolError::InvalidArguments("values must contain at least one row".to_string()));
        }
        let client = self.service.client().await?;

        let result = client
            .put(
                &values_path(&args.spreadsheet_id, &args.range),
                &[("valueInputOption", "USER_ENTERED".to_string())],
                &json!({ "range": &args.range, "values": &args.values }),
            )
            .await?;

        let updated_cells = result.get("updatedCells").and_then(Value::as_u64).unwrap_or(0);

        Ok(ToolResult::success(
            format!("Updated {} cells in the sheet.", updated_cells),
            json!({
                "updatedRange": result.get("updatedRange").cloned().unwrap_or(Value::Null),
                "updatedCells": updated_cells,
            }),
        ))
    }
}

#[async_trait]
impl DomainServer for SheetsServer {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    async fn execute(&self, action: &str, args: ToolArgs) -> Result<ToolResult, AuthRequired> {
        match action {
            "create_sheet" => envelope(DOMAIN, "create Google Sheet", self.create_sheet(args).await),
            "read_sheet" => envelope(DOMAIN, "read sheet data", self.read_sheet(args).await),
            "update_sheet" => envelope(DOMAIN, "update sheet data", self.update_sheet(args).await),
            other => unknown_action(DOMAIN, other),
        }
    }
}
