use super::{envelope, segment, unknown_action, DomainServer, ServiceHandle};
use crate::errors::{AuthRequired, ToolError, WorkspaceApiError};
use crate::tools::args::decode_args;
use crate::tools::{ToolArgs, ToolResult};
use async_trait::async_trait;
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::{json, Value};

const DOMAIN: &str = "gforms";
const ACTIONS: &[&str] = &["create_form", "read_form", "get_responses"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateFormArgs {
    title: String,
    #[serde(default)]
    questions: Vec<QuestionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionSpec {
    pub question: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FormIdArgs {
    form_id: String,
}

/// Builds the `createItem` request for one question at `index`.
pub fn question_request(spec: &QuestionSpec, index: usize) -> Result<Value, ToolError> {
    let kind = spec.kind.as_deref().unwrap_or("short_answer");

    let body = match kind {
        "short_answer" => json!({ "textQuestion": {} }),
        "paragraph" => json!({ "textQuestion": { "paragraph": true } }),
        "multiple_choice" | "checkbox" => {
            if spec.options.is_empty() {
                return Err(ToolError::InvalidArguments(format!(
                    "question '{}' of type {} needs at least one option",
                    spec.question, kind
                )));
            }
            json!({
                "choiceQuestion": {
                    "type": if kind == "checkbox" { "CHECKBOX" } else { "RADIO" },
                    "options": spec.options.iter().map(|o| json!({"value": o})).collect::<Vec<_>>(),
                }
            })
        }
        other => {
            return Err(ToolError::InvalidArguments(format!(
                "unsupported question type '{}'",
                other
            )))
        }
    };

    let mut question = json!({ "required": true });
    if let (Value::Object(question), Value::Object(body)) = (&mut question, body) {
        question.extend(body);
    }

    Ok(json!({
        "createItem": {
            "item": {
                "title": spec.question,
                "questionItem": { "question": question }
            },
            "location": { "index": index }
        }
    }))
}

pub struct FormsServer {
    service: ServiceHandle,
}

impl FormsServer {
    pub fn new(service: ServiceHandle) -> Self {
        Self { service }
    }

    async fn create_form(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: CreateFormArgs = decode_args(args)?;

        // Validate every question before anything is created
        let requests = args
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| question_request(q, i))
            .collect::<Result<Vec<_>, _>>()?;

        let client = self.service.client().await?;
        let form = client
            .post("/forms", &[], &json!({ "info": { "title": &args.title } }))
            .await?;
        let form_id = form
            .get("formId")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkspaceApiError::FormatError("create response has no formId".to_string()))?
            .to_string();

        let submit_url = form.get("responderUri").cloned().unwrap_or(Value::Null);

        if !requests.is_empty() {
            debug!("Adding {} questions to form {}", requests.len(), form_id);
            let added = client
                .post(
                    &format!("/forms/{}:batchUpdate", segment(&form_id)),
                    &[],
                    &json!({ "requests": requests }),
                )
                .await;
            if let Err(e) = added {
                error!("Form {} created but its questions failed: {}", form_id, e);
                return Ok(ToolResult::error_with_details(
                    format!(
                        "Google Form '{}' was created, but its questions could not be added. Details: {}",
                        args.title, e
                    ),
                    json!({ "id": form_id, "submitUrl": submit_url }),
                ));
            }
        }

        info!("Form '{}' created with id {}", args.title, form_id);

        Ok(ToolResult::success(
            format!(
                "Google Form '{}' created with {} questions.",
                args.title,
                requests.len()
            ),
            json!({
                "id": form_id,
                "submitUrl": submit_url,
            }),
        ))
    }

    async fn read_form(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: FormIdArgs = decode_args(args)?;
        let client = self.service.client().await?;

        let form = client
            .get(&format!("/forms/{}", segment(&args.form_id)), &[])
            .await?;
        let title = form
            .pointer("/info/title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled form")
            .to_string();
        let items: Vec<&str> = form
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.get("title").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ToolResult::success(
            format!("Form '{}' has {} items.", title, items.len()),
            json!({ "id": args.form_id, "title": title, "items": items }),
        ))
    }

    async fn get_responses(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: FormIdArgs = decode_args(args)?;
        let client = self.service.client().await?;

        let listing = client
            .get(&format!("/forms/{}/responses", segment(&args.form_id)), &[])
            .await?;
        let responses = listing
            .get("responses")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let count = responses.as_array().map_or(0, Vec::len);

        Ok(ToolResult::success(
            format!("Fetched {} responses.", count),
            json!({ "id": args.form_id, "responses": responses }),
        ))
    }
}

#[async_trait]
impl DomainServer for FormsServer {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    async fn execute(&self, action: &str, args: ToolArgs) -> Result<ToolResult, AuthRequired> {
        match action {
            "create_form" => envelope(DOMAIN, "create Google Form", self.create_form(args).await),
            "read_form" => envelope(DOMAIN, "read Google Form", self.read_form(args).await),
            "get_responses" => envelope(DOMAIN, "get form responses", self.get_responses(args).await),
            other => unknown_action(DOMAIN, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: Option<&str>, options: &[&str]) -> QuestionSpec {
        QuestionSpec {
            question: "Favourite colour?".to_string(),
            kind: kind.map(str::to_string),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn multiple_choice_becomes_radio() {
        let request = question_request(&spec(Some("multiple_choice"), &["red", "blue"]), 2).unwrap();
        let question = &request["createItem"]["item"]["questionItem"]["question"];
        assert_eq!(question["required"], true);
        assert_eq!(question["choiceQuestion"]["type"], "RADIO");
        assert_eq!(question["choiceQuestion"]["options"][1]["value"], "blue");
        assert_eq!(request["createItem"]["location"]["index"], 2);
    }

    #[test]
    fn default_type_is_short_answer() {
        let request = question_request(&spec(None, &[]), 0).unwrap();
        assert!(request["createItem"]["item"]["questionItem"]["question"]
            .get("textQuestion")
            .is_some());
    }

    #[test]
    fn choice_without_options_and_unknown_types_are_rejected() {
        assert!(question_request(&spec(Some("checkbox"), &[]), 0).is_err());
        assert!(question_request(&spec(Some("slider"), &[]), 0).is_err());
    }
}
