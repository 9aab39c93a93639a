use super::args::validate_against_schema;
use super::{ToolArgs, ToolDefinition, ToolResult};
use crate::errors::{AuthRequired, ToolError};
use crate::servers::DomainServer;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One catalog entry, in either the OpenAI wrapped form or the flat form.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogEntry {
    Wrapped { function: ToolDefinition },
    Flat(ToolDefinition),
}

#[derive(Deserialize)]
struct Catalog {
    #[serde(default)]
    tools: Vec<CatalogEntry>,
}

/// Reads the static tool catalog. Absence or malformation degrades to no tools.
pub fn load_catalog(path: &Path) -> Vec<ToolDefinition> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(
                "Tool definition file {} could not be read ({}); continuing without tools",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    match serde_json::from_str::<Catalog>(&raw) {
        Ok(catalog) => catalog
            .tools
            .into_iter()
            .map(|entry| match entry {
                CatalogEntry::Wrapped { function } => function,
                CatalogEntry::Flat(def) => def,
            })
            .collect(),
        Err(e) => {
            warn!(
                "Tool definition file {} is malformed ({}); continuing without tools",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Splits `<domain>_<action>` on the first underscore.
pub fn parse_tool_name(name: &str) -> Result<(&str, &str), ToolError> {
    match name.split_once('_') {
        Some((domain, action)) if !domain.is_empty() && !action.is_empty() => Ok((domain, action)),
        _ => Err(ToolError::UnknownTool(format!(
            "'{}' does not follow the <domain>_<action> naming",
            name
        ))),
    }
}

/// The registration table from tool names to domain servers.
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    schemas: HashMap<String, usize>,
    servers: HashMap<&'static str, Arc<dyn DomainServer>>,
    table: BTreeMap<String, (&'static str, &'static str)>,
}

impl ToolRegistry {
    pub fn new(catalog_path: impl AsRef<Path>, servers: Vec<Arc<dyn DomainServer>>) -> Self {
        Self::with_definitions(load_catalog(catalog_path.as_ref()), servers)
    }

    pub fn with_definitions(
        definitions: Vec<ToolDefinition>,
        servers: Vec<Arc<dyn DomainServer>>,
    ) -> Self {
        let mut table = BTreeMap::new();
        let mut by_domain = HashMap::new();
        for server in servers {
            for action in server.actions() {
                table.insert(format!("{}_{}", server.domain(), action), (server.domain(), *action));
            }
            by_domain.insert(server.domain(), server);
        }

        let schemas: HashMap<String, usize> = definitions
            .iter()
            .enumerate()
            .map(|(i, def)| (def.name.clone(), i))
            .collect();

        for def in &definitions {
            if !table.contains_key(&def.name) {
                warn!("Tool definition '{}' has no registered handler", def.name);
            }
        }
        info!(
            "Tool registry ready: {} handlers, {} definitions",
            table.len(),
            definitions.len()
        );

        Self {
            definitions,
            schemas,
            servers: by_domain,
            table,
        }
    }

    pub fn get_tool_definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Every dispatchable tool name, sorted.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// `(tool, domain, action)` rows of the dispatch table.
    pub fn dispatch_table(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.table
            .iter()
            .map(|(name, (domain, action))| (name.as_str(), *domain, *action))
    }

    /// Dispatches one call. Only `AuthRequired` escapes; everything else is an envelope.
    pub async fn execute(&self, tool_name: &str, args: ToolArgs) -> Result<ToolResult, AuthRequired> {
        let (domain, action) = match parse_tool_name(tool_name) {
            Ok(parts) => parts,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let server = match self.servers.get(domain) {
            Some(server) => server,
            None => {
                error!("No server registered for domain '{}'", domain);
                return Ok(ToolResult::error(
                    ToolError::UnknownTool(format!("no server for domain '{}'", domain)).to_string(),
                ));
            }
        };

        if !self.table.contains_key(tool_name) {
            error!("Server '{}' has no action '{}'", domain, action);
            return Ok(ToolResult::error(format!(
                "No action '{}' found on server '{}'",
                action, domain
            )));
        }

        if let Some(def) = self.schemas.get(tool_name).map(|i| &self.definitions[*i]) {
            if let Err(reason) = validate_against_schema(&def.parameters, &args) {
                warn!("Rejected arguments for {}: {}", tool_name, reason);
                return Ok(ToolResult::error(ToolError::InvalidArguments(reason).to_string()));
            }
        }

        debug!("Dispatching {} to {}.{}", tool_name, domain, action);
        server.execute(action, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_underscore_only() {
        assert_eq!(parse_tool_name("gmail_send_email").unwrap(), ("gmail", "send_email"));
        assert_eq!(
            parse_tool_name("gsheets_nonexistent_action").unwrap(),
            ("gsheets", "nonexistent_action")
        );
        assert!(parse_tool_name("gmail").is_err());
        assert!(parse_tool_name("_send").is_err());
        assert!(parse_tool_name("gmail_").is_err());
    }

    #[test]
    fn catalog_accepts_wrapped_and_flat_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        fs::write(
            &path,
            r#"{"tools": [
                {"type": "function", "function": {"name": "gmail_send_email", "description": "Send"}},
                {"name": "gdocs_read_document", "parameters": {"type": "object", "required": ["document_id"]}}
            ]}"#,
        )
        .unwrap();

        let defs = load_catalog(&path);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "gmail_send_email");
        assert_eq!(defs[1].parameters["required"][0], "document_id");
    }

    #[test]
    fn missing_or_malformed_catalog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_catalog(&dir.path().join("absent.json")).is_empty());

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_catalog(&path).is_empty());
    }
}
