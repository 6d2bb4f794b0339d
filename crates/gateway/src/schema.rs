// # -----------------------------
// # crates/gateway/src/schema.rs
// # -----------------------------
//! Tool names, typed arguments and the JSON schemas advertised through `tools/list`.

use crate::error::GateError;
use crate::limits::OpKind;
use fsgate_common::ServiceName;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

pub const MAX_QUERY_CHARS: usize = 256;
pub const MAX_FILE_TYPES: usize = 20;
pub const MAX_FILE_TYPE_CHARS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ReadMultiServiceFile,
    ListServiceFiles,
    SearchAcrossServices,
    GetProjectStructure,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::ReadMultiServiceFile,
        ToolName::ListServiceFiles,
        ToolName::GetProjectStructure,
        ToolName::SearchAcrossServices,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ReadMultiServiceFile => "read_multi_service_file",
            ToolName::ListServiceFiles => "list_service_files",
            ToolName::SearchAcrossServices => "search_across_services",
            ToolName::GetProjectStructure => "get_project_structure",
        }
    }

    /// Breaker guarding the tool; the static structure overview has none.
    pub fn op_kind(self) -> Option<OpKind> {
        match self {
            ToolName::ReadMultiServiceFile => Some(OpKind::Read),
            ToolName::ListServiceFiles => Some(OpKind::List),
            ToolName::SearchAcrossServices => Some(OpKind::Search),
            ToolName::GetProjectStructure => None,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GateError::UnknownTool(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadArgs {
    pub service: ServiceName,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListArgs {
    pub service: ServiceName,
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchArgs {
    pub query: String,
    /// `None` means the configured default set.
    pub file_types: Option<Vec<String>>,
}

/// Arguments checked against the tool's contract, one variant per tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Read(ReadArgs),
    List(ListArgs),
    Search(SearchArgs),
    Structure,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRead {
    service: String,
    file_path: String,
}

#[derive(Deserialize)]
struct RawList {
    service: String,
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearch {
    query: String,
    #[serde(default)]
    file_types: Option<Vec<String>>,
}

fn decode<T: DeserializeOwned>(args: &Value) -> Result<T, GateError> {
    let empty = Value::Object(Default::default());
    let args = if args.is_null() { &empty } else { args };
    T::deserialize(args).map_err(|e| GateError::InvalidArgs(e.to_string()))
}

impl ToolCall {
    pub fn parse(tool: ToolName, args: &Value) -> Result<Self, GateError> {
        match tool {
            ToolName::ReadMultiServiceFile => {
                let raw: RawRead = decode(args)?;
                Ok(ToolCall::Read(ReadArgs {
                    service: raw.service.parse()?,
                    file_path: raw.file_path,
                }))
            }
            ToolName::ListServiceFiles => {
                let raw: RawList = decode(args)?;
                Ok(ToolCall::List(ListArgs {
                    service: raw.service.parse()?,
                    directory: raw.directory.unwrap_or_else(|| ".".to_string()),
                }))
            }
            ToolName::SearchAcrossServices => {
                let raw: RawSearch = decode(args)?;
                let chars = raw.query.chars().count();
                if raw.query.trim().is_empty() || chars > MAX_QUERY_CHARS {
                    return Err(GateError::InvalidArgs(format!(
                        "query must be 1-{MAX_QUERY_CHARS} characters"
                    )));
                }
                if let Some(types) = &raw.file_types {
                    if types.len() > MAX_FILE_TYPES {
                        return Err(GateError::InvalidArgs(format!(
                            "at most {MAX_FILE_TYPES} file types"
                        )));
                    }
                    if let Some(bad) = types
                        .iter()
                        .find(|t| t.trim().is_empty() || t.chars().count() > MAX_FILE_TYPE_CHARS)
                    {
                        return Err(GateError::InvalidArgs(format!("invalid file type: {bad:?}")));
                    }
                }
                Ok(ToolCall::Search(SearchArgs {
                    query: raw.query,
                    file_types: raw.file_types,
                }))
            }
            ToolName::GetProjectStructure => Ok(ToolCall::Structure),
        }
    }
}

fn service_enum() -> Vec<&'static str> {
    ServiceName::ALL.iter().map(|s| s.as_str()).collect()
}

/// Tool definitions as advertised by `tools/list`.
pub fn tool_definitions() -> Value {
    json!([
        {
            "name": ToolName::ReadMultiServiceFile.as_str(),
            "description": "Read a file from a service directory (api, crm, frontend, games, website, automation, root)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "service": {
                        "type": "string",
                        "enum": service_enum(),
                        "description": "Service directory to read from"
                    },
                    "filePath": {
                        "type": "string",
                        "description": "Relative path within the service directory"
                    }
                },
                "required": ["service", "filePath"]
            }
        },
        {
            "name": ToolName::ListServiceFiles.as_str(),
            "description": "List files and directories in a service",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "service": { "type": "string", "enum": service_enum() },
                    "directory": {
                        "type": "string",
                        "description": "Directory path within the service",
                        "default": "."
                    }
                },
                "required": ["service"]
            }
        },
        {
            "name": ToolName::GetProjectStructure.as_str(),
            "description": "Get an overview of the multi-service project structure",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": ToolName::SearchAcrossServices.as_str(),
            "description": "Search for text across all services",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "minLength": 1,
                        "maxLength": MAX_QUERY_CHARS,
                        "description": "Text to search for (case-insensitive)"
                    },
                    "fileTypes": {
                        "type": "array",
                        "items": { "type": "string", "maxLength": MAX_FILE_TYPE_CHARS },
                        "maxItems": MAX_FILE_TYPES,
                        "description": "File extensions to include (e.g. [\".js\", \".php\", \".py\"])"
                    }
                },
                "required": ["query"]
            }
        }
    ])
}
