//! Renders an OpenAPI document as a markdown endpoint reference.

use super::{ReportError, HTTP_METHODS};
use csv::ReaderBuilder;
use serde_json::Value;
use std::{collections::HashMap, fs, path::Path};
use tracing::{info, warn};

const MAX_OBJECT_KEYS: usize = 6;

/// Business rules enforced by the stock service, appended to every
/// reference so readers see them next to the endpoints.
const BUSINESS_RULES: &str = "\
## Business rules
- Product GTINs must be valid EAN-13 codes; a wrong check digit is rejected.
- Lot stock never goes negative: an issue or adjustment that would leave it below zero is rejected with 422.
- Issues from a lot past its expiry date are rejected; receipts and adjustments are still accepted.
- Lots are listed earliest expiry first (FEFO order); picking a lot is up to the caller.
- Every applied movement records who applied it, when, and the stock before and after.";

/// Column headers of the external API table and the CSV columns they read.
const API_COLUMNS: [(&str, &str); 9] = [
    ("Name", "name"),
    ("Base URL", "base_url"),
    ("Endpoints", "endpoints"),
    ("Auth", "auth"),
    ("Scopes", "scopes"),
    ("Rate limit", "rate_limit"),
    ("Timeouts", "timeouts"),
    ("Retries", "retries"),
    ("Contact/Docs", "docs"),
];

/// Escapes a value for use inside a markdown table cell.
pub fn md_escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ").trim().to_string()
}

/// Short, single-line description of a JSON schema.
pub fn format_schema(schema: Option<&Value>) -> String {
    let Some(schema) = schema.filter(|s| s.as_object().map_or(false, |o| !o.is_empty())) else {
        return "-".to_string();
    };

    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        return reference.rsplit('/').next().unwrap_or(reference).to_string();
    }

    for (key, joiner) in [("allOf", " and "), ("oneOf", " or "), ("anyOf", " or ")] {
        if let Some(members) = schema.get(key).and_then(Value::as_array) {
            let parts: Vec<String> = members
                .iter()
                .filter(|m| !is_null_schema(m))
                .map(|m| format_schema(Some(m)))
                .collect();
            let nullable = members.iter().any(is_null_schema);
            let joined = parts.join(joiner);
            return if nullable { format!("{}?", joined) } else { joined };
        }
    }

    let (type_name, nullable) = match schema.get("type") {
        Some(Value::String(t)) => (Some(t.as_str()), false),
        // OpenAPI 3.1 style: ["string", "null"]
        Some(Value::Array(types)) => {
            let nullable = types.iter().any(|t| t == "null");
            let first = types.iter().filter_map(Value::as_str).find(|t| *t != "null");
            (first, nullable)
        }
        _ => (None, false),
    };

    let rendered = match type_name {
        Some("array") => format!("array<{}>", format_schema(schema.get("items"))),
        Some("object") => {
            let keys: Vec<&str> = schema
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| props.keys().map(String::as_str).collect())
                .unwrap_or_default();
            let shown = keys
                .iter()
                .take(MAX_OBJECT_KEYS)
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            let more = if keys.len() > MAX_OBJECT_KEYS { "…" } else { "" };
            format!("object{{{}{}}}", shown, more)
        }
        Some(other) => other.to_string(),
        None => "-".to_string(),
    };

    if nullable && rendered != "-" {
        format!("{}?", rendered)
    } else {
        rendered
    }
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

fn format_security(requirements: &Value) -> String {
    let parts: Vec<String> = requirements
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .flat_map(|req| {
            req.iter().map(|(name, scopes)| {
                let scopes: Vec<&str> = scopes
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .collect();
                if scopes.is_empty() {
                    name.clone()
                } else {
                    format!("{}({})", name, scopes.join(","))
                }
            })
        })
        .collect();

    if parts.is_empty() {
        "—".to_string()
    } else {
        parts.join("; ")
    }
}

fn content_types(value: Option<&Value>) -> String {
    let types: Vec<&str> = value
        .and_then(|v| v.get("content"))
        .and_then(Value::as_object)
        .map(|content| content.keys().map(String::as_str).collect())
        .unwrap_or_default();
    if types.is_empty() {
        "—".to_string()
    } else {
        types.join(", ")
    }
}

/// The success response whose media types are reported as "produces":
/// `200` if present, else the first 2xx.
fn success_response(op: &Value) -> Option<&Value> {
    let responses = op.get("responses")?.as_object()?;
    responses.get("200").or_else(|| {
        responses
            .iter()
            .find(|(code, _)| code.starts_with('2'))
            .map(|(_, r)| r)
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn summary(op: &Value) -> &str {
    str_field(op, "summary")
        .or_else(|| str_field(op, "description"))
        .unwrap_or("—")
}

/// Operations of a path item in report order.
fn operations(item: &Value) -> Vec<(&'static str, &Value)> {
    HTTP_METHODS
        .iter()
        .filter_map(|method| {
            item.get(method.to_ascii_lowercase().as_str())
                .map(|op| (*method, op))
        })
        .collect()
}

fn sorted_paths(doc: &Value) -> Vec<(&String, &Value)> {
    let mut paths: Vec<(&String, &Value)> = doc
        .get("paths")
        .and_then(Value::as_object)
        .map(|p| p.iter().collect())
        .unwrap_or_default();
    paths.sort_by(|a, b| a.0.cmp(b.0));
    paths
}

/// Renders the external API table from a CSV file. A file that cannot be
/// read yields a note instead of failing the whole report.
fn render_apis_table(csv_path: &Path) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "## External APIs".to_string(),
        String::new(),
        format!("_Source: {}_", csv_path.display()),
        String::new(),
    ];

    match read_api_rows(csv_path) {
        Ok(rows) => {
            let headers: Vec<&str> = API_COLUMNS.iter().map(|(h, _)| *h).collect();
            lines.push(format!("| {} |", headers.join(" | ")));
            lines.push(format!("|{}", "---|".repeat(API_COLUMNS.len())));
            for row in rows {
                let cells: Vec<String> = API_COLUMNS
                    .iter()
                    .map(|(_, key)| md_escape(row.get(*key).map(String::as_str).unwrap_or("")))
                    .collect();
                lines.push(format!("| {} |", cells.join(" | ")));
            }
        }
        Err(e) => {
            warn!(path = %csv_path.display(), error = %e, "Could not read external API CSV");
            lines.push(format!("_Could not read the CSV: {}_", e));
        }
    }
    lines
}

fn read_api_rows(csv_path: &Path) -> Result<Vec<HashMap<String, String>>, ReportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase().replace([' ', '-'], "_"))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Renders the full markdown reference for an OpenAPI document.
pub fn render_markdown(doc: &Value, apis_csv: Option<&Path>) -> String {
    let info = doc.get("info").cloned().unwrap_or(Value::Null);
    let title = str_field(&info, "title").unwrap_or("API");
    let version = str_field(&info, "version").unwrap_or("");

    let servers: Vec<&str> = doc
        .get("servers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|s| str_field(s, "url"))
        .collect();
    let base_urls = if servers.is_empty() {
        "—".to_string()
    } else {
        servers.join(", ")
    };
    let global_auth = doc
        .get("security")
        .map(format_security)
        .unwrap_or_else(|| "—".to_string());

    let paths = sorted_paths(doc);
    let mut lines = vec![
        format!("# {} endpoints (v{})", title, version),
        String::new(),
        format!("- **Base URLs**: {}", base_urls),
        format!("- **Global authentication**: {}", global_auth),
        String::new(),
        "## Endpoint matrix".to_string(),
        "| Method | Path | operationId | Summary | Auth | Consumes | Produces |".to_string(),
        "|---|---|---|---|---|---|---|".to_string(),
    ];

    for (path, item) in &paths {
        for (method, op) in operations(item) {
            let op_auth = op
                .get("security")
                .map(format_security)
                .unwrap_or_else(|| global_auth.clone());
            lines.push(format!(
                "| {} | `{}` | {} | {} | {} | {} | {} |",
                method,
                path,
                md_escape(str_field(op, "operationId").unwrap_or("—")),
                md_escape(summary(op)),
                md_escape(&op_auth),
                md_escape(&content_types(op.get("requestBody"))),
                md_escape(&content_types(success_response(op))),
            ));
        }
    }

    lines.push(String::new());
    lines.push("## Endpoint details".to_string());
    for (path, item) in &paths {
        lines.push(String::new());
        lines.push(format!("### `{}`", path));
        for (method, op) in operations(item) {
            lines.push(String::new());
            lines.push(format!("#### {}", method));
            lines.push(format!(
                "- **operationId**: `{}`",
                str_field(op, "operationId").unwrap_or("—")
            ));
            lines.push(format!("- **Summary**: {}", md_escape(summary(op))));

            let params = op
                .get("parameters")
                .and_then(Value::as_array)
                .filter(|p| !p.is_empty());
            match params {
                Some(params) => {
                    lines.push("**Parameters**:".to_string());
                    lines.push("| In | Name | Type | Required | Description |".to_string());
                    lines.push("|---|---|---|---|---|".to_string());
                    for p in params {
                        lines.push(format!(
                            "| {} | {} | {} | {} | {} |",
                            str_field(p, "in").unwrap_or("-"),
                            str_field(p, "name").unwrap_or("-"),
                            md_escape(&format_schema(p.get("schema"))),
                            p.get("required").and_then(Value::as_bool).unwrap_or(false),
                            md_escape(str_field(p, "description").unwrap_or("-")),
                        ));
                    }
                }
                None => lines.push("_No parameters_".to_string()),
            }

            if let Some(content) = op
                .get("requestBody")
                .and_then(|rb| rb.get("content"))
                .and_then(Value::as_object)
            {
                lines.push("**Request body**:".to_string());
                for (media_type, media) in content {
                    lines.push(format!(
                        "- {}: `{}`",
                        media_type,
                        format_schema(media.get("schema"))
                    ));
                }
            }

            lines.push("**Responses**:".to_string());
            let mut responses: Vec<(&String, &Value)> = op
                .get("responses")
                .and_then(Value::as_object)
                .map(|r| r.iter().collect())
                .unwrap_or_default();
            responses.sort_by(|a, b| a.0.cmp(b.0));
            for (code, response) in responses {
                let description = md_escape(str_field(response, "description").unwrap_or(""));
                lines.push(format!(
                    "- {}: {} (content: {})",
                    code,
                    if description.is_empty() { "—" } else { description.as_str() },
                    content_types(Some(response))
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push(BUSINESS_RULES.to_string());

    if let Some(csv_path) = apis_csv {
        if csv_path.exists() {
            lines.extend(render_apis_table(csv_path));
        } else {
            warn!(path = %csv_path.display(), "External API CSV not found; table omitted");
        }
    }

    lines.join("\n")
}

/// Loads `openapi_file`, renders it and writes the markdown to `out_file`.
pub fn run(openapi_file: &Path, out_file: &Path, apis_csv: Option<&Path>) -> Result<(), ReportError> {
    let doc = super::load_openapi(openapi_file)?;
    let markdown = render_markdown(&doc, apis_csv);

    if let Some(parent) = out_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }
    fs::write(out_file, markdown).map_err(|e| ReportError::io(out_file, e))?;
    info!(out = %out_file.display(), "Endpoint reference written");
    Ok(())
}
