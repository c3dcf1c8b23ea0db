//! Offline documentation tools.
//!
//! Both tools are file-to-file transformations over an OpenAPI document:
//! [`endpoint_diff`] compares it with a route listing and
//! [`openapi_markdown`] renders it as a markdown reference.

pub mod endpoint_diff;
pub mod openapi_markdown;
pub mod paths;

use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use endpoint_diff::{DiffReport, EndpointMap};
pub use openapi_markdown::render_markdown;

/// HTTP methods the tools recognise, in report order
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "HEAD"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a readable route listing: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ReportError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Loads an OpenAPI document. `.json` files are read as JSON, anything
/// else as YAML.
pub fn load_openapi(path: &Path) -> Result<Value, ReportError> {
    let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&text).map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        let yaml: serde_yml::Value =
            serde_yml::from_str(&text).map_err(|source| ReportError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(yaml_to_json(yaml))
    }
}

/// YAML allows non-string keys (`200:` in responses); they become strings.
fn yaml_to_json(value: serde_yml::Value) -> Value {
    match value {
        serde_yml::Value::Null => Value::Null,
        serde_yml::Value::Bool(b) => Value::Bool(b),
        serde_yml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yml::Value::String(s) => Value::String(s),
        serde_yml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        serde_yml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yml::Value) -> String {
    match key {
        serde_yml::Value::String(s) => s,
        serde_yml::Value::Number(n) => n.to_string(),
        serde_yml::Value::Bool(b) => b.to_string(),
        serde_yml::Value::Null => "null".to_string(),
        other => serde_yml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn yaml_document_with_numeric_status_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.yaml");
        fs::write(
            &path,
            "openapi: 3.0.0\npaths:\n  /lots:\n    get:\n      responses:\n        200:\n          description: ok\n",
        )
        .unwrap();

        let doc = load_openapi(&path).unwrap();
        assert_eq!(
            doc["paths"]["/lots"]["get"]["responses"]["200"]["description"],
            "ok"
        );
    }

    #[test]
    fn json_document_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.json");
        fs::write(&path, r#"{"paths": {"/products": {"post": {}}}}"#).unwrap();

        let doc = load_openapi(&path).unwrap();
        assert!(doc["paths"]["/products"].get("post").is_some());
    }

    #[test]
    fn missing_document_is_an_io_error() {
        let err = load_openapi(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
    }
}
