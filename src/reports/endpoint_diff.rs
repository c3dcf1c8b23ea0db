//! Compares the routes a server actually serves with its OpenAPI document.

use super::{
    paths::{is_excluded, normalize_path},
    ReportError, HTTP_METHODS,
};
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Normalised path → HTTP methods
pub type EndpointMap = BTreeMap<String, BTreeSet<String>>;

/// Output file names written by [`DiffReport::write_to`]
pub const COMPARISON_MD: &str = "comparison.md";
pub const ONLY_IN_ROUTES_CSV: &str = "only_in_urls.csv";
pub const ONLY_IN_OPENAPI_CSV: &str = "only_in_openapi.csv";

#[derive(Debug, Deserialize)]
struct RouteRow {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    method: Option<String>,
}

fn is_known_method(method: &str) -> bool {
    HTTP_METHODS.contains(&method)
}

fn add_route(map: &mut EndpointMap, raw_path: &str, method: Option<&str>) {
    let path = normalize_path(raw_path);
    if path.is_empty() || is_excluded(&path) {
        return;
    }
    let methods = map.entry(path).or_default();
    if let Some(method) = method.map(str::to_ascii_uppercase) {
        if is_known_method(&method) {
            methods.insert(method);
        }
    }
}

/// Candidate decodings of a route listing, most likely first.
///
/// Listings exported from Windows shells are often UTF-16 with or without
/// a byte order mark.
fn decode_candidates(bytes: &[u8]) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        if let Ok(text) = std::str::from_utf8(rest) {
            out.push(text.to_string());
        }
    } else if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        out.extend(decode_utf16(rest, u16::from_le_bytes));
    } else if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        out.extend(decode_utf16(rest, u16::from_be_bytes));
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        out.push(text.to_string());
    }
    out.extend(decode_utf16(bytes, u16::from_le_bytes));
    out.extend(decode_utf16(bytes, u16::from_be_bytes));
    out
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

/// Parses a JSON route listing: an array of `{url|pattern, method}` rows.
pub fn parse_routes_json(bytes: &[u8], source: &Path) -> Result<EndpointMap, ReportError> {
    let rows = decode_candidates(bytes)
        .into_iter()
        .find_map(|text| serde_json::from_str::<Vec<RouteRow>>(&text).ok())
        .ok_or_else(|| ReportError::Decode {
            path: source.to_path_buf(),
            reason: "expected a JSON array of {url, method} rows in UTF-8 or UTF-16".into(),
        })?;

    let mut map = EndpointMap::new();
    for row in rows {
        let raw = row.url.or(row.pattern).unwrap_or_default();
        add_route(&mut map, &raw, row.method.as_deref());
    }
    Ok(map)
}

/// Parses a plain listing: one route per line, the path being the text
/// from the first `/` to the end of the line. Every route counts as `GET`.
pub fn parse_routes_text(text: &str) -> EndpointMap {
    let mut map = EndpointMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let raw = line.find('/').map(|idx| &line[idx..]).unwrap_or("");
        add_route(&mut map, raw, Some("GET"));
    }
    map
}

/// Reads a route listing, as JSON when the file name ends in `.json`.
pub fn load_routes(path: &Path) -> Result<EndpointMap, ReportError> {
    let bytes = fs::read(path).map_err(|e| ReportError::io(path, e))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        parse_routes_json(&bytes, path)
    } else {
        Ok(parse_routes_text(&String::from_utf8_lossy(&bytes)))
    }
}

/// Collects the documented operations of an OpenAPI document.
pub fn openapi_endpoints(doc: &Value) -> EndpointMap {
    let mut map = EndpointMap::new();
    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return map;
    };

    for (raw_path, item) in paths {
        let path = normalize_path(raw_path);
        if path.is_empty() || is_excluded(&path) {
            continue;
        }
        let Some(operations) = item.as_object() else {
            continue;
        };
        for key in operations.keys() {
            let method = key.to_ascii_uppercase();
            if is_known_method(&method) {
                map.entry(path.clone()).or_default().insert(method);
            }
        }
    }
    map
}

/// A path present on both sides whose method sets differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMismatch {
    pub path: String,
    pub only_in_routes: Vec<String>,
    pub only_in_openapi: Vec<String>,
}

/// Result of comparing a route listing with an OpenAPI document
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub routes: EndpointMap,
    pub openapi: EndpointMap,
    pub only_in_routes: Vec<String>,
    pub only_in_openapi: Vec<String>,
    pub method_mismatches: Vec<MethodMismatch>,
}

impl DiffReport {
    pub fn compare(routes: EndpointMap, openapi: EndpointMap) -> Self {
        let only_in_routes = routes
            .keys()
            .filter(|path| !openapi.contains_key(*path))
            .cloned()
            .collect();
        let only_in_openapi = openapi
            .keys()
            .filter(|path| !routes.contains_key(*path))
            .cloned()
            .collect();

        // Plain listings carry no methods worth comparing.
        let method_mismatches = routes
            .iter()
            .filter(|(_, methods)| !methods.is_empty())
            .filter_map(|(path, served)| {
                let documented = openapi.get(path)?;
                let only_in_routes: Vec<String> = served.difference(documented).cloned().collect();
                let only_in_openapi: Vec<String> =
                    documented.difference(served).cloned().collect();
                if only_in_routes.is_empty() && only_in_openapi.is_empty() {
                    None
                } else {
                    Some(MethodMismatch {
                        path: path.clone(),
                        only_in_routes,
                        only_in_openapi,
                    })
                }
            })
            .collect();

        Self {
            routes,
            openapi,
            only_in_routes,
            only_in_openapi,
            method_mismatches,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.only_in_routes.is_empty() && self.only_in_openapi.is_empty()
    }

    pub fn render_markdown(&self) -> String {
        let mut md = vec![
            "# Endpoint comparison (routes vs OpenAPI)".to_string(),
            "## Summary".to_string(),
            format!("- Served routes (cleaned): **{}**", self.routes.len()),
            format!("- OpenAPI paths: **{}**", self.openapi.len()),
            format!("- Only in routes: **{}**", self.only_in_routes.len()),
            format!("- Only in OpenAPI: **{}**", self.only_in_openapi.len()),
            String::new(),
        ];

        if !self.only_in_routes.is_empty() {
            md.push("## Only in routes".to_string());
            md.extend(self.only_in_routes.iter().map(|p| format!("- `{}`", p)));
            md.push(String::new());
        }
        if !self.only_in_openapi.is_empty() {
            md.push("## Only in OpenAPI".to_string());
            md.extend(self.only_in_openapi.iter().map(|p| format!("- `{}`", p)));
            md.push(String::new());
        }
        if !self.method_mismatches.is_empty() {
            md.push("## Method differences".to_string());
            md.push("| Path | Only served | Only documented |".to_string());
            md.push("|---|---|---|".to_string());
            for m in &self.method_mismatches {
                md.push(format!(
                    "| `{}` | {} | {} |",
                    m.path,
                    join_or_dash(&m.only_in_routes),
                    join_or_dash(&m.only_in_openapi)
                ));
            }
            md.push(String::new());
        }

        md.join("\n")
    }

    /// Writes the markdown summary and the two CSV lists into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
        fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;

        let md_path = dir.join(COMPARISON_MD);
        fs::write(&md_path, self.render_markdown()).map_err(|e| ReportError::io(&md_path, e))?;

        let routes_csv = dir.join(ONLY_IN_ROUTES_CSV);
        write_path_csv(&routes_csv, &self.only_in_routes)?;
        let openapi_csv = dir.join(ONLY_IN_OPENAPI_CSV);
        write_path_csv(&openapi_csv, &self.only_in_openapi)?;

        info!(
            only_in_routes = self.only_in_routes.len(),
            only_in_openapi = self.only_in_openapi.len(),
            dir = %dir.display(),
            "Endpoint comparison written"
        );
        Ok(vec![md_path, routes_csv, openapi_csv])
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn write_path_csv(path: &Path, rows: &[String]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["path"])?;
    for row in rows {
        writer.write_record([row.as_str()])?;
    }
    writer.flush().map_err(|e| ReportError::io(path, e))?;
    debug!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

/// Loads both inputs, compares them and writes the report into `out_dir`.
pub fn run(routes_file: &Path, openapi_file: &Path, out_dir: &Path) -> Result<DiffReport, ReportError> {
    let routes = load_routes(routes_file)?;
    let doc = super::load_openapi(openapi_file)?;
    let report = DiffReport::compare(routes, openapi_endpoints(&doc));
    report.write_to(out_dir)?;
    Ok(report)
}
