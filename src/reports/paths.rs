//! Route path normalisation shared by the report tools.
//!
//! Route listings come from routers with different template syntaxes
//! (`(?P<id>[^/]+)`, `<int:id>`, `<id>`, `{id}`, `:id`). Everything is
//! brought to the OpenAPI `{id}` form before comparing.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static FORMAT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\\)?\.\{format\}(/)?").unwrap());
static FORMAT_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\?P<format>[^)]+\)").unwrap());
static NAMED_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\?P<([^>]+)>[^)]+\)").unwrap());
static TYPED_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^:>]+:([^>]+)>").unwrap());
static ANGLE_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]+)>").unwrap());
static COLON_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"/:([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static REPEATED_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").unwrap());

const EXCLUDED_EXACT: [&str; 2] = ["/", "/api"];
const EXCLUDED_PREFIXES: [&str; 4] = ["/admin", "/__debug__", "/static", "/media"];
static EXCLUDED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![Regex::new(r"/i18n").unwrap()]);

/// Normalises a route template to `/segment/{param}` form.
///
/// Empty input stays empty.
pub fn normalize_path(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let path = WHITESPACE.replace_all(raw, "");
    let path = path.replace(['^', '$'], "");
    let path = FORMAT_SUFFIX.replace_all(&path, "");
    let path = FORMAT_GROUP.replace_all(&path, "");
    let path = NAMED_GROUP.replace_all(&path, "{${1}}");
    let path = TYPED_PARAM.replace_all(&path, "{${1}}");
    let path = ANGLE_PARAM.replace_all(&path, "{${1}}");
    let path = COLON_PARAM.replace_all(&path, "/{${1}}");

    let mut path = if path.starts_with('/') {
        path.into_owned()
    } else {
        format!("/{}", path)
    };
    path = REPEATED_SLASH.replace_all(&path, "/").into_owned();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Routes left out of comparisons: the router roots, format-suffixed
/// variants and framework or back-office areas.
pub fn is_excluded(path: &str) -> bool {
    EXCLUDED_EXACT.contains(&path)
        || path.contains("{format}")
        || EXCLUDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || EXCLUDED_PATTERNS.iter().any(|rx| rx.is_match(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("^api/products/(?P<pk>[^/.]+)/$", "/api/products/{pk}")]
    #[case("api/lots/<int:id>/", "/api/lots/{id}")]
    #[case("api/lots/<id>", "/api/lots/{id}")]
    #[case("/api/v1/movements/:id/apply", "/api/v1/movements/{id}/apply")]
    #[case("/api//products///", "/api/products")]
    #[case(" /api/ products ", "/api/products")]
    #[case("^api/products\\.{format}/$", "/api/products")]
    #[case("^api/products(?P<format>\\.[a-z0-9]+)/?$", "/api/products/?")]
    #[case("/", "/")]
    fn normalizes_route_templates(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(raw), expected);
    }

    #[test]
    fn empty_path_stays_empty() {
        assert_eq!(normalize_path(""), "");
    }

    #[rstest]
    #[case("/", true)]
    #[case("/api", true)]
    #[case("/admin/movements/apply", true)]
    #[case("/static/app.css", true)]
    #[case("/media/leaflet.pdf", true)]
    #[case("/__debug__/sql", true)]
    #[case("/es/i18n/setlang", true)]
    #[case("/api/products{format}", true)]
    #[case("/api/products", false)]
    #[case("/api/v1/lots/{id}", false)]
    fn excludes_auxiliary_routes(#[case] path: &str, #[case] excluded: bool) {
        assert_eq!(is_excluded(path), excluded);
    }
}
