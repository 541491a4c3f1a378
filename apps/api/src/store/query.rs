//! Resume search filters, evaluated in process or compiled to SQL/JSON paths.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum MatchOp {
    /// Exact JSON equality.
    Equals(Value),
    /// Case-insensitive substring match on string values.
    Contains(String),
    /// The field is an array holding this element.
    Has(Value),
}

/// One condition on a dotted path such as `experience.company`.
/// Arrays met along the path are descended into element by element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub path: String,
    #[serde(flatten)]
    pub op: MatchOp,
}

/// Conjunction of filters. No filters matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeQuery {
    #[serde(default)]
    pub filters: Vec<FieldFilter>,
}

impl ResumeQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, path: &str, op: MatchOp) -> Self {
        self.filters.push(FieldFilter {
            path: path.to_string(),
            op,
        });
        self
    }

    /// Search-form semantics: `skills` is an array membership test, any other
    /// field (including dotted paths) is a case-insensitive substring match.
    pub fn for_field(field: &str, value: &str) -> Self {
        let op = if field == "skills" {
            MatchOp::Has(Value::String(value.to_string()))
        } else {
            MatchOp::Contains(value.to_string())
        };
        Self::all().filter(field, op)
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(document))
    }
}

impl FieldFilter {
    pub fn matches(&self, document: &Value) -> bool {
        let mut targets = Vec::new();
        collect_path(document, &segments(&self.path), &mut targets);

        match &self.op {
            MatchOp::Equals(expected) => targets
                .iter()
                .flat_map(|t| unwrap_array(t))
                .any(|v| v == expected),
            MatchOp::Contains(needle) => {
                let needle = needle.to_lowercase();
                targets
                    .iter()
                    .flat_map(|t| unwrap_array(t))
                    .filter_map(Value::as_str)
                    .any(|s| s.to_lowercase().contains(&needle))
            }
            MatchOp::Has(expected) => targets
                .iter()
                .filter_map(|t| t.as_array())
                .any(|items| items.contains(expected)),
        }
    }

    /// SQL/JSON path (lax mode) and its `vars` object for `jsonb_path_exists`.
    pub fn to_jsonpath(&self) -> (String, Value) {
        let mut path = String::from("$");
        for segment in segments(&self.path) {
            path.push('.');
            path.push_str(&quote_jsonpath_string(segment));
        }

        match &self.op {
            MatchOp::Equals(value) => (format!("{path} ? (@ == $v)"), json!({ "v": value })),
            MatchOp::Has(value) => (format!("{path}[*] ? (@ == $v)"), json!({ "v": value })),
            MatchOp::Contains(needle) => {
                // like_regex only takes a literal pattern, so the needle is escaped inline.
                let pattern = quote_jsonpath_string(&escape_regex(needle));
                (
                    format!("{path} ? (@ like_regex {pattern} flag \"i\")"),
                    json!({}),
                )
            }
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn collect_path<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(*head) {
                collect_path(child, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_path(item, segments, out);
            }
        }
        _ => {}
    }
}

fn unwrap_array(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn escape_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ".^$|?*+()[]{}\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quote_jsonpath_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        json!({
            "name": "Jane Doe",
            "email": "jane@example.com",
            "skills": ["Go", "SQL"],
            "experience": [
                {"title": "Engineer", "company": "Acme Corp"},
                {"title": "Intern", "company": "Globex"}
            ],
            "education": [{"institution": "MIT"}]
        })
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(ResumeQuery::all().matches(&doc()));
        assert!(ResumeQuery::all().matches(&json!({})));
    }

    #[test]
    fn test_contains_is_case_insensitive_substring() {
        assert!(ResumeQuery::for_field("name", "jane d").matches(&doc()));
        assert!(!ResumeQuery::for_field("name", "john").matches(&doc()));
    }

    #[test]
    fn test_has_matches_array_membership_only() {
        assert!(ResumeQuery::for_field("skills", "Go").matches(&doc()));
        assert!(!ResumeQuery::for_field("skills", "Python").matches(&doc()));
        assert!(!ResumeQuery::for_field("skills", "go").matches(&doc()));
        // a scalar field is never an array member
        let q = ResumeQuery::all().filter("name", MatchOp::Has(json!("Jane Doe")));
        assert!(!q.matches(&doc()));
    }

    #[test]
    fn test_dotted_path_descends_into_arrays() {
        assert!(ResumeQuery::for_field("experience.company", "globex").matches(&doc()));
        assert!(ResumeQuery::for_field("education.institution", "mit").matches(&doc()));
        assert!(!ResumeQuery::for_field("experience.company", "initech").matches(&doc()));
    }

    #[test]
    fn test_equals_is_exact() {
        let q = ResumeQuery::all().filter("email", MatchOp::Equals(json!("jane@example.com")));
        assert!(q.matches(&doc()));
        let q = ResumeQuery::all().filter("email", MatchOp::Equals(json!("JANE@example.com")));
        assert!(!q.matches(&doc()));
    }

    #[test]
    fn test_missing_path_never_matches() {
        assert!(!ResumeQuery::for_field("location", "berlin").matches(&doc()));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let q = ResumeQuery::for_field("skills", "Go").filter("name", MatchOp::Contains("john".into()));
        assert!(!q.matches(&doc()));
    }

    #[test]
    fn test_query_deserializes_from_request_body() {
        let q: ResumeQuery = serde_json::from_value(json!({
            "filters": [
                {"path": "skills", "op": "has", "value": "Go"},
                {"path": "experience.company", "op": "contains", "value": "acme"}
            ]
        }))
        .unwrap();
        assert_eq!(q.filters[0].op, MatchOp::Has(json!("Go")));
        assert!(q.matches(&doc()));
    }

    #[test]
    fn test_jsonpath_for_each_operator() {
        let (path, vars) = FieldFilter {
            path: "skills".into(),
            op: MatchOp::Has(json!("Go")),
        }
        .to_jsonpath();
        assert_eq!(path, r#"$."skills"[*] ? (@ == $v)"#);
        assert_eq!(vars, json!({"v": "Go"}));

        let (path, _) = FieldFilter {
            path: "experience.company".into(),
            op: MatchOp::Contains("a.b \"c\"".into()),
        }
        .to_jsonpath();
        assert_eq!(
            path,
            r#"$."experience"."company" ? (@ like_regex "a\\.b \"c\"" flag "i")"#
        );
    }
}
