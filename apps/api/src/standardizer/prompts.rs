// Standardizer prompt template.

pub const STANDARDIZE_PROMPT: &str = r#"Convert the following resume into a single JSON object.

RESUME TEXT:
{content}

LINKS FOUND IN THE DOCUMENT:
{links}

OUTPUT SCHEMA (return exactly this structure; use null or [] when a value is unknown):
{
  "name": "string",
  "email": "string",
  "phone": "string",
  "location": "string",
  "skills": ["string"],
  "experience": [
    {"title": "string", "company": "string", "duration": "string", "description": "string"}
  ],
  "education": [
    {"institution": "string", "degree": "string", "year": "string"}
  ],
  "links": {"linkedin": "string", "github": "string", "portfolio": "string", "other": ["string"]}
}

RULES:
1. Copy facts from the resume text only. Do NOT invent employers, dates, or skills.
2. Use the links list to fill "links"; do not fabricate URLs.
3. "skills" is a flat list of distinct skill names.
4. "experience" is ordered most recent first.
5. Return ONLY the JSON object: no prose, no code fences."#;

/// Renders the standardize prompt. Same inputs always produce the same prompt.
pub fn build_standardize_prompt(content: &str, links: &[String]) -> String {
    let links = if links.is_empty() {
        "(none)".to_string()
    } else {
        links
            .iter()
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    render(
        STANDARDIZE_PROMPT,
        &[("{content}", content), ("{links}", links.as_str())],
    )
}

/// Substitutes placeholders in one left-to-right pass over the template.
/// Inserted values are never scanned again.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match vars.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
