use std::collections::HashSet;

use blueprint_core::{
    sanitize_identifier, ArchitecturePlan, Component, Connection, DEFAULT_SUMMARY,
    UNKNOWN_PATTERN,
};
use serde_json::{Map, Value};

/// Pattern id carried by the fallback plan.
pub const FALLBACK_PATTERN: &str = "fallback_three_tier";

/// Component type given to entries that don't declare one.
const DEFAULT_COMPONENT_TYPE: &str = "other";

/// The model answered, but not with anything we can read as a plan.
#[derive(Debug, thiserror::Error)]
pub enum MalformedModelOutput {
    #[error("no JSON object found in model output")]
    NoObject,
    #[error("could not parse JSON from model output: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Turn raw model output into a plan, or the fallback plan if that fails.
/// Never fails.
pub fn validate(raw: &str) -> ArchitecturePlan {
    match parse_plan(raw) {
        Ok(plan) => plan,
        Err(e) => fallback_plan(&e.to_string()),
    }
}

/// Parse raw model output into a plan. Narrative text and code fences around
/// the JSON object are tolerated; missing keys get defaults and malformed
/// component/connection entries are coerced or dropped.
pub fn parse_plan(raw: &str) -> Result<ArchitecturePlan, MalformedModelOutput> {
    let candidates = json_candidates(raw);
    if candidates.is_empty() {
        return Err(MalformedModelOutput::NoObject);
    }

    let mut last_err = MalformedModelOutput::NoObject;
    for candidate in candidates {
        match serde_json::from_str::<Map<String, Value>>(candidate) {
            Ok(map) => return Ok(coerce_plan(&map)),
            Err(e) => last_err = MalformedModelOutput::Decode(e),
        }
    }
    Err(last_err)
}

/// Fixed three-tier plan used when model output cannot be read.
pub fn fallback_plan(reason: &str) -> ArchitecturePlan {
    ArchitecturePlan {
        summary: format!(
            "Fallback architecture used because: {reason}\n\n\
             This is a simple three-tier web application."
        ),
        pattern_id: FALLBACK_PATTERN.to_string(),
        components: vec![
            Component::new("client", "Client", "client"),
            Component::new("web", "Web Server", "web"),
            Component::new("app", "Application Server", "app"),
            Component::new("db", "Database", "database"),
        ],
        connections: vec![
            Connection::new("client", "web", "HTTP/HTTPS"),
            Connection::new("web", "app", "Internal HTTP"),
            Connection::new("app", "db", "SQL"),
        ],
    }
}

// --- Extraction ---

/// Substrings worth decoding, most specific first: the whole text, the text
/// inside a code fence, the outermost balanced object, and first `{` to last `}`.
fn json_candidates(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();

    let trimmed = raw.trim();
    push_candidate(&mut out, trimmed);

    let unfenced = strip_code_fence(trimmed);
    push_candidate(&mut out, unfenced);

    if let Some(obj) = balanced_object(unfenced) {
        push_candidate(&mut out, obj);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            push_candidate(&mut out, &trimmed[start..=end]);
        }
    }

    out
}

fn push_candidate<'a>(out: &mut Vec<&'a str>, candidate: &'a str) {
    let candidate = candidate.trim();
    if candidate.starts_with('{') && !out.contains(&candidate) {
        out.push(candidate);
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Find the first complete `{...}` object, skipping braces inside strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

// --- Schema pass ---

fn coerce_plan(map: &Map<String, Value>) -> ArchitecturePlan {
    let summary = non_empty_str(map.get("summary")).unwrap_or(DEFAULT_SUMMARY);
    let pattern_id = non_empty_str(map.get("pattern_id")).unwrap_or(UNKNOWN_PATTERN);

    let components = coerce_components(map.get("components"));
    let ids: HashSet<&str> = components.iter().map(|c| c.id.as_str()).collect();
    let connections = coerce_connections(map.get("connections"), &ids);

    ArchitecturePlan {
        summary: summary.to_string(),
        pattern_id: pattern_id.to_string(),
        components,
        connections,
    }
}

fn coerce_components(value: Option<&Value>) -> Vec<Component> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let Some(id) = scalar_text(obj.get("id")).and_then(|raw| sanitize_identifier(&raw)) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        let label = non_empty_str(obj.get("label"))
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        let component_type = non_empty_str(obj.get("type"))
            .unwrap_or(DEFAULT_COMPONENT_TYPE)
            .to_string();
        out.push(Component {
            id,
            label,
            component_type,
        });
    }
    out
}

fn coerce_connections(value: Option<&Value>, ids: &HashSet<&str>) -> Vec<Connection> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let from = scalar_text(obj.get("from")).and_then(|s| sanitize_identifier(&s))?;
            let to = scalar_text(obj.get("to")).and_then(|s| sanitize_identifier(&s))?;
            if !ids.contains(from.as_str()) || !ids.contains(to.as_str()) {
                return None;
            }
            let label = obj
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Connection { from, to, label })
        })
        .collect()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Strings and numbers both work as ids.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
