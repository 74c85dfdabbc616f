//! Template rendering for broadcast messages.
//!
//! `{placeholder}` syntax, case-insensitive lookup. Recipient variables
//! override the name-derived defaults (`first_name`, `name`); unresolved
//! placeholders are left verbatim so a malformed template never blocks a
//! send.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Render a message template against one recipient's variables and
/// display name. Pure; never fails.
pub fn render_template(
    template: &str,
    variables: Option<&serde_json::Value>,
    display_name: Option<&str>,
) -> String {
    let mut values: HashMap<String, String> = HashMap::new();

    // Name-derived defaults go in first so explicit variables override them.
    if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
        if let Some(first) = name.split_whitespace().next() {
            values.insert("first_name".to_string(), first.to_string());
        }
        values.insert("name".to_string(), name.to_string());
    }

    if let Some(serde_json::Value::Object(map)) = variables {
        for (key, value) in map {
            let rendered = match value {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            };
            if let Some(rendered) = rendered {
                values.insert(key.to_lowercase(), rendered);
            }
        }
    }

    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values
                .get(&caps[1].to_lowercase())
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
