//! Template interpolation for locators and query parameters
//!
//! Handles `{{ variable }}` interpolation in origin locators and request
//! parameters. A work unit exposes `source`, `source_id`, `partition` and
//! `partition_key`; job-level variables are reachable as `{{ vars.name }}`
//! or, when no unit variable shadows them, as `{{ name }}`.

use crate::error::{Error, Result};
use crate::planner::WorkUnit;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}").unwrap()
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Variables of the current work unit
    pub unit: Value,
    /// Job-level variables
    pub vars: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the context for one work unit
    pub fn for_unit(unit: &WorkUnit) -> Self {
        Self {
            unit: json!({
                "source": unit.source_id,
                "source_id": unit.source_id,
                "partition": unit.partition_key,
                "partition_key": unit.partition_key,
            }),
            vars: Value::Null,
        }
    }

    /// Set job-level variables
    #[must_use]
    pub fn with_vars(mut self, vars: Value) -> Self {
        self.vars = vars;
        self
    }

    /// Get a value by path (e.g., "vars.api_key")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.first() {
            Some(&"vars") if parts.len() > 1 => get_nested_value(&self.vars, &parts[1..]),
            Some(_) => get_nested_value(&self.unit, &parts)
                .or_else(|| get_nested_value(&self.vars, &parts)),
            None => None,
        }
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let var_path = &cap[1];
        match ctx.get(var_path) {
            Some(value) => value_to_string(value),
            None => {
                missing.push(var_path.to_string());
                cap[0].to_string()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::template(format!(
            "undefined variable(s): {}",
            missing.join(", ")
        )))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> WorkUnit {
        WorkUnit::new("boston-marathon", "2024", "https://api.example.com")
    }

    #[test]
    fn test_unit_substitution() {
        let ctx = TemplateContext::for_unit(&unit());

        let result = render(
            "https://api.example.com/results/{{ source }}/?year={{ partition }}",
            &ctx,
        )
        .unwrap();
        assert_eq!(
            result,
            "https://api.example.com/results/boston-marathon/?year=2024"
        );
    }

    #[test]
    fn test_long_names_are_aliases() {
        let ctx = TemplateContext::for_unit(&unit());
        assert_eq!(
            render("{{ source_id }}/{{ partition_key }}", &ctx).unwrap(),
            "boston-marathon/2024"
        );
    }

    #[test]
    fn test_vars_lookup() {
        let ctx = TemplateContext::for_unit(&unit()).with_vars(json!({
            "event": {"subevent": "all"},
            "limit": 100
        }));

        assert_eq!(render("{{ vars.event.subevent }}", &ctx).unwrap(), "all");
        assert_eq!(render("{{ limit }}", &ctx).unwrap(), "100");
    }

    #[test]
    fn test_unit_variables_shadow_vars() {
        let ctx = TemplateContext::for_unit(&unit()).with_vars(json!({"source": "other"}));

        assert_eq!(render("{{ source }}", &ctx).unwrap(), "boston-marathon");
        assert_eq!(render("{{ vars.source }}", &ctx).unwrap(), "other");
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = TemplateContext::for_unit(&unit());
        let result = render("{{ vars.missing }}/{{ nope }}", &ctx);

        let message = result.unwrap_err().to_string();
        assert!(message.contains("vars.missing"));
        assert!(message.contains("nope"));
    }

    #[test]
    fn test_no_templates() {
        let ctx = TemplateContext::new();
        let result = render("plain string without templates", &ctx).unwrap();
        assert_eq!(result, "plain string without templates");
    }

    #[test]
    fn test_whitespace_in_template() {
        let ctx = TemplateContext::for_unit(&unit());

        assert_eq!(render("{{source}}", &ctx).unwrap(), "boston-marathon");
        assert_eq!(render("{{  source  }}", &ctx).unwrap(), "boston-marathon");
    }

    #[test]
    fn test_has_templates() {
        assert!(has_templates("{{ source }}"));
        assert!(has_templates("prefix {{ vars.x }} suffix"));
        assert!(!has_templates("no templates here"));
        assert!(!has_templates("{ not a template }"));
    }

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables("{{ source }} and {{ vars.b }}");
        assert_eq!(vars, vec!["source", "vars.b"]);
    }
}
