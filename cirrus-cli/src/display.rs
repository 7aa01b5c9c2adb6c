//! Plan and state rendering

use std::collections::HashMap;
use std::fmt::Write;

use cirrus_core::effect::Effect;
use cirrus_core::plan::Plan;
use cirrus_core::resource::{State, Value};
use cirrus_core::schema::{AttributeSchema, ResourceSchema};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

const SENSITIVE: &str = "(sensitive value)";

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
    }
}

fn is_sensitive(schema: Option<&ResourceSchema>, key: &str) -> bool {
    schema
        .and_then(|s| s.attributes.get(key))
        .is_some_and(|a| a.sensitive)
}

/// Keys in display order, `name` first
fn sorted_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<&'a String> {
    let mut keys: Vec<_> = keys.filter(|k| !k.starts_with('_')).collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", _) => std::cmp::Ordering::Less,
        (_, "name") => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

fn render_attributes(out: &mut String, attributes: &HashMap<String, Value>, schema: Option<&ResourceSchema>) {
    for key in sorted_keys(attributes.keys()) {
        let value = &attributes[key];
        if value.is_empty() {
            continue;
        }
        let shown = if is_sensitive(schema, key) {
            SENSITIVE.to_string()
        } else {
            format_value(value)
        };
        if key == "name" {
            let _ = writeln!(out, "      {}: {}", key.bold(), shown.white().bold());
        } else {
            let _ = writeln!(out, "      {}: {}", key, shown.green());
        }
    }
}

/// Structured values are shown as a line diff of their pretty JSON
fn render_block_change(out: &mut String, key: &str, old: Option<&Value>, new: Option<&Value>) {
    let pretty = |v: Option<&Value>| {
        v.map(|v| serde_json::to_string_pretty(&v.to_json()).unwrap_or_default() + "\n")
            .unwrap_or_default()
    };
    let (old, new) = (pretty(old), pretty(new));

    let _ = writeln!(out, "      {}:", key);
    let diff = TextDiff::from_lines(old.as_str(), new.as_str());
    for change in diff.iter_all_changes() {
        let line = change.value().trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Delete => {
                let _ = writeln!(out, "        {} {}", "-".red(), line.red());
            }
            ChangeTag::Insert => {
                let _ = writeln!(out, "        {} {}", "+".green(), line.green());
            }
            ChangeTag::Equal => {
                let _ = writeln!(out, "          {}", line);
            }
        }
    }
}

fn render_changes(
    out: &mut String,
    from: &State,
    to: &HashMap<String, Value>,
    changed: &[String],
    schema: Option<&ResourceSchema>,
) {
    for key in sorted_keys(changed.iter()) {
        let old = from.attributes.get(key.as_str());
        let new = to.get(key.as_str());
        let force_new = schema
            .and_then(|s| s.attributes.get(key.as_str()))
            .is_some_and(|a| a.force_new);
        let forces = if force_new {
            format!(" {}", "# forces replacement".red())
        } else {
            String::new()
        };

        if is_sensitive(schema, key) {
            let _ = writeln!(out, "      {}: {}{}", key, SENSITIVE.yellow(), forces);
            continue;
        }

        let structured = |v: Option<&Value>| matches!(v, Some(Value::List(_)) | Some(Value::Map(_)));
        if structured(old) || structured(new) {
            render_block_change(out, key, old, new);
            continue;
        }

        let old = old
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        let new = new
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        let _ = writeln!(out, "      {}: {} → {}{}", key, old.red(), new.green(), forces);
    }
}

pub fn render_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) -> String {
    let mut out = String::new();
    if plan.is_empty() {
        let _ = writeln!(out, "{}", "No changes. Infrastructure is up-to-date.".green());
        return out;
    }

    let _ = writeln!(out, "{}", "Execution Plan:".cyan().bold());
    let _ = writeln!(out);

    for effect in plan.effects() {
        let id = effect.resource_id();
        let schema = schemas.get(&id.resource_type);
        let symbol = match effect {
            Effect::Create(_) => "+".green().bold(),
            Effect::Update { .. } => "~".yellow().bold(),
            Effect::Replace { .. } => "-/+".magenta().bold(),
            Effect::Delete { .. } => "-".red().bold(),
        };
        let _ = writeln!(out, "  {} {}", symbol, id.to_string().cyan().bold());

        match effect {
            Effect::Create(r) => render_attributes(&mut out, &r.attributes, schema),
            Effect::Update {
                from,
                to,
                changed_attributes,
                ..
            }
            | Effect::Replace {
                from,
                to,
                changed_attributes,
                ..
            } => render_changes(&mut out, from, &to.attributes, changed_attributes, schema),
            Effect::Delete { identifier, .. } => {
                let _ = writeln!(out, "      {}: {}", "id".bold(), identifier.red());
            }
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}", plan.summary());
    out
}

/// Recorded attributes of one resource, sensitive values masked
pub fn render_state(state: &State, schema: Option<&ResourceSchema>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", state.id.to_string().cyan().bold());
    if let Some(identifier) = &state.identifier {
        let _ = writeln!(out, "      {}: {}", "id".bold(), identifier);
    }
    let _ = writeln!(out, "      {}: {}", "schema_version".bold(), state.schema_version);
    render_attributes(&mut out, &state.attributes, schema);
    out
}

/// Attribute reference of one resource type
pub fn render_schema(schema: &ResourceSchema) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", schema.resource_type.cyan().bold());
    if let Some(description) = &schema.description {
        let _ = writeln!(out, "  {}", description);
    }
    let t = &schema.timeouts;
    let _ = writeln!(
        out,
        "  schema version {}; timeouts create {}m, read {}m, update {}m, delete {}m",
        schema.version,
        t.create.as_secs() / 60,
        t.read.as_secs() / 60,
        t.update.as_secs() / 60,
        t.delete.as_secs() / 60,
    );
    let _ = writeln!(out);

    let mut attributes: Vec<&AttributeSchema> = schema.attributes.values().collect();
    attributes.sort_by(|a, b| {
        (!a.required, a.read_only, &a.name).cmp(&(!b.required, b.read_only, &b.name))
    });
    for a in attributes {
        let mut flags = Vec::new();
        if a.required {
            flags.push("required");
        } else if a.read_only {
            flags.push("read-only");
        } else {
            flags.push("optional");
        }
        if a.computed && !a.read_only {
            flags.push("computed");
        }
        if a.force_new {
            flags.push("forces replacement");
        }
        if a.sensitive {
            flags.push("sensitive");
        }
        let _ = writeln!(out, "  {} ({}) [{}]", a.name.bold(), a.attr_type, flags.join(", "));
        if let Some(default) = &a.default {
            let _ = writeln!(out, "      default: {}", format_value(default));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::resource::{Resource, ResourceId};
    use cirrus_core::schema::AttributeType;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("netapp_backup_vault")
            .attribute(AttributeSchema::new("name", AttributeType::String).required().force_new())
            .attribute(AttributeSchema::new("password", AttributeType::String).sensitive())
            .attribute(AttributeSchema::new(
                "tags",
                AttributeType::Map(Box::new(AttributeType::String)),
            ))
    }

    fn schemas() -> HashMap<String, ResourceSchema> {
        [("netapp_backup_vault".to_string(), schema())]
            .into_iter()
            .collect()
    }

    #[test]
    fn formats_values() {
        assert_eq!(format_value(&Value::string("a")), "\"a\"");
        assert_eq!(
            format_value(&Value::List(vec![Value::Int(1), Value::Bool(true)])),
            "[1, true]"
        );
        let map: HashMap<String, Value> = [
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Int(1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(format_value(&Value::Map(map)), "{a: 1, b: 2}");
    }

    #[test]
    fn plan_masks_sensitive_values() {
        colored::control::set_override(false);
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("netapp_backup_vault", "vault")
                .with_attribute("name", Value::string("vault"))
                .with_attribute("password", Value::string("hunter2")),
        ));

        let rendered = render_plan(&plan, &schemas());
        assert!(rendered.contains("+ netapp_backup_vault.vault"));
        assert!(rendered.contains(SENSITIVE));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Plan: 1 to create, 0 to update, 0 to replace, 0 to delete"));
    }

    #[test]
    fn replace_marks_forcing_attributes() {
        colored::control::set_override(false);
        let id = ResourceId::new("netapp_backup_vault", "vault");
        let from = State::existing(
            id.clone(),
            [("name".to_string(), Value::string("old"))].into_iter().collect(),
        )
        .with_identifier("/subscriptions/x");
        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            id,
            from,
            to: Resource::new("netapp_backup_vault", "vault")
                .with_attribute("name", Value::string("new")),
            changed_attributes: vec!["name".to_string()],
        });

        let rendered = render_plan(&plan, &schemas());
        assert!(rendered.contains("name: \"old\" → \"new\" # forces replacement"));
    }

    #[test]
    fn structured_changes_render_as_line_diff() {
        colored::control::set_override(false);
        let id = ResourceId::new("netapp_backup_vault", "vault");
        let tags = |v: &str| {
            Value::Map([("env".to_string(), Value::string(v))].into_iter().collect())
        };
        let from = State::existing(id.clone(), [("tags".to_string(), tags("dev"))].into_iter().collect());
        let mut plan = Plan::new();
        plan.add(Effect::Update {
            id,
            from,
            to: Resource::new("netapp_backup_vault", "vault").with_attribute("tags", tags("prod")),
            changed_attributes: vec!["tags".to_string()],
        });

        let rendered = render_plan(&plan, &schemas());
        let changed = |sign: char, text: &str| {
            rendered
                .lines()
                .any(|l| l.trim_start().starts_with(sign) && l.contains(text))
        };
        assert!(changed('-', "\"env\": \"dev\""));
        assert!(changed('+', "\"env\": \"prod\""));
    }

    #[test]
    fn schema_lists_required_attributes_first() {
        colored::control::set_override(false);
        let rendered = render_schema(&schema());
        let name = rendered.find("name (").unwrap();
        let tags = rendered.find("tags (").unwrap();
        assert!(name < tags);
        assert!(rendered.contains("[required, forces replacement]"));
        assert!(rendered.contains("[optional, sensitive]"));
    }
}
