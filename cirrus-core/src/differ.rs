//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the "current
//! state" fetched from the Provider, and generates the required Effects (Plan).

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute changed -> needs replacement
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    let mut desired = desired.clone();
    if let Some(schema) = schema {
        schema.normalize(&mut desired.attributes);
    }

    if !current.exists {
        return Diff::Create(desired);
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id);
    }

    let replace = schema.is_some_and(|s| {
        changed
            .iter()
            .any(|name| s.attributes.get(name).is_some_and(|a| a.force_new))
    });

    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired,
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired,
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let schemas = schema.map(|s| &s.attributes);
    let keys: BTreeSet<&String> = desired.keys().chain(current.keys()).collect();

    keys.into_iter()
        // Skip internal attributes (starting with _)
        .filter(|key| !key.starts_with('_'))
        .filter(|key| !attribute_matches(key, desired.get(*key), current.get(*key), schemas))
        .cloned()
        .collect()
}

fn attribute_matches(
    key: &str,
    desired: Option<&Value>,
    current: Option<&Value>,
    schemas: Option<&HashMap<String, AttributeSchema>>,
) -> bool {
    let schema = schemas.and_then(|s| s.get(key));
    match (desired, current) {
        (None, None) => true,
        // An absent value and an empty one are the same to the remote side
        (Some(d), None) => d.is_empty(),
        // Removed from configuration: only optional, non-computed attributes change
        (None, Some(c)) => c.is_empty() || !schema.is_some_and(|a| !a.required && !a.computed),
        (Some(d), Some(c)) => values_match(d, c, schema.map(|a| &a.attr_type)),
    }
}

/// Compare values, descending into blocks so computed nested values are ignored
fn values_match(desired: &Value, current: &Value, attr_type: Option<&AttributeType>) -> bool {
    if desired.is_empty() && current.is_empty() {
        return true;
    }
    match (attr_type, desired, current) {
        (Some(AttributeType::Block(block)), Value::List(ds), Value::List(cs)) => {
            ds.len() == cs.len()
                && ds.iter().zip(cs).all(|(d, c)| match (d, c) {
                    (Value::Map(dm), Value::Map(cm)) => dm
                        .keys()
                        .chain(cm.keys())
                        .all(|k| attribute_matches(k, dm.get(k), cm.get(k), Some(&block.attributes))),
                    _ => d == c,
                })
        }
        _ => desired == current,
    }
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Resources tracked in `current_states` but no longer declared are deleted.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));
        let schema = schemas.get(&resource.id.resource_type);

        match diff(resource, &current, schema) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    let declared: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !declared.contains(&s.id))
        .collect();
    orphans.sort_by_key(|s| s.id.to_string());

    for state in orphans {
        if let Some(identifier) = &state.identifier {
            plan.add(Effect::Delete {
                id: state.id.clone(),
                identifier: identifier.clone(),
            });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BlockSchema;

    fn record_schema() -> ResourceSchema {
        ResourceSchema::new("private_dns_a_record")
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("ttl", AttributeType::Int).required())
            .attribute(AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String))))
            .attribute(AttributeSchema::new("fqdn", AttributeType::String).read_only())
    }

    fn current(attrs: Vec<(&str, Value)>) -> State {
        State::existing(
            ResourceId::new("private_dns_a_record", "www"),
            attrs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )
        .with_identifier("/subscriptions/x/id")
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("private_dns_a_record", "www");
        let current = State::not_found(ResourceId::new("private_dns_a_record", "www"));

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_ignores_computed() {
        let desired = Resource::new("private_dns_a_record", "www")
            .with_attribute("name", Value::string("www"))
            .with_attribute("ttl", Value::Int(300));
        let current = current(vec![
            ("name", Value::string("www")),
            ("ttl", Value::Int(300)),
            ("fqdn", Value::string("www.example.internal.")),
        ]);

        let result = diff(&desired, &current, Some(&record_schema()));
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("private_dns_a_record", "www")
            .with_attribute("name", Value::string("www"))
            .with_attribute("ttl", Value::Int(60));
        let current = current(vec![("name", Value::string("www")), ("ttl", Value::Int(300))]);

        match diff(&desired, &current, Some(&record_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["ttl".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_detects_removed_optional_attribute() {
        let desired = Resource::new("private_dns_a_record", "www")
            .with_attribute("name", Value::string("www"))
            .with_attribute("ttl", Value::Int(300));
        let mut tags = HashMap::new();
        tags.insert("env".to_string(), Value::string("dev"));
        let current = current(vec![
            ("name", Value::string("www")),
            ("ttl", Value::Int(300)),
            ("tags", Value::Map(tags)),
        ]);

        match diff(&desired, &current, Some(&record_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["tags".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_on_force_new() {
        let desired = Resource::new("private_dns_a_record", "www")
            .with_attribute("name", Value::string("api"))
            .with_attribute("ttl", Value::Int(300));
        let current = current(vec![("name", Value::string("www")), ("ttl", Value::Int(300))]);

        let result = diff(&desired, &current, Some(&record_schema()));
        assert!(matches!(result, Diff::Replace { .. }));
    }

    #[test]
    fn diff_ignores_computed_values_inside_blocks() {
        let identity = BlockSchema::new()
            .attribute(AttributeSchema::new("type", AttributeType::String).required())
            .attribute(AttributeSchema::new("principal_id", AttributeType::String).read_only());
        let schema = record_schema().attribute(AttributeSchema::new("identity", identity.into_type()));

        let block = |pairs: Vec<(&str, &str)>| {
            Value::block(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), Value::string(v)))
                    .collect(),
            )
        };

        let desired = Resource::new("private_dns_a_record", "www")
            .with_attribute("name", Value::string("www"))
            .with_attribute("ttl", Value::Int(300))
            .with_attribute("identity", block(vec![("type", "SystemAssigned")]));
        let state = current(vec![
            ("name", Value::string("www")),
            ("ttl", Value::Int(300)),
            (
                "identity",
                block(vec![("type", "SystemAssigned"), ("principal_id", "abc")]),
            ),
        ]);
        assert!(matches!(diff(&desired, &state, Some(&schema)), Diff::NoChange(_)));

        let desired = desired.with_attribute("identity", block(vec![("type", "UserAssigned")]));
        match diff(&desired, &state, Some(&schema)) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["identity".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            Resource::new("private_dns_a_record", "new"),
            Resource::new("private_dns_a_record", "www").with_attribute("ttl", Value::Int(60)),
        ];

        let mut current_states = HashMap::new();
        current_states.insert(
            ResourceId::new("private_dns_a_record", "www"),
            current(vec![("ttl", Value::Int(300))]),
        );
        let gone = ResourceId::new("private_dns_a_record", "gone");
        current_states.insert(
            gone.clone(),
            State::existing(gone.clone(), HashMap::new()).with_identifier("/subscriptions/x/gone"),
        );

        let plan = create_plan(&resources, &current_states, &HashMap::new());

        assert_eq!(plan.effects().len(), 3);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
        assert!(matches!(plan.effects()[2], Effect::Delete { .. }));
    }
}
