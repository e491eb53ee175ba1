//! Typed document model for an onboarding request.
//!
//! Produced by the mapper, consumed by the printer and by external
//! collaborators (storage, generators). Two modelling rules hold
//! throughout:
//!
//! - `Step` and `Value` are closed sum types, so "exactly one variant
//!   populated" is a compile-time invariant.
//! - Map-like fields embedded as association lists in the text (`attrs`,
//!   `config`, `args`, policy `kv`, catalog maps) are `BTreeMap`s: sorted
//!   iteration gives the canonical printer deterministic output, and makes
//!   documents that differ only in insertion order structurally equal.
//!   Declaration-ordered collections (entities, resources, flows, states,
//!   steps, ...) are `Vec`s.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Root of a parsed onboarding request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub meta: Meta,
    pub orchestrator: Orchestrator,
    pub catalog: Option<Catalog>,
}

/// Document identity and version metadata.
///
/// Invariant (mapper-enforced): `updated_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub request_id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the request orchestrates: lifecycle, declared entities,
/// resources, flows, and policies, in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Orchestrator {
    pub lifecycle: Lifecycle,
    pub entities: Vec<Entity>,
    pub resources: Vec<Resource>,
    pub flows: Vec<Flow>,
    pub policies: Vec<Policy>,
}

impl Orchestrator {
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == id)
    }
}

/// Lifecycle state machine description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Declaration order is significant; non-empty whenever a `:lifecycle`
    /// section is present.
    pub states: Vec<String>,
    /// If non-empty, must be a member of `states`.
    pub initial: String,
    pub transitions: Vec<Transition>,
}

impl Lifecycle {
    /// States the printer falls back to when a document declares none.
    pub const DEFAULT_STATES: [&'static str; 6] = [
        "draft",
        "validated",
        "compiled",
        "executing",
        "completed",
        "failed",
    ];

    pub const DEFAULT_INITIAL: &'static str = "draft";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub guard: Option<Expr>,
    pub effects: Vec<ActionCall>,
}

/// Guard expression: `(when kind ["path"])`. Deliberately minimal; the
/// core does not evaluate guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: String,
    pub path: Option<String>,
}

/// Effect invocation inside a transition's `(do ...)` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub name: String,
    pub args: BTreeMap<String, Value>,
}

/// A declared party (person, company, fund, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique within a document.
    pub id: String,
    pub typ: String,
    pub attrs: BTreeMap<String, AttrVal>,
}

/// Attribute value plus optional sourcing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrVal {
    pub value: Value,
    pub provenance: Option<String>,
    pub needed_by: Vec<String>,
}

impl AttrVal {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            provenance: None,
            needed_by: Vec::new(),
        }
    }
}

/// A provisioned thing (account, mandate, connectivity, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique within a document.
    pub id: String,
    pub typ: String,
    pub requires: Vec<RequireItem>,
    pub config: BTreeMap<String, Value>,
}

/// Dependency of a resource: `(entity "e1")`, `(attr "e1.lei")`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequireItem {
    pub kind: String,
    pub id: String,
}

/// A named sequence of workflow steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Unique within a document.
    pub id: String,
    pub doc: Option<String>,
    pub steps: Vec<Step>,
}

/// One workflow step. Exactly one variant, by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Task(Task),
    Gate(Gate),
    Fork(Fork),
    Join(Join),
}

impl Step {
    pub fn id(&self) -> &str {
        match self {
            Step::Task(t) => &t.id,
            Step::Gate(g) => &g.id,
            Step::Fork(f) => &f.id,
            Step::Join(j) => &j.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Target entity or resource id.
    pub on: String,
    pub op: String,
    pub args: BTreeMap<String, Value>,
    pub needs: Vec<String>,
    pub produces: Vec<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: String,
    /// Free-form boolean-expression text; not parsed by the core.
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fork {
    pub id: String,
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub id: String,
    pub after: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub kv: BTreeMap<String, Value>,
}

/// Optional dictionary of attribute and action definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub attributes: BTreeMap<String, AttrDef>,
    pub actions: BTreeMap<String, ActionDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrDef {
    pub typ: String,
    pub enum_values: Option<Vec<String>>,
    pub format: Option<String>,
    pub pii: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionDef {
    pub params: Vec<ParamDef>,
    pub needs: Vec<String>,
    pub produces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub typ: String,
    pub required: bool,
    pub enum_values: Option<Vec<String>>,
}

/// Terminal value. Closed sum; numeric-looking text classifies as `Int`
/// first, then `Float`, else stays a `Symbol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(u64),
    Float(Decimal),
    Bool(bool),
    Symbol(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<Decimal> {
        match self {
            Value::Float(d) => Some(*d),
            Value::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_extractors() {
        assert_eq!(Value::string("x").as_str(), Some("x"));
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Int(42).as_float(), Some(Decimal::from(42)));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::symbol("draft").as_symbol(), Some("draft"));
        assert_eq!(Value::Bool(true).as_int(), None);
    }

    #[test]
    fn test_orchestrator_finders() {
        let mut orch = Orchestrator::default();
        orch.entities.push(Entity {
            id: "e1".to_string(),
            typ: "LegalEntity".to_string(),
            attrs: BTreeMap::new(),
        });
        assert!(orch.entity("e1").is_some());
        assert!(orch.entity("e2").is_none());
        assert!(orch.resource("e1").is_none());
    }

    #[test]
    fn test_step_id_covers_all_variants() {
        let steps = [
            Step::Task(Task {
                id: "t".to_string(),
                on: String::new(),
                op: String::new(),
                args: BTreeMap::new(),
                needs: vec![],
                produces: vec![],
                labels: vec![],
            }),
            Step::Gate(Gate {
                id: "g".to_string(),
                condition: String::new(),
            }),
            Step::Fork(Fork {
                id: "f".to_string(),
                branches: vec![],
            }),
            Step::Join(Join {
                id: "j".to_string(),
                after: vec![],
            }),
        ];
        let ids: Vec<&str> = steps.iter().map(Step::id).collect();
        assert_eq!(ids, vec!["t", "g", "f", "j"]);
    }

    #[test]
    fn test_default_lifecycle_constants() {
        assert_eq!(Lifecycle::DEFAULT_STATES.len(), 6);
        assert!(Lifecycle::DEFAULT_STATES.contains(&Lifecycle::DEFAULT_INITIAL));
    }
}
