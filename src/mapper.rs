//! Semantic mapper: generic tree to typed document.
//!
//! Dispatch is permissive about *unknown* sections (they are skipped, so
//! newer documents keep parsing) and strict about the shape of *known*
//! ones: required keyword fields, timestamps, version numbers, duplicate
//! ids, and lifecycle invariants are all hard errors. The mapper never
//! mutates the tree it walks; every call builds a fresh document.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::ast::{
    ActionCall, ActionDef, AttrDef, AttrVal, Catalog, Entity, Expr, Flow, Fork, Gate, Join,
    Lifecycle, Meta, Orchestrator, ParamDef, Policy, Request, Resource, RequireItem, Step, Task,
    Transition, Value,
};
use crate::error::MappingError;
use crate::sexpr::{Atom, Sexpr};

/// Map a generic parse tree to a typed [`Request`].
///
/// The root must be a list headed by the symbol `onboarding-request`.
pub fn map(root: &Sexpr) -> Result<Request, MappingError> {
    let elements = root.elements().ok_or(MappingError::NotARequest)?;
    if elements.first().and_then(Sexpr::sym) != Some("onboarding-request") {
        return Err(MappingError::NotARequest);
    }

    let mut meta = None;
    let mut orchestrator = Orchestrator::default();
    let mut catalog = None;

    for section in &elements[1..] {
        let Some(items) = section.elements() else {
            continue;
        };
        let Some(head) = items.first().and_then(Sexpr::sym) else {
            continue;
        };
        match head {
            ":meta" => meta = Some(map_meta(&items[1..])?),
            ":orchestrator" => orchestrator = map_orchestrator(&items[1..])?,
            ":catalog" => catalog = Some(map_catalog(&items[1..])?),
            other => debug!(section = other, "ignoring unknown top-level section"),
        }
    }

    Ok(Request {
        meta: match meta {
            Some(m) => m,
            None => default_meta(),
        },
        orchestrator,
        catalog,
    })
}

/// "Now" at whole-second precision, so defaulted timestamps survive a
/// print/parse cycle unchanged.
fn now_secs() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

fn default_meta() -> Meta {
    let now = now_secs();
    Meta {
        request_id: String::new(),
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

fn map_meta(clauses: &[Sexpr]) -> Result<Meta, MappingError> {
    let mut request_id = String::new();
    let mut version = 0u64;
    let mut created_at = None;
    let mut updated_at = None;

    for clause in clauses {
        let Some(items) = clause.elements() else {
            continue;
        };
        let (Some(key), Some(value)) = (items.first().and_then(Sexpr::sym), items.get(1)) else {
            continue;
        };
        match key {
            "request-id" => request_id = atom_string(value),
            "version" => {
                let text = atom_string(value);
                version = text
                    .parse()
                    .map_err(|_| MappingError::InvalidVersion { text })?;
            }
            "created-at" => created_at = Some(parse_timestamp("created-at", value)?),
            "updated-at" => updated_at = Some(parse_timestamp("updated-at", value)?),
            _ => {}
        }
    }

    let created_at = created_at.unwrap_or_else(now_secs);
    let updated_at = updated_at.unwrap_or(created_at);
    if updated_at < created_at {
        return Err(MappingError::TimestampOrder {
            created: created_at.to_rfc3339(),
            updated: updated_at.to_rfc3339(),
        });
    }
    Ok(Meta {
        request_id,
        version,
        created_at,
        updated_at,
    })
}

fn parse_timestamp(field: &'static str, node: &Sexpr) -> Result<DateTime<Utc>, MappingError> {
    let text = atom_string(node);
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| MappingError::InvalidTimestamp { field, text })
}

fn map_orchestrator(sections: &[Sexpr]) -> Result<Orchestrator, MappingError> {
    let mut orch = Orchestrator::default();
    for section in sections {
        let Some(items) = section.elements() else {
            continue;
        };
        let Some(head) = items.first().and_then(Sexpr::sym) else {
            continue;
        };
        let rest = &items[1..];
        match head {
            ":lifecycle" => orch.lifecycle = map_lifecycle(rest)?,
            ":entities" => orch.entities = map_entities(rest)?,
            ":resources" => orch.resources = map_resources(rest)?,
            ":flows" => orch.flows = map_flows(rest)?,
            ":policies" => orch.policies = map_policies(rest)?,
            // Recognized by the grammar; no document type yet.
            ":product-service-mappings" => {
                debug!("skipping :product-service-mappings section")
            }
            other => debug!(section = other, "ignoring unknown orchestrator section"),
        }
    }
    Ok(orch)
}

fn map_lifecycle(clauses: &[Sexpr]) -> Result<Lifecycle, MappingError> {
    let mut lc = Lifecycle::default();
    for clause in clauses {
        let Some(items) = clause.elements() else {
            continue;
        };
        match items.first().and_then(Sexpr::sym) {
            Some("states") => {
                for s in &items[1..] {
                    if let Some(text) = s.atom_text() {
                        lc.states.push(text.to_string());
                    }
                }
            }
            Some("initial") => {
                if let Some(text) = items.get(1).and_then(Sexpr::atom_text) {
                    lc.initial = text.to_string();
                }
            }
            Some("transitions") => {
                for t in &items[1..] {
                    if let Some(tr) = map_transition(t)? {
                        lc.transitions.push(tr);
                    }
                }
            }
            _ => {}
        }
    }
    if lc.states.is_empty() {
        return Err(MappingError::EmptyStates);
    }
    if !lc.initial.is_empty() && !lc.states.iter().any(|s| *s == lc.initial) {
        return Err(MappingError::UnknownInitial {
            initial: lc.initial.clone(),
        });
    }
    Ok(lc)
}

fn map_transition(node: &Sexpr) -> Result<Option<Transition>, MappingError> {
    let Some(items) = node.elements() else {
        return Ok(None);
    };
    if items.first().and_then(Sexpr::sym) != Some("->") {
        return Ok(None);
    }
    let from = items
        .get(1)
        .and_then(Sexpr::atom_text)
        .ok_or(MappingError::MissingField {
            context: "transition",
            field: "from",
        })?
        .to_string();
    let to = items
        .get(2)
        .and_then(Sexpr::atom_text)
        .ok_or(MappingError::MissingField {
            context: "transition",
            field: "to",
        })?
        .to_string();

    let mut guard = None;
    let mut effects = Vec::new();
    for extra in items.iter().skip(3) {
        let Some(parts) = extra.elements() else {
            continue;
        };
        match parts.first().and_then(Sexpr::sym) {
            Some("when") => {
                let kind = parts
                    .get(1)
                    .and_then(Sexpr::atom_text)
                    .unwrap_or_default()
                    .to_string();
                let path = parts.get(2).and_then(Sexpr::atom_text).map(str::to_string);
                guard = Some(Expr { kind, path });
            }
            Some("do") => {
                for call in &parts[1..] {
                    if let Some(ac) = map_action_call(call) {
                        effects.push(ac);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(Some(Transition {
        from,
        to,
        guard,
        effects,
    }))
}

fn map_action_call(node: &Sexpr) -> Option<ActionCall> {
    let items = node.elements()?;
    let name = items.first()?.sym()?.to_string();
    let mut args = BTreeMap::new();
    for kv in &items[1..] {
        if let Some((k, v)) = kv_pair(kv) {
            args.insert(k, v);
        }
    }
    Some(ActionCall { name, args })
}

fn map_entities(items: &[Sexpr]) -> Result<Vec<Entity>, MappingError> {
    let mut entities: Vec<Entity> = Vec::new();
    for el in items {
        let Some(parts) = el.elements() else {
            continue;
        };
        if parts.first().and_then(Sexpr::sym) != Some("entity") {
            continue;
        }
        let kmap = keyword_map(&parts[1..]);
        let id = required(&kmap, "entity", ":id")?.to_string();
        let typ = required(&kmap, "entity", ":type")?.to_string();

        let mut attrs = BTreeMap::new();
        for sub in &parts[1..] {
            if let Some(sub_parts) = sub.elements() {
                if sub_parts.first().and_then(Sexpr::sym) == Some("attrs") {
                    attrs = map_attrs(&sub_parts[1..]);
                    break;
                }
            }
        }

        if entities.iter().any(|e| e.id == id) {
            return Err(MappingError::DuplicateId { kind: "entity", id });
        }
        entities.push(Entity { id, typ, attrs });
    }
    Ok(entities)
}

fn map_attrs(items: &[Sexpr]) -> BTreeMap<String, AttrVal> {
    let mut attrs = BTreeMap::new();
    for el in items {
        let Some(parts) = el.elements() else {
            continue;
        };
        if parts.len() < 2 {
            continue;
        }
        let Some(key) = parts[0].atom_text() else {
            continue;
        };
        let Some(value) = atom_value(&parts[1]) else {
            continue;
        };
        let kmap = keyword_map(&parts[2..]);
        let provenance = kmap
            .get(":provenance")
            .and_then(|n| n.atom_text())
            .map(str::to_string);
        let needed_by = kmap
            .get(":needed-by")
            .and_then(|n| n.elements())
            .map(string_list)
            .unwrap_or_default();
        attrs.insert(
            key.to_string(),
            AttrVal {
                value,
                provenance,
                needed_by,
            },
        );
    }
    attrs
}

fn map_resources(items: &[Sexpr]) -> Result<Vec<Resource>, MappingError> {
    let mut resources: Vec<Resource> = Vec::new();
    for el in items {
        let Some(parts) = el.elements() else {
            continue;
        };
        if parts.first().and_then(Sexpr::sym) != Some("resource") {
            continue;
        }
        let kmap = keyword_map(&parts[1..]);
        let id = required(&kmap, "resource", ":id")?.to_string();
        let typ = required(&kmap, "resource", ":type")?.to_string();

        let mut requires = Vec::new();
        let mut config = BTreeMap::new();
        for sub in &parts[1..] {
            let Some(sub_parts) = sub.elements() else {
                continue;
            };
            match sub_parts.first().and_then(Sexpr::sym) {
                Some("requires") => requires = map_requires(&sub_parts[1..]),
                Some("config") => config = map_kv_pairs(&sub_parts[1..]),
                _ => {}
            }
        }

        if resources.iter().any(|r| r.id == id) {
            return Err(MappingError::DuplicateId {
                kind: "resource",
                id,
            });
        }
        resources.push(Resource {
            id,
            typ,
            requires,
            config,
        });
    }
    Ok(resources)
}

fn map_requires(items: &[Sexpr]) -> Vec<RequireItem> {
    items
        .iter()
        .filter_map(|el| {
            let parts = el.elements()?;
            if parts.len() != 2 {
                return None;
            }
            Some(RequireItem {
                kind: parts[0].atom_text()?.to_string(),
                id: parts[1].atom_text()?.to_string(),
            })
        })
        .collect()
}

fn map_flows(items: &[Sexpr]) -> Result<Vec<Flow>, MappingError> {
    let mut flows: Vec<Flow> = Vec::new();
    for el in items {
        let Some(parts) = el.elements() else {
            continue;
        };
        if parts.first().and_then(Sexpr::sym) != Some("flow") {
            continue;
        }
        let kmap = keyword_map(&parts[1..]);
        let id = required(&kmap, "flow", ":id")?.to_string();

        // The doc string is the lone string atom that is not a keyword's
        // value; everything else after the head is keyword pairs and the
        // (steps ...) clause.
        let mut doc = None;
        let mut steps = Vec::new();
        let mut i = 1;
        while i < parts.len() {
            if parts[i].sym().is_some_and(|s| s.starts_with(':')) && i + 1 < parts.len() {
                i += 2;
                continue;
            }
            match &parts[i] {
                Sexpr::Atom {
                    atom: Atom::Str(s), ..
                } => doc = Some(s.clone()),
                node => {
                    if let Some(sub) = node.elements() {
                        if sub.first().and_then(Sexpr::sym) == Some("steps") {
                            steps = map_steps(&sub[1..])?;
                        }
                    }
                }
            }
            i += 1;
        }

        if flows.iter().any(|f| f.id == id) {
            return Err(MappingError::DuplicateId { kind: "flow", id });
        }
        flows.push(Flow { id, doc, steps });
    }
    Ok(flows)
}

fn map_steps(items: &[Sexpr]) -> Result<Vec<Step>, MappingError> {
    let mut steps = Vec::new();
    for el in items {
        let Some(parts) = el.elements() else {
            continue;
        };
        match parts.first().and_then(Sexpr::sym) {
            Some("task") => steps.push(Step::Task(map_task(parts)?)),
            Some("gate") => steps.push(Step::Gate(map_gate(parts)?)),
            Some("fork") => steps.push(Step::Fork(map_fork(parts)?)),
            Some("join") => steps.push(Step::Join(map_join(parts)?)),
            _ => {}
        }
    }
    Ok(steps)
}

fn map_task(parts: &[Sexpr]) -> Result<Task, MappingError> {
    let kmap = keyword_map(&parts[1..]);
    let mut task = Task {
        id: required(&kmap, "task", ":id")?.to_string(),
        on: required(&kmap, "task", ":on")?.to_string(),
        op: required(&kmap, "task", ":op")?.to_string(),
        args: BTreeMap::new(),
        needs: Vec::new(),
        produces: Vec::new(),
        labels: Vec::new(),
    };
    for sub in &parts[1..] {
        let Some(sub_parts) = sub.elements() else {
            continue;
        };
        if sub_parts.is_empty() {
            continue;
        }
        let rest = &sub_parts[1..];
        match sub_parts[0].sym() {
            Some("args") => task.args = map_kv_pairs(rest),
            Some("needs") => task.needs = string_list(rest),
            Some("produces") => task.produces = string_list(rest),
            Some("labels") => task.labels = string_list(rest),
            _ => {}
        }
    }
    Ok(task)
}

fn map_gate(parts: &[Sexpr]) -> Result<Gate, MappingError> {
    let kmap = keyword_map(&parts[1..]);
    let id = required(&kmap, "gate", ":id")?.to_string();
    let mut condition = String::new();
    for sub in &parts[1..] {
        let Some(sub_parts) = sub.elements() else {
            continue;
        };
        if sub_parts.first().and_then(Sexpr::sym) == Some("when") {
            condition = sub_parts
                .get(1)
                .and_then(Sexpr::atom_text)
                .unwrap_or_default()
                .to_string();
            break;
        }
    }
    Ok(Gate { id, condition })
}

fn map_fork(parts: &[Sexpr]) -> Result<Fork, MappingError> {
    let kmap = keyword_map(&parts[1..]);
    let id = required(&kmap, "fork", ":id")?.to_string();
    let branches = clause_strings(&parts[1..], "branches");
    Ok(Fork { id, branches })
}

fn map_join(parts: &[Sexpr]) -> Result<Join, MappingError> {
    let kmap = keyword_map(&parts[1..]);
    let id = required(&kmap, "join", ":id")?.to_string();
    let after = clause_strings(&parts[1..], "after");
    Ok(Join { id, after })
}

fn map_policies(items: &[Sexpr]) -> Result<Vec<Policy>, MappingError> {
    let mut policies = Vec::new();
    for el in items {
        let Some(parts) = el.elements() else {
            continue;
        };
        if parts.first().and_then(Sexpr::sym) != Some("policy") {
            continue;
        }
        let name = parts
            .get(1)
            .and_then(Sexpr::sym)
            .ok_or(MappingError::MissingField {
                context: "policy",
                field: "name",
            })?
            .to_string();
        let kv = map_kv_pairs(&parts[2..]);
        policies.push(Policy { name, kv });
    }
    Ok(policies)
}

fn map_catalog(sections: &[Sexpr]) -> Result<Catalog, MappingError> {
    let mut catalog = Catalog::default();
    for section in sections {
        let Some(items) = section.elements() else {
            continue;
        };
        match items.first().and_then(Sexpr::sym) {
            Some(":attributes") => {
                for def in &items[1..] {
                    if let Some((name, attr_def)) = map_attr_def(def) {
                        catalog.attributes.insert(name, attr_def);
                    }
                }
            }
            Some(":actions") => {
                for def in &items[1..] {
                    if let Some((name, action_def)) = map_action_def(def) {
                        catalog.actions.insert(name, action_def);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(catalog)
}

fn map_attr_def(node: &Sexpr) -> Option<(String, AttrDef)> {
    let parts = node.elements()?;
    let name = parts.first()?.sym()?.to_string();
    let kmap = keyword_map(&parts[1..]);
    let def = AttrDef {
        typ: kmap
            .get(":type")
            .and_then(|n| n.atom_text())
            .unwrap_or_default()
            .to_string(),
        enum_values: kmap.get(":enum").and_then(|n| n.elements()).map(string_list),
        format: kmap
            .get(":format")
            .and_then(|n| n.atom_text())
            .map(str::to_string),
        pii: kmap.get(":pii").and_then(|n| n.sym()).and_then(|s| match s {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }),
    };
    Some((name, def))
}

fn map_action_def(node: &Sexpr) -> Option<(String, ActionDef)> {
    let parts = node.elements()?;
    let name = parts.first()?.sym()?.to_string();
    let mut def = ActionDef::default();
    for sub in &parts[1..] {
        let Some(sub_parts) = sub.elements() else {
            continue;
        };
        if sub_parts.is_empty() {
            continue;
        }
        let rest = &sub_parts[1..];
        match sub_parts[0].sym() {
            Some("params") => def.params = rest.iter().filter_map(map_param_def).collect(),
            Some("needs") => def.needs = string_list(rest),
            Some("produces") => def.produces = string_list(rest),
            _ => {}
        }
    }
    Some((name, def))
}

fn map_param_def(node: &Sexpr) -> Option<ParamDef> {
    let parts = node.elements()?;
    let name = parts.first()?.sym()?.to_string();
    let kmap = keyword_map(&parts[1..]);
    Some(ParamDef {
        name,
        typ: kmap
            .get(":type")
            .and_then(|n| n.atom_text())
            .unwrap_or_default()
            .to_string(),
        required: kmap.get(":required").and_then(|n| n.sym()) == Some("true"),
        enum_values: kmap.get(":enum").and_then(|n| n.elements()).map(string_list),
    })
}

/* ---------------- helpers ---------------- */

/// Walk an alternating `:key value` association list into a lookup. Keys
/// are keyword symbols; each keyword claims the element after it. Other
/// elements (positional strings, sub-clauses) are left for the caller.
fn keyword_map<'a>(items: &'a [Sexpr]) -> BTreeMap<&'a str, &'a Sexpr> {
    let mut map = BTreeMap::new();
    let mut i = 0;
    while i + 1 < items.len() {
        if let Some(sym) = items[i].sym() {
            if sym.starts_with(':') {
                map.insert(sym, &items[i + 1]);
                i += 2;
                continue;
            }
        }
        i += 1;
    }
    map
}

fn required<'a>(
    kmap: &BTreeMap<&str, &'a Sexpr>,
    context: &'static str,
    field: &'static str,
) -> Result<&'a str, MappingError> {
    kmap.get(field)
        .and_then(|n| n.atom_text())
        .ok_or(MappingError::MissingField { context, field })
}

fn atom_string(node: &Sexpr) -> String {
    node.atom_text().unwrap_or_default().to_string()
}

fn string_list(items: &[Sexpr]) -> Vec<String> {
    items
        .iter()
        .filter_map(Sexpr::atom_text)
        .map(str::to_string)
        .collect()
}

/// Strings of the first `(name item*)` sub-clause among `items`.
fn clause_strings(items: &[Sexpr], name: &str) -> Vec<String> {
    for sub in items {
        if let Some(sub_parts) = sub.elements() {
            if sub_parts.first().and_then(Sexpr::sym) == Some(name) {
                return string_list(&sub_parts[1..]);
            }
        }
    }
    Vec::new()
}

fn map_kv_pairs(items: &[Sexpr]) -> BTreeMap<String, Value> {
    items.iter().filter_map(kv_pair).collect()
}

/// `(key value)` pair; anything else is skipped by the caller.
fn kv_pair(node: &Sexpr) -> Option<(String, Value)> {
    let items = node.elements()?;
    if items.len() != 2 {
        return None;
    }
    let key = items[0].atom_text()?.to_string();
    let value = atom_value(&items[1])?;
    Some((key, value))
}

/// Classify an atom into a typed value. Numbers try `u64` first, then
/// `Decimal`; bare `true`/`false` become booleans; every other bare
/// symbol stays a symbol.
fn atom_value(node: &Sexpr) -> Option<Value> {
    match node {
        Sexpr::Atom {
            atom: Atom::Str(s), ..
        } => Some(Value::String(s.clone())),
        Sexpr::Atom {
            atom: Atom::Number(n),
            ..
        } => {
            if let Ok(i) = n.parse::<u64>() {
                Some(Value::Int(i))
            } else if let Ok(d) = n.parse::<Decimal>() {
                Some(Value::Float(d))
            } else {
                Some(Value::Symbol(n.clone()))
            }
        }
        Sexpr::Atom {
            atom: Atom::Sym(s), ..
        } => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => Some(Value::Symbol(s.clone())),
        },
        Sexpr::List { .. } => None,
    }
}
