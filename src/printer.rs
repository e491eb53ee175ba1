//! Canonical printer: typed document back to grammar-conformant text.
//!
//! Output is deterministic: map-like fields iterate in key order, ordered
//! collections print in stored order, and an absent lifecycle is filled
//! with the fixed default state set. Printing never fails; any well-formed
//! document, parsed or built programmatically, is printable.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::ast::{
    ActionDef, AttrDef, Catalog, Entity, Flow, Lifecycle, Meta, Orchestrator, Policy, Request,
    Resource, Step, Task, Transition, Value,
};

/// Render a document as canonical onboarding-request text.
pub fn print(req: &Request) -> String {
    let mut out = String::new();
    out.push_str("(onboarding-request\n");
    print_meta(&mut out, &req.meta);
    print_orchestrator(&mut out, &req.orchestrator);
    if let Some(catalog) = &req.catalog {
        print_catalog(&mut out, catalog);
    }
    close_last(&mut out);
    out
}

/// Move the closing paren of the enclosing clause onto the last written
/// line, lisp-style.
fn close_last(out: &mut String) {
    if out.ends_with('\n') {
        out.pop();
    }
    out.push(')');
    out.push('\n');
}

fn print_meta(out: &mut String, meta: &Meta) {
    out.push_str("  (:meta\n");
    out.push_str(&format!("    (request-id {})\n", quote(&meta.request_id)));
    out.push_str(&format!("    (version {})\n", meta.version));
    out.push_str(&format!(
        "    (created-at {})\n",
        quote(&rfc3339(&meta.created_at))
    ));
    out.push_str(&format!(
        "    (updated-at {})\n",
        quote(&rfc3339(&meta.updated_at))
    ));
    close_last(out);
}

fn print_orchestrator(out: &mut String, orch: &Orchestrator) {
    out.push_str("  (:orchestrator\n");
    print_lifecycle(out, &orch.lifecycle);
    if !orch.entities.is_empty() {
        out.push_str("    (:entities\n");
        for entity in &orch.entities {
            print_entity(out, entity);
        }
        close_last(out);
    }
    if !orch.resources.is_empty() {
        out.push_str("    (:resources\n");
        for resource in &orch.resources {
            print_resource(out, resource);
        }
        close_last(out);
    }
    if !orch.flows.is_empty() {
        out.push_str("    (:flows\n");
        for flow in &orch.flows {
            print_flow(out, flow);
        }
        close_last(out);
    }
    if !orch.policies.is_empty() {
        out.push_str("    (:policies\n");
        for policy in &orch.policies {
            print_policy(out, policy);
        }
        close_last(out);
    }
    close_last(out);
}

fn print_lifecycle(out: &mut String, lc: &Lifecycle) {
    out.push_str("    (:lifecycle\n");

    out.push_str("      (states");
    if lc.states.is_empty() {
        for state in Lifecycle::DEFAULT_STATES {
            out.push(' ');
            out.push_str(state);
        }
    } else {
        for state in &lc.states {
            out.push(' ');
            out.push_str(state);
        }
    }
    out.push_str(")\n");

    let initial = if lc.initial.is_empty() {
        Lifecycle::DEFAULT_INITIAL
    } else {
        lc.initial.as_str()
    };
    out.push_str(&format!("      (initial {})\n", initial));

    if lc.transitions.is_empty() {
        out.push_str("      (transitions)\n");
    } else {
        out.push_str("      (transitions\n");
        for transition in &lc.transitions {
            out.push_str("        ");
            out.push_str(&transition_text(transition));
            out.push('\n');
        }
        close_last(out);
    }
    close_last(out);
}

fn transition_text(t: &Transition) -> String {
    let mut s = format!("(-> {} {}", t.from, t.to);
    if let Some(guard) = &t.guard {
        s.push_str(" (when ");
        s.push_str(&guard.kind);
        if let Some(path) = &guard.path {
            s.push(' ');
            s.push_str(&quote(path));
        }
        s.push(')');
    }
    if !t.effects.is_empty() {
        s.push_str(" (do");
        for call in &t.effects {
            s.push_str(" (");
            s.push_str(&call.name);
            for (key, value) in &call.args {
                s.push_str(&format!(" ({} {})", key, value_text(value)));
            }
            s.push(')');
        }
        s.push(')');
    }
    s.push(')');
    s
}

fn print_entity(out: &mut String, entity: &Entity) {
    out.push_str(&format!(
        "      (entity :id {} :type {}\n",
        quote(&entity.id),
        entity.typ
    ));
    out.push_str("        (attrs\n");
    for (key, attr) in &entity.attrs {
        let mut line = format!("          ({} {}", key, value_text(&attr.value));
        if let Some(provenance) = &attr.provenance {
            line.push_str(&format!(" :provenance {}", quote(provenance)));
        }
        if !attr.needed_by.is_empty() {
            line.push_str(&format!(" :needed-by ({})", attr.needed_by.join(" ")));
        }
        line.push(')');
        out.push_str(&line);
        out.push('\n');
    }
    close_last(out);
    close_last(out);
}

fn print_resource(out: &mut String, resource: &Resource) {
    out.push_str(&format!(
        "      (resource :id {} :type {}\n",
        quote(&resource.id),
        resource.typ
    ));
    if !resource.requires.is_empty() {
        out.push_str("        (requires\n");
        for item in &resource.requires {
            out.push_str(&format!("          ({} {})\n", item.kind, quote(&item.id)));
        }
        close_last(out);
    }
    if !resource.config.is_empty() {
        out.push_str("        (config\n");
        for (key, value) in &resource.config {
            out.push_str(&format!("          ({} {})\n", key, value_text(value)));
        }
        close_last(out);
    }
    close_last(out);
}

fn print_flow(out: &mut String, flow: &Flow) {
    let mut line = format!("      (flow :id {}", quote(&flow.id));
    if let Some(doc) = &flow.doc {
        line.push_str(&format!(" {}", quote(doc)));
    }
    out.push_str(&line);
    out.push('\n');
    out.push_str("        (steps\n");
    for step in &flow.steps {
        print_step(out, step);
    }
    close_last(out);
    close_last(out);
}

fn print_step(out: &mut String, step: &Step) {
    match step {
        Step::Task(task) => print_task(out, task),
        Step::Gate(gate) => {
            out.push_str(&format!(
                "          (gate :id {} (when {}))\n",
                quote(&gate.id),
                quote(&gate.condition)
            ));
        }
        Step::Fork(fork) => {
            out.push_str(&format!(
                "          (fork :id {} (branches{}))\n",
                quote(&fork.id),
                quoted_list(&fork.branches)
            ));
        }
        Step::Join(join) => {
            out.push_str(&format!(
                "          (join :id {} (after{}))\n",
                quote(&join.id),
                quoted_list(&join.after)
            ));
        }
    }
}

fn print_task(out: &mut String, task: &Task) {
    out.push_str(&format!(
        "          (task :id {} :on {} :op {}\n",
        quote(&task.id),
        quote(&task.on),
        task.op
    ));
    if task.args.is_empty() {
        out.push_str("            (args)\n");
    } else {
        out.push_str("            (args\n");
        for (key, value) in &task.args {
            out.push_str(&format!("              ({} {})\n", key, value_text(value)));
        }
        close_last(out);
    }
    if !task.needs.is_empty() {
        out.push_str(&format!("            (needs{})\n", quoted_list(&task.needs)));
    }
    if !task.produces.is_empty() {
        out.push_str(&format!(
            "            (produces{})\n",
            quoted_list(&task.produces)
        ));
    }
    if !task.labels.is_empty() {
        out.push_str(&format!("            (labels {})\n", task.labels.join(" ")));
    }
    close_last(out);
}

fn print_policy(out: &mut String, policy: &Policy) {
    let mut line = format!("      (policy {}", policy.name);
    for (key, value) in &policy.kv {
        line.push_str(&format!(" ({} {})", key, value_text(value)));
    }
    line.push(')');
    out.push_str(&line);
    out.push('\n');
}

fn print_catalog(out: &mut String, catalog: &Catalog) {
    out.push_str("  (:catalog\n");
    out.push_str("    (:attributes\n");
    for (name, def) in &catalog.attributes {
        out.push_str("      ");
        out.push_str(&attr_def_text(name, def));
        out.push('\n');
    }
    close_last(out);
    out.push_str("    (:actions\n");
    for (name, def) in &catalog.actions {
        print_action_def(out, name, def);
    }
    close_last(out);
    close_last(out);
}

fn attr_def_text(name: &str, def: &AttrDef) -> String {
    let mut s = format!("({} :type {}", name, def.typ);
    if let Some(values) = &def.enum_values {
        s.push_str(&format!(" :enum ({})", values.join(" ")));
    }
    if let Some(format) = &def.format {
        s.push_str(&format!(" :format {}", format));
    }
    if let Some(pii) = def.pii {
        s.push_str(&format!(" :pii {}", pii));
    }
    s.push(')');
    s
}

fn print_action_def(out: &mut String, name: &str, def: &ActionDef) {
    out.push_str(&format!("      ({}\n", name));
    if def.params.is_empty() {
        out.push_str("        (params)\n");
    } else {
        out.push_str("        (params\n");
        for param in &def.params {
            let mut line = format!("          ({} :type {}", param.name, param.typ);
            if param.required {
                line.push_str(" :required true");
            }
            if let Some(values) = &param.enum_values {
                line.push_str(&format!(" :enum ({})", values.join(" ")));
            }
            line.push(')');
            out.push_str(&line);
            out.push('\n');
        }
        close_last(out);
    }
    out.push_str(&format!("        (needs{})\n", quoted_list(&def.needs)));
    out.push_str(&format!("        (produces{})\n", quoted_list(&def.produces)));
    close_last(out);
}

/* ---------------- leaf rendering ---------------- */

fn rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Int(i) => i.to_string(),
        Value::Float(d) => d.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Symbol(s) => s.clone(),
    }
}

/// Double-quote with the same two escapes the tokenizer accepts.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!(" {}", quote(s)))
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttrVal, Join, Meta};
    use crate::mapper;
    use crate::sexpr::parse_text;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn parse(text: &str) -> Request {
        mapper::map(&parse_text(text).expect("text should parse")).expect("text should map")
    }

    fn minimal_doc() -> Request {
        parse(
            r#"(onboarding-request
                (:meta (request-id "r1") (version 1)
                  (created-at "2026-08-07T09:00:00Z") (updated-at "2026-08-07T09:30:00Z"))
                (:orchestrator
                  (:lifecycle (states draft active) (initial draft) (transitions))))"#,
        )
    }

    #[test]
    fn test_output_reparses_to_equal_document() {
        let doc = minimal_doc();
        let text = print(&doc);
        assert_eq!(parse(&text), doc);
    }

    #[test]
    fn test_print_is_a_fixed_point() {
        let doc = minimal_doc();
        let once = print(&doc);
        let twice = print(&parse(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_full_document_round_trip() {
        let doc = parse(
            r#"(onboarding-request
                (:meta (request-id "REQ-2026-044") (version 3)
                  (created-at "2026-08-01T08:00:00Z") (updated-at "2026-08-07T10:15:30Z"))
                (:orchestrator
                  (:lifecycle
                    (states draft validated executing completed)
                    (initial draft)
                    (transitions
                      (-> draft validated (when all-docs-present "docs.status"))
                      (-> validated executing (do (notify (channel "ops"))))))
                  (:entities
                    (entity :id "acme" :type LegalEntity
                      (attrs
                        (name "Acme Holdings S.A.")
                        (lei "5493001KJTIIGC8Y1R12" :provenance "gleif" :needed-by (kyc settlement))
                        (employee-count 240)
                        (risk-score 2.75)
                        (regulated true)
                        (domicile LU)))
                    (entity :id "jsmith" :type Person
                      (attrs (name "J. Smith") (pep false))))
                  (:resources
                    (resource :id "acct-eu" :type custody-account
                      (requires (entity "acme") (attr "acme.lei"))
                      (config (region "EU") (sub-accounts 3))))
                  (:flows
                    (flow :id "main" "Primary onboarding flow"
                      (steps
                        (task :id "collect" :on "acme" :op collect-docs
                          (args (doc-type "LEI") (retries 2))
                          (needs "intake.done")
                          (produces "docs.ready")
                          (labels kyc))
                        (gate :id "check" (when "docs.ready"))
                        (fork :id "split" (branches "kyc-branch" "acct-branch"))
                        (join :id "merge" (after "kyc-branch" "acct-branch")))))
                  (:policies
                    (policy retry (backoff "exponential") (max-attempts 3))))
                (:catalog
                  (:attributes
                    (lei :type string :format lei)
                    (client-class :type string :enum (retail professional) :pii false))
                  (:actions
                    (collect-docs
                      (params (doc-type :type string :required true :enum (LEI PASSPORT)))
                      (needs "intake.done")
                      (produces "docs.ready")))))"#,
        );
        let text = print(&doc);
        let reparsed = parse(&text);
        assert_eq!(reparsed, doc);
        assert_eq!(print(&reparsed), text);
    }

    #[test]
    fn test_deterministic_across_insertion_order() {
        let mut a = minimal_doc();
        let mut b = minimal_doc();

        let mut forward = BTreeMap::new();
        forward.insert("alpha".to_string(), AttrVal::new(Value::Int(1)));
        forward.insert("beta".to_string(), AttrVal::new(Value::Int(2)));
        let mut backward = BTreeMap::new();
        backward.insert("beta".to_string(), AttrVal::new(Value::Int(2)));
        backward.insert("alpha".to_string(), AttrVal::new(Value::Int(1)));

        a.orchestrator.entities.push(Entity {
            id: "e1".to_string(),
            typ: "T".to_string(),
            attrs: forward,
        });
        b.orchestrator.entities.push(Entity {
            id: "e1".to_string(),
            typ: "T".to_string(),
            attrs: backward,
        });

        assert_eq!(a, b);
        assert_eq!(print(&a), print(&b));
    }

    #[test]
    fn test_sorted_attr_keys_in_output() {
        let doc = parse(
            r#"(onboarding-request
                (:orchestrator
                  (:lifecycle (states draft) (initial draft) (transitions))
                  (:entities
                    (entity :id "e1" :type T
                      (attrs (zeta 1) (alpha 2) (mid 3))))))"#,
        );
        let text = print(&doc);
        let alpha = text.find("(alpha").expect("alpha printed");
        let mid = text.find("(mid").expect("mid printed");
        let zeta = text.find("(zeta").expect("zeta printed");
        assert!(alpha < mid && mid < zeta);
    }

    #[test]
    fn test_absent_lifecycle_prints_defaults() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let doc = Request {
            meta: Meta {
                request_id: "r1".to_string(),
                version: 1,
                created_at: now,
                updated_at: now,
            },
            orchestrator: Orchestrator::default(),
            catalog: None,
        };
        let text = print(&doc);
        assert!(text.contains("(states draft validated compiled executing completed failed)"));
        assert!(text.contains("(initial draft)"));
        assert!(text.contains("(transitions)"));
        // The filled defaults parse back as a proper lifecycle.
        let reparsed = parse(&text);
        assert_eq!(reparsed.orchestrator.lifecycle.states.len(), 6);
        assert_eq!(reparsed.orchestrator.lifecycle.initial, "draft");
    }

    #[test]
    fn test_programmatic_step_prints_and_reparses() {
        let mut doc = minimal_doc();
        doc.orchestrator.flows.push(Flow {
            id: "f1".to_string(),
            doc: None,
            steps: vec![Step::Join(Join {
                id: "j1".to_string(),
                after: vec!["a".to_string(), "b".to_string()],
            })],
        });
        let text = print(&doc);
        assert_eq!(parse(&text), doc);
    }

    #[test]
    fn test_string_escaping_round_trips() {
        let doc = parse(
            r#"(onboarding-request
                (:orchestrator
                  (:lifecycle (states draft) (initial draft) (transitions))
                  (:entities
                    (entity :id "e1" :type T
                      (attrs (motto "say \"hi\" \\ wave"))))))"#,
        );
        let text = print(&doc);
        assert!(text.contains(r#"(motto "say \"hi\" \\ wave")"#));
        assert_eq!(parse(&text), doc);
    }

    #[test]
    fn test_value_literal_forms() {
        assert_eq!(value_text(&Value::Int(42)), "42");
        assert_eq!(
            value_text(&Value::Float("3.14".parse().expect("decimal"))),
            "3.14"
        );
        assert_eq!(
            value_text(&Value::Float("-0.50".parse().expect("decimal"))),
            "-0.50"
        );
        assert_eq!(value_text(&Value::Bool(true)), "true");
        assert_eq!(value_text(&Value::symbol("draft")), "draft");
        assert_eq!(value_text(&Value::string("x")), "\"x\"");
    }

    #[test]
    fn test_subsecond_timestamps_round_trip() {
        let doc = parse(
            r#"(onboarding-request
                (:meta (request-id "r1") (version 1)
                  (created-at "2026-08-07T09:00:00.125Z")))"#,
        );
        let text = print(&doc);
        assert!(text.contains("2026-08-07T09:00:00.125Z"));
        assert_eq!(parse(&text), doc);
    }
}
