//! # Property-Based Tests
//!
//! Invariants of the compose document model and substitution.

use dockge_core::compose::envsubst::{Environment, substitute};
use dockge_core::{ComposeDocument, StackStatus, is_valid_stack_name};
use proptest::collection::{btree_map, btree_set, vec};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn label_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.]{0,15}"
}

fn label_value() -> impl Strategy<Value = String> {
    "[a-z0-9:]{1,12}"
}

/// One generated service: image, published ports, labels and label style.
type ServiceSpec = (String, Vec<u16>, BTreeMap<String, String>, bool);

fn service_spec() -> impl Strategy<Value = ServiceSpec> {
    (
        "[a-z]{1,8}:[0-9]{1,2}",
        vec(1000u16..9000, 0..3),
        btree_map("[a-z]{1,6}\\.[a-z]{1,6}", "v[a-z0-9]{0,5}", 0..3),
        any::<bool>(),
    )
}

/// Render a compose file with comments between and after entries.
fn render_compose(
    services: &BTreeMap<String, ServiceSpec>,
    networks: &BTreeSet<String>,
    comment: &str,
) -> String {
    let mut out = format!("# {comment}\nservices:\n");
    for (name, (image, ports, labels, list_style)) in services {
        out.push_str(&format!("  # {comment} {name}\n  {name}:\n"));
        out.push_str(&format!("    image: {image} # {comment}\n"));
        if !ports.is_empty() {
            out.push_str("    ports:\n");
            for port in ports {
                out.push_str(&format!("      # {comment}\n      - \"{port}:80\"\n"));
            }
        }
        if !labels.is_empty() {
            out.push_str("    labels:\n");
            for (key, value) in labels {
                if *list_style {
                    out.push_str(&format!("      - {key}={value}\n"));
                } else {
                    out.push_str(&format!("      {key}: {value} # {comment}\n"));
                }
            }
        }
        if !networks.is_empty() {
            out.push_str("    networks:\n");
            for network in networks {
                out.push_str(&format!("      - {network}\n"));
            }
        }
    }
    if !networks.is_empty() {
        out.push_str(&format!("\n# {comment}\nnetworks:\n"));
        for network in networks {
            out.push_str(&format!("  {network}:\n    external: true\n"));
        }
    }
    out
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// A label written through either style reads back unchanged after a
    /// serialize and reparse.
    #[test]
    fn label_set_then_get_survives_serialization(
        key in label_key(),
        value in label_value(),
        list_style in any::<bool>(),
    ) {
        let source = if list_style {
            "services:\n  web:\n    image: nginx\n    labels:\n      - seed=1\n"
        } else {
            "services:\n  web:\n    image: nginx\n    labels:\n      seed: \"1\"\n"
        };
        let mut doc = ComposeDocument::parse(source, None).expect("parse");
        doc.services_mut().service_mut("web").service_labels_mut().set(&key, &value);

        let out = doc.serialize().expect("serialize");
        let reparsed = ComposeDocument::parse(&out, None).expect("reparse");
        let services = reparsed.services();
        let web = services.get_service("web");
        let labels = web.labels();

        prop_assert_eq!(labels.get(&key, false), Some(value.clone()));
        prop_assert_eq!(labels.is_array(), list_style);
    }

    /// Serializing a parsed document and parsing it again yields the same tree.
    #[test]
    fn parse_serialize_is_shape_stable(
        services in btree_map("svc[a-z]{1,5}", service_spec(), 1..5),
        networks in btree_set("net[a-z]{1,4}", 0..3),
        comment in "[a-z ]{1,16}",
    ) {
        let source = render_compose(&services, &networks, &comment);
        let first = ComposeDocument::parse(&source, None).expect("parse");
        let out = first.serialize().expect("serialize");
        let second = ComposeDocument::parse(&out, None).expect("reparse");

        prop_assert_eq!(second.data().raw(), first.data().raw());
        prop_assert_eq!(second.services().names(), services.keys().cloned().collect::<Vec<_>>());
    }

    /// Reads through any path never change the document.
    #[test]
    fn reads_never_mutate(names in vec("[a-z]{1,8}", 1..6)) {
        let doc = ComposeDocument::parse("services:\n  web:\n    image: nginx\n", None)
            .expect("parse");
        let before = doc.data().clone();
        for name in &names {
            let services = doc.services();
            let service = services.get_service(name);
            let _ = service.image();
            let _ = service.labels().get_labels(true);
            let _ = service.ports().values().len();
            let _ = doc.networks().get_network(name).is_external();
        }
        prop_assert_eq!(doc.data(), &before);
    }

    /// Services written in any order keep their insertion order.
    #[test]
    fn service_order_is_preserved(names in btree_map("[a-z]{1,8}", "[a-z]{1,8}", 1..8)) {
        let mut doc = ComposeDocument::default();
        let ordered: Vec<String> = names.keys().rev().cloned().collect();
        for name in &ordered {
            doc.services_mut().service_mut(name).set_image(&names[name]);
        }
        prop_assert_eq!(doc.services().names(), ordered);
    }

    /// Text without `$` is never altered by substitution.
    #[test]
    fn substitution_is_identity_without_dollar(text in "[^$]{0,64}") {
        prop_assert_eq!(substitute(&text, &Environment::new()), text);
    }

    /// `$$` always collapses to a single literal dollar.
    #[test]
    fn escaped_dollar_is_literal(prefix in "[a-z ]{0,8}", suffix in "[a-zA-Z_]{0,8}") {
        let text = format!("{prefix}$${suffix}");
        prop_assert_eq!(substitute(&text, &Environment::new()), format!("{prefix}${suffix}"));
    }

    /// Names from the allowed alphabet validate; any uppercase letter fails.
    #[test]
    fn stack_name_alphabet(name in "[a-z0-9_-]{1,24}", upper in "[A-Z]") {
        prop_assert!(is_valid_stack_name(&name));
        let with_upper = format!("{name}{upper}");
        prop_assert!(!is_valid_stack_name(&with_upper));
    }

    /// Unhealthy wins over any combination of counters.
    #[test]
    fn unhealthy_always_wins(running in 0usize..10, exited in 0usize..10) {
        prop_assert_eq!(StackStatus::aggregate(running, exited, true), StackStatus::Unhealthy);
    }
}
