//! Simple inspector for policy instance files.

use std::fs;

use policy_model::{decode_instance_with_options, validate_instance, DecodeOptions, Instance, Val};

fn format_value(v: &Val<'_>) -> String {
    match v {
        Val::String(s) => {
            let preview: String = s.chars().take(60).collect();
            if s.chars().count() > 60 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Val::List(list) => format!("LIST[{}]", list.len()),
        Val::Map(map) => format!("MAP[{}]", map.size()),
        other => other.to_string(),
    }
}

fn print_rules(instance: &Instance) {
    let Some(rules) = instance.rules() else {
        println!("\n=== Rules (none) ===");
        return;
    };
    println!("\n=== Rules ({}) ===", rules.len());
    for (i, rule) in rules.values().enumerate().take(20) {
        println!("[{}] {}", i, format_value(&rule));
        let Ok(fields) = rule.iterator() else {
            continue;
        };
        for key in fields.take(5) {
            println!("      {} = {}", format_value(&key), format_value(&rule.get(&key)));
        }
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "policy.yaml".to_string());

    println!("Reading: {}", path);

    let text = fs::read_to_string(&path).expect("Failed to read file");
    println!("File size: {} bytes", text.len());

    let options = DecodeOptions::lenient().with_description(path.as_str());
    let decoded = decode_instance_with_options(&text, &options).expect("Failed to decode");
    let instance = &decoded.value;

    println!("\n=== Instance ===");
    println!("Version: {}", instance.version_name().unwrap_or("-"));
    println!("Kind: {}", instance.kind_name().unwrap_or("-"));
    println!("Name: {}", instance.name().unwrap_or("-"));
    println!("Namespace: {}", instance.namespace());
    if let Some(selector) = &instance.selector {
        let labels = selector.match_labels.as_ref().map_or(0, |m| m.matchers.len());
        let exprs = selector.match_expressions.as_ref().map_or(0, |m| m.matchers.len());
        println!("Selector: {} labels, {} expressions", labels, exprs);
    }

    match validate_instance(instance) {
        Ok(()) => println!("Valid: yes"),
        Err(err) => println!("Valid: no ({})", err),
    }

    print_rules(instance);

    if !decoded.errors.is_empty() {
        println!("\n=== Skipped ({}) ===", decoded.errors.len());
        for err in &decoded.errors {
            println!("  - {}", err);
        }
    }

    if let Some(info) = &instance.source_info {
        println!("\n=== Source ({}) ===", info.description());
        println!("Lines: {}", info.line_offsets().len());
        println!("Elements: {}", info.element_count());
        for id in 1..=info.element_count().min(15) as i64 {
            if let Some(p) = info.path_by_id(id) {
                println!("  #{:<3} {}", id, if p.is_empty() { "<root>" } else { p });
            }
        }
    }
}
