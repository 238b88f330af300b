use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell, ROW_COLLECTIONS};

/// Format output as tables using the tabled crate.
///
/// Scalar result fields go into a `Field | Value` table; each row collection
/// (results, alerts, rankings, ...) gets its own titled table underneath.
pub fn print_table(value: &Value) {
    let Value::Object(envelope) = value else {
        println!("{}", value);
        return;
    };

    match envelope.get("result") {
        Some(Value::Object(result)) => print_result(result),
        Some(other) => println!("{}", cell(other)),
        None => print_result(envelope),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_result(result: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in result {
        if is_row_collection(key, val) {
            continue;
        }
        builder.push_record([key.as_str(), &cell(val)]);
    }
    println!("{}", Table::from(builder));

    for key in ROW_COLLECTIONS {
        if let Some(Value::Array(rows)) = result.get(key) {
            if rows.iter().any(Value::is_object) {
                println!("\n{}:", key);
                print_rows(rows);
            }
        }
    }
}

fn is_row_collection(key: &str, val: &Value) -> bool {
    ROW_COLLECTIONS.contains(&key)
        && val
            .as_array()
            .is_some_and(|arr| arr.iter().any(Value::is_object))
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };

    let headers: Vec<String> = first
        .iter()
        .filter(|(_, v)| !v.is_object())
        .map(|(k, _)| k.clone())
        .collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(cell).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}
