use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection, JSON callers still get the key
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Print `{collection_name: items}` as pretty JSON
pub fn output_collection_json<T: Serialize>(collection_name: &str, items: &[T]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&json!({ collection_name: items }))?);
    Ok(())
}

/// Format an optional score for table output
pub fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".to_string())
}
