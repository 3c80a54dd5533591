use serde_json::Value;
use solde_client::ClientError;

const MAX_LISTED_ISSUES: usize = 50;

pub fn render_error(error: &ClientError) -> String {
    let mut lines = vec![
        "The command could not be completed.".to_string(),
        String::new(),
        format!("  Error:    {}", error.code),
        format!("  Details:  {}", error.message),
    ];

    if let Some(data) = &error.data {
        lines.extend(render_issues(data));
        lines.extend(render_missing_columns(data));
        lines.extend(render_completed_imports(data));
    }

    lines.push(String::new());
    lines.push("What to do next:".to_string());
    if error.recovery_steps.is_empty() {
        lines.push("  1. Retry the command.".to_string());
    } else {
        for (index, step) in error.recovery_steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", index + 1));
        }
    }

    lines.join("\n")
}

fn render_issues(data: &Value) -> Vec<String> {
    let Some(issues) = data.get("issues").and_then(Value::as_array) else {
        return Vec::new();
    };
    if issues.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![String::new(), "Problems:".to_string()];
    for issue in issues.iter().take(MAX_LISTED_ISSUES) {
        let row = issue.get("row").and_then(Value::as_i64).unwrap_or(0);
        let field = issue.get("field").and_then(Value::as_str).unwrap_or("row");
        let description = issue
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("invalid value");
        let mut line = format!("  Row {row}, {field}: {description}");
        if let Some(received) = issue.get("received").and_then(Value::as_str) {
            line.push_str(&format!(" (got `{received}`)"));
        }
        lines.push(line);
    }
    if issues.len() > MAX_LISTED_ISSUES {
        lines.push(format!(
            "  ... and {} more; rerun with --json for the full list.",
            issues.len() - MAX_LISTED_ISSUES
        ));
    }
    lines
}

fn render_missing_columns(data: &Value) -> Vec<String> {
    let Some(expected) = data.get("expected_columns").and_then(Value::as_array) else {
        return Vec::new();
    };
    let names = expected
        .iter()
        .filter_map(Value::as_str)
        .collect::<Vec<&str>>()
        .join(", ");
    vec![format!("  Expected: {names}")]
}

fn render_completed_imports(data: &Value) -> Vec<String> {
    let Some(completed) = data.get("completed_imports").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut lines = vec![
        String::new(),
        "Files imported before the failure (kept):".to_string(),
    ];
    for file in completed {
        let path = file.get("source_path").and_then(Value::as_str).unwrap_or("?");
        let inserted = file.get("inserted").and_then(Value::as_i64).unwrap_or(0);
        let skipped = file.get("skipped").and_then(Value::as_i64).unwrap_or(0);
        lines.push(format!("  {path}: {inserted} new, {skipped} duplicate"));
    }
    lines
}
