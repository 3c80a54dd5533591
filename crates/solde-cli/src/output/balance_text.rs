use std::io;

use serde_json::Value;

use super::format::{self, Column};

pub fn render_balance_series(data: &Value) -> io::Result<String> {
    let points = data
        .get("points")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("balance output requires points"))?;
    let account = account_label(data);

    if points.is_empty() {
        return Ok([
            format!("No transactions stored for {account} yet."),
            String::new(),
            "Import a statement first:".to_string(),
            "  solde import create <path>".to_string(),
        ]
        .join("\n"));
    }

    let granularity = data
        .get("granularity")
        .and_then(Value::as_str)
        .unwrap_or("daily");
    let from = str_field(data, "from");
    let to = str_field(data, "to");
    let mut lines = vec![
        format!("Balance of {account}, {granularity}, {from} to {to}:"),
        String::new(),
    ];

    let rows = points
        .iter()
        .map(|point| vec![str_field(point, "date"), cents_field(point, "balance_cents")])
        .collect::<Vec<Vec<String>>>();
    lines.extend(format::render_table_or_blocks(
        &[Column::left("Date"), Column::right("Balance")],
        &rows,
        format::terminal_width(),
        "Point",
    ));

    if let Some(extremes) = data.get("extremes").filter(|value| !value.is_null()) {
        let min = extremes.get("min").cloned().unwrap_or(Value::Null);
        let max = extremes.get("max").cloned().unwrap_or(Value::Null);
        lines.push(String::new());
        lines.extend(format::key_value_rows(
            &[
                (
                    "Lowest:",
                    format!(
                        "{} on {}",
                        cents_field(&min, "balance_cents"),
                        str_field(&min, "date")
                    ),
                ),
                (
                    "Highest:",
                    format!(
                        "{} on {}",
                        cents_field(&max, "balance_cents"),
                        str_field(&max, "date")
                    ),
                ),
            ],
            0,
        ));
    }

    Ok(lines.join("\n"))
}

/// One row per month: the balance on the reference day of month and at
/// month end.
pub fn render_month_comparison(data: &Value) -> io::Result<String> {
    let months = data
        .get("months")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("balance compare output requires months"))?;
    let account = str_field(data, "account_id");
    let reference_date = str_field(data, "reference_date");

    if months.is_empty() {
        return Ok(format!("No transactions stored for {account} yet."));
    }

    let reference_day = reference_date
        .rsplit('-')
        .next()
        .and_then(|day| day.parse::<u64>().ok())
        .unwrap_or(1);
    let day_heading = format!("Day {reference_day}");
    let columns = [
        Column::left("Month"),
        Column::right(&day_heading),
        Column::right("Month end"),
    ];

    let rows = months
        .iter()
        .map(|month| {
            let points = month
                .get("points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let on_day = points
                .iter()
                .find(|point| point.get("day").and_then(Value::as_u64) == Some(reference_day))
                .or(points.last())
                .map(|point| cents_field(point, "balance_cents"))
                .unwrap_or_default();
            let month_end = points
                .iter()
                .rev()
                .find(|point| !point.get("extended").and_then(Value::as_bool).unwrap_or(false))
                .map(|point| cents_field(point, "balance_cents"))
                .unwrap_or_default();
            vec![str_field(month, "month"), on_day, month_end]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![
        format!("Month comparison for {account}, reference date {reference_date}:"),
        String::new(),
    ];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &rows,
        format::terminal_width(),
        "Month",
    ));

    if let Some(stats) = data.get("stats").filter(|value| !value.is_null()) {
        let compared = stats
            .get("months_compared")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        lines.push(String::new());
        lines.push(format!("On day {reference_day} across {compared} months:"));
        lines.extend(format::key_value_rows(
            &[
                ("Lowest:", cents_field(stats, "min_cents")),
                ("Highest:", cents_field(stats, "max_cents")),
                ("Average:", cents_field(stats, "mean_cents")),
            ],
            2,
        ));
    }

    Ok(lines.join("\n"))
}

pub fn render_savings(data: &Value) -> io::Result<String> {
    let periods = data
        .get("periods")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("balance savings output requires periods"))?;
    let account = str_field(data, "account_id");
    let pay_day = data.get("pay_day").and_then(Value::as_u64).unwrap_or(0);

    if periods.is_empty() {
        return Ok(format!("No transactions stored for {account} yet."));
    }

    let rows = periods
        .iter()
        .map(|period| {
            vec![
                str_field(period, "label"),
                str_field(period, "start"),
                str_field(period, "end"),
                cents_field(period, "start_balance_cents"),
                cents_field(period, "end_balance_cents"),
                cents_field(period, "saved_cents"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![
        format!("Savings for {account}, pay day {pay_day}:"),
        String::new(),
    ];
    lines.extend(format::render_table_or_blocks(
        &[
            Column::left("Period"),
            Column::left("From"),
            Column::left("To"),
            Column::right("Start"),
            Column::right("End"),
            Column::right("Saved"),
        ],
        &rows,
        format::terminal_width(),
        "Period",
    ));
    lines.push(String::new());
    lines.push(format!(
        "Total saved: {}",
        cents_field(data, "total_saved_cents")
    ));

    Ok(lines.join("\n"))
}

fn account_label(data: &Value) -> String {
    let account_id = str_field(data, "account_id");
    match data.get("display_name").and_then(Value::as_str) {
        Some(name) => format!("{account_id} ({name})"),
        None => account_id,
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn cents_field(value: &Value, key: &str) -> String {
    format::money(value.get(key).and_then(Value::as_i64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{render_balance_series, render_month_comparison, render_savings};

    #[test]
    fn series_lists_points_and_extremes() {
        let data = json!({
            "account_id": "acct1",
            "display_name": "Checking",
            "granularity": "monthly",
            "opening_balance_cents": 0,
            "from": "2024-01-31",
            "to": "2024-02-29",
            "points": [
                {"date": "2024-01-31", "balance_cents": 95000},
                {"date": "2024-02-29", "balance_cents": 12050}
            ],
            "extremes": {
                "min": {"date": "2024-02-29", "balance_cents": 12050},
                "max": {"date": "2024-01-31", "balance_cents": 95000}
            }
        });

        let rendered = render_balance_series(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("Balance of acct1 (Checking), monthly, 2024-01-31 to 2024-02-29:"));
            assert!(text.contains("  2024-02-29   120.50"));
            assert!(text.contains("Lowest:   120.50 on 2024-02-29"));
        }
    }

    #[test]
    fn empty_series_suggests_an_import() {
        let rendered = render_balance_series(&json!({
            "account_id": "acct1", "display_name": null, "points": [], "extremes": null
        }));
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("No transactions stored for acct1 yet."));
        }
    }

    #[test]
    fn comparison_uses_reference_day_and_real_month_end() {
        let data = json!({
            "account_id": "acct1",
            "reference_date": "2024-03-30",
            "months": [
                {"month": "2024-02", "days_in_month": 29, "points": [
                    {"day": 29, "balance_cents": 500, "extended": false},
                    {"day": 30, "balance_cents": 500, "extended": true},
                    {"day": 31, "balance_cents": 500, "extended": true}
                ]},
                {"month": "2024-03", "days_in_month": 31, "points": [
                    {"day": 30, "balance_cents": 700, "extended": false}
                ]}
            ],
            "stats": {"day": 30, "months_compared": 2, "min_cents": 500, "max_cents": 700, "mean_cents": 600}
        });

        let rendered = render_month_comparison(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("Day 30"));
            assert!(text.contains("On day 30 across 2 months:"));
            assert!(text.contains("Average:  6.00"));
        }
    }

    #[test]
    fn savings_reports_total() {
        let data = json!({
            "account_id": "acct1",
            "pay_day": 28,
            "periods": [{
                "label": "2024-02", "start": "2024-01-28", "end": "2024-02-28",
                "start_balance_cents": 1000, "end_balance_cents": 3500, "saved_cents": 2500
            }],
            "total_saved_cents": 2500
        });

        let rendered = render_savings(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("Savings for acct1, pay day 28:"));
            assert!(text.contains("Total saved: 25.00"));
        }
    }
}
