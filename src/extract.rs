use serde_json::Value;

use crate::catalog;
use crate::raw::{safe_str, RawRecord};
use crate::snapshot::{ProgramRow, ValueRow};

/// Placeholder for missing upstream data. Every catalog param gets a value
/// for every program, so absence renders as a dash instead of a hole.
pub const DASH: &str = "—";

fn val_or_dash(s: String) -> String {
    if s.is_empty() {
        DASH.to_string()
    } else {
        s
    }
}

/// Map one deduplicated record to its program row plus one value row per
/// catalog param. Records without a program code yield nothing.
pub fn extract_record(record: &RawRecord) -> Option<(ProgramRow, Vec<ValueRow>)> {
    let code = record.code();
    if code.is_empty() {
        return None;
    }

    let program = program_row(record, &code);

    let mut values = Vec::with_capacity(catalog::PARAMS.len());
    {
        let mut push = |key: &str, value: String| {
            values.push(ValueRow {
                program_id: code.clone(),
                param_key: key.to_string(),
                value: Value::String(value),
            });
        };

        push("level", val_or_dash(record.program_str("Level")));
        push("napr", val_or_dash(record.program_str("Napr")));
        push("institute", val_or_dash(record.program_str("Institute")));
        push("form", val_or_dash(record.program_str("Form")));
        push("army_deferral", army_deferral(&record.program_str("Form")).to_string());
        push("format", val_or_dash(record.program_str("Format")));

        push("year", val_or_dash(record.aggregate_str("Year")));
        push("price", val_or_dash(record.aggregate_str("Price")));
        push("dogovor", val_or_dash(record.aggregate_str("Mesta_Dogovor")));
        push("budget", val_or_dash(record.aggregate_str("Mesta_Budget")));

        push("score_prev_budget", val_or_dash(record.aggregate_str("ScorePrevious_Budget")));
        push("score_prev_dogovor", val_or_dash(record.aggregate_str("ScorePrevious_Dogovor")));

        push("subjects", subjects(record));

        // Short description first, long-form text as the fallback.
        let short = record.program_str("ShortDescription");
        let description = if short.is_empty() {
            record.program_str("OProgramme")
        } else {
            short
        };
        push("oprog", val_or_dash(description));
    }

    Some((program, values))
}

fn program_row(record: &RawRecord, code: &str) -> ProgramRow {
    let title = [record.program_str("Title"), record.program_str("Name")]
        .into_iter()
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| code.to_string());

    let program_title = if title == code {
        code.to_string()
    } else {
        format!("{code} — {title}")
    };

    let link = record.program_str("Link");

    ProgramRow {
        program_id: code.to_string(),
        program_title,
        program_link: if link.is_empty() { None } else { Some(link) },
    }
}

/// Textual heuristic over the free-form delivery-form label: the full-time
/// family ("очная") grants deferral unless the label is the evening hybrid
/// ("очно-заочная"). Labels are matched by substring, so unanticipated
/// form names fall wherever the substrings land.
pub fn army_deferral(form: &str) -> &'static str {
    let form = form.to_lowercase();
    if form.contains("очная") && !form.contains("очно-заочная") {
        "есть"
    } else {
        "нет"
    }
}

/// Required exam subjects: the flat name list when it is non-empty,
/// otherwise names pulled out of the detail objects, otherwise a dash.
pub fn subjects(record: &RawRecord) -> String {
    if let Some(Value::Array(items)) = record.aggregate("Ar_Predmet") {
        if !items.is_empty() {
            return items
                .iter()
                .map(|v| safe_str(Some(v)))
                .collect::<Vec<_>>()
                .join(", ");
        }
    }

    match record.aggregate("arPredmetFull") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let name = safe_str(item.get("Name_Site"));
                if name.is_empty() {
                    safe_str(item.get("Full_Name"))
                } else {
                    name
                }
            })
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => DASH.to_string(),
    }
}
