use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::snapshot::{ParamRow, ProgramRow, Snapshot};

static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Tokens that mean "no value" once lowercased. Dash variants are matched
/// before lowercasing since case does not apply to them.
const EMPTY_TOKENS: &[&str] = &["нет данных", "no data", "n/a", "none"];

/// Canonical comparison form of a cell value. Lossy on purpose: formatting
/// noise ("1 500" vs "1500", dash placeholders vs true absence, case) must
/// not register as a difference.
pub fn normalize_for_compare(value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }

    let raw = WS_RUN_RE
        .replace_all(&coerce_str(value), " ")
        .trim()
        .to_string();
    let lowered = raw.to_lowercase();

    if matches!(raw.as_str(), "—" | "–" | "-") || EMPTY_TOKENS.contains(&lowered.as_str()) {
        return String::new();
    }

    if let Value::Bool(b) = value {
        return if *b { "1" } else { "0" }.to_string();
    }

    if raw.chars().any(|c| c.is_ascii_digit()) {
        if let Some(n) = parse_lenient_number(&raw) {
            return format_number(n);
        }
    }

    lowered
}

pub fn is_different(a: &Value, b: &Value) -> bool {
    normalize_for_compare(a) != normalize_for_compare(b)
}

fn coerce_str(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Arrays and objects never reach the values relation, but a stray
        // one still normalizes deterministically.
        other => other.to_string(),
    }
}

/// Locale-tolerant numeric read. Whitespace and unit/currency characters
/// are dropped; a comma reads as a thousands separator when it groups
/// three digits (or when a period is also present), as a decimal
/// separator otherwise.
fn parse_lenient_number(raw: &str) -> Option<f64> {
    let mut candidate: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if candidate.contains(',') {
        if candidate.contains('.') {
            candidate.retain(|c| c != ',');
        } else {
            let groups: Vec<&str> = candidate.split(',').collect();
            let thousands = groups.len() > 2 || groups.last().is_some_and(|g| g.len() == 3);
            if thousands {
                candidate.retain(|c| c != ',');
            } else {
                candidate = candidate.replace(',', ".");
            }
        }
    }

    candidate.parse::<f64>().ok()
}

fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{n}")
}

// ── Comparison of two selected programs ──

pub struct CompareRow<'a> {
    pub param: &'a ParamRow,
    pub left: &'a Value,
    pub right: &'a Value,
    pub differs: bool,
}

pub struct CompareGroup<'a> {
    pub subgroup: String,
    pub rows: Vec<CompareRow<'a>>,
}

pub struct Comparison<'a> {
    pub left: &'a ProgramRow,
    pub right: &'a ProgramRow,
    pub groups: Vec<CompareGroup<'a>>,
}

static NULL: Value = Value::Null;

/// Rows for a side-by-side view of two programs, grouped by subgroup in
/// catalog order. With `diff_only`, rows whose values normalize equal are
/// dropped and emptied subgroups disappear with them. Returns `None` when
/// either id matches no program: an empty selection, not an error.
pub fn compare<'a>(
    snapshot: &'a Snapshot,
    left_id: &str,
    right_id: &str,
    diff_only: bool,
) -> Option<Comparison<'a>> {
    let left = snapshot.programs.iter().find(|p| p.program_id == left_id)?;
    let right = snapshot.programs.iter().find(|p| p.program_id == right_id)?;

    let left_values = values_for(snapshot, left_id);
    let right_values = values_for(snapshot, right_id);

    let mut groups: Vec<CompareGroup> = Vec::new();
    for param in &snapshot.params {
        let key = param.param_key.as_str();
        let lv = left_values.get(key).copied().unwrap_or(&NULL);
        let rv = right_values.get(key).copied().unwrap_or(&NULL);

        let differs = is_different(lv, rv);
        if diff_only && !differs {
            continue;
        }

        let row = CompareRow { param, left: lv, right: rv, differs };
        let subgroup = param.subgroup.clone().unwrap_or_default();
        match groups.last_mut() {
            Some(group) if group.subgroup == subgroup => group.rows.push(row),
            _ => groups.push(CompareGroup { subgroup, rows: vec![row] }),
        }
    }

    Some(Comparison { left, right, groups })
}

/// param_key -> value for one program. At most one value per key is kept;
/// a later duplicate within the relation wins, matching build order.
fn values_for<'a>(snapshot: &'a Snapshot, program_id: &str) -> HashMap<&'a str, &'a Value> {
    snapshot
        .values
        .iter()
        .filter(|v| v.program_id == program_id)
        .map(|v| (v.param_key.as_str(), &v.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawRecord;
    use serde_json::json;

    fn norm(v: Value) -> String {
        normalize_for_compare(&v)
    }

    #[test]
    fn number_formats_collapse() {
        assert_eq!(norm(json!("1 500")), "1500");
        assert_eq!(norm(json!("1500")), "1500");
        assert_eq!(norm(json!("1,500")), "1500");
        assert_eq!(norm(json!("1,500.0")), "1500");
        assert_eq!(norm(json!(1500)), "1500");
    }

    #[test]
    fn decimal_comma_is_a_decimal() {
        assert_eq!(norm(json!("1500,50")), "1500.5");
        assert_eq!(norm(json!("1,5")), "1.5");
        assert_eq!(norm(json!("1,500,000")), "1500000");
    }

    #[test]
    fn currency_noise_is_stripped() {
        assert_eq!(norm(json!("249 000 руб.")), "249000");
        assert_eq!(norm(json!("249000")), "249000");
    }

    #[test]
    fn empty_tokens_equal_true_absence() {
        assert_eq!(norm(json!("—")), "");
        assert_eq!(norm(json!("–")), "");
        assert_eq!(norm(json!("-")), "");
        assert_eq!(norm(json!("Нет данных")), "");
        assert_eq!(norm(json!("N/A")), "");
        assert_eq!(norm(json!("none")), "");
        assert_eq!(norm(json!(null)), "");
        assert_eq!(norm(json!("")), "");
        assert!(!is_different(&json!("—"), &json!(null)));
    }

    #[test]
    fn booleans_map_to_digits() {
        assert_eq!(norm(json!(true)), "1");
        assert_eq!(norm(json!(false)), "0");
    }

    #[test]
    fn text_lowercases() {
        assert_eq!(norm(json!("  Очная  ")), "очная");
        assert!(!is_different(&json!("Очная"), &json!("очная")));
    }

    #[test]
    fn digitless_strings_never_parse_as_numbers() {
        assert_eq!(norm(json!("abc")), "abc");
        assert_eq!(norm(json!(".,-")), ".,-");
    }

    #[test]
    fn malformed_numbers_fall_through_to_text() {
        assert_eq!(norm(json!("12.34.56")), "12.34.56");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(norm(json!("очная   форма\tобучения")), "очная форма обучения");
    }

    #[test]
    fn normalize_is_idempotent() {
        for v in [
            json!("1 500"),
            json!("Нет данных"),
            json!("Очная"),
            json!("1500,50"),
            json!(true),
            json!(null),
            json!("просто текст"),
        ] {
            let once = norm(v);
            let twice = normalize_for_compare(&Value::String(once.clone()));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn is_different_is_reflexive() {
        for v in [json!("x"), json!("—"), json!(42), json!(null), json!(true)] {
            assert!(!is_different(&v, &v));
        }
    }

    // ── compare() over a built snapshot ──

    fn snapshot() -> Snapshot {
        Snapshot::build(vec![
            RawRecord(json!({
                "Program": { "Code": "01", "Title": "Экономика", "Form": "Очная", "Level": "Бакалавриат" },
                "Sovokupnost": { "Price": "249 000", "Year": "2025" }
            })),
            RawRecord(json!({
                "Program": { "Code": "02", "Title": "Юриспруденция", "Form": "Очно-заочная", "Level": "Бакалавриат" },
                "Sovokupnost": { "Price": "249000", "Year": "2025" }
            })),
        ])
    }

    #[test]
    fn groups_follow_catalog_order() {
        let snap = snapshot();
        let cmp = compare(&snap, "01", "02", false).unwrap();
        let names: Vec<&str> = cmp.groups.iter().map(|g| g.subgroup.as_str()).collect();
        assert_eq!(
            names,
            vec!["О программе", "Стоимость и места", "Поступление и конкурс"]
        );
        let total: usize = cmp.groups.iter().map(|g| g.rows.len()).sum();
        assert_eq!(total, snap.params.len());
    }

    #[test]
    fn diff_only_hides_formatting_noise() {
        let snap = snapshot();
        let cmp = compare(&snap, "01", "02", true).unwrap();

        let keys: Vec<&str> = cmp
            .groups
            .iter()
            .flat_map(|g| &g.rows)
            .map(|r| r.param.param_key.as_str())
            .collect();

        // Prices differ only in spacing and years are identical, so both
        // disappear; the delivery form and its derived deferral remain.
        assert!(!keys.contains(&"price"));
        assert!(!keys.contains(&"year"));
        assert_eq!(keys, vec!["form", "army_deferral"]);
        for row in cmp.groups.iter().flat_map(|g| &g.rows) {
            assert!(row.differs);
        }
    }

    #[test]
    fn identical_pair_diff_only_is_empty() {
        let snap = snapshot();
        let cmp = compare(&snap, "01", "01", true).unwrap();
        assert!(cmp.groups.is_empty());
    }

    #[test]
    fn unknown_id_yields_no_comparison() {
        let snap = snapshot();
        assert!(compare(&snap, "01", "99", false).is_none());
        assert!(compare(&snap, "99", "01", false).is_none());
    }

    #[test]
    fn missing_value_rows_read_as_absent() {
        let mut snap = snapshot();
        snap.values.retain(|v| !(v.program_id == "01" && v.param_key == "price"));
        let cmp = compare(&snap, "01", "02", false).unwrap();
        let price = cmp
            .groups
            .iter()
            .flat_map(|g| &g.rows)
            .find(|r| r.param.param_key == "price")
            .unwrap();
        // Left price row is gone entirely; right is "249000".
        assert!(price.differs);
        assert!(price.left.is_null());
    }
}
