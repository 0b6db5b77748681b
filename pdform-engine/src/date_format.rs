use once_cell::sync::Lazy;
use pdform_core::form::DateFormat;
use regex::Regex;

const EUROPEAN_TOKENS: [&str; 6] = ["european", "euro", "eu", "uk", "dmy", "ddmmyyyy"];
const ISO_TOKENS: [&str; 3] = ["iso", "ymd", "yyyymmdd"];
const US_TOKENS: [&str; 5] = ["us", "usa", "american", "mdy", "mmddyyyy"];

static ISO_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("valid ISO date pattern"));
static SLASHED_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/\d{4}$").expect("valid slashed date pattern")
});
static DOTTED_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}$").expect("valid dotted date pattern"));
static MONTH_NAME_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{3,9}\.? \d{1,2}, \d{4}$").expect("valid month-name date pattern")
});

/// 根据字段名与已有取值推断日期格式。全函数：无法识别时返回默认的 `MM/DD/YYYY`。
///
/// 字段名优先于取值：名称中的地区标记（如 `european`、`iso`、`us`）
/// 或 `dd`/`mm`/`yyyy` 的先后顺序直接决定格式。
pub fn infer_date_format(name: &str, value: &str) -> DateFormat {
    infer_from_name(name)
        .or_else(|| infer_from_value(value))
        .unwrap_or_default()
}

fn infer_from_name(name: &str) -> Option<DateFormat> {
    let tokens: Vec<String> = name
        .split(['_', '-', '.', ' '])
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();

    let has_any = |table: &[&str]| tokens.iter().any(|token| table.contains(&token.as_str()));
    if has_any(&EUROPEAN_TOKENS) {
        return Some(DateFormat::DayMonthYear);
    }
    if has_any(&ISO_TOKENS) {
        return Some(DateFormat::Iso);
    }
    if has_any(&US_TOKENS) {
        return Some(DateFormat::MonthDayYear);
    }

    let position = |needle: &str| tokens.iter().position(|token| token == needle);
    let day = position("dd");
    let month = position("mm");
    let year = position("yyyy");
    match (year, day, month) {
        (Some(y), _, Some(m)) if y < m => Some(DateFormat::Iso),
        (_, Some(d), Some(m)) if d < m => Some(DateFormat::DayMonthYear),
        (_, Some(d), Some(m)) if m < d => Some(DateFormat::MonthDayYear),
        _ => None,
    }
}

fn infer_from_value(value: &str) -> Option<DateFormat> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if ISO_VALUE.is_match(value) {
        return Some(DateFormat::Iso);
    }
    if let Some(captures) = SLASHED_VALUE.captures(value) {
        let first: u32 = captures[1].parse().ok()?;
        let second: u32 = captures[2].parse().ok()?;
        // 两段都不超过 12 时无法区分，交给默认格式
        return if first > 12 {
            Some(DateFormat::DayMonthYear)
        } else if second > 12 {
            Some(DateFormat::MonthDayYear)
        } else {
            None
        };
    }
    if DOTTED_VALUE.is_match(value) {
        return Some(DateFormat::DayMonthYear);
    }
    if MONTH_NAME_VALUE.is_match(value) {
        return Some(DateFormat::MonthNameDayYear);
    }
    None
}
