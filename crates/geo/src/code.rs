//! Postal and department code conventions.
//!
//! Department-mode codes are carried as the department code followed by
//! [`DEPARTMENT_SUFFIX`] (`"75"` → `"75000"`, `"2A"` → `"2A000"`), so postal and
//! department codes can share one code space.

use std::borrow::Cow;

/// Suffix appended to a department code to turn it into a department-mode code.
pub const DEPARTMENT_SUFFIX: &str = "000";

const CORSICA_CODES: &[&str] = &["2A", "2B"];
const OVERSEAS_PREFIXES: &[&str] = &["971", "972", "973", "974", "975", "976"];

/// `true` for the two-letter Corsica department codes.
pub fn is_corsica(code: &str) -> bool {
    CORSICA_CODES
        .iter()
        .any(|corsica| corsica.eq_ignore_ascii_case(code))
}

/// Strip leading zeros from a numeric department code (`"01"` → `"1"`).
///
/// Corsica codes are uppercased (`"2a"` → `"2A"`). An all-zero code collapses to `""`.
pub fn normalize_department_code(code: &str) -> Cow<'_, str> {
    if is_corsica(code) {
        return Cow::Owned(code.to_ascii_uppercase());
    }
    Cow::Borrowed(code.trim_start_matches('0'))
}

/// Department equality: numeric codes compare after leading-zero stripping,
/// Corsica codes compare by their uppercase spelling only.
pub fn same_department(a: &str, b: &str) -> bool {
    if is_corsica(a) != is_corsica(b) {
        return false;
    }
    normalize_department_code(a) == normalize_department_code(b)
}

/// Resolve a postal code or a department-mode code to its department code.
///
/// - `"75001"` → `"75"`, `"97411"` → `"974"`
/// - `"75000"`/`"01000"` (suffixed) → `"75"`/`"01"`, `"2A000"` → `"2A"`
///
/// Leading zeros are preserved here; compare results with [`same_department`].
pub fn resolve_department_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }

    if let Some(dept) = code.strip_suffix(DEPARTMENT_SUFFIX) {
        if dept.is_empty() {
            return None;
        }
        return Some(dept.to_string());
    }

    if let Some(prefix) = code.get(..3) {
        if OVERSEAS_PREFIXES.contains(&prefix) {
            return Some(prefix.to_string());
        }
    }

    code.get(..2)
        .or(Some(code))
        .map(|dept| dept.to_string())
}

/// Turn a raw `Dept` field entry into a department-mode code (`"75"` → `"75000"`,
/// `"2a"` → `"2A000"`).
pub fn pad_department_code(dept: &str) -> String {
    let dept = dept.trim();
    if is_corsica(dept) {
        return format!("{}{DEPARTMENT_SUFFIX}", dept.to_ascii_uppercase());
    }
    format!("{dept}{DEPARTMENT_SUFFIX}")
}

/// Keep only ASCII digits.
pub fn extract_digits(code: &str) -> String {
    code.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize a zone member written in a `Dept` field into a department-mode code.
///
/// Bare two-character codes get the suffix; anything else keeps its digits only.
pub fn zone_member_department_code(code: &str) -> String {
    let code = code.trim();
    if is_corsica(code) {
        return pad_department_code(code);
    }
    let digits = extract_digits(code);
    if digits.len() == 2 {
        pad_department_code(&digits)
    } else {
        digits
    }
}

/// Repair postal codes that lost their leading zeros in the spreadsheet.
///
/// 4-digit codes: `"0123"` → `"01230"`, `"1234"` → `"01234"`.
/// 3-digit codes: `"012"` → `"01200"`, `"123"` → `"00123"`.
pub fn format_zip_code(code: &str) -> String {
    let code = code.trim();
    let zero_led = code.starts_with('0');
    match code.chars().count() {
        4 if zero_led => format!("{code}0"),
        4 => format!("0{code}"),
        3 if zero_led => format!("{code}00"),
        3 => format!("00{code}"),
        _ => code.to_string(),
    }
}

/// Split a comma-separated code field, dropping blanks and inner spaces.
pub fn split_codes(field: &str) -> Vec<String> {
    field
        .replace(' ', "")
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}
