use crate::error::{RecordError, Result};
use locator_geo::{format_zip_code, split_codes};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept strings, numbers and booleans as text; `null` and blanks become `None`.
fn flexible_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    };
    Ok(text.filter(|s| !s.trim().is_empty()))
}

/// Spreadsheet checkboxes arrive as booleans, numbers or words.
pub fn parse_boolean_like(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "oui" | "1" | "checked"
        ),
        _ => false,
    }
}

fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(parse_boolean_like))
}

/// A row of the backing spreadsheet.
///
/// Only `id` is guaranteed; every other field may be absent. A record without
/// `ZipCode`/`Dept` simply contributes no geography.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "flexible_string")]
    pub id: Option<String>,
    #[serde(rename = "createTime", default, deserialize_with = "flexible_string")]
    pub create_time: Option<String>,
    #[serde(rename = "Author", default, deserialize_with = "flexible_string")]
    pub author: Option<String>,
    #[serde(rename = "ZipCode", default, deserialize_with = "flexible_string")]
    pub zip_code: Option<String>,
    #[serde(rename = "Dept", default, deserialize_with = "flexible_string")]
    pub dept: Option<String>,
    #[serde(rename = "CommuneName", default, deserialize_with = "flexible_string")]
    pub commune_name: Option<String>,
    #[serde(rename = "Contact", default, deserialize_with = "flexible_string")]
    pub contact: Option<String>,
    #[serde(rename = "Mode", default, deserialize_with = "flexible_string")]
    pub mode: Option<String>,
    #[serde(rename = "ContactMode", default, deserialize_with = "flexible_string")]
    pub contact_mode: Option<String>,
    #[serde(rename = "Unfilled", default, deserialize_with = "flexible_string")]
    pub unfilled: Option<String>,
    #[serde(rename = "LinkToPost", default, deserialize_with = "flexible_string")]
    pub link_to_post: Option<String>,
    #[serde(
        rename = "LinkToUpdateRecord",
        alias = "LinkToUpdate",
        default,
        deserialize_with = "flexible_string"
    )]
    pub link_to_update: Option<String>,
    #[serde(rename = "AccessICAD", default, deserialize_with = "flexible_bool")]
    pub access_icad: bool,
    #[serde(rename = "IsOrganisation", default, deserialize_with = "flexible_bool")]
    pub is_organisation: bool,
    #[serde(rename = "Tel", default, deserialize_with = "flexible_string")]
    pub tel: Option<String>,
    #[serde(rename = "Email", default, deserialize_with = "flexible_string")]
    pub email: Option<String>,
    #[serde(rename = "Notes", default, deserialize_with = "flexible_string")]
    pub notes: Option<String>,
    #[serde(rename = "Uid", default, deserialize_with = "flexible_string")]
    pub uid: Option<String>,
    #[serde(rename = "DuplicateGroup", default, deserialize_with = "flexible_string")]
    pub duplicate_group: Option<String>,
    #[serde(rename = "LastVerificationDate", default, deserialize_with = "flexible_string")]
    pub last_verification_date: Option<String>,
    #[serde(rename = "VerificationStatus", default, deserialize_with = "flexible_string")]
    pub verification_status: Option<String>,
    #[serde(rename = "IsPotentialDuplicate", default, deserialize_with = "flexible_bool")]
    pub is_potential_duplicate: bool,
}

impl Record {
    /// Validate one raw row. The identifier falls back to `Uid`, then to the row index.
    pub fn from_value(value: Value, row: usize) -> Result<Self> {
        if !value.is_object() {
            return Err(RecordError::InvalidRow {
                row,
                reason: format!("expected an object, got {}", type_name(&value)),
            });
        }
        let mut record: Record =
            serde_json::from_value(value).map_err(|err| RecordError::InvalidRow {
                row,
                reason: err.to_string(),
            })?;
        if record.id.is_none() {
            record.id = Some(record.uid.clone().unwrap_or_else(|| format!("row-{row}")));
        }
        Ok(record)
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Postal codes listed in `ZipCode`, with truncated codes repaired.
    pub fn zip_codes(&self) -> Vec<String> {
        self.zip_code
            .as_deref()
            .map(split_codes)
            .unwrap_or_default()
            .iter()
            .map(|code| format_zip_code(code))
            .collect()
    }

    /// Raw department codes listed in `Dept`.
    pub fn dept_codes(&self) -> Vec<String> {
        self.dept.as_deref().map(split_codes).unwrap_or_default()
    }

    /// Whether the record carries the special access flag.
    pub fn has_access(&self) -> bool {
        self.access_icad
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a JSON array of rows into records.
pub fn parse_records(value: Value) -> Result<Vec<Record>> {
    let Value::Array(rows) = value else {
        return Err(RecordError::Other(format!(
            "expected an array of records, got {}",
            type_name(&value)
        )));
    };
    rows.into_iter()
        .enumerate()
        .map(|(row, value)| Record::from_value(value, row))
        .collect()
}
