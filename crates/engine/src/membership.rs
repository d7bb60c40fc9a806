use locator_geo::{normalize_department_code, pad_department_code, resolve_department_code};
use locator_records::Record;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Which record field drives the geography
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeMode {
    /// `ZipCode`: one city per postal code
    #[default]
    Postal,
    /// `Dept`: one city per department, codes carried as `<dept>000`
    Department,
}

impl CodeMode {
    /// Codes a record lists for this mode, as written in the record.
    pub fn record_codes(&self, record: &Record) -> Vec<String> {
        match self {
            Self::Postal => record.zip_codes(),
            Self::Department => record.dept_codes(),
        }
    }
}

/// Which records list which code, and the deduplicated code list to process.
#[derive(Debug, Clone, Default)]
pub struct CodeMembership {
    mode: CodeMode,
    codes: Vec<String>,
    by_key: HashMap<String, Vec<Arc<Record>>>,
}

fn push_unique(records: &mut Vec<Arc<Record>>, record: &Arc<Record>) {
    if !records.iter().any(|existing| Arc::ptr_eq(existing, record)) {
        records.push(Arc::clone(record));
    }
}

impl CodeMembership {
    pub fn build(records: &[Arc<Record>], mode: CodeMode) -> Self {
        let mut codes = Vec::new();
        let mut seen = HashSet::new();
        let mut by_key: HashMap<String, Vec<Arc<Record>>> = HashMap::new();

        for record in records {
            for raw in mode.record_codes(record) {
                let (code, key) = match mode {
                    CodeMode::Postal => (raw.clone(), raw),
                    CodeMode::Department => (
                        pad_department_code(&raw),
                        normalize_department_code(&raw).to_string(),
                    ),
                };
                if seen.insert(key.clone()) {
                    codes.push(code);
                }
                push_unique(by_key.entry(key).or_default(), record);
            }
        }

        Self {
            mode,
            codes,
            by_key,
        }
    }

    pub fn mode(&self) -> CodeMode {
        self.mode
    }

    /// Unique codes in first-seen order. Department codes are suffixed, and `"1"`
    /// after `"01"` is the same department, so only the first spelling is kept.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Records listing `code`. Department-mode codes match on department equality.
    pub fn records_for(&self, code: &str) -> Vec<Arc<Record>> {
        let key = match self.mode {
            CodeMode::Postal => Some(code.to_string()),
            CodeMode::Department => resolve_department_code(code)
                .map(|dept| normalize_department_code(&dept).to_string()),
        };
        key.and_then(|key| self.by_key.get(&key))
            .cloned()
            .unwrap_or_default()
    }
}
