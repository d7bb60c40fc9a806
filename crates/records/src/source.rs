use crate::error::{RecordError, Result};
use crate::record::{parse_records, Record};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const RECORDS_PATH: &str = "/api/lecteur-puce";

/// Which record set to read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceSelector {
    /// Published records
    #[default]
    FilloutBase,
    /// Records awaiting review
    DraftBase,
}

impl SourceSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilloutBase => "filloutBase",
            Self::DraftBase => "draftBase",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::FilloutBase => Self::DraftBase,
            Self::DraftBase => Self::FilloutBase,
        }
    }
}

impl fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider of record sets. Returns only once the whole set is loaded.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_records(&self, source: SourceSelector) -> Result<Vec<Record>>;
}

/// Reads records from the spreadsheet proxy endpoint
#[derive(Clone)]
pub struct HttpRecordSource {
    client: Client,
    base_url: String,
}

impl HttpRecordSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn records_url(&self) -> String {
        format!("{}{RECORDS_PATH}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch_records(&self, source: SourceSelector) -> Result<Vec<Record>> {
        let response = self
            .client
            .get(self.records_url())
            .query(&[("source", source.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecordError::BadStatus {
                status: status.as_u16(),
                source_name: source.as_str().to_string(),
            });
        }
        let body: serde_json::Value = response.json().await?;
        let records = parse_records(body)?;
        log::info!("Fetched {} records from {source}", records.len());
        Ok(records)
    }
}

/// Record sets held in memory, for embedding hosts and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    sets: HashMap<SourceSelector, Vec<Record>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, source: SourceSelector, records: Vec<Record>) -> Self {
        self.sets.insert(source, records);
        self
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn fetch_records(&self, source: SourceSelector) -> Result<Vec<Record>> {
        self.sets
            .get(&source)
            .cloned()
            .ok_or_else(|| RecordError::Other(format!("no record set named '{source}'")))
    }
}
