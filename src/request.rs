use crate::search::SearchQuery;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use toml;

/// A retrieval stored as TOML, so that a search window can be replayed later.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RetrievalRequest {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<[f64; 2]>>,
}

/// Night-time METOP sea surface temperature granules of 23-24 July 2016.
pub fn metop_sst_template() -> toml::Table {
    toml::toml! {
        collection = "EO:EUM:DAT:METOP:GLB-SST-NC"
        start_date = "2016-07-23T17:58:00Z"
        end_date = "2016-07-24T06:01:03Z"
    }
}

impl RetrievalRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            start_date: None,
            end_date: None,
            polygon: None,
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let request: Self = toml::from_str(&content)?;
        request.validate()?;
        Ok(request)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let request: Self = toml::from_str(&table.to_string())?;
        request.validate()?;
        Ok(request)
    }

    fn validate(self: &Self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(anyhow!("No collection given"));
        }
        Ok(())
    }

    pub fn to_query(self: &Self) -> SearchQuery {
        let mut query = SearchQuery::new(&self.collection);
        if let Some(start) = &self.start_date {
            query = query.start(start.as_str());
        }
        if let Some(end) = &self.end_date {
            query = query.end(end.as_str());
        }
        if let Some(points) = &self.polygon {
            query = query.polygon(points.iter().map(|&[x, y]| (x, y)).collect());
        }
        query
    }
}
