//! Paged OpenSearch queries against the Data Store catalogue.
use crate::error::{Error, Result};
use crate::token::{self, TokenProvider};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, TryStreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

pub const PAGE_SIZE: usize = 1000;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// A time bound for a search, either already formatted or a UTC instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateArg {
    Text(String),
    Time(DateTime<Utc>),
}

impl DateArg {
    pub fn render(self: &Self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Time(time) => time.format(DATE_FORMAT).to_string(),
        }
    }
}

impl From<&str> for DateArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for DateArg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<DateTime<Utc>> for DateArg {
    fn from(time: DateTime<Utc>) -> Self {
        Self::Time(time)
    }
}

/// Render points as WKT. The ring is not closed for the caller.
pub fn render_polygon(points: &[(f64, f64)]) -> String {
    let ring = points
        .iter()
        .map(|(x, y)| format!("{x} {y}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("POLYGON(({ring}))")
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub collection: String,
    pub start_date: Option<DateArg>,
    pub end_date: Option<DateArg>,
    pub polygon: Option<Vec<(f64, f64)>>,
}

impl SearchQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            start_date: None,
            end_date: None,
            polygon: None,
        }
    }

    pub fn start(mut self, date: impl Into<DateArg>) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn end(mut self, date: impl Into<DateArg>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    pub fn polygon(mut self, points: Vec<(f64, f64)>) -> Self {
        self.polygon = Some(points);
        self
    }

    /// Query string pairs for the page starting at `offset`.
    pub fn params(self: &Self, offset: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("format", "json".to_string()),
            ("pi", self.collection.clone()),
        ];
        if let Some(start) = &self.start_date {
            params.push(("dtstart", start.render()));
        }
        if let Some(end) = &self.end_date {
            params.push(("dtend", end.render()));
        }
        if let Some(points) = &self.polygon {
            params.push(("geo", render_polygon(points)));
        }
        params.push(("si", offset.to_string()));
        params.push(("c", PAGE_SIZE.to_string()));
        params
    }
}

/// One matched product, as listed by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub identifier: String,
    pub parent_identifier: String,
    /// Size reported by the catalogue, in KiB.
    pub size_kib: u64,
}

#[derive(Deserialize)]
struct SearchPage {
    features: Vec<Feature>,
    #[serde(default, rename = "totalResults")]
    total_results: Option<u64>,
}

#[derive(Deserialize)]
struct Feature {
    properties: Properties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Properties {
    identifier: String,
    parent_identifier: String,
    product_information: ProductInformation,
}

#[derive(Deserialize)]
struct ProductInformation {
    size: u64,
}

impl From<Feature> for ProductRecord {
    fn from(feature: Feature) -> Self {
        let properties = feature.properties;
        Self {
            identifier: properties.identifier,
            parent_identifier: properties.parent_identifier,
            size_kib: properties.product_information.size,
        }
    }
}

/// Walks the pages of a search until the service returns an empty one.
#[derive(Debug, Clone)]
pub struct SearchPaginator {
    http: reqwest::Client,
    endpoint: Url,
    token: Arc<TokenProvider>,
}

impl SearchPaginator {
    pub fn new(http: reqwest::Client, endpoint: Url, token: Arc<TokenProvider>) -> Self {
        Self {
            http,
            endpoint,
            token,
        }
    }

    /// Lazily stream every record matching `query`. Every call starts a new scan at offset 0.
    ///
    /// Pages are fetched one after another; the offset moves forward by the number of
    /// records each page actually contained. A failed page ends the stream with an error.
    pub fn search(self: &Self, query: SearchQuery) -> impl Stream<Item = Result<ProductRecord>> {
        let paginator = self.clone();
        stream::try_unfold((query, 0), move |(query, offset)| {
            paginator.clone().next_page(query, offset)
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
    }

    async fn next_page(
        self,
        query: SearchQuery,
        offset: usize,
    ) -> Result<Option<(Vec<ProductRecord>, (SearchQuery, usize))>> {
        let page = self.fetch_page(&query, offset).await?;
        if page.features.is_empty() {
            debug!(offset, "empty page, search complete");
            return Ok(None);
        }
        if offset == 0 {
            if let Some(total) = page.total_results {
                info!(collection = %query.collection, total, "search matched products");
            }
        }

        let offset = offset + page.features.len();
        let records = page.features.into_iter().map(ProductRecord::from).collect();
        Ok(Some((records, (query, offset))))
    }

    async fn fetch_page(&self, query: &SearchQuery, offset: usize) -> Result<SearchPage> {
        debug!(offset, count = PAGE_SIZE, "fetching search page");
        let request = self.http.get(self.endpoint.clone()).query(&query.params(offset));
        let request = token::authorize(request, self.token.as_ref()).await?;
        let page = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Error::Search)?
            .json::<SearchPage>()
            .await
            .map_err(Error::Search)?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_polygon() {
        let points = vec![(0., 0.), (1., 0.), (1., 1.)];
        assert_eq!(render_polygon(&points), "POLYGON((0 0,1 0,1 1))");
    }

    #[test]
    fn test_render_polygon_fractional() {
        let points = vec![(-10.5, 40.25), (5., 40.25), (5., 60.), (-10.5, 40.25)];
        assert_eq!(
            render_polygon(&points),
            "POLYGON((-10.5 40.25,5 40.25,5 60,-10.5 40.25))"
        );
    }

    #[test]
    fn test_text_date_is_verbatim() {
        let date = DateArg::from("2016-07-23T17:58:00Z");
        assert_eq!(date.render(), "2016-07-23T17:58:00Z");
    }

    #[test]
    fn test_time_date_has_microseconds() {
        let time = Utc.with_ymd_and_hms(2016, 7, 24, 6, 1, 3).unwrap();
        assert_eq!(DateArg::from(time).render(), "2016-07-24T06:01:03.000000Z");
    }

    #[test]
    fn test_dates_render_independently() {
        let end = Utc.with_ymd_and_hms(2016, 7, 24, 6, 1, 3).unwrap();
        let query = SearchQuery::new("EO:EUM:DAT:METOP:GLB-SST-NC")
            .start("2016-07-23T17:58:00Z")
            .end(end);
        let params = query.params(0);
        assert!(params.contains(&("dtstart", "2016-07-23T17:58:00Z".to_string())));
        assert!(params.contains(&("dtend", "2016-07-24T06:01:03.000000Z".to_string())));
    }

    #[test]
    fn test_minimal_params() {
        let params = SearchQuery::new("EO:EUM:DAT:MSG:HRSEVIRI").params(0);
        assert_eq!(
            params,
            vec![
                ("format", "json".to_string()),
                ("pi", "EO:EUM:DAT:MSG:HRSEVIRI".to_string()),
                ("si", "0".to_string()),
                ("c", "1000".to_string()),
            ]
        );
    }

    #[test]
    fn test_page_size_is_fixed() {
        let params = SearchQuery::new("EO:EUM:DAT:MSG:HRSEVIRI").params(2000);
        assert!(params.contains(&("si", "2000".to_string())));
        assert!(params.contains(&("c", "1000".to_string())));
    }

    #[test]
    fn test_record_from_feature() {
        let page: SearchPage = serde_json::from_value(serde_json::json!({
            "type": "FeatureCollection",
            "totalResults": 1,
            "features": [{
                "type": "Feature",
                "id": "a",
                "properties": {
                    "identifier": "product-a",
                    "parentIdentifier": "EO:EUM:DAT:METOP:GLB-SST-NC",
                    "productInformation": { "size": 5, "format": "netCDF" }
                }
            }]
        }))
        .unwrap();

        let record = page.features.into_iter().map(ProductRecord::from).next();
        assert_eq!(
            record,
            Some(ProductRecord {
                identifier: "product-a".to_string(),
                parent_identifier: "EO:EUM:DAT:METOP:GLB-SST-NC".to_string(),
                size_kib: 5,
            })
        );
        assert_eq!(page.total_results, Some(1));
    }
}
