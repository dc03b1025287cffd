use crate::resource::LazyResource;
use crate::search::ProductRecord;
use crate::token::TokenProvider;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use url::Url;

/// Characters left alone when quoting identifiers into the download path.
const IDENTIFIER: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Content-encoding override that turns off the declared length check.
pub const UNKNOWN_ENCODING: &str = "unknown";

/// Everything needed to fetch one product later on.
///
/// `auth` is the live provider rather than a header value: the fetch may happen long
/// after the descriptor was built, by which time the token has rotated.
#[derive(Debug, Clone)]
pub struct DownloadDescriptor {
    pub identifier: String,
    pub url: Url,
    pub auth: Arc<TokenProvider>,
    /// Bytes, as declared by the catalogue. Only accurate to the KiB.
    pub content_length: u64,
    pub content_encoding: Option<String>,
}

impl DownloadDescriptor {
    pub fn verifies_length(self: &Self) -> bool {
        self.content_encoding.as_deref() != Some(UNKNOWN_ENCODING)
    }

    /// Identifier made safe for use as a local file name.
    pub fn file_name(self: &Self) -> String {
        self.identifier
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
                _ => '_',
            })
            .collect()
    }
}

/// Turns search records into download descriptors. Nothing is fetched here.
#[derive(Debug, Clone)]
pub struct ProductResolver {
    download_base: Url,
    token: Arc<TokenProvider>,
}

impl ProductResolver {
    pub fn new(download_base: Url, token: Arc<TokenProvider>) -> Self {
        Self {
            download_base,
            token,
        }
    }

    pub fn resolve(self: &Self, record: &ProductRecord) -> DownloadDescriptor {
        let collection = utf8_percent_encode(&record.parent_identifier, IDENTIFIER);
        let product = utf8_percent_encode(&record.identifier, IDENTIFIER);

        let mut url = self.download_base.clone();
        let path = format!(
            "{}/collections/{collection}/products/{product}",
            self.download_base.path().trim_end_matches('/')
        );
        url.set_path(&path);

        DownloadDescriptor {
            identifier: record.identifier.clone(),
            url,
            auth: Arc::clone(&self.token),
            // The download service does not answer HEAD requests, so the catalogue size
            // (in KiB) stands in for Content-Length
            content_length: record.size_kib.saturating_mul(1024),
            content_encoding: Some(UNKNOWN_ENCODING.to_string()),
        }
    }

    /// Resolve `record` and wrap it as a resource that is fetched on first access.
    pub fn lazy(self: &Self, record: &ProductRecord) -> LazyResource {
        LazyResource::new(self.resolve(record))
    }
}
