use crate::composite::CompositeSource;
use crate::credentials::{CredentialPrompt, Credentials, EnvPrompt};
use crate::error::Result;
use crate::resolve::ProductResolver;
use crate::search::{ProductRecord, SearchPaginator, SearchQuery};
use crate::token::TokenProvider;
use futures_util::stream::{Stream, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const TOKEN_API: &str = "https://api.eumetsat.int/token";
const SEARCH_API: &str = "https://api.eumetsat.int/data/search-products/os";
const DOWNLOAD_API: &str = "https://api.eumetsat.int/data/download";

/// The three Data Store services a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token: Url,
    pub search: Url,
    pub download: Url,
}

impl Endpoints {
    /// The public API at https://api.eumetsat.int/.
    pub fn eumetsat() -> Result<Self> {
        Ok(Self {
            token: Url::parse(TOKEN_API)?,
            search: Url::parse(SEARCH_API)?,
            download: Url::parse(DOWNLOAD_API)?,
        })
    }

    /// Same paths as the public API, served from another host (a proxy or a test server).
    pub fn with_base(base: &str) -> Result<Self> {
        let base = Url::parse(base)?;
        Ok(Self {
            token: base.join("token")?,
            search: base.join("data/search-products/os")?,
            download: base.join("data/download")?,
        })
    }
}

/// Searches the catalogue and turns the matches into lazily downloaded products.
///
/// One token provider is shared by every search page and every product the client resolves.
#[derive(Debug, Clone)]
pub struct Client {
    token: Arc<TokenProvider>,
    paginator: SearchPaginator,
    resolver: ProductResolver,
}

impl Client {
    pub fn new(credentials: Credentials, endpoints: Endpoints) -> Self {
        let http = reqwest::Client::new();
        let token = Arc::new(TokenProvider::new(
            http.clone(),
            endpoints.token,
            credentials,
        ));
        let paginator = SearchPaginator::new(http, endpoints.search, Arc::clone(&token));
        let resolver = ProductResolver::new(endpoints.download, Arc::clone(&token));
        Self {
            token,
            paginator,
            resolver,
        }
    }

    pub fn from_rcfile<P: AsRef<Path>>(path: P, endpoints: Endpoints) -> Result<Self> {
        let credentials = Credentials::read(path)?;
        Ok(Self::new(credentials, endpoints))
    }

    /// Build a client from the rc file at `path`.
    ///
    /// If the file is missing or unusable, `prompt` is asked for credentials once; they are
    /// saved to `path` and construction is attempted a second and last time.
    pub fn connect<P: AsRef<Path>>(
        path: P,
        endpoints: Endpoints,
        prompt: &impl CredentialPrompt,
    ) -> Result<Self> {
        let path = path.as_ref();
        match Self::from_rcfile(path, endpoints.clone()) {
            Err(e) if e.is_config() => {
                warn!("{e}");
                let credentials = prompt.acquire()?;
                credentials.write(path)?;
                info!(path = %path.display(), "credentials saved");
                Self::from_rcfile(path, endpoints)
            }
            result => result,
        }
    }

    pub fn token(self: &Self) -> &Arc<TokenProvider> {
        &self.token
    }

    /// Lazy stream of the records matching `query`.
    pub fn features(self: &Self, query: SearchQuery) -> impl Stream<Item = Result<ProductRecord>> {
        self.paginator.search(query)
    }

    /// Search, then resolve every match into a lazy resource.
    ///
    /// The search runs to completion first; if any page fails no composite is returned.
    pub async fn products(self: &Self, query: SearchQuery) -> Result<CompositeSource> {
        let resources = self
            .features(query)
            .map_ok(|record| self.resolver.lazy(&record))
            .try_collect::<Vec<_>>()
            .await?;
        info!(products = resources.len(), "resolved products");
        Ok(CompositeSource::aggregate(resources))
    }
}

/// Retrieve `query` using the credentials in the default rc file, falling back to the
/// `EUMETSAT_CONSUMER_KEY`/`EUMETSAT_CONSUMER_SECRET` environment variables.
pub async fn retrieve(query: SearchQuery) -> Result<CompositeSource> {
    let client = Client::connect(
        Credentials::default_path()?,
        Endpoints::eumetsat()?,
        &EnvPrompt,
    )?;
    client.products(query).await
}
