//! Search the EUMETSAT Data Store and download the matching products.
#![allow(async_fn_in_trait)]
pub mod client;
pub mod composite;
pub mod credentials;
pub mod download_plan;
pub mod error;
pub mod request;
pub mod resolve;
pub mod resource;
pub mod search;
pub mod token;

pub use client::{retrieve, Client, Endpoints};
pub use composite::CompositeSource;
pub use credentials::{CredentialPrompt, Credentials, EnvPrompt};
pub use error::{ConfigError, DownloadError, Error, Result};
pub use resolve::{DownloadDescriptor, ProductResolver};
pub use resource::LazyResource;
pub use search::{DateArg, ProductRecord, SearchPaginator, SearchQuery};
pub use token::{HeaderSource, TokenProvider};
