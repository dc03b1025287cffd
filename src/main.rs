use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use eumetsat_datastore::credentials::{Credentials, EnvPrompt, RC_ENV};
use eumetsat_datastore::request::RetrievalRequest;
use eumetsat_datastore::{Client, Endpoints, SearchQuery};
use futures_util::TryStreamExt;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Search and download EUMETSAT Data Store products")]
struct Cli {
    /// Credentials file (defaults to ~/.eumetsatapirc)
    #[arg(long, global = true, env = RC_ENV)]
    rcfile: Option<PathBuf>,

    /// Serve all API calls from this base URL instead of https://api.eumetsat.int/
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Collection identifier, e.g. EO:EUM:DAT:METOP:GLB-SST-NC
    collection: Option<String>,

    /// Read collection, dates and polygon from a TOML request file
    #[arg(long, conflicts_with = "collection")]
    request: Option<PathBuf>,

    #[arg(long)]
    start: Option<String>,

    #[arg(long)]
    end: Option<String>,

    /// Polygon vertex as "x,y"; repeat for each vertex
    #[arg(long = "point", value_parser = parse_point)]
    polygon: Vec<(f64, f64)>,
}

#[derive(Subcommand)]
enum Command {
    /// List the products matching a search
    Search(SearchArgs),

    /// Download the products matching a search
    Retrieve {
        #[command(flatten)]
        search: SearchArgs,

        #[arg(long, default_value = "./outputs")]
        output: PathBuf,

        /// Number of parallel downloads
        #[arg(long, default_value_t = 4)]
        jobs: usize,

        /// Write the download plan as JSON to this file
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Stop after resolving the products
        #[arg(long)]
        dry_run: bool,
    },

    /// Save API credentials to the rc file
    Credentials {
        #[arg(long)]
        key: String,

        #[arg(long)]
        secret: String,
    },
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'x,y', got '{s}'"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("{v}: {e}"));
    Ok((parse(x)?, parse(y)?))
}

impl SearchArgs {
    fn to_query(self: &Self) -> Result<SearchQuery> {
        let mut request = match (&self.request, &self.collection) {
            (Some(path), _) => RetrievalRequest::read(path)?,
            (None, Some(collection)) => RetrievalRequest::new(collection),
            (None, None) => return Err(anyhow!("Either a collection or --request is required")),
        };
        if self.start.is_some() {
            request.start_date = self.start.clone();
        }
        if self.end.is_some() {
            request.end_date = self.end.clone();
        }
        if !self.polygon.is_empty() {
            request.polygon = Some(self.polygon.iter().map(|&(x, y)| [x, y]).collect());
        }
        Ok(request.to_query())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let rcfile = match cli.rcfile {
        Some(path) => path,
        None => Credentials::default_path()?,
    };
    let endpoints = match &cli.api_base {
        Some(base) => Endpoints::with_base(base)?,
        None => Endpoints::eumetsat()?,
    };

    match cli.command {
        Command::Credentials { key, secret } => {
            Credentials::new(key, secret).write(&rcfile)?;
            println!("Credentials saved to {}", rcfile.display());
        }
        Command::Search(search) => {
            let client = Client::connect(&rcfile, endpoints, &EnvPrompt)?;
            let records = client.features(search.to_query()?);
            futures_util::pin_mut!(records);

            let mut count = 0;
            while let Some(record) = records.try_next().await? {
                println!("{}\t{}", record.identifier, record.size_kib.saturating_mul(1024));
                count += 1;
            }
            println!("{count} products");
        }
        Command::Retrieve {
            search,
            output,
            jobs,
            plan,
            dry_run,
        } => {
            let client = Client::connect(&rcfile, endpoints, &EnvPrompt)?;
            let source = client.products(search.to_query()?).await?;
            println!(
                "{} products, {} bytes declared",
                source.len(),
                source.total_declared_size()
            );

            if let Some(path) = plan {
                source.plan(&output).write(&path)?;
                println!("Download plan written to {}", path.display());
            }
            if !dry_run {
                let paths = source.download_all(&output, jobs).await?;
                println!("{} files in {}", paths.len(), output.display());
            }
        }
    }

    Ok(())
}
