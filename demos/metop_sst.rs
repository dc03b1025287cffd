use anyhow::Result;
use std::path::PathBuf;

extern crate eumetsat_datastore;
use eumetsat_datastore::request::{metop_sst_template, RetrievalRequest};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let output_dir = PathBuf::from("./outputs/metop_sst");

    let request = RetrievalRequest::from_template(&metop_sst_template())?;

    let source = eumetsat_datastore::retrieve(request.to_query()).await?;
    println!(
        "{} products, {} bytes declared",
        source.len(),
        source.total_declared_size()
    );

    let _ = source.plan(&output_dir).write(output_dir.join("download_plan.json"))?;

    let _ = source.download_all(&output_dir, 4).await?;

    Ok(())
}
