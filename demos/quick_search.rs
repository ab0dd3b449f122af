use anyhow::{Context, Result};
use futures::TryStreamExt;
use planetapi::{ClientConfig, DataClient, SearchRequest, Sort};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure authentication via PL_API_KEY or `~/.planet.json`.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = DataClient::connect(&ClientConfig::default(), None)
        .await
        .context("failed to authenticate")?;

    let filter = json!({
        "type": "AndFilter",
        "config": [
            {"type": "RangeFilter", "field_name": "cloud_cover", "config": {"lte": 0.1}},
            {"type": "DateRangeFilter", "field_name": "acquired", "config": {"gte": "2024-03-01T00:00:00Z"}}
        ]
    });
    let search = SearchRequest::new(filter, ["PSScene"])
        .with_page_size(50)
        .with_sort(Sort::AcquiredDesc);

    let mut features = Box::pin(client.quick_search(&search, Some(120))?);
    while let Some(feature) = features.try_next().await? {
        println!("{} {}", feature.id, feature.item_type().unwrap_or("?"));
    }

    Ok(())
}
