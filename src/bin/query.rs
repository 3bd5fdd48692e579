use std::path::PathBuf;

use image_search::{client::SearchClient, server::DEFAULT_K};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .ok_or("usage: query <image> [k]")?;
    let k = match args.next() {
        Some(k) => k.parse()?,
        None => DEFAULT_K,
    };

    let client = SearchClient::from_env();
    let hits = client.search(&path, k).await?;

    if hits.is_empty() {
        println!("No stored images yet");
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>3}. {:.6}  {}", rank, hit.distance, hit.path.display());
    }

    Ok(())
}
