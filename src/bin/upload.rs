use std::path::PathBuf;

use image_search::client::SearchClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        return Err("usage: upload <image>...".into());
    }

    let client = SearchClient::from_env();

    let mut failed = 0;
    for path in &paths {
        match client.upload(path).await {
            Ok(response) => tracing::info!("{}: {}", response.filename, response.status),
            Err(e) => {
                tracing::error!("Failed to upload {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    tracing::info!("Uploaded {} of {} images", paths.len() - failed, paths.len());

    if failed > 0 {
        return Err(format!("{} uploads failed", failed).into());
    }
    Ok(())
}
