use image_search::{
    config::Config,
    embedding,
    images::ImageDir,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    tracing::info!("Loaded config: {:?}", config);

    let embedder = embedding::from_config(&config.embedder)?;
    let images = ImageDir::open(&config.image_dir)?;
    tracing::info!("Storing images under {}", images.root().display());

    let state = AppState::new(embedder, images);
    server::serve(state, config.bind_addr, config.max_upload_bytes).await?;

    Ok(())
}
