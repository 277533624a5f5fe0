#[tokio::main]
async fn main() {
    if let Err(e) = video_downloader::run().await {
        tracing::error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}
