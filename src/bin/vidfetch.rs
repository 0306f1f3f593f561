//! vidfetch CLI - search and batch-download videos from a fetch service.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = vidfetch::cli::run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
