use anyhow::Result;
use ada::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
