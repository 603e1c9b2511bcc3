use badspot_predictor::cli::{run, Cli};
use badspot_predictor::error::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
