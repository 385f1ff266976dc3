use clap::Parser as _;
use supervisao_agent::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG and SUPERVISAO_* set there take effect
    dotenvy::dotenv().ok();
    supervisao_agent::init_tracing();

    let cli = Cli::parse();
    if let Err(e) = supervisao_agent::run(cli).await {
        tracing::error!(error = %e, error_chain = ?e, "supervisao-agent failed");
        return Err(e);
    }
    Ok(())
}
