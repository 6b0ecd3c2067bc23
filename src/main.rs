use anyhow::Result;
use lib::cli::interface::run_cli_interface;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    run_cli_interface().await?;
    Ok(())
}
