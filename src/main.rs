use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    socratic_lib::cli::run(socratic_lib::cli::Cli::parse()).await
}
