use blockel::cli::Cli;
use blockel::infra::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    blockel::init(&config.log.filter);

    cli.run(&config).await
}
