use anyhow::Result;
use clap::Parser;
use cli::args::Cli;
use cli::commands;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let out = commands::run(cli)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", commands::render_text(&out)?);
    }
    Ok(())
}
