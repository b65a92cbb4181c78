use anyhow::Result;
use clap::Parser;

mod cli;
mod pipeline;

fn main() -> Result<()> {
    cli::Args::parse().run()
}
