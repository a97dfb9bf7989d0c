mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    match args.command {
        Command::Build {
            source,
            output,
            root_name,
        } => {
            let stats = commands::build(&source, &output, &root_name)?;
            println!(
                "wrote {:?}: {} sectors used, {} free",
                output, stats.used, stats.free
            );
        }
        Command::Ls { image } => commands::ls(&image, &mut std::io::stdout().lock())?,
        Command::Extract { image, dest } => commands::extract(&image, &dest)?,
    }

    Ok(())
}
