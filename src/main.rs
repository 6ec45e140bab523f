use clap::Parser;
use mobile_agent::cli::commands::cmd_run;
use mobile_agent::cli::config::{Cli, Commands, load_config};
use mobile_agent::cli::logging;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            let completed = cmd_run(&args, &config)?;
            if !completed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
