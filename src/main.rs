use std::path::Path;
use std::process::ExitCode;

use sqlsync::cli::{Cli, Commands, SourceArgs};
use sqlsync::commands::{execute_generate, execute_status, print_generate_summary, print_status_summary};
use sqlsync::config::SqlsyncConfig;
use sqlsync::error::{format_error_chain, suggest_fix, Result};
use sqlsync::logging::{self, output};
use sqlsync::output::CliOutputHandler;

fn config_for(source: SourceArgs) -> Result<SqlsyncConfig> {
    let config_file = SqlsyncConfig::load_from_file()?;
    Ok(SqlsyncConfig::merge_with_cli(
        config_file,
        source.migrations_dir,
        source.state_file,
        source.sections,
    ))
}

fn run(command: Commands) -> Result<()> {
    let root = Path::new(".");
    let handler = CliOutputHandler;

    match command {
        Commands::Init => {
            let path = SqlsyncConfig::write_sample_config(root)?;
            output::success(format!("Wrote {}", path.display()));
            output::info("Rename it to sqlsync.toml and adjust the sections");
        }
        Commands::Status { source } => {
            let config = config_for(source)?;
            let result = execute_status(root, &config, &handler)?;
            print_status_summary(&result);
        }
        Commands::Generate { name, source } => {
            let config = config_for(source)?;
            let result = execute_generate(root, &config, &name, &handler)?;
            print_generate_summary(&result);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            sqlsync::log_error!(e);
            output::error(format_error_chain(&e));
            if let Some(suggestion) = suggest_fix(&e) {
                output::header("Suggestion");
                println!("{}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}
