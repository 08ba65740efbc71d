use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(name = "sqlsync")]
#[command(about = "Declarative schema migrations for PostgreSQL")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity level (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides shared by commands that read the source tree
#[derive(clap::Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceArgs {
    /// Directory receiving generated migration files
    #[arg(long)]
    pub migrations_dir: Option<PathBuf>,

    /// State file holding the snapshot and migration history
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Source directory to scan; repeat for several (replaces configured sections)
    #[arg(long = "section", value_name = "DIR")]
    pub sections: Vec<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Generate a sample configuration file
    Init,

    /// Show which source files changed since the last migration
    Status {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Write a migration for the current changes
    Generate {
        /// Migration name (alphanumerics, underscores, hyphens)
        name: String,

        #[command(flatten)]
        source: SourceArgs,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_command_parsing() {
        let args = vec![
            "sqlsync",
            "-vv",
            "generate",
            "add_users",
            "--migrations-dir", "db/migrations",
            "--section", "sql/tables",
            "--section", "sql/views",
        ];

        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);

        match cli.command {
            Commands::Generate { name, source } => {
                assert_eq!(name, "add_users");
                assert_eq!(source.migrations_dir, Some(PathBuf::from("db/migrations")));
                assert_eq!(source.state_file, None);
                assert_eq!(source.sections, vec![PathBuf::from("sql/tables"), PathBuf::from("sql/views")]);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_status_command_minimal() {
        let cli = Cli::try_parse_from(vec!["sqlsync", "status"]).unwrap();
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Status { source } => assert_eq!(source, SourceArgs::default()),
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_generate_requires_name() {
        assert!(Cli::try_parse_from(vec!["sqlsync", "generate"]).is_err());
    }

    #[test]
    fn test_init_command() {
        let cli = Cli::try_parse_from(vec!["sqlsync", "init", "--verbose"]).unwrap();
        assert!(matches!(cli.command, Commands::Init));
        assert_eq!(cli.verbose, 1);
    }
}
