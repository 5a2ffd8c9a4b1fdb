use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "charm",
    version,
    about = "Attach resources to charms and bundles in the charm store",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a file or register an image as a new resource revision
    Attach {
        #[arg(help = "Charm or bundle id (e.g. cs:~bob/wordpress)")]
        artifact_id: String,

        #[arg(help = "Resource to attach, as name=filename or name=image-reference")]
        resource: String,

        #[arg(long, help = "Path of the upload-id cache used to resume uploads")]
        upload_cache: Option<PathBuf>,

        #[arg(long, help = "Always start a fresh upload")]
        no_resume: bool,

        #[arg(long, help = "Store credentials as user:passwd")]
        auth: Option<String>,

        #[arg(short, long, help = "Suppress progress and informational output")]
        quiet: bool,
    },

    /// List the resources an artifact declares
    ListResources {
        #[arg(help = "Charm or bundle id (e.g. cs:~bob/wordpress)")]
        artifact_id: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Tabular)]
        format: OutputFormat,

        #[arg(long, help = "Store credentials as user:passwd")]
        auth: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Tabular,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_attach() {
        let cli = Cli::try_parse_from([
            "charm",
            "attach",
            "cs:wordpress",
            "website=./site.tgz",
            "--no-resume",
            "-q",
        ])
        .unwrap();

        match cli.command {
            Commands::Attach {
                artifact_id,
                resource,
                no_resume,
                quiet,
                upload_cache,
                auth,
            } => {
                assert_eq!(artifact_id, "cs:wordpress");
                assert_eq!(resource, "website=./site.tgz");
                assert!(no_resume);
                assert!(quiet);
                assert!(upload_cache.is_none());
                assert!(auth.is_none());
            }
            Commands::ListResources { .. } => panic!("expected attach"),
        }
    }

    #[test]
    fn test_list_resources_defaults_to_tabular() {
        let cli = Cli::try_parse_from(["charm", "list-resources", "mysql"]).unwrap();
        match cli.command {
            Commands::ListResources { format, .. } => assert_eq!(format, OutputFormat::Tabular),
            Commands::Attach { .. } => panic!("expected list-resources"),
        }
    }
}
