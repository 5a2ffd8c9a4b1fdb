use anyhow::Result;
use charmstore_client::{cli, commands, ui};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        ui::error(&format!("Fatal error: {panic_info}"));
        std::process::exit(1);
    }));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() == 1 {
        let mut cmd = cli::Cli::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    }

    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    print!("{e}");
                    std::process::exit(0);
                }
                _ => {
                    ui::error(&e.to_string());
                    std::process::exit(2);
                }
            }
        }
    };

    let result = match cli.command {
        cli::Commands::Attach {
            artifact_id,
            resource,
            upload_cache,
            no_resume,
            auth,
            quiet,
        } => {
            commands::attach::execute(commands::attach::AttachArgs {
                artifact_id,
                resource,
                upload_cache,
                no_resume,
                auth,
                quiet,
                verbose: cli.verbose,
            })
            .await
        }
        cli::Commands::ListResources {
            artifact_id,
            format,
            auth,
        } => commands::list_resources::execute(artifact_id, format, auth, cli.verbose).await,
    };

    handle_result(result)
}

fn handle_result(result: Result<()>) -> Result<()> {
    let Err(e) = result else {
        return Ok(());
    };

    if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
        if io_err.kind() == std::io::ErrorKind::BrokenPipe {
            ui::error("Connection interrupted");
            std::process::exit(141);
        }
    }

    ui::error(&format!("{e:#}"));
    std::process::exit(1);
}
