use clap::Parser;
use importer_function::{commands, logging, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.debug, cli.log_format);

    match cli.command {
        Command::Run(args) => commands::run(&args).await,
        Command::ValidateInput(args) => {
            let summary = commands::validate_input(&args)?;
            print!("{summary}");
            Ok(())
        }
    }
}
