mod backend_kind;
mod cli;
mod commands;
mod confirm;
mod error;
mod logging;
mod render;
mod settings;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use toolup_platform::AppPaths;

use crate::cli::{Cli, Command};
use crate::commands::Context;
use crate::error::AppError;
use crate::settings::AppSettings;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            // Help and version go to stdout and are not failures.
            return if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("toolup: cannot start the async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    // A prompt abandoned on Ctrl-C still owns a blocking stdin read.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            logging::init_logging(cli.verbose, None, 0);
            return Err(error.into());
        }
    };
    let settings = AppSettings::load(&paths.settings_file());
    logging::init_logging(cli.verbose, Some(&paths.log_file()), settings.max_log_size_bytes);
    paths
        .ensure_dirs()
        .map_err(|source| AppError::io("create application directories", source))?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .user_agent(format!("toolup/{}", env!("CARGO_PKG_VERSION")))
        .build()?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; remaining backends will be left untouched");
            interrupt.cancel();
        }
    });

    let ctx = Context {
        paths,
        settings,
        http_client,
        cancel,
    };

    let output = match &cli.command {
        Command::Update(args) => {
            info!("Starting update of {:?}", args.selected());
            render::summary(&commands::update::run(&ctx, args).await)
        }
        Command::Verify => render::verify(&commands::verify::run(&ctx).await),
        Command::Versions => render::versions(&commands::versions::run(&ctx).await),
    };
    print!("{output}");
    Ok(())
}
