use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use batmon::cli::{self, Command, GlobalOptions};
use batmon::config::env;
use batmon::BatmonError;

fn main() {
    // Values from the env file must be visible to clap's env fallbacks.
    let env_file = env::env_file_path();
    let loaded = env::load_process_env(&env_file);

    let command = cli::parse();

    if let Err(err) = init_tracing(&command.global) {
        eprintln!("open log file: {}", err);
        std::process::exit(1);
    }
    match loaded {
        Ok(Some(path)) => tracing::debug!("Loaded env file {}", path.display()),
        Ok(None) => tracing::trace!("No env file at {}", env_file.display()),
        Err(err) => tracing::warn!("Load env file {}: {}", env_file.display(), err),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .on_thread_start(|| tracing::trace!("thread start"))
        .on_thread_stop(|| tracing::trace!("thread stop"))
        .enable_io()
        .enable_time()
        .build();
    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("build runtime: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(command)) {
        match &err {
            BatmonError::NoBatteries => eprintln!("no batteries found"),
            // The child already reported on its own stderr.
            BatmonError::ChildExited { .. } => {}
            _ => eprintln!("{}", err),
        }
        std::process::exit(err.exit_code());
    }
}

async fn run(command: cli::BatmonCommand) -> batmon::Result<()> {
    let cli::BatmonCommand { global, command } = command;

    match command {
        Command::Scan(scan) => scan.run(initializer(&global).await?).await,
        Command::Poll(poll) => poll.run(initializer(&global).await?).await,
        Command::Monitor(monitor) => monitor.run(initializer(&global).await?).await,
        Command::Exec(exec) => exec.run().await,
    }
}

async fn initializer(global: &GlobalOptions) -> batmon::Result<batmon::config::Initializer> {
    cli::load_initializer(global.config.as_deref()).await
}

fn init_tracing(global: &GlobalOptions) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_env(env::LOG_DIRECTIVE).unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_target(true)
        .with_timer(ChronoLocal::rfc_3339())
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    let file = match &global.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(global.log_append)
                .truncate(!global.log_append)
                .open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}
