use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cloud189_checkin::accounts;
use cloud189_checkin::app;
use cloud189_checkin::auth::CacheOnly;
use cloud189_checkin::config::Config;
use cloud189_checkin::push::{ConsoleNotifier, MultiNotifier, Notifier};
use cloud189_checkin::remote::client::HttpSessionFactory;
use cloud189_checkin::remote::transport::ReqwestTransport;
use cloud189_checkin::report::{self, Recorder};

#[derive(Parser)]
#[command(
    name = "cloud189-checkin",
    version,
    about = "Daily Cloud189 sign-in with quota report and push digest"
)]
struct Cli {
    /// Account file (.toml or .json); overrides CLOUD189_ACCOUNTS
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// Sign-in calls per account; overrides EXEC_THRESHOLD
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    threshold: Option<u32>,

    /// Log debug detail (same as CLOUD189_VERBOSE=1)
    #[arg(short, long)]
    verbose: bool,

    /// Print the digest to stdout instead of pushing it
    #[arg(long, env = "CLOUD189_NO_PUSH")]
    no_push: bool,
}

fn init_tracing(cfg: &Config, recorder: &Recorder) {
    // Scope debug to this crate so HTTP internals stay quiet; RUST_LOG wins.
    let default = if cfg.verbose {
        "cloud189_checkin=debug,warn"
    } else {
        "cloud189_checkin=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let file_layer = match report::open_log_file(&cfg.log_file) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            eprintln!("[cloud189-checkin] {e:#}");
            None
        }
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(recorder.layer())
        .init();
}

async fn check_in(cfg: &Config) -> anyhow::Result<()> {
    let accounts = accounts::load(&cfg.accounts_file)?;
    tracing::debug!("loaded {} account(s) from {}", accounts.len(), cfg.accounts_file.display());
    let factory = HttpSessionFactory::new(
        &cfg.base_url,
        cfg.token_dir.clone(),
        Arc::new(ReqwestTransport::new(&cfg.base_url, cfg.timeout_secs)),
        Arc::new(CacheOnly),
    );
    app::run_all(&accounts, &factory, cfg.exec_threshold).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing .env is the normal case.
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let mut cfg = Config::from_env();
    if let Some(path) = cli.accounts {
        cfg.accounts_file = path;
    }
    if let Some(n) = cli.threshold {
        cfg.exec_threshold = usize::try_from(n).unwrap_or(1);
    }
    cfg.verbose |= cli.verbose;

    let recorder = Recorder::new();
    init_tracing(&cfg, &recorder);
    tracing::debug!(?cfg, "configuration");

    let notifier: Box<dyn Notifier> = if cli.no_push {
        Box::new(ConsoleNotifier)
    } else {
        match MultiNotifier::from_config(&cfg.push) {
            Ok(multi) => Box::new(multi),
            Err(e) => {
                eprintln!("[cloud189-checkin] {e:#}, printing digest instead");
                Box::new(ConsoleNotifier)
            }
        }
    };

    let result = app::run_with_report(
        check_in(&cfg),
        &recorder,
        notifier.as_ref(),
        Some(&cfg.log_file),
        app::SETTLE_DELAY,
    )
    .await;
    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
