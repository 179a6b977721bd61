use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lab_spawner::App;
use lab_spawner::config::AppConfig;
use lab_spawner::hooks::{LoginOutcome, Session};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use workload_placement_sdk::LaunchTarget;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Directory login and workload placement for per-user lab sessions.
#[derive(Parser, Debug)]
#[command(name = "lab-spawner", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter directive, overrides `logging.level`
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate a user and print the resolved identity facts.
    /// The password is read from the first line of stdin.
    Login {
        #[arg(short, long)]
        username: String,
    },
    /// Authenticate a user, then print the workload spec for the launch.
    Launch {
        #[arg(short, long)]
        username: String,

        /// Image picked on the options form
        #[arg(long)]
        image: Option<String>,
    },
    /// Print the image options form.
    OptionsForm,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    lab_spawner::logging::init(&config.logging)?;

    let app = App::from_config(&config)?;
    match cli.command {
        Commands::Login { username } => {
            let Some(session) = login(&app, &username).await? else {
                return Ok(ExitCode::FAILURE);
            };
            print_json(&session.facts)?;
        }
        Commands::Launch { username, image } => {
            let Some(session) = login(&app, &username).await? else {
                return Ok(ExitCode::FAILURE);
            };
            let form = BTreeMap::from([("kernel_image".to_owned(), image.into_iter().collect())]);
            let mut target = LaunchTarget::default();
            let spec = app
                .spawn
                .pre_spawn(&session, &form, &mut target)
                .context("failed to build workload")?;
            print_json(&spec)?;
        }
        Commands::OptionsForm => print!("{}", app.spawn.options_form()),
        Commands::CheckConfig => tracing::info!("Configuration is valid"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn login(app: &App, username: &str) -> anyhow::Result<Option<Session>> {
    let password = read_password()?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let outcome = app.login.login(username, password, &cancel).await;
    cancel.cancel();
    match outcome {
        LoginOutcome::Accepted(session) => Ok(Some(session)),
        LoginOutcome::Denied { message } => {
            eprintln!("{message}");
            Ok(None)
        }
    }
}

fn read_password() -> anyhow::Result<SecretString> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    Ok(SecretString::from(password))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
