use clap::{Parser, Subcommand};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;
use url::Url;

use corems_console::auth::{AuthSession, SessionStatus};
use corems_console::models::{ForgotPasswordRequest, SignInRequest};
use corems_console::{AppError, AppResult, CoreMsContext, Envelope, InMemoryNavigator, RuntimeConfig};

#[derive(Parser)]
#[command(name = "corems-console")]
#[command(about = "Terminal front-end for the CoreMS console session")]
struct Cli {
    /// Console location to start from. A `refresh_token` query parameter signs the session in.
    #[arg(long, env = "COREMS_CONSOLE_URL")]
    url: Option<Url>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the restored session
    Status,
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "COREMS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session and clear stored tokens
    SignOut,
    /// Force an access token renewal
    Renew,
    /// Keep the session alive and print every change until interrupted
    Watch,
    /// Request a password reset link
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_succeeded<T>(envelope: &Envelope<T>) -> AppResult<()> {
    if envelope.succeeded {
        Ok(())
    } else {
        Err(AppError::AuthError(envelope.error_summary()))
    }
}

async fn watch(ctx: &CoreMsContext) -> AppResult<()> {
    let manager = ctx.token_manager();
    let mut updates = manager.subscribe();
    print_json(&*updates.borrow_and_update())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving the session as is");
                return Ok(());
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let session: AuthSession = updates.borrow_and_update().clone();
                print_json(&session)?;
                if session.status == SessionStatus::SignedOut {
                    return Ok(());
                }
            }
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = RuntimeConfig::from_env();
    let navigator = Arc::new(InMemoryNavigator::new(cli.url));
    let ctx = CoreMsContext::from_config(config, navigator)?;
    let manager = ctx.token_manager();

    match cli.command {
        Command::SignIn { email, password } => {
            let envelope = manager.sign_in(&SignInRequest { email, password }).await?;
            ensure_succeeded(&envelope)?;
            print_json(&manager.session())
        }
        Command::ForgotPassword { email } => {
            let envelope = ctx.auth().forgot_password(&ForgotPasswordRequest { email }).await?;
            ensure_succeeded(&envelope)?;
            println!("Password reset requested");
            Ok(())
        }
        command => {
            let session = manager.bootstrap().await?;
            match command {
                Command::Status => print_json(&session),
                Command::SignOut => {
                    manager.sign_out().await;
                    print_json(&manager.session())
                }
                Command::Renew => {
                    let envelope = manager.renew_access_token(true).await?;
                    ensure_succeeded(&envelope)?;
                    print_json(&manager.session())
                }
                Command::Watch => watch(&ctx).await,
                Command::SignIn { .. } | Command::ForgotPassword { .. } => Ok(()),
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
