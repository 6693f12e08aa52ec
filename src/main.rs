use db_provisioner::config::Config;
use db_provisioner::db::{PgAdmin, PgConnector};
use db_provisioner::{DbIdentifier, ProvisionError, Provisioner, ProvisioningReport};
use mimalloc::MiMalloc;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("An error occurred: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        host = %cfg.server.host.as_deref().unwrap_or("<env>"),
        admin_database = %cfg.server.admin_database,
        ssl_mode = ?cfg.server.ssl_mode,
        owner_role = %cfg.provision.owner_role,
        loglevel = %cfg.loglevel
    );

    let code = match provision(&cfg).await {
        Ok(report) => {
            println!(
                "Tables created successfully in {} database ({}).",
                report.database, report.outcome
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "provisioning failed");
            println!("An error occurred: {e}");
            ExitCode::FAILURE
        }
    };

    if cfg.provision.pause_on_exit {
        println!("Press Enter to exit.");
        wait_for_enter(tokio::io::stdin()).await;
    }
    code
}

async fn provision(cfg: &Config) -> Result<ProvisioningReport, ProvisionError> {
    let name = match cfg.provision.database.as_deref() {
        Some(name) => name.to_string(),
        None => prompt_database_name().await?,
    };
    let database = DbIdentifier::parse(&name)?;
    let settings = cfg.provision.settings()?;

    let admin = PgAdmin::connect(&cfg.server.admin_options()).await?;
    let provisioner = Provisioner::new(PgConnector::new(cfg.server.connect_options()), settings);
    provisioner.run(admin, &database).await
}

async fn prompt_database_name() -> Result<String, ProvisionError> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Enter the database name: ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(line)
}

/// Block until a line arrives on `input`. Returns false if reading failed.
async fn wait_for_enter<R: AsyncRead + Unpin>(input: R) -> bool {
    let mut line = String::new();
    match BufReader::new(input).read_line(&mut line).await {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "failed to read from stdin while pausing");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_returns_on_enter_or_closed_input() {
        assert!(wait_for_enter(&b"\n"[..]).await);
        assert!(wait_for_enter(&b""[..]).await);
    }

    #[tokio::test]
    async fn pause_survives_unreadable_input() {
        assert!(!wait_for_enter(&[0xff, b'\n'][..]).await);
    }
}
