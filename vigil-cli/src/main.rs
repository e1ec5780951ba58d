mod app;
mod display;

use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vigil_core::colors::PaletteExt;
use vigil_core::output::{get_formatter, OutputFormat, OutputFormatter};
use vigil_core::{
    run_polling, Config, DomainChecker, DomainProbe, NewDomain, NewWebsite, ReportKind, Scheduler,
    VigilError, WebsiteChecker, WebsiteProbe,
};

use app::App;
use display::Spinner;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Website and domain monitor with Telegram alerts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file
    #[arg(short, long, global = true, default_value = "vigil.toml")]
    config: String,

    /// Database URL (overrides config), or "memory"
    #[arg(long, global = true)]
    database: Option<String>,

    /// Output format (human or json)
    #[arg(short, long, global = true, default_value = "human")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and chat command listener until interrupted
    Run {
        /// Run one website cycle and one domain cycle, then exit
        #[arg(long)]
        once: bool,
    },
    /// Probe a URL once without storing anything
    CheckWebsite {
        url: String,
    },
    /// Look up a domain's registration once without storing anything
    CheckDomain {
        domain: String,
    },
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage monitored websites
    #[command(subcommand)]
    Website(WebsiteCommand),
    /// Manage monitored domains
    #[command(subcommand)]
    Domain(DomainCommand),
    /// Send a user their status report
    Report {
        /// User id
        #[arg(short, long)]
        user: i64,
        /// full, websites or domains
        #[arg(short, long, default_value = "full")]
        kind: String,
        /// Print the report here instead of sending it to the user's chat
        #[arg(long)]
        print: bool,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user, optionally linked to a chat
    Add {
        /// Telegram chat id to deliver alerts and reports to
        #[arg(long)]
        chat_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum WebsiteCommand {
    /// Start monitoring a URL
    Add {
        #[arg(short, long)]
        user: i64,
        #[arg(long)]
        url: String,
        /// Display name, defaults to the URL
        #[arg(short, long)]
        name: Option<String>,
        /// Minutes between checks
        #[arg(short, long, default_value_t = 5)]
        interval: i64,
    },
    /// Check a monitored website now and record the result
    Check { id: i64 },
    /// Show recent checks, newest first
    History {
        id: i64,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Stop monitoring a website and drop its history
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum DomainCommand {
    /// Start monitoring a domain's registration
    Add {
        #[arg(short, long)]
        user: i64,
        #[arg(short, long)]
        domain: String,
        /// Display name, defaults to the domain
        #[arg(short, long)]
        name: Option<String>,
        /// Minutes between checks
        #[arg(short, long, default_value_t = 1440)]
        interval: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if matches!(cli.command, Commands::Run { .. }) {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let output_format: OutputFormat = cli.format.parse().unwrap_or_default();

    let mut config = match Config::load(Some(&cli.config)) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Some(database) = cli.database {
        config.database_url = database;
    }

    if let Err(e) = execute_command(cli.command, config, output_format).await {
        fail(&format!("{:#}", e));
    }
    Ok(())
}

fn fail(error: &dyn std::fmt::Display) -> ! {
    eprintln!("{} {}", "Error:".bad(), error);
    std::process::exit(1);
}

async fn execute_command(
    command: Commands,
    config: Config,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let formatter = get_formatter(output_format);
    let interactive = output_format == OutputFormat::Human;

    match command {
        Commands::CheckWebsite { url } => {
            let checker = WebsiteChecker::new(config.request_timeout(), config.ssl_timeout())?;
            let spinner = Spinner::new(&format!("Checking {}", url), interactive);
            let result = checker.check(&url).await;
            spinner.finish();
            println!("{}", formatter.format_website_check(&url, &result));
        }
        Commands::CheckDomain { domain } => {
            let checker = DomainChecker::with_timeouts(
                config.whois_timeout(),
                config.whois_follow_depth,
                config.rdap_timeout(),
            )?
            .with_warning_days(config.expiry_warning_days);
            let spinner = Spinner::new(&format!("Looking up {}", domain), interactive);
            let result = checker.check(&domain).await;
            spinner.finish();
            println!("{}", formatter.format_domain_check(&domain, &result));
        }
        Commands::Run { once } => {
            let app = App::build(config).await?;
            if once {
                run_once(&app).await?;
            } else {
                run_daemon(app).await?;
            }
        }
        Commands::User(cmd) => {
            let app = App::build(config).await?;
            match cmd {
                UserCommand::Add { chat_id } => {
                    let user = app.store.create_user(chat_id.as_deref()).await?;
                    println!("{}", formatter.format_user(&user));
                }
            }
        }
        Commands::Website(cmd) => {
            let app = App::build(config).await?;
            website_command(&app, formatter.as_ref(), cmd, interactive).await?;
        }
        Commands::Domain(DomainCommand::Add {
            user,
            domain,
            name,
            interval,
        }) => {
            let app = App::build(config).await?;
            ensure_user(&app, user).await?;
            let name = name.unwrap_or_else(|| domain.clone());
            let domain = app
                .monitor
                .add_domain(NewDomain::new(user, name, domain).with_interval(interval))
                .await?;
            println!("{}", formatter.format_domain_added(&domain));
        }
        Commands::Report { user, kind, print } => {
            let kind: ReportKind = kind.parse().map_err(anyhow::Error::msg)?;
            let app = App::build(config).await?;
            if print {
                let owner = ensure_user(&app, user).await?;
                let messages = app.reporter.render(&owner, kind, Utc::now()).await?;
                println!("{}", formatter.format_report(&messages));
            } else {
                let sent = app.reporter.send_report(user, kind).await?;
                println!("{} {} message(s) sent", "✓".good(), sent);
            }
        }
    }

    Ok(())
}

async fn website_command(
    app: &App,
    formatter: &dyn OutputFormatter,
    command: WebsiteCommand,
    interactive: bool,
) -> anyhow::Result<()> {
    match command {
        WebsiteCommand::Add {
            user,
            url,
            name,
            interval,
        } => {
            ensure_user(app, user).await?;
            let name = name.unwrap_or_else(|| url.clone());
            let spinner = Spinner::new("Registering website", interactive);
            let (website, domain) = app
                .monitor
                .add_website(NewWebsite::new(user, name, url).with_interval(interval))
                .await?;
            spinner.finish();
            println!("{}", formatter.format_website_added(&website, domain.as_ref()));
        }
        WebsiteCommand::Check { id } => {
            let spinner = Spinner::new("Checking website", interactive);
            let check = app.monitor.check_website_now(id).await?;
            spinner.finish();
            let website = app
                .store
                .find_website(id)
                .await?
                .ok_or_else(|| VigilError::NotFound(format!("website {}", id)))?;
            println!("{}", formatter.format_website_check(&website.url, &check.result));
        }
        WebsiteCommand::History { id, limit } => {
            let website = app
                .store
                .find_website(id)
                .await?
                .ok_or_else(|| VigilError::NotFound(format!("website {}", id)))?;
            let checks = app.store.website_history(id, limit).await?;
            println!("{}", formatter.format_history(&website, &checks));
        }
        WebsiteCommand::Remove { id } => {
            if !app.store.delete_website(id).await? {
                return Err(VigilError::NotFound(format!("website {}", id)).into());
            }
            println!("{} Website #{} removed", "✓".good(), id);
        }
    }
    Ok(())
}

async fn ensure_user(app: &App, id: i64) -> anyhow::Result<vigil_core::User> {
    app.store
        .find_user(id)
        .await?
        .ok_or_else(|| VigilError::NotFound(format!("user {}", id)).into())
}

async fn run_once(app: &App) -> anyhow::Result<()> {
    let websites = app.monitor.run_website_cycle().await?;
    let domains = app.monitor.run_domain_cycle().await?;
    println!(
        "Websites: {} checked, {} failed, {} alert(s)",
        websites.checked, websites.failed, websites.alerts
    );
    println!(
        "Domains:  {} checked, {} failed, {} alert(s)",
        domains.checked, domains.failed, domains.alerts
    );
    Ok(())
}

async fn run_daemon(app: App) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Scheduler::from_config(app.monitor.clone(), app.reporter.clone(), &app.config)?;
    let mut tasks = vec![tokio::spawn(scheduler.run(shutdown_rx.clone()))];

    match (app.config.command_polling, app.bot.clone(), app.dispatcher()) {
        (true, Some(bot), Some(dispatcher)) => {
            tasks.push(tokio::spawn(run_polling(bot, dispatcher, shutdown_rx.clone())));
        }
        (true, _, _) => info!("Command polling needs a bot token, skipping"),
        (false, _, _) => info!("Command polling disabled"),
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    let drain = futures::future::join_all(tasks);
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        error!("Tasks did not stop within the grace period");
    }
    Ok(())
}
