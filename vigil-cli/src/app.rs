use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use vigil_core::{
    open_store, CommandDispatcher, Config, DisabledNotifier, DomainChecker, HostInfoClient,
    Monitor, MonitorSettings, Notifier, Reporter, Store, TelegramNotifier, WebsiteChecker,
};

/// Everything a command needs, wired from one `Config`.
pub struct App {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub monitor: Arc<Monitor>,
    pub reporter: Arc<Reporter>,
    pub bot: Option<TelegramNotifier>,
}

impl App {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let store = open_store(&config.database_url)
            .await
            .with_context(|| format!("opening store at {}", config.database_url))?;

        let bot = match config.telegram_bot_token.as_deref() {
            Some(token) => Some(TelegramNotifier::new(token, config.telegram_api_base.clone())?),
            None => {
                warn!("No Telegram bot token configured, alerts and reports will not be delivered");
                None
            }
        };
        let notifier: Arc<dyn Notifier> = match bot.clone() {
            Some(bot) => Arc::new(bot),
            None => Arc::new(DisabledNotifier),
        };

        let websites = WebsiteChecker::new(config.request_timeout(), config.ssl_timeout())?;
        let domains = DomainChecker::with_timeouts(
            config.whois_timeout(),
            config.whois_follow_depth,
            config.rdap_timeout(),
        )?
        .with_warning_days(config.expiry_warning_days);
        let hosts = HostInfoClient::new(config.request_timeout())?;

        let monitor = Monitor::new(
            store.clone(),
            Arc::new(websites),
            Arc::new(domains),
            notifier.clone(),
        )
        .with_host_lookup(Arc::new(hosts))
        .with_settings(MonitorSettings::from(&config));

        let reporter =
            Reporter::new(store.clone(), notifier).with_chunk_limit(config.report_chunk_limit);

        info!(database = %config.database_url, telegram = bot.is_some(), "Application wired");
        Ok(Self {
            config,
            store,
            monitor: Arc::new(monitor),
            reporter: Arc::new(reporter),
            bot,
        })
    }

    /// Dispatcher for inbound chat commands, when a bot is configured.
    pub fn dispatcher(&self) -> Option<Arc<CommandDispatcher>> {
        let bot = self.bot.clone()?;
        Some(Arc::new(CommandDispatcher::new(
            self.store.clone(),
            self.reporter.clone(),
            Arc::new(bot),
        )))
    }
}
