use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::Cli;
use crate::config;
use crate::data::{MockRedditApi, RedditApi};
use crate::logging;
use crate::reddit;
use crate::runtime::{self, Runtime};
use crate::share::ClipboardShare;
use crate::storage;
use crate::ui;
use crate::view::ViewOptions;

pub fn run(cli: Cli) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: cli.config.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    let config_path = cli.config.clone().or_else(config::default_path);
    let store_path = cfg.storage.path.clone().or_else(storage::default_path);

    if cli.print_paths {
        println!("config: {}", friendly_path(config_path.as_deref()));
        println!("preferences: {}", friendly_path(store_path.as_deref()));
        println!("log: {}", friendly_path(Some(&logging::log_path())));
        return Ok(());
    }

    let log_path = logging::init(cli.log_level).context("initialize logging")?;
    info!(
        version = crate::VERSION,
        config = %friendly_path(config_path.as_deref()),
        log = %log_path.display(),
        offline = cli.offline,
        "starting zennit"
    );

    let store = storage::Store::open(storage::Options {
        path: store_path,
        defaults: storage::Defaults {
            subreddit: cfg.feed.default_subreddit.clone(),
            sort: cfg.feed.sort,
        },
    })
    .context("open storage")?;

    let api: Arc<dyn RedditApi> = if cli.offline {
        Arc::new(MockRedditApi)
    } else {
        Arc::new(
            reddit::Client::new(reddit::ClientConfig {
                user_agent: cfg.reddit.user_agent.clone(),
                base_url: Some(cfg.reddit.base_url.clone()),
                timeout: cfg.reddit.timeout,
                count: Some(cfg.reddit.count),
                http_client: None,
            })
            .context("build reddit client")?,
        )
    };

    let state = runtime::initial_state(
        &store,
        cfg.feed.comment_sort,
        cfg.ui.toast_duration,
        cli.subreddit.as_deref(),
    )
    .context("restore preferences")?;
    let (runtime, intents) = Runtime::new(api, store, Arc::new(ClipboardShare));

    let mut model = ui::Model::new(ui::Options {
        state,
        runtime,
        intents,
        view: ViewOptions {
            date_format: cfg.ui.date_format.clone(),
        },
    });
    model.run()
}

fn friendly_path(path: Option<&Path>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "(unavailable)".to_string()
    }
}
