use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::error;
use prerender::{locales, stage, RunConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "prerender", version, about = "Prerender a built single-page application once per locale")]
struct Cli {
    /// JSON configuration file; flags and environment override its values
    #[arg(long, global = true, env = "PRERENDER_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Stage the build, render every locale and write the static entry points (default)
    Render,
    /// Replace the source tree with the prerendered output
    Publish,
    /// Print the locale keys that would be rendered
    Locales,
}

#[derive(Args)]
struct Overrides {
    #[arg(long, global = true, env = "PRERENDER_PORT")]
    port: Option<u16>,
    #[arg(long, global = true, env = "PRERENDER_SOURCE_DIR")]
    source_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "PRERENDER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "PRERENDER_SCREENSHOT_DIR")]
    screenshot_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "PRERENDER_LOCALE_DIR")]
    locale_dir: Option<PathBuf>,
    /// Stem of the aggregate locale file that is never rendered
    #[arg(long, global = true, env = "PRERENDER_EXCLUDED_LOCALE")]
    excluded_locale: Option<String>,
    /// CSS selector the application populates once rendered
    #[arg(long, global = true, env = "PRERENDER_ROOT_SELECTOR")]
    root_selector: Option<String>,
    #[arg(long, global = true, env = "PRERENDER_READY_TIMEOUT_MS")]
    ready_timeout_ms: Option<u64>,
    #[arg(long, global = true, env = "PRERENDER_CHROME_PATH")]
    chrome_path: Option<PathBuf>,
    /// Run Chrome without its sandbox (needed in some containers)
    #[arg(long, global = true, env = "PRERENDER_NO_SANDBOX")]
    no_sandbox: bool,
}

impl Overrides {
    fn apply(self, mut cfg: RunConfig) -> RunConfig {
        if let Some(v) = self.port {
            cfg.port = v;
        }
        if let Some(v) = self.source_dir {
            cfg.source_dir = v;
        }
        if let Some(v) = self.output_dir {
            cfg.output_dir = v;
        }
        if let Some(v) = self.screenshot_dir {
            cfg.screenshot_dir = v;
        }
        if let Some(v) = self.locale_dir {
            cfg.locale_dir = v;
        }
        if let Some(v) = self.excluded_locale {
            cfg.excluded_locale = v;
        }
        if let Some(v) = self.root_selector {
            cfg.root_selector = v;
        }
        if let Some(v) = self.ready_timeout_ms {
            cfg.ready_timeout_ms = v;
        }
        if self.chrome_path.is_some() {
            cfg.chrome_path = self.chrome_path;
        }
        if self.no_sandbox {
            cfg.sandbox = false;
        }
        cfg
    }
}

fn load_config(path: Option<&PathBuf>, overrides: Overrides) -> anyhow::Result<RunConfig> {
    let base = match path {
        Some(p) => RunConfig::from_json_file(p)?,
        None => RunConfig::default(),
    };
    let cfg = overrides.apply(base);
    cfg.validate()?;
    Ok(cfg)
}

async fn render(config: RunConfig) -> anyhow::Result<()> {
    #[cfg(feature = "cdp")]
    {
        let summary = prerender::run_with_chrome(config).await.context("prerender failed")?;
        print!("{}", summary);
        Ok(())
    }
    #[cfg(not(feature = "cdp"))]
    {
        let _ = config;
        anyhow::bail!("prerender was built without the `cdp` feature; no rendering engine available")
    }
}

async fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref(), cli.overrides)?;

    match cli.command.unwrap_or(Command::Render) {
        Command::Render => render(config).await,
        Command::Publish => stage::publish(&config).context("publish failed"),
        Command::Locales => {
            let keys = locales::list_locales(&config)?;
            for key in keys {
                println!("{}", key);
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match real_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
