//! CLI command implementations

use crate::{ConfigAction, OutputFormat};
use anyhow::{anyhow, bail, Result};
use console::style;
use human_bytes::human_bytes;
use kbfetch_core::{FileFetchWorker, FsLocalStore};
use kbfetch_types::Settings;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Fetch Command
// ============================================================================

#[derive(Serialize)]
struct FetchReport {
    url: String,
    path: PathBuf,
    success: bool,
    size: Option<u64>,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(
                f,
                "{} Saved {} ({})",
                style("✓").green().bold(),
                style(self.path.display()).cyan(),
                human_bytes(self.size.unwrap_or(0) as f64)
            )
        } else {
            write!(
                f,
                "{} Failed to fetch {} into {}",
                style("✗").red().bold(),
                self.url,
                self.path.display()
            )
        }
    }
}

impl FetchReport {
    fn emit(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(self)?),
            OutputFormat::Human => println!("{}", self),
        }
        Ok(())
    }
}

pub async fn fetch(
    settings: &Settings,
    url: &str,
    dir: Option<PathBuf>,
    name: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let worker = FileFetchWorker::new(url, name.as_deref(), dir.as_deref()).with_settings(settings);
    let done = worker.start_download().await?;

    let size = if done.success {
        tokio::fs::metadata(&done.path).await.ok().map(|m| m.len())
    } else {
        None
    };
    let report = FetchReport {
        url: url.to_string(),
        path: done.path,
        success: done.success,
        size,
    };
    report.emit(format)?;

    if !report.success {
        bail!("download failed");
    }
    Ok(())
}

// ============================================================================
// Config Commands
// ============================================================================

pub async fn config_action(
    store: &FsLocalStore,
    action: Option<ConfigAction>,
    format: OutputFormat,
) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => {
            let settings = store.load_settings().await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                }
                OutputFormat::Human => {
                    println!("kbfetch Configuration:");
                    println!();
                    println!("  Data directory: {}", store.data_dir().display());
                    println!("  Max concurrent downloads: {}", settings.max_concurrent_downloads);
                    println!("  Max redirects: {}", settings.max_redirects);
                    println!(
                        "  Fetch timeout: {}",
                        settings
                            .fetch_timeout_secs
                            .map(|s| format!("{}s", s))
                            .unwrap_or_else(|| "None".to_string())
                    );
                    println!("  Connect timeout: {}s", settings.connect_timeout_secs);
                    println!("  User agent: {}", settings.user_agent);
                }
            }
        }

        Some(ConfigAction::Get { key }) => {
            let settings = store.load_settings().await?;
            let value = match key.as_str() {
                "max_concurrent_downloads" => settings.max_concurrent_downloads.to_string(),
                "max_redirects" => settings.max_redirects.to_string(),
                "fetch_timeout_secs" => settings
                    .fetch_timeout_secs
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                "connect_timeout_secs" => settings.connect_timeout_secs.to_string(),
                "user_agent" => settings.user_agent,
                _ => return Err(anyhow!("Unknown config key: {}", key)),
            };
            println!("{}", value);
        }

        Some(ConfigAction::Set { key, value }) => {
            let mut settings = store.load_settings().await?;

            match key.as_str() {
                "max_concurrent_downloads" => settings.max_concurrent_downloads = value.parse()?,
                "max_redirects" => settings.max_redirects = value.parse()?,
                "fetch_timeout_secs" => {
                    settings.fetch_timeout_secs = if value.is_empty() { None } else { Some(value.parse()?) }
                }
                "connect_timeout_secs" => settings.connect_timeout_secs = value.parse()?,
                "user_agent" => settings.user_agent = value,
                _ => return Err(anyhow!("Unknown or read-only config key: {}", key)),
            }

            store.save_settings(&settings).await?;
            println!("{} Config updated", style("✓").green().bold());
        }

        Some(ConfigAction::Reset) => {
            let defaults = Settings {
                data_dir: store.data_dir().to_path_buf(),
                ..Settings::default()
            };
            store.save_settings(&defaults).await?;
            println!("{} Settings reset to defaults", style("✓").green().bold());
        }
    }

    Ok(())
}
