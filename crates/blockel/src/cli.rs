//! Command-line surface over the rule store.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};

use crate::app::injector::render_rules;
use crate::app::rules::{RuleService, RuleStore};
use crate::app::storage::{JsonFileStorage, Storage};
use crate::domain::model::{Rule, Theme};
use crate::infra::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "blockel",
    author,
    version,
    about = "Manage element-blocking rules",
    long_about = None
)]
pub struct Cli {
    /// Extra config file layered over the user config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Rule store file, overriding the configured one
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect and edit stored rules
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// Print the stylesheet a page on DOMAIN would receive
    Css { domain: String },
    /// Manage domains where blocking is skipped
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommand,
    },
    /// Show or change extension settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Show rule statistics
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    List {
        #[arg(long)]
        domain: Option<String>,
    },
    /// Write every rule as a JSON array
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge rules from a JSON array, skipping ones already stored
    Import { file: PathBuf },
    Delete { domain: String, id: String },
    Toggle {
        domain: String,
        id: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    /// Store defaults for any settings not saved yet
    Init,
    /// Theme for the confirmation toolbar: light, dark, or system
    Theme { theme: Theme },
    /// Turn blocking on or off everywhere
    Enabled {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum WhitelistCommand {
    Add { domain: String },
    Remove { domain: String },
    List,
}

impl Cli {
    pub fn store_path(&self, config: &Config) -> PathBuf {
        self.store.clone().unwrap_or_else(|| config.store.path())
    }

    pub async fn run(&self, config: &Config) -> Result<()> {
        let path = self.store_path(config);
        tracing::debug!(store = %path.display(), "opening rule store");
        let service = RuleService::new(JsonFileStorage::new(path));
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.command.execute(&service, &mut out).await
    }
}

impl Commands {
    /// Run against `service`, writing human-readable output to `out`.
    pub async fn execute<S: Storage>(
        &self,
        service: &RuleService<S>,
        out: &mut impl Write,
    ) -> Result<()> {
        match self {
            Commands::Rules { command } => command.execute(service, out).await,
            Commands::Css { domain } => {
                let settings = service.get_settings().await?;
                if !settings.blocks_on(domain) {
                    tracing::info!(domain = %domain, "blocking is disabled for this domain");
                    return Ok(());
                }
                let rules = service.enabled_rules(domain).await?;
                writeln!(out, "{}", render_rules(&rules))?;
                Ok(())
            }
            Commands::Whitelist { command } => match command {
                WhitelistCommand::Add { domain } => {
                    service.add_to_whitelist(domain).await?;
                    writeln!(out, "whitelisted {domain}")?;
                    Ok(())
                }
                WhitelistCommand::Remove { domain } => {
                    service.remove_from_whitelist(domain).await?;
                    writeln!(out, "removed {domain} from whitelist")?;
                    Ok(())
                }
                WhitelistCommand::List => {
                    for domain in service.get_settings().await?.whitelist_domains {
                        writeln!(out, "{domain}")?;
                    }
                    Ok(())
                }
            },
            Commands::Settings { command } => command.execute(service, out).await,
            Commands::Stats => {
                let stats = service.statistics().await?;
                writeln!(out, "rules:   {}", stats.total_blocked)?;
                writeln!(out, "domains: {}", stats.domains_with_rules)?;
                if let Some(last) = stats.last_rule_created {
                    writeln!(out, "latest:  {last}")?;
                }
                Ok(())
            }
        }
    }
}

impl RulesCommand {
    async fn execute<S: Storage>(
        &self,
        service: &RuleService<S>,
        out: &mut impl Write,
    ) -> Result<()> {
        match self {
            RulesCommand::List { domain } => {
                let rules = match domain {
                    Some(domain) => service.rules(domain).await?,
                    None => service.export_rules().await?,
                };
                for rule in &rules {
                    write_rule(out, rule)?;
                }
            }
            RulesCommand::Export { output } => {
                let rules = service.export_rules().await?;
                let json = serde_json::to_string_pretty(&rules)?;
                match output {
                    Some(path) => {
                        fs::write(path, json).with_context(|| {
                            format!("failed to write export: {}", path.display())
                        })?;
                        writeln!(out, "exported {} rules to {}", rules.len(), path.display())?;
                    }
                    None => writeln!(out, "{json}")?,
                }
            }
            RulesCommand::Import { file } => {
                let data = fs::read_to_string(file)
                    .with_context(|| format!("failed to read import file: {}", file.display()))?;
                let rules: Vec<Rule> = serde_json::from_str(&data).with_context(|| {
                    format!("import file is not a JSON rule array: {}", file.display())
                })?;
                let imported = service.import_rules(rules).await?;
                writeln!(out, "imported {imported} rules")?;
            }
            RulesCommand::Delete { domain, id } => {
                if !service.delete_rule(id, domain).await? {
                    bail!("no rule {id} on {domain}");
                }
                writeln!(out, "deleted {id}")?;
            }
            RulesCommand::Toggle { domain, id, enabled } => {
                if !service.toggle_rule(id, domain, *enabled).await? {
                    bail!("no rule {id} on {domain}");
                }
                let state = if *enabled { "enabled" } else { "disabled" };
                writeln!(out, "{state} {id}")?;
            }
        }
        Ok(())
    }
}

impl SettingsCommand {
    async fn execute<S: Storage>(
        &self,
        service: &RuleService<S>,
        out: &mut impl Write,
    ) -> Result<()> {
        match self {
            SettingsCommand::Show => {
                let settings = service.get_settings().await?;
                writeln!(out, "enabled:   {}", settings.enabled)?;
                writeln!(out, "theme:     {}", settings.theme)?;
                writeln!(out, "whitelist: {}", settings.whitelist_domains.len())?;
            }
            SettingsCommand::Init => {
                service.install_defaults().await?;
                writeln!(out, "default settings stored")?;
            }
            SettingsCommand::Theme { theme } => {
                let mut settings = service.get_settings().await?;
                settings.theme = *theme;
                service.save_settings(settings).await?;
                writeln!(out, "theme set to {theme}")?;
            }
            SettingsCommand::Enabled { enabled } => {
                let mut settings = service.get_settings().await?;
                settings.enabled = *enabled;
                service.save_settings(settings).await?;
                let state = if *enabled { "enabled" } else { "disabled" };
                writeln!(out, "blocking {state}")?;
            }
        }
        Ok(())
    }
}

fn write_rule(out: &mut impl Write, rule: &Rule) -> std::io::Result<()> {
    let state = if rule.is_enabled { "on" } else { "off" };
    writeln!(out, "{}\t{}\t{}\t{}", rule.domain, rule.id, state, rule.selector)
}
