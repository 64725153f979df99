//! Runs the widget flows from a terminal against an in-memory page, printing
//! the resulting element state as JSON.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ckmailer_client_core::config::{ConfigSources, ENV_BASE_URL, ENV_FAILURE_POLICY};
use ckmailer_client_core::memory::{ElementSnapshot, MemoryElement, MemoryRegistry};
use ckmailer_client_core::{
    AccountLinkRequester, FailurePolicy, HandlerOutcome, LinkForm, LinkRequestForm,
    MESSAGE_LABEL_ID, RequestTransport, StatusLabel, SubscriptionControl, SubscriptionState,
    SubscriptionToggler, UnsubscribeAction, UnsubscribeControl, WidgetConfig,
};
use clap::Parser;
use serde::Serialize;
use tracing::info;

mod transport;

pub use transport::ReqwestTransport;

#[derive(Parser, Debug)]
#[command(name = "ckmailer")]
#[command(about = "Drive the ckmailer widget flows against a mailer server")]
pub struct CkmailerCli {
    /// TOML file with `base_url`, `failure_policy` and `[status_text]`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides CKMAILER_BASE_URL and the config file.
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// `restore` or `legacy`.
    #[arg(long, global = true)]
    pub failure_policy: Option<FailurePolicy>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Ask the mailer to send an account-management link
    AccountLink(AccountLinkArgs),
    /// Subscribe to or unsubscribe from a channel
    Toggle(ToggleArgs),
    /// One-click unsubscribe for a user and channel
    Unsubscribe(UnsubscribeArgs),
}

#[derive(clap::Args, Debug)]
pub struct AccountLinkArgs {
    #[arg(long)]
    pub email: String,
    /// Channel row id the manage page should highlight.
    #[arg(long)]
    pub highlight: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ToggleArgs {
    /// Session token (`timsi`).
    #[arg(long)]
    pub timsi: String,
    #[arg(long)]
    pub channel: String,
    /// State the checkbox was clicked into.
    #[arg(long, value_enum)]
    pub to: TargetState,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    Subscribed,
    Unsubscribed,
}

impl TargetState {
    fn checked(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

#[derive(clap::Args, Debug)]
pub struct UnsubscribeArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub channel: String,
}

/// What a flow left behind on the page.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub flow: &'static str,
    pub ok: bool,
    pub prevents_default: bool,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newstate: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<ElementSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FlowReport {
    fn from_outcome<T>(flow: &'static str, outcome: &HandlerOutcome<T>) -> Self {
        Self {
            flow,
            ok: outcome.is_ok(),
            prevents_default: outcome.prevents_default(),
            error: outcome.error().map(ToString::to_string),
            error_kind: outcome.error().map(|error| error.kind().as_str()),
            form_state: None,
            newstate: None,
            control: None,
            label: None,
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = CkmailerCli::parse();
    let config = load_config(
        cli.config.as_deref(),
        cli.base_url.as_deref(),
        cli.failure_policy,
    )?;
    info!(
        base_url = config.base_url.as_deref().unwrap_or_default(),
        failure_policy = config.failure_policy.as_str(),
        "ckmailer config resolved"
    );

    let transport = ReqwestTransport::new(config.clone());
    let report = execute(&cli.command, transport, &config).await;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("write flow report")?;
    writeln!(stdout).context("write flow report")?;

    if report.ok {
        Ok(())
    } else {
        Err(anyhow!(
            "{} failed: {}",
            report.flow,
            report.error.unwrap_or_default()
        ))
    }
}

pub async fn execute<T: RequestTransport>(
    command: &Commands,
    transport: T,
    config: &WidgetConfig,
) -> FlowReport {
    match command {
        Commands::AccountLink(args) => account_link(transport, args).await,
        Commands::Toggle(args) => toggle(transport, config, args).await,
        Commands::Unsubscribe(args) => unsubscribe(transport, config, args).await,
    }
}

async fn account_link<T: RequestTransport>(transport: T, args: &AccountLinkArgs) -> FlowReport {
    let mut form = LinkRequestForm::new(args.email.clone());
    if let Some(highlight) = &args.highlight {
        form = form.with_highlight(highlight.clone());
    }
    let outcome = AccountLinkRequester::new(transport)
        .request_account_link(&form)
        .await;

    let mut report = FlowReport::from_outcome("account_link", &outcome);
    report.form_state = Some(form.state().as_str());
    report
}

async fn toggle<T: RequestTransport>(
    transport: T,
    config: &WidgetConfig,
    args: &ToggleArgs,
) -> FlowReport {
    let registry = MemoryRegistry::new();
    let label = registry.insert_label(args.channel.clone());
    let checkbox = MemoryElement::checkbox(args.to.checked());
    let control = SubscriptionControl::new(args.timsi.clone(), args.channel.clone(), checkbox.clone());

    let outcome = SubscriptionToggler::new(transport, registry, config)
        .change_subscription(&control)
        .await;

    let mut report = FlowReport::from_outcome("change_subscription", &outcome);
    report.newstate = outcome
        .result
        .as_ref()
        .ok()
        .map(|state: &SubscriptionState| state.as_str());
    report.control = Some(checkbox.snapshot());
    report.label = Some(label.text());
    report
}

async fn unsubscribe<T: RequestTransport>(
    transport: T,
    config: &WidgetConfig,
    args: &UnsubscribeArgs,
) -> FlowReport {
    let registry = MemoryRegistry::new();
    let label = registry.insert_label(MESSAGE_LABEL_ID);
    let trigger = MemoryElement::new();
    let control = UnsubscribeControl::new(args.user.clone(), args.channel.clone(), trigger.clone());

    let outcome = UnsubscribeAction::new(transport, registry, config)
        .post_unsubscribe(&control)
        .await;

    let mut report = FlowReport::from_outcome("unsubscribe", &outcome);
    report.control = Some(trigger.snapshot());
    report.label = Some(label.text());
    report
}

pub fn load_config(
    path: Option<&Path>,
    base_url: Option<&str>,
    failure_policy: Option<FailurePolicy>,
) -> Result<WidgetConfig> {
    let file = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            Some(parse_config_file(&raw).with_context(|| format!("parse config {}", path.display()))?)
        }
        None => None,
    };
    let env = WidgetConfig::from_env().context("resolve config from environment")?;
    merge_config(file, env, base_url, failure_policy)
}

pub fn parse_config_file(raw: &str) -> Result<WidgetConfig> {
    let config: WidgetConfig = toml::from_str(raw)?;
    Ok(config.normalized()?)
}

/// Precedence, lowest first: defaults, config file, environment, flags.
pub fn merge_config(
    file: Option<WidgetConfig>,
    env: (WidgetConfig, ConfigSources),
    base_url: Option<&str>,
    failure_policy: Option<FailurePolicy>,
) -> Result<WidgetConfig> {
    let (env_config, sources) = env;
    let from_file = file.is_some();
    let mut config = file.unwrap_or_default();

    if config.base_url.is_none() || sources.base_url == ENV_BASE_URL {
        config.base_url = env_config.base_url;
    }
    if !from_file || sources.failure_policy == ENV_FAILURE_POLICY {
        config.failure_policy = env_config.failure_policy;
    }
    if let Some(raw) = base_url {
        config = config.with_base_url(raw)?;
    }
    if let Some(policy) = failure_policy {
        config.failure_policy = policy;
    }
    Ok(config)
}
