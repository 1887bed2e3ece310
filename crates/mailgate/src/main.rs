//! `mailgate` - send mail and rescue spam through Gmail or Microsoft Graph.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use mailgate_core::{Config, EmailController, ProviderKind, ReputationTracker};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
usage: mailgate [--config <path>] <command>

commands:
  send <provider> <to> <subject> <body>   send a plain-text message
  unspam <provider> <message-id>          move a message out of spam
  reputation <ip>...                      check sender IP reputation

providers: gmail, microsoft";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send {
        provider: ProviderKind,
        to: String,
        subject: String,
        body: String,
    },
    Unspam {
        provider: ProviderKind,
        message_id: String,
    },
    Reputation {
        ips: Vec<IpAddr>,
    },
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config: Option<PathBuf>,
    command: Command,
}

impl Cli {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut rest = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = Some(PathBuf::from(
                        args.next().context("--config needs a path")?,
                    ));
                }
                "--help" | "-h" => bail!("{USAGE}"),
                _ => rest.push(arg),
            }
        }

        let name = rest.first().cloned();
        let command = match name.as_deref() {
            Some("send") => {
                let [_, provider, to, subject, body] = <[String; 5]>::try_from(rest)
                    .map_err(|_| anyhow::anyhow!("send takes <provider> <to> <subject> <body>"))?;
                Command::Send {
                    provider: provider.parse()?,
                    to,
                    subject,
                    body,
                }
            }
            Some("unspam") => {
                let [_, provider, message_id] = <[String; 3]>::try_from(rest)
                    .map_err(|_| anyhow::anyhow!("unspam takes <provider> <message-id>"))?;
                Command::Unspam {
                    provider: provider.parse()?,
                    message_id,
                }
            }
            Some("reputation") => {
                let ips = rest[1..]
                    .iter()
                    .map(|ip| ip.parse().with_context(|| format!("invalid IP address: {ip}")))
                    .collect::<Result<Vec<IpAddr>>>()?;
                if ips.is_empty() {
                    bail!("reputation takes at least one <ip>");
                }
                Command::Reputation { ips }
            }
            Some(other) => bail!("unknown command: {other}\n\n{USAGE}"),
            None => bail!("{USAGE}"),
        };

        Ok(Self { config, command })
    }

    fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::from_file(path),
            None => Config::load(),
        };
        config.context("failed to load configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailgate=info,mailgate_core=info,mailgate_oauth=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse(std::env::args().skip(1))?;

    match cli.command {
        Command::Reputation { ref ips } => {
            let mut tracker = ReputationTracker::default();
            for ip in ips {
                let status = tracker.monitor(*ip).await?;
                println!("{ip}\t{status}");
            }
        }
        Command::Send {
            provider,
            ref to,
            ref subject,
            ref body,
        } => {
            let mut controller = EmailController::connect(&cli.load_config()?)
                .await
                .context("failed to authenticate providers")?;
            let receipt = controller.send_email(to, subject, body, provider).await?;
            match receipt.message_id {
                Some(id) => println!("sent via {provider} ({id})"),
                None => println!("sent via {provider}"),
            }
        }
        Command::Unspam {
            provider,
            ref message_id,
        } => {
            let mut controller = EmailController::connect(&cli.load_config()?)
                .await
                .context("failed to authenticate providers")?;
            controller
                .move_email_out_of_spam(message_id, provider)
                .await?;
            info!(%provider, %message_id, "moved out of spam");
            println!("moved {message_id} out of spam on {provider}");
        }
    }

    Ok(())
}
