//! `send`: validate, build, and deliver one message, then fan it out to
//! matching subscribers.
//!
//! Grounded on `atm/src/commands/send.rs`'s overall shape (resolve config,
//! validate addressing, build message, write, report), simplified since
//! there is no team/agent identity layer here, only roles.

use agent_bus_core::config::Config;
use agent_bus_core::layout::is_known_role;
use agent_bus_core::registry::SendPolicy;
use agent_bus_core::schema::message::{Message, MessageType};
use agent_bus_core::{io::inbox, subscriptions};
use anyhow::{bail, Context, Result};
use clap::Args;

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct SendArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    /// Sender role.
    #[arg(long)]
    pub from: String,

    /// Recipient role.
    #[arg(long)]
    pub to: String,

    #[arg(long, default_value = "cli")]
    pub action: String,

    #[arg(long, default_value = "")]
    pub payload: String,

    #[arg(long, value_enum, default_value = "event")]
    pub r#type: MsgTypeArg,

    /// Skip the auto-CC-to-edit fan-out.
    #[arg(long)]
    pub no_cc: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum MsgTypeArg {
    Request,
    Response,
    Event,
}

impl From<MsgTypeArg> for MessageType {
    fn from(v: MsgTypeArg) -> Self {
        match v {
            MsgTypeArg::Request => MessageType::Request,
            MsgTypeArg::Response => MessageType::Response,
            MsgTypeArg::Event => MessageType::Event,
        }
    }
}

pub fn execute(args: SendArgs) -> Result<()> {
    let layout = args.session.layout();

    if !is_known_role(&args.from) {
        bail!("unknown role: {}", args.from);
    }
    if !is_known_role(&args.to) {
        bail!("unknown role: {}", args.to);
    }

    let policy = SendPolicy::default();
    if let Some(reason) = policy.check(&args.from, &args.to) {
        bail!("send denied: {reason}");
    }

    let config = Config::resolve(None).context("failed to resolve configuration")?;
    let message = Message::new(&args.from, &args.to, args.r#type.into(), &args.action, &args.payload);

    inbox::send(&layout, &message, !args.no_cc, &config.send.auto_cc_set())
        .context("failed to deliver message")?;
    let delivered = subscriptions::fan_out(&layout, &message).context("subscription fan-out failed")?;
    let _ = agent_bus_core::io::trigger::fire(&layout);

    if args.json {
        print_json(&serde_json::json!({"id": message.id, "subscribers_notified": delivered}))?;
    } else {
        println!("sent {} (subscribers notified: {delivered})", message.id);
    }
    Ok(())
}
