//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord front end for the time bank, including all
//! slash commands, autocomplete handlers, and bot context management. Command
//! authors are resolved to ledger users through [`IdentityProvider`].

/// Discord command implementations (offer, credits, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;
/// Reply formatting within Discord's size limits
pub mod reply;

use crate::{
    core::{
        identity::{CurrentUser, IdentityProvider},
        timebank::TimeBank,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
pub struct BotData {
    /// Ledger facade every command goes through
    pub timebank: TimeBank,
}

impl BotData {
    /// Creates a new `BotData` wrapping the ledger facade.
    #[must_use]
    pub const fn new(timebank: TimeBank) -> Self {
        Self { timebank }
    }
}

/// Context type every command receives.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

impl IdentityProvider for poise::Context<'_, BotData, Error> {
    fn current_user(&self) -> Result<CurrentUser> {
        let author = self.author();
        if author.bot {
            return Err(Error::Unauthenticated);
        }
        Ok(CurrentUser {
            id: author.id.to_string(),
        })
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let kind = error.kind();
            if error.is_retriable() || matches!(error, Error::InvariantViolation { .. }) {
                error!(command = %ctx.command().name, %kind, error = %error, "command failed");
            } else {
                info!(command = %ctx.command().name, %kind, error = %error, "command rejected");
            }
            let reply = format!("❌ {} (`{kind}`)", error.user_message());
            if let Err(e) = ctx.say(reply).await {
                error!("Failed to send error message: {e}");
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Starts the Discord client and blocks until it shuts down.
#[instrument(skip(token, timebank))]
pub async fn run_bot(token: String, timebank: TimeBank) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::offer(),
                commands::claim(),
                commands::claim_offer(),
                commands::balance(),
                commands::history(),
                commands::reconcile(),
                commands::ping(),
                commands::help(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered commands globally");
                Ok(BotData::new(timebank))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {e:?}"))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {e:?}"))?;
    Ok(())
}

pub use commands::*;
pub use handlers::*;
