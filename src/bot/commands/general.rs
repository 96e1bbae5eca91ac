//! General Discord commands - ping, help, and other utility commands.
//! This module contains simple commands that don't touch the ledger.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Time Bank Help**\n\
        Trade hours of help with other members. One hour given earns one credit.\n\n\
        **Offers**\n\
        • `/offer create <title> <hours> [service] [description]` - Post an offer.\n\
        • `/offer apply <offer>` - Apply to help with an offer.\n\
        • `/offer applications <offer>` - See who applied to your offer.\n\
        • `/offer accept <application>` - Accept an applicant.\n\
        • `/offer complete <offer>` - Mark your offer as done.\n\
        • `/offer mine` - List your offers.\n\n\
        **Credits**\n\
        • `/claim <transaction>` - Claim credits you earned.\n\
        • `/claim_offer <offer>` - Claim credits for an offer you helped with.\n\
        • `/balance` - Show your balance.\n\
        • `/history` - Show exchanges you provided and requested.\n\n\
        **Utility Commands**\n\
        • `/reconcile` - Check the ledger for drift (admins only).\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
