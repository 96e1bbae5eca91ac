//! Offer Discord commands - posting, applying, accepting, and completing offers.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::autocomplete,
            reply::{MAX_MESSAGE_LEN, bounded_list, clip},
        },
        core::{
            completion::CompletionStatus,
            offer::{DEFAULT_SERVICE_TYPE, NewOffer},
        },
        entities::ApplicationStatus,
        errors::{Error, Result},
    };

    /// Parent command for the offer marketplace.
    #[poise::command(
        slash_command,
        subcommands(
            "offer_create",
            "offer_apply",
            "offer_applications",
            "offer_accept",
            "offer_complete",
            "offer_mine"
        )
    )]
    pub async fn offer(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Offer commands. Available subcommands:\n\
            `/offer create` - Post a new offer\n\
            `/offer apply` - Apply to someone else's offer\n\
            `/offer applications` - See who applied to your offer\n\
            `/offer accept` - Accept an application\n\
            `/offer complete` - Mark your offer as done\n\
            `/offer mine` - List your offers";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Posts a new offer worth a number of hours.
    #[poise::command(slash_command, rename = "create")]
    pub async fn offer_create(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Short title (e.g., 'Help moving a couch')"] title: String,
        #[description = "Credit value in hours"]
        #[min = 1]
        hours: i64,
        #[description = "Service category. Defaults to 'Time Exchange'."] service: Option<String>,
        #[description = "Longer description"] description: Option<String>,
    ) -> Result<()> {
        let created = ctx
            .data()
            .timebank
            .create_offer(
                &ctx,
                NewOffer {
                    title,
                    description: description.unwrap_or_default(),
                    service_type: service.unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string()),
                    time_credits: hours,
                },
            )
            .await?;

        let message = format!(
            "✅ Posted offer #{} '{}' worth {}h ({})",
            created.id, created.title, created.time_credits, created.service_type
        );
        ctx.say(clip(&message, MAX_MESSAGE_LEN)).await?;
        Ok(())
    }

    /// Applies to an offer posted by someone else.
    #[poise::command(slash_command, rename = "apply")]
    pub async fn offer_apply(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Offer id"] offer_id: i64,
    ) -> Result<()> {
        let application = ctx.data().timebank.apply_to_offer(&ctx, offer_id).await?;

        ctx.say(format!(
            "✅ Applied to offer #{offer_id} (application #{}, {:?})",
            application.id, application.status
        ))
        .await?;
        Ok(())
    }

    /// Lists applications on one of your offers.
    #[poise::command(slash_command, rename = "applications")]
    pub async fn offer_applications(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Offer id"]
        #[autocomplete = "autocomplete::autocomplete_open_offer"]
        offer_id: i64,
    ) -> Result<()> {
        let (found, applications) = ctx
            .data()
            .timebank
            .applications_for(&ctx, offer_id)
            .await?;

        if applications.is_empty() {
            ctx.say(format!("No applications on offer #{offer_id} yet.")).await?;
            return Ok(());
        }

        let header = format!("**Applications for #{offer_id} '{}'**\n", found.title);
        let lines = applications.iter().map(|app| {
            let marker = match app.status {
                ApplicationStatus::Accepted => "✅",
                ApplicationStatus::Rejected => "✖️",
                ApplicationStatus::Pending => "⏳",
            };
            format!("{marker} #{} from <@{}>", app.id, app.applicant_id)
        });
        ctx.say(bounded_list(&header, lines, MAX_MESSAGE_LEN)).await?;
        Ok(())
    }

    /// Accepts an application on one of your offers.
    #[poise::command(slash_command, rename = "accept")]
    pub async fn offer_accept(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Application id"] application_id: i64,
    ) -> Result<()> {
        let accepted = ctx
            .data()
            .timebank
            .accept_application(&ctx, application_id)
            .await?;

        ctx.say(format!(
            "✅ Accepted <@{}> for offer #{}",
            accepted.applicant_id, accepted.offer_id
        ))
        .await?;
        Ok(())
    }

    /// Marks your offer as completed and records the exchange.
    ///
    /// The provider then claims the credits with `/claim`.
    #[poise::command(slash_command, rename = "complete")]
    pub async fn offer_complete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Offer id"]
        #[autocomplete = "autocomplete::autocomplete_open_offer"]
        offer_id: i64,
    ) -> Result<()> {
        let completion = ctx.data().timebank.complete_offer(&ctx, offer_id).await?;

        let headline = match completion.status {
            CompletionStatus::Completed => "✅ Offer completed",
            CompletionStatus::AlreadyCompleted => "ℹ️ Offer was already completed",
        };
        ctx.say(format!(
            "{headline}: #{offer_id}. <@{}> can claim {}h with `/claim {}`",
            completion.provider_id, completion.credits_transferred, completion.transaction_id
        ))
        .await?;
        Ok(())
    }

    /// Lists the offers you posted.
    #[poise::command(slash_command, rename = "mine")]
    pub async fn offer_mine(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let offers = ctx.data().timebank.my_offers(&ctx).await?;

        if offers.is_empty() {
            ctx.say("You have not posted any offers. Use `/offer create` to start.")
                .await?;
            return Ok(());
        }

        let lines = offers
            .iter()
            .map(|o| format!("#{} {} - {}h, {:?}", o.id, o.title, o.time_credits, o.status));
        ctx.say(bounded_list("**Your offers**\n", lines, MAX_MESSAGE_LEN))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
