//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggests the ids a member is most likely to want: their own open offers when
//! completing, and their unclaimed transactions when claiming.

use crate::{
    bot::{
        BotData,
        reply::{MAX_CHOICE_NAME_LEN, clip},
    },
    entities::OfferStatus,
    errors::Error,
};
use poise::serenity_prelude::AutocompleteChoice;

const MAX_CHOICES: usize = 25;

fn matches_partial(id: i64, label: &str, partial: &str) -> bool {
    let partial = partial.trim().to_lowercase();
    partial.is_empty()
        || id.to_string().starts_with(&partial)
        || label.to_lowercase().contains(&partial)
}

/// Choice label `#id label (Nh)` clipped to what Discord accepts, keeping the id and hours.
fn choice_name(id: i64, label: &str, hours: i64) -> String {
    let prefix = format!("#{id} ");
    let suffix = format!(" ({hours}h)");
    let room = MAX_CHOICE_NAME_LEN.saturating_sub(prefix.chars().count() + suffix.chars().count());
    format!("{prefix}{}{suffix}", clip(label, room))
}

/// Suggests the author's offers that are not completed yet.
pub async fn autocomplete_open_offer(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<AutocompleteChoice> {
    let offers = match ctx.data().timebank.my_offers(&ctx).await {
        Ok(offers) => offers,
        Err(e) => {
            tracing::error!("Autocomplete: failed to fetch offers: {e}");
            return Vec::new();
        }
    };

    offers
        .into_iter()
        .filter(|o| o.status != OfferStatus::Completed)
        .filter(|o| matches_partial(o.id, &o.title, partial))
        .take(MAX_CHOICES)
        .map(|o| AutocompleteChoice::new(choice_name(o.id, &o.title, o.time_credits), o.id))
        .collect()
}

/// Suggests transactions the author provided and has not claimed.
pub async fn autocomplete_unclaimed_transaction(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<AutocompleteChoice> {
    let Ok(provided) = ctx.data().timebank.provided_transactions(&ctx).await else {
        return Vec::new();
    };

    provided
        .into_iter()
        .filter(|tx| !tx.claimed)
        .filter(|tx| matches_partial(tx.id, &tx.service, partial))
        .take(MAX_CHOICES)
        .map(|tx| AutocompleteChoice::new(choice_name(tx.id, &tx.service, tx.hours), tx.id))
        .collect()
}
