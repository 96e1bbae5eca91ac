//! Credit Discord commands - `claim`, `claim_offer`, `balance`, `history`, and `reconcile`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::autocomplete,
            reply::{MAX_MESSAGE_LEN, bounded_list},
        },
        core::claim::{ClaimReceipt, ClaimStatus},
        entities::TransactionModel,
        errors::{Error, Result},
    };

    fn describe_claim(receipt: &ClaimReceipt) -> String {
        match receipt.status {
            ClaimStatus::Claimed => format!(
                "✅ Claimed {}h from transaction #{}. Balance: {}h",
                receipt.amount, receipt.transaction_id, receipt.balance
            ),
            ClaimStatus::AlreadyClaimed => format!(
                "ℹ️ Transaction #{} was already claimed. Balance: {}h",
                receipt.transaction_id, receipt.balance
            ),
        }
    }

    fn describe_transaction(tx: &TransactionModel) -> String {
        let state = if tx.claimed { "claimed" } else { "unclaimed" };
        format!(
            "#{} {} - {}h ({state}) {}",
            tx.id,
            tx.service,
            tx.hours,
            tx.created_at.format("%Y-%m-%d")
        )
    }

    /// Claims the credits from a transaction you provided.
    #[poise::command(slash_command, prefix_command)]
    pub async fn claim(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Transaction id"]
        #[autocomplete = "autocomplete::autocomplete_unclaimed_transaction"]
        transaction_id: i64,
    ) -> Result<()> {
        let receipt = ctx.data().timebank.claim_credits(&ctx, transaction_id).await?;
        ctx.say(describe_claim(&receipt)).await?;
        Ok(())
    }

    /// Claims your credits for an offer you completed as the provider.
    #[poise::command(slash_command, prefix_command)]
    pub async fn claim_offer(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Offer id"] offer_id: i64,
    ) -> Result<()> {
        let receipt = ctx
            .data()
            .timebank
            .claim_credits_for_offer(&ctx, offer_id)
            .await?;
        ctx.say(describe_claim(&receipt)).await?;
        Ok(())
    }

    /// Shows your time balance.
    #[poise::command(slash_command, prefix_command)]
    pub async fn balance(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let balance = ctx.data().timebank.get_balance(&ctx).await?;
        ctx.say(format!("⏱️ Your balance: {balance}h")).await?;
        Ok(())
    }

    /// Shows exchanges you provided and requested.
    #[poise::command(slash_command, prefix_command)]
    pub async fn history(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let bank = &ctx.data().timebank;
        let provided = bank.provided_transactions(&ctx).await?;
        let requested = bank.requested_transactions(&ctx).await?;

        if provided.is_empty() && requested.is_empty() {
            ctx.say("No exchanges yet.").await?;
            return Ok(());
        }

        let mut lines = Vec::new();
        if !provided.is_empty() {
            lines.push("**Provided**".to_string());
            lines.extend(provided.iter().map(describe_transaction));
        }
        if !requested.is_empty() {
            lines.push("**Requested**".to_string());
            lines.extend(requested.iter().map(describe_transaction));
        }
        ctx.say(bounded_list("", lines, MAX_MESSAGE_LEN)).await?;
        Ok(())
    }

    /// Runs a reconciliation sweep over the whole ledger.
    #[poise::command(slash_command, required_permissions = "ADMINISTRATOR")]
    pub async fn reconcile(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.defer().await?;
        let report = ctx.data().timebank.run_sweep().await?;

        if report.is_clean() {
            ctx.say(format!(
                "✅ Ledger is consistent ({} completed offers checked)",
                report.offers_checked
            ))
            .await?;
            return Ok(());
        }

        let header = format!(
            "**Reconciliation** ({} completed offers checked)\n",
            report.offers_checked
        );
        let backfilled = report.backfilled.iter().map(|tx| {
            format!(
                "➕ Recorded missing transaction #{} for offer #{}",
                tx.id,
                tx.offer_id.unwrap_or_default()
            )
        });
        let repaired = report.repaired_balances.iter().map(|check| {
            format!(
                "🔧 <@{}> balance {}h -> {}h",
                check.user_id, check.recorded, check.replayed
            )
        });
        let violations = report
            .violations
            .iter()
            .map(|violation| format!("⚠️ Offer #{}: {}", violation.offer_id, violation.detail));
        let lines = backfilled.chain(repaired).chain(violations);
        ctx.say(bounded_list(&header, lines, MAX_MESSAGE_LEN)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
