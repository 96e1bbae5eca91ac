//! Reconciliation sweep - Server-side repair from authoritative rows.
//!
//! The sweep is the only place missing transactions are created outside of
//! completion, and it derives them from stored offer and application rows, never
//! from anything a client sent. It also reports duplicate transactions for one
//! (offer, provider) pair without touching them, and rewrites balance counters
//! that drifted from their replay value.

use crate::{
    core::{
        ledger::{self, BalanceCheck},
        offer::accepted_applications,
        transaction::{self as transactions, NewTransaction},
    },
    entities::{Offer, OfferStatus, Transaction, offer, transaction},
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use std::collections::BTreeMap;

/// Data inconsistency that needs a human.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Offer the problem was found on
    pub offer_id: i64,
    /// Provider involved, if known
    pub provider_id: Option<String>,
    /// What is wrong
    pub detail: String,
}

/// Everything one sweep did and found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Completed offers inspected
    pub offers_checked: usize,
    /// Transactions created for completed offers that had none
    pub backfilled: Vec<transaction::Model>,
    /// Problems reported for manual reconciliation
    pub violations: Vec<InvariantViolation>,
    /// Balances whose counter was rewritten from replay
    pub repaired_balances: Vec<BalanceCheck>,
}

impl SweepReport {
    /// Whether the sweep found nothing to do.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.backfilled.is_empty() && self.violations.is_empty() && self.repaired_balances.is_empty()
    }
}

/// Groups transactions by (offer, provider) and reports every pair with more than one row.
#[must_use]
pub fn find_duplicates(rows: &[transaction::Model]) -> Vec<InvariantViolation> {
    let mut groups: BTreeMap<(i64, &str), Vec<i64>> = BTreeMap::new();
    for row in rows {
        if let Some(offer_id) = row.offer_id {
            groups
                .entry((offer_id, row.provider_id.as_str()))
                .or_default()
                .push(row.id);
        }
    }

    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((offer_id, provider_id), ids)| InvariantViolation {
            offer_id,
            provider_id: Some(provider_id.to_string()),
            detail: format!("duplicate transactions {ids:?}"),
        })
        .collect()
}

/// Runs one full reconciliation pass.
pub async fn sweep(db: &DatabaseConnection) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    let completed = Offer::find()
        .filter(offer::Column::Status.eq(OfferStatus::Completed))
        .order_by_asc(offer::Column::Id)
        .all(db)
        .await?;
    report.offers_checked = completed.len();

    for offer in completed {
        let accepted = accepted_applications(db, offer.id).await?;
        let Some(provider) = accepted.first() else {
            tracing::error!(offer_id = offer.id, "completed offer has no accepted applicant");
            report.violations.push(InvariantViolation {
                offer_id: offer.id,
                provider_id: None,
                detail: "completed without an accepted applicant".to_string(),
            });
            continue;
        };

        if transactions::find_for_offer_and_provider(db, offer.id, &provider.applicant_id)
            .await?
            .is_some()
        {
            continue;
        }

        let created = transactions::find_or_create(
            db,
            NewTransaction {
                offer_id: offer.id,
                provider_id: provider.applicant_id.clone(),
                requester_id: offer.owner_id.clone(),
                hours: offer.time_credits,
                service: offer.service_type.clone(),
            },
        )
        .await?;
        tracing::warn!(
            offer_id = offer.id,
            transaction_id = created.id,
            provider_id = %created.provider_id,
            "backfilled missing transaction"
        );
        report.backfilled.push(created);
    }

    let linked = Transaction::find()
        .filter(transaction::Column::OfferId.is_not_null())
        .all(db)
        .await?;
    for violation in find_duplicates(&linked) {
        tracing::error!(
            offer_id = violation.offer_id,
            provider_id = ?violation.provider_id,
            detail = %violation.detail,
            "ledger invariant violated"
        );
        report.violations.push(violation);
    }

    for user_id in ledger::list_balance_holders(db).await? {
        if let Some(check) = ledger::reconcile_balance(db, &user_id).await? {
            if check.repaired {
                report.repaired_balances.push(check);
            }
        }
    }

    tracing::info!(
        offers_checked = report.offers_checked,
        backfilled = report.backfilled.len(),
        violations = report.violations.len(),
        repaired = report.repaired_balances.len(),
        "reconciliation sweep finished"
    );
    Ok(report)
}
