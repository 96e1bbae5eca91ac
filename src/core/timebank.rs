//! `TimeBank` facade - The surface front ends call.
//!
//! Each method resolves the caller through an [`IdentityProvider`] and publishes
//! change events once the store has committed. Every store call is bounded by the
//! store timeout; all but offer creation also retry transient failures. Results
//! carry everything needed to render the outcome.

use crate::{
    config::settings::LedgerSettings,
    core::{
        claim::{self, ClaimReceipt, ClaimStatus},
        completion::{self, Completion, CompletionStatus},
        identity::IdentityProvider,
        ledger,
        notify::{ChangeEvent, ChangeNotifier, Collection},
        offer::{self, NewOffer},
        reconcile::{self, SweepReport},
        resilience::{RetryPolicy, with_retry, with_timeout},
        transaction as transactions,
    },
    entities::{application, offer as offer_entity, transaction},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Ledger core bound to a store, a notifier, and settings.
///
/// Cloning is cheap; clones share the store connection and the notifier.
#[derive(Debug, Clone)]
pub struct TimeBank {
    db: Arc<DatabaseConnection>,
    notifier: ChangeNotifier,
    settings: LedgerSettings,
    policy: RetryPolicy,
}

impl TimeBank {
    /// Creates a facade with a fresh notifier.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        Self::with_notifier(db, settings, ChangeNotifier::default())
    }

    /// Creates a facade publishing to an existing notifier.
    #[must_use]
    pub fn with_notifier(
        db: DatabaseConnection,
        settings: LedgerSettings,
        notifier: ChangeNotifier,
    ) -> Self {
        let policy = RetryPolicy::from_settings(&settings);
        Self {
            db: Arc::new(db),
            notifier,
            settings,
            policy,
        }
    }

    /// Notifier observers subscribe to.
    #[must_use]
    pub const fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Underlying store connection.
    #[must_use]
    pub fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Completes an offer owned by the caller.
    pub async fn complete_offer(
        &self,
        identity: &impl IdentityProvider,
        offer_id: i64,
    ) -> Result<Completion> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();

        let completion = with_retry(&self.policy, "complete_offer", move || {
            completion::complete_offer(db, offer_id, caller_id)
        })
        .await?;

        if completion.status == CompletionStatus::Completed {
            self.notifier.publish(ChangeEvent::new(
                Collection::Offers,
                offer_id,
                &[caller_id, completion.provider_id.as_str()],
            ));
        }
        self.notifier.publish(ChangeEvent::new(
            Collection::Transactions,
            completion.transaction_id,
            &[caller_id, completion.provider_id.as_str()],
        ));
        Ok(completion)
    }

    /// Claims the credits of one transaction for the caller.
    pub async fn claim_credits(
        &self,
        identity: &impl IdentityProvider,
        transaction_id: i64,
    ) -> Result<ClaimReceipt> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();
        let grant = self.settings.starting_grant;

        let receipt = with_retry(&self.policy, "claim_credits", move || {
            claim::claim(db, transaction_id, caller_id, grant)
        })
        .await?;

        self.publish_claim(&receipt);
        Ok(receipt)
    }

    /// Claims the caller's credits for an offer.
    pub async fn claim_credits_for_offer(
        &self,
        identity: &impl IdentityProvider,
        offer_id: i64,
    ) -> Result<ClaimReceipt> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();
        let grant = self.settings.starting_grant;

        let receipt = with_retry(&self.policy, "claim_credits_for_offer", move || {
            claim::claim_for_offer(db, offer_id, caller_id, grant)
        })
        .await?;

        self.publish_claim(&receipt);
        Ok(receipt)
    }

    fn publish_claim(&self, receipt: &ClaimReceipt) {
        if receipt.status == ClaimStatus::AlreadyClaimed {
            return;
        }
        let provider = receipt.provider_id.as_str();
        self.notifier.publish(ChangeEvent::new(
            Collection::Transactions,
            receipt.transaction_id,
            &[provider],
        ));
        self.notifier.publish(ChangeEvent::new(
            Collection::TimeBalances,
            provider,
            &[provider],
        ));
    }

    /// The caller's balance, granting the starting credits on first read.
    pub async fn get_balance(&self, identity: &impl IdentityProvider) -> Result<i64> {
        let caller = identity.current_user()?;
        self.balance_of(&caller.id).await
    }

    /// Any user's balance, granting the starting credits on first read.
    pub async fn balance_of(&self, user_id: &str) -> Result<i64> {
        let db = self.database();
        let grant = self.settings.starting_grant;
        with_retry(&self.policy, "get_balance", move || {
            ledger::get_balance(db, user_id, grant)
        })
        .await
    }

    /// Posts an offer owned by the caller.
    pub async fn create_offer(
        &self,
        identity: &impl IdentityProvider,
        new: NewOffer,
    ) -> Result<offer_entity::Model> {
        let caller = identity.current_user()?;
        // No idempotency key on offers, so a retry could post twice.
        let created = with_timeout(
            self.policy.timeout,
            offer::create_offer(self.database(), &caller.id, new),
        )
        .await?;
        self.notifier.publish(ChangeEvent::new(
            Collection::Offers,
            created.id,
            &[caller.id.as_str()],
        ));
        Ok(created)
    }

    /// Applies the caller to an offer.
    pub async fn apply_to_offer(
        &self,
        identity: &impl IdentityProvider,
        offer_id: i64,
    ) -> Result<application::Model> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();

        let application = with_retry(&self.policy, "apply_to_offer", move || {
            offer::apply_to_offer(db, offer_id, caller_id)
        })
        .await?;

        self.notifier.publish(ChangeEvent::new(
            Collection::Applications,
            application.id,
            &[caller_id],
        ));
        self.notifier
            .publish(ChangeEvent::new(Collection::Offers, offer_id, &[caller_id]));
        Ok(application)
    }

    /// Accepts an application on one of the caller's offers.
    pub async fn accept_application(
        &self,
        identity: &impl IdentityProvider,
        application_id: i64,
    ) -> Result<application::Model> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();

        let accepted = with_retry(&self.policy, "accept_application", move || {
            offer::accept_application(db, application_id, caller_id)
        })
        .await?;

        self.notifier.publish(ChangeEvent::new(
            Collection::Applications,
            accepted.id,
            &[caller_id, accepted.applicant_id.as_str()],
        ));
        Ok(accepted)
    }

    /// Offers the caller posted, newest first.
    pub async fn my_offers(
        &self,
        identity: &impl IdentityProvider,
    ) -> Result<Vec<offer_entity::Model>> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();
        with_retry(&self.policy, "my_offers", move || {
            offer::list_offers_by_owner(db, caller_id)
        })
        .await
    }

    /// Applications on one of the caller's offers, oldest first.
    ///
    /// # Errors
    /// - `NotFound` if the offer does not exist
    /// - `Unauthorized` if the caller does not own the offer
    pub async fn applications_for(
        &self,
        identity: &impl IdentityProvider,
        offer_id: i64,
    ) -> Result<(offer_entity::Model, Vec<application::Model>)> {
        let caller = identity.current_user()?;
        let db = self.database();

        let found = with_retry(&self.policy, "get_offer", move || {
            offer::get_offer_by_id(db, offer_id)
        })
        .await?
        .ok_or(Error::NotFound {
            entity: "offer",
            id: offer_id,
        })?;
        if found.owner_id != caller.id {
            return Err(Error::Unauthorized {
                user_id: caller.id,
                action: "view applications for this offer",
            });
        }

        let applications = with_retry(&self.policy, "list_applications", move || {
            offer::list_applications(db, offer_id)
        })
        .await?;
        Ok((found, applications))
    }

    /// Exchanges the caller delivered, newest first.
    pub async fn provided_transactions(
        &self,
        identity: &impl IdentityProvider,
    ) -> Result<Vec<transaction::Model>> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();
        with_retry(&self.policy, "provided_transactions", move || {
            transactions::list_provided_by(db, caller_id)
        })
        .await
    }

    /// Exchanges the caller requested, newest first.
    pub async fn requested_transactions(
        &self,
        identity: &impl IdentityProvider,
    ) -> Result<Vec<transaction::Model>> {
        let caller = identity.current_user()?;
        let db = self.database();
        let caller_id = caller.id.as_str();
        with_retry(&self.policy, "requested_transactions", move || {
            transactions::list_requested_by(db, caller_id)
        })
        .await
    }

    /// Runs a reconciliation sweep and announces what it changed.
    pub async fn run_sweep(&self) -> Result<SweepReport> {
        let db = self.database();
        let report =
            with_retry(&self.policy, "run_sweep", move || reconcile::sweep(db)).await?;

        for created in &report.backfilled {
            self.notifier.publish(ChangeEvent::new(
                Collection::Transactions,
                created.id,
                &[created.user_id.as_str(), created.provider_id.as_str()],
            ));
        }
        for check in &report.repaired_balances {
            self.notifier.publish(ChangeEvent::new(
                Collection::TimeBalances,
                &check.user_id,
                &[check.user_id.as_str()],
            ));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::identity::StaticIdentity;
    use crate::core::notify::{ChangeFilter, Notification};
    use crate::test_utils::*;
    use sea_orm::TransactionTrait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn bank() -> Result<TimeBank> {
        Ok(TimeBank::new(setup_test_db().await?, test_settings()))
    }

    #[tokio::test]
    async fn test_end_to_end_exchange() -> Result<()> {
        let bank = bank().await?;
        let owner = StaticIdentity::user("owner");
        let provider = StaticIdentity::user("provider");

        let offer = bank
            .create_offer(
                &owner,
                NewOffer {
                    title: "Paint the fence".to_string(),
                    description: "About three hours".to_string(),
                    service_type: "Handywork".to_string(),
                    time_credits: 3,
                },
            )
            .await?;
        let application = bank.apply_to_offer(&provider, offer.id).await?;
        bank.accept_application(&owner, application.id).await?;

        let completion = bank.complete_offer(&owner, offer.id).await?;
        assert_eq!(completion.credits_transferred, 3);
        assert_eq!(bank.get_balance(&provider).await?, 0);

        let receipt = bank.claim_credits(&provider, completion.transaction_id).await?;
        assert_eq!(receipt.status, ClaimStatus::Claimed);
        assert_eq!(bank.get_balance(&provider).await?, 3);

        let again = bank.claim_credits(&provider, completion.transaction_id).await?;
        assert_eq!(again.status, ClaimStatus::AlreadyClaimed);
        assert_eq!(bank.get_balance(&provider).await?, 3);

        let provided = bank.provided_transactions(&provider).await?;
        assert_eq!(provided.len(), 1);
        assert!(provided[0].claimed);
        assert_eq!(bank.requested_transactions(&owner).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unauthenticated_calls_are_rejected() -> Result<()> {
        let bank = bank().await?;
        let nobody = StaticIdentity::anonymous();

        assert!(matches!(
            bank.get_balance(&nobody).await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            bank.claim_credits(&nobody, 1).await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            bank.complete_offer(&nobody, 1).await,
            Err(Error::Unauthenticated)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_starting_grant_applies_to_new_users() -> Result<()> {
        let db = setup_test_db().await?;
        let bank = TimeBank::new(db, LedgerSettings::default());

        assert_eq!(bank.balance_of("newcomer").await?, 30);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_publishes_balance_invalidation() -> Result<()> {
        let bank = bank().await?;
        let (offer, _) = create_accepted_offer(bank.database(), "owner", "provider", 2).await?;
        let completion = bank
            .complete_offer(&StaticIdentity::user("owner"), offer.id)
            .await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = bank.notifier().subscribe(
            Collection::TimeBalances,
            ChangeFilter::User("provider".to_string()),
            move |n| {
                let _ = tx.send(n);
            },
        );

        bank.claim_credits(&StaticIdentity::user("provider"), completion.transaction_id)
            .await?;

        let got = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match got {
            Notification::Changed(event) => assert_eq!(event.entity_id, "provider"),
            Notification::Resync(_) => panic!("unexpected resync"),
        }
        subscription.unsubscribe();
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_through_facade() -> Result<()> {
        let bank = bank().await?;
        let report = bank.run_sweep().await?;
        assert!(report.is_clean());
        Ok(())
    }

    #[tokio::test]
    async fn test_clones_share_the_store() -> Result<()> {
        let bank = bank().await?;
        let handle = bank.clone();
        let owner = StaticIdentity::user("owner");

        create_test_offer(handle.database(), "owner", 2).await?;
        assert_eq!(bank.my_offers(&owner).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_blocked_store_surfaces_as_unavailable() -> Result<()> {
        let settings = LedgerSettings {
            store_timeout_ms: 50,
            retry_attempts: 1,
            ..test_settings()
        };
        let bank = TimeBank::new(setup_test_db().await?, settings);
        let owner = StaticIdentity::user("owner");

        // The in-memory store has a single connection; an open transaction holds it.
        let blocker = bank.database().begin().await?;

        assert!(matches!(
            bank.run_sweep().await,
            Err(Error::StoreUnavailable { .. })
        ));
        assert!(matches!(
            bank.my_offers(&owner).await,
            Err(Error::StoreUnavailable { .. })
        ));
        assert!(matches!(
            bank.create_offer(
                &owner,
                NewOffer {
                    title: "Walk the dog".to_string(),
                    description: String::new(),
                    service_type: String::new(),
                    time_credits: 1,
                },
            )
            .await,
            Err(Error::StoreUnavailable { .. })
        ));

        blocker.rollback().await?;
        assert!(bank.run_sweep().await?.is_clean());
        assert!(bank.my_offers(&owner).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_applications_for_is_owner_only() -> Result<()> {
        let bank = bank().await?;
        let (offer, accepted) =
            create_accepted_offer(bank.database(), "owner", "provider", 2).await?;

        let (found, applications) = bank
            .applications_for(&StaticIdentity::user("owner"), offer.id)
            .await?;
        assert_eq!(found.id, offer.id);
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].id, accepted.id);

        assert!(matches!(
            bank.applications_for(&StaticIdentity::user("provider"), offer.id)
                .await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            bank.applications_for(&StaticIdentity::anonymous(), offer.id)
                .await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            bank.applications_for(&StaticIdentity::user("owner"), 404).await,
            Err(Error::NotFound { entity: "offer", id: 404 })
        ));
        Ok(())
    }
}
