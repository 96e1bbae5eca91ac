//! Offer marketplace - Posting offers, applying, and accepting applicants.
//!
//! These are the flows that lead up to completion. Applying is an insert-if-absent
//! on (offer, applicant), so a double-click never creates two applications.

use crate::{
    entities::{Application, ApplicationStatus, Offer, OfferStatus, application, offer},
    errors::{Error, Result},
};
use sea_orm::{
    QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};

/// Service label used when an offer is posted without one.
pub const DEFAULT_SERVICE_TYPE: &str = "Time Exchange";

/// Fields of a new offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    /// Title shown on the offer card
    pub title: String,
    /// Longer description
    pub description: String,
    /// Service category; blank means [`DEFAULT_SERVICE_TYPE`]
    pub service_type: String,
    /// Credit value in hours
    pub time_credits: i64,
}

/// Posts a new offer owned by `owner_id`.
///
/// The title must not be blank and the credit value must be positive.
pub async fn create_offer<C>(db: &C, owner_id: &str, new: NewOffer) -> Result<offer::Model>
where
    C: ConnectionTrait,
{
    if new.title.trim().is_empty() {
        return Err(Error::Validation {
            message: "Offer title cannot be empty".to_string(),
        });
    }
    if new.time_credits <= 0 {
        return Err(Error::InvalidAmount {
            amount: new.time_credits,
        });
    }

    let service_type = if new.service_type.trim().is_empty() {
        DEFAULT_SERVICE_TYPE.to_string()
    } else {
        new.service_type.trim().to_string()
    };

    let now = chrono::Utc::now();
    let model = offer::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        title: Set(new.title.trim().to_string()),
        description: Set(new.description),
        service_type: Set(service_type),
        time_credits: Set(new.time_credits),
        status: Set(OfferStatus::Available),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    tracing::info!(
        offer_id = created.id,
        owner_id,
        credits = created.time_credits,
        "offer created"
    );
    Ok(created)
}

/// Finds an offer by its unique ID.
pub async fn get_offer_by_id<C>(db: &C, offer_id: i64) -> Result<Option<offer::Model>>
where
    C: ConnectionTrait,
{
    Offer::find_by_id(offer_id).one(db).await.map_err(Into::into)
}

/// Offers posted by a user, newest first.
pub async fn list_offers_by_owner<C>(db: &C, owner_id: &str) -> Result<Vec<offer::Model>>
where
    C: ConnectionTrait,
{
    Offer::find()
        .filter(offer::Column::OwnerId.eq(owner_id))
        .order_by_desc(offer::Column::CreatedAt)
        .order_by_desc(offer::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applications for an offer, oldest first.
pub async fn list_applications<C>(db: &C, offer_id: i64) -> Result<Vec<application::Model>>
where
    C: ConnectionTrait,
{
    Application::find()
        .filter(application::Column::OfferId.eq(offer_id))
        .order_by_asc(application::Column::CreatedAt)
        .order_by_asc(application::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Accepted applications for an offer, earliest first.
///
/// The first element is the one completion credits. More than one only happens
/// when the store does not enforce a single accepted application per offer.
pub async fn accepted_applications<C>(db: &C, offer_id: i64) -> Result<Vec<application::Model>>
where
    C: ConnectionTrait,
{
    Application::find()
        .filter(application::Column::OfferId.eq(offer_id))
        .filter(application::Column::Status.eq(ApplicationStatus::Accepted))
        .order_by_asc(application::Column::UpdatedAt)
        .order_by_asc(application::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies `applicant_id` to an offer. Applying twice returns the first application.
///
/// The owner cannot apply to their own offer, and completed offers take no new
/// applications. The first application moves an available offer to pending.
pub async fn apply_to_offer(
    db: &DatabaseConnection,
    offer_id: i64,
    applicant_id: &str,
) -> Result<application::Model> {
    let txn = db.begin().await?;

    let offer = Offer::find_by_id(offer_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "offer",
            id: offer_id,
        })?;

    if offer.owner_id == applicant_id {
        return Err(Error::Forbidden {
            entity: "offer",
            id: offer_id,
            user_id: applicant_id.to_string(),
        });
    }
    if offer.status == OfferStatus::Completed {
        return Err(Error::Validation {
            message: format!("Offer #{offer_id} is already completed"),
        });
    }

    let now = chrono::Utc::now();
    let row = application::ActiveModel {
        offer_id: Set(offer_id),
        applicant_id: Set(applicant_id.to_string()),
        status: Set(ApplicationStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let inserted = Application::insert(row)
        .on_conflict(
            OnConflict::columns([
                application::Column::OfferId,
                application::Column::ApplicantId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    if inserted > 0 {
        Offer::update_many()
            .col_expr(offer::Column::Status, Expr::value(OfferStatus::Pending))
            .col_expr(offer::Column::UpdatedAt, Expr::value(now))
            .filter(offer::Column::Id.eq(offer_id))
            .filter(offer::Column::Status.eq(OfferStatus::Available))
            .exec(&txn)
            .await?;
    }

    let stored = Application::find()
        .filter(application::Column::OfferId.eq(offer_id))
        .filter(application::Column::ApplicantId.eq(applicant_id))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::ConflictRetry {
            entity: "application",
            key: format!("{offer_id}:{applicant_id}"),
        })?;

    txn.commit().await?;
    tracing::info!(
        offer_id,
        applicant_id,
        application_id = stored.id,
        new = inserted > 0,
        "application recorded"
    );
    Ok(stored)
}

/// Marks an application accepted. Only the offer owner may do this.
pub async fn accept_application(
    db: &DatabaseConnection,
    application_id: i64,
    owner_id: &str,
) -> Result<application::Model> {
    let txn = db.begin().await?;

    let application = Application::find_by_id(application_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "application",
            id: application_id,
        })?;
    let offer = Offer::find_by_id(application.offer_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "offer",
            id: application.offer_id,
        })?;

    if offer.owner_id != owner_id {
        return Err(Error::Unauthorized {
            user_id: owner_id.to_string(),
            action: "accept applications",
        });
    }
    if offer.status == OfferStatus::Completed {
        return Err(Error::Validation {
            message: format!("Offer #{} is already completed", offer.id),
        });
    }
    if application.status == ApplicationStatus::Accepted {
        txn.commit().await?;
        return Ok(application);
    }

    let already_accepted = accepted_applications(&txn, offer.id).await?;
    if !already_accepted.is_empty() {
        tracing::warn!(
            offer_id = offer.id,
            application_id,
            existing = already_accepted.len(),
            "accepting a second applicant; completion credits the earliest"
        );
    }

    let mut active: application::ActiveModel = application.into();
    active.status = Set(ApplicationStatus::Accepted);
    active.updated_at = Set(chrono::Utc::now());
    let accepted = active.update(&txn).await?;

    txn.commit().await?;
    tracing::info!(
        offer_id = offer.id,
        application_id,
        applicant_id = %accepted.applicant_id,
        "application accepted"
    );
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_offer(title: &str, credits: i64) -> NewOffer {
        NewOffer {
            title: title.to_string(),
            description: String::new(),
            service_type: String::new(),
            time_credits: credits,
        }
    }

    #[tokio::test]
    async fn test_create_offer_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_offer(&db, "owner", new_offer("  ", 3)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_offer(&db, "owner", new_offer("Dog walking", 0)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_offer_defaults_service_type() -> Result<()> {
        let db = setup_test_db().await?;

        let offer = create_offer(&db, "owner", new_offer("  Fix my bike ", 2)).await?;
        assert_eq!(offer.title, "Fix my bike");
        assert_eq!(offer.service_type, DEFAULT_SERVICE_TYPE);
        assert_eq!(offer.status, OfferStatus::Available);
        assert_eq!(get_offer_by_id(&db, offer.id).await?, Some(offer));
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_twice_returns_same_application() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 2).await?;

        let first = apply_to_offer(&db, offer.id, "helper").await?;
        let second = apply_to_offer(&db, offer.id, "helper").await?;

        assert_eq!(first, second);
        assert_eq!(list_applications(&db, offer.id).await?.len(), 1);
        let offer = get_offer_by_id(&db, offer.id).await?.unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn test_owner_cannot_apply_to_own_offer() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 2).await?;

        let result = apply_to_offer(&db, offer.id, "owner").await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        assert!(list_applications(&db, offer.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_to_missing_offer() -> Result<()> {
        let db = setup_test_db().await?;

        let result = apply_to_offer(&db, 42, "helper").await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "offer",
                id: 42
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_only_owner_accepts() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 2).await?;
        let application = apply_to_offer(&db, offer.id, "helper").await?;

        let result = accept_application(&db, application.id, "helper").await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));

        let accepted = accept_application(&db, application.id, "owner").await?;
        assert_eq!(accepted.status, ApplicationStatus::Accepted);

        // Accepting again is a no-op.
        let again = accept_application(&db, application.id, "owner").await?;
        assert_eq!(again, accepted);
        Ok(())
    }

    #[tokio::test]
    async fn test_accepted_applications_are_ordered_earliest_first() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 2).await?;
        let first = apply_to_offer(&db, offer.id, "first").await?;
        let second = apply_to_offer(&db, offer.id, "second").await?;

        accept_application(&db, first.id, "owner").await?;
        accept_application(&db, second.id, "owner").await?;

        let accepted = accepted_applications(&db, offer.id).await?;
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].applicant_id, "first");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_offers_by_owner_newest_first() -> Result<()> {
        let db = setup_test_db().await?;
        let older = create_test_offer(&db, "owner", 1).await?;
        let newer = create_test_offer(&db, "owner", 2).await?;
        create_test_offer(&db, "someone_else", 3).await?;

        let offers = list_offers_by_owner(&db, "owner").await?;
        assert_eq!(offers, vec![newer, older]);
        Ok(())
    }
}
