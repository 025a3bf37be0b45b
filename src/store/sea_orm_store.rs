//! SeaORM-backed store.
//!
//! Postgres persistence for users, plans and subscriptions. The schema is
//! created by [`crate::database::Migrator`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};

use super::SubscriptionStore;
use crate::error::{Result, SubledgerError};
use crate::models::{NewSubscription, NewUser, Plan, Subscription, SubscriptionStatus, User};

// =============================================================================
// SeaORM Entities
// =============================================================================

mod entity {
    use sea_orm::entity::prelude::*;

    pub mod plan {
        use super::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
        #[sea_orm(table_name = "plans")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i64,
            pub name: String,
            #[sea_orm(column_type = "Double")]
            pub price: f64,
            /// JSON array of feature strings
            pub features: Json,
            pub duration_days: i32,
            pub created_at: DateTimeWithTimeZone,
            pub updated_at: DateTimeWithTimeZone,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod subscription {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "subscriptions")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i64,
            #[sea_orm(unique)]
            pub user_id: i64,
            pub plan_id: i64,
            pub status: String,
            pub start_date: DateTimeWithTimeZone,
            pub end_date: DateTimeWithTimeZone,
            pub created_at: DateTimeWithTimeZone,
            pub updated_at: DateTimeWithTimeZone,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod user {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "users")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i64,
            pub name: String,
            pub password_hash: String,
            pub created_at: DateTimeWithTimeZone,
            pub updated_at: DateTimeWithTimeZone,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::{plan, subscription, user};

// =============================================================================
// Conversions
// =============================================================================

fn model_to_plan(model: plan::Model) -> Result<Plan> {
    let features: Vec<String> = serde_json::from_value(model.features).map_err(|e| {
        SubledgerError::internal(format!("Plan {} has malformed features: {}", model.id, e))
    })?;

    Ok(Plan {
        id: model.id,
        name: model.name,
        price: model.price,
        features,
        duration_days: model.duration_days,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn model_to_subscription(model: subscription::Model) -> Result<Subscription> {
    Ok(Subscription {
        id: model.id,
        user_id: model.user_id,
        plan_id: model.plan_id,
        status: model.status.parse()?,
        start_date: model.start_date.with_timezone(&Utc),
        end_date: model.end_date.with_timezone(&Utc),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn model_to_user(model: user::Model) -> User {
    User {
        id: model.id,
        name: model.name,
        password_hash: model.password_hash,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn subscription_to_active_model(subscription: &Subscription) -> subscription::ActiveModel {
    subscription::ActiveModel {
        id: Set(subscription.id),
        user_id: Set(subscription.user_id),
        plan_id: Set(subscription.plan_id),
        status: Set(subscription.status.as_str().to_string()),
        start_date: Set(subscription.start_date.fixed_offset()),
        end_date: Set(subscription.end_date.fixed_offset()),
        created_at: Set(subscription.created_at.fixed_offset()),
        updated_at: Set(subscription.updated_at.fixed_offset()),
    }
}

// =============================================================================
// Store
// =============================================================================

/// SeaORM implementation of [`SubscriptionStore`]
#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl SubscriptionStore for SeaOrmStore {
    async fn list_plans(&self) -> Result<Vec<Plan>> {
        tracing::debug!("listing plans");

        plan::Entity::find()
            .order_by_asc(plan::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_plan)
            .collect()
    }

    async fn get_plan(&self, plan_id: i64) -> Result<Option<Plan>> {
        tracing::debug!(plan_id, "fetching plan");

        plan::Entity::find_by_id(plan_id)
            .one(&self.db)
            .await?
            .map(model_to_plan)
            .transpose()
    }

    async fn get_subscription(&self, user_id: i64) -> Result<Option<Subscription>> {
        tracing::debug!(user_id, "fetching subscription");

        subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .map(model_to_subscription)
            .transpose()
    }

    async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription> {
        tracing::debug!(
            user_id = new.user_id,
            plan_id = new.plan_id,
            status = %new.status,
            "inserting subscription"
        );

        let now = Utc::now().fixed_offset();
        let model = subscription::ActiveModel {
            id: NotSet,
            user_id: Set(new.user_id),
            plan_id: Set(new.plan_id),
            status: Set(new.status.as_str().to_string()),
            start_date: Set(new.start_date.fixed_offset()),
            end_date: Set(new.end_date.fixed_offset()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(|e| match SubledgerError::from(e) {
            SubledgerError::Conflict(_) => SubledgerError::conflict(format!(
                "User {} already has a subscription",
                new.user_id
            )),
            other => other,
        })?;

        model_to_subscription(model)
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        tracing::debug!(
            subscription_id = subscription.id,
            user_id = subscription.user_id,
            plan_id = subscription.plan_id,
            status = %subscription.status,
            "updating subscription"
        );

        let mut active = subscription_to_active_model(subscription);
        // created_at is immutable
        active.created_at = NotSet;

        let model = active.update(&self.db).await?;
        model_to_subscription(model)
    }

    async fn cancel_subscription(&self, user_id: i64, now: DateTime<Utc>) -> Result<Subscription> {
        tracing::debug!(user_id, "cancelling subscription");

        // Dropping the transaction on an early return rolls it back
        let txn = self.db.begin().await?;

        let existing = subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                SubledgerError::not_found(format!("No subscription for user {}", user_id))
            })?;

        let mut active: subscription::ActiveModel = existing.into();
        active.status = Set(SubscriptionStatus::Cancelled.as_str().to_string());
        active.updated_at = Set(now.fixed_offset());
        let cancelled = active.update(&txn).await?;

        let deleted = subscription::Entity::delete_by_id(cancelled.id)
            .exec(&txn)
            .await?;
        if deleted.rows_affected != 1 {
            txn.rollback().await?;
            return Err(SubledgerError::database(format!(
                "Expected to delete 1 subscription row for user {}, deleted {}",
                user_id, deleted.rows_affected
            )));
        }

        txn.commit().await?;
        tracing::debug!(user_id, subscription_id = cancelled.id, "subscription cancelled and removed");

        model_to_subscription(cancelled)
    }

    async fn find_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        subscription::Entity::find()
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
            .filter(subscription::Column::EndDate.lte(now.fixed_offset()))
            .order_by_asc(subscription::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_subscription)
            .collect()
    }

    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let now = now.fixed_offset();

        // Conditional on the row still qualifying, so concurrent sweeps and
        // upgrades that raced in are left alone
        let result = subscription::Entity::update_many()
            .col_expr(
                subscription::Column::Status,
                Expr::value(SubscriptionStatus::Expired.as_str()),
            )
            .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
            .filter(subscription::Column::Id.eq(subscription_id))
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
            .filter(subscription::Column::EndDate.lte(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        tracing::debug!(name = %new.name, "inserting user");

        let now = Utc::now().fixed_offset();
        let model = user::ActiveModel {
            id: NotSet,
            name: Set(new.name),
            password_hash: Set(new.password_hash),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        Ok(model_to_user(model))
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await.map_err(SubledgerError::from)
    }
}
