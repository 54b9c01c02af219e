//! Account domain - DB queries for linked social accounts

use sqlx::{Executor, Postgres};

use crate::domain::models::{Account, Provider};
use crate::error::StoreError;

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    user_id: String,
    provider: String,
    provider_account_id: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            provider: Provider::from(row.provider.as_str()),
            id: row.id,
            owner_id: row.user_id,
            provider_account_id: row.provider_account_id,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
        }
    }
}

/// Accounts among `ids` that belong to `user_id`. Others are silently excluded.
pub async fn find_accounts_for_owner<'e, E>(
    executor: E,
    ids: &[String],
    user_id: &str,
) -> Result<Vec<Account>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<AccountRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, provider, provider_account_id,
               access_token, refresh_token, expires_at
        FROM accounts
        WHERE id = ANY($1) AND user_id = $2
        "#,
    )
    .bind(ids)
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Account::from).collect())
}

pub async fn find_account<'e, E>(executor: E, account_id: &str) -> Result<Option<Account>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<AccountRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, provider, provider_account_id,
               access_token, refresh_token, expires_at
        FROM accounts
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Account::from))
}

/// Overwrite the token pair after a refresh.
/// A `None` refresh token keeps the stored one.
pub async fn update_account_tokens<'e, E>(
    executor: E,
    account_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: i64,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE accounts SET
            access_token = $2,
            refresh_token = COALESCE($3, refresh_token),
            expires_at = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .execute(executor)
    .await?;

    Ok(())
}
