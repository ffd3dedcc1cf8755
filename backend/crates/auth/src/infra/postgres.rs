//! PostgreSQL Repository Implementations

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::entity::{account::Account, identity::ExternalIdentity, person::Person};
use crate::domain::repository::{AccountRepository, EmailIndex, IdentityRepository, LinkRepository};
use crate::domain::value_object::{
    account_id::AccountId, composite_id::CompositeId, email::Email, role::Role,
};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Identity Repository Implementation
// ============================================================================

impl IdentityRepository for PgAuthRepository {
    async fn find_by_composite_id(
        &self,
        composite_id: &CompositeId,
    ) -> AuthResult<Option<ExternalIdentity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT
                composite_id,
                provider_name,
                provider_url,
                provider_id,
                account_id,
                credential_secret,
                person,
                person_raw,
                created_at,
                updated_at
            FROM auth_identities
            WHERE composite_id = $1
            "#,
        )
        .bind(composite_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(IdentityRow::into_identity))
    }

    async fn find_many(&self, composite_ids: &[CompositeId]) -> AuthResult<Vec<ExternalIdentity>> {
        if composite_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = composite_ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT
                composite_id,
                provider_name,
                provider_url,
                provider_id,
                account_id,
                credential_secret,
                person,
                person_raw,
                created_at,
                updated_at
            FROM auth_identities
            WHERE composite_id = ANY($1)
            "#,
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        let mut by_key: HashMap<String, IdentityRow> = rows
            .into_iter()
            .map(|row| (row.composite_id.clone(), row))
            .collect();

        Ok(composite_ids
            .iter()
            .filter_map(|id| by_key.remove(id.as_str()))
            .map(IdentityRow::into_identity)
            .collect())
    }
}

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl AccountRepository for PgAuthRepository {
    async fn find_by_id(&self, account_id: &AccountId) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                account_id,
                linked_identities,
                roles,
                created_at,
                updated_at
            FROM auth_accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccountRow::into_account))
    }
}

// ============================================================================
// Email Index Implementation
// ============================================================================

impl EmailIndex for PgAuthRepository {
    async fn lookup_account_id(&self, email: &Email) -> AuthResult<Option<AccountId>> {
        let account_id: Option<Uuid> =
            sqlx::query_scalar("SELECT account_id FROM auth_account_emails WHERE email = $1")
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(account_id.map(AccountId::from_uuid))
    }

    async fn link(&self, account_id: &AccountId, email: &Email) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_account_emails (email, account_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(email.as_str())
        .bind(account_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Link Repository Implementation
// ============================================================================

impl LinkRepository for PgAuthRepository {
    async fn save_link(&self, account: &Account, identity: &ExternalIdentity) -> AuthResult<()> {
        let composite_id = identity.composite_id()?;
        let account_id = identity.account_id.unwrap_or(account.account_id);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO auth_accounts (
                account_id,
                linked_identities,
                roles,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id) DO UPDATE SET
                linked_identities = auth_accounts.linked_identities || ARRAY(
                    SELECT key
                    FROM unnest(EXCLUDED.linked_identities) WITH ORDINALITY AS incoming(key, ord)
                    WHERE NOT (key = ANY(auth_accounts.linked_identities))
                    ORDER BY ord
                ),
                roles = ARRAY(
                    SELECT DISTINCT unnest(auth_accounts.roles || EXCLUDED.roles)
                ),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(account.account_id.as_uuid())
        .bind(linked_keys(account))
        .bind(role_codes(account))
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await?;

        let saved = sqlx::query(
            r#"
            INSERT INTO auth_identities (
                composite_id,
                provider_name,
                provider_url,
                provider_id,
                account_id,
                credential_secret,
                person,
                person_raw,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (composite_id) DO UPDATE SET
                provider_name = EXCLUDED.provider_name,
                provider_url = EXCLUDED.provider_url,
                credential_secret = EXCLUDED.credential_secret,
                person = EXCLUDED.person,
                person_raw = EXCLUDED.person_raw,
                updated_at = EXCLUDED.updated_at
            WHERE auth_identities.account_id = EXCLUDED.account_id
            "#,
        )
        .bind(composite_id.as_str())
        .bind(&identity.provider_name)
        .bind(&identity.provider_url)
        .bind(&identity.provider_id)
        .bind(account_id.as_uuid())
        .bind(identity.credential_secret.as_deref())
        .bind(Json(&identity.person))
        .bind(identity.person_raw.as_ref())
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&mut *tx)
        .await?;

        // Zero rows: the identity is stored under another account.
        if saved.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AuthError::LinkConflict { composite_id });
        }

        tx.commit().await?;

        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

fn linked_keys(account: &Account) -> Vec<String> {
    account
        .linked_identities
        .iter()
        .map(|id| id.as_str().to_string())
        .collect()
}

fn role_codes(account: &Account) -> Vec<String> {
    account.roles.iter().map(|r| r.code().to_string()).collect()
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    composite_id: String,
    provider_name: String,
    provider_url: String,
    provider_id: String,
    account_id: Uuid,
    credential_secret: Option<Vec<u8>>,
    person: Json<Person>,
    person_raw: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_identity(self) -> ExternalIdentity {
        ExternalIdentity {
            provider_name: self.provider_name,
            provider_url: self.provider_url,
            provider_id: self.provider_id,
            account_id: Some(AccountId::from_uuid(self.account_id)),
            credential_secret: self.credential_secret,
            person: self.person.0,
            person_raw: self.person_raw,
            is_admin: false,
            allocates_account: false,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    account_id: Uuid,
    linked_identities: Vec<String>,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> Account {
        Account {
            account_id: AccountId::from_uuid(self.account_id),
            linked_identities: self
                .linked_identities
                .into_iter()
                .map(CompositeId::from_db)
                .collect(),
            roles: self.roles.iter().map(Role::new).collect::<BTreeSet<_>>(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
