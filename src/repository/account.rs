//! Account repository

use crate::domain::{Account, CreateAccountInput, Metadata, Role, StringUuid, UpdateAccountInput};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

const ACCOUNT_COLUMNS: &str = "id, email, full_name, password_hash, role, is_active, workspace_id, department_id, metadata, created_at, updated_at, created_by_id, updated_by_id";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(
        &self,
        input: &CreateAccountInput,
        password_hash: &str,
        actor_id: Option<StringUuid>,
    ) -> Result<Account>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;
    async fn list(
        &self,
        workspace_id: StringUuid,
        department_id: Option<StringUuid>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Account>>;
    async fn count(
        &self,
        workspace_id: StringUuid,
        department_id: Option<StringUuid>,
    ) -> Result<i64>;
    async fn update(
        &self,
        id: StringUuid,
        input: &UpdateAccountInput,
        actor_id: StringUuid,
    ) -> Result<Account>;
    async fn set_role(
        &self,
        id: StringUuid,
        role: Role,
        department_id: Option<StringUuid>,
        actor_id: StringUuid,
    ) -> Result<Account>;
    async fn set_metadata(
        &self,
        id: StringUuid,
        metadata: &Metadata,
        actor_id: StringUuid,
    ) -> Result<Account>;
    async fn set_active(&self, id: StringUuid, active: bool, actor_id: StringUuid) -> Result<()>;
    async fn count_by_department(&self, department_id: StringUuid) -> Result<i64>;
}

pub struct AccountRepositoryImpl {
    pool: MySqlPool,
}

impl AccountRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for AccountRepositoryImpl {
    async fn create(
        &self,
        input: &CreateAccountInput,
        password_hash: &str,
        actor_id: Option<StringUuid>,
    ) -> Result<Account> {
        let id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, full_name, password_hash, role, is_active, workspace_id, department_id, metadata, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, ?, true, ?, ?, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(id)
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(password_hash)
        .bind(input.role)
        .bind(input.workspace_id)
        .bind(input.department_id)
        .bind(sqlx::types::Json(Metadata::new()))
        .bind(actor_id)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create account")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn list(
        &self,
        workspace_id: StringUuid,
        department_id: Option<StringUuid>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Account>> {
        let mut sql =
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE workspace_id = ?");
        if department_id.is_some() {
            sql.push_str(" AND department_id = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, Account>(&sql).bind(workspace_id);
        if let Some(department_id) = department_id {
            query = query.bind(department_id);
        }
        let accounts = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        Ok(accounts)
    }

    async fn count(
        &self,
        workspace_id: StringUuid,
        department_id: Option<StringUuid>,
    ) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM accounts WHERE workspace_id = ?");
        if department_id.is_some() {
            sql.push_str(" AND department_id = ?");
        }

        let mut query = sqlx::query_as::<_, (i64,)>(&sql).bind(workspace_id);
        if let Some(department_id) = department_id {
            query = query.bind(department_id);
        }
        let row = query.fetch_one(&self.pool).await?;

        Ok(row.0)
    }

    async fn update(
        &self,
        id: StringUuid,
        input: &UpdateAccountInput,
        actor_id: StringUuid,
    ) -> Result<Account> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))?;

        let full_name = input.full_name.as_ref().unwrap_or(&existing.full_name);
        let email = input.email.as_ref().unwrap_or(&existing.email);
        // Absent means keep, explicit null means detach.
        let department_id = match input.department_id {
            Some(value) => value,
            None => existing.department_id,
        };
        let is_active = input.is_active.unwrap_or(existing.is_active);

        sqlx::query(
            r#"
            UPDATE accounts
            SET full_name = ?, email = ?, department_id = ?, is_active = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(full_name)
        .bind(email)
        .bind(department_id)
        .bind(is_active)
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update account")))
    }

    async fn set_role(
        &self,
        id: StringUuid,
        role: Role,
        department_id: Option<StringUuid>,
        actor_id: StringUuid,
    ) -> Result<Account> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET role = ?, department_id = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(role)
        .bind(department_id)
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account {} not found", id)));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update account")))
    }

    async fn set_metadata(
        &self,
        id: StringUuid,
        metadata: &Metadata,
        actor_id: StringUuid,
    ) -> Result<Account> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET metadata = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(sqlx::types::Json(metadata))
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account {} not found", id)));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update account")))
    }

    async fn set_active(&self, id: StringUuid, active: bool, actor_id: StringUuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET is_active = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(active)
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account {} not found", id)));
        }

        Ok(())
    }

    async fn count_by_department(&self, department_id: StringUuid) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE department_id = ?")
                .bind(department_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
