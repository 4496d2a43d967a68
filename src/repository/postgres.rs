use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    Capabilities, Module, NewModule, NewRole, NewUser, PermissionGrant, Role, UpdateRoleRequest,
    User, UserChanges,
};
use async_trait::async_trait;
use sqlx::PgPool;

const USER_COLUMNS: &str = "id, email, username, hashed_password, full_name, is_active, \
     can_access_system, is_superuser, role_id, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Cascades and uniqueness are enforced by the schema in `migrations/`; this
/// type translates constraint violations into `RepositoryError` variants.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// classify
///
/// Turns a unique-constraint violation into `UniqueViolation` naming the
/// offending field and a foreign-key violation into `ForeignKeyViolation`;
/// every other error stays a database error.
fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let what = match db.constraint() {
                Some("roles_key_key") => "Role key",
                Some("modules_key_key") => "Module key",
                Some("users_email_key") => "Email",
                Some("users_username_key") => "Username",
                Some("uq_role_module") => "Permission grant",
                _ => "Record",
            };
            return RepositoryError::UniqueViolation(what.to_string());
        }
        if db.is_foreign_key_violation() {
            let reason = match db.constraint() {
                Some("users_role_id_fkey") => "Role is still assigned to users",
                Some("role_module_permissions_role_id_fkey") => "Role does not exist",
                Some("role_module_permissions_module_id_fkey") => "Module does not exist",
                _ => "Referenced record is missing or still in use",
            };
            return RepositoryError::ForeignKeyViolation(reason.to_string());
        }
    }
    tracing::error!("database error: {:?}", err);
    RepositoryError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- ROLES ---

    async fn list_roles(&self) -> RepoResult<Vec<Role>> {
        sqlx::query_as::<_, Role>("SELECT id, key, name, description, is_system FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT id, key, name, description, is_system FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_role_by_key(&self, key: &str) -> RepoResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT id, key, name, description, is_system FROM roles WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_role(&self, role: NewRole) -> RepoResult<Role> {
        sqlx::query_as::<_, Role>(
            r#"INSERT INTO roles (key, name, description, is_system)
               VALUES ($1, $2, $3, $4)
               RETURNING id, key, name, description, is_system"#,
        )
        .bind(role.key)
        .bind(role.name)
        .bind(role.description)
        .bind(role.is_system)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    /// update_role
    ///
    /// Uses `COALESCE` so only the fields present in the patch are written.
    async fn update_role(&self, id: i64, patch: &UpdateRoleRequest) -> RepoResult<Option<Role>> {
        sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET key = COALESCE($2, key),
                name = COALESCE($3, name),
                description = COALESCE($4, description)
            WHERE id = $1
            RETURNING id, key, name, description, is_system
            "#,
        )
        .bind(id)
        .bind(patch.key.as_deref())
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    /// delete_role
    ///
    /// Grants go with the role through `ON DELETE CASCADE`.
    async fn delete_role(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_users_with_role(&self, role_id: i64) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    // --- MODULES ---

    async fn list_modules(&self) -> RepoResult<Vec<Module>> {
        sqlx::query_as::<_, Module>("SELECT id, key, name, description FROM modules ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_module_by_key(&self, key: &str) -> RepoResult<Option<Module>> {
        sqlx::query_as::<_, Module>("SELECT id, key, name, description FROM modules WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_module(&self, module: NewModule) -> RepoResult<Module> {
        sqlx::query_as::<_, Module>(
            r#"INSERT INTO modules (key, name, description)
               VALUES ($1, $2, $3)
               RETURNING id, key, name, description"#,
        )
        .bind(module.key)
        .bind(module.name)
        .bind(module.description)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn update_module(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<Option<Module>> {
        sqlx::query_as::<_, Module>(
            r#"UPDATE modules SET name = $2, description = $3
               WHERE id = $1
               RETURNING id, key, name, description"#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn delete_module(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(res.rows_affected() > 0)
    }

    // --- PERMISSION GRANTS ---

    async fn find_grant(&self, role_id: i64, module_key: &str) -> RepoResult<Option<PermissionGrant>> {
        sqlx::query_as::<_, PermissionGrant>(
            r#"
            SELECT p.id, p.role_id, p.module_id, p.can_read, p.can_create, p.can_update, p.can_delete
            FROM role_module_permissions p
            JOIN modules m ON m.id = p.module_id
            WHERE p.role_id = $1 AND m.key = $2
            "#,
        )
        .bind(role_id)
        .bind(module_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn list_grants_for_role(&self, role_id: i64) -> RepoResult<Vec<PermissionGrant>> {
        sqlx::query_as::<_, PermissionGrant>(
            r#"SELECT id, role_id, module_id, can_read, can_create, can_update, can_delete
               FROM role_module_permissions
               WHERE role_id = $1
               ORDER BY module_id"#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    /// upsert_grants
    ///
    /// One transaction for the whole batch. `ON CONFLICT` on the
    /// (role_id, module_id) constraint overwrites all four capabilities, so a
    /// concurrent writer cannot create a duplicate row.
    async fn upsert_grants(&self, role_id: i64, grants: &[(i64, Capabilities)]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        for (module_id, caps) in grants {
            sqlx::query(
                r#"
                INSERT INTO role_module_permissions
                    (role_id, module_id, can_read, can_create, can_update, can_delete)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (role_id, module_id) DO UPDATE
                SET can_read = EXCLUDED.can_read,
                    can_create = EXCLUDED.can_create,
                    can_update = EXCLUDED.can_update,
                    can_delete = EXCLUDED.can_delete
                "#,
            )
            .bind(role_id)
            .bind(module_id)
            .bind(caps.can_read)
            .bind(caps.can_create)
            .bind(caps.can_update)
            .bind(caps.can_delete)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)
    }

    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_user_by_login(&self, identifier: &str) -> RepoResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $1 ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_users(&self, offset: i64, limit: i64) -> RepoResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id OFFSET $1 LIMIT $2");
        sqlx::query_as::<_, User>(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            r#"INSERT INTO users (email, username, hashed_password, full_name, is_active, can_access_system)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.email)
            .bind(user.username)
            .bind(user.hashed_password)
            .bind(user.full_name)
            .bind(user.is_active)
            .bind(user.can_access_system)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    /// update_user
    ///
    /// Same `COALESCE` partial-update approach as `update_role`.
    async fn update_user(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                username = COALESCE($3, username),
                full_name = COALESCE($4, full_name),
                is_active = COALESCE($5, is_active),
                can_access_system = COALESCE($6, can_access_system),
                hashed_password = COALESCE($7, hashed_password),
                role_id = COALESCE($8, role_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.email.as_deref())
            .bind(changes.username.as_deref())
            .bind(changes.full_name.as_deref())
            .bind(changes.is_active)
            .bind(changes.can_access_system)
            .bind(changes.hashed_password.as_deref())
            .bind(changes.role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }
}
