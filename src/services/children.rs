use sqlx::PgPool;
use uuid::Uuid;

use crate::models::child::{Child, CreateChildRequest, UpdateChildRequest};

pub struct ChildService;

impl ChildService {
    pub async fn list(pool: &PgPool) -> anyhow::Result<Vec<Child>> {
        let children = sqlx::query_as::<_, Child>(
            "SELECT * FROM children WHERE is_active = TRUE ORDER BY full_name",
        )
        .fetch_all(pool)
        .await?;
        Ok(children)
    }

    pub async fn list_for_parent(pool: &PgPool, parent_id: Uuid) -> anyhow::Result<Vec<Child>> {
        let children = sqlx::query_as::<_, Child>(
            "SELECT c.* FROM children c
             JOIN user_children uc ON uc.child_id = c.id
             WHERE uc.user_id = $1 AND c.is_active = TRUE
             ORDER BY c.full_name",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
        Ok(children)
    }

    pub async fn list_for_group(pool: &PgPool, group_id: Uuid) -> anyhow::Result<Vec<Child>> {
        let children = sqlx::query_as::<_, Child>(
            "SELECT * FROM children
             WHERE group_id = $1 AND is_active = TRUE
             ORDER BY full_name",
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;
        Ok(children)
    }

    pub async fn create(pool: &PgPool, req: &CreateChildRequest) -> anyhow::Result<Child> {
        let child = sqlx::query_as::<_, Child>(
            "INSERT INTO children (full_name, birth_date, group_id)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(&req.full_name)
        .bind(req.birth_date)
        .bind(req.group_id)
        .fetch_one(pool)
        .await?;
        Ok(child)
    }

    /// Children leaving the club are deactivated, never deleted — history
    /// and invoices stay reachable.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateChildRequest,
    ) -> anyhow::Result<Child> {
        let child = sqlx::query_as::<_, Child>(
            "UPDATE children
             SET full_name  = COALESCE($1, full_name),
                 birth_date = COALESCE($2, birth_date),
                 group_id   = COALESCE($3, group_id),
                 is_active  = COALESCE($4, is_active),
                 updated_at = NOW()
             WHERE id = $5
             RETURNING *",
        )
        .bind(&req.full_name)
        .bind(req.birth_date)
        .bind(req.group_id)
        .bind(req.is_active)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(child)
    }

    pub async fn is_parent_of(
        pool: &PgPool,
        child_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_children WHERE child_id = $1 AND user_id = $2)",
        )
        .bind(child_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }
}
