use sqlx::PgPool;
use uuid::Uuid;

use crate::models::group::{
    CreateGroupRequest, Group, GroupTrainer, SetTrainersRequest, UpdateGroupRequest, AGE_LEVELS,
};

const GROUP_COLS: &str =
    "id, name, kindergarten_number, age_level::TEXT AS age_level, created_at, updated_at";

pub struct GroupService;

impl GroupService {
    pub async fn list(pool: &PgPool) -> anyhow::Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(&format!(
            "SELECT {GROUP_COLS} FROM groups ORDER BY kindergarten_number, name"
        ))
        .fetch_all(pool)
        .await?;
        Ok(groups)
    }

    pub async fn list_for_trainer(pool: &PgPool, trainer_id: Uuid) -> anyhow::Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(&format!(
            "SELECT g.id, g.name, g.kindergarten_number, g.age_level::TEXT AS age_level,
                    g.created_at, g.updated_at
             FROM groups g
             JOIN group_trainers gt ON gt.group_id = g.id
             WHERE gt.trainer_id = $1
             ORDER BY g.kindergarten_number, g.name"
        ))
        .bind(trainer_id)
        .fetch_all(pool)
        .await?;
        Ok(groups)
    }

    pub async fn create(pool: &PgPool, req: &CreateGroupRequest) -> anyhow::Result<Group> {
        anyhow::ensure!(
            AGE_LEVELS.contains(&req.age_level.as_str()),
            "Недопустимая возрастная группа: {}",
            req.age_level
        );
        let group = sqlx::query_as::<_, Group>(&format!(
            "INSERT INTO groups (name, kindergarten_number, age_level)
             VALUES ($1, $2, $3::age_level)
             RETURNING {GROUP_COLS}"
        ))
        .bind(&req.name)
        .bind(&req.kindergarten_number)
        .bind(&req.age_level)
        .fetch_one(pool)
        .await?;
        Ok(group)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateGroupRequest,
    ) -> anyhow::Result<Group> {
        if let Some(ref level) = req.age_level {
            anyhow::ensure!(
                AGE_LEVELS.contains(&level.as_str()),
                "Недопустимая возрастная группа: {level}"
            );
        }
        let group = sqlx::query_as::<_, Group>(&format!(
            "UPDATE groups
             SET name                = COALESCE($1, name),
                 kindergarten_number = COALESCE($2, kindergarten_number),
                 age_level           = COALESCE($3::age_level, age_level),
                 updated_at          = NOW()
             WHERE id = $4
             RETURNING {GROUP_COLS}"
        ))
        .bind(&req.name)
        .bind(&req.kindergarten_number)
        .bind(&req.age_level)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(group)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Replace the trainer assignment of a group.
    pub async fn set_trainers(
        pool: &PgPool,
        group_id: Uuid,
        req: &SetTrainersRequest,
    ) -> anyhow::Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM group_trainers WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        for trainer_id in &req.trainer_ids {
            sqlx::query(
                "INSERT INTO group_trainers (group_id, trainer_id)
                 VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(group_id)
            .bind(trainer_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_trainers(pool: &PgPool, group_id: Uuid) -> anyhow::Result<Vec<GroupTrainer>> {
        let trainers = sqlx::query_as::<_, GroupTrainer>(
            "SELECT u.id AS trainer_id, u.full_name, u.phone
             FROM group_trainers gt
             JOIN users u ON u.id = gt.trainer_id
             WHERE gt.group_id = $1
             ORDER BY u.full_name",
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;
        Ok(trainers)
    }
}
