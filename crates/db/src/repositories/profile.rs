use chrono::Utc;
use sqlx::Row;

use chief_core::domain::user::{OrgId, Organization, PlanTier, UserId, UserProfile};

use super::{decode_err, parse_datetime, parse_uuid, ProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let display_name: String = row.try_get("display_name").map_err(decode_err)?;
    let vertical: Option<String> = row.try_get("vertical").map_err(decode_err)?;
    let organization_id: Option<String> =
        row.try_get("organization_id").map_err(decode_err)?;
    let monthly_revenue_goal: Option<String> =
        row.try_get("monthly_revenue_goal").map_err(decode_err)?;
    let mlm_company: Option<String> = row.try_get("mlm_company").map_err(decode_err)?;
    let mlm_rank: Option<String> = row.try_get("mlm_rank").map_err(decode_err)?;
    let mlm_next_rank: Option<String> = row.try_get("mlm_next_rank").map_err(decode_err)?;
    let mlm_team_size: Option<i64> = row.try_get("mlm_team_size").map_err(decode_err)?;
    let plan_tier: String = row.try_get("plan_tier").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(UserProfile {
        id: UserId(parse_uuid(&id)?),
        display_name,
        vertical,
        organization_id: organization_id.map(|s| parse_uuid(&s).map(OrgId)).transpose()?,
        monthly_revenue_goal: monthly_revenue_goal
            .map(|s| super::parse_decimal(&s))
            .transpose()?,
        mlm_company,
        mlm_rank,
        mlm_next_rank,
        mlm_team_size: mlm_team_size.map(|n| n as u32),
        plan_tier: plan_tier.parse::<PlanTier>().map_err(decode_err)?,
        created_at: parse_datetime(&created_at)?,
    })
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_profile(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, display_name, vertical, organization_id, monthly_revenue_goal,
                    mlm_company, mlm_rank, mlm_next_rank, mlm_team_size, plan_tier, created_at
             FROM user_profiles WHERE id = ?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_profile(r)?)),
            None => Ok(None),
        }
    }

    async fn save_profile(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_profiles (id, display_name, vertical, organization_id,
                                        monthly_revenue_goal, mlm_company, mlm_rank,
                                        mlm_next_rank, mlm_team_size, plan_tier, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 vertical = excluded.vertical,
                 organization_id = excluded.organization_id,
                 monthly_revenue_goal = excluded.monthly_revenue_goal,
                 mlm_company = excluded.mlm_company,
                 mlm_rank = excluded.mlm_rank,
                 mlm_next_rank = excluded.mlm_next_rank,
                 mlm_team_size = excluded.mlm_team_size,
                 plan_tier = excluded.plan_tier",
        )
        .bind(profile.id.0.to_string())
        .bind(&profile.display_name)
        .bind(&profile.vertical)
        .bind(profile.organization_id.map(|org| org.0.to_string()))
        .bind(profile.monthly_revenue_goal.map(|goal| goal.to_string()))
        .bind(&profile.mlm_company)
        .bind(&profile.mlm_rank)
        .bind(&profile.mlm_next_rank)
        .bind(profile.mlm_team_size.map(i64::from))
        .bind(profile.plan_tier.as_str())
        .bind(profile.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_organization(
        &self,
        id: &OrgId,
    ) -> Result<Option<Organization>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, storybook, signals FROM organizations WHERE id = ?")
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let raw_id: String = row.try_get("id").map_err(decode_err)?;
        let name: String = row.try_get("name").map_err(decode_err)?;
        let storybook_json: Option<String> = row.try_get("storybook").map_err(decode_err)?;
        let storybook = storybook_json
            .map(|raw| serde_json::from_str(&raw).map_err(decode_err))
            .transpose()?;
        let signals_json: Option<String> = row.try_get("signals").map_err(decode_err)?;
        let signals = signals_json
            .map(|raw| serde_json::from_str(&raw).map_err(decode_err))
            .transpose()?;

        Ok(Some(Organization { id: OrgId(parse_uuid(&raw_id)?), name, storybook, signals }))
    }

    async fn save_organization(&self, organization: Organization) -> Result<(), RepositoryError> {
        let storybook_json = organization
            .storybook
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(decode_err)?;
        let signals_json = organization
            .signals
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO organizations (id, name, storybook, signals, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 storybook = excluded.storybook,
                 signals = excluded.signals",
        )
        .bind(organization.id.0.to_string())
        .bind(&organization.name)
        .bind(&storybook_json)
        .bind(&signals_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
