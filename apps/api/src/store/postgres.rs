use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::models::attendee::{AttendeeRecord, AttendeeRow};
use crate::models::checkin::{CheckinEvent, CheckinRow, Meal};
use crate::models::judging::{JudgingScoreEntry, JudgingScoreRow};
use crate::models::profile::{ProfilePatch, ProfileRecord, TeammateCandidate};
use crate::store::{contains_pattern, AttendeeStore, StoreError};

const ATTENDEE_COLUMNS: &str = "submission_id, respondent_id, submitted_at, first_name, last_name, \
     display_name, email_address, phone_number, date_of_birth, school, grade, city, parent_name, \
     parent_email, parent_phone, participating_solo, looking_for_teammates, teammates, \
     is_vegetarian, allergies";

/// Columns rewritten when an upsert hits an existing `submission_id`.
const ATTENDEE_UPDATE_COLUMNS: &[&str] = &[
    "respondent_id",
    "submitted_at",
    "first_name",
    "last_name",
    "display_name",
    "email_address",
    "phone_number",
    "date_of_birth",
    "school",
    "grade",
    "city",
    "parent_name",
    "parent_email",
    "parent_phone",
    "participating_solo",
    "looking_for_teammates",
    "teammates",
    "is_vegetarian",
    "allergies",
];

const CANDIDATE_COLUMNS: &str = "id, full_name, first_name, last_name, email";

const NAME_MATCH: &str =
    "(full_name ILIKE {p} OR (coalesce(first_name, '') || ' ' || coalesce(last_name, '')) ILIKE {p})";

/// PostgreSQL-backed store. Schema is owned by `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_attendee_values(builder: &mut QueryBuilder<'_, Postgres>, records: &[AttendeeRecord]) {
    builder.push_values(records, |mut row, r| {
        row.push_bind(r.submission_id.as_ref().map(|id| id.to_string()))
            .push_bind(r.respondent_id.as_ref().map(|id| id.to_string()))
            .push_bind(r.submitted_at)
            .push_bind(r.first_name.clone())
            .push_bind(r.last_name.clone())
            .push_bind(r.display_name.clone())
            .push_bind(r.email_address.clone())
            .push_bind(r.phone_number.clone())
            .push_bind(r.date_of_birth)
            .push_bind(r.school.clone())
            .push_bind(r.grade.clone())
            .push_bind(r.city.clone())
            .push_bind(r.parent_name.clone())
            .push_bind(r.parent_email.clone())
            .push_bind(r.parent_phone.clone())
            .push_bind(r.participating_solo)
            .push_bind(r.looking_for_teammates)
            .push_bind(r.teammates.clone())
            .push_bind(r.is_vegetarian)
            .push_bind(r.allergies.clone());
    });
}

/// Text columns count as empty when NULL or blank; other columns only when NULL.
fn fill_text_sql(column: &str, param: usize) -> String {
    format!(
        "{column} = CASE WHEN btrim(coalesce({column}, '')) = '' THEN coalesce(${param}, {column}) ELSE {column} END"
    )
}

fn fill_sql(column: &str, param: usize) -> String {
    format!("{column} = coalesce({column}, ${param})")
}

fn update_profile_sql() -> String {
    let assignments = [
        fill_text_sql("full_name", 2),
        fill_text_sql("first_name", 3),
        fill_text_sql("last_name", 4),
        fill_text_sql("phone_number", 5),
        fill_sql("date_of_birth", 6),
        fill_text_sql("school", 7),
        fill_text_sql("grade", 8),
        fill_text_sql("city", 9),
        fill_text_sql("parent_name", 10),
        fill_text_sql("parent_email", 11),
        fill_text_sql("parent_phone", 12),
        fill_sql("participating_solo", 13),
        fill_sql("looking_for_teammates", 14),
        fill_text_sql("teammates", 15),
        fill_sql("is_vegetarian", 16),
        fill_text_sql("allergies", 17),
        fill_text_sql("submission_id", 18),
    ];
    format!(
        "UPDATE profiles SET {}, updated_at = now() WHERE id = $1",
        assignments.join(", ")
    )
}

#[async_trait]
impl AttendeeStore for PgStore {
    async fn find_attendee_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AttendeeRecord>, StoreError> {
        let row: Option<AttendeeRow> = sqlx::query_as(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM attendees \
             WHERE lower(email_address) = lower($1) \
             ORDER BY submitted_at DESC NULLS LAST LIMIT 1"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AttendeeRecord::from))
    }

    async fn existing_submission_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<String> = sqlx::query_scalar(
            "SELECT submission_id FROM attendees WHERE submission_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(found.into_iter().collect())
    }

    async fn upsert_attendees(&self, records: &[AttendeeRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO attendees ({ATTENDEE_COLUMNS}) "));
        push_attendee_values(&mut builder, records);
        builder.push(" ON CONFLICT (submission_id) DO UPDATE SET ");
        let updates = ATTENDEE_UPDATE_COLUMNS
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        builder.push(updates);

        let result = builder.build().execute(&self.pool).await?;
        debug!("Upserted {} attendee rows", result.rows_affected());
        Ok(result.rows_affected() as usize)
    }

    async fn insert_attendees(&self, records: &[AttendeeRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO attendees ({ATTENDEE_COLUMNS}) "));
        push_attendee_values(&mut builder, records);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn insert_attendee(&self, record: &AttendeeRecord) -> Result<(), StoreError> {
        self.insert_attendees(std::slice::from_ref(record)).await?;
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, StoreError> {
        let profile = sqlx::query_as::<_, ProfileRecord>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn find_profile_by_email(
        &self,
        email: &str,
    ) -> Result<Option<TeammateCandidate>, StoreError> {
        let candidate = sqlx::query_as::<_, TeammateCandidate>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM profiles WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(candidate)
    }

    async fn find_profiles_by_emails(
        &self,
        emails: &[String],
    ) -> Result<Vec<ProfileRecord>, StoreError> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }
        let profiles = sqlx::query_as::<_, ProfileRecord>(
            "SELECT * FROM profiles WHERE lower(email) = ANY($1)",
        )
        .bind(emails)
        .fetch_all(&self.pool)
        .await?;
        Ok(profiles)
    }

    async fn search_profiles_by_name(
        &self,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<TeammateCandidate>, StoreError> {
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM profiles WHERE {} ORDER BY full_name NULLS LAST LIMIT $2",
            NAME_MATCH.replace("{p}", "$1")
        );
        let candidates = sqlx::query_as::<_, TeammateCandidate>(&sql)
            .bind(contains_pattern(needle))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(candidates)
    }

    async fn lookup_teammates(
        &self,
        emails: &[String],
        names: &[String],
    ) -> Result<Vec<TeammateCandidate>, StoreError> {
        if emails.is_empty() && names.is_empty() {
            return Ok(Vec::new());
        }
        let patterns: Vec<String> = names.iter().map(|n| contains_pattern(n)).collect();
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM profiles WHERE email = ANY($1) OR {}",
            NAME_MATCH.replace("{p}", "ANY($2)")
        );
        let candidates = sqlx::query_as::<_, TeammateCandidate>(&sql)
            .bind(emails)
            .bind(&patterns)
            .fetch_all(&self.pool)
            .await?;
        Ok(candidates)
    }

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles
                (id, email, full_name, first_name, last_name, phone_number, date_of_birth,
                 school, grade, city, parent_name, parent_email, parent_phone,
                 participating_solo, looking_for_teammates, teammates, is_vegetarian,
                 allergies, submission_id, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.phone_number)
        .bind(profile.date_of_birth)
        .bind(&profile.school)
        .bind(&profile.grade)
        .bind(&profile.city)
        .bind(&profile.parent_name)
        .bind(&profile.parent_email)
        .bind(&profile.parent_phone)
        .bind(profile.participating_solo)
        .bind(profile.looking_for_teammates)
        .bind(&profile.teammates)
        .bind(profile.is_vegetarian)
        .bind(&profile.allergies)
        .bind(&profile.submission_id)
        .bind(profile.is_admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<bool, StoreError> {
        let result = sqlx::query(&update_profile_sql())
            .bind(id)
            .bind(&patch.full_name)
            .bind(&patch.first_name)
            .bind(&patch.last_name)
            .bind(&patch.phone_number)
            .bind(patch.date_of_birth)
            .bind(&patch.school)
            .bind(&patch.grade)
            .bind(&patch.city)
            .bind(&patch.parent_name)
            .bind(&patch.parent_email)
            .bind(&patch.parent_phone)
            .bind(patch.participating_solo)
            .bind(patch.looking_for_teammates)
            .bind(&patch.teammates)
            .bind(patch.is_vegetarian)
            .bind(&patch.allergies)
            .bind(&patch.submission_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_teammates(&self, id: Uuid, teammates: Option<&str>) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE profiles SET teammates = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(teammates)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_meals_received(&self, id: Uuid, meals: &[Meal]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE profiles SET
                breakfast_received = breakfast_received OR $2,
                lunch_received = lunch_received OR $3,
                dinner_received = dinner_received OR $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(meals.contains(&Meal::Breakfast))
        .bind(meals.contains(&Meal::Lunch))
        .bind(meals.contains(&Meal::Dinner))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_checkin(&self, event: &CheckinEvent) -> Result<(), StoreError> {
        let meals: Vec<String> = event.meals.iter().map(|m| m.as_str().to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO checkins (id, profile_id, meals, dietary_notes, staff_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.profile_id)
        .bind(&meals)
        .bind(&event.dietary_notes)
        .bind(event.staff_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_checkins(&self, profile_id: Uuid) -> Result<Vec<CheckinEvent>, StoreError> {
        let rows = sqlx::query_as::<_, CheckinRow>(
            "SELECT * FROM checkins WHERE profile_id = $1 ORDER BY created_at",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CheckinEvent::from).collect())
    }

    async fn insert_score(&self, entry: &JudgingScoreEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO judging_scores
                (id, project_title, innovation, technical, design, impact, presentation,
                 total, comments, judge_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.project_title)
        .bind(entry.scores.innovation as i16)
        .bind(entry.scores.technical as i16)
        .bind(entry.scores.design as i16)
        .bind(entry.scores.impact as i16)
        .bind(entry.scores.presentation as i16)
        .bind(entry.total)
        .bind(&entry.comments)
        .bind(entry.judge_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_scores(&self) -> Result<Vec<JudgingScoreEntry>, StoreError> {
        let rows = sqlx::query_as::<_, JudgingScoreRow>(
            "SELECT * FROM judging_scores ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JudgingScoreEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sql_guards_text_columns() {
        let sql = update_profile_sql();
        assert!(sql.contains(
            "school = CASE WHEN btrim(coalesce(school, '')) = '' THEN coalesce($7, school) ELSE school END"
        ));
        assert!(sql.contains("date_of_birth = coalesce(date_of_birth, $6)"));
        assert!(sql.ends_with("WHERE id = $1"));
    }

    #[test]
    fn test_update_sql_binds_every_patch_field() {
        let sql = update_profile_sql();
        for param in 2..=18 {
            assert!(sql.contains(&format!("${param}")), "missing ${param}");
        }
    }
}
