use std::str::FromStr;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capacity::{validate_default_capacity, validate_units};
use crate::models::{
    CapacityCeiling, ClientStatus, ClientUnit, CoachRecord, NpsResponse, NpsScore,
};

const DEFAULT_CAPACITY_KEY: &str = "default_coach_capacity";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("migrations applied");
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let coaches = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@coachingops.com",
            None,
            false,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@coachingops.com",
            Some(6.0),
            false,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "kiara.patel@coachingops.com",
            None,
            true,
        ),
    ];

    for (id, name, email, max_capacity, is_paused) in coaches {
        sqlx::query(
            r#"
            INSERT INTO coaching_ops.coaches (id, full_name, email, max_capacity, is_paused)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                max_capacity = EXCLUDED.max_capacity,
                is_paused = EXCLUDED.is_paused
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(max_capacity)
        .bind(is_paused)
        .execute(pool)
        .await?;
    }

    let clients = vec![
        ("Riley Chen", "riley.chen@example.com", "avery.lee@coachingops.com", "active", 2.0),
        ("Noor Haddad", "noor.haddad@example.com", "avery.lee@coachingops.com", "active", 1.5),
        ("Theo Walsh", "theo.walsh@example.com", "avery.lee@coachingops.com", "churned", 3.0),
        ("Mina Okafor", "mina.okafor@example.com", "jules.moreno@coachingops.com", "active", 4.0),
        ("Sasha Ivanova", "sasha.ivanova@example.com", "jules.moreno@coachingops.com", "active", 3.0),
        ("Leo Martins", "leo.martins@example.com", "kiara.patel@coachingops.com", "active", 1.0),
    ];

    let today = Utc::now().date_naive();
    for (index, (name, email, coach_email, status, units)) in clients.into_iter().enumerate() {
        let status = ClientStatus::from_str(status)?;
        let coach_id = coach_id_by_email(pool, coach_email)
            .await?
            .with_context(|| format!("seed coach {coach_email} missing"))?;
        let client_id = upsert_client(pool, name, email, Some(coach_id), Some(status)).await?;

        sqlx::query(
            r#"
            INSERT INTO coaching_ops.client_units (id, client_id, calculated_units, calculated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(units)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        let score = [10, 9, 4, 8, 6, 10][index % 6];
        sqlx::query(
            r#"
            INSERT INTO coaching_ops.nps_responses
            (id, client_id, coach_id, score, comment, responded_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(coach_id)
        .bind(score)
        .bind(seed_comment(score))
        .bind(today - Duration::days(3 + 9 * index as i64))
        .bind(format!("seed-{:03}", index + 1))
        .execute(pool)
        .await?;
    }

    set_default_capacity(pool, crate::config::FALLBACK_COACH_CAPACITY).await?;
    info!("seed data written");
    Ok(())
}

fn seed_comment(score: i32) -> Option<&'static str> {
    match score {
        0..=6 => Some("Sessions keep getting rescheduled"),
        9..=10 => Some("Weekly check-ins are exactly what I needed"),
        _ => None,
    }
}

pub async fn fetch_default_capacity(pool: &PgPool) -> anyhow::Result<Option<f64>> {
    let row = sqlx::query("SELECT numeric_value FROM coaching_ops.settings WHERE key = $1")
        .bind(DEFAULT_CAPACITY_KEY)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(row.try_get("numeric_value")?)),
        None => Ok(None),
    }
}

pub async fn set_default_capacity(pool: &PgPool, units: f64) -> anyhow::Result<()> {
    let units = validate_default_capacity(units)?;
    sqlx::query(
        r#"
        INSERT INTO coaching_ops.settings (key, numeric_value, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (key) DO UPDATE
        SET numeric_value = EXCLUDED.numeric_value, updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(DEFAULT_CAPACITY_KEY)
    .bind(units)
    .execute(pool)
    .await?;
    info!(units, "default coach capacity updated");
    Ok(())
}

pub async fn set_coach_capacity(
    pool: &PgPool,
    email: &str,
    ceiling: CapacityCeiling,
) -> anyhow::Result<()> {
    let max_capacity = match ceiling {
        CapacityCeiling::Explicit(units) => Some(units),
        CapacityCeiling::UseDefault => None,
    };

    let result = sqlx::query("UPDATE coaching_ops.coaches SET max_capacity = $1 WHERE email = $2")
        .bind(max_capacity)
        .bind(email)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        bail!("no coach found with email {email}");
    }
    info!(email, ?max_capacity, "coach capacity updated");
    Ok(())
}

pub async fn set_coach_paused(pool: &PgPool, email: &str, is_paused: bool) -> anyhow::Result<()> {
    let result = sqlx::query("UPDATE coaching_ops.coaches SET is_paused = $1 WHERE email = $2")
        .bind(is_paused)
        .bind(email)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        bail!("no coach found with email {email}");
    }
    info!(email, is_paused, "coach pause flag updated");
    Ok(())
}

pub async fn fetch_coaches(pool: &PgPool, email: Option<&str>) -> anyhow::Result<Vec<CoachRecord>> {
    let mut query = String::from(
        "SELECT id, full_name, email, max_capacity, is_paused FROM coaching_ops.coaches",
    );
    if email.is_some() {
        query.push_str(" WHERE email = $1");
    }
    query.push_str(" ORDER BY full_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = email {
        rows = rows.bind(value);
    }

    let mut coaches = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let max_capacity: Option<f64> = row.try_get("max_capacity")?;
        coaches.push(CoachRecord {
            coach_id: row.try_get("id")?,
            coach_name: row.try_get("full_name")?,
            coach_email: row.try_get("email")?,
            ceiling: max_capacity.into(),
            is_paused: row.try_get("is_paused")?,
        });
    }

    debug!(count = coaches.len(), "fetched coaches");
    Ok(coaches)
}

/// Latest unit row per client, for every client assigned to a coach.
pub async fn fetch_client_units(
    pool: &PgPool,
    coach_email: Option<&str>,
) -> anyhow::Result<Vec<ClientUnit>> {
    let mut query = String::from(
        "SELECT DISTINCT ON (cu.client_id) cu.client_id, c.coach_id, c.status, \
         cu.calculated_units, cu.calculated_at \
         FROM coaching_ops.client_units cu \
         JOIN coaching_ops.clients c ON c.id = cu.client_id \
         JOIN coaching_ops.coaches co ON co.id = c.coach_id",
    );
    if coach_email.is_some() {
        query.push_str(" WHERE co.email = $1");
    }
    query.push_str(" ORDER BY cu.client_id, cu.calculated_at DESC");

    let mut rows = sqlx::query(&query);
    if let Some(value) = coach_email {
        rows = rows.bind(value);
    }

    let mut units = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let status: String = row.try_get("status")?;
        units.push(ClientUnit {
            client_id: row.try_get("client_id")?,
            coach_id: row.try_get("coach_id")?,
            calculated_units: row.try_get("calculated_units")?,
            status: status.parse()?,
            calculated_at: row.try_get("calculated_at")?,
        });
    }

    debug!(count = units.len(), "fetched client units");
    Ok(units)
}

pub async fn fetch_nps_responses(
    pool: &PgPool,
    since_date: NaiveDate,
    coach_email: Option<&str>,
) -> anyhow::Result<Vec<NpsResponse>> {
    let mut query = String::from(
        "SELECT r.id, cl.full_name AS client_name, r.coach_id, co.full_name AS coach_name, \
         r.score, r.comment, r.responded_at \
         FROM coaching_ops.nps_responses r \
         JOIN coaching_ops.clients cl ON cl.id = r.client_id \
         LEFT JOIN coaching_ops.coaches co ON co.id = r.coach_id \
         WHERE r.responded_at >= $1",
    );
    if coach_email.is_some() {
        query.push_str(" AND co.email = $2");
    }
    query.push_str(" ORDER BY r.responded_at DESC");

    let mut rows = sqlx::query(&query).bind(since_date);
    if let Some(value) = coach_email {
        rows = rows.bind(value);
    }

    let mut responses = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let response_id: Uuid = row.try_get("id")?;
        let raw_score: i32 = row.try_get("score")?;
        let score = NpsScore::new(raw_score)
            .with_context(|| format!("stored NPS response {response_id} is malformed"))?;

        responses.push(NpsResponse {
            response_id,
            client_name: row.try_get("client_name")?,
            coach_id: row.try_get("coach_id")?,
            coach_name: row.try_get("coach_name")?,
            score,
            comment: row.try_get("comment")?,
            responded_at: row.try_get("responded_at")?,
        });
    }

    debug!(count = responses.len(), %since_date, "fetched NPS responses");
    Ok(responses)
}

pub async fn import_nps_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        client_name: String,
        client_email: String,
        coach_email: Option<String>,
        score: i32,
        comment: Option<String>,
        responded_at: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let score = NpsScore::new(row.score)
            .with_context(|| format!("row {} of {}", line + 1, csv_path.display()))?;

        let coach_id = match row.coach_email.as_deref() {
            Some(email) => {
                let id = coach_id_by_email(pool, email).await?;
                if id.is_none() {
                    warn!(email, "unknown coach in NPS import; response kept without coach");
                }
                id
            }
            None => None,
        };
        let client_id =
            upsert_client(pool, &row.client_name, &row.client_email, coach_id, None).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO coaching_ops.nps_responses
            (id, client_id, coach_id, score, comment, responded_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(coach_id)
        .bind(i32::from(score.value()))
        .bind(row.comment.filter(|comment| !comment.trim().is_empty()))
        .bind(row.responded_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "NPS import finished");
    Ok(inserted)
}

pub async fn import_units_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        client_name: String,
        client_email: String,
        coach_email: String,
        status: String,
        calculated_units: f64,
        calculated_at: Option<DateTime<Utc>>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let context = || format!("row {} of {}", line + 1, csv_path.display());
        let status = ClientStatus::from_str(&row.status).with_context(context)?;
        let units = validate_units(row.calculated_units).with_context(context)?;
        let coach_id = coach_id_by_email(pool, &row.coach_email)
            .await?
            .with_context(|| format!("no coach found with email {}", row.coach_email))?;

        let client_id = upsert_client(
            pool,
            &row.client_name,
            &row.client_email,
            Some(coach_id),
            Some(status),
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO coaching_ops.client_units (id, client_id, calculated_units, calculated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(units)
        .bind(row.calculated_at.unwrap_or_else(Utc::now))
        .execute(pool)
        .await?;

        inserted += 1;
    }

    info!(inserted, path = %csv_path.display(), "unit import finished");
    Ok(inserted)
}

async fn coach_id_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query("SELECT id FROM coaching_ops.coaches WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(row.try_get("id")?)),
        None => Ok(None),
    }
}

/// Inserts or refreshes a client by email. A missing coach or status keeps
/// whatever is already stored.
async fn upsert_client(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    coach_id: Option<Uuid>,
    status: Option<ClientStatus>,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO coaching_ops.clients AS existing (id, full_name, email, coach_id, status)
        VALUES ($1, $2, $3, $4, COALESCE($5, 'active'))
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            coach_id = COALESCE($4, existing.coach_id),
            status = COALESCE($5, existing.status)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .bind(coach_id)
    .bind(status.map(|status| status.as_str()))
    .fetch_one(pool)
    .await?;

    Ok(row.try_get("id")?)
}
