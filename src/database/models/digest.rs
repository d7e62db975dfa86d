use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Integer, Nullable, Text};
use diesel::SqliteConnection;
use std::fmt::{Display, Formatter};
use tracing::info;

use crate::database::schema::digest_records;
use crate::error::Error;

#[derive(Queryable, Identifiable, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = digest_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DigestRecord {
    pub id: i32,
    pub digest_date: NaiveDate,
    pub team_name: String,
    pub summary_text: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
    pub success: Option<bool>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = digest_records)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewDigestRecord {
    pub digest_date: NaiveDate,
    pub team_name: String,
    pub summary_text: Option<String>,
    pub sent_at: NaiveDateTime,
    pub success: bool,
}

/// Latest digest of a team joined with its activity snapshots.
///
/// Counts are `None` when no snapshot of that kind was recorded for the digest.
#[derive(QueryableByName, Clone, Debug, PartialEq)]
pub struct DigestSummary {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Date)]
    pub digest_date: NaiveDate,
    #[diesel(sql_type = Nullable<Text>)]
    pub summary_text: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub pr_count: Option<i64>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub commit_count: Option<i64>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub ticket_count: Option<i64>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub completed_count: Option<i64>,
}

// Snapshots are summed per digest before joining, so a digest with several
// GitHub and Jira rows is not multiplied out.
const LATEST_DIGEST_QUERY: &str = "\
SELECT d.id AS id, d.digest_date AS digest_date, d.summary_text AS summary_text,
       g.pr_count AS pr_count, g.commit_count AS commit_count,
       j.ticket_count AS ticket_count, j.completed_count AS completed_count
FROM digest_records d
LEFT JOIN (
    SELECT digest_id, SUM(pr_count) AS pr_count, SUM(commit_count) AS commit_count
    FROM github_activities GROUP BY digest_id
) g ON g.digest_id = d.id
LEFT JOIN (
    SELECT digest_id, SUM(ticket_count) AS ticket_count, SUM(completed_count) AS completed_count
    FROM jira_activities GROUP BY digest_id
) j ON j.digest_id = d.id
WHERE d.team_name = ?
ORDER BY d.digest_date DESC, d.id DESC
LIMIT 1";

pub(crate) fn validate_team_name(team_name: &str) -> Result<(), Error> {
    if team_name.trim().is_empty() {
        return Err(Error::NotNullViolation("team_name must not be empty".to_string()));
    }
    Ok(())
}

impl NewDigestRecord {
    /// Digest for today, stamped as sent now and successful.
    pub fn today(team_name: impl Into<String>, summary_text: impl Into<String>) -> Self {
        let now = Utc::now().naive_utc();

        NewDigestRecord {
            digest_date: now.date(),
            team_name: team_name.into(),
            summary_text: Some(summary_text.into()),
            sent_at: now,
            success: true,
        }
    }

    pub fn on(mut self, digest_date: NaiveDate) -> Self {
        self.digest_date = digest_date;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> Result<DigestRecord, Error> {
        validate_team_name(&self.team_name)?;

        Ok(diesel::insert_into(digest_records::table)
            .values(self)
            .returning(DigestRecord::as_returning())
            .get_result(conn)?)
    }
}

impl DigestRecord {
    /// Inserts today's digest for the team and returns its id.
    pub fn record_new(
        conn: &mut SqliteConnection,
        team_name: &str,
        summary_text: &str,
    ) -> Result<i32, Error> {
        let digest = NewDigestRecord::today(team_name, summary_text).insert(conn)?;
        info!("New digest recorded with ID: {}", digest.id);

        Ok(digest.id)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, find_id: i32) -> Result<Self, Error> {
        use crate::database::schema::digest_records::dsl::*;

        digest_records
            .find(find_id)
            .select(DigestRecord::as_select())
            .first(conn)
            .optional()?
            .ok_or(Error::NotFound {
                entity: "Digest",
                id: find_id,
            })
    }

    /// Most recent digests of a team, newest first.
    pub fn list(conn: &mut SqliteConnection, team: &str, limit: u32) -> Result<Vec<Self>, Error> {
        use crate::database::schema::digest_records::dsl::*;

        Ok(digest_records
            .filter(team_name.eq(team))
            .order((digest_date.desc(), id.desc()))
            .limit(i64::from(limit))
            .select(DigestRecord::as_select())
            .load(conn)?)
    }

    pub fn latest_summary(
        conn: &mut SqliteConnection,
        team_name: &str,
    ) -> Result<Option<DigestSummary>, Error> {
        Ok(diesel::sql_query(LATEST_DIGEST_QUERY)
            .bind::<Text, _>(team_name)
            .get_result(conn)
            .optional()?)
    }
}

impl Display for DigestRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Digest {} for {} on {}",
            self.id, self.team_name, self.digest_date
        )?;

        if self.success == Some(false) {
            write!(f, " (delivery failed)")?;
        }

        Ok(())
    }
}
