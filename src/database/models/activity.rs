use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Text};
use diesel::SqliteConnection;
use serde_json::Value;
use std::fmt::{Display, Formatter};

use crate::database::models::digest::DigestRecord;
use crate::database::schema::{github_activities, jira_activities};
use crate::error::Error;

/// Number of days covered by the weekly totals, ending today.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

#[derive(Queryable, Identifiable, Selectable, Associations, Clone, Debug, PartialEq)]
#[diesel(belongs_to(DigestRecord, foreign_key = digest_id))]
#[diesel(table_name = github_activities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GithubActivity {
    pub id: i32,
    pub digest_id: i32,
    pub pr_count: Option<i32>,
    pub commit_count: Option<i32>,
    activity_data: Option<String>,
    pub collected_at: Option<NaiveDateTime>,
}

#[derive(Queryable, Identifiable, Selectable, Associations, Clone, Debug, PartialEq)]
#[diesel(belongs_to(DigestRecord, foreign_key = digest_id))]
#[diesel(table_name = jira_activities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JiraActivity {
    pub id: i32,
    pub digest_id: i32,
    pub ticket_count: Option<i32>,
    pub completed_count: Option<i32>,
    activity_data: Option<String>,
    pub collected_at: Option<NaiveDateTime>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = github_activities)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewGithubActivity {
    pub digest_id: i32,
    pub pr_count: i32,
    pub commit_count: i32,
    activity_data: Option<String>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = jira_activities)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewJiraActivity {
    pub digest_id: i32,
    pub ticket_count: i32,
    pub completed_count: i32,
    activity_data: Option<String>,
}

/// Activity of one team over the trailing week.
#[derive(QueryableByName, Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivityTotals {
    #[diesel(sql_type = BigInt)]
    pub digest_count: i64,
    #[diesel(sql_type = BigInt)]
    pub total_prs: i64,
    #[diesel(sql_type = BigInt)]
    pub total_commits: i64,
    #[diesel(sql_type = BigInt)]
    pub total_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub total_completed: i64,
}

const WEEKLY_TOTALS_QUERY: &str = "\
SELECT COUNT(DISTINCT d.id) AS digest_count,
       COALESCE(SUM(g.pr_count), 0) AS total_prs,
       COALESCE(SUM(g.commit_count), 0) AS total_commits,
       COALESCE(SUM(j.ticket_count), 0) AS total_tickets,
       COALESCE(SUM(j.completed_count), 0) AS total_completed
FROM digest_records d
LEFT JOIN (
    SELECT digest_id, SUM(pr_count) AS pr_count, SUM(commit_count) AS commit_count
    FROM github_activities GROUP BY digest_id
) g ON g.digest_id = d.id
LEFT JOIN (
    SELECT digest_id, SUM(ticket_count) AS ticket_count, SUM(completed_count) AS completed_count
    FROM jira_activities GROUP BY digest_id
) j ON j.digest_id = d.id
WHERE d.team_name = ? AND d.digest_date >= ? AND d.digest_date <= ?";

fn serialize_data(data: Option<&Value>) -> Result<Option<String>, Error> {
    Ok(data.map(serde_json::to_string).transpose()?)
}

fn deserialize_data(data: Option<&str>) -> Result<Option<Value>, Error> {
    Ok(data.map(serde_json::from_str).transpose()?)
}

fn validate_count(name: &str, count: i32) -> Result<(), Error> {
    if count < 0 {
        return Err(Error::InvalidInput(format!(
            "{} must not be negative, got {}",
            name, count
        )));
    }
    Ok(())
}

impl NewGithubActivity {
    pub fn new(digest_id: i32, pr_count: i32, commit_count: i32) -> Self {
        NewGithubActivity {
            digest_id,
            pr_count,
            commit_count,
            activity_data: None,
        }
    }

    /// Attaches the raw collector payload.
    pub fn with_data(mut self, data: &Value) -> Result<Self, Error> {
        self.activity_data = serialize_data(Some(data))?;
        Ok(self)
    }

    pub fn attach(mut self, digest_id: i32) -> Self {
        self.digest_id = digest_id;
        self
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> Result<GithubActivity, Error> {
        validate_count("pr_count", self.pr_count)?;
        validate_count("commit_count", self.commit_count)?;

        Ok(diesel::insert_into(github_activities::table)
            .values(self)
            .returning(GithubActivity::as_returning())
            .get_result(conn)?)
    }
}

impl NewJiraActivity {
    pub fn new(digest_id: i32, ticket_count: i32, completed_count: i32) -> Self {
        NewJiraActivity {
            digest_id,
            ticket_count,
            completed_count,
            activity_data: None,
        }
    }

    pub fn with_data(mut self, data: &Value) -> Result<Self, Error> {
        self.activity_data = serialize_data(Some(data))?;
        Ok(self)
    }

    pub fn attach(mut self, digest_id: i32) -> Self {
        self.digest_id = digest_id;
        self
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> Result<JiraActivity, Error> {
        validate_count("ticket_count", self.ticket_count)?;
        validate_count("completed_count", self.completed_count)?;

        Ok(diesel::insert_into(jira_activities::table)
            .values(self)
            .returning(JiraActivity::as_returning())
            .get_result(conn)?)
    }
}

impl GithubActivity {
    pub fn activity_data(&self) -> Result<Option<Value>, Error> {
        deserialize_data(self.activity_data.as_deref())
    }

    pub fn for_digest(
        conn: &mut SqliteConnection,
        digest: &DigestRecord,
    ) -> Result<Vec<Self>, Error> {
        Ok(GithubActivity::belonging_to(digest)
            .order(github_activities::id.asc())
            .select(GithubActivity::as_select())
            .load(conn)?)
    }
}

impl JiraActivity {
    pub fn activity_data(&self) -> Result<Option<Value>, Error> {
        deserialize_data(self.activity_data.as_deref())
    }

    pub fn for_digest(
        conn: &mut SqliteConnection,
        digest: &DigestRecord,
    ) -> Result<Vec<Self>, Error> {
        Ok(JiraActivity::belonging_to(digest)
            .order(jira_activities::id.asc())
            .select(JiraActivity::as_select())
            .load(conn)?)
    }
}

impl ActivityTotals {
    /// Totals over digests dated within the week ending on `now`'s date.
    pub fn weekly(
        conn: &mut SqliteConnection,
        team_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let end = now.date_naive();
        let start = (now - Duration::days(WEEKLY_WINDOW_DAYS)).date_naive();

        Ok(diesel::sql_query(WEEKLY_TOTALS_QUERY)
            .bind::<Text, _>(team_name)
            .bind::<Date, _>(start)
            .bind::<Date, _>(end)
            .get_result(conn)?)
    }
}

impl Display for ActivityTotals {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "• {} PRs this week", self.total_prs)?;
        writeln!(f, "• {} commits this week", self.total_commits)?;
        writeln!(f, "• {} tickets created", self.total_tickets)?;
        write!(f, "• {} tickets completed", self.total_completed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::models::digest::NewDigestRecord;
    use crate::database::test_connection;

    fn digest_days_ago(conn: &mut SqliteConnection, team: &str, days: i64) -> i32 {
        NewDigestRecord::today(team, "digest")
            .on(Utc::now().date_naive() - Duration::days(days))
            .insert(conn)
            .unwrap()
            .id
    }

    fn load_digest(conn: &mut SqliteConnection, id: i32) -> DigestRecord {
        DigestRecord::find_by_id(conn, id).unwrap()
    }

    #[test]
    fn unknown_digest_is_a_foreign_key_violation() {
        let mut conn = test_connection();

        let err = NewGithubActivity::new(999, 1, 1)
            .insert(&mut conn)
            .unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err:?}");

        let err = NewJiraActivity::new(999, 1, 1).insert(&mut conn).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err:?}");
    }

    #[test]
    fn activity_data_keeps_its_shape() {
        let mut conn = test_connection();
        let digest = digest_days_ago(&mut conn, "platform", 0);
        let payload = json!({
            "open_prs": [{"number": 12, "title": "Fix login", "reviewers": ["ana"]}],
            "urgent_commits": [],
        });

        let stored = NewGithubActivity::new(digest, 1, 0)
            .with_data(&payload)
            .unwrap()
            .insert(&mut conn)
            .unwrap();

        assert_eq!(stored.activity_data().unwrap(), Some(payload));
        assert!(stored.collected_at.is_some());
    }

    #[test]
    fn missing_activity_data_is_null() {
        let mut conn = test_connection();
        let digest = digest_days_ago(&mut conn, "platform", 0);

        let stored = NewJiraActivity::new(digest, 3, 1).insert(&mut conn).unwrap();

        assert_eq!(stored.activity_data().unwrap(), None);
        let digest = load_digest(&mut conn, digest);
        assert_eq!(
            JiraActivity::for_digest(&mut conn, &digest).unwrap(),
            vec![stored]
        );
    }

    #[test]
    fn for_digest_returns_only_that_digests_snapshots() {
        let mut conn = test_connection();
        let first = digest_days_ago(&mut conn, "platform", 1);
        let second = digest_days_ago(&mut conn, "platform", 0);

        let a = NewGithubActivity::new(first, 1, 2).insert(&mut conn).unwrap();
        NewGithubActivity::new(second, 5, 5).insert(&mut conn).unwrap();
        let b = NewGithubActivity::new(first, 3, 4).insert(&mut conn).unwrap();

        let first = load_digest(&mut conn, first);
        assert_eq!(
            GithubActivity::for_digest(&mut conn, &first).unwrap(),
            vec![a, b]
        );
        assert!(JiraActivity::for_digest(&mut conn, &first)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let mut conn = test_connection();
        let digest = digest_days_ago(&mut conn, "platform", 0);

        let err = NewGithubActivity::new(digest, -1, 0)
            .insert(&mut conn)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn weekly_totals_for_quiet_team_are_zero() {
        let mut conn = test_connection();

        let totals = ActivityTotals::weekly(&mut conn, "platform", Utc::now()).unwrap();
        assert_eq!(totals, ActivityTotals::default());
    }

    #[test]
    fn weekly_totals_cover_the_trailing_week() {
        let mut conn = test_connection();

        let recent = digest_days_ago(&mut conn, "platform", 3);
        NewGithubActivity::new(recent, 4, 10)
            .insert(&mut conn)
            .unwrap();
        NewJiraActivity::new(recent, 6, 2).insert(&mut conn).unwrap();
        NewJiraActivity::new(recent, 1, 1).insert(&mut conn).unwrap();

        let old = digest_days_ago(&mut conn, "platform", 10);
        NewGithubActivity::new(old, 50, 50).insert(&mut conn).unwrap();

        let other_team = digest_days_ago(&mut conn, "mobile", 1);
        NewGithubActivity::new(other_team, 9, 9)
            .insert(&mut conn)
            .unwrap();

        let totals = ActivityTotals::weekly(&mut conn, "platform", Utc::now()).unwrap();
        assert_eq!(
            totals,
            ActivityTotals {
                digest_count: 1,
                total_prs: 4,
                total_commits: 10,
                total_tickets: 7,
                total_completed: 3,
            }
        );
    }

    #[test]
    fn weekly_totals_count_digests_without_activity() {
        let mut conn = test_connection();

        digest_days_ago(&mut conn, "platform", 0);
        digest_days_ago(&mut conn, "platform", 7);

        let totals = ActivityTotals::weekly(&mut conn, "platform", Utc::now()).unwrap();
        assert_eq!(totals.digest_count, 2);
        assert_eq!(totals.total_prs, 0);
    }
}
