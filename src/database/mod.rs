use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::{Connection, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, info};

use crate::error::Error;
use crate::report::TeamReport;

use models::activity::{
    ActivityTotals, GithubActivity, JiraActivity, NewGithubActivity, NewJiraActivity,
};
use models::digest::{DigestRecord, DigestSummary, NewDigestRecord};
use models::meeting::{NewScrumMeeting, ScrumMeeting};
use models::member::{NewTeamMember, TeamMember, TeamMetrics};

pub mod models;
pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

const IN_MEMORY_URL: &str = ":memory:";

/// Applied to every pooled connection. SQLite only enforces foreign keys when asked to.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        configure_connection(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

fn configure_connection(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
    conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}

fn is_in_memory(database_url: &str) -> bool {
    database_url == IN_MEMORY_URL || database_url.contains("mode=memory")
}

pub fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool, Error> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let builder = Pool::builder().connection_customizer(Box::new(ConnectionOptions));

    // Each in-memory connection is a separate database, so keep exactly one alive.
    let builder = if is_in_memory(database_url) {
        builder
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        builder.max_size(max_size)
    };

    Ok(builder.build(manager)?)
}

/// Durable store of team members, digests, their activity snapshots and scrum meetings.
#[derive(Clone)]
pub struct DigestStore {
    pool: DbPool,
}

impl DigestStore {
    pub fn open(database_url: &str, pool_size: u32) -> Result<Self, Error> {
        debug!("Opening digest store at {}", database_url);
        Ok(DigestStore {
            pool: create_pool(database_url, pool_size)?,
        })
    }

    /// Migrated store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self, Error> {
        let store = Self::open(IN_MEMORY_URL, 1)?;
        store.run_migrations()?;
        Ok(store)
    }

    pub fn run_migrations(&self) -> Result<(), Error> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| Error::MigrationError(e.to_string()))?;

        for version in &applied {
            info!("Applied migration {}", version);
        }

        Ok(())
    }

    fn connection(&self) -> Result<DbConnection, Error> {
        Ok(self.pool.get()?)
    }

    /// Inserts today's digest for the team and returns its id.
    ///
    /// A blank `team_name` fails with [`Error::NotNullViolation`], like any other
    /// constraint error.
    pub fn record_new_digest(&self, team_name: &str, summary_text: &str) -> Result<i32, Error> {
        self.connection()?
            .immediate_transaction(|conn| DigestRecord::record_new(conn, team_name, summary_text))
    }

    /// Returns the number of meetings updated; 0 when `meeting_id` does not exist.
    pub fn update_meeting_attendance(
        &self,
        meeting_id: i32,
        attendance_count: u32,
    ) -> Result<usize, Error> {
        self.connection()?.immediate_transaction(|conn| {
            ScrumMeeting::update_attendance(conn, meeting_id, attendance_count)
        })
    }

    pub fn get_latest_digest(&self, team_name: &str) -> Result<Option<DigestSummary>, Error> {
        DigestRecord::latest_summary(&mut *self.connection()?, team_name)
    }

    pub fn list_upcoming_meetings(
        &self,
        team_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScrumMeeting>, Error> {
        ScrumMeeting::upcoming(&mut *self.connection()?, team_name, now)
    }

    pub fn get_weekly_activity_totals(
        &self,
        team_name: &str,
        now: DateTime<Utc>,
    ) -> Result<ActivityTotals, Error> {
        ActivityTotals::weekly(&mut *self.connection()?, team_name, now)
    }

    pub fn add_team_member(&self, member: &NewTeamMember) -> Result<TeamMember, Error> {
        let member = self
            .connection()?
            .immediate_transaction(|conn| member.insert(conn))?;
        info!("Added team member {}", member);
        Ok(member)
    }

    pub fn find_member_by_email(&self, email: &str) -> Result<Option<TeamMember>, Error> {
        TeamMember::find_by_email(&mut *self.connection()?, email)
    }

    pub fn list_team_members(&self) -> Result<Vec<TeamMember>, Error> {
        TeamMember::list(&mut *self.connection()?)
    }

    pub fn team_metrics(&self) -> Result<TeamMetrics, Error> {
        self.connection()?.transaction(|conn| TeamMember::metrics(conn))
    }

    /// Inserts a digest with an explicit date, e.g. when backfilling missed days.
    pub fn insert_digest(&self, digest: &NewDigestRecord) -> Result<DigestRecord, Error> {
        self.connection()?.immediate_transaction(|conn| digest.insert(conn))
    }

    pub fn find_digest(&self, id: i32) -> Result<DigestRecord, Error> {
        DigestRecord::find_by_id(&mut *self.connection()?, id)
    }

    pub fn list_digests(&self, team_name: &str, limit: u32) -> Result<Vec<DigestRecord>, Error> {
        DigestRecord::list(&mut *self.connection()?, team_name, limit)
    }

    pub fn record_github_activity(
        &self,
        activity: &NewGithubActivity,
    ) -> Result<GithubActivity, Error> {
        self.connection()?.immediate_transaction(|conn| activity.insert(conn))
    }

    pub fn record_jira_activity(&self, activity: &NewJiraActivity) -> Result<JiraActivity, Error> {
        self.connection()?.immediate_transaction(|conn| activity.insert(conn))
    }

    /// Fails with [`Error::NotFound`] when the digest does not exist.
    pub fn github_activities_for(&self, digest_id: i32) -> Result<Vec<GithubActivity>, Error> {
        self.connection()?.transaction(|conn| {
            let digest = DigestRecord::find_by_id(conn, digest_id)?;
            GithubActivity::for_digest(conn, &digest)
        })
    }

    /// Fails with [`Error::NotFound`] when the digest does not exist.
    pub fn jira_activities_for(&self, digest_id: i32) -> Result<Vec<JiraActivity>, Error> {
        self.connection()?.transaction(|conn| {
            let digest = DigestRecord::find_by_id(conn, digest_id)?;
            JiraActivity::for_digest(conn, &digest)
        })
    }

    /// Records today's digest together with its activity snapshots in one transaction.
    ///
    /// The `digest_id` of every snapshot is replaced with the id of the new digest.
    /// If any insert fails nothing is persisted.
    pub fn record_digest_with_activity(
        &self,
        team_name: &str,
        summary_text: &str,
        github: &[NewGithubActivity],
        jira: &[NewJiraActivity],
    ) -> Result<i32, Error> {
        self.connection()?.immediate_transaction(|conn| {
            let digest_id = DigestRecord::record_new(conn, team_name, summary_text)?;

            for activity in github {
                activity.clone().attach(digest_id).insert(conn)?;
            }
            for activity in jira {
                activity.clone().attach(digest_id).insert(conn)?;
            }

            Ok(digest_id)
        })
    }

    pub fn schedule_meeting(&self, meeting: &NewScrumMeeting) -> Result<ScrumMeeting, Error> {
        let meeting = self
            .connection()?
            .immediate_transaction(|conn| meeting.insert(conn))?;
        info!("Scheduled {}", meeting);
        Ok(meeting)
    }

    pub fn schedule_meetings_from_cron(
        &self,
        team_name: &str,
        scheduled_cron: &str,
        after: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<ScrumMeeting>, Error> {
        self.connection()?.immediate_transaction(|conn| {
            ScrumMeeting::schedule_from_cron(conn, team_name, scheduled_cron, after, count)
        })
    }

    pub fn find_meeting(&self, id: i32) -> Result<ScrumMeeting, Error> {
        ScrumMeeting::find_by_id(&mut *self.connection()?, id)
    }

    /// Everything the reporting layer shows for a team, read from one snapshot.
    pub fn team_report(&self, team_name: &str, now: DateTime<Utc>) -> Result<TeamReport, Error> {
        self.connection()?.transaction(|conn| {
            Ok(TeamReport {
                team_name: team_name.to_string(),
                latest: DigestRecord::latest_summary(conn, team_name)?,
                upcoming: ScrumMeeting::upcoming(conn, team_name, now)?,
                weekly: ActivityTotals::weekly(conn, team_name, now)?,
                metrics: TeamMember::metrics(conn)?,
            })
        })
    }
}

#[cfg(test)]
pub(crate) fn test_connection() -> SqliteConnection {
    let mut conn =
        SqliteConnection::establish(IN_MEMORY_URL).expect("Failed to open in-memory database.");
    configure_connection(&mut conn).expect("Failed to configure connection.");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations.");
    conn
}
