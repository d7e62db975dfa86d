use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use cron::Schedule;
use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::{debug, info};

use crate::database::models::digest::validate_team_name;
use crate::database::schema::scrum_meetings;
use crate::error::Error;

/// Maximum number of meetings returned by [`ScrumMeeting::upcoming`].
pub const UPCOMING_MEETINGS_LIMIT: i64 = 5;

#[derive(Queryable, Identifiable, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = scrum_meetings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScrumMeeting {
    pub id: i32,
    pub meeting_date: NaiveDateTime,
    pub team_name: String,
    pub attendance_count: Option<i32>,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = scrum_meetings)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewScrumMeeting {
    pub meeting_date: NaiveDateTime,
    pub team_name: String,
    pub attendance_count: Option<i32>,
    pub notes: Option<String>,
}

impl NewScrumMeeting {
    pub fn new(team_name: impl Into<String>, meeting_date: DateTime<Utc>) -> Self {
        NewScrumMeeting {
            meeting_date: meeting_date.naive_utc(),
            team_name: team_name.into(),
            attendance_count: None,
            notes: None,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> Result<ScrumMeeting, Error> {
        validate_team_name(&self.team_name)?;

        Ok(diesel::insert_into(scrum_meetings::table)
            .values(self)
            .returning(ScrumMeeting::as_returning())
            .get_result(conn)?)
    }
}

impl ScrumMeeting {
    pub fn find_by_id(conn: &mut SqliteConnection, find_id: i32) -> Result<Self, Error> {
        use crate::database::schema::scrum_meetings::dsl::*;

        scrum_meetings
            .find(find_id)
            .select(ScrumMeeting::as_select())
            .first(conn)
            .optional()?
            .ok_or(Error::NotFound {
                entity: "Meeting",
                id: find_id,
            })
    }

    /// Overwrites the attendance of a meeting.
    /// Returns the number of rows affected, which is 0 when the meeting does not exist.
    pub fn update_attendance(
        conn: &mut SqliteConnection,
        meeting_id: i32,
        attendance: u32,
    ) -> Result<usize, Error> {
        use crate::database::schema::scrum_meetings::dsl::*;

        let attendance = i32::try_from(attendance).map_err(|_| {
            Error::InvalidInput(format!("attendance count {} is too large", attendance))
        })?;

        let rows = diesel::update(scrum_meetings.filter(id.eq(meeting_id)))
            .set(attendance_count.eq(attendance))
            .execute(conn)?;

        if rows > 0 {
            info!("Attendance updated for meeting {}", meeting_id);
        } else {
            debug!("No meeting with id {} to update attendance for", meeting_id);
        }

        Ok(rows)
    }

    /// Next meetings of a team strictly after `now`, earliest first.
    pub fn upcoming(
        conn: &mut SqliteConnection,
        team: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, Error> {
        use crate::database::schema::scrum_meetings::dsl::*;

        Ok(scrum_meetings
            .filter(team_name.eq(team))
            .filter(meeting_date.gt(now.naive_utc()))
            .order((meeting_date.asc(), id.asc()))
            .limit(UPCOMING_MEETINGS_LIMIT)
            .select(ScrumMeeting::as_select())
            .load(conn)?)
    }

    fn is_scheduled(
        conn: &mut SqliteConnection,
        team: &str,
        date: NaiveDateTime,
    ) -> Result<bool, Error> {
        use crate::database::schema::scrum_meetings::dsl::*;

        let count: i64 = scrum_meetings
            .filter(team_name.eq(team))
            .filter(meeting_date.eq(date))
            .count()
            .get_result(conn)?;

        Ok(count > 0)
    }

    /// Schedules the next `count` occurrences of `scheduled_cron` after `after`.
    /// Occurrences already scheduled for the team are skipped.
    pub fn schedule_from_cron(
        conn: &mut SqliteConnection,
        team: &str,
        scheduled_cron: &str,
        after: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<Self>, Error> {
        let schedule = Schedule::from_str(scheduled_cron)?;
        let mut scheduled = Vec::new();

        for date in schedule.after(&after).take(count) {
            if Self::is_scheduled(conn, team, date.naive_utc())? {
                continue;
            }
            scheduled.push(NewScrumMeeting::new(team, date).insert(conn)?);
        }

        info!(
            "Scheduled {} meetings for team {} from '{}'",
            scheduled.len(),
            team,
            scheduled_cron
        );

        Ok(scheduled)
    }
}

impl Display for ScrumMeeting {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Meeting {} for {} on {}",
            self.id,
            self.team_name,
            self.meeting_date.format("%d.%m.%Y %H:%M")
        )?;

        if let Some(attendance) = self.attendance_count {
            write!(f, " ({} attended)", attendance)?;
        }

        if let Some(notes) = &self.notes {
            write!(f, ": {}", notes)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::database::test_connection;

    #[test]
    fn update_attendance_overwrites_count() {
        let mut conn = test_connection();
        let meeting = NewScrumMeeting::new("platform", Utc::now() + Duration::days(1))
            .insert(&mut conn)
            .unwrap();
        assert_eq!(meeting.attendance_count, None);

        assert_eq!(
            ScrumMeeting::update_attendance(&mut conn, meeting.id, 6).unwrap(),
            1
        );
        assert_eq!(
            ScrumMeeting::update_attendance(&mut conn, meeting.id, 4).unwrap(),
            1
        );

        let meeting = ScrumMeeting::find_by_id(&mut conn, meeting.id).unwrap();
        assert_eq!(meeting.attendance_count, Some(4));
    }

    #[test]
    fn update_attendance_on_unknown_meeting_is_a_no_op() {
        let mut conn = test_connection();

        assert_eq!(ScrumMeeting::update_attendance(&mut conn, 77, 3).unwrap(), 0);
    }

    #[test]
    fn upcoming_excludes_past_and_other_teams() {
        let mut conn = test_connection();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();

        NewScrumMeeting::new("platform", now - Duration::hours(1))
            .insert(&mut conn)
            .unwrap();
        NewScrumMeeting::new("platform", now).insert(&mut conn).unwrap();
        NewScrumMeeting::new("mobile", now + Duration::hours(1))
            .insert(&mut conn)
            .unwrap();
        let next = NewScrumMeeting::new("platform", now + Duration::hours(2))
            .notes("Sprint review")
            .insert(&mut conn)
            .unwrap();

        let upcoming = ScrumMeeting::upcoming(&mut conn, "platform", now).unwrap();
        assert_eq!(upcoming, vec![next]);
    }

    #[test]
    fn schedule_from_cron_skips_existing_dates() {
        let mut conn = test_connection();
        // Sunday
        let after = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();

        let cron = "0 30 9 * * Mon-Fri *";

        let first =
            ScrumMeeting::schedule_from_cron(&mut conn, "platform", cron, after, 3).unwrap();
        let dates: Vec<_> = first.iter().map(|m| m.meeting_date).collect();
        assert_eq!(
            dates,
            vec![
                Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap().naive_utc(),
                Utc.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).unwrap().naive_utc(),
                Utc.with_ymd_and_hms(2026, 10, 21, 9, 30, 0).unwrap().naive_utc(),
            ]
        );

        let second =
            ScrumMeeting::schedule_from_cron(&mut conn, "platform", cron, after, 4).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(
            second[0].meeting_date,
            Utc.with_ymd_and_hms(2026, 10, 22, 9, 30, 0).unwrap().naive_utc()
        );
    }

    #[test]
    fn invalid_cron_is_an_error() {
        let mut conn = test_connection();

        let err =
            ScrumMeeting::schedule_from_cron(&mut conn, "platform", "every day", Utc::now(), 1)
                .unwrap_err();
        assert!(matches!(err, Error::CronError { .. }));
    }
}
