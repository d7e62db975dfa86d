use chrono::NaiveDateTime;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::fmt::{Display, Formatter};

use crate::database::schema::team_members;
use crate::error::Error;

#[derive(Queryable, Identifiable, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = team_members)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TeamMember {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub github_username: Option<String>,
    pub jira_username: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = team_members)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewTeamMember {
    pub name: String,
    pub email: String,
    pub github_username: Option<String>,
    pub jira_username: Option<String>,
}

/// Head counts shown in the weekly insights block.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeamMetrics {
    pub member_count: i64,
    pub github_users: i64,
    pub jira_users: i64,
}

impl NewTeamMember {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        NewTeamMember {
            name: name.into(),
            email: email.into(),
            github_username: None,
            jira_username: None,
        }
    }

    pub fn github(mut self, username: impl Into<String>) -> Self {
        self.github_username = Some(username.into());
        self
    }

    pub fn jira(mut self, username: impl Into<String>) -> Self {
        self.jira_username = Some(username.into());
        self
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> Result<TeamMember, Error> {
        Ok(diesel::insert_into(team_members::table)
            .values(self)
            .returning(TeamMember::as_returning())
            .get_result(conn)?)
    }
}

impl TeamMember {
    pub fn find_by_email(
        conn: &mut SqliteConnection,
        find_email: &str,
    ) -> Result<Option<Self>, Error> {
        use crate::database::schema::team_members::dsl::*;

        Ok(team_members
            .filter(email.eq(find_email))
            .select(TeamMember::as_select())
            .first(conn)
            .optional()?)
    }

    pub fn list(conn: &mut SqliteConnection) -> Result<Vec<Self>, Error> {
        use crate::database::schema::team_members::dsl::*;

        Ok(team_members
            .order(name.asc())
            .select(TeamMember::as_select())
            .load(conn)?)
    }

    pub fn metrics(conn: &mut SqliteConnection) -> Result<TeamMetrics, Error> {
        use crate::database::schema::team_members::dsl::*;

        let member_count: i64 = team_members.select(count_star()).get_result(conn)?;
        let github_users: i64 = team_members
            .filter(github_username.is_not_null())
            .select(count_star())
            .get_result(conn)?;
        let jira_users: i64 = team_members
            .filter(jira_username.is_not_null())
            .select(count_star())
            .get_result(conn)?;

        Ok(TeamMetrics {
            member_count,
            github_users,
            jira_users,
        })
    }
}

impl Display for TeamMember {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)?;
        if let Some(github) = &self.github_username {
            write!(f, " github:{}", github)?;
        }
        if let Some(jira) = &self.jira_username {
            write!(f, " jira:{}", jira)?;
        }
        Ok(())
    }
}
