use std::fmt::{Display, Formatter};

use crate::database::models::activity::ActivityTotals;
use crate::database::models::digest::DigestSummary;
use crate::database::models::meeting::ScrumMeeting;
use crate::database::models::member::TeamMetrics;

/// Read-side view of one team, rendered as the message body posted to the team channel.
#[derive(Clone, Debug, PartialEq)]
pub struct TeamReport {
    pub team_name: String,
    pub latest: Option<DigestSummary>,
    pub upcoming: Vec<ScrumMeeting>,
    pub weekly: ActivityTotals,
    pub metrics: TeamMetrics,
}

fn count_or_dash(count: Option<i64>) -> String {
    count.map_or_else(|| "-".to_string(), |c| c.to_string())
}

impl Display for TeamReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let date_format = "%d.%m.%Y";

        writeln!(f, "**Daily digest for {}**", self.team_name)?;

        match &self.latest {
            Some(digest) => {
                writeln!(f, "Latest digest ({}):", digest.digest_date.format(date_format))?;
                if let Some(text) = digest.summary_text.as_deref().filter(|t| !t.is_empty()) {
                    writeln!(f, "{}", text)?;
                }
                writeln!(
                    f,
                    "PRs: {} | Commits: {} | Tickets: {} | Completed: {}",
                    count_or_dash(digest.pr_count),
                    count_or_dash(digest.commit_count),
                    count_or_dash(digest.ticket_count),
                    count_or_dash(digest.completed_count),
                )?;
            }
            None => writeln!(f, "No digests recorded yet.")?,
        }

        writeln!(f)?;
        writeln!(f, "**Upcoming meetings:**")?;
        if self.upcoming.is_empty() {
            writeln!(f, "None scheduled.")?;
        }
        for meeting in &self.upcoming {
            write!(f, "• {}", meeting.meeting_date.format("%d.%m.%Y %H:%M"))?;
            if let Some(notes) = &meeting.notes {
                write!(f, " ({})", notes)?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "**Weekly insights** ({} digests):",
            self.weekly.digest_count
        )?;
        writeln!(f, "{}", self.weekly)?;
        write!(
            f,
            "Team size: {} members | {} using GitHub | {} using Jira",
            self.metrics.member_count, self.metrics.github_users, self.metrics.jira_users
        )
    }
}
