use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default)]
    pub teams: Vec<String>,
    pub meeting: Option<MeetingSettings>,
    #[serde(default)]
    pub log: LogSettings,
}

/// Recurring scrum meeting used to pre-schedule meetings for every team.
#[derive(Debug, Deserialize)]
pub struct MeetingSettings {
    pub cron: String,
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogSettings {
    /// Directory for daily rolling log files. Logs go to stdout only when unset.
    pub directory: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_pool_size() -> u32 {
    5
}

fn default_lookahead() -> usize {
    5
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config/config").required(false))
            .add_source(
                Environment::with_prefix("DIGESTBOT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("teams")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
