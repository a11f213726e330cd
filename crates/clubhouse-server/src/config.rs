use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use clubhouse_api::auth::Settings;
use clubhouse_auth::MAX_SESSION_TTL;

const DEFAULT_MEMBER_CODE: &str = "secret";
const DEFAULT_ADMIN_CODE: &str = "admin";

/// Process configuration, read once at startup from `CLUBHOUSE_*`
/// variables (a `.env` file is loaded first if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_ttl: Duration,
    pub member_code: String,
    pub admin_code: String,
    pub default_avatar: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let db_path = std::env::var("CLUBHOUSE_DB_PATH").unwrap_or_else(|_| "clubhouse.db".into());
        let host = std::env::var("CLUBHOUSE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("CLUBHOUSE_PORT")
            .unwrap_or_else(|_| "3005".into())
            .parse()
            .context("CLUBHOUSE_PORT must be a port number")?;
        let session_ttl = parse_session_ttl(
            &std::env::var("CLUBHOUSE_SESSION_TTL_HOURS").unwrap_or_else(|_| "24".into()),
        )?;

        let member_code =
            std::env::var("CLUBHOUSE_MEMBER_CODE").unwrap_or_else(|_| DEFAULT_MEMBER_CODE.into());
        let admin_code =
            std::env::var("CLUBHOUSE_ADMIN_CODE").unwrap_or_else(|_| DEFAULT_ADMIN_CODE.into());
        if member_code == admin_code {
            anyhow::bail!("CLUBHOUSE_MEMBER_CODE and CLUBHOUSE_ADMIN_CODE must differ");
        }
        if member_code == DEFAULT_MEMBER_CODE {
            warn!("CLUBHOUSE_MEMBER_CODE not set, using the default code");
        }
        if admin_code == DEFAULT_ADMIN_CODE {
            warn!("CLUBHOUSE_ADMIN_CODE not set, using the default code");
        }

        let default_avatar = std::env::var("CLUBHOUSE_DEFAULT_AVATAR")
            .unwrap_or_else(|_| "/images/default-avatar.png".into());

        Ok(Self {
            db_path: PathBuf::from(db_path),
            host,
            port,
            session_ttl,
            member_code,
            admin_code,
            default_avatar,
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            session_ttl: self.session_ttl,
            member_code: self.member_code.clone(),
            admin_code: self.admin_code.clone(),
            default_avatar: self.default_avatar.clone(),
        }
    }
}

/// Whole hours, from 1 up to [`MAX_SESSION_TTL`].
fn parse_session_ttl(raw: &str) -> anyhow::Result<Duration> {
    let hours: u64 = raw
        .trim()
        .parse()
        .context("CLUBHOUSE_SESSION_TTL_HOURS must be a whole number of hours")?;
    let max_hours = MAX_SESSION_TTL.as_secs() / 3600;
    if hours == 0 || hours > max_hours {
        anyhow::bail!("CLUBHOUSE_SESSION_TTL_HOURS must be between 1 and {}", max_hours);
    }
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .context("CLUBHOUSE_SESSION_TTL_HOURS is out of range")
}
