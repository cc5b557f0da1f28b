use std::env;

use match_engine::Settings;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub store: StoreConfig,
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub workflow: WorkflowConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub access_expiry_secs: i64,
    pub bcrypt_cost: u32,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    /// Invitation and join-request creation.
    pub write_max: u32,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub max_conflict_retries: u32,
    pub notify_max_attempts: u32,
    pub notify_backoff_ms: u64,
    pub reminder_lead_minutes: i64,
    /// 0 disables the sweep.
    pub reminder_sweep_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_or_parse("PORT", 3000),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:5173,http://localhost:8080")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            store: StoreConfig {
                backend: match env_or("STORE_BACKEND", "postgres").to_lowercase().as_str() {
                    "memory" => StoreBackend::Memory,
                    _ => StoreBackend::Postgres,
                },
            },
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                database: env_or("DB_NAME", "padel_mate"),
                user: env_or("DB_USER", "padel"),
                password: env_or("DB_PASSWORD", ""),
                pool_min: env_or_parse("DB_POOL_MIN", 2),
                pool_max: env_or_parse("DB_POOL_MAX", 20),
            },
            jwt: JwtConfig {
                secret: env_or("JWT_SECRET", "change-me-to-a-secure-random-string"),
                access_expiry_secs: parse_duration_to_secs(&env_or("JWT_ACCESS_EXPIRY", "7d")),
                bcrypt_cost: env_or_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: env_or_parse("RATE_LIMIT_MAX", 100),
                write_max: env_or_parse("RATE_LIMIT_WRITE", 20),
            },
            workflow: WorkflowConfig {
                max_conflict_retries: env_or_parse("WORKFLOW_MAX_CONFLICT_RETRIES", 5),
                notify_max_attempts: env_or_parse("NOTIFY_MAX_ATTEMPTS", 5),
                notify_backoff_ms: env_or_parse("NOTIFY_BACKOFF_MS", 200),
                reminder_lead_minutes: env_or_parse("REMINDER_LEAD_MINUTES", 120),
                reminder_sweep_secs: env_or_parse("REMINDER_SWEEP_SECS", 300),
            },
        }
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db.user, self.db.password, self.db.host, self.db.port, self.db.database
        )
    }

    pub fn workflow_settings(&self) -> Settings {
        Settings {
            max_conflict_retries: self.workflow.max_conflict_retries,
            reminder_lead: chrono::Duration::minutes(self.workflow.reminder_lead_minutes),
            notify_max_attempts: self.workflow.notify_max_attempts,
            notify_backoff: std::time::Duration::from_millis(self.workflow.notify_backoff_ms),
        }
    }
}

fn parse_duration_to_secs(s: &str) -> i64 {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        return 3600;
    };
    let num_str = &s[..s.len() - unit.len_utf8()];
    let num: i64 = num_str.parse().unwrap_or(1);
    match unit {
        's' => num,
        'm' => num * 60,
        'h' => num * 3600,
        'd' => num * 86400,
        _ => s.parse().unwrap_or(3600),
    }
}
