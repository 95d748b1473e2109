use loupe_env::{EnvError, Environment};

pub const LOUPE_JWT_SECRET: &str = "LOUPE_JWT_SECRET";

pub const LOUPE_DEFAULT_PROJECT: &str = "LOUPE_DEFAULT_PROJECT";

pub const LOUPE_PERMISSION_TTL_SECS: &str = "LOUPE_PERMISSION_TTL_SECS";

pub const LOUPE_QUOTA_DAILY_LIMIT: &str = "LOUPE_QUOTA_DAILY_LIMIT";
pub const LOUPE_QUOTA_MONTHLY_LIMIT: &str = "LOUPE_QUOTA_MONTHLY_LIMIT";

pub const LOUPE_CACHE_TTL_SECS: &str = "LOUPE_CACHE_TTL_SECS";

pub const LOUPE_MAX_RESULT_BYTES: &str = "LOUPE_MAX_RESULT_BYTES";

pub const LOUPE_RETRY_MAX_ATTEMPTS: &str = "LOUPE_RETRY_MAX_ATTEMPTS";
pub const LOUPE_RETRY_BASE_DELAY_MS: &str = "LOUPE_RETRY_BASE_DELAY_MS";

pub fn get_default_project(env: &dyn Environment) -> Option<String> {
    env.get(LOUPE_DEFAULT_PROJECT)
}

pub fn get_permission_ttl_secs(env: &dyn Environment) -> Result<u64, EnvError> {
    loupe_env::get_parsed(env, LOUPE_PERMISSION_TTL_SECS, 300)
}

pub fn get_quota_daily_limit(env: &dyn Environment) -> Result<u64, EnvError> {
    loupe_env::get_parsed(env, LOUPE_QUOTA_DAILY_LIMIT, 50_000)
}

pub fn get_quota_monthly_limit(env: &dyn Environment) -> Result<u64, EnvError> {
    loupe_env::get_parsed(env, LOUPE_QUOTA_MONTHLY_LIMIT, 1_000_000)
}

pub fn get_cache_ttl_secs(env: &dyn Environment) -> Result<u64, EnvError> {
    loupe_env::get_parsed(env, LOUPE_CACHE_TTL_SECS, 3600)
}

pub fn get_max_result_bytes(env: &dyn Environment) -> Result<u64, EnvError> {
    loupe_env::get_parsed(env, LOUPE_MAX_RESULT_BYTES, 100 * 1024 * 1024)
}

pub fn get_retry_max_attempts(env: &dyn Environment) -> Result<u32, EnvError> {
    loupe_env::get_parsed(env, LOUPE_RETRY_MAX_ATTEMPTS, 3)
}

pub fn get_retry_base_delay_ms(env: &dyn Environment) -> Result<u64, EnvError> {
    loupe_env::get_parsed(env, LOUPE_RETRY_BASE_DELAY_MS, 250)
}
