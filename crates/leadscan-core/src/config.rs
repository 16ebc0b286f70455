use crate::scan_config::{ScanConfig, DEFAULT_INDUSTRIES, DEFAULT_USER_AGENTS};
use crate::{ConfigError, Source};

const MAX_CONCURRENT_SOURCES: usize = 3;

/// Load scan configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or fail validation.
pub fn load_scan_config() -> Result<ScanConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_scan_config_from_env()
}

/// Load scan configuration from environment variables already in the process.
///
/// Unlike [`load_scan_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or fail validation.
pub fn load_scan_config_from_env() -> Result<ScanConfig, ConfigError> {
    build_scan_config(|key| std::env::var(key))
}

/// Build scan configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the process environment so it can be tested with
/// a plain `HashMap` lookup.
fn build_scan_config<F>(lookup: F) -> Result<ScanConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        parse_flag(&raw).ok_or_else(|| invalid(var, format!("expected a boolean, got '{raw}'")))
    };

    let city = or_default("LEADSCAN_CITY", "Szczecin").trim().to_string();

    let industries = match lookup("LEADSCAN_INDUSTRIES") {
        Ok(raw) => split_list(&raw, ','),
        Err(_) => DEFAULT_INDUSTRIES.iter().map(|s| (*s).to_string()).collect(),
    };

    let sources = split_list(&or_default("LEADSCAN_SOURCES", "directory_a,directory_b"), ',')
        .iter()
        .map(|s| {
            s.parse::<Source>()
                .map_err(|e| invalid("LEADSCAN_SOURCES", e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let max_results_per_industry = parse_usize("LEADSCAN_MAX_RESULTS", "20")?;

    let request_delay_min_ms = parse_u64("LEADSCAN_REQUEST_DELAY_MIN_MS", "2000")?;
    let request_delay_max_ms = parse_u64("LEADSCAN_REQUEST_DELAY_MAX_MS", "5000")?;
    let page_delay_min_ms = parse_u64("LEADSCAN_PAGE_DELAY_MIN_MS", "3000")?;
    let page_delay_max_ms = parse_u64("LEADSCAN_PAGE_DELAY_MAX_MS", "6000")?;
    let throttle_cooldown_secs = parse_u64("LEADSCAN_THROTTLE_COOLDOWN_SECS", "30")?;
    let max_cooldown_secs = parse_u64("LEADSCAN_MAX_COOLDOWN_SECS", "120")?;

    let max_retries = parse_u32("LEADSCAN_MAX_RETRIES", "3")?;
    let retry_backoff_ms = parse_u64("LEADSCAN_RETRY_BACKOFF_MS", "1000")?;
    let request_timeout_secs = parse_u64("LEADSCAN_REQUEST_TIMEOUT_SECS", "30")?;

    let verify_websites = parse_bool("LEADSCAN_VERIFY", "true")?;
    let verify_timeout_secs = parse_u64("LEADSCAN_VERIFY_TIMEOUT_SECS", "8")?;
    let detect_parked_domains = parse_bool("LEADSCAN_DETECT_PARKED_DOMAINS", "false")?;
    let domain_guess_tlds = split_list(&or_default("LEADSCAN_DOMAIN_GUESS_TLDS", "pl,com.pl,com"), ',')
        .into_iter()
        .map(|tld| tld.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let max_concurrent_sources = parse_usize("LEADSCAN_MAX_CONCURRENT_SOURCES", "1")?;

    let user_agents = match lookup("LEADSCAN_USER_AGENTS") {
        Ok(raw) => split_list(&raw, '|'),
        Err(_) => DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_string()).collect(),
    };

    let maps_api_key = lookup("GOOGLE_MAPS_API_KEY")
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());
    let maps_quota = parse_u32("LEADSCAN_MAPS_QUOTA", "100")?;

    let directory_a_url = or_default("LEADSCAN_DIRECTORY_A_URL", "https://panoramafirm.pl");
    let directory_b_url = or_default("LEADSCAN_DIRECTORY_B_URL", "https://www.pkt.pl");
    let maps_url = or_default("LEADSCAN_MAPS_URL", "https://maps.googleapis.com");
    let log_level = or_default("LEADSCAN_LOG_LEVEL", "info");

    let config = ScanConfig {
        city,
        industries,
        sources,
        max_results_per_industry,
        request_delay_min_ms,
        request_delay_max_ms,
        page_delay_min_ms,
        page_delay_max_ms,
        throttle_cooldown_secs,
        max_cooldown_secs,
        max_retries,
        retry_backoff_ms,
        request_timeout_secs,
        verify_websites,
        verify_timeout_secs,
        detect_parked_domains,
        domain_guess_tlds,
        max_concurrent_sources,
        user_agents,
        maps_api_key,
        maps_quota,
        directory_a_url,
        directory_b_url,
        maps_url,
        log_level,
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.city.is_empty() {
        return Err(ConfigError::Validation("city must be non-empty".to_string()));
    }
    if config.industries.is_empty() {
        return Err(ConfigError::Validation(
            "at least one industry must be configured".to_string(),
        ));
    }
    if config.sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one source must be selected".to_string(),
        ));
    }
    if config.max_results_per_industry == 0 {
        return Err(ConfigError::Validation(
            "max results per industry must be positive".to_string(),
        ));
    }
    if config.request_delay_min_ms > config.request_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "request delay range is inverted: min {}ms > max {}ms",
            config.request_delay_min_ms, config.request_delay_max_ms
        )));
    }
    if config.page_delay_min_ms > config.page_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "page delay range is inverted: min {}ms > max {}ms",
            config.page_delay_min_ms, config.page_delay_max_ms
        )));
    }
    if !(1..=MAX_CONCURRENT_SOURCES).contains(&config.max_concurrent_sources) {
        return Err(ConfigError::Validation(format!(
            "max concurrent sources must be between 1 and {MAX_CONCURRENT_SOURCES}, got {}",
            config.max_concurrent_sources
        )));
    }
    Ok(())
}

/// Splits a delimited env value, trimming entries and dropping empty ones.
fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
