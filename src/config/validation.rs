use crate::config::types::{AuthConfig, Config, PageConfig, ProfileConfig, RuleConfig, StorageConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_rule_config(&config.rule)?;
    validate_page_config(&config.page)?;
    validate_profile_config(&config.profile)?;
    if let Some(auth) = &config.auth {
        validate_auth_config(auth)?;
    }
    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates rule switches
fn validate_rule_config(config: &RuleConfig) -> Result<(), ConfigError> {
    let has_image = config
        .replacement_image
        .as_deref()
        .is_some_and(|path| !path.is_empty());

    if config.replace_images && !has_image {
        return Err(ConfigError::Validation(
            "replacement_image is required when replace_images is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates forward pagination configuration
fn validate_page_config(config: &PageConfig) -> Result<(), ConfigError> {
    if config.jump_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "page jump_interval must be >= 1s, got {}s",
            config.jump_interval
        )));
    }

    if let Some(max_time) = config.max_time {
        if max_time <= config.min_time {
            return Err(ConfigError::Validation(format!(
                "page max_time ({}) must be after min_time ({})",
                max_time, config.min_time
            )));
        }
    }

    if config.crawl_existing && config.crawl_existing_interval < 1 {
        return Err(ConfigError::Validation(
            "crawl_existing_interval must be >= 1s when crawl_existing is enabled".to_string(),
        ));
    }

    validate_account_ids("page", &config.target_accounts)?;

    Ok(())
}

/// Validates backward pagination configuration
fn validate_profile_config(config: &ProfileConfig) -> Result<(), ConfigError> {
    if config.jump_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "profile jump_interval must be >= 1s, got {}s",
            config.jump_interval
        )));
    }

    validate_account_ids("profile", &config.target_accounts)?;

    Ok(())
}

/// Validates proxy credentials
fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    if config.username.is_empty() || config.password.is_empty() {
        return Err(ConfigError::Validation(
            "auth username and password cannot be empty".to_string(),
        ));
    }

    // The username ends at the first colon in a basic-auth token
    if config.username.contains(':') {
        return Err(ConfigError::Validation(format!(
            "auth username cannot contain ':', got '{}'",
            config.username
        )));
    }

    Ok(())
}

/// Account ids are the platform's base64 business ids
fn validate_account_ids(section: &str, ids: &[String]) -> Result<(), ConfigError> {
    for id in ids {
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} target_accounts cannot contain empty ids",
                section
            )));
        }

        if id.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "{} target account '{}' contains whitespace",
                section, id
            )));
        }
    }

    Ok(())
}
