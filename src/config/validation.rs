use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    #[error("max_payload_bytes must be at least 1KB, got {actual}")]
    PayloadLimitTooSmall { actual: u64 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_fetcher(config)?;
    validate_server(config)?;

    if config.events.channel_capacity == 0 {
        return Err(ValidationError::MustBePositive {
            field: "events.channel_capacity",
        });
    }

    Ok(())
}

fn validate_fetcher(config: &Config) -> Result<(), ValidationError> {
    if config.fetcher.concurrent_fragments == 0 {
        return Err(ValidationError::MustBePositive {
            field: "fetcher.concurrent_fragments",
        });
    }
    if config.fetcher.socket_timeout_secs == 0 {
        return Err(ValidationError::MustBePositive {
            field: "fetcher.socket_timeout_secs",
        });
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    let actual = config.server.max_payload_bytes.as_u64();
    if actual < 1024 {
        return Err(ValidationError::PayloadLimitTooSmall { actual });
    }
    Ok(())
}
