use thiserror::Error;

use super::models::StartDownloadRequest;
use crate::store::Settings;

const MAX_JOB_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum PayloadValidationError {
    #[error("url must not be empty")]
    MissingUrl,
    #[error("url must be an http/https address: {0}")]
    InvalidUrl(String),
    #[error("job_id must be 1 to 128 characters")]
    InvalidJobId,
    #[error("max_retries must be at least 1")]
    InvalidMaxRetries,
    #[error("download_path must not be empty")]
    MissingDownloadPath,
}

pub fn validate_start_request(request: &StartDownloadRequest) -> Result<(), PayloadValidationError> {
    validate_url(&request.url)?;

    if let Some(job_id) = &request.job_id {
        if job_id.is_empty() || job_id.len() > MAX_JOB_ID_LEN {
            return Err(PayloadValidationError::InvalidJobId);
        }
    }

    Ok(())
}

pub fn validate_url(url: &str) -> Result<(), PayloadValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(PayloadValidationError::MissingUrl);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(PayloadValidationError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Result<(), PayloadValidationError> {
    if settings.max_retries == 0 {
        return Err(PayloadValidationError::InvalidMaxRetries);
    }
    if settings.download_path.as_os_str().is_empty() {
        return Err(PayloadValidationError::MissingDownloadPath);
    }
    Ok(())
}
