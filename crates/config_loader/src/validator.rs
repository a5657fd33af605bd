//! Configuration validation
//!
//! Rules:
//! - window_size > 0
//! - lateness > window_size
//! - at least one stream
//! - stream ids non-empty and unique
//! - buffer.max_per_stream > 0 when set

use std::collections::BTreeSet;

use contracts::{ContractError, StreamKey, SyncConfig};

/// Validate a SyncConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate<K: StreamKey>(config: &SyncConfig<K>) -> Result<(), ContractError> {
    validate_window(config)?;
    validate_streams(config)?;
    validate_buffer(config)?;
    Ok(())
}

/// Validate lateness / window constants
fn validate_window<K>(config: &SyncConfig<K>) -> Result<(), ContractError> {
    if config.window_size == 0 {
        return Err(ContractError::config_validation(
            "window_size",
            "window_size must be > 0",
        ));
    }

    if config.lateness <= config.window_size {
        return Err(ContractError::config_validation(
            "lateness / window_size",
            format!(
                "lateness ({}) must be > window_size ({})",
                config.lateness, config.window_size
            ),
        ));
    }

    Ok(())
}

/// Validate stream ids (present, non-empty, unique)
fn validate_streams<K: StreamKey>(config: &SyncConfig<K>) -> Result<(), ContractError> {
    if config.streams.is_empty() {
        return Err(ContractError::config_validation(
            "streams",
            "at least one stream must be registered",
        ));
    }

    let mut seen = BTreeSet::new();
    for (idx, stream) in config.streams.iter().enumerate() {
        if stream.to_string().trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("streams[{idx}]"),
                "stream id cannot be empty",
            ));
        }
        if !seen.insert(stream) {
            return Err(ContractError::config_validation(
                format!("streams[{idx}]"),
                format!("duplicate stream id '{stream}'"),
            ));
        }
    }
    Ok(())
}

/// Validate buffer policy
fn validate_buffer<K>(config: &SyncConfig<K>) -> Result<(), ContractError> {
    if config.buffer.max_per_stream == Some(0) {
        return Err(ContractError::config_validation(
            "buffer.max_per_stream",
            "max_per_stream must be > 0 when set",
        ));
    }
    Ok(())
}
