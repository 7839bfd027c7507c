use std::collections::HashMap;

use crate::limits::MAX_ROLLBACK_STEPS;
use crate::model::{RequestId, ZoneId};

/// Parsed command from an HTTP request.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Snapshot,
    Analytics,
    Allocate {
        vehicle_id: String,
        zone_id: ZoneId,
    },
    Cancel {
        request_id: RequestId,
    },
    Leave {
        request_id: RequestId,
    },
    Rollback {
        steps: usize,
    },
}

/// Malformed form input, rejected before the engine is consulted.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    MissingField(&'static str),
    InvalidField { field: &'static str, value: String },
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::MissingField(name) => write!(f, "missing field: {name}"),
            ApiError::InvalidField { field, value } => {
                write!(f, "invalid value for {field}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Decode an `application/x-www-form-urlencoded` body. The content type is
/// not checked: some clients post forms as `text/plain`. Later duplicates
/// win.
pub fn decode_form(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// `vehicleId`, `zoneId`.
pub fn parse_allocate(body: &[u8]) -> Result<Command, ApiError> {
    let form = decode_form(body);
    let vehicle_id = form
        .get("vehicleId")
        .cloned()
        .ok_or(ApiError::MissingField("vehicleId"))?;
    let zone_id = required_number(&form, "zoneId")?;
    Ok(Command::Allocate { vehicle_id, zone_id })
}

/// `requestId`.
pub fn parse_cancel(body: &[u8]) -> Result<Command, ApiError> {
    let form = decode_form(body);
    Ok(Command::Cancel {
        request_id: RequestId(required_number(&form, "requestId")?),
    })
}

/// `requestId`.
pub fn parse_leave(body: &[u8]) -> Result<Command, ApiError> {
    let form = decode_form(body);
    Ok(Command::Leave {
        request_id: RequestId(required_number(&form, "requestId")?),
    })
}

/// Optional `k`, default 1, at most `MAX_ROLLBACK_STEPS`.
pub fn parse_rollback(body: &[u8]) -> Result<Command, ApiError> {
    let form = decode_form(body);
    let steps = match form.get("k") {
        None => 1,
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(k) if (1..=MAX_ROLLBACK_STEPS).contains(&k) => k,
            _ => {
                return Err(ApiError::InvalidField {
                    field: "k",
                    value: raw.clone(),
                });
            }
        },
    };
    Ok(Command::Rollback { steps })
}

fn required_number<T: std::str::FromStr>(
    form: &HashMap<String, String>,
    field: &'static str,
) -> Result<T, ApiError> {
    let raw = form.get(field).ok_or(ApiError::MissingField(field))?;
    raw.trim().parse().map_err(|_| ApiError::InvalidField {
        field,
        value: raw.clone(),
    })
}
