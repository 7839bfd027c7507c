use crate::model::Ms;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Whole seconds from `from` to `to`, clamped at zero for clock skew.
pub(crate) fn elapsed_secs(from: Ms, to: Ms) -> u64 {
    ((to - from).max(0) / 1000) as u64
}
