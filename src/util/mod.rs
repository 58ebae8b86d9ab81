#[cfg(target_arch = "wasm32")]
pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Optimistic id for a locally created record.
///
/// `tmp-` ids never reach the remote API as ids; the server assigns the real one on create.
pub fn new_local_id() -> String {
    let mut buf = [0u8; 8];
    if getrandom::getrandom(&mut buf).is_err() {
        return format!("tmp-{}", now_ms());
    }
    format!("tmp-{}-{:016x}", now_ms(), u64::from_le_bytes(buf))
}

pub fn is_local_id(id: &str) -> bool {
    id.starts_with("tmp-")
}

/// Collapse runs of whitespace into single spaces and trim both ends.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
