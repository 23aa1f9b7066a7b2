//! Per-process instance identifier, embedded in every claim this process
//! takes out (§6.3).

use std::time::{SystemTime, UNIX_EPOCH};

/// `K_REVISION` if set (Cloud Run's revision name, used verbatim as a
/// stable per-deployment identifier); otherwise
/// `local-<nanoseconds>-<8 hex random bytes>`.
pub fn instance_id() -> String {
    if let Ok(revision) = std::env::var("K_REVISION") {
        if !revision.is_empty() {
            return revision;
        }
    }
    local_instance_id()
}

fn local_instance_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut rng = rand::rng();
    let bytes: [u8; 4] = rand::Rng::random(&mut rng);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("local-{nanos}-{hex}")
}
