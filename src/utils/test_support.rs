use std::time::Duration;

use crate::providers::PollPolicy;

pub fn should_skip_httpmock() -> bool {
    if can_bind_localhost() {
        return false;
    }
    eprintln!("skipping httpmock test: sandbox forbids binding to localhost");
    true
}

fn can_bind_localhost() -> bool {
    match std::net::TcpListener::bind(("127.0.0.1", 0)) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(err) => panic!("failed to bind localhost for httpmock tests: {err}"),
    }
}

/// A poll policy that never sleeps, for tests that walk the whole loop.
pub fn instant_poll(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        max_attempts: max_attempts.max(1),
        base_interval: Duration::ZERO,
        per_step_interval: Duration::ZERO,
    }
}
