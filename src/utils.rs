use std::env;

fn show_backtrace() -> bool {
    if log::max_level() >= log::LevelFilter::Debug {
        return true;
    }

    if let Ok(true) = env::var("RUST_BACKTRACE").map(|s| s == "1") {
        return true;
    }

    false
}

/// Log a fatal error with all its causes. Error records reach syslog with
/// alert severity.
pub fn report_error(e: &anyhow::Error) {
    if show_backtrace() {
        log::error!("fatal: {:?}", e);
    } else {
        log::error!("fatal: {:#}", e);
    }
}
