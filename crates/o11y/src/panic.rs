use std::sync::Once;
use std::{panic, thread};
use tracing::error;

static INSTALLED: Once = Once::new();

/// Install a panic hook that logs through tracing before the default
/// hook runs, so panics land on stderr alongside the rest of the logs.
pub fn install_hook() {
    INSTALLED.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let thread = thread::current();
            let name = thread.name().unwrap_or("<unnamed>");
            let payload = match panic_info.payload().downcast_ref::<&str>() {
                Some(s) => *s,
                None => match panic_info.payload().downcast_ref::<String>() {
                    Some(s) => s.as_str(),
                    None => "<non-string panic payload>",
                },
            };

            let location = panic_info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "<unknown>".into());

            error!(%name, %location, %payload, "panic captured");

            prev(panic_info);
        }));
    });
}
