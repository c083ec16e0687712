use std::panic;
use std::sync::{Arc, Once};

use sentry_core::{sentry_debug, Hub};
use sentry_panic::PanicIntegration;

static INIT: Once = Once::new();

/// Installs a panic hook reporting to `hub`.
///
/// Only the first call per process installs a hook and keeps its hub alive;
/// later calls return `false` and leave the hook untouched.  Panics are
/// captured as fatal events, the client is flushed, and the previously
/// registered hook runs afterwards.
pub(crate) fn install_hook(hub: Arc<Hub>) -> bool {
    let mut installed = false;
    INIT.call_once(|| {
        installed = true;
        sentry_debug!("installing panic hook");
        let next = panic::take_hook();
        let integration = PanicIntegration::new();
        panic::set_hook(Box::new(move |info| {
            let event = integration.event_from_panic_info(info);
            hub.capture_event(event);
            if let Some(client) = hub.client() {
                client.flush(None);
            }
            next(info);
        }));
    });
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub() -> Arc<Hub> {
        Arc::new(Hub::new(None, Arc::new(Default::default())))
    }

    #[test]
    fn test_only_first_hook_is_installed() {
        install_hook(hub());
        assert!(!install_hook(hub()));
        assert!(INIT.is_completed());
    }
}
