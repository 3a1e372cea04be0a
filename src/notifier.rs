//! Desktop notifications.
//!
//! Every delivery outcome the user should see goes through [`UserNotifier`].
//! Notification failures are logged and swallowed; a missing notification
//! daemon must never fail a delivery.

use std::path::Path;

use notify_rust::Notification;
use tracing::warn;

use crate::APP_NAME;

/// Destination for user-visible delivery feedback.
pub trait UserNotifier: Send + Sync {
    /// Reports a delivered screenshot. `icon` may point at the source image.
    fn notify_success(&self, body: &str, icon: Option<&Path>);

    /// Reports a failed delivery.
    fn notify_failure(&self, body: &str);
}

/// [`UserNotifier`] backed by the desktop notification service.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl UserNotifier for DesktopNotifier {
    fn notify_success(&self, body: &str, icon: Option<&Path>) {
        let mut notification = Notification::new();
        notification.summary(APP_NAME).body(body);
        if let Some(icon) = icon.and_then(Path::to_str) {
            notification.icon(icon);
        }
        if let Err(e) = notification.show() {
            warn!(error = %e, "Failed to show success notification");
        }
    }

    fn notify_failure(&self, body: &str) {
        if let Err(e) = Notification::new().summary(APP_NAME).body(body).show() {
            warn!(error = %e, "Failed to show failure notification");
        }
    }
}
