//! Request correlation on the caller side.
//!
//! The caller keeps the id of its most recent request per logical channel.
//! A response whose echoed id differs from the stored one belongs to a
//! superseded request and is dropped. Notifications without an id
//! (`projectsChanged`) bypass the check.

use dotpack_proto::Notification;
use std::collections::HashMap;
use tracing::debug;

/// Fresh opaque correlation id.
#[must_use]
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A logical request stream whose responses supersede each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Search,
    Details,
    Projects,
    Sources,
    Install,
    Uninstall,
}

impl Channel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Details => "details",
            Self::Projects => "projects",
            Self::Sources => "sources",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }

    /// The channel a notification answers, or `None` when it is unsolicited.
    #[must_use]
    pub fn for_notification(notification: &Notification) -> Option<Self> {
        match notification {
            Notification::Search(_) => Some(Self::Search),
            Notification::PackageDetails(_) => Some(Self::Details),
            Notification::GetProjects(_) => Some(Self::Projects),
            Notification::PackageSources(_) => Some(Self::Sources),
            Notification::InstallPackage(_) => Some(Self::Install),
            Notification::UninstallPackage(_) => Some(Self::Uninstall),
            Notification::ProjectsChanged(_) => None,
        }
    }
}

/// What to do with an incoming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Matches the current request; process it.
    Accepted,
    /// Belongs to a superseded request; drop it.
    Stale,
    /// Carries no id; always processed.
    Unsolicited,
}

impl Verdict {
    #[must_use]
    pub fn should_process(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

/// Per-channel record of the latest issued request id.
#[derive(Debug, Default)]
pub struct StaleGuard {
    current: HashMap<Channel, String>,
}

impl StaleGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an id for a new request on `channel` and make it current.
    pub fn issue(&mut self, channel: Channel) -> String {
        let id = new_request_id();
        self.track(channel, id.clone());
        id
    }

    /// Make `request_id` the current id for `channel`.
    pub fn track(&mut self, channel: Channel, request_id: impl Into<String>) {
        self.current.insert(channel, request_id.into());
    }

    #[must_use]
    pub fn current(&self, channel: Channel) -> Option<&str> {
        self.current.get(&channel).map(String::as_str)
    }

    /// Check an echoed id against the current one for `channel`.
    ///
    /// A match clears the stored id, so a duplicate delivery of the same
    /// response is treated as stale.
    pub fn accept(&mut self, channel: Channel, echoed: Option<&str>) -> Verdict {
        let Some(echoed) = echoed else {
            return Verdict::Unsolicited;
        };

        match self.current.get(&channel) {
            Some(current) if current == echoed => {
                self.current.remove(&channel);
                Verdict::Accepted
            }
            current => {
                debug!(
                    channel = channel.as_str(),
                    echoed,
                    current = current.map_or("<none>", String::as_str),
                    "dropping stale response"
                );
                Verdict::Stale
            }
        }
    }

    /// [`StaleGuard::accept`] for a decoded notification.
    pub fn accept_notification(&mut self, notification: &Notification) -> Verdict {
        match Channel::for_notification(notification) {
            Some(channel) => self.accept(channel, notification.request_id()),
            None => Verdict::Unsolicited,
        }
    }
}
