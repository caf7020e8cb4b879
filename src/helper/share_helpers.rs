use std::time::{Duration, Instant};

use serde::Serialize;

use crate::helper::sanitization_helpers::plain_text;

/// How long the "copied" acknowledgement stays visible after a copy.
pub const COPIED_RESET_DELAY: Duration = Duration::from_secs(2);

/// Pre-built share targets for one page.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub whatsapp: String,
    pub twitter: String,
    pub facebook: String,
    pub linkedin: String,
    /// The canonical URL itself, for the copy-link action.
    pub copy_url: String,
    /// Summary shown next to the share menu; the title when none is given.
    pub description: String,
    /// Milliseconds the copy acknowledgement is shown for.
    pub copied_reset_ms: u64,
}

impl ShareLinks {
    pub fn new(title: &str, url: &str, description: Option<&str>) -> Self {
        let title = plain_text(title);
        let encoded_url = urlencoding::encode(url);
        let encoded_title = urlencoding::encode(&title);
        ShareLinks {
            whatsapp: format!("https://wa.me/?text={}%20{}", encoded_title, encoded_url),
            twitter: format!("https://twitter.com/intent/tweet?url={}&text={}", encoded_url, encoded_title),
            facebook: format!("https://www.facebook.com/sharer/sharer.php?u={}", encoded_url),
            linkedin: format!("https://www.linkedin.com/sharing/share-offsite/?url={}", encoded_url),
            copy_url: url.to_string(),
            description: description.map(plain_text).unwrap_or_else(|| title.clone()),
            copied_reset_ms: COPIED_RESET_DELAY.as_millis() as u64,
        }
    }
}

/// Transient "copied" indicator that reverts on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyAcknowledgement {
    copied_at: Option<Instant>,
}

impl CopyAcknowledgement {
    pub fn mark_copied(&mut self, now: Instant) {
        self.copied_at = Some(now);
    }

    pub fn is_showing(&self, now: Instant) -> bool {
        match self.copied_at {
            Some(at) => now.saturating_duration_since(at) < COPIED_RESET_DELAY,
            None => false,
        }
    }
}
