//! Transient user-facing notifications.

use std::collections::VecDeque;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use rotator_core::RotatorError;

pub const NOTICE_CAPACITY: usize = 20;
pub const NOTICE_TTL: Duration = Duration::seconds(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Bounded queue; the oldest notice is dropped when full.
#[derive(Debug)]
pub struct Notices {
    items: VecDeque<Notice>,
    next_id: u64,
    ttl: Duration,
}

impl Default for Notices {
    fn default() -> Self {
        Self::with_ttl(NOTICE_TTL)
    }
}

impl Notices {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            items: VecDeque::with_capacity(NOTICE_CAPACITY),
            next_id: 1,
            ttl,
        }
    }

    pub fn push(
        &mut self,
        level: NoticeLevel,
        message: impl Into<String>,
        now: OffsetDateTime,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.items.len() == NOTICE_CAPACITY {
            self.items.pop_front();
        }
        self.items.push_back(Notice {
            id,
            level,
            message: message.into(),
            created_at: now,
        });
        id
    }

    /// User mistakes become warnings, everything else an error.
    pub fn push_error(&mut self, err: &RotatorError, now: OffsetDateTime) -> u64 {
        let level = if err.is_user_error() {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Error
        };
        self.push(level, err.to_string(), now)
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn expire(&mut self, now: OffsetDateTime) {
        let ttl = self.ttl;
        self.items.retain(|n| now - n.created_at < ttl);
    }

    /// Notices still visible at `now`, oldest first.
    pub fn active(&self, now: OffsetDateTime) -> Vec<Notice> {
        self.items
            .iter()
            .filter(|n| now - n.created_at < self.ttl)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    fn noon() -> OffsetDateTime {
        OffsetDateTime::parse("2026-10-16T12:00:00Z", &Rfc3339).unwrap()
    }

    #[test]
    fn notices_expire_after_ttl() {
        let t0 = noon();
        let mut notices = Notices::default();
        notices.push(NoticeLevel::Info, "loading", t0);
        assert_eq!(notices.active(t0 + Duration::seconds(4)).len(), 1);
        assert!(notices.active(t0 + Duration::seconds(5)).is_empty());
        notices.expire(t0 + Duration::seconds(6));
        assert!(notices.active(t0).is_empty());
    }

    #[test]
    fn capacity_drops_oldest() {
        let t0 = noon();
        let mut notices = Notices::default();
        for i in 0..NOTICE_CAPACITY + 3 {
            notices.push(NoticeLevel::Info, format!("n{i}"), t0);
        }
        let active = notices.active(t0);
        assert_eq!(active.len(), NOTICE_CAPACITY);
        assert_eq!(active[0].message, "n3");
    }

    #[test]
    fn dismiss_removes_one() {
        let t0 = noon();
        let mut notices = Notices::default();
        let a = notices.push(NoticeLevel::Info, "a", t0);
        notices.push(NoticeLevel::Info, "b", t0);
        assert!(notices.dismiss(a));
        assert!(!notices.dismiss(a));
        assert_eq!(notices.active(t0).len(), 1);
    }

    #[test]
    fn error_levels_follow_taxonomy() {
        let t0 = noon();
        let mut notices = Notices::default();
        notices.push_error(&RotatorError::EmptyCatalog, t0);
        notices.push_error(&RotatorError::NothingSelected, t0);
        notices.push_error(&RotatorError::fetch("avatars", "HTTP 500"), t0);
        let levels: Vec<_> = notices.active(t0).iter().map(|n| n.level).collect();
        assert_eq!(
            levels,
            vec![NoticeLevel::Warning, NoticeLevel::Warning, NoticeLevel::Error]
        );
    }
}
