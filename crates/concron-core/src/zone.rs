//! Time zones that schedules are evaluated in.
use std::fmt;

use chrono::{Offset as _, TimeZone as _};
use time::{OffsetDateTime, UtcOffset};

use crate::cron::CronExpr;

/// Upper bound on offset changes crossed while looking for one firing.
const MAX_TRANSITIONS: usize = 16;

/// Maps an instant to the UTC offset in effect at that instant.
pub trait Zone: fmt::Debug + Send + Sync + 'static {
    fn offset_at(&self, at: OffsetDateTime) -> UtcOffset;
}

/// A zone without transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedZone(pub UtcOffset);

impl Zone for FixedZone {
    fn offset_at(&self, _at: OffsetDateTime) -> UtcOffset {
        self.0
    }
}

/// The system time zone, daylight saving rules included.
///
/// Resolved through `chrono::Local`, which stays usable once the runtime has
/// started its worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalZone;

impl Zone for LocalZone {
    fn offset_at(&self, at: OffsetDateTime) -> UtcOffset {
        let Some(utc) = chrono::DateTime::<chrono::Utc>::from_timestamp(at.unix_timestamp(), 0)
        else {
            return UtcOffset::UTC;
        };
        let secs = chrono::Local
            .offset_from_utc_datetime(&utc.naive_utc())
            .fix()
            .local_minus_utc();
        UtcOffset::from_whole_seconds(secs).unwrap_or(UtcOffset::UTC)
    }
}

impl CronExpr {
    /// First firing strictly after `after`, matching wall-clock time in `zone`.
    ///
    /// A wall-clock time skipped by a forward transition does not fire that day.
    /// One repeated by a backward transition fires in both offsets.
    pub fn next_in<Z>(&self, after: OffsetDateTime, zone: &Z) -> Option<OffsetDateTime>
    where
        Z: Zone + ?Sized,
    {
        if self.is_interval() {
            return self.next_after(after);
        }

        let mut from = after;
        let mut offset = zone.offset_at(from);

        for _ in 0..MAX_TRANSITIONS {
            let candidate = self.next_after(from.to_offset(offset))?;
            let actual = zone.offset_at(candidate);
            if actual == offset {
                return Some(candidate);
            }
            // resume just before the change, reading wall-clock time in the new offset
            let change = transition(zone, from, candidate, offset);
            from = (change - time::Duration::SECOND).max(after);
            offset = zone.offset_at(change);
        }
        None
    }
}

/// First instant in `(lo, hi]` whose offset differs from `old`, to the second.
fn transition<Z: Zone + ?Sized>(
    zone: &Z,
    mut lo: OffsetDateTime,
    mut hi: OffsetDateTime,
    old: UtcOffset,
) -> OffsetDateTime {
    while hi - lo > time::Duration::SECOND {
        let mid = lo + (hi - lo) / 2;
        if zone.offset_at(mid) == old {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}
