//! Per-request timing of the authorization phases.
//!
//! A [`RequestTimings`] value is created by the caller, passed by `&mut`
//! through [`CompartmentAuthorizer::authorize`](crate::CompartmentAuthorizer::authorize)
//! and read back afterwards.

use std::fmt;
use std::time::{Duration, Instant};

/// Phases of one authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Token verification and role extraction.
    Claims,
    /// Reading the claimed organizations.
    Organizations,
    /// Instance decision.
    Decision,
    /// Search narrowing.
    Narrowing,
}

impl Phase {
    const ALL: [Phase; 4] = [
        Phase::Claims,
        Phase::Organizations,
        Phase::Decision,
        Phase::Narrowing,
    ];

    fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claims => "claims",
            Self::Organizations => "organizations",
            Self::Decision => "decision",
            Self::Narrowing => "narrowing",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Span {
    started: Option<Instant>,
    finished: Option<Instant>,
}

/// Start and end instants of each phase of one request.
#[derive(Debug, Clone)]
pub struct RequestTimings {
    start: Instant,
    spans: [Span; 4],
}

impl Default for RequestTimings {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTimings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            spans: [Span::default(); 4],
        }
    }

    /// Marks the start of `phase`. Later calls keep the first mark.
    pub fn begin(&mut self, phase: Phase) {
        let span = &mut self.spans[phase.index()];
        span.started.get_or_insert_with(Instant::now);
    }

    /// Marks the end of `phase`.
    pub fn end(&mut self, phase: Phase) {
        let span = &mut self.spans[phase.index()];
        if span.started.is_some() {
            span.finished = Some(Instant::now());
        }
    }

    /// Time spent inside `phase`, once it has ended.
    #[must_use]
    pub fn spent(&self, phase: Phase) -> Option<Duration> {
        let span = self.spans[phase.index()];
        Some(span.finished?.duration_since(span.started?))
    }

    /// Time from creation until `phase` started.
    #[must_use]
    pub fn offset(&self, phase: Phase) -> Option<Duration> {
        Some(self.spans[phase.index()].started?.duration_since(self.start))
    }

    /// Time from creation until the last phase ended.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.spans
            .iter()
            .filter_map(|span| span.finished)
            .max()
            .map_or(Duration::ZERO, |last| last.duration_since(self.start))
    }
}

impl fmt::Display for RequestTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for phase in Phase::ALL {
            let (Some(offset), Some(spent)) = (self.offset(phase), self.spent(phase)) else {
                continue;
            };
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(
                f,
                "{}: +{}us/{}us",
                phase.as_str(),
                offset.as_micros(),
                spent.as_micros()
            )?;
        }
        if !first {
            f.write_str(", ")?;
        }
        write!(f, "total: {}us", self.total().as_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_recording() {
        let mut timings = RequestTimings::new();
        assert!(timings.spent(Phase::Claims).is_none());

        timings.begin(Phase::Claims);
        timings.end(Phase::Claims);
        timings.begin(Phase::Decision);
        timings.end(Phase::Decision);

        assert!(timings.spent(Phase::Claims).is_some());
        assert!(timings.offset(Phase::Decision) >= timings.offset(Phase::Claims));
        assert!(timings.spent(Phase::Narrowing).is_none());
        assert!(timings.total() >= timings.spent(Phase::Decision).unwrap());
    }

    #[test]
    fn test_end_without_begin_is_ignored() {
        let mut timings = RequestTimings::new();
        timings.end(Phase::Narrowing);
        assert!(timings.spent(Phase::Narrowing).is_none());
        assert_eq!(timings.total(), Duration::ZERO);
    }

    #[test]
    fn test_display() {
        let mut timings = RequestTimings::new();
        assert!(timings.to_string().starts_with("total: "));

        timings.begin(Phase::Organizations);
        timings.end(Phase::Organizations);
        let summary = timings.to_string();
        assert!(summary.starts_with("organizations: +"));
        assert!(summary.contains(", total: "));
        assert!(!summary.contains("claims"));
    }
}
