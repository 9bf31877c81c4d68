// Note segmenter - turns a stream of labelled windows into note events
//
// States:
//   Idle                 nothing is sounding
//   Candidate(L, t0)     L started at t0 but has not lasted MIN yet
//   Confirmed(L, t0)     L has lasted MIN; an event is emitted when it ends
//
// A confirmed note ends when silence (or unclassified sound) has lasted
// SILENCE_THRESHOLD, or when another note takes over. Another note takes over
// either after a dropout of at least DROPOUT_TOLERANCE, or by itself lasting
// MIN. The old note's event is always emitted before the new note opens.
//
// Every observation carries the span of its window, so "last seen" for a
// note is the end of its most recent window and event ends line up with the
// audio rather than with window start times.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::{Note, NoteLabel};
use crate::error::{AnalysisError, ConfigError};

/// Timing tunables of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// A candidate must persist this long before it is confirmed
    pub min_note_duration: Duration,
    /// Silence this long ends a confirmed note
    pub silence_threshold: Duration,
    /// A gap this long lets a different note take over immediately
    pub dropout_tolerance: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_note_duration: Duration::from_millis(50),
            silence_threshold: Duration::from_millis(100),
            dropout_tolerance: Duration::from_millis(50),
        }
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.silence_threshold.is_zero() {
            return Err(ConfigError::InvalidTiming {
                reason: "silence threshold must be positive".to_string(),
            });
        }
        if self.dropout_tolerance >= self.silence_threshold {
            return Err(ConfigError::InvalidTiming {
                reason: format!(
                    "dropout tolerance ({} ms) must be shorter than silence threshold ({} ms)",
                    self.dropout_tolerance.as_millis(),
                    self.silence_threshold.as_millis()
                ),
            });
        }
        Ok(())
    }
}

/// One classified window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub label: NoteLabel,
    /// Start of the window
    pub timestamp: Duration,
    /// Span of the window
    pub duration: Duration,
}

impl Observation {
    pub fn new(label: NoteLabel, timestamp: Duration, duration: Duration) -> Self {
        Self {
            label,
            timestamp,
            duration,
        }
    }

    pub fn end(&self) -> Duration {
        self.timestamp + self.duration
    }
}

/// A completed note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub note: Note,
    pub start: Duration,
    pub end: Duration,
}

impl NoteEvent {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Segmenter output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEvent {
    /// A candidate has lasted long enough to count (note-start)
    Confirmed { note: Note, start: Duration },
    /// A confirmed note ended (note-end)
    Completed(NoteEvent),
}

/// Externally visible segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterPhase {
    Idle,
    Candidate { note: Note, start: Duration },
    Confirmed { note: Note, start: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rival {
    note: Note,
    start: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Candidate {
        note: Note,
        start: Duration,
    },
    Confirmed {
        note: Note,
        start: Duration,
        last_end: Duration,
        rival: Option<Rival>,
    },
}

/// Per-stream note segmentation state machine
#[derive(Debug, Clone)]
pub struct NoteSegmenter {
    config: SegmenterConfig,
    state: State,
    last_timestamp: Option<Duration>,
}

impl NoteSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            last_timestamp: None,
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn phase(&self) -> SegmenterPhase {
        match self.state {
            State::Idle => SegmenterPhase::Idle,
            State::Candidate { note, start } => SegmenterPhase::Candidate { note, start },
            State::Confirmed { note, start, .. } => SegmenterPhase::Confirmed { note, start },
        }
    }

    /// Feed one observation, returning the events it caused in order
    ///
    /// Timestamps must strictly increase; a repeated or earlier timestamp is
    /// rejected with `OutOfOrderSample` and leaves the state untouched.
    pub fn push(&mut self, obs: Observation) -> Result<Vec<SegmentEvent>, AnalysisError> {
        self.check_order(obs.timestamp)?;
        self.last_timestamp = Some(obs.timestamp);

        let mut events = Vec::new();
        let state = self.state;
        self.state = match state {
            State::Idle => self.open(obs, None, &mut events),
            State::Candidate { note, start } => match obs.label.note() {
                Some(n) if n == note => self.promote(note, start, obs, &mut events),
                Some(_) => self.open(obs, None, &mut events),
                None => State::Idle,
            },
            State::Confirmed {
                note,
                start,
                last_end,
                rival,
            } => self.advance_confirmed(note, start, last_end, rival, obs, &mut events),
        };

        Ok(events)
    }

    /// Reject a timestamp that does not follow the last accepted one
    pub fn check_order(&self, timestamp: Duration) -> Result<(), AnalysisError> {
        match self.last_timestamp {
            Some(previous) if timestamp <= previous => Err(AnalysisError::OutOfOrderSample {
                previous,
                current: timestamp,
            }),
            _ => Ok(()),
        }
    }

    /// Discard any open note without emitting it
    ///
    /// Returns the phase that was discarded. Timestamp ordering restarts, so
    /// the next stream may begin at zero again.
    pub fn reset(&mut self) -> SegmenterPhase {
        let discarded = self.phase();
        self.state = State::Idle;
        self.last_timestamp = None;
        discarded
    }

    /// Open a candidate for the observation's note, if it carries one
    ///
    /// `run_start` backdates the candidate to an earlier start of the same
    /// run, which may promote it straight away.
    fn open(
        &self,
        obs: Observation,
        run_start: Option<Duration>,
        events: &mut Vec<SegmentEvent>,
    ) -> State {
        match obs.label.note() {
            Some(note) => self.promote(note, run_start.unwrap_or(obs.timestamp), obs, events),
            None => State::Idle,
        }
    }

    fn promote(
        &self,
        note: Note,
        start: Duration,
        obs: Observation,
        events: &mut Vec<SegmentEvent>,
    ) -> State {
        if obs.timestamp.saturating_sub(start) >= self.config.min_note_duration {
            events.push(SegmentEvent::Confirmed { note, start });
            State::Confirmed {
                note,
                start,
                last_end: obs.end(),
                rival: None,
            }
        } else {
            State::Candidate { note, start }
        }
    }

    fn advance_confirmed(
        &self,
        note: Note,
        start: Duration,
        last_end: Duration,
        rival: Option<Rival>,
        obs: Observation,
        events: &mut Vec<SegmentEvent>,
    ) -> State {
        let close = |events: &mut Vec<SegmentEvent>| {
            events.push(SegmentEvent::Completed(NoteEvent {
                note,
                start,
                end: last_end,
            }))
        };
        let away = obs.end().saturating_sub(last_end);

        match obs.label.note() {
            Some(n) if n == note => State::Confirmed {
                note,
                start,
                last_end: obs.end(),
                rival: None,
            },
            None => {
                if away >= self.config.silence_threshold {
                    close(events);
                    State::Idle
                } else {
                    State::Confirmed {
                        note,
                        start,
                        last_end,
                        rival: None,
                    }
                }
            }
            Some(other) => {
                let run_start = match rival {
                    Some(r) if r.note == other => r.start,
                    _ => obs.timestamp,
                };
                let dropout = run_start.saturating_sub(last_end);
                let persisted = obs.timestamp.saturating_sub(run_start);

                if dropout >= self.config.dropout_tolerance
                    || persisted >= self.config.min_note_duration
                    || away >= self.config.silence_threshold
                {
                    close(events);
                    self.open(obs, Some(run_start), events)
                } else {
                    State::Confirmed {
                        note,
                        start,
                        last_end,
                        rival: Some(Rival {
                            note: other,
                            start: run_start,
                        }),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "segmenter_tests.rs"]
mod tests;
