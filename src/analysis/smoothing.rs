// Rolling median over recent frequency readings
//
// Vibrato and bin jitter make consecutive readings of a held note wander by a
// bin or two. A short median over the last few readings keeps the reported
// frequency inside the note's band without delaying onsets: a reading with no
// frequency always stays without one.

use std::collections::VecDeque;

use crate::analysis::estimator::FrequencyReading;

/// Rolling median smoother for [`FrequencyReading`]s
#[derive(Debug, Clone)]
pub struct FrequencySmoother {
    history: VecDeque<Option<f32>>,
    capacity: usize,
}

impl FrequencySmoother {
    /// Create a smoother over the last `capacity` readings (<= 1 disables it)
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.max(1)),
            capacity,
        }
    }

    pub fn smooth(&mut self, reading: FrequencyReading) -> FrequencyReading {
        if self.capacity <= 1 {
            return reading;
        }

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(reading.frequency);

        if reading.frequency.is_none() {
            return reading;
        }

        let mut voiced: Vec<f32> = self.history.iter().flatten().copied().collect();
        if voiced.len() < 2 {
            return reading;
        }

        FrequencyReading {
            frequency: Some(median(&mut voiced)),
            ..reading
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Median of a non-empty slice; even lengths average the two middle values
fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
