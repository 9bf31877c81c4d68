// Band suggestion from measured note centres
//
// Adjacent bands meet at the midpoint between their centres. The outer
// edges extend by half the nearest gap, capped at `margin_hz`.

use crate::analysis::classifier::{Note, NoteBand, NoteBands};
use crate::error::ConfigError;

/// Parse a `NOTE=HZ` argument such as `D=950`
pub fn parse_center(arg: &str) -> Result<(Note, f32), String> {
    let (note, hz) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NOTE=HZ, got {:?}", arg))?;
    let note: Note = note.parse()?;
    let hz: f32 = hz
        .trim()
        .parse()
        .map_err(|err| format!("invalid frequency {:?}: {}", hz, err))?;
    if !hz.is_finite() || hz <= 0.0 {
        return Err(format!("frequency must be positive, got {}", hz));
    }
    Ok((note, hz))
}

/// Build a disjoint band table around the given note centres
pub fn suggest_bands(centers: &[(Note, f32)], margin_hz: f32) -> Result<NoteBands, ConfigError> {
    if centers.is_empty() {
        return Err(ConfigError::InvalidBands {
            reason: "no note centres given".to_string(),
        });
    }

    let mut sorted = centers.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    for pair in sorted.windows(2) {
        if pair[0].1 >= pair[1].1 {
            return Err(ConfigError::InvalidBands {
                reason: format!(
                    "{} and {} share the centre {} Hz",
                    pair[0].0, pair[1].0, pair[0].1
                ),
            });
        }
    }

    let last = sorted.len() - 1;
    let bands = sorted
        .iter()
        .enumerate()
        .map(|(i, &(note, center))| {
            let low = if i == 0 {
                let half_gap = sorted
                    .get(1)
                    .map(|next| (next.1 - center) / 2.0)
                    .unwrap_or(margin_hz);
                (center - half_gap.min(margin_hz)).max(0.0)
            } else {
                (sorted[i - 1].1 + center) / 2.0
            };
            let high = if i == last {
                let half_gap = if i > 0 {
                    (center - sorted[i - 1].1) / 2.0
                } else {
                    margin_hz
                };
                center + half_gap.min(margin_hz)
            } else {
                (center + sorted[i + 1].1) / 2.0
            };
            NoteBand::new(note, low, high)
        })
        .collect();

    // Also rejects a note given twice
    NoteBands::new(bands)
}
