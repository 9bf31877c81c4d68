// Calibration module - measuring an instrument and deriving note bands
//
// This module provides two main components:
// 1. CalibrationSession: live frequency/volume summaries while notes are played
// 2. suggest_bands: a disjoint band table built from measured note centres
//
// The calibration workflow:
// 1. Run `calibrate listen` and hold each note, noting the mean frequency
// 2. Run `calibrate bands --center D=950 --center E=1100 ...`
// 3. Paste the printed bands into the config file

pub mod bands;
pub mod session;

pub use bands::{parse_center, suggest_bands};
pub use session::{
    analyse_recording, CalibrationReport, CalibrationSession, CalibrationSettings, FrequencySummary,
};
