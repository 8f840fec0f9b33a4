pub mod assessment;
pub mod reading;

pub use assessment::Assessment;
pub use reading::{capture_time, new_patient_id, EcgRhythm, Reading};
