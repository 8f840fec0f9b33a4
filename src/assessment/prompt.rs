use crate::models::Reading;

use super::models::ChatMessage;

pub fn user_prompt(reading: &Reading) -> String {
    format!(
        "Patient data captured at {}: pulse {} bpm, oxygen saturation {:.1}%, \
         respiration rate {} breaths/min, temperature {:.1}°C, ECG rhythm {}. \
         Give a medical assessment based on these vital signs and the ECG findings.",
        reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
        reading.pulse_rate,
        reading.oxygen_saturation,
        reading.respiration_rate,
        reading.temperature,
        reading.ecg_rhythm,
    )
}

pub fn build_messages(system_prompt: &str, reading: &Reading) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_prompt(reading)),
    ]
}
