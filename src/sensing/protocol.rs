//! Line protocol spoken by the pulse sensor board.
//!
//! Each line is either `<amplitude>,<bpm>`, the leads-off sentinel, or noise.

/// Sent by the board when an electrode loses skin contact.
pub const DISCONNECT_SENTINEL: &str = "Leads off detected!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorLine {
    Sample { amplitude: i32, bpm: i32 },
    Disconnected,
    Malformed(String),
}

pub fn decode_line(line: &str) -> SensorLine {
    let line = line.trim();

    if line == DISCONNECT_SENTINEL {
        return SensorLine::Disconnected;
    }

    let Some((amplitude, bpm)) = line.split_once(',') else {
        return SensorLine::Malformed(line.to_string());
    };

    match (amplitude.trim().parse::<i32>(), bpm.trim().parse::<i32>()) {
        (Ok(amplitude), Ok(bpm)) => SensorLine::Sample { amplitude, bpm },
        _ => SensorLine::Malformed(line.to_string()),
    }
}

/// Decodes raw bytes as UTF-8, substituting U+FFFD for invalid sequences.
pub fn decode_bytes(bytes: &[u8]) -> SensorLine {
    decode_line(&String::from_utf8_lossy(bytes))
}
