/*
 *  wire.rs
 *
 *  MeterBridge - needle in the red
 *	(c) 2020-25 Stuart Hunter
 *
 *	TODO:
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! Line decoder for the backend feed.
//!
//! The producer multiplexes several payload shapes over one newline-delimited
//! JSON stream and none of them carry a sequence number or envelope, so we
//! classify each line by shape alone:
//!
//! - `[l, r]`                         bare stereo level pair (dB)
//! - `{"<cmd>": {"result": "Ok", "value": [l, r]}}`  command reply wrapper
//! - `{"type": "rta", "left": [...], "right": [...]}` stereo spectrum
//! - `{"type": "rta", "data": [...]}`                 mono spectrum
//!
//! Anything else is noise from a shared stream and is dropped without
//! touching meter state. Drops are logged at trace so a chatty producer
//! cannot flood the journal.

use log::trace;
use serde_json::Value;

/// Bands in an RTA payload, third-octave 20 Hz .. 20 kHz.
pub const BAND_COUNT: usize = 31;

/// One decoded line from the producer.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Stereo program level, dB.
    Level { left: f32, right: f32 },
    /// Per-band energy, dB, left/right. Mono payloads land in both.
    Spectrum {
        left: [f32; BAND_COUNT],
        right: [f32; BAND_COUNT],
    },
}

/// Decode one line of the feed. `None` means the line carried nothing for
/// the meters; the caller just moves on to the next line.
pub fn decode_line(line: &str) -> Option<InboundFrame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let val: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            trace!("drop unparseable line: {}", e);
            return None;
        }
    };

    match &val {
        Value::Array(_) => match level_pair(&val) {
            Some((left, right)) => Some(InboundFrame::Level { left, right }),
            None => {
                trace!("drop array with non-level shape");
                None
            }
        },
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("rta") {
                return decode_rta(&val);
            }
            // single-key command wrapper, e.g. {"getLevels": {...}}
            if map.len() == 1 {
                let (cmd, body) = map.iter().next()?;
                return decode_reply(cmd, body);
            }
            trace!("drop object with unknown shape");
            None
        }
        _ => {
            trace!("drop non-container payload");
            None
        }
    }
}

/// `{"result": "Ok", "value": [l, r]}` body of a command wrapper. A non-Ok
/// result is a valid reply that simply carries no levels.
fn decode_reply(cmd: &str, body: &Value) -> Option<InboundFrame> {
    let result = body.get("result").and_then(Value::as_str)?;
    if result != "Ok" {
        trace!("drop {} reply with result {:?}", cmd, result);
        return None;
    }
    let (left, right) = level_pair(body.get("value")?)?;
    Some(InboundFrame::Level { left, right })
}

fn decode_rta(val: &Value) -> Option<InboundFrame> {
    if let (Some(l), Some(r)) = (val.get("left"), val.get("right")) {
        let left = band_array(l)?;
        let right = band_array(r)?;
        return Some(InboundFrame::Spectrum { left, right });
    }
    if let Some(d) = val.get("data") {
        let bands = band_array(d)?;
        return Some(InboundFrame::Spectrum {
            left: bands,
            right: bands,
        });
    }
    trace!("drop rta payload without left/right or data");
    None
}

/// Exactly two JSON numbers, or nothing.
fn level_pair(val: &Value) -> Option<(f32, f32)> {
    let arr = val.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    let l = arr[0].as_f64()? as f32;
    let r = arr[1].as_f64()? as f32;
    Some((l, r))
}

/// Exactly `BAND_COUNT` JSON numbers, or nothing. A truncated or padded
/// band list would silently misalign the whole display, so length is strict.
fn band_array(val: &Value) -> Option<[f32; BAND_COUNT]> {
    let arr = val.as_array()?;
    if arr.len() != BAND_COUNT {
        trace!("drop band list of length {}", arr.len());
        return None;
    }
    let mut out = [0.0f32; BAND_COUNT];
    for (slot, v) in out.iter_mut().zip(arr.iter()) {
        *slot = v.as_f64()? as f32;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_pair() {
        assert_eq!(
            decode_line("[-6.2, -3.1]"),
            Some(InboundFrame::Level {
                left: -6.2,
                right: -3.1
            })
        );
        // integers are levels too
        assert_eq!(
            decode_line("[-60, 0]"),
            Some(InboundFrame::Level {
                left: -60.0,
                right: 0.0
            })
        );
    }

    #[test]
    fn command_reply_wrapper() {
        let ok = r#"{"getLevels": {"result": "Ok", "value": [-12.5, -9.0]}}"#;
        assert_eq!(
            decode_line(ok),
            Some(InboundFrame::Level {
                left: -12.5,
                right: -9.0
            })
        );
        // any single-key wrapper works, the command name is not inspected
        let other = r#"{"vumeter": {"result": "Ok", "value": [0, 0]}}"#;
        assert!(matches!(
            decode_line(other),
            Some(InboundFrame::Level { .. })
        ));
    }

    #[test]
    fn non_ok_reply_is_dropped() {
        let err = r#"{"getLevels": {"result": "Error", "value": [-12.5, -9.0]}}"#;
        assert_eq!(decode_line(err), None);
    }

    #[test]
    fn rta_stereo_and_mono() {
        let bands: Vec<String> = (0..BAND_COUNT).map(|i| format!("{}", -(i as i32))).collect();
        let list = bands.join(",");
        let stereo = format!(r#"{{"type":"rta","left":[{0}],"right":[{0}]}}"#, list);
        match decode_line(&stereo) {
            Some(InboundFrame::Spectrum { left, right }) => {
                assert_eq!(left[0], 0.0);
                assert_eq!(left[30], -30.0);
                assert_eq!(left, right);
            }
            other => panic!("unexpected {:?}", other),
        }

        let mono = format!(r#"{{"type":"rta","data":[{}]}}"#, list);
        match decode_line(&mono) {
            Some(InboundFrame::Spectrum { left, right }) => assert_eq!(left, right),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_lines_are_dropped() {
        for line in [
            "",
            "   ",
            "not json at all",
            "{\"type\":\"rta\"}",
            "[1.0]",
            "[1.0, 2.0, 3.0]",
            "[\"a\", \"b\"]",
            "{\"getLevels\": {\"value\": [0, 0]}}",
            "{\"a\": 1, \"b\": 2}",
            "42",
            "null",
        ] {
            assert_eq!(decode_line(line), None, "line {:?}", line);
        }
    }

    #[test]
    fn wrong_band_count_is_dropped() {
        let short: Vec<String> = (0..30).map(|_| "0".to_string()).collect();
        let line = format!(r#"{{"type":"rta","data":[{}]}}"#, short.join(","));
        assert_eq!(decode_line(&line), None);

        // one bad entry poisons the frame
        let mut bands: Vec<String> = (0..BAND_COUNT).map(|_| "0".to_string()).collect();
        bands[7] = "\"x\"".to_string();
        let line = format!(r#"{{"type":"rta","data":[{}]}}"#, bands.join(","));
        assert_eq!(decode_line(&line), None);
    }
}
