//! Compact printable encoding of a coordinate path.
//!
//! Coordinates are scaled by 1e5 and rounded, so a path survives a round trip
//! at five decimal degrees (~1.1m at the equator). Each latitude and longitude
//! is stored as the delta from the previous point, zig-zag mapped to a
//! non-negative value and emitted as 5 bit groups offset by 63.
//! Sessions persisted with this format must stay readable, so the layout is fixed.

use crate::coordinate::Coordinate;

const PRECISION: f64 = 1e5;
const CHUNK_MASK: i64 = 0x1f;
const CONTINUATION: i64 = 0x20;
const ASCII_OFFSET: u8 = 63;
const MAX_BYTE: u8 = ASCII_OFFSET + 0x3f;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolylineError {
    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { position: usize, character: char },
    #[error("encoding ends inside a value at position {position}")]
    Truncated { position: usize },
    #[error("value at position {position} does not fit in 64 bits")]
    Overflow { position: usize },
}

pub fn encode(points: &[Coordinate]) -> String {
    let mut result = String::with_capacity(points.len() * 8);
    let mut last_lat = 0i64;
    let mut last_lng = 0i64;

    for point in points {
        let lat = scale(point.latitude);
        let lng = scale(point.longitude);

        encode_value(lat - last_lat, &mut result);
        encode_value(lng - last_lng, &mut result);

        last_lat = lat;
        last_lng = lng;
    }

    result
}

pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat = 0i64;
    let mut lng = 0i64;

    while index < bytes.len() {
        lat = accumulate(lat, bytes, &mut index)?;
        lng = accumulate(lng, bytes, &mut index)?;
        points.push(Coordinate::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
    }

    Ok(points)
}

/// Rounds a coordinate to the precision the encoding preserves.
pub fn quantize(point: &Coordinate) -> Coordinate {
    Coordinate::new(
        scale(point.latitude) as f64 / PRECISION,
        scale(point.longitude) as f64 / PRECISION,
    )
}

fn scale(degrees: f64) -> i64 {
    (degrees * PRECISION).round() as i64
}

fn encode_value(value: i64, result: &mut String) {
    let mut v = (value << 1) ^ (value >> 63);
    while v >= CONTINUATION {
        result.push(((CONTINUATION | (v & CHUNK_MASK)) as u8 + ASCII_OFFSET) as char);
        v >>= 5;
    }
    result.push((v as u8 + ASCII_OFFSET) as char);
}

/// Adds the next delta to a running total. Deltas are up to 62 bits wide, so a few of
/// them can overflow the total.
fn accumulate(total: i64, bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let start = *index;
    let delta = decode_value(bytes, index)?;
    total.checked_add(delta).ok_or(PolylineError::Overflow { position: start })
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let start = *index;
    let mut result = 0i64;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Truncated { position: *index });
        };
        if !(ASCII_OFFSET..=MAX_BYTE).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                position: *index,
                character: byte as char,
            });
        }
        if shift > 60 {
            return Err(PolylineError::Overflow { position: start });
        }
        *index += 1;

        let chunk = (byte - ASCII_OFFSET) as i64;
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk < CONTINUATION {
            break;
        }
    }

    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode("").unwrap(), Vec::new());
    }

    #[test]
    fn known_reference_path() {
        let points = vec![
            Coordinate::new(38.5, -120.2),
            Coordinate::new(40.7, -120.95),
            Coordinate::new(43.252, -126.453),
        ];
        let encoded = encode(&points);
        assert_eq!(encoded, "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
        assert_eq!(decode(&encoded).unwrap(), points);
    }

    #[test]
    fn round_trip_at_five_decimals() {
        // A wandering path crossing the equator and the antimeridian neighbourhood
        let points: Vec<Coordinate> = (0..500).map(|i| {
            let t = i as f64 / 500.;
            Coordinate::new(-10. + 20. * t + (t * 37.).sin() * 0.0123456, 179.9 - 0.3 * t + (t * 11.).cos() * 0.0009871)
        }).collect();

        let decoded = decode(&encode(&points)).unwrap();
        let expected: Vec<Coordinate> = points.iter().map(quantize).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn half_units_are_rounded() {
        let points = vec![Coordinate::new(0.0005, -0.0005)];
        assert_eq!(decode(&encode(&points)).unwrap(), points);
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        assert_eq!(
            decode("_p~iF ps|U"),
            Err(PolylineError::InvalidCharacter { position: 5, character: ' ' })
        );
    }

    #[test]
    fn rejects_truncated_group() {
        // Continuation flag set on the last byte
        assert!(matches!(decode("_p~iF~ps|"), Err(PolylineError::Truncated { .. })));
    }

    #[test]
    fn rejects_latitude_without_longitude() {
        assert_eq!(decode("_p~iF"), Err(PolylineError::Truncated { position: 5 }));
    }

    #[test]
    fn rejects_endless_continuation() {
        let encoded = "~".repeat(20);
        assert!(matches!(decode(&encoded), Err(PolylineError::Overflow { position: 0 })));
    }

    #[test]
    fn rejects_running_total_overflow() {
        // Each latitude delta is 2^62 - 1 followed by a zero longitude delta
        let group = "}~~~~~~~~~~~F?";
        assert_eq!(decode(&group.repeat(2)).unwrap().len(), 2);
        assert_eq!(decode(&group.repeat(3)), Err(PolylineError::Overflow { position: 28 }));
    }
}
