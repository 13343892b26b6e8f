use crate::hue::models::{EffectFrame, LightUpdate};
use crate::{ControlError, Result};

/// Bytes in the packet header (sequence number)
pub const HEADER_SIZE: usize = 4;
/// Bytes per light record
pub const RECORD_SIZE: usize = 32;
/// Payloads above this size risk IP fragmentation
pub const MAX_PAYLOAD_SIZE: usize = 1400;

const ABSENT_INT: i32 = -1;
const ABSENT_FLOAT: f64 = -1.0;

/// Size of the packet carrying `lights` records
pub fn payload_size(lights: usize) -> usize {
    HEADER_SIZE + lights * RECORD_SIZE
}

/// Encodes an effect frame as a streaming packet.
///
/// Format (all fields big-endian):
/// - 4 bytes: Sequence number
/// - N x 32-byte light records:
///   - 4 bytes: Light id hash (i32, see [`light_id_hash`])
///   - 4 bytes: Brightness (i32, -1 when absent)
///   - 8 bytes: Hue (f64, -1.0 when absent)
///   - 8 bytes: Saturation (f64, -1.0 when absent)
///   - 4 bytes: Transition time (i32, -1 when absent)
///   - 4 bytes: Reserved (0)
///
/// Oversized frames are encoded as-is; splitting is up to the caller.
pub fn encode_frame(frame: &EffectFrame, sequence: u32) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(payload_size(frame.len()));
    buffer.extend_from_slice(&sequence.to_be_bytes());
    for update in &frame.updates {
        encode_record(&mut buffer, update);
    }
    buffer
}

fn encode_record(buffer: &mut Vec<u8>, update: &LightUpdate) {
    buffer.extend_from_slice(&light_id_hash(&update.light_id).to_be_bytes());
    buffer.extend_from_slice(&update.brightness.unwrap_or(ABSENT_INT).to_be_bytes());
    buffer.extend_from_slice(&update.hue.unwrap_or(ABSENT_FLOAT).to_be_bytes());
    buffer.extend_from_slice(&update.saturation.unwrap_or(ABSENT_FLOAT).to_be_bytes());
    buffer.extend_from_slice(&update.transition_time.unwrap_or(ABSENT_INT).to_be_bytes());
    buffer.extend_from_slice(&0i32.to_be_bytes());
}

/// 32-bit light id hash shared with the receiving side:
/// `s[0]*31^(n-1) + ... + s[n-1]` over UTF-16 code units, wrapping.
pub fn light_id_hash(light_id: &str) -> i32 {
    light_id
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// A decoded streaming packet
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub sequence: u32,
    pub records: Vec<DecodedRecord>,
}

/// A decoded light record. Sentinel values come back as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub light_hash: i32,
    pub brightness: Option<i32>,
    pub hue: Option<f64>,
    pub saturation: Option<f64>,
    pub transition_time: Option<i32>,
}

impl DecodedRecord {
    /// Whether this record was produced for `light_id`
    pub fn is_for(&self, light_id: &str) -> bool {
        self.light_hash == light_id_hash(light_id)
    }
}

/// Parse a packet produced by [`encode_frame`].
pub fn decode_packet(packet: &[u8]) -> Result<DecodedPacket> {
    if packet.len() < HEADER_SIZE {
        return Err(ControlError::InvalidPacket(format!(
            "{} bytes is shorter than the header",
            packet.len()
        )));
    }
    let (header, body) = packet.split_at(HEADER_SIZE);
    if body.len() % RECORD_SIZE != 0 {
        return Err(ControlError::InvalidPacket(format!(
            "body of {} bytes is not a multiple of {}",
            body.len(),
            RECORD_SIZE
        )));
    }

    let sequence = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let records = body.chunks_exact(RECORD_SIZE).map(decode_record).collect();
    Ok(DecodedPacket { sequence, records })
}

fn decode_record(record: &[u8]) -> DecodedRecord {
    let int_at = |at: usize| {
        i32::from_be_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
    };
    let float_at = |at: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&record[at..at + 8]);
        f64::from_be_bytes(bytes)
    };
    let int_field = |value: i32| (value != ABSENT_INT).then_some(value);
    let float_field = |value: f64| (value != ABSENT_FLOAT).then_some(value);

    DecodedRecord {
        light_hash: int_at(0),
        brightness: int_field(int_at(4)),
        hue: float_field(float_at(8)),
        saturation: float_field(float_at(16)),
        transition_time: int_field(int_at(24)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_light_id_hash_matches_reference_values() {
        assert_eq!(light_id_hash(""), 0);
        assert_eq!(light_id_hash("1"), 49);
        assert_eq!(light_id_hash("hello"), 99162322);
        assert_eq!(light_id_hash("light-12"), 991910456);
        // Non-BMP characters hash as surrogate pairs
        assert_eq!(light_id_hash("Hue Go 🎵"), 1188016073);
        assert_eq!(light_id_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_packet_layout() {
        let frame = EffectFrame::new(
            vec![LightUpdate::new("1")
                .with_brightness(200)
                .with_hue(0.5)
                .with_saturation(0.25)
                .with_transition_time(4)],
            0,
        );
        let packet = encode_frame(&frame, 0x01020304);

        assert_eq!(packet.len(), 36);
        assert_eq!(&packet[0..4], &[1, 2, 3, 4]);
        assert_eq!(&packet[4..8], &49i32.to_be_bytes());
        assert_eq!(&packet[8..12], &200i32.to_be_bytes());
        assert_eq!(&packet[12..20], &0.5f64.to_be_bytes());
        assert_eq!(&packet[20..28], &0.25f64.to_be_bytes());
        assert_eq!(&packet[28..32], &4i32.to_be_bytes());
        assert_eq!(&packet[32..36], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_absent_fields_use_sentinels() {
        let frame = EffectFrame::new(vec![LightUpdate::new("7")], 0);
        let packet = encode_frame(&frame, 9);

        assert_eq!(&packet[8..12], &(-1i32).to_be_bytes());
        assert_eq!(&packet[12..20], &(-1.0f64).to_be_bytes());
        assert_eq!(&packet[20..28], &(-1.0f64).to_be_bytes());
        assert_eq!(&packet[28..32], &(-1i32).to_be_bytes());

        let decoded = decode_packet(&packet).unwrap();
        assert_eq!(decoded.sequence, 9);
        let record = &decoded.records[0];
        assert!(record.is_for("7"));
        assert_eq!(record.brightness, None);
        assert_eq!(record.hue, None);
        assert_eq!(record.saturation, None);
        assert_eq!(record.transition_time, None);
    }

    #[test]
    fn test_zero_is_not_absent() {
        let frame = EffectFrame::new(
            vec![LightUpdate::new("z").with_brightness(0).with_hue(0.0)],
            0,
        );
        let decoded = decode_packet(&encode_frame(&frame, 0)).unwrap();
        assert_eq!(decoded.records[0].brightness, Some(0));
        assert_eq!(decoded.records[0].hue, Some(0.0));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_packet(&[0, 0, 1]).is_err());
        assert!(decode_packet(&[0u8; 4 + 31]).is_err());
        let empty = decode_packet(&[0, 0, 0, 5]).unwrap();
        assert_eq!(empty.sequence, 5);
        assert!(empty.records.is_empty());
    }

    #[test]
    fn test_max_payload_fits_43_lights() {
        assert!(payload_size(43) <= MAX_PAYLOAD_SIZE);
        assert!(payload_size(44) > MAX_PAYLOAD_SIZE);
    }

    proptest! {
        #[test]
        fn prop_packet_size_and_ids(ids in prop::collection::vec("[a-zA-Z0-9-]{1,12}", 0..60), seq in any::<u32>()) {
            let frame = EffectFrame::new(ids.iter().map(LightUpdate::new).collect(), 0);
            let packet = encode_frame(&frame, seq);
            prop_assert_eq!(packet.len(), payload_size(ids.len()));

            let decoded = decode_packet(&packet).unwrap();
            prop_assert_eq!(decoded.sequence, seq);
            for (record, id) in decoded.records.iter().zip(&ids) {
                prop_assert!(record.is_for(id));
            }
        }
    }
}
