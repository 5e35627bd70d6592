/// Build an Adalight frame for a USB serial LED bridge
pub fn build_adalight_frame(payload: &[u8], frame: &mut Vec<u8>) {
    // LED count field is count - 1; a short latch payload still counts as one LED
    let led_count = (payload.len() / 3).max(1);
    let count_hi = ((led_count - 1) >> 8) as u8;
    let count_lo = (led_count - 1) as u8;
    let checksum = count_hi ^ count_lo ^ 0x55;

    frame.clear();
    frame.reserve(6 + payload.len());

    // Header
    frame.extend_from_slice(b"Ada");
    frame.push(count_hi);
    frame.push(count_lo);
    frame.push(checksum);

    frame.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_for_single_led() {
        let mut frame = Vec::new();
        build_adalight_frame(&[255, 0, 0], &mut frame);
        assert_eq!(frame, [b'A', b'd', b'a', 0, 0, 0x55, 255, 0, 0]);
    }

    #[test]
    fn test_header_counts_large_strip() {
        let payload = vec![0u8; 850 * 3];
        let mut frame = Vec::new();
        build_adalight_frame(&payload, &mut frame);
        // 849 = 0x0351
        assert_eq!(&frame[..6], &[b'A', b'd', b'a', 0x03, 0x51, 0x03 ^ 0x51 ^ 0x55]);
        assert_eq!(frame.len(), 6 + payload.len());
    }
}
