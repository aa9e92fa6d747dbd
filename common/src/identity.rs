/// Broker client identifier: `esp32-client-` followed by the station MAC
/// rendered as uppercase, colon-separated hex.
pub fn client_id_from_mac(mac: [u8; 6]) -> String {
    format!(
        "esp32-client-{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_station_mac() {
        let id = client_id_from_mac([0xA4, 0xCF, 0x12, 0x05, 0x1B, 0xE9]);
        assert_eq!(id, "esp32-client-A4:CF:12:05:1B:E9");
    }

    #[test]
    fn pads_low_octets() {
        let id = client_id_from_mac([0x00, 0x01, 0x02, 0x0A, 0x0B, 0x0C]);
        assert_eq!(id, "esp32-client-00:01:02:0A:0B:0C");
    }
}
