//! Line protocol definitions matching the firmware.

#![allow(dead_code)]

/// Largest payload the firmware accepts on one input line
pub const MAX_PAYLOAD: usize = 64;

/// Largest payload the radio can send (FIFO minus the length byte)
pub const MAX_TX_PAYLOAD: usize = 63;

/// One line received from the device, CRLF already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLine {
    /// `*<timestamp_ms>,<rssi>,<lqi>,<HEX>[,BADCRC]`
    Record(Record),
    /// `+TX <n>`
    TxQueued(usize),
    /// `+ERR <reason>`
    Error(String),
    /// `+CC1101 Timeout`
    Timeout,
    /// Any other `+` line
    Info(String),
    /// Output that is not part of the protocol (bootloader, stray bytes)
    Other(String),
}

/// A received frame report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp_ms: u64,
    pub rssi: u8,
    pub lqi: u8,
    pub payload: Vec<u8>,
    pub crc_ok: bool,
}

/// Classify one device line.
pub fn parse_line(line: &str) -> anyhow::Result<DeviceLine> {
    if let Some(body) = line.strip_prefix('*') {
        return parse_record(body).map(DeviceLine::Record);
    }

    let Some(body) = line.strip_prefix('+') else {
        return Ok(DeviceLine::Other(line.to_string()));
    };

    if let Some(count) = body.strip_prefix("TX ") {
        let count = count
            .parse()
            .map_err(|_| anyhow::anyhow!("Bad TX count: {:?}", count))?;
        return Ok(DeviceLine::TxQueued(count));
    }
    if let Some(reason) = body.strip_prefix("ERR ") {
        return Ok(DeviceLine::Error(reason.to_string()));
    }
    if body == "CC1101 Timeout" {
        return Ok(DeviceLine::Timeout);
    }
    Ok(DeviceLine::Info(body.to_string()))
}

fn parse_record(body: &str) -> anyhow::Result<Record> {
    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < 4 || fields.len() > 5 {
        anyhow::bail!("Record has {} fields: {:?}", fields.len(), body);
    }

    let crc_ok = match fields.get(4) {
        None => true,
        Some(&"BADCRC") => false,
        Some(other) => anyhow::bail!("Unknown record flag: {:?}", other),
    };

    Ok(Record {
        timestamp_ms: fields[0].parse()?,
        rssi: fields[1].parse()?,
        lqi: fields[2].parse()?,
        payload: decode_hex(fields[3])?,
        crc_ok,
    })
}

/// Upper-case hex without separators, as the firmware expects on input.
pub fn encode_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Decode an even-length hex string.
pub fn decode_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        anyhow::bail!("Odd hex length: {:?}", text);
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| anyhow::anyhow!("Bad hex pair in {:?}", text))
        })
        .collect()
}

/// RSSI byte to dBm, matching the firmware conversion.
pub fn rssi_dbm(raw: u8) -> i16 {
    (raw as i8) as i16 / 2 - 74
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let line = parse_line("*1234,200,21,4142434445").unwrap();
        assert_eq!(
            line,
            DeviceLine::Record(Record {
                timestamp_ms: 1234,
                rssi: 200,
                lqi: 21,
                payload: b"ABCDE".to_vec(),
                crc_ok: true,
            })
        );
    }

    #[test]
    fn test_parse_bad_crc_record() {
        match parse_line("*5,10,3,BEEF,BADCRC").unwrap() {
            DeviceLine::Record(record) => {
                assert!(!record.crc_ok);
                assert_eq!(record.payload, vec![0xBE, 0xEF]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_status_lines() {
        assert_eq!(parse_line("+TX 4").unwrap(), DeviceLine::TxQueued(4));
        assert_eq!(
            parse_line("+ERR invalid hex").unwrap(),
            DeviceLine::Error("invalid hex".into())
        );
        assert_eq!(parse_line("+CC1101 Timeout").unwrap(), DeviceLine::Timeout);
        assert_eq!(parse_line("+READY").unwrap(), DeviceLine::Info("READY".into()));
        assert_eq!(
            parse_line("ESP-ROM:esp32s3").unwrap(),
            DeviceLine::Other("ESP-ROM:esp32s3".into())
        );
    }

    #[test]
    fn test_malformed_record_rejected() {
        assert!(parse_line("*1,2,3").is_err());
        assert!(parse_line("*1,2,3,ABC").is_err());
        assert!(parse_line("*1,2,3,AB,WHAT").is_err());
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(encode_hex(&[0xDE, 0xAD, 0x01]), "DEAD01");
        assert_eq!(decode_hex("dead01").unwrap(), vec![0xDE, 0xAD, 0x01]);
        assert_eq!(rssi_dbm(0xC8), -102);
    }
}
