//! Device communication client.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

use crate::protocol::{encode_hex, parse_line, DeviceLine, Record};

/// Line that no valid payload can produce, used to probe ports
const PROBE_LINE: &str = "ZZ";

/// Ports that answer the probe line, in enumeration order.
fn detect_boards() -> Result<Vec<String>> {
    let mut boards = Vec::new();
    for info in serialport::available_ports()? {
        // USB serial JTAG enumerates as CDC-ACM
        if !info.port_name.contains("ttyACM") {
            continue;
        }
        let answered = DeviceClient::new(&info.port_name, 115200)
            .and_then(|mut client| client.probe(Duration::from_millis(500)))
            .unwrap_or(false);
        if answered {
            boards.push(info.port_name);
        }
    }
    Ok(boards)
}

/// Turn port arguments into port names; every "auto" takes the next
/// detected board not named explicitly.
pub fn resolve_ports(args: &[&str]) -> Result<Vec<String>> {
    let wanted = args.iter().filter(|a| **a == "auto").count();
    let mut detected = if wanted > 0 { detect_boards()? } else { Vec::new() };
    detected.retain(|port| !args.contains(&port.as_str()));

    if detected.len() < wanted {
        anyhow::bail!(
            "Need {} board(s) to auto-detect, found {:?} - ensure they are connected",
            wanted,
            detected
        );
    }

    let mut detected = detected.into_iter();
    Ok(args
        .iter()
        .map(|arg| match *arg {
            "auto" => detected.next().unwrap_or_default(),
            name => name.to_string(),
        })
        .collect())
}

/// Client for a sniffer board's line protocol.
pub struct DeviceClient {
    port: Box<dyn SerialPort>,
    timeout: Duration,
    /// Bytes read past the last complete line
    pending: Vec<u8>,
}

impl DeviceClient {
    /// Open the port with a short read timeout; line waits use `timeout`.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()?;

        Ok(Self {
            port,
            timeout: Duration::from_secs(2),
            pending: Vec::new(),
        })
    }

    /// Drop buffered lines and anything still arriving on the port.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        self.pending.clear();

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Send one raw text line (CRLF appended).
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        self.port.write_all(text.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Ask the device to transmit `data` and return its acknowledgement line.
    pub fn transmit(&mut self, data: &[u8]) -> Result<DeviceLine> {
        self.send_line(&encode_hex(data))?;
        self.wait_for_reply()
    }

    /// Next `+TX` or `+ERR` line, skipping records and info lines.
    pub fn wait_for_reply(&mut self) -> Result<DeviceLine> {
        let timeout = self.timeout;
        self.wait_for(timeout, |line| {
            matches!(line, DeviceLine::TxQueued(_) | DeviceLine::Error(_))
        })
    }

    /// Next packet record within `timeout`.
    pub fn wait_for_record(&mut self, timeout: Duration) -> Result<Record> {
        match self.wait_for(timeout, |line| matches!(line, DeviceLine::Record(_)))? {
            DeviceLine::Record(record) => Ok(record),
            other => anyhow::bail!("Expected a record, got {:?}", other),
        }
    }

    /// Read lines until one satisfies `accept`.
    pub fn wait_for<F>(&mut self, timeout: Duration, accept: F) -> Result<DeviceLine>
    where
        F: Fn(&DeviceLine) -> bool,
    {
        let start = Instant::now();
        while start.elapsed() < timeout {
            let Some(text) = self.read_line(timeout.saturating_sub(start.elapsed()))? else {
                break;
            };
            let line = parse_line(&text)?;
            if accept(&line) {
                return Ok(line);
            }
        }
        anyhow::bail!("Timeout waiting for device line")
    }

    /// Collect every line that arrives within `window`.
    pub fn collect_lines(&mut self, window: Duration) -> Result<Vec<DeviceLine>> {
        let start = Instant::now();
        let mut lines = Vec::new();
        while start.elapsed() < window {
            match self.read_line(window.saturating_sub(start.elapsed()))? {
                Some(text) => lines.push(parse_line(&text)?),
                None => break,
            }
        }
        Ok(lines)
    }

    /// Send a line no valid payload can produce; data ports answer `+ERR`.
    pub fn probe(&mut self, timeout: Duration) -> Result<bool> {
        self.drain_buffer()?;
        self.send_line(PROBE_LINE)?;
        Ok(self
            .wait_for(timeout, |line| matches!(line, DeviceLine::Error(_)))
            .is_ok())
    }

    /// Read one non-empty line, or `None` when `timeout` passes first.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let start = Instant::now();
        let mut buf = [0u8; 128];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n' || b == b'\r') {
                let raw: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&raw[..pos]).trim().to_string();
                if !text.is_empty() {
                    return Ok(Some(text));
                }
                continue;
            }

            if start.elapsed() >= timeout {
                return Ok(None);
            }

            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}
