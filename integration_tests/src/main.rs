//! Line protocol checks for one flashed sniffer board.

mod device;
mod protocol;
mod report;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use device::{resolve_ports, DeviceClient};
use report::Report;

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Line protocol checks for the CC1101 sniffer firmware")]
struct Args {
    /// Serial port of the board ("auto" probes every ttyACM port)
    #[arg(short, long, default_value = "auto")]
    port: String,

    #[arg(short, long, default_value = "115200")]
    baud: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let port = resolve_ports(&[args.port.as_str()])?.remove(0);

    println!("{}", "CC1101 Sniffer Integration Tests".bold());
    println!("Port: {} @ {}", port, args.baud);

    let mut device = DeviceClient::new(&port, args.baud)?;
    // Skip whatever is left of the startup register dump
    std::thread::sleep(Duration::from_secs(1));
    device.drain_buffer()?;

    println!("\nRunning tests...\n");
    let mut report = Report::new();
    tests::run_all(&mut device, &mut report);
    report.exit()
}
