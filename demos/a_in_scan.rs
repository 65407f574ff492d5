// demos/a_in_scan.rs
//! Continuous two-channel analog input scan against the simulated device
//!
//! Starts a 1 kS/s continuous scan, polls transfer status from the
//! foreground while the background loop fills the ring, then stops cleanly.

use daq_hal::hal::simulator::SimulatorConfig;
use daq_hal::{
    ChannelDescriptor, DaqConfig, DeviceFactory, InputMode, Range, ScanBuffer, ScanFlags,
    ScanOptions, ScanState, SuspendMonitor,
};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DaqConfig::default();
    let suspend = SuspendMonitor::start(&config.suspend);
    let (device, _transport) =
        DeviceFactory::simulated(SimulatorConfig::default(), &config, suspend.clone());
    device.connect()?;

    let channels = vec![
        ChannelDescriptor::analog(0, InputMode::SingleEnded, Range::Bip10Volts),
        ChannelDescriptor::analog(1, InputMode::SingleEnded, Range::Bip10Volts),
    ];
    let samples_per_channel = 1000;
    let buffer = Arc::new(ScanBuffer::new(channels.len() * samples_per_channel));

    let rate = device.start_scan(
        &channels,
        samples_per_channel,
        1000.0,
        ScanOptions::CONTINUOUS,
        ScanFlags::DEFAULT,
        buffer.clone(),
    )?;
    println!("scanning 2 channels at {rate} S/s per channel");

    for _ in 0..10 {
        std::thread::sleep(Duration::from_millis(200));
        let (state, transfer) = device.scan_status();
        if state != ScanState::Running {
            break;
        }
        let index = transfer.current_index;
        if index >= 0 {
            let mut group = [0.0f64; 2];
            buffer.read_region(index as usize, &mut group);
            println!(
                "scans: {:>6}  total: {:>6}  ch0: {:+.4} V  ch1: {:+.4} V",
                transfer.current_scan_count, transfer.current_total_count, group[0], group[1],
            );
        }
    }

    device.stop_scan()?;
    suspend.shutdown();
    println!("scan stopped");
    Ok(())
}
