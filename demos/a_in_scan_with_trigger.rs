// demos/a_in_scan_with_trigger.rs
//! Trigger-gated finite scan against the simulated device
//!
//! Arms a rising-edge trigger, starts the scan, and shows the status
//! holding at index -1 until the trigger fires (injected here by a helper
//! thread standing in for the external signal).

use daq_hal::hal::simulator::SimulatorConfig;
use daq_hal::{
    ChannelDescriptor, DaqConfig, DeviceFactory, InputMode, Range, ScanBuffer, ScanFlags,
    ScanOptions, SuspendMonitor, TriggerType, Triggerable, WaitType,
};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DaqConfig::default();
    let suspend = SuspendMonitor::start(&config.suspend);
    let (device, transport) =
        DeviceFactory::simulated(SimulatorConfig::default(), &config, suspend.clone());
    device.connect()?;

    device.set_trigger(TriggerType::PosEdge, 0, 2.5, 0.1, 0)?;

    let channels = vec![ChannelDescriptor::analog(
        0,
        InputMode::SingleEnded,
        Range::Bip10Volts,
    )];
    let samples_per_channel = 500;
    let buffer = Arc::new(ScanBuffer::new(samples_per_channel));

    let rate = device.start_scan(
        &channels,
        samples_per_channel,
        1000.0,
        ScanOptions::EXT_TRIGGER,
        ScanFlags::DEFAULT,
        buffer.clone(),
    )?;
    println!("armed; waiting for trigger at {rate} S/s");

    let (_, transfer) = device.scan_status();
    println!("before trigger: index = {}", transfer.current_index);

    // External trigger source arrives half a second in
    let trigger_source = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        transport.inject_trigger();
        println!("trigger fired");
    });

    device.scan_wait(WaitType::WaitUntilDone, 10.0)?;
    trigger_source.join().expect("trigger thread panicked");

    let (_, transfer) = device.scan_status();
    println!(
        "acquired {} scans, last group at index {}",
        transfer.current_scan_count, transfer.current_index
    );
    println!("first sample: {:+.4} V", buffer.get(0));

    device.stop_scan()?;
    suspend.shutdown();
    Ok(())
}
