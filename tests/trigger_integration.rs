// tests/trigger_integration.rs
//! Trigger-gated scan behavior against the simulated transport

use daq_hal::hal::simulator::{Pacing, SimulatedTransport, SimulatorConfig};
use daq_hal::{
    ChannelDescriptor, DaqConfig, DaqDevice, DeviceFactory, InputMode, Range, ScanBuffer,
    ScanFlags, ScanOptions, ScanState, SuspendMonitor, TriggerType, Triggerable, WaitType,
};
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn device_with(pacing: Pacing) -> (DaqDevice, Arc<SimulatedTransport>, Arc<SuspendMonitor>) {
    let monitor = SuspendMonitor::start_with_time(
        &daq_hal::config::SuspendConfig::default(),
        Arc::new(daq_hal::utils::time::MockTimeProvider::new(0)),
    );
    let config = DaqConfig::default();
    let (device, transport) = DeviceFactory::simulated(
        SimulatorConfig {
            pacing,
            ..SimulatorConfig::default()
        },
        &config,
        monitor.clone(),
    );
    device.connect().expect("connect failed");
    (device, transport, monitor)
}

fn one_channel() -> Vec<ChannelDescriptor> {
    vec![ChannelDescriptor::analog(
        0,
        InputMode::SingleEnded,
        Range::Bip10Volts,
    )]
}

#[test]
fn test_scan_holds_at_minus_one_until_trigger_fires() {
    let (device, transport, monitor) = device_with(Pacing::Unlimited);

    device
        .set_trigger(TriggerType::PosEdge, 0, 2.5, 0.1, 0)
        .unwrap();

    let buffer = Arc::new(ScanBuffer::new(100));
    device
        .start_scan(
            &one_channel(),
            100,
            1000.0,
            ScanOptions::EXT_TRIGGER,
            ScanFlags::DEFAULT,
            buffer,
        )
        .unwrap();

    // No samples while the condition is unmet
    std::thread::sleep(Duration::from_millis(100));
    let (state, transfer) = device.scan_status();
    assert_eq!(state, ScanState::Running);
    assert_eq!(transfer.current_index, -1);
    assert_eq!(transfer.current_total_count, 0);

    // Satisfy the condition; sample writes begin and the scan completes
    transport.inject_trigger();
    device.scan_wait(WaitType::WaitUntilDone, 5.0).unwrap();
    let (state, transfer) = device.scan_status();
    assert_eq!(state, ScanState::Idle);
    assert_eq!(transfer.current_scan_count, 100);
    assert!(transfer.current_index >= 0);

    monitor.shutdown();
}

#[test]
fn test_stop_while_waiting_cancels_with_index_minus_one() {
    let (device, transport, monitor) = device_with(Pacing::Unlimited);

    device
        .set_trigger(TriggerType::NegEdge, 0, 0.0, 0.0, 0)
        .unwrap();

    let buffer = Arc::new(ScanBuffer::new(100));
    device
        .start_scan(
            &one_channel(),
            100,
            1000.0,
            ScanOptions::EXT_TRIGGER,
            ScanFlags::DEFAULT,
            buffer.clone(),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    device.stop_scan().unwrap();

    // Cancelled while waiting: terminal -1, nothing written
    let (state, transfer) = device.scan_status();
    assert_eq!(state, ScanState::Idle);
    assert_eq!(transfer.current_index, -1);
    assert_eq!(transfer.current_total_count, 0);

    // A late trigger event must not resurrect anything
    transport.inject_trigger();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(device.scan_status().0, ScanState::Idle);
    assert_eq!(buffer.checksum(), ScanBuffer::new(100).checksum());

    monitor.shutdown();
}

#[test]
fn test_pattern_trigger_matches_digital_snapshot() {
    let (device, transport, monitor) = device_with(Pacing::Unlimited);

    // Pattern 0x05 under mask 0x0F, encoded through level/variance
    device
        .set_trigger(TriggerType::PatternEq, 0, 5.0, 15.0, 0)
        .unwrap();
    transport.set_digital_port(0x03);

    let buffer = Arc::new(ScanBuffer::new(50));
    device
        .start_scan(
            &one_channel(),
            50,
            1000.0,
            ScanOptions::EXT_TRIGGER,
            ScanFlags::DEFAULT,
            buffer,
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(device.scan_status().1.current_index, -1);

    // Port now matches the pattern under the mask (high bits ignored)
    transport.set_digital_port(0xF5);
    // The simulated pacer starts on the injected trigger line
    transport.inject_trigger();

    device.scan_wait(WaitType::WaitUntilDone, 5.0).unwrap();
    assert_eq!(device.scan_status().1.current_scan_count, 50);

    monitor.shutdown();
}

#[test]
#[serial]
fn test_retrigger_rearms_after_sample_window() {
    let (device, transport, monitor) = device_with(Pacing::Realtime);

    // 50-scan windows within a 100-scan finite acquisition
    device
        .set_trigger(TriggerType::PosEdge, 0, 0.0, 0.0, 50)
        .unwrap();

    let buffer = Arc::new(ScanBuffer::new(100));
    device
        .start_scan(
            &one_channel(),
            100,
            1000.0,
            ScanOptions::EXT_TRIGGER | ScanOptions::RETRIGGER,
            ScanFlags::DEFAULT,
            buffer,
        )
        .unwrap();

    // Keep satisfying the condition as it re-arms until the scan finishes
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        transport.inject_trigger();
        if device.scan_wait(WaitType::WaitUntilDone, 0.05).is_ok() {
            break;
        }
        assert!(Instant::now() < deadline, "retriggered scan never finished");
    }

    let (state, transfer) = device.scan_status();
    assert_eq!(state, ScanState::Idle);
    assert_eq!(transfer.current_scan_count, 100);
    // The trigger was re-armed at least once mid-scan
    assert!(transport.trigger_armed());

    monitor.shutdown();
}

#[test]
fn test_trigger_armed_at_start_not_at_set() {
    let (device, transport, monitor) = device_with(Pacing::Unlimited);

    device
        .set_trigger(TriggerType::Rising, 2, 1.0, 0.05, 0)
        .unwrap();
    // Arming happens at start_scan, not here
    assert!(!transport.trigger_armed());

    let buffer = Arc::new(ScanBuffer::new(10));
    device
        .start_scan(
            &one_channel(),
            10,
            1000.0,
            ScanOptions::EXT_TRIGGER,
            ScanFlags::DEFAULT,
            buffer,
        )
        .unwrap();
    assert!(transport.trigger_armed());

    transport.inject_trigger();
    device.scan_wait(WaitType::WaitUntilDone, 5.0).unwrap();
    monitor.shutdown();
}

#[test]
fn test_untriggered_scan_ignores_trigger_config() {
    let (device, _transport, monitor) = device_with(Pacing::Unlimited);

    device
        .set_trigger(TriggerType::PosEdge, 0, 2.5, 0.1, 0)
        .unwrap();

    // Without EXT_TRIGGER the scan starts immediately
    let buffer = Arc::new(ScanBuffer::new(20));
    device
        .start_scan(
            &one_channel(),
            20,
            1000.0,
            ScanOptions::DEFAULT,
            ScanFlags::DEFAULT,
            buffer,
        )
        .unwrap();
    device.scan_wait(WaitType::WaitUntilDone, 5.0).unwrap();
    assert_eq!(device.scan_status().1.current_scan_count, 20);

    monitor.shutdown();
}
