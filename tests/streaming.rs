//! End-to-end streaming through the simulated driver thread

use parking_lot::{const_mutex, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use asio_buffers::{
    Channel, Controller, Sample, SimulatedDriver, SimulatedDriverConfig, State, SwitchPolicy,
};

/// The switch registry is process-wide
static SERIAL: Mutex<()> = const_mutex(());

const FRAMES: usize = 32;

fn is_ramp(samples: &[Sample]) -> bool {
    samples.windows(2).all(|w| w[1] == w[0].wrapping_add(1))
}

#[test]
fn test_loopback_stream_is_lossless() {
    let _guard = SERIAL.lock();
    let mut controller = Controller::new(SimulatedDriver::new(SimulatedDriverConfig::default()));
    controller
        .configure(&[Channel::input(0), Channel::output(0)], FRAMES, SwitchPolicy::loopback())
        .unwrap();

    let queue = controller.input_queue(0).unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let consumer = {
        let running = running.clone();
        let queue = queue.clone();
        thread::spawn(move || {
            let mut received = Vec::new();
            let mut scratch = [0; FRAMES / 2 + 3];
            while running.load(Ordering::Relaxed) {
                // Alternate between both drain styles
                let copied = queue.fetch_into(&mut scratch);
                received.extend_from_slice(&scratch[..copied]);
                received.extend(queue.fetch_all());
                thread::sleep(Duration::from_micros(300));
            }
            received
        })
    };

    controller.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    controller.stop().unwrap();
    assert_eq!(controller.state(), State::Stopped);

    running.store(false, Ordering::Relaxed);
    let mut received = consumer.join().unwrap();
    received.extend(queue.fetch_all());

    let counts = controller.switch_counts();
    assert!(counts.switches >= 2);
    assert_eq!(counts.faults, 0);
    assert_eq!(received.len() as u64, counts.switches * FRAMES as u64);
    assert_eq!(received.first(), Some(&0));
    assert!(is_ramp(&received));

    for half in 0..2 {
        let output = controller.driver().read_output(0, half).unwrap();
        assert!(is_ramp(&output));
        assert!(received.contains(&output[0]));
    }

    controller.dispose().unwrap();
    assert_eq!(controller.state(), State::Idle);
}

#[test]
fn test_capture_skips_unbufferable_input() {
    let _guard = SERIAL.lock();
    let mut controller = Controller::new(SimulatedDriver::new(SimulatedDriverConfig {
        unbufferable: vec![Channel::input(0)],
        ..Default::default()
    }));
    controller
        .configure(&[Channel::input(0), Channel::input(1)], FRAMES, SwitchPolicy::capture_only())
        .unwrap();

    let session = controller.session().unwrap();
    assert!(!session.inputs()[0].is_enabled());
    assert_eq!(session.find_first_enabled_input().unwrap().number(), 1);
    assert!(session.find_first_enabled_output().is_err());

    controller.start().unwrap();
    thread::sleep(Duration::from_millis(30));
    controller.stop().unwrap();

    assert!(controller.fetch_input(0).unwrap().is_empty());
    let captured = controller.fetch_input(1).unwrap();
    assert!(!captured.is_empty());
    assert_eq!(captured.len() % FRAMES, 0);
    assert!(is_ramp(&captured));
}
