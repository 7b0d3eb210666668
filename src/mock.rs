//! Mock implementations for testing
//!
//! Provides a mock GPU device and manager, a scripted register source, and
//! recording actuator/watchdog doubles for testing without real hardware.

use crate::domain::{
    ClockSpeed, ClockType, FanPolicy, FanSpeed, GpuInfo, MemoryInfo, PciLocation, Power,
    Temperature, Utilization,
};
use crate::error::{ActuatorError, MemoryError, NvmlError};
use crate::memtemp::RegisterSource;
use crate::nvml::{GpuDevice, GpuManager};
use crate::services::{FanActuator, Watchdog};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct MockState {
    temperature: Mutex<Temperature>,
    scripted: Mutex<VecDeque<Temperature>>,
    fan_speeds: Mutex<HashMap<u32, FanSpeed>>,
    fan_policies: Mutex<HashMap<u32, FanPolicy>>,
    fan_writes: Mutex<Vec<(u32, FanSpeed)>>,
    read_delay: Mutex<Duration>,
    fail_temperature: AtomicBool,
    fail_fan_writes: AtomicBool,
}

/// Mock GPU device for testing
///
/// Clones share state, so a test can keep a handle after moving the device
/// into an aggregator or actuator.
#[derive(Debug, Clone)]
pub struct MockDevice {
    index: u32,
    name: String,
    uuid: String,
    fan_count: u32,
    min_fan_speed: FanSpeed,
    pci: Option<PciLocation>,
    state: Arc<MockState>,
}

impl MockDevice {
    /// Create a new mock device with default values
    pub fn new(index: u32) -> Self {
        let default_speed = FanSpeed::new(30).unwrap();
        let mut fan_speeds = HashMap::new();
        let mut fan_policies = HashMap::new();
        for fan in 0..2 {
            fan_speeds.insert(fan, default_speed);
            fan_policies.insert(fan, FanPolicy::Auto);
        }

        Self {
            index,
            name: format!("Mock GPU {}", index),
            uuid: format!("GPU-MOCK-{:04}", index),
            fan_count: 2,
            min_fan_speed: FanSpeed::OFF,
            pci: Some(PciLocation::from_nvml(
                format!("00000000:{:02X}:00.0", index + 1),
                0x2684_10de,
            )),
            state: Arc::new(MockState {
                temperature: Mutex::new(Temperature::new(45.0)),
                scripted: Mutex::new(VecDeque::new()),
                fan_speeds: Mutex::new(fan_speeds),
                fan_policies: Mutex::new(fan_policies),
                fan_writes: Mutex::new(Vec::new()),
                read_delay: Mutex::new(Duration::ZERO),
                fail_temperature: AtomicBool::new(false),
                fail_fan_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Set the mock temperature
    pub fn set_temperature(&self, temp: Temperature) {
        *self.state.temperature.lock().unwrap() = temp;
    }

    /// Queue temperatures returned by successive reads; the last one sticks
    pub fn script_temperatures(&self, temps: impl IntoIterator<Item = f32>) {
        let mut scripted = self.state.scripted.lock().unwrap();
        scripted.extend(temps.into_iter().map(Temperature::new));
    }

    /// Make every temperature read block for `delay`
    pub fn set_read_delay(&self, delay: Duration) {
        *self.state.read_delay.lock().unwrap() = delay;
    }

    /// Make temperature reads fail with `GpuLost`
    pub fn fail_temperature(&self, fail: bool) {
        self.state.fail_temperature.store(fail, Ordering::SeqCst);
    }

    /// Make fan speed writes fail with `NotSupported`
    pub fn fail_fan_writes(&self, fail: bool) {
        self.state.fail_fan_writes.store(fail, Ordering::SeqCst);
    }

    /// Every successful fan speed write, in order
    pub fn fan_writes(&self) -> Vec<(u32, FanSpeed)> {
        self.state.fan_writes.lock().unwrap().clone()
    }

    /// Current policy of a fan
    pub fn fan_policy(&self, fan_idx: u32) -> Option<FanPolicy> {
        self.state.fan_policies.lock().unwrap().get(&fan_idx).copied()
    }

    /// Builder: set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set fan count
    pub fn with_fan_count(mut self, count: u32) -> Self {
        self.fan_count = count;
        self
    }

    /// Builder: reject fan speeds below `percent`, like boards with a
    /// firmware minimum
    pub fn with_min_fan_speed(mut self, percent: u8) -> Self {
        self.min_fan_speed = FanSpeed::saturating(percent as u32);
        self
    }

    /// Builder: set or clear the PCI location
    pub fn with_pci(mut self, pci: Option<PciLocation>) -> Self {
        self.pci = pci;
        self
    }

    fn check_fan(&self, fan_idx: u32) -> Result<(), NvmlError> {
        if fan_idx >= self.fan_count {
            return Err(NvmlError::InvalidArgument(format!(
                "Fan index {} out of range",
                fan_idx
            )));
        }
        Ok(())
    }
}

impl GpuDevice for MockDevice {
    fn info(&self) -> Result<GpuInfo, NvmlError> {
        let mut info = GpuInfo::new(self.index, self.name.clone(), self.uuid.clone())
            .with_fan_count(self.fan_count);
        if let Some(pci) = &self.pci {
            info = info.with_pci(pci.clone());
        }
        Ok(info)
    }

    fn name(&self) -> Result<String, NvmlError> {
        Ok(self.name.clone())
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn pci_location(&self) -> Result<PciLocation, NvmlError> {
        self.pci
            .clone()
            .ok_or_else(|| NvmlError::NotSupported("PCI info".to_string()))
    }

    fn temperature(&self) -> Result<Temperature, NvmlError> {
        let delay = *self.state.read_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.state.fail_temperature.load(Ordering::SeqCst) {
            return Err(NvmlError::GpuLost);
        }
        let mut current = self.state.temperature.lock().unwrap();
        if let Some(next) = self.state.scripted.lock().unwrap().pop_front() {
            *current = next;
        }
        Ok(*current)
    }

    fn fan_count(&self) -> Result<u32, NvmlError> {
        Ok(self.fan_count)
    }

    fn fan_speed(&self, fan_idx: u32) -> Result<FanSpeed, NvmlError> {
        self.check_fan(fan_idx)?;
        Ok(self
            .state
            .fan_speeds
            .lock()
            .unwrap()
            .get(&fan_idx)
            .copied()
            .unwrap_or(FanSpeed::OFF))
    }

    fn min_fan_speed(&self) -> Result<FanSpeed, NvmlError> {
        Ok(self.min_fan_speed)
    }

    fn set_fan_speed(&mut self, fan_idx: u32, speed: FanSpeed) -> Result<(), NvmlError> {
        self.check_fan(fan_idx)?;
        if speed < self.min_fan_speed {
            return Err(NvmlError::InvalidArgument(format!(
                "Fan speed {} below minimum {}",
                speed, self.min_fan_speed
            )));
        }
        if self.state.fail_fan_writes.load(Ordering::SeqCst) {
            return Err(NvmlError::NotSupported("fan speed".to_string()));
        }
        self.state.fan_speeds.lock().unwrap().insert(fan_idx, speed);
        self.state.fan_writes.lock().unwrap().push((fan_idx, speed));
        Ok(())
    }

    fn set_fan_policy(&mut self, fan_idx: u32, policy: FanPolicy) -> Result<(), NvmlError> {
        self.check_fan(fan_idx)?;
        self.state
            .fan_policies
            .lock()
            .unwrap()
            .insert(fan_idx, policy);
        Ok(())
    }

    fn power_usage(&self) -> Result<Power, NvmlError> {
        Ok(Power::from_watts(150))
    }

    fn power_limit(&self) -> Result<Power, NvmlError> {
        Ok(Power::from_watts(300))
    }

    fn clock_speed(&self, clock_type: ClockType) -> Result<ClockSpeed, NvmlError> {
        Ok(match clock_type {
            ClockType::Graphics => ClockSpeed::new(1800),
            ClockType::Memory => ClockSpeed::new(10501),
        })
    }

    fn applications_clock(&self, clock_type: ClockType) -> Result<ClockSpeed, NvmlError> {
        Ok(match clock_type {
            ClockType::Graphics => ClockSpeed::new(1905),
            ClockType::Memory => ClockSpeed::new(10501),
        })
    }

    fn utilization(&self) -> Result<Utilization, NvmlError> {
        Ok(Utilization::new(40, 20))
    }

    fn memory_info(&self) -> Result<MemoryInfo, NvmlError> {
        let total = 24 * 1024 * 1024 * 1024u64;
        let used = 6 * 1024 * 1024 * 1024u64;
        Ok(MemoryInfo::new(total, used, total - used))
    }
}

/// Mock GPU manager for testing
#[derive(Debug, Default)]
pub struct MockManager {
    devices: Vec<MockDevice>,
}

impl MockManager {
    /// Create a manager with `device_count` default devices
    pub fn new(device_count: u32) -> Self {
        Self {
            devices: (0..device_count).map(MockDevice::new).collect(),
        }
    }

    /// Create a manager over the given devices
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self { devices }
    }
}

impl GpuManager for MockManager {
    type Device = MockDevice;

    fn device_count(&self) -> Result<u32, NvmlError> {
        Ok(self.devices.len() as u32)
    }

    fn device_by_index(&self, index: u32) -> Result<Self::Device, NvmlError> {
        self.devices
            .get(index as usize)
            .cloned()
            .ok_or(NvmlError::DeviceNotFound(index))
    }
}

/// Register source returning queued raw values, then a fallback
#[derive(Debug, Clone)]
pub struct ScriptedRegisters {
    values: Arc<Mutex<VecDeque<Result<u32, MemoryError>>>>,
    fallback: Result<u32, MemoryError>,
    closed: Arc<AtomicBool>,
}

impl ScriptedRegisters {
    /// Source that always returns `raw`
    pub fn fixed(raw: u32) -> Self {
        Self {
            values: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Ok(raw),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Source that always fails with `error`
    pub fn failing(error: MemoryError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::fixed(0)
        }
    }

    /// Queue results for the next reads
    pub fn push(&self, value: Result<u32, MemoryError>) {
        self.values.lock().unwrap().push_back(value);
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RegisterSource for ScriptedRegisters {
    fn read_u32(&self, _offset: usize) -> Result<u32, MemoryError> {
        if self.is_closed() {
            return Err(MemoryError::Closed);
        }
        match self.values.lock().unwrap().pop_front() {
            Some(value) => value,
            None => self.fallback.clone(),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Actuator that records every command
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    duties: Arc<Mutex<Vec<FanSpeed>>>,
    releases: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
}

impl RecordingActuator {
    /// Create an actuator that accepts every command
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` commands
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Commands accepted so far
    pub fn duties(&self) -> Vec<FanSpeed> {
        self.duties.lock().unwrap().clone()
    }

    /// How many times fans were released to automatic control
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl FanActuator for RecordingActuator {
    fn set_fan_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ActuatorError::CommandFailed {
                program: "recording".to_string(),
                status: "injected failure".to_string(),
            });
        }
        self.duties.lock().unwrap().push(duty);
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Watchdog that counts notifications
#[derive(Debug, Clone, Default)]
pub struct RecordingWatchdog {
    ready: Arc<AtomicUsize>,
    alive: Arc<AtomicUsize>,
    stopping: Arc<AtomicUsize>,
}

impl RecordingWatchdog {
    /// Create a watchdog with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of READY notifications
    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    /// Number of keep-alive notifications
    pub fn alive_count(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }

    /// Number of STOPPING notifications
    pub fn stopping_count(&self) -> usize {
        self.stopping.load(Ordering::SeqCst)
    }
}

impl Watchdog for RecordingWatchdog {
    fn ready(&mut self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_alive(&mut self) {
        self.alive.fetch_add(1, Ordering::SeqCst);
    }

    fn stopping(&mut self) {
        self.stopping.fetch_add(1, Ordering::SeqCst);
    }
}
