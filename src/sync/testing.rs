//! Recording stand-ins for the serial driver and the bus session

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::status::{PublishError, StatusSink};
use super::sync_handle::SyncHandle;
use super::synchronizer::Synchronizer;
use crate::hardware::{HardwareError, OutputDriver};
use crate::outputs::{OutputRegistry, Pin, PinState, SerialCommand};

/// Shared view of what a [`MockDriver`] has seen
#[derive(Clone, Default)]
pub struct DriverProbe {
    writes: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl DriverProbe {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockDriver {
    open: bool,
    fail_writes: bool,
    probe: DriverProbe,
}

impl MockDriver {
    fn build(open: bool, fail_writes: bool) -> (Self, DriverProbe) {
        let probe = DriverProbe::default();
        let driver = Self {
            open,
            fail_writes,
            probe: probe.clone(),
        };
        (driver, probe)
    }

    pub fn open() -> (Self, DriverProbe) {
        Self::build(true, false)
    }

    pub fn closed() -> (Self, DriverProbe) {
        Self::build(false, false)
    }

    pub fn failing() -> (Self, DriverProbe) {
        Self::build(true, true)
    }
}

#[async_trait]
impl OutputDriver for MockDriver {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn write_command(&mut self, command: SerialCommand) -> Result<(), HardwareError> {
        if !self.open {
            return Err(HardwareError::Unavailable("mock".to_string()));
        }
        if self.fail_writes {
            return Err(HardwareError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        self.probe.writes.lock().unwrap().push(command.to_line());
        Ok(())
    }

    async fn close(&mut self) {
        self.open = false;
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(Pin, PinState)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn published(&self) -> Vec<(Pin, PinState)> {
        self.published.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn publish_status(&self, pin: Pin, state: PinState) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Rejected("mock session offline".to_string()));
        }
        self.published.lock().unwrap().push((pin, state));
        Ok(())
    }
}

/// Spawns a synchronizer over the default four outputs
pub fn spawn_handle(
    driver: MockDriver,
    default_sink: Option<Arc<RecordingSink>>,
) -> (SyncHandle, CancellationToken, JoinHandle<()>) {
    let synchronizer = Synchronizer::create(
        OutputRegistry::new([Pin(13), Pin(12), Pin(8), Pin(9)]),
        Box::new(driver),
        default_sink.map(|sink| sink as Arc<dyn StatusSink>),
        Duration::ZERO,
    );
    let shutdown = CancellationToken::new();
    let (handle, task) = SyncHandle::spawn(synchronizer, shutdown.clone());
    (handle, shutdown, task)
}
