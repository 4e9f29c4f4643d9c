use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Object revision. `0` means "never changed".
pub type Rv = i64;

/// Number of partition slots encoded in the low digits of a partitioned
/// revision.
pub const PARTITION_SLOTS: i64 = 1024;

/// Monotonic revision generator.
///
/// A global generator yields strictly increasing values seeded from the wall
/// clock (microseconds since the UNIX epoch), so revisions keep increasing
/// across restarts. A partitioned generator yields
/// `counter * PARTITION_SLOTS + partition`: strictly increasing within the
/// partition and never equal to a value produced by another partition.
///
/// Safe for concurrent use via an internal [`Mutex`].
#[derive(Debug)]
pub struct RvGenerator {
    partition: Option<u16>,
    last: Mutex<i64>,
}

impl RvGenerator {
    /// A generator shared by every object of a process.
    pub fn global() -> Self {
        Self {
            partition: None,
            last: Mutex::new(0),
        }
    }

    /// A generator owned by one partition. `partition` is reduced modulo
    /// [`PARTITION_SLOTS`].
    pub fn partitioned(partition: u16) -> Self {
        Self {
            partition: Some(partition % PARTITION_SLOTS as u16),
            last: Mutex::new(0),
        }
    }

    pub fn partition(&self) -> Option<u16> {
        self.partition
    }

    /// Next revision: partition-local when configured, otherwise global.
    pub fn next(&self) -> Rv {
        match self.partition {
            Some(partition) => {
                let counter = self.advance(Self::wall_clock_us() / PARTITION_SLOTS);
                counter * PARTITION_SLOTS + partition as i64
            }
            None => self.advance(Self::wall_clock_us()),
        }
    }

    /// `last = max(floor, last + 1)`, returning the new value.
    fn advance(&self, floor: i64) -> i64 {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = floor.max(*last + 1);
        *last = next;
        next
    }

    fn wall_clock_us() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as i64
    }
}

impl Default for RvGenerator {
    fn default() -> Self {
        Self::global()
    }
}
