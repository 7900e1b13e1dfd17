use std::sync::Mutex;

use crate::application::services::id_generator::IdGenerator;

/// Milliseconds between the Unix epoch and the id epoch (43 years of 365 days).
pub const FLAKE_EPOCH_MS: u64 = (2013 - 1970) * 31_536_000 * 1000;

const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 42) - 1;

type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

#[derive(Debug, Default)]
struct State {
    last_ms: u64,
    sequence: u16,
}

/// 64-bit time-ordered ids: 42 bits of milliseconds since [`FLAKE_EPOCH_MS`],
/// 10 bits of machine id, 12 bits of per-millisecond sequence.
pub struct FlakeIdGenerator {
    machine_id: u16,
    clock: Clock,
    state: Mutex<State>,
}

impl FlakeIdGenerator {
    pub fn new(machine_id: u16) -> Self {
        Self::with_clock(machine_id, Box::new(unix_millis))
    }

    fn with_clock(machine_id: u16, clock: Clock) -> Self {
        Self {
            machine_id: machine_id & MAX_MACHINE_ID,
            clock,
            state: Mutex::new(State::default()),
        }
    }

    pub fn next(&self) -> u64 {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        // A clock that steps backwards is held at the last issued millisecond.
        let mut now = (self.clock)().max(state.last_ms);
        if now == state.last_ms {
            if state.sequence == MAX_SEQUENCE {
                while now <= state.last_ms {
                    std::hint::spin_loop();
                    now = (self.clock)();
                }
                state.sequence = 0;
            } else {
                state.sequence += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        let elapsed = now.saturating_sub(FLAKE_EPOCH_MS) & TIMESTAMP_MASK;
        (elapsed << (MACHINE_BITS + SEQUENCE_BITS))
            | (u64::from(self.machine_id) << SEQUENCE_BITS)
            | u64::from(state.sequence)
    }
}

impl IdGenerator for FlakeIdGenerator {
    fn next_id(&self) -> String {
        self.next().to_string()
    }
}

fn unix_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
