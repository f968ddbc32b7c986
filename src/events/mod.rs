mod ring;
mod state_machine;

pub use ring::RingHistory;
pub use state_machine::EventDebouncer;
