pub mod match_engine;
pub mod service;

pub use match_engine::{ConfigError, MatchConfig, MatchEngine};
pub use service::{
    ChannelNotifier, CreateOutcome, InMemoryMatchStore, LogNotifier, MatchFoundEvent, MatchNotifier, MatchStore,
    MatchingService, PartyRole, RecordingNotifier, StoreError,
};
