pub mod scheduler;

pub use scheduler::{
    CollectingSink, ConflictSink, MutationScheduler, SchedulerConfig, SchedulerStats, SearchOutcome,
    TurnOutcome,
};
