use thiserror::Error;

/// Why a playback request produced no URL. Callers render these differently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("game {0} not found")]
    GameNotFound(String),

    #[error("no stream available for game {0}")]
    NoStream(String),
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("lead time must be at least one minute")]
    InvalidLead,

    #[error("game {0} not found")]
    GameNotFound(String),

    #[error(
        "alert would fire in the past: game starts in {minutes_remaining} minute(s), \
         lead time is {lead_minutes} minute(s)"
    )]
    InvalidSchedule { minutes_remaining: i64, lead_minutes: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
