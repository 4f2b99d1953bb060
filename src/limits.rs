/// Longest accepted title / participant name.
pub const MAX_NAME_LEN: usize = 200;

/// Longest accepted description, note or message body.
pub const MAX_TEXT_LEN: usize = 4_000;

pub const MAX_EMAIL_LEN: usize = 254;

pub const MAX_PHONE_LEN: usize = 32;

/// Widest date range a single materialization may cover.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Days `expand_count` walks before giving up on an unreachable lesson count.
pub const MAX_EXPANSION_SCAN_DAYS: i64 = 365;

pub const MAX_RULES: usize = 1_000;

pub const MAX_SESSIONS_PER_TABLE: usize = 10_000;

pub const MAX_REGISTRATIONS_PER_UNIT: usize = 1_000;

pub const MAX_MESSAGES: usize = 100_000;

/// Largest encoded event the WAL writes or reads back.
pub const MAX_WAL_ENTRY_LEN: usize = 1 << 20;

/// Attempts the reconciler makes to re-read an instance after losing a creation race.
pub const MAX_RECONCILE_RETRIES: usize = 3;
