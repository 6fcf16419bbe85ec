//! Common types used throughout the ladder engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for ladder participants
pub type ParticipantId = String;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Integer skill rating
pub type Rating = i32;

/// Initial rating assigned when a record is created on first use
pub const DEFAULT_RATING: Rating = 1500;

/// The two competitive disciplines of the ladder.
///
/// This is a closed enumeration: eligibility and rating records are always
/// keyed by one of exactly these two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Discipline {
    BroodWar,
    Sc2,
}

impl Discipline {
    /// Both disciplines, in canonical order
    pub const ALL: [Discipline; 2] = [Discipline::BroodWar, Discipline::Sc2];

    /// The opposing discipline
    pub fn other(self) -> Discipline {
        match self {
            Discipline::BroodWar => Discipline::Sc2,
            Discipline::Sc2 => Discipline::BroodWar,
        }
    }
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discipline::BroodWar => write!(f, "BroodWar"),
            Discipline::Sc2 => write!(f, "SC2"),
        }
    }
}

/// Which disciplines a participant has declared eligibility for.
///
/// At least one flag must be set for a queue join to be accepted; both set
/// makes the participant dual-eligible during equalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub brood_war: bool,
    pub sc2: bool,
}

impl CapabilitySet {
    pub fn only(discipline: Discipline) -> Self {
        match discipline {
            Discipline::BroodWar => Self {
                brood_war: true,
                sc2: false,
            },
            Discipline::Sc2 => Self {
                brood_war: false,
                sc2: true,
            },
        }
    }

    pub fn both() -> Self {
        Self {
            brood_war: true,
            sc2: true,
        }
    }

    pub fn has(&self, discipline: Discipline) -> bool {
        match discipline {
            Discipline::BroodWar => self.brood_war,
            Discipline::Sc2 => self.sc2,
        }
    }

    pub fn is_dual(&self) -> bool {
        self.brood_war && self.sc2
    }

    pub fn is_empty(&self) -> bool {
        !self.brood_war && !self.sc2
    }

    /// The single eligible discipline, if exactly one flag is set
    pub fn exclusive(&self) -> Option<Discipline> {
        match (self.brood_war, self.sc2) {
            (true, false) => Some(Discipline::BroodWar),
            (false, true) => Some(Discipline::Sc2),
            _ => None,
        }
    }
}

/// Participant identity and matchmaking preferences as submitted on queue join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub capabilities: CapabilitySet,
    /// Maps the participant refuses to play on
    pub excluded_maps: Vec<String>,
    /// Preferred server region, if known
    pub region: Option<String>,
}

/// A participant currently waiting in the queue.
///
/// Owned exclusively by the QueueRegistry while queued; rating fields are
/// read through the RatingStore, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedParticipant {
    pub participant: Participant,
    pub enqueued_at: DateTime<Utc>,
    /// Number of waves this participant has remained queued without a match
    pub wait_cycles: u32,
}

/// One participant's view within an immutable wave snapshot, with ratings
/// resolved at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub participant: Participant,
    pub rating_brood_war: Rating,
    pub rating_sc2: Rating,
    pub wait_cycles: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl SnapshotEntry {
    pub fn id(&self) -> &ParticipantId {
        &self.participant.id
    }

    pub fn rating_for(&self, discipline: Discipline) -> Rating {
        match discipline {
            Discipline::BroodWar => self.rating_brood_war,
            Discipline::Sc2 => self.rating_sc2,
        }
    }

    /// Max of the two ratings; ordering key for dual-eligible participants
    pub fn best_rating(&self) -> Rating {
        self.rating_brood_war.max(self.rating_sc2)
    }
}

/// Immutable copy of the queue taken atomically at wave start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub taken_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

impl QueueSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lifecycle status of a match record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Created, awaiting both participants' confirmation
    Pending,
    /// Confirmed and being played
    Active,
    /// Finished with a reported outcome
    Completed,
    /// Terminated without an outcome
    Aborted,
    /// Both sides reported irreconcilable results; awaiting resolution
    Conflicted,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Aborted)
    }
}

/// One side of a match: who plays, which discipline, and the rating they
/// carried when the match was created (immutable copy, distinct from the
/// live rating that later updates apply to).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSide {
    pub id: ParticipantId,
    pub discipline: Discipline,
    pub rating_at_start: Rating,
}

/// A committed pairing of two distinct participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub side_a: MatchSide,
    pub side_b: MatchSide,
    pub map: String,
    pub server: String,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn involves(&self, id: &ParticipantId) -> bool {
        &self.side_a.id == id || &self.side_b.id == id
    }
}

/// Terminal outcome reported for a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    SideAWin,
    SideBWin,
    Draw,
}

/// Reason a participant left the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueLeaveReason {
    Matched,
    UserRequest,
    AdminOverride,
}

/// Event emitted when a match is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreated {
    pub match_record: Match,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a match is aborted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchAborted {
    pub match_id: MatchId,
    pub participants: Vec<ParticipantId>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a participant is removed from the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRemoved {
    pub participant_id: ParticipantId,
    pub reason: QueueLeaveReason,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted after every wave, matched or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveCompleted {
    pub wave: u64,
    pub matches_created: usize,
    pub left_queued: usize,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound ladder events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LadderEvent {
    MatchCreated(MatchCreated),
    MatchAborted(MatchAborted),
    QueueRemoved(QueueRemoved),
    WaveCompleted(WaveCompleted),
}
