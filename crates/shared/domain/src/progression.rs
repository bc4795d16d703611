//! Per-entity pipeline progressions.
//!
//! A progression records one entity's visit to one stage. The chain of
//! progressions is the source of truth for where an entity stands.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{NOTE_SEPARATOR, NOTE_TIMESTAMP_FORMAT};
use crate::kind::{EntityKind, StagePosition};
use crate::pipeline::{is_first_stage, is_last_stage, PipelineStage, PipelineType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub stage_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Progression {
    /// Mark the stage done. Passed notes replace the existing ones.
    pub fn complete(&mut self, notes: Option<String>, now: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(now);
        if notes.is_some() {
            self.notes = notes;
        }
        self.updated_at = now;
    }

    /// Reopen the stage.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.completed = false;
        self.completed_at = None;
        self.updated_at = now;
    }

    /// Append a timestamped line; prior notes are never overwritten.
    pub fn add_note(&mut self, text: &str, now: DateTime<Utc>) {
        let line = format_note(text, now);
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => {
                format!("{}{}{}", existing, NOTE_SEPARATOR, line)
            }
            _ => line,
        });
        self.updated_at = now;
    }

    /// Whole days spent on the stage, up to `now` while still open.
    pub fn duration_days(&self, now: DateTime<Utc>) -> i64 {
        let end = self.completed_at.unwrap_or(now);
        (end - self.created_at).num_days()
    }
}

/// `[dd/mm/yyyy HH:mm] text`
pub fn format_note(text: &str, at: DateTime<Utc>) -> String {
    format!("[{}] {}", at.format(NOTE_TIMESTAMP_FORMAT), text)
}

/// A progression together with the stage it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedProgression {
    pub progression: Progression,
    pub stage: PipelineStage,
}

/// The progression defining an entity's current stage.
///
/// The oldest open progression wins; when every progression is completed,
/// the most recently completed one does. Ties fall back to stage order.
pub fn current_progression(items: &[StagedProgression]) -> Option<&StagedProgression> {
    let oldest_open = items
        .iter()
        .filter(|item| !item.progression.completed)
        .min_by(|a, b| {
            a.progression
                .created_at
                .cmp(&b.progression.created_at)
                .then(a.stage.order.cmp(&b.stage.order))
        });

    oldest_open.or_else(|| {
        items
            .iter()
            .filter(|item| item.progression.completed)
            .max_by(|a, b| {
                a.progression
                    .completed_at
                    .cmp(&b.progression.completed_at)
                    .then(a.stage.order.cmp(&b.stage.order))
            })
    })
}

/// Position of `current` inside `stages` (all stages of its pipeline type).
pub fn stage_position(
    current: Option<&StagedProgression>,
    stages: &[PipelineStage],
) -> StagePosition {
    let Some(current) = current else {
        return StagePosition::Unplaced;
    };

    let stage = &current.stage;
    if current.progression.completed && stage.is_final && is_last_stage(stages, stage) {
        StagePosition::Finished
    } else if !current.progression.completed && is_first_stage(stages, stage) {
        StagePosition::Opening
    } else {
        StagePosition::Underway
    }
}

/// Completed active stages of the type over all active stages, as a whole percentage.
pub fn progression_percentage(items: &[StagedProgression], stages: &[PipelineStage]) -> u8 {
    let active: HashSet<Uuid> = stages.iter().filter(|s| s.is_active).map(|s| s.id).collect();
    if active.is_empty() {
        return 0;
    }

    let completed = items
        .iter()
        .filter(|item| item.progression.completed && active.contains(&item.stage.id))
        .map(|item| item.stage.id)
        .collect::<HashSet<_>>()
        .len();

    let percentage = (completed as f64 * 100.0 / active.len() as f64).round();
    percentage.min(100.0) as u8
}

/// Snapshot of an entity's place in its pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub pipeline_type: Option<PipelineType>,
    pub current_stage: Option<PipelineStage>,
    pub current_progression: Option<Progression>,
    pub all_stages: Vec<PipelineStage>,
    pub progression_percentage: u8,
    pub can_convert: bool,
}

/// Result of one "advance to next stage" request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// The entity had no progression and was placed on the first stage
    Initialized { opened: Progression },
    /// The current stage was completed and the next one opened
    Advanced {
        completed: Progression,
        opened: Progression,
    },
    /// No next stage: the entity stays on its last stage, completed
    Finished { completed: Progression },
}

impl AdvanceOutcome {
    /// Newly opened progression, if the call opened one.
    pub fn opened(&self) -> Option<&Progression> {
        match self {
            AdvanceOutcome::Initialized { opened } | AdvanceOutcome::Advanced { opened, .. } => {
                Some(opened)
            }
            AdvanceOutcome::Finished { .. } => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, AdvanceOutcome::Finished { .. })
    }
}

/// Per-stage counters used for dwell-time analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatistics {
    pub stage_id: Uuid,
    pub stage_name: String,
    pub order: i32,
    pub open_count: u64,
    pub completed_count: u64,
    /// Mean days spent on the stage by completed progressions
    pub average_dwell_days: Option<f64>,
}

impl StageStatistics {
    pub fn collect(stage: &PipelineStage, progressions: &[Progression], now: DateTime<Utc>) -> Self {
        let on_stage: Vec<&Progression> = progressions
            .iter()
            .filter(|p| p.stage_id == stage.id)
            .collect();

        let durations: Vec<i64> = on_stage
            .iter()
            .filter(|p| p.completed)
            .map(|p| p.duration_days(now))
            .collect();

        let average_dwell_days = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
        };

        Self {
            stage_id: stage.id,
            stage_name: stage.name.clone(),
            order: stage.order,
            open_count: on_stage.iter().filter(|p| !p.completed).count() as u64,
            completed_count: durations.len() as u64,
            average_dwell_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::stage;
    use chrono::{Duration, TimeZone};

    fn progression(stage: &PipelineStage, created_at: DateTime<Utc>) -> Progression {
        Progression {
            id: Uuid::new_v4(),
            entity_kind: EntityKind::Invite,
            entity_id: Uuid::nil(),
            stage_id: stage.id,
            completed: false,
            completed_at: None,
            notes: None,
            assigned_to: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn staged(stage: &PipelineStage, created_at: DateTime<Utc>) -> StagedProgression {
        StagedProgression {
            progression: progression(stage, created_at),
            stage: stage.clone(),
        }
    }

    #[test]
    fn add_note_appends_with_blank_line() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        let s = stage(Uuid::new_v4(), "Contact", 10);
        let mut p = progression(&s, at);

        p.add_note("Called twice", at);
        p.add_note("Left a voicemail", at + Duration::minutes(5));

        assert_eq!(
            p.notes.as_deref(),
            Some("[05/03/2024 14:07] Called twice\n\n[05/03/2024 14:12] Left a voicemail")
        );
    }

    #[test]
    fn complete_keeps_notes_unless_replaced() {
        let now = Utc::now();
        let s = stage(Uuid::new_v4(), "Contact", 10);
        let mut p = progression(&s, now);
        p.notes = Some("first".to_string());

        p.complete(None, now);
        assert!(p.completed);
        assert_eq!(p.notes.as_deref(), Some("first"));

        p.complete(Some("second".to_string()), now);
        assert_eq!(p.notes.as_deref(), Some("second"));

        p.reset(now);
        assert!(!p.completed);
        assert!(p.completed_at.is_none());
    }

    #[test]
    fn current_progression_prefers_oldest_open() {
        let type_id = Uuid::new_v4();
        let t0 = Utc::now();
        let a = stage(type_id, "A", 10);
        let b = stage(type_id, "B", 20);
        let c = stage(type_id, "C", 30);

        let mut done = staged(&a, t0);
        done.progression.complete(None, t0 + Duration::hours(1));
        let items = vec![done, staged(&c, t0 + Duration::hours(3)), staged(&b, t0 + Duration::hours(2))];

        assert_eq!(current_progression(&items).map(|i| i.stage.order), Some(20));
    }

    #[test]
    fn current_progression_falls_back_to_latest_completed() {
        let type_id = Uuid::new_v4();
        let t0 = Utc::now();
        let a = stage(type_id, "A", 10);
        let b = stage(type_id, "B", 20);

        let mut first = staged(&a, t0);
        first.progression.complete(None, t0 + Duration::hours(1));
        let mut second = staged(&b, t0 + Duration::hours(1));
        second.progression.complete(None, t0 + Duration::hours(2));

        let items = vec![second, first];
        assert_eq!(current_progression(&items).map(|i| i.stage.order), Some(20));
        assert!(current_progression(&[]).is_none());
    }

    #[test]
    fn percentage_counts_completed_active_stages() {
        let type_id = Uuid::new_v4();
        let now = Utc::now();
        let stages = vec![
            stage(type_id, "A", 10),
            stage(type_id, "B", 20),
            stage(type_id, "C", 30),
        ];

        let mut items: Vec<StagedProgression> = stages.iter().map(|s| staged(s, now)).collect();
        assert_eq!(progression_percentage(&items, &stages), 0);

        items[0].progression.complete(None, now);
        assert_eq!(progression_percentage(&items, &stages), 33);

        for item in &mut items {
            item.progression.complete(None, now);
        }
        assert_eq!(progression_percentage(&items, &stages), 100);
        assert_eq!(progression_percentage(&items, &[]), 0);
    }

    #[test]
    fn position_reflects_first_and_finished_stages() {
        let type_id = Uuid::new_v4();
        let now = Utc::now();
        let mut stages = vec![stage(type_id, "A", 10), stage(type_id, "B", 20)];
        stages[1].is_final = true;

        let opening = staged(&stages[0], now);
        assert_eq!(stage_position(Some(&opening), &stages), StagePosition::Opening);

        let mut finished = staged(&stages[1], now);
        finished.progression.complete(None, now);
        assert_eq!(stage_position(Some(&finished), &stages), StagePosition::Finished);

        let underway = staged(&stages[1], now);
        assert_eq!(stage_position(Some(&underway), &stages), StagePosition::Underway);
        assert_eq!(stage_position(None, &stages), StagePosition::Unplaced);
    }

    #[test]
    fn statistics_average_completed_durations() {
        let now = Utc::now();
        let s = stage(Uuid::new_v4(), "A", 10);
        let mut slow = progression(&s, now - Duration::days(4));
        slow.complete(None, now);
        let mut fast = progression(&s, now - Duration::days(2));
        fast.complete(None, now);
        let open = progression(&s, now);

        let stats = StageStatistics::collect(&s, &[slow, fast, open], now);
        assert_eq!(stats.open_count, 1);
        assert_eq!(stats.completed_count, 2);
        assert_eq!(stats.average_dwell_days, Some(3.0));
    }
}
