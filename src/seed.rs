//! Startup provisioning from a JSON file: accounts (with their bearer
//! tokens) and courts with price tiers. Courts already in the journal are
//! left alone, so the same file can be passed on every start.

use std::path::Path;

use chrono::NaiveTime;
use serde::Deserialize;
use ulid::Ulid;

use crate::auth::TokenDirectory;
use crate::engine::{BookingError, Engine, NewCourt};
use crate::limits::DEFAULT_SLOT_DURATION_MINUTES;
use crate::model::{Amount, CourtStatus, PriceSlot, Role};

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub courts: Vec<SeedCourt>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub id: Ulid,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedCourt {
    pub id: Ulid,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "active")]
    pub status: CourtStatus,
    #[serde(default = "default_slot_duration")]
    pub slot_duration: u32,
    pub owner_id: Ulid,
    #[serde(default)]
    pub price_slots: Vec<SeedPriceSlot>,
}

#[derive(Debug, Deserialize)]
pub struct SeedPriceSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: Amount,
}

fn active() -> CourtStatus {
    CourtStatus::Active
}

fn default_slot_duration() -> u32 {
    DEFAULT_SLOT_DURATION_MINUTES
}

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Court(Ulid, BookingError),
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Io(e) => write!(f, "cannot read seed file: {e}"),
            SeedError::Parse(e) => write!(f, "invalid seed file: {e}"),
            SeedError::Court(id, e) => write!(f, "cannot provision court {id}: {e}"),
        }
    }
}

impl std::error::Error for SeedError {}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub courts_created: usize,
    pub courts_existing: usize,
}

pub async fn load_file(
    path: &Path,
    engine: &Engine,
    tokens: &TokenDirectory,
) -> Result<SeedSummary, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(SeedError::Io)?;
    let seed: SeedFile = serde_json::from_str(&raw).map_err(SeedError::Parse)?;
    apply(seed, engine, tokens).await
}

pub async fn apply(
    seed: SeedFile,
    engine: &Engine,
    tokens: &TokenDirectory,
) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();
    for user in seed.users {
        tokens.insert(user.token, user.id, user.role);
        summary.users += 1;
    }

    for court in seed.courts {
        let id = court.id;
        let new = NewCourt {
            id,
            name: court.name,
            location: court.location,
            status: court.status,
            slot_duration: court.slot_duration,
            owner_id: court.owner_id,
        };
        match engine.register_court(new).await {
            Ok(_) => {}
            Err(BookingError::AlreadyExists(_)) => {
                summary.courts_existing += 1;
                continue;
            }
            Err(e) => return Err(SeedError::Court(id, e)),
        }
        let slots = court
            .price_slots
            .into_iter()
            .map(|s| PriceSlot {
                id: Ulid::new(),
                start_time: s.start_time,
                end_time: s.end_time,
                price: s.price,
            })
            .collect::<Vec<_>>();
        if !slots.is_empty() {
            engine
                .replace_price_slots(id, slots)
                .await
                .map_err(|e| SeedError::Court(id, e))?;
        }
        summary.courts_created += 1;
    }
    tracing::info!(
        "seed applied: {} users, {} courts created, {} already present",
        summary.users,
        summary.courts_created,
        summary.courts_existing
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn test_journal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("courtside_test_seed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    const SEED: &str = r#"{
        "users": [
            {"id": "01J0000000000000000000MGR1", "role": "manager", "token": "owner-token"},
            {"id": "01J0000000000000000000CST1", "role": "customer", "token": "customer-token"}
        ],
        "courts": [
            {
                "id": "01J00000000000000000000CT1",
                "name": "Court 1",
                "location": "District 7",
                "owner_id": "01J0000000000000000000MGR1",
                "price_slots": [
                    {"start_time": "18:00:00", "end_time": "22:00:00", "price": 200000}
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn seed_provisions_courts_once() {
        let path = test_journal_path("seed_once.journal");
        let tokens = TokenDirectory::new();
        {
            let engine = Engine::new(path.clone()).unwrap();
            let seed: SeedFile = serde_json::from_str(SEED).unwrap();
            let summary = apply(seed, &engine, &tokens).await.unwrap();
            assert_eq!(
                summary,
                SeedSummary { users: 2, courts_created: 1, courts_existing: 0 }
            );

            let court_id = Ulid::from_string("01J00000000000000000000CT1").unwrap();
            let (court, slots) = engine.bookable_court(court_id).await.unwrap();
            assert_eq!(court.slot_duration, 60);
            assert_eq!(court.status, CourtStatus::Active);
            assert_eq!(slots.len(), 1);
            assert_eq!(slots[0].price, 200_000);
        }

        // Second start over the same journal.
        let engine = Engine::new(path).unwrap();
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();
        let summary = apply(seed, &engine, &tokens).await.unwrap();
        assert_eq!(summary.courts_existing, 1);
        assert_eq!(summary.courts_created, 0);

        let caller = tokens.resolve("owner-token").unwrap();
        assert_eq!(caller.role, Role::Manager);
    }

    #[tokio::test]
    async fn bad_price_tier_is_reported() {
        let engine = Engine::new(test_journal_path("seed_bad_tier.journal")).unwrap();
        let seed: SeedFile = serde_json::from_str(
            r#"{"courts": [{
                "id": "01J00000000000000000000CT2",
                "name": "Court 2",
                "owner_id": "01J0000000000000000000MGR1",
                "price_slots": [{"start_time": "22:00:00", "end_time": "18:00:00", "price": 1}]
            }]}"#,
        )
        .unwrap();
        let err = apply(seed, &engine, &TokenDirectory::new()).await.unwrap_err();
        assert!(matches!(err, SeedError::Court(_, BookingError::Validation(_))));
    }
}
