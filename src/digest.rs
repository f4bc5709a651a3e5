//! Daily digest selection: pick one of yesterday's sightings at random.

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::emit::partition_key;
use crate::storage::{BlobEntry, BlobStore};

/// Partition key (`MM-DD-YYYY`) of the calendar day before `now`.
pub fn previous_day_partition<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<String>
where
    Tz::Offset: std::fmt::Display,
{
    let yesterday = now
        .date_naive()
        .pred_opt()
        .ok_or_else(|| anyhow!("no calendar day before {}", now))?;
    Ok(yesterday.format("%m-%d-%Y").to_string())
}

/// Non-empty `.jpg` objects only.
pub fn eligible_entries(entries: Vec<BlobEntry>) -> Vec<BlobEntry> {
    entries
        .into_iter()
        .filter(|entry| entry.size > 0 && entry.key.ends_with(".jpg"))
        .collect()
}

/// Outcome of a digest run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DigestPick {
    pub partition: String,
    pub candidates: usize,
    /// `None` when the partition held no eligible sighting.
    pub selected: Option<BlobEntry>,
}

/// List the previous day's partition and choose one eligible sighting uniformly.
pub fn pick_sighting<Tz, R>(store: &dyn BlobStore, now: &DateTime<Tz>, rng: &mut R) -> Result<DigestPick>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    R: Rng + ?Sized,
{
    let partition = previous_day_partition(now)?;
    pick_from_partition(store, &partition, rng)
}

/// Same as [`pick_sighting`] for an explicit partition key.
pub fn pick_from_partition<R>(store: &dyn BlobStore, partition: &str, rng: &mut R) -> Result<DigestPick>
where
    R: Rng + ?Sized,
{
    let prefix = format!("{}/", partition);
    let entries = eligible_entries(store.list(&prefix)?);
    log::info!(
        "digest: {} eligible sightings under {}",
        entries.len(),
        prefix
    );
    let selected = entries.choose(rng).cloned();
    Ok(DigestPick {
        partition: partition.to_string(),
        candidates: entries.len(),
        selected,
    })
}

/// Partition key for a date given as `YYYY-MM-DD`.
pub fn partition_for_date(date: &str) -> Result<String> {
    let day = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| anyhow!("invalid date {:?} (expected YYYY-MM-DD): {}", date, e))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid date {:?}", date))?
        .and_utc();
    Ok(partition_key(&midnight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBlobStore;
    use chrono::{FixedOffset, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn previous_day_crosses_month_and_year() -> Result<()> {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(previous_day_partition(&now)?, "02-28-2025");
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(previous_day_partition(&now)?, "12-31-2024");
        Ok(())
    }

    #[test]
    fn previous_day_uses_the_local_calendar() -> Result<()> {
        let tz = FixedOffset::east_opt(3600).unwrap();
        // 23:30 UTC on the 12th is already the 13th at +01:00.
        let now = Utc.with_ymd_and_hms(2025, 2, 12, 23, 30, 0).unwrap().with_timezone(&tz);
        assert_eq!(previous_day_partition(&now)?, "02-12-2025");
        Ok(())
    }

    #[test]
    fn only_non_empty_jpegs_are_eligible() {
        let entries = vec![
            BlobEntry { key: "02-12-2025/a.jpg".into(), size: 10 },
            BlobEntry { key: "02-12-2025/empty.jpg".into(), size: 0 },
            BlobEntry { key: "02-12-2025/notes.txt".into(), size: 5 },
            BlobEntry { key: "02-12-2025/b.png".into(), size: 5 },
        ];
        let eligible = eligible_entries(entries);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].key, "02-12-2025/a.jpg");
    }

    #[test]
    fn picks_from_yesterday_only() -> Result<()> {
        let store = InMemoryBlobStore::new();
        store.put("02-12-2025/bird_1.jpg", b"jpeg", "image/jpeg")?;
        store.put("02-12-2025/bird_2.jpg", b"jpeg", "image/jpeg")?;
        store.put("02-13-2025/bird_3.jpg", b"jpeg", "image/jpeg")?;
        let now = Utc.with_ymd_and_hms(2025, 2, 13, 8, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let pick = pick_sighting(&store, &now, &mut rng)?;
        assert_eq!(pick.partition, "02-12-2025");
        assert_eq!(pick.candidates, 2);
        let selected = pick.selected.expect("a sighting is selected");
        assert!(selected.key.starts_with("02-12-2025/"));
        Ok(())
    }

    #[test]
    fn empty_partition_selects_nothing() -> Result<()> {
        let store = InMemoryBlobStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let pick = pick_from_partition(&store, "02-12-2025", &mut rng)?;
        assert_eq!(pick.candidates, 0);
        assert!(pick.selected.is_none());
        Ok(())
    }

    #[test]
    fn dates_map_to_partitions() -> Result<()> {
        assert_eq!(partition_for_date("2025-02-12")?, "02-12-2025");
        assert!(partition_for_date("12-02-2025").is_err());
        Ok(())
    }
}
