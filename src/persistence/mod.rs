//! CSV Persistence Module
//!
//! Journals every publish decision so posted snapshots can be audited offline

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::oracle::Trigger;
use crate::types::{Asset, Snapshot};

/// One publication row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub timestamp: i64,
    pub asset: String,
    pub trigger: String,
    pub spot_price: f64,
    pub interest_rate: f64,
    pub spot_move_pct: f64,
    /// `;`-joined call marks
    pub call_prices: String,
    /// `;`-joined put marks
    pub put_prices: String,
    pub submitted: bool,
}

impl PublicationRecord {
    pub fn new(
        asset: Asset,
        trigger: Trigger,
        snapshot: &Snapshot,
        spot_move: f64,
        submitted: bool,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: at.timestamp_millis(),
            asset: asset.to_string(),
            trigger: trigger.to_string(),
            spot_price: snapshot.spot_price,
            interest_rate: snapshot.interest_rate,
            spot_move_pct: spot_move * 100.0,
            call_prices: join_marks(&snapshot.call_prices),
            put_prices: join_marks(&snapshot.put_prices),
            submitted,
        }
    }
}

fn join_marks(marks: &[f64]) -> String {
    marks
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

struct DailyWriter {
    day: NaiveDate,
    writer: csv::Writer<std::fs::File>,
}

/// Append-only daily CSV journal of publications
pub struct PublicationJournal {
    dir: PathBuf,
    current: Mutex<Option<DailyWriter>>,
}

impl PublicationJournal {
    /// Create the journal under `{data_dir}/publications`
    pub fn new(data_dir: &str) -> Result<Self> {
        let dir = PathBuf::from(data_dir).join("publications");
        fs::create_dir_all(&dir).context("Failed to create publications directory")?;

        Ok(Self {
            dir,
            current: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("publications_{}.csv", day.format("%Y-%m-%d")))
    }

    /// Append a record to the file for the record's day
    pub async fn record(&self, record: &PublicationRecord, at: DateTime<Utc>) -> Result<()> {
        let day = at.date_naive();
        let mut current = self.current.lock().await;

        let rolled = !matches!(current.as_ref(), Some(w) if w.day == day);
        if rolled {
            let writer = create_writer(&self.file_for(day))?;
            *current = Some(DailyWriter { day, writer });
        }

        let daily = current
            .as_mut()
            .context("Publication writer missing after open")?;
        daily
            .writer
            .serialize(record)
            .context("Failed to write publication record")?;
        daily
            .writer
            .flush()
            .context("Failed to flush publication writer")?;
        Ok(())
    }
}

fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    let file_has_data = path.exists() && fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    Ok(WriterBuilder::new()
        .has_headers(!file_has_data)
        .from_writer(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "oraclebot_journal_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            spot_price: 1850.25,
            interest_rate: 0.0134,
            call_prices: vec![120.5, 64.25],
            put_prices: vec![3.5, 18.75],
        }
    }

    #[tokio::test]
    async fn writes_header_once_then_rows() {
        let data_dir = temp_data_dir("header_once");
        let journal = PublicationJournal::new(data_dir.to_str().unwrap()).unwrap();
        let at = Utc.with_ymd_and_hms(2023, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(journal.dir(), data_dir.join("publications"));

        for submitted in [false, true] {
            let record =
                PublicationRecord::new(Asset::ETH, Trigger::Movement, &snapshot(), 0.015, submitted, at);
            journal.record(&record, at).await.unwrap();
        }

        let content = fs::read_to_string(journal.file_for(at.date_naive())).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,asset,trigger,spot_price,interest_rate,spot_move_pct,call_prices,put_prices,submitted"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("ETH,MOVEMENT,1850.25,0.0134,1.5,120.5;64.25,3.5;18.75,false"));

        let _ = fs::remove_dir_all(&data_dir);
    }

    #[tokio::test]
    async fn rolls_to_new_file_per_day_and_keeps_existing_headers() {
        let data_dir = temp_data_dir("rollover");
        let journal = PublicationJournal::new(data_dir.to_str().unwrap()).unwrap();
        let day_one = Utc.with_ymd_and_hms(2023, 3, 14, 23, 59, 0).unwrap();
        let day_two = Utc.with_ymd_and_hms(2023, 3, 15, 0, 1, 0).unwrap();

        fs::write(journal.file_for(day_one.date_naive()), "").unwrap();
        for at in [day_one, day_two] {
            let record =
                PublicationRecord::new(Asset::ETH, Trigger::Heartbeat, &snapshot(), 0.0, false, at);
            journal.record(&record, at).await.unwrap();
        }

        for at in [day_one, day_two] {
            let content = fs::read_to_string(journal.file_for(at.date_naive())).unwrap();
            let mut lines = content.lines();
            assert!(lines.next().unwrap_or_default().starts_with("timestamp,asset,trigger"));
            assert!(lines.next().is_some(), "expected one row after header");
            assert!(lines.next().is_none());
        }

        let _ = fs::remove_dir_all(&data_dir);
    }
}
