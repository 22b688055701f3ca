use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::job::{JobId, ScoreBand};

/// A past analysis as listed by the history endpoint. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub job_id: JobId,
    pub filename: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub finding_count: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl HistoryEntry {
    /// Creation time, accepting RFC 3339 or naive ISO-8601 stamps.
    pub fn created(&self) -> Option<NaiveDateTime> {
        let raw = self.created_at.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.naive_utc())
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
    }

    pub fn band(&self) -> Option<ScoreBand> {
        self.score
            .filter(|s| s.is_finite())
            .map(|s| ScoreBand::from_score(s.round() as i64))
    }
}

/// Order entries newest first. Stable; entries without a parsable stamp go last.
pub fn sort_newest_first(entries: &mut [HistoryEntry]) {
    entries.sort_by_key(|entry| std::cmp::Reverse(entry.created()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, created_at: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            job_id: JobId::new(id),
            filename: format!("{id}.pdf"),
            score: None,
            finding_count: None,
            status: None,
            created_at: created_at.map(Into::into),
        }
    }

    #[test]
    fn sorts_by_creation_time_descending() {
        let mut entries = vec![
            entry("old", Some("2026-03-01T09:00:00.000001")),
            entry("broken", Some("yesterday")),
            entry("new", Some("2026-03-02T10:15:00+00:00")),
            entry("missing", None),
            entry("mid", Some("2026-03-01T12:00:00")),
        ];
        sort_newest_first(&mut entries);
        let ids: Vec<&str> = entries.iter().map(|e| e.job_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old", "broken", "missing"]);
    }

    #[test]
    fn decodes_backend_listing() {
        let entries: Vec<HistoryEntry> = serde_json::from_value(json!([
            {
                "job_id": "f3b1",
                "filename": "nda.pdf",
                "score": 72,
                "status": "complete",
                "created_at": "2026-03-02T10:15:00.123456",
                "finding_count": 5
            },
            {"job_id": "a9c0", "filename": "app.py", "score": null, "created_at": "2026-03-01T08:00:00"}
        ]))
        .unwrap();
        assert_eq!(entries[0].band(), Some(ScoreBand::High));
        assert_eq!(entries[0].finding_count, Some(5));
        assert!(entries[0].created().is_some());
        assert_eq!(entries[1].band(), None);
    }
}
