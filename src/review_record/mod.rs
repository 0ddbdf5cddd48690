use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single product review, the unit of persistence of this crate.
///
/// Field names are serialized in camelCase to match the wire format of the
/// remote service. Besides the identity and bookkeeping fields below, a record
/// carries an open bag of product-type-specific fields (`extra`) that the core
/// passes through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    /// Assigned by whichever store first persists the record.
    /// `None` for a record not yet persisted anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// One of a small fixed catalog (e.g. "Hash", "Fleur", "Concentré",
    /// "Comestible"). Never validated by the core.
    #[serde(default)]
    pub product_type: String,

    // Free-text identity fields, used only for correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultivars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breeder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm: Option<String>,

    /// ISO-8601 timestamp of the last modification.
    /// Kept as text the way the wire format carries it; only the dedup
    /// tie-break ever parses it.
    #[serde(default)]
    pub date: String,

    /// Visibility flag, meaningful only while a remote service is active.
    #[serde(default)]
    pub is_private: bool,

    /// Autosaved early version of a record. Drafts lose dedup tie-breaks
    /// against final records and are collapsed by a final save.
    #[serde(default)]
    pub is_draft: bool,

    /// Cached derived identity key. Recomputed on every save and backfilled
    /// on open for rows that predate the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_key: Option<String>,

    /// Embedded data-URL or remote URL. Opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Aggregated scores. Opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Value>,

    /// Everything else a product-type form produced. Passed through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Default for ReviewRecord {
    fn default() -> Self {
        Self {
            id: None,
            product_type: String::new(),
            product_name: None,
            cultivars: None,
            breeder: None,
            farm: None,
            date: String::new(),
            is_private: false,
            is_draft: false,
            correlation_key: None,
            image: None,
            totals: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_wire_format() {
        let mut record = ReviewRecord::default();
        record.product_type = "Fleur".to_string();
        record.product_name = Some("Amnesia".to_string());
        record.is_private = true;
        record
            .extra
            .insert("aromas".to_string(), serde_json::json!(["citrus"]));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["productType"], "Fleur");
        assert_eq!(json["productName"], "Amnesia");
        assert_eq!(json["isPrivate"], true);
        assert_eq!(json["aromas"][0], "citrus");
        // Absent optionals must not appear on the wire.
        assert!(json.get("id").is_none());
        assert!(json.get("image").is_none());
    }

    #[test]
    fn deserializes_unknown_fields_into_extra() {
        let record: ReviewRecord = serde_json::from_str(
            r#"{"productType":"Hash","productName":"Ketama","texture":"sticky","rating":9}"#,
        )
        .unwrap();

        assert_eq!(record.product_type, "Hash");
        assert_eq!(record.extra["texture"], "sticky");
        assert_eq!(record.extra["rating"], 9);
        assert_eq!(record.id, None);
    }

    #[test]
    fn round_trips_through_json() {
        let mut record = ReviewRecord::default();
        record.id = Some(7);
        record.product_type = "Concentré".to_string();
        record.cultivars = Some("Gelato 41".to_string());
        record.date = "2026-03-14T09:26:53Z".to_string();
        record.totals = Some(serde_json::json!({"overall": 8.5}));

        let json = serde_json::to_string(&record).unwrap();
        let back: ReviewRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
