//! Artifact names and blob addresses, all derived from the frame capture time.

use chrono::{DateTime, TimeZone};

/// Daily partition key, `MM-DD-YYYY`.
pub fn partition_key<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%m-%d-%Y").to_string()
}

/// Name and partition of one sighting image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SightingName {
    pub partition: String,
    pub file_name: String,
}

impl SightingName {
    pub fn new<Tz: TimeZone>(captured_at: &DateTime<Tz>, count: usize, avg_confidence: f32) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            partition: partition_key(captured_at),
            file_name: format!(
                "bird_{}_count_{}_conf_{:.2}.jpg",
                captured_at.format("%Y%m%d_%H%M%S"),
                count,
                avg_confidence
            ),
        }
    }

    /// Blob store address, `{partition}/{file_name}`.
    pub fn address(&self) -> String {
        format!("{}/{}", self.partition, self.file_name)
    }
}

/// File name for a raw (un-annotated) motion capture.
pub fn motion_capture_name<Tz: TimeZone>(captured_at: &DateTime<Tz>, region_count: usize) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "motion_{}_areas_{}.jpg",
        captured_at.format("%Y%m%d_%H%M%S"),
        region_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn sighting_names_follow_capture_time() {
        let at = Local.with_ymd_and_hms(2025, 2, 12, 23, 59, 58).unwrap();
        let name = SightingName::new(&at, 2, 0.876);
        assert_eq!(name.partition, "02-12-2025");
        assert_eq!(name.file_name, "bird_20250212_235958_count_2_conf_0.88.jpg");
        assert_eq!(name.address(), "02-12-2025/bird_20250212_235958_count_2_conf_0.88.jpg");
    }

    #[test]
    fn confidence_is_two_decimals() {
        let at = Local.with_ymd_and_hms(2025, 7, 4, 6, 5, 4).unwrap();
        assert!(SightingName::new(&at, 1, 0.5).file_name.ends_with("_conf_0.50.jpg"));
        assert!(SightingName::new(&at, 1, 1.0).file_name.ends_with("_conf_1.00.jpg"));
    }

    #[test]
    fn motion_capture_names() {
        let at = Local.with_ymd_and_hms(2025, 7, 4, 6, 5, 4).unwrap();
        assert_eq!(motion_capture_name(&at, 3), "motion_20250704_060504_areas_3.jpg");
    }
}
