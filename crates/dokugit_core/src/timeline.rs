use crate::changelog::{ChangeRecord, PageChangelog};

/// Merge all pages' records into one globally time-ordered sequence.
///
/// Pages arrive in sorted path order and each page's records keep their file
/// order, so the concatenation is deterministic before sorting. The sort is
/// stable: the storage engine writes at most one entry per page per
/// timestamp, so equal timestamps can only collide across pages and keep
/// their enumeration order.
pub fn build_timeline(pages: Vec<PageChangelog>) -> Vec<ChangeRecord> {
    let mut timeline: Vec<ChangeRecord> = pages
        .into_iter()
        .flat_map(|page| page.records)
        .collect();
    timeline.sort_by_key(|record| record.timestamp);
    timeline
}

#[cfg(test)]
mod tests {
    use super::build_timeline;
    use crate::changelog::{ChangeRecord, ChangeType, PageChangelog};

    fn record(page: &str, timestamp: i64) -> ChangeRecord {
        ChangeRecord {
            timestamp,
            remote_ip: "127.0.0.1".to_string(),
            change_type: ChangeType::Edit,
            page_path: page.to_string(),
            author_id: String::new(),
            comment: String::new(),
        }
    }

    fn page(path: &str, timestamps: &[i64]) -> PageChangelog {
        PageChangelog {
            page_path: path.to_string(),
            records: timestamps.iter().map(|ts| record(path, *ts)).collect(),
        }
    }

    #[test]
    fn timeline_is_ordered_by_timestamp_across_pages() {
        let timeline = build_timeline(vec![
            page("alpha", &[300, 500]),
            page("beta", &[100, 400]),
            page("gamma", &[200]),
        ]);
        let timestamps: Vec<i64> = timeline.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300, 400, 500]);
    }

    #[test]
    fn equal_timestamps_keep_enumeration_order() {
        let timeline = build_timeline(vec![
            page("alpha", &[100]),
            page("beta", &[100]),
            page("gamma", &[100]),
        ]);
        let pages: Vec<&str> = timeline.iter().map(|r| r.page_path.as_str()).collect();
        assert_eq!(pages, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn timeline_of_no_pages_is_empty() {
        assert!(build_timeline(Vec::new()).is_empty());
    }
}
