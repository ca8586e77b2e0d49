// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource age formatting
//!
//! Ages are measured against the modification time of the snapshot file the
//! resource was read from, so re-running a query days later still shows the
//! ages as they were when the snapshot was taken.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Reference "now" for a snapshot file: its mtime, or the wall clock
pub fn reference_time(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Age column value for a creation timestamp
pub fn age(created: Option<&Time>, now: DateTime<Utc>) -> String {
    match created {
        Some(Time(created)) => human_duration(now.signed_duration_since(*created)),
        None => "<unknown>".to_string(),
    }
}

/// Format an elapsed duration the way kubectl does
///
/// Precision drops as the duration grows: seconds up to two minutes,
/// minutes and seconds below ten minutes, and so on up to years.
/// Negative durations clamp to `0s`.
pub fn human_duration(elapsed: Duration) -> String {
    let seconds = elapsed.num_seconds().max(0);
    if seconds < 60 * 2 {
        return format!("{}s", seconds);
    }

    let minutes = seconds / 60;
    if minutes < 10 {
        let s = seconds % 60;
        if s == 0 {
            return format!("{}m", minutes);
        }
        return format!("{}m{}s", minutes, s);
    } else if minutes < 60 * 3 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 8 {
        let m = minutes % 60;
        if m == 0 {
            return format!("{}h", hours);
        }
        return format!("{}h{}m", hours, m);
    } else if hours < 48 {
        return format!("{}h", hours);
    } else if hours < 24 * 8 {
        let h = hours % 24;
        if h == 0 {
            return format!("{}d", hours / 24);
        }
        return format!("{}d{}h", hours / 24, h);
    } else if hours < 24 * 365 * 2 {
        return format!("{}d", hours / 24);
    } else if hours < 24 * 365 * 8 {
        let days = (hours / 24) % 365;
        if days == 0 {
            return format!("{}y", hours / 24 / 365);
        }
        return format!("{}y{}d", hours / 24 / 365, days);
    }

    format!("{}y", hours / 24 / 365)
}
