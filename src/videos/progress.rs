use serde::Serialize;
use time::OffsetDateTime;

use super::repo_types::VideoStatus;

/// Typical wall-clock time of one generation.
pub const EXPECTED_SECS: i64 = 300;
const CAP_WHILE_RUNNING: i64 = 95;

pub const STEPS: [&str; 6] = [
    "Analyzing prompt",
    "Preparing scene",
    "Rendering frames",
    "Adding effects",
    "Optimizing video",
    "Finalizing",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub percent: u8,
    pub step: &'static str,
    pub elapsed_secs: i64,
    pub remaining_secs: i64,
}

/// Time-based estimate; the provider does not report real progress.
pub fn estimate(
    status: VideoStatus,
    created_at: OffsetDateTime,
    completed_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Progress {
    let end = completed_at.unwrap_or(now);
    let elapsed_secs = (end - created_at).whole_seconds().max(0);
    match status {
        VideoStatus::Generating => {
            let percent = (elapsed_secs * 100 / EXPECTED_SECS).min(CAP_WHILE_RUNNING);
            let step = STEPS[(percent / 16).min(STEPS.len() as i64 - 1) as usize];
            Progress {
                percent: percent as u8,
                step,
                elapsed_secs,
                remaining_secs: (EXPECTED_SECS - elapsed_secs).max(0),
            }
        }
        VideoStatus::Completed => Progress {
            percent: 100,
            step: "Video ready",
            elapsed_secs,
            remaining_secs: 0,
        },
        VideoStatus::Failed => Progress {
            percent: 0,
            step: "Generation failed",
            elapsed_secs,
            remaining_secs: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn at(secs: i64) -> (OffsetDateTime, OffsetDateTime) {
        let start = OffsetDateTime::now_utc();
        (start, start + Duration::seconds(secs))
    }

    #[test]
    fn running_progress_walks_the_steps() {
        let (start, now) = at(0);
        let p = estimate(VideoStatus::Generating, start, None, now);
        assert_eq!(p.percent, 0);
        assert_eq!(p.step, "Analyzing prompt");
        assert_eq!(p.remaining_secs, 300);

        let (start, now) = at(100);
        let p = estimate(VideoStatus::Generating, start, None, now);
        assert_eq!(p.percent, 33);
        assert_eq!(p.step, "Rendering frames");
        assert_eq!(p.remaining_secs, 200);
    }

    #[test]
    fn running_progress_never_reaches_done() {
        let (start, now) = at(1_000);
        let p = estimate(VideoStatus::Generating, start, None, now);
        assert_eq!(p.percent, 95);
        assert_eq!(p.step, "Finalizing");
        assert_eq!(p.remaining_secs, 0);
    }

    #[test]
    fn finished_states_are_fixed() {
        let (start, done) = at(42);
        let p = estimate(VideoStatus::Completed, start, Some(done), done + Duration::hours(1));
        assert_eq!(p.percent, 100);
        assert_eq!(p.elapsed_secs, 42);

        let p = estimate(VideoStatus::Failed, start, Some(done), done);
        assert_eq!(p.percent, 0);
        assert_eq!(p.step, "Generation failed");
    }
}
