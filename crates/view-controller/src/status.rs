//! Status-line text shown under a view.

use query_engine::PartialResult;
use slice_common::LogicalBox;

/// Request line set when a job is pushed: `t=3 b=[[0,0,5],[512,512,6]] 800x600`.
pub fn request_status(timestep: i64, logic_box: &LogicalBox, canvas_width: u32, canvas_height: u32) -> String {
    format!(
        "t={timestep} b={} {canvas_width}x{canvas_height}",
        logic_box.compact()
    )
}

/// Response line while a job has produced nothing yet.
pub const RESPONSE_RUNNING: &str = "Running...";

/// Response line for an applied result:
/// `#2 [[0,0],[1024,1024]] 512x512 Res=18/20 12msec running`.
pub fn response_status(result: &PartialResult, max_level: u32) -> String {
    let state = if result.running { "running" } else { "FINISHED" };
    format!(
        "#{} {} {}x{} Res={}/{} {}msec {}",
        result.sequence + 1,
        result.logic_box.compact(),
        result.image.width,
        result.image.height,
        result.level,
        max_level,
        result.elapsed.as_millis(),
        state
    )
}

/// Response line for a failed job.
pub fn failure_status(message: &str) -> String {
    format!("FAILED {message}")
}

/// Requested versus rendered slice position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetReport {
    /// Offset the user asked for, in physical units.
    pub requested_physic: f64,
    /// Offset of the slice actually rendered, in physical units.
    pub rendered_physic: f64,
    /// Slice index the requested offset falls on.
    pub requested_logic: f64,
    /// Slice index actually rendered.
    pub rendered_logic: f64,
    pub level: u32,
    pub max_level: u32,
}

impl OffsetReport {
    /// `Offset: 12.000±0.500 Pixel: 24±1 Max Res: 18/20`
    pub fn to_status(&self) -> String {
        format!(
            "Offset: {:.3}±{:.3} Pixel: {}±{} Max Res: {}/{}",
            self.requested_physic,
            (self.requested_physic - self.rendered_physic).abs(),
            self.requested_logic,
            (self.requested_logic - self.rendered_logic).abs(),
            self.level,
            self.max_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine::SliceImage;
    use std::time::Duration;

    #[test]
    fn test_request_status() {
        let b = LogicalBox::new(vec![0.0, 0.0, 5.0], vec![512.0, 512.5, 6.0]).unwrap();
        assert_eq!(request_status(3, &b, 800, 600), "t=3 b=[[0,0,5],[512,512,6]] 800x600");
    }

    #[test]
    fn test_response_status() {
        let result = PartialResult {
            job_id: 1,
            image: SliceImage::new(vec![0.0; 6], 3, 2),
            logic_box: LogicalBox::full(&[1024, 1024]),
            level: 18,
            running: true,
            sequence: 1,
            elapsed: Duration::from_millis(12),
        };
        assert_eq!(
            response_status(&result, 20),
            "#2 [[0,0],[1024,1024]] 3x2 Res=18/20 12msec running"
        );
    }

    #[test]
    fn test_offset_status() {
        let report = OffsetReport {
            requested_physic: 12.0,
            rendered_physic: 11.5,
            requested_logic: 24.0,
            rendered_logic: 23.0,
            level: 18,
            max_level: 20,
        };
        assert_eq!(report.to_status(), "Offset: 12.000±0.500 Pixel: 24±1 Max Res: 18/20");
    }
}
