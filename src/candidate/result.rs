//! Final detection output.

use std::io::Write;

use crate::candidate::Candidate;
use crate::util::TileDetectResult;

/// Ordered final candidates plus run-level statistics.
///
/// When no cluster survives deduplication `aggregate_confidence` is `0.0` and
/// [`DetectionResult::is_empty`] returns `true`; the aggregate is only
/// meaningful when at least one candidate was accepted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    /// Accepted candidates in emission order.
    pub candidates: Vec<Candidate>,
    /// Mean of the accepted cluster averages, `0.0` when there are none.
    pub aggregate_confidence: f32,
    /// Candidates handed to deduplication.
    pub raw_count: usize,
    /// Candidates that survived border and noise-floor pruning.
    pub pruned_count: usize,
    /// Clusters formed in the merge pass, accepted or not.
    pub cluster_count: usize,
}

impl DetectionResult {
    /// Returns `true` when no candidate was accepted.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of accepted candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Aggregate confidence, or `None` when nothing was accepted.
    pub fn aggregate(&self) -> Option<f32> {
        (!self.is_empty()).then_some(self.aggregate_confidence)
    }

    /// Candidates removed by the merge pass (merged away or below tolerance).
    pub fn merged_away(&self) -> usize {
        self.pruned_count.saturating_sub(self.candidates.len())
    }

    /// Writes `x,y,r,confidence` rows with a header line.
    pub fn write_csv<W: Write>(&self, mut out: W) -> TileDetectResult<()> {
        writeln!(out, "x,y,r,confidence")?;
        for c in &self.candidates {
            writeln!(out, "{},{},{},{}", c.x, c.y, c.r, c.confidence)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DetectionResult;
    use crate::candidate::Candidate;

    #[test]
    fn empty_result_has_no_aggregate() {
        let result = DetectionResult::default();
        assert!(result.is_empty());
        assert_eq!(result.aggregate_confidence, 0.0);
        assert!(result.aggregate().is_none());
    }

    #[test]
    fn csv_has_header_and_rows() {
        let result = DetectionResult {
            candidates: vec![Candidate {
                x: 12,
                y: 40,
                r: 7.5,
                confidence: 0.75,
            }],
            aggregate_confidence: 0.75,
            raw_count: 4,
            pruned_count: 4,
            cluster_count: 1,
        };
        let mut buf = Vec::new();
        result.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "x,y,r,confidence\n12,40,7.5,0.75\n");
        assert_eq!(result.merged_away(), 3);
    }
}
