//! Terminal presenter.

use async_trait::async_trait;
use serde::Serialize;

use photosort_core::{ClusterSet, Presenter, ProgressStats};

/// Renders cluster tables and progress lines to stdout/stderr.
pub struct TerminalPresenter {
    /// Suppress intermediate render output (final output is printed by the
    /// command handler instead).
    quiet: bool,
}

impl TerminalPresenter {
    /// Create a presenter. `quiet` suppresses per-pass tables.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

#[async_trait]
impl Presenter for TerminalPresenter {
    async fn render(&self, set: &ClusterSet) {
        if self.quiet {
            return;
        }
        println!("{}", render_table(set));
    }

    async fn notify_stats(&self, stats: &ProgressStats) {
        eprint!(
            "\r{} {}/{} ({:.2} s/img, eta {:.0}s)   ",
            stats.current_action,
            stats.processed,
            stats.total,
            stats.speed_sec_per_image,
            stats.eta_millis as f64 / 1000.0
        );
        if stats.completed {
            eprintln!();
        }
    }
}

/// Plain-text cluster table.
pub fn render_table(set: &ClusterSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} clusters\n", set.len()));
    for cluster in &set.clusters {
        let frozen = if cluster.is_frozen { " [frozen]" } else { "" };
        let moved = match cluster.moved_from {
            Some(from) => format!(" (was #{from})"),
            None => String::new(),
        };
        out.push_str(&format!(
            "#{} - {} images{}{}\n",
            cluster.id,
            cluster.len(),
            frozen,
            moved
        ));
        for rep in &cluster.representatives {
            let marker = if rep.is_replacement { "*" } else { " " };
            out.push_str(&format!("   {marker} {}\n", rep.path()));
        }
    }
    out
}

/// JSON view of a pass, for `--json` output.
#[derive(Serialize)]
pub struct ClusterSetView {
    /// Per-cluster summaries.
    pub clusters: Vec<ClusterView>,
}

/// JSON view of one cluster.
#[derive(Serialize)]
pub struct ClusterView {
    pub id: usize,
    pub size: usize,
    pub frozen: bool,
    pub drift_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved_from: Option<usize>,
    pub representatives: Vec<RepresentativeView>,
}

/// JSON view of one representative.
#[derive(Serialize)]
pub struct RepresentativeView {
    pub path: String,
    pub replacement: bool,
}

impl From<&ClusterSet> for ClusterSetView {
    fn from(set: &ClusterSet) -> Self {
        Self {
            clusters: set
                .clusters
                .iter()
                .map(|c| ClusterView {
                    id: c.id,
                    size: c.len(),
                    frozen: c.is_frozen,
                    drift_count: c.drift_count,
                    moved_from: c.moved_from,
                    representatives: c
                        .representatives
                        .iter()
                        .map(|r| RepresentativeView {
                            path: r.path().to_string(),
                            replacement: r.is_replacement,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photosort_core::{Cluster, EmbeddingRecord, Representative};

    fn sample_set() -> ClusterSet {
        let rec = EmbeddingRecord::new("a.jpg", vec![1.0, 0.0]);
        let mut cluster = Cluster::new(
            1,
            vec![1.0, 0.0],
            vec![rec.clone()],
            vec![Representative::replacement(rec)],
        );
        cluster.is_frozen = true;
        cluster.moved_from = Some(2);
        cluster.drift_count = 3;
        ClusterSet {
            clusters: vec![cluster],
            centroids: vec![vec![1.0, 0.0]],
        }
    }

    #[test]
    fn table_marks_frozen_and_replacements() {
        let table = render_table(&sample_set());
        assert!(table.contains("[frozen]"));
        assert!(table.contains("(was #2)"));
        assert!(table.contains("* a.jpg"));
    }

    #[test]
    fn json_view_round_trips() {
        let view = ClusterSetView::from(&sample_set());
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"drift_count\":3"));
        assert!(json.contains("\"moved_from\":2"));
        assert!(json.contains("\"replacement\":true"));
    }
}
