use tabled::settings::{object::Columns, Alignment, Modify, Panel, Style};
use tabled::{Table, Tabled};

use crate::{Clock, KernelKind, TimingSample, Verdict};

#[derive(Tabled)]
struct PhaseRow {
    #[tabled(rename = "phase")]
    phase: &'static str,
    #[tabled(rename = "clock")]
    clock: Clock,
    #[tabled(rename = "elapsed (ms)")]
    elapsed_ms: String,
}

/// Single-shot timings of one run and the comparison verdict.
#[derive(Debug, Clone, Copy)]
pub struct TimingReport {
    pub kernel: KernelKind,
    pub dim: usize,
    pub reference: TimingSample,
    pub accelerated: TimingSample,
    pub verdict: Verdict,
}

impl TimingReport {
    pub fn lines(&self) -> [String; 3] {
        [
            format!(
                "Reference computation took {:.3} ms",
                self.reference.elapsed_ms()
            ),
            format!(
                "Accelerated computation took {:.3} ms",
                self.accelerated.elapsed_ms()
            ),
            self.verdict.to_string(),
        ]
    }

    /// Reference time over accelerated time.
    pub fn speedup(&self) -> Option<f64> {
        let accelerated = self.accelerated.elapsed_ms();
        (accelerated > 0.0).then(|| self.reference.elapsed_ms() / accelerated)
    }

    pub fn table(&self) -> String {
        let rows = [
            ("reference", &self.reference),
            ("accelerated", &self.accelerated),
        ]
        .into_iter()
        .map(|(phase, sample)| PhaseRow {
            phase,
            clock: sample.clock,
            elapsed_ms: format!("{:.3}", sample.elapsed_ms()),
        })
        .collect::<Vec<_>>();
        let mut table = Table::new(rows);
        table
            .with(Style::modern())
            .with(Modify::new(Columns::last()).with(Alignment::right()));
        if let Some(speedup) = self.speedup() {
            table.with(Panel::footer(format!("speedup {:.2}x", speedup)));
        }
        table.to_string()
    }
}

impl std::fmt::Display for TimingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdict: Verdict) -> TimingReport {
        TimingReport {
            kernel: KernelKind::Matmul,
            dim: 4,
            reference: TimingSample {
                clock: Clock::Host,
                start_ns: 0,
                end_ns: 12_500_000,
            },
            accelerated: TimingSample::device(0, 250_000, 1.0),
            verdict,
        }
    }

    #[test]
    pub fn report_lines() {
        let r = report(Verdict::Equal);
        assert_eq!(
            r.lines(),
            [
                "Reference computation took 12.500 ms".to_string(),
                "Accelerated computation took 0.250 ms".to_string(),
                "Matrices are equal".to_string(),
            ]
        );
        assert!((r.speedup().unwrap() - 50.0).abs() < 1e-9);
        assert!(report(Verdict::NotEqual)
            .to_string()
            .ends_with("Matrices are not equal"));
    }

    #[test]
    pub fn table_lists_both_phases() {
        let table = report(Verdict::Equal).table();
        assert!(table.contains("reference"));
        assert!(table.contains("accelerated"));
        assert!(table.contains("device"));
        assert!(table.contains("12.500"));
        assert!(table.contains("speedup 50.00x"));
    }
}
