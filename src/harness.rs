use crate::{
    data::generate_inputs, reference, time_host, Accelerator, BenchConfig, GPUHandle, KernelKind,
    Matrix, Result, TimingReport, TimingSample, Verdict,
};

/// Everything a run produced, kept for inspection by callers and tests.
#[derive(Debug)]
pub struct BenchOutcome {
    pub report: TimingReport,
    pub reference: Matrix,
    pub accelerated: Matrix,
}

/// Reference phase: host computation of `kind`, bracketed by host timestamps.
pub fn run_reference(kind: KernelKind, a: &Matrix, b: &Matrix) -> Result<(Matrix, TimingSample)> {
    let mut out = Matrix::zeros(a.rows(), b.cols());
    let (result, timing) = time_host(|| match kind {
        KernelKind::Matmul => reference::matmul(a, b, &mut out),
        KernelKind::Elementwise => reference::elementwise_mul(a, b, &mut out),
    });
    result?;
    Ok((out, timing))
}

/// Inputs → reference → accelerated → compare, on an accelerator that has
/// already been brought up.
pub fn run_with(accelerator: &Accelerator, config: &BenchConfig) -> Result<BenchOutcome> {
    let (a, b) = generate_inputs(config.dim, config.seed);

    let (reference, reference_timing) = run_reference(config.kernel, &a, &b)?;
    let accelerated = accelerator.run(config.kernel, &a, &b)?;

    let verdict = Verdict::of(&reference, &accelerated.output);
    if !verdict.is_equal() {
        if let Err(e) = reference.all_close(&accelerated.output, 1e-5, 1e-5) {
            log::warn!("Accelerated result differs from reference: {}", e);
        } else {
            log::warn!("Accelerated result differs from reference within 1e-5");
        }
    }

    if config.print_matrices {
        print!("Matrix A:\n{}", a);
        print!("Matrix B:\n{}", b);
        print!("Matrix C (reference):\n{}", reference);
        print!("Matrix C (accelerated):\n{}", accelerated.output);
    }

    let report = TimingReport {
        kernel: config.kernel,
        dim: config.dim,
        reference: reference_timing,
        accelerated: accelerated.timing,
        verdict,
    };
    log::info!(
        "{} {}x{} on {}\n{}",
        report.kernel,
        report.dim,
        report.dim,
        accelerator.handle().info().name,
        report.table()
    );
    Ok(BenchOutcome {
        report,
        reference,
        accelerated: accelerated.output,
    })
}

/// Full run: device bring-up, kernel compilation, then [`run_with`].
///
/// Every device resource acquired here is released when it goes out of
/// scope, including on early error returns.
pub async fn run(config: &BenchConfig) -> Result<BenchOutcome> {
    let handle = GPUHandle::new(&config.adapter).await?;
    let accelerator = Accelerator::new(handle)?;
    run_with(&accelerator, config)
}
