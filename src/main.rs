use matmul_bencher::{run, BenchConfig, BenchError};

fn bench() -> Result<(), BenchError> {
    let config = BenchConfig::from_env()?;
    log::info!("Running {} on {}x{} matrices", config.kernel, config.dim, config.dim);
    let outcome = pollster::block_on(run(&config))?;
    println!("{}", outcome.report);
    Ok(())
}

// Failures are reported on stdout and the process still exits with status 0.
fn main() -> anyhow::Result<()> {
    env_logger::init();
    if let Err(e) = bench() {
        println!("Error: {} (code {})", e, e.code());
    }
    Ok(())
}
