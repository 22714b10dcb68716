use crate::{BenchError, Result, WorkgroupSize};

/// Side length of the square matrices benchmarked by the binary.
pub const DIM: usize = 256;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum KernelKind {
    #[default]
    Matmul,
    Elementwise,
}

impl KernelKind {
    pub const ALL: [KernelKind; 2] = [KernelKind::Matmul, KernelKind::Elementwise];

    pub fn name(self) -> &'static str {
        match self {
            KernelKind::Matmul => "matmul",
            KernelKind::Elementwise => "elementwise",
        }
    }

    pub fn workgroup_size(self) -> WorkgroupSize {
        match self {
            KernelKind::Matmul => WorkgroupSize(16, 16, 1),
            KernelKind::Elementwise => WorkgroupSize(64, 1, 1),
        }
    }
}

impl std::fmt::Display for KernelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for KernelKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matmul" => Ok(KernelKind::Matmul),
            "elementwise" | "mul" => Ok(KernelKind::Elementwise),
            _ => Err(BenchError::InvalidConfig {
                key: "MATBENCH_KERNEL",
                value: s.to_string(),
            }),
        }
    }
}

/// Which adapters qualify, and which one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterPreference {
    /// Case-insensitive substring of the adapter name that is picked over
    /// any other qualifying adapter, e.g. "nvidia".
    pub name: Option<String>,
    /// Whether software/CPU adapters count as a device.
    pub allow_cpu: bool,
}

/// Vendor searched for first when nothing else is configured.
pub const DEFAULT_ADAPTER: &str = "nvidia";

impl Default for AdapterPreference {
    fn default() -> Self {
        Self {
            name: Some(DEFAULT_ADAPTER.to_string()),
            allow_cpu: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub dim: usize,
    pub kernel: KernelKind,
    pub adapter: AdapterPreference,
    pub print_matrices: bool,
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            dim: DIM,
            kernel: KernelKind::default(),
            adapter: AdapterPreference::default(),
            print_matrices: false,
            seed: DEFAULT_SEED,
        }
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(BenchError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

impl BenchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlays `MATBENCH_*` values returned by `lookup` on the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(kernel) = lookup("MATBENCH_KERNEL") {
            config.kernel = kernel.parse()?;
        }
        if let Some(name) = lookup("MATBENCH_ADAPTER") {
            let name = name.trim();
            config.adapter.name = (!name.is_empty()).then(|| name.to_string());
        }
        if let Some(flag) = lookup("MATBENCH_ALLOW_CPU") {
            config.adapter.allow_cpu = parse_flag("MATBENCH_ALLOW_CPU", &flag)?;
        }
        if let Some(flag) = lookup("MATBENCH_PRINT") {
            config.print_matrices = parse_flag("MATBENCH_PRINT", &flag)?;
        }
        if let Some(seed) = lookup("MATBENCH_SEED") {
            config.seed = seed
                .trim()
                .parse()
                .map_err(|_| BenchError::InvalidConfig {
                    key: "MATBENCH_SEED",
                    value: seed.clone(),
                })?;
        }
        log::debug!("Loaded config {:?}", config);
        Ok(config)
    }
}
