//! Technique and kernel registry
//!
//! Maps a `(stage, name)` pair to the capability set it needs, how its
//! output is applied or which device it requires, and the unit that
//! actually runs. Names missing from the table are still runnable: they
//! resolve to an external program of the same name under the `basic`
//! capability set.

use std::fmt;

use log::{info, warn};

use crate::matrix::ReorderType;

/// Pipeline stage a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Reorder,
    Multiply,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Reorder => "reorder",
            Stage::Multiply => "multiply",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named environment a unit needs to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilitySet {
    #[default]
    Basic,
    PythonScipy,
    PythonGraphblas,
    CudaCusparse,
    Metis,
}

impl CapabilitySet {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilitySet::Basic => "basic",
            CapabilitySet::PythonScipy => "python_scipy",
            CapabilitySet::PythonGraphblas => "python_graphblas",
            CapabilitySet::CudaCusparse => "cuda_cusparse",
            CapabilitySet::Metis => "metis",
        }
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device requirements of a multiply kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    /// Runs on the host; never probes
    CpuOnly,
    /// Needs a usable cuSPARSE device; fails fast without one
    GpuOnly,
    /// Prefers the device, falls back to a CPU builtin
    DualPath,
}

/// Units implemented inside the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Identity,
    Rcm,
    Mock,
    CpuSpmv,
    CpuSpmm,
}

/// What runs when a stage executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Builtin(Builtin),
    /// Program name resolved under the programs root for the stage
    External { program: String },
}

/// One row of the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub stage: Stage,
    pub name: String,
    pub capability_set: CapabilitySet,
    /// How a technique's permutation is applied (reorder entries only)
    pub reorder_type: Option<ReorderType>,
    /// Device requirement (multiply entries only)
    pub kernel_kind: Option<KernelKind>,
    pub unit: Unit,
    /// CPU unit used by a dual-path kernel when the device is unusable
    pub cpu_fallback: Option<Builtin>,
}

impl RegistryEntry {
    pub fn technique(
        name: &str,
        capability_set: CapabilitySet,
        reorder_type: ReorderType,
        unit: Unit,
    ) -> Self {
        Self {
            stage: Stage::Reorder,
            name: name.to_string(),
            capability_set,
            reorder_type: Some(reorder_type),
            kernel_kind: None,
            unit,
            cpu_fallback: None,
        }
    }

    pub fn kernel(name: &str, capability_set: CapabilitySet, kind: KernelKind, unit: Unit) -> Self {
        Self {
            stage: Stage::Multiply,
            name: name.to_string(),
            capability_set,
            reorder_type: None,
            kernel_kind: Some(kind),
            unit,
            cpu_fallback: None,
        }
    }

    pub fn with_cpu_fallback(mut self, fallback: Builtin) -> Self {
        self.cpu_fallback = Some(fallback);
        self
    }

    /// Entry synthesized for a name the registry does not know
    fn fallback(stage: Stage, name: &str) -> Self {
        let unit = Unit::External {
            program: name.to_string(),
        };
        match stage {
            Stage::Reorder => {
                Self::technique(name, CapabilitySet::Basic, ReorderType::OneD, unit)
            }
            Stage::Multiply => Self::kernel(name, CapabilitySet::Basic, KernelKind::CpuOnly, unit),
        }
    }

    pub fn reorder_type(&self) -> ReorderType {
        self.reorder_type.unwrap_or(ReorderType::OneD)
    }

    pub fn kernel_kind(&self) -> KernelKind {
        self.kernel_kind.unwrap_or(KernelKind::CpuOnly)
    }
}

fn external(program: &str) -> Unit {
    Unit::External {
        program: program.to_string(),
    }
}

/// Lookup table of known techniques and kernels
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        use CapabilitySet::*;
        use KernelKind::*;
        use ReorderType::*;

        let entries = vec![
            // Reordering techniques
            RegistryEntry::technique("identity", Basic, OneD, Unit::Builtin(Builtin::Identity)),
            RegistryEntry::technique("rcm", PythonScipy, TwoD, Unit::Builtin(Builtin::Rcm)),
            RegistryEntry::technique("amd", PythonScipy, TwoD, external("amd")),
            RegistryEntry::technique("rcm_graphblas", PythonGraphblas, TwoD, external("rcm_graphblas")),
            RegistryEntry::technique("metis", Metis, TwoD, external("metis")),
            // Multiplication kernels
            RegistryEntry::kernel("mock", Basic, CpuOnly, Unit::Builtin(Builtin::Mock)),
            RegistryEntry::kernel("cpu_spmv", Basic, CpuOnly, Unit::Builtin(Builtin::CpuSpmv)),
            RegistryEntry::kernel("cpu_spmm", Basic, CpuOnly, Unit::Builtin(Builtin::CpuSpmm)),
            RegistryEntry::kernel("cucsrspmv", CudaCusparse, GpuOnly, external("cucsrspmv")),
            RegistryEntry::kernel("cucsrspmm", CudaCusparse, GpuOnly, external("cucsrspmm")),
            RegistryEntry::kernel("cucbrspmv", CudaCusparse, GpuOnly, external("cucbrspmv")),
            RegistryEntry::kernel("cucbrspmm", CudaCusparse, GpuOnly, external("cucbrspmm")),
            RegistryEntry::kernel("csrcusparse", CudaCusparse, DualPath, external("csrcusparse"))
                .with_cpu_fallback(Builtin::CpuSpmv),
        ];
        Self { entries }
    }
}

impl Registry {
    pub fn lookup(&self, stage: Stage, name: &str) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|e| e.stage == stage && e.name == name)
    }

    /// Resolve a name, falling back to an external `basic` unit on a miss
    pub fn resolve(&self, stage: Stage, name: &str) -> RegistryEntry {
        let entry = match self.lookup(stage, name) {
            Some(entry) => entry.clone(),
            None => {
                warn!(
                    "No registry entry for {} '{}', using the basic module set",
                    stage, name
                );
                RegistryEntry::fallback(stage, name)
            }
        };
        info!(
            "Loading module set: {} for technique {}",
            entry.capability_set, name
        );
        entry
    }
}
