pub mod tracee;
pub mod tracer;

use crate::debugger::error::Error;
use nix::unistd::Pid;
use proc_maps::MapRange;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Load base addresses of code modules (main executable and shared libraries)
/// mapped into a traced process.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ModuleBaseTable {
    bases: HashMap<PathBuf, u64>,
}

impl ModuleBaseTable {
    /// Scan memory regions of a process.
    /// Modules with an executable and readable region are selected, special regions
    /// (`[vdso]`, `[heap]`, ...) and anonymous mappings are ignored.
    /// Module base is the lowest address where any of its regions mapped.
    ///
    /// # Arguments
    ///
    /// * `pid`: process id
    pub fn discover(pid: Pid) -> Result<Self, Error> {
        let maps: Vec<MapRange> = proc_maps::get_process_maps(pid.as_raw())?;

        let regions = maps.iter().filter_map(|map| {
            let file = map.filename()?;
            if file.as_os_str().is_empty() || file.to_string_lossy().starts_with('[') {
                return None;
            }
            Some((file, map.start(), map.is_exec() && map.is_read()))
        });

        Ok(Self::from_regions(regions))
    }

    fn from_regions<'a>(regions: impl Iterator<Item = (&'a Path, usize, bool)>) -> Self {
        let mut lowest: HashMap<&Path, usize> = HashMap::new();
        let mut with_code = HashSet::new();

        for (file, start, is_code) in regions {
            lowest
                .entry(file)
                .and_modify(|addr| *addr = (*addr).min(start))
                .or_insert(start);
            if is_code {
                with_code.insert(file);
            }
        }

        let bases = lowest
            .into_iter()
            .filter(|(file, _)| with_code.contains(file))
            .map(|(file, addr)| (file.to_path_buf(), addr as u64))
            .collect();
        Self { bases }
    }

    /// Return load base of a module.
    ///
    /// # Arguments
    ///
    /// * `module`: absolute path of a module, as in a process memory map
    pub fn base_of(&self, module: &Path) -> Result<u64, Error> {
        self.bases
            .get(module)
            .copied()
            .ok_or_else(|| Error::MappingNotFound(module.to_string_lossy().to_string()))
    }

    /// Return paths of all discovered modules.
    pub fn modules(&self) -> impl Iterator<Item = &Path> {
        self.bases.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}
