// src/utils/system.rs: System functions

use sysinfo::System;


/// Determines number of cores that can be used by external tools
///
/// # Arguments
///
/// * `args_threads` - Thread budget requested on the command line.
///
/// # Returns
///
/// usize: the request, capped to the physical core count (at least 1).
pub fn detect_cores(args_threads: usize) -> usize {
    let physical_cores = System::physical_core_count().unwrap_or(1);
    cap_threads(args_threads, physical_cores)
}

fn cap_threads(requested: usize, physical_cores: usize) -> usize {
    requested.min(physical_cores).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_threads() {
        assert_eq!(cap_threads(64, 8), 8);
        assert_eq!(cap_threads(4, 8), 4);
        assert_eq!(cap_threads(0, 8), 1);
    }

    #[test]
    fn test_detect_cores_positive() {
        assert!(detect_cores(16) >= 1);
    }
}
