use std::env;
use tracing::{info, warn, error};

/// CPU core allocation for the OCR worker pool.
///
/// OCR passes are CPU-bound, so the pool that runs them is sized from the
/// detected core count unless an explicit override is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuAllocation {
    /// Total available CPU cores detected
    pub total_cores: usize,
    /// Concurrent OCR passes allowed across the whole process
    pub ocr_workers: usize,
}

impl CpuAllocation {
    /// Detect CPU cores and derive the OCR pool size, honouring an override
    pub fn detect_and_allocate(override_workers: Option<usize>) -> Self {
        let total_cores = Self::detect_total_cores();

        match override_workers {
            Some(workers) => Self::from_manual_allocation(total_cores, workers),
            None => Self::from_auto_allocation(total_cores),
        }
    }

    /// Detect the total number of available CPU cores
    fn detect_total_cores() -> usize {
        match std::thread::available_parallelism() {
            Ok(cores) => {
                let count = cores.get();
                info!("Detected {} CPU cores using std::thread::available_parallelism", count);
                count
            }
            Err(e) => {
                warn!("Failed to detect CPU cores with std::thread::available_parallelism: {}", e);

                if let Ok(cores_str) = env::var("DOCEXTRACT_TOTAL_CORES") {
                    match cores_str.parse::<usize>() {
                        Ok(cores) if cores > 0 => {
                            info!("Using {} CPU cores from DOCEXTRACT_TOTAL_CORES", cores);
                            return cores;
                        }
                        _ => {
                            error!("Invalid DOCEXTRACT_TOTAL_CORES value: {}", cores_str);
                        }
                    }
                }

                warn!("Falling back to default of 4 CPU cores");
                4
            }
        }
    }

    /// One OCR worker per core
    pub fn from_auto_allocation(total_cores: usize) -> Self {
        let total_cores = total_cores.max(1);
        Self {
            total_cores,
            ocr_workers: total_cores,
        }
    }

    /// Explicit worker count; oversubscription is allowed but logged
    pub fn from_manual_allocation(total_cores: usize, ocr_workers: usize) -> Self {
        let total_cores = total_cores.max(1);
        let ocr_workers = ocr_workers.max(1);

        if ocr_workers > total_cores {
            warn!(
                "OCR workers ({}) exceed detected cores ({}); passes will contend for CPU",
                ocr_workers, total_cores
            );
        }

        Self {
            total_cores,
            ocr_workers,
        }
    }

    pub fn log_allocation(&self) {
        info!(
            "CPU allocation: {} cores detected, {} concurrent OCR workers",
            self.total_cores, self.ocr_workers
        );
        if self.total_cores <= 2 {
            warn!("Low CPU core count; multi-pass OCR will run mostly sequentially");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_allocation_uses_every_core() {
        let allocation = CpuAllocation::from_auto_allocation(8);
        assert_eq!(allocation.total_cores, 8);
        assert_eq!(allocation.ocr_workers, 8);
    }

    #[test]
    fn test_zero_cores_clamped_to_one_worker() {
        let allocation = CpuAllocation::from_auto_allocation(0);
        assert_eq!(allocation.total_cores, 1);
        assert_eq!(allocation.ocr_workers, 1);
    }

    #[test]
    fn test_manual_allocation_respects_override() {
        let allocation = CpuAllocation::from_manual_allocation(4, 2);
        assert_eq!(allocation.ocr_workers, 2);

        let oversubscribed = CpuAllocation::from_manual_allocation(2, 6);
        assert_eq!(oversubscribed.ocr_workers, 6);

        let zero = CpuAllocation::from_manual_allocation(4, 0);
        assert_eq!(zero.ocr_workers, 1);
    }

    #[test]
    fn test_detect_with_override() {
        let allocation = CpuAllocation::detect_and_allocate(Some(3));
        assert_eq!(allocation.ocr_workers, 3);
        assert!(allocation.total_cores >= 1);
    }
}
