//! Accelerated matching backend via blocked dense matrix multiply.
//!
//! When a CUDA or Metal device is present, similarity search reduces to
//! `block x dim` by `dim x n` matmuls followed by a row-wise max/argmax,
//! streamed back block by block through a callback. The engine treats
//! any failure or incomplete run as a signal to discard everything and
//! redo the work on the fallback path; nothing here is merged partially.

use crate::config::ACCEL_BLOCK_ROWS;
use crate::embedding::EmbeddingMatrix;
use candle_core::{Device, Tensor, D};
use tracing::{debug, info};

/// Blocked-matmul similarity backend bound to one accelerated device.
pub(crate) struct AcceleratedBackend {
    device: Device,
}

impl AcceleratedBackend {
    /// Binds to the first available accelerated device, or returns
    /// `None` when only the CPU is present (the fallback path is the
    /// better brute-force engine there).
    pub(crate) fn try_new() -> Option<Self> {
        if let Ok(device) = Device::new_cuda(0) {
            info!("matching engine using CUDA device");
            return Some(Self { device });
        }
        if let Ok(device) = Device::new_metal(0) {
            info!("matching engine using Metal device");
            return Some(Self { device });
        }
        debug!("no accelerated device available for matching");
        None
    }

    /// Computes `(max_similarity, argmax_index)` for every `from` row
    /// against all of `to`, invoking `on_block(start_row, sims, args)`
    /// once per block of rows.
    pub(crate) fn match_direction(
        &self,
        from: &EmbeddingMatrix,
        to: &EmbeddingMatrix,
        mut on_block: impl FnMut(usize, &[f32], &[u32]),
    ) -> Result<(), candle_core::Error> {
        if from.rows() == 0 || to.rows() == 0 {
            return Ok(());
        }
        let dim = from.dim();
        let to_t = Tensor::from_slice(to.data(), (to.rows(), dim), &self.device)?.t()?;

        let mut start = 0;
        while start < from.rows() {
            let rows = ACCEL_BLOCK_ROWS.min(from.rows() - start);
            let block = &from.data()[start * dim..(start + rows) * dim];
            let queries = Tensor::from_slice(block, (rows, dim), &self.device)?;
            let sims = queries.matmul(&to_t)?;
            let maxes = sims.max(D::Minus1)?.to_vec1::<f32>()?;
            let args = sims.argmax(D::Minus1)?.to_vec1::<u32>()?;
            on_block(start, &maxes, &args);
            start += rows;
        }
        Ok(())
    }
}
