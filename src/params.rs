//! Lock-free gain slots shared between the control context and the audio thread.
//!
//! Every cell is a single `AtomicU32` holding the bit pattern of an `f32`, so a
//! reader can never observe a torn value and neither side ever blocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{Cell, MatrixShape, MixerError, MixerResult};

struct Slots {
    shape: MatrixShape,
    bits: Box<[AtomicU32]>,
}

impl Slots {
    fn new(shape: MatrixShape) -> Self {
        Self {
            shape,
            bits: (0..shape.cells()).map(|_| AtomicU32::new(0.0f32.to_bits())).collect(),
        }
    }

    #[inline]
    fn load(&self, index: usize) -> f32 {
        f32::from_bits(self.bits[index].load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, index: usize, value: f32) {
        self.bits[index].store(value.to_bits(), Ordering::Relaxed);
    }

    fn copy_into(&self, dst: &mut [f32]) {
        assert_eq!(dst.len(), self.bits.len(), "gain buffer length mismatch");
        for (slot, value) in self.bits.iter().zip(dst.iter_mut()) {
            *value = f32::from_bits(slot.load(Ordering::Relaxed));
        }
    }

    fn store_all(&self, values: &[f32]) -> MixerResult<()> {
        if values.len() != self.bits.len() {
            return Err(MixerError::Config(format!(
                "expected {} gains for a {} matrix, got {}",
                self.bits.len(),
                self.shape,
                values.len()
            )));
        }
        for (index, &value) in values.iter().enumerate() {
            self.store(index, value);
        }
        Ok(())
    }
}

/// Target gain per cell. Written by the control surface, read once per block
/// by the engine.
#[derive(Clone)]
pub struct GainParams {
    slots: Arc<Slots>,
}

impl GainParams {
    pub fn new(shape: MatrixShape) -> Self {
        Self {
            slots: Arc::new(Slots::new(shape)),
        }
    }

    pub fn shape(&self) -> MatrixShape {
        self.slots.shape
    }

    pub fn get(&self, index: usize) -> f32 {
        self.slots.load(index)
    }

    pub fn set(&self, index: usize, gain: f32) {
        self.slots.store(index, gain);
    }

    pub fn get_cell(&self, cell: Cell) -> MixerResult<f32> {
        Ok(self.get(self.shape().index(cell)?))
    }

    pub fn set_cell(&self, cell: Cell, gain: f32) -> MixerResult<()> {
        self.set(self.shape().index(cell)?, gain);
        Ok(())
    }

    pub fn set_all(&self, gains: &[f32]) -> MixerResult<()> {
        self.slots.store_all(gains)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.shape().cells()];
        self.snapshot_into(&mut out);
        out
    }

    /// Copies every target into `dst` without allocating.
    pub fn snapshot_into(&self, dst: &mut [f32]) {
        self.slots.copy_into(dst);
    }

    pub fn shares(&self, other: &GainParams) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }
}

/// Applied (smoothed) gain per cell, published by the engine after each block.
#[derive(Clone)]
pub struct AppliedGains {
    slots: Arc<Slots>,
}

impl AppliedGains {
    pub(crate) fn new(shape: MatrixShape) -> Self {
        Self {
            slots: Arc::new(Slots::new(shape)),
        }
    }

    pub fn shape(&self) -> MatrixShape {
        self.slots.shape
    }

    pub fn get(&self, index: usize) -> f32 {
        self.slots.load(index)
    }

    pub fn get_cell(&self, cell: Cell) -> MixerResult<f32> {
        Ok(self.get(self.shape().index(cell)?))
    }

    pub fn snapshot_into(&self, dst: &mut [f32]) {
        self.slots.copy_into(dst);
    }

    pub(crate) fn publish(&self, applied: &[f32]) {
        for (index, &value) in applied.iter().enumerate() {
            self.slots.store(index, value);
        }
    }
}
