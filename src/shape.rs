use std::fmt;

use crate::{MixerError, MixerResult};

/// Number of input rows and output columns of a gain matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatrixShape {
    pub inputs: usize,
    pub outputs: usize,
}

/// One routing coefficient: input row, output column. Both zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub input: usize,
    pub output: usize,
}

impl Cell {
    pub fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }
}

impl MatrixShape {
    pub fn new(inputs: usize, outputs: usize) -> MixerResult<Self> {
        if inputs == 0 || outputs == 0 {
            return Err(MixerError::EmptyMatrix { inputs, outputs });
        }
        Ok(Self { inputs, outputs })
    }

    pub fn cells(&self) -> usize {
        self.inputs * self.outputs
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.input < self.inputs && cell.output < self.outputs
    }

    /// Row-major slot of `cell`.
    pub fn index(&self, cell: Cell) -> MixerResult<usize> {
        if !self.contains(cell) {
            return Err(MixerError::CellOutOfRange { cell, shape: *self });
        }
        Ok(cell.input * self.outputs + cell.output)
    }

    pub fn cell(&self, index: usize) -> Cell {
        Cell {
            input: index / self.outputs,
            output: index % self.outputs,
        }
    }

    pub fn row(&self, input: usize) -> std::ops::Range<usize> {
        let start = input * self.outputs;
        start..start + self.outputs
    }

    pub fn is_diagonal(&self, index: usize) -> bool {
        let cell = self.cell(index);
        cell.input == cell.output
    }

    pub(crate) fn expect(&self, found: MatrixShape) -> MixerResult<()> {
        if *self != found {
            return Err(MixerError::ShapeMismatch {
                expected: *self,
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Display for MatrixShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.inputs, self.outputs)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.input + 1, self.output + 1)
    }
}
