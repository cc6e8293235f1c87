use std::ops::Range;

use crate::{
    AppliedGains, Cell, CellState, GainParams, MatrixShape, MixerError, MixerResult, Smoothing,
};

/// Samples processed with one held gain snapshot.
pub const MAX_CHUNK: usize = 32;

/// Audio buffers for one `process` call.
trait Ports {
    fn frames(&self) -> usize;
    fn input(&self, row: usize, range: Range<usize>) -> &[f32];
    fn write(&mut self, column: usize, offset: usize, data: &[f32]);
}

struct SplitPorts<'a, I, O> {
    frames: usize,
    inputs: &'a [I],
    outputs: &'a mut [O],
}

impl<I: AsRef<[f32]>, O: AsMut<[f32]>> Ports for SplitPorts<'_, I, O> {
    fn frames(&self) -> usize {
        self.frames
    }

    fn input(&self, row: usize, range: Range<usize>) -> &[f32] {
        &self.inputs[row].as_ref()[range]
    }

    fn write(&mut self, column: usize, offset: usize, data: &[f32]) {
        self.outputs[column].as_mut()[offset..offset + data.len()].copy_from_slice(data);
    }
}

/// Input `r` reads `channels[r]`, output `c` overwrites `channels[c]`.
struct SharedPorts<'a, B> {
    frames: usize,
    channels: &'a mut [B],
}

impl<B: AsRef<[f32]> + AsMut<[f32]>> Ports for SharedPorts<'_, B> {
    fn frames(&self) -> usize {
        self.frames
    }

    fn input(&self, row: usize, range: Range<usize>) -> &[f32] {
        &self.channels[row].as_ref()[range]
    }

    fn write(&mut self, column: usize, offset: usize, data: &[f32]) {
        self.channels[column].as_mut()[offset..offset + data.len()].copy_from_slice(data);
    }
}

/// N-input x M-output gain matrix with click-free gain changes.
///
/// Targets come either from the caller (`process`) or from the shared
/// [`GainParams`] slots (`run`), read once at the top of each call. Applied
/// gains move toward them once per [`MAX_CHUNK`] samples and carry over to the
/// next call. Nothing in the processing path allocates, locks or logs.
pub struct MatrixMixer {
    shape: MatrixShape,
    smoothing: Smoothing,
    sample_rate: f64,
    lpf: f32,
    applied: Vec<f32>,
    targets: Vec<f32>,
    staging: Vec<f32>,
    params: GainParams,
    readback: AppliedGains,
}

impl MatrixMixer {
    pub fn new(shape: MatrixShape, sample_rate: f64) -> MixerResult<Self> {
        Self::with_smoothing(shape, sample_rate, Smoothing::default())
    }

    pub fn with_smoothing(
        shape: MatrixShape,
        sample_rate: f64,
        smoothing: Smoothing,
    ) -> MixerResult<Self> {
        // MatrixShape fields are public, so re-check here.
        let shape = MatrixShape::new(shape.inputs, shape.outputs)?;
        let lpf = smoothing.coefficient(sample_rate)?;
        log::debug!("matrix mixer {shape} at {sample_rate} Hz, lpf {lpf}");

        Ok(Self {
            shape,
            smoothing,
            sample_rate,
            lpf,
            applied: vec![0.0; shape.cells()],
            targets: vec![0.0; shape.cells()],
            staging: vec![0.0; shape.outputs * MAX_CHUNK],
            params: GainParams::new(shape),
            readback: AppliedGains::new(shape),
        })
    }

    /// Swaps in externally owned target slots, e.g. ones a control surface already writes.
    pub fn with_params(mut self, params: GainParams) -> MixerResult<Self> {
        self.shape.expect(params.shape())?;
        self.params = params;
        Ok(self)
    }

    /// Recomputes the smoothing coefficient. On error the previous rate stays in effect.
    pub fn configure(&mut self, sample_rate: f64) -> MixerResult<()> {
        self.lpf = self.smoothing.coefficient(sample_rate)?;
        self.sample_rate = sample_rate;
        log::debug!("matrix mixer reconfigured to {sample_rate} Hz, lpf {}", self.lpf);
        Ok(())
    }

    pub fn shape(&self) -> MatrixShape {
        self.shape
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn lpf(&self) -> f32 {
        self.lpf
    }

    pub fn smoothing(&self) -> &Smoothing {
        &self.smoothing
    }

    pub fn params(&self) -> GainParams {
        self.params.clone()
    }

    pub fn applied_gains(&self) -> AppliedGains {
        self.readback.clone()
    }

    pub fn applied(&self) -> &[f32] {
        &self.applied
    }

    pub fn applied_cell(&self, cell: Cell) -> MixerResult<f32> {
        Ok(self.applied[self.shape.index(cell)?])
    }

    /// Compares against the targets of the last processed block, whether they
    /// came from `process` or from the shared slots.
    pub fn cell_state(&self, cell: Cell) -> MixerResult<CellState> {
        let index = self.shape.index(cell)?;
        Ok(CellState::of(self.applied[index], self.targets[index]))
    }

    pub fn is_settled(&self) -> bool {
        self.applied
            .iter()
            .zip(&self.targets)
            .all(|(&applied, &target)| applied == target)
    }

    pub fn preset_applied(&mut self, gains: &[f32]) -> MixerResult<()> {
        if gains.len() != self.applied.len() {
            return Err(MixerError::Config(format!(
                "expected {} applied gains for a {} matrix, got {}",
                self.applied.len(),
                self.shape,
                gains.len()
            )));
        }
        self.applied.copy_from_slice(gains);
        self.readback.publish(&self.applied);
        Ok(())
    }

    /// Jumps every applied gain to the current target slots.
    pub fn settle(&mut self) {
        self.params.snapshot_into(&mut self.targets);
        self.applied.copy_from_slice(&self.targets);
        self.readback.publish(&self.applied);
    }

    pub fn reset(&mut self) {
        self.applied.fill(0.0);
        self.readback.publish(&self.applied);
    }

    /// Mixes `inputs` into `outputs` using the given targets.
    ///
    /// Panics if channel counts, buffer lengths or the target count do not
    /// match the matrix.
    pub fn process<I, O>(&mut self, inputs: &[I], outputs: &mut [O], targets: &[f32])
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>,
    {
        self.load_targets(targets);
        self.process_split(inputs, outputs);
    }

    /// Like [`process`](Self::process) but the inputs and outputs share one set
    /// of buffers. `channels` must hold `max(inputs, outputs)` equally sized buffers.
    pub fn process_in_place<B>(&mut self, channels: &mut [B], targets: &[f32])
    where
        B: AsRef<[f32]> + AsMut<[f32]>,
    {
        self.load_targets(targets);
        self.process_shared(channels);
    }

    /// Mixes with targets read from the shared [`GainParams`].
    pub fn run<I, O>(&mut self, inputs: &[I], outputs: &mut [O])
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>,
    {
        self.params.snapshot_into(&mut self.targets);
        self.process_split(inputs, outputs);
    }

    pub fn run_in_place<B>(&mut self, channels: &mut [B])
    where
        B: AsRef<[f32]> + AsMut<[f32]>,
    {
        self.params.snapshot_into(&mut self.targets);
        self.process_shared(channels);
    }

    fn load_targets(&mut self, targets: &[f32]) {
        assert_eq!(
            targets.len(),
            self.targets.len(),
            "target count does not match a {} matrix",
            self.shape
        );
        self.targets.copy_from_slice(targets);
    }

    fn process_split<I, O>(&mut self, inputs: &[I], outputs: &mut [O])
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>,
    {
        assert_eq!(inputs.len(), self.shape.inputs, "input channel count");
        assert_eq!(outputs.len(), self.shape.outputs, "output channel count");
        let frames = outputs[0].as_mut().len();
        assert!(
            inputs.iter().all(|b| b.as_ref().len() == frames)
                && outputs.iter_mut().all(|b| b.as_mut().len() == frames),
            "channel buffers differ in length"
        );
        self.render(&mut SplitPorts {
            frames,
            inputs,
            outputs,
        });
    }

    fn process_shared<B>(&mut self, channels: &mut [B])
    where
        B: AsRef<[f32]> + AsMut<[f32]>,
    {
        assert_eq!(
            channels.len(),
            self.shape.inputs.max(self.shape.outputs),
            "in-place channel count"
        );
        let frames = channels[0].as_ref().len();
        assert!(
            channels.iter().all(|b| b.as_ref().len() == frames),
            "channel buffers differ in length"
        );
        self.render(&mut SharedPorts { frames, channels });
    }

    fn render(&mut self, ports: &mut impl Ports) {
        let Self {
            shape,
            smoothing,
            lpf,
            applied,
            targets,
            staging,
            readback,
            ..
        } = self;
        let (rows, columns) = (shape.inputs, shape.outputs);
        let frames = ports.frames();

        let mut offset = 0;
        while offset < frames {
            let n = (frames - offset).min(MAX_CHUNK);
            let range = offset..offset + n;

            // Staging is filled completely before any output is written, since
            // an output buffer may also be one of the inputs.
            let input = ports.input(0, range.clone());
            for c in 0..columns {
                let gain = applied[c];
                let buf = &mut staging[c * MAX_CHUNK..c * MAX_CHUNK + n];
                for (out, &x) in buf.iter_mut().zip(input) {
                    *out = x * gain;
                }
            }
            for r in 1..rows {
                let input = ports.input(r, range.clone());
                for c in 0..columns {
                    let gain = applied[r * columns + c];
                    let buf = &mut staging[c * MAX_CHUNK..c * MAX_CHUNK + n];
                    for (out, &x) in buf.iter_mut().zip(input) {
                        *out += x * gain;
                    }
                }
            }

            for c in 0..columns {
                ports.write(c, offset, &staging[c * MAX_CHUNK..c * MAX_CHUNK + n]);
            }

            for (gain, &target) in applied.iter_mut().zip(targets.iter()) {
                *gain = smoothing.step(*gain, target, *lpf);
            }

            offset += n;
        }

        readback.publish(applied);
    }
}
