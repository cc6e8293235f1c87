use std::f64::consts::LN_2;
use std::fmt;

use crate::{Cell, GainEvent, GainParams, MatrixShape, MixerResult};

/// Dial position of unity gain, `(144 / 150)^8`.
pub const UNITY_POSITION: f32 = 0.721_389_6;

/// Finest dial increment: 192 steps from silence up to unity.
pub const POSITION_STEP: f32 = UNITY_POSITION / 192.0;

/// Maps a dial position in `0..=1` to a linear gain, from silence up to +6 dB.
/// The sign of `position` is ignored.
pub fn position_to_gain(position: f32) -> f32 {
    if position == 0.0 {
        return 0.0;
    }
    let p = position.abs() as f64;
    ((p.powf(0.125) * 150.0 - 144.0) * LN_2 / 6.0).exp() as f32
}

/// Inverse of [`position_to_gain`]. The sign of `gain` is ignored; gains below
/// the dial's floor (about -144 dB) map to position 0.
pub fn gain_to_position(gain: f32) -> f32 {
    if gain == 0.0 {
        return 0.0;
    }
    let base = (6.0 * (gain.abs() as f64).ln() / LN_2 + 144.0) / 150.0;
    base.max(0.0).powf(8.0) as f32
}

pub fn position_to_db(position: f32) -> f32 {
    20.0 * position_to_gain(position).log10()
}

pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// One matrix dial: magnitude position plus a polarity-inversion flag.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Knob {
    pub position: f32,
    pub inverted: bool,
}

impl Knob {
    pub fn new(position: f32, inverted: bool) -> Self {
        Self {
            position: position.clamp(0.0, 1.0),
            inverted,
        }
    }

    pub fn unity() -> Self {
        Self::new(UNITY_POSITION, false)
    }

    /// Reads a signed linear gain back into dial form; negative means inverted.
    pub fn from_gain(gain: f32) -> Self {
        Self::new(gain_to_position(gain), gain.is_sign_negative() && gain != 0.0)
    }

    /// Signed gain the engine consumes.
    pub fn gain(&self) -> f32 {
        let gain = position_to_gain(self.position);
        if self.inverted { -gain } else { gain }
    }

    pub fn db(&self) -> f32 {
        position_to_db(self.position)
    }
}

impl fmt::Display for Knob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            write!(f, "\u{00D8}")?;
        }
        // unity lands a few ulps either side of 0 dB; don't print "-0.0"
        let db = self.db();
        let db = if db.abs() < 0.05 { 0.0 } else { db };
        write!(f, "{:+4.1}dB", db)
    }
}

/// Holds one [`Knob`] per cell and publishes their gains as engine targets.
pub struct ControlSurface {
    params: GainParams,
    knobs: Vec<Knob>,
    /// Last applied gain reported back by the engine, per cell.
    readouts: Vec<f32>,
}

impl ControlSurface {
    /// Adopts whatever targets `params` currently holds.
    pub fn new(params: GainParams) -> Self {
        let mut surface = Self {
            knobs: vec![Knob::default(); params.shape().cells()],
            readouts: vec![0.0; params.shape().cells()],
            params,
        };
        surface.sync_from_params();
        surface
    }

    /// Starts from the default layout: unity on the diagonal, silence elsewhere.
    pub fn with_defaults(params: GainParams) -> Self {
        let mut surface = Self::new(params);
        surface.reset_to_defaults();
        surface
    }

    pub fn shape(&self) -> MatrixShape {
        self.params.shape()
    }

    pub fn params(&self) -> &GainParams {
        &self.params
    }

    pub fn knobs(&self) -> &[Knob] {
        &self.knobs
    }

    pub fn knob(&self, cell: Cell) -> MixerResult<Knob> {
        Ok(self.knobs[self.shape().index(cell)?])
    }

    pub fn set_knob(&mut self, cell: Cell, knob: Knob) -> MixerResult<f32> {
        let index = self.shape().index(cell)?;
        Ok(self.write(index, knob))
    }

    pub fn set_position(&mut self, cell: Cell, position: f32) -> MixerResult<f32> {
        let index = self.shape().index(cell)?;
        let inverted = self.knobs[index].inverted;
        Ok(self.write(index, Knob::new(position, inverted)))
    }

    pub fn set_inverted(&mut self, cell: Cell, inverted: bool) -> MixerResult<f32> {
        let index = self.shape().index(cell)?;
        let position = self.knobs[index].position;
        Ok(self.write(index, Knob::new(position, inverted)))
    }

    /// Sets a signed linear gain, clamped to the dial range.
    pub fn set_gain(&mut self, cell: Cell, gain: f32) -> MixerResult<f32> {
        let index = self.shape().index(cell)?;
        Ok(self.write(index, Knob::from_gain(gain)))
    }

    pub fn set_db(&mut self, cell: Cell, db: f32) -> MixerResult<f32> {
        let index = self.shape().index(cell)?;
        let inverted = self.knobs[index].inverted;
        let position = gain_to_position(db_to_gain(db));
        Ok(self.write(index, Knob::new(position, inverted)))
    }

    /// Moves the dial by whole [`POSITION_STEP`]s.
    pub fn nudge(&mut self, cell: Cell, steps: i32) -> MixerResult<f32> {
        let index = self.shape().index(cell)?;
        let knob = self.knobs[index];
        let position = knob.position + steps as f32 * POSITION_STEP;
        Ok(self.write(index, Knob::new(position, knob.inverted)))
    }

    /// Exclusively routes `cell.input` to `cell.output`: the cell goes to unity
    /// and every other cell in its row to silence. Applied to a cell that is
    /// already open, it silences the whole row instead.
    pub fn solo_route(&mut self, cell: Cell) -> MixerResult<()> {
        let target = self.shape().index(cell)?;
        let open = self.knobs[target].position != 0.0;
        for index in self.shape().row(cell.input) {
            let position = if index == target && !open {
                UNITY_POSITION
            } else {
                0.0
            };
            // dial values only; each cell keeps its polarity
            let inverted = self.knobs[index].inverted;
            self.write(index, Knob::new(position, inverted));
        }
        log::debug!("solo route {cell} ({})", if open { "cleared" } else { "set" });
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        let shape = self.shape();
        for index in 0..shape.cells() {
            let knob = if shape.is_diagonal(index) {
                Knob::unity()
            } else {
                Knob::default()
            };
            self.write(index, knob);
        }
    }

    /// Re-reads every knob from the target slots, for when another writer
    /// (a config or snapshot load) changed them.
    pub fn sync_from_params(&mut self) {
        for (index, knob) in self.knobs.iter_mut().enumerate() {
            *knob = Knob::from_gain(self.params.get(index));
        }
    }

    /// Records an applied-gain echo. Targets are left alone.
    pub fn apply_feedback(&mut self, event: &GainEvent) -> MixerResult<()> {
        let index = self.shape().index(event.cell)?;
        self.readouts[index] = event.value;
        Ok(())
    }

    /// What the engine is actually applying at `cell`, as a dial.
    pub fn readout(&self, cell: Cell) -> MixerResult<Knob> {
        Ok(Knob::from_gain(self.readouts[self.shape().index(cell)?]))
    }

    fn write(&mut self, index: usize, knob: Knob) -> f32 {
        let gain = knob.gain();
        self.knobs[index] = knob;
        self.params.set(index, gain);
        gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(inputs: usize, outputs: usize) -> ControlSurface {
        ControlSurface::new(GainParams::new(MatrixShape::new(inputs, outputs).unwrap()))
    }

    #[test]
    fn test_mapping_endpoints() {
        assert_eq!(position_to_gain(0.0), 0.0);
        assert_eq!(gain_to_position(0.0), 0.0);
        assert!((position_to_gain(1.0) - 2.0).abs() < 1e-6);
        assert!((position_to_gain(UNITY_POSITION) - 1.0).abs() < 1e-6);
        assert!((gain_to_position(1.0) - UNITY_POSITION).abs() < 1e-7);
    }

    #[test]
    fn test_mapping_round_trip() {
        for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let back = gain_to_position(position_to_gain(p));
            assert!((back - p).abs() < 1e-5, "{p} came back as {back}");
        }
        assert_eq!(gain_to_position(position_to_gain(0.0)), 0.0);
    }

    #[test]
    fn test_mapping_ignores_sign() {
        assert_eq!(position_to_gain(-0.5), position_to_gain(0.5));
        assert_eq!(gain_to_position(-0.5), gain_to_position(0.5));
    }

    #[test]
    fn test_mapping_floor() {
        assert_eq!(gain_to_position(1e-9), 0.0);
    }

    #[test]
    fn test_db_readout() {
        assert!(position_to_db(UNITY_POSITION).abs() < 1e-4);
        assert!((position_to_db(1.0) - 6.0206).abs() < 1e-3);
        assert_eq!(position_to_db(0.0), f32::NEG_INFINITY);
        assert!((db_to_gain(-6.0206) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_knob_inversion_negates_gain() {
        let knob = Knob::new(UNITY_POSITION, true);
        assert!((knob.gain() + 1.0).abs() < 1e-6);

        let back = Knob::from_gain(-0.5);
        assert!(back.inverted);
        assert!((back.gain() + 0.5).abs() < 1e-6);
        assert!(!Knob::from_gain(0.0).inverted);
        assert!(!Knob::from_gain(-0.0).inverted);
    }

    #[test]
    fn test_knob_annotation() {
        assert_eq!(Knob::unity().to_string(), "+0.0dB");
        assert_eq!(Knob::new(1.0, true).to_string(), "\u{00D8}+6.0dB");
        assert_eq!(Knob::from_gain(0.5).to_string(), "-6.0dB");
    }

    #[test]
    fn test_new_adopts_existing_targets() {
        let params = GainParams::new(MatrixShape::new(1, 2).unwrap());
        params.set_all(&[-1.0, 0.0]).unwrap();
        let s = ControlSurface::new(params);
        let knob = s.knob(Cell::new(0, 0)).unwrap();
        assert!(knob.inverted);
        assert!((knob.position - UNITY_POSITION).abs() < 1e-6);
    }

    #[test]
    fn test_defaults_are_identity() {
        let s = ControlSurface::with_defaults(GainParams::new(MatrixShape::new(2, 3).unwrap()));
        let gains = s.params().to_vec();
        let expected = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        for (g, e) in gains.iter().zip(expected) {
            assert!((g - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_set_inverted_writes_negated_target() {
        let mut s = surface(2, 2);
        s.set_position(Cell::new(1, 0), UNITY_POSITION).unwrap();
        s.set_inverted(Cell::new(1, 0), true).unwrap();
        assert!((s.params().get(2) + 1.0).abs() < 1e-6);
        s.set_inverted(Cell::new(1, 0), false).unwrap();
        assert!((s.params().get(2) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_position_clamps() {
        let mut s = surface(1, 1);
        let gain = s.set_position(Cell::new(0, 0), 3.0).unwrap();
        assert!((gain - 2.0).abs() < 1e-6);
        assert_eq!(s.set_position(Cell::new(0, 0), -1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_set_db_and_gain() {
        let mut s = surface(1, 1);
        let gain = s.set_db(Cell::new(0, 0), -6.0).unwrap();
        assert!((gain - db_to_gain(-6.0)).abs() < 1e-5);
        let gain = s.set_gain(Cell::new(0, 0), -0.25).unwrap();
        assert!((gain + 0.25).abs() < 1e-6);
        assert!(s.knob(Cell::new(0, 0)).unwrap().inverted);
    }

    #[test]
    fn test_nudge_moves_by_steps() {
        let mut s = surface(1, 1);
        s.nudge(Cell::new(0, 0), 192).unwrap();
        let knob = s.knob(Cell::new(0, 0)).unwrap();
        assert!((knob.position - UNITY_POSITION).abs() < 1e-5);
        s.nudge(Cell::new(0, 0), -1000).unwrap();
        assert_eq!(s.knob(Cell::new(0, 0)).unwrap().position, 0.0);
    }

    #[test]
    fn test_solo_route_is_exclusive_per_row() {
        let mut s = surface(2, 3);
        for index in 0..6 {
            s.params().set(index, 0.5);
        }
        s.sync_from_params();
        s.set_position(Cell::new(0, 1), 0.0).unwrap();

        s.solo_route(Cell::new(0, 1)).unwrap();
        let gains = s.params().to_vec();
        assert_eq!(gains[0], 0.0);
        assert!((gains[1] - 1.0).abs() < 1e-6);
        assert_eq!(gains[2], 0.0);
        assert!(gains[3..].iter().all(|&g| (g - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_solo_route_on_open_cell_clears_row() {
        let mut s = surface(1, 2);
        s.solo_route(Cell::new(0, 0)).unwrap();
        s.solo_route(Cell::new(0, 0)).unwrap();
        assert_eq!(s.params().to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_solo_route_keeps_polarity() {
        let mut s = surface(1, 2);
        s.set_inverted(Cell::new(0, 0), true).unwrap();
        s.set_inverted(Cell::new(0, 1), true).unwrap();
        s.set_position(Cell::new(0, 1), 0.5).unwrap();

        s.solo_route(Cell::new(0, 0)).unwrap();
        assert!((s.params().get(0) + 1.0).abs() < 1e-6);
        assert_eq!(s.params().get(1), 0.0);
        assert!(s.knob(Cell::new(0, 0)).unwrap().inverted);
        assert!(s.knob(Cell::new(0, 1)).unwrap().inverted);

        s.solo_route(Cell::new(0, 1)).unwrap();
        assert_eq!(s.params().get(0), 0.0);
        assert!((s.params().get(1) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_feedback_updates_readout_only() {
        let mut s = surface(2, 2);
        s.set_position(Cell::new(0, 0), UNITY_POSITION).unwrap();
        assert_eq!(s.readout(Cell::new(0, 0)).unwrap().position, 0.0);

        let event = GainEvent {
            cell: Cell::new(0, 0),
            value: 0.5,
        };
        s.apply_feedback(&event).unwrap();
        let readout = s.readout(Cell::new(0, 0)).unwrap();
        assert_eq!(readout.to_string(), "-6.0dB");
        assert!((s.params().get(0) - 1.0).abs() < 1e-6);

        let stray = GainEvent {
            cell: Cell::new(3, 0),
            value: 1.0,
        };
        assert!(s.apply_feedback(&stray).is_err());
    }

    #[test]
    fn test_out_of_range_cell_is_error() {
        let mut s = surface(2, 2);
        assert!(s.set_position(Cell::new(2, 0), 0.5).is_err());
        assert!(s.solo_route(Cell::new(0, 5)).is_err());
    }
}
