use assert_no_alloc::assert_no_alloc;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};

use crate::{AppliedGains, GainParams, MatrixMixer, MixerError, MixerResult};

/// Largest block handed to the mixer per callback step. Device buffers bigger
/// than this are split.
pub const LIVE_BLOCK: usize = 4096;

fn audio_error(e: impl std::fmt::Display) -> MixerError {
    MixerError::Audio(e.to_string())
}

/// The default output device and its preferred stream config.
pub struct LivePlayer {
    device: Device,
    config: StreamConfig,
}

/// A running stream. Audio stops when this is dropped.
pub struct LiveStream {
    stream: Stream,
    params: GainParams,
    applied: AppliedGains,
}

impl LiveStream {
    /// Target slots the audio callback reads from.
    pub fn params(&self) -> &GainParams {
        &self.params
    }

    pub fn applied_gains(&self) -> AppliedGains {
        self.applied.clone()
    }

    pub fn pause(&self) -> MixerResult<()> {
        self.stream.pause().map_err(audio_error)
    }

    pub fn resume(&self) -> MixerResult<()> {
        self.stream.play().map_err(audio_error)
    }
}

impl LivePlayer {
    pub fn new() -> MixerResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MixerError::Audio("No output device available".into()))?;
        let config = device.default_output_config().map_err(audio_error)?.into();
        Ok(LivePlayer { device, config })
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate.0 as f64
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    /// Starts mixing to the device. `sources` fills one buffer per matrix input
    /// each block; mixer output `c` goes to device channel `c` and device
    /// channels past the matrix outputs stay silent.
    ///
    /// The mixer is reconfigured to the device rate. `sources` runs on the
    /// audio thread and must not allocate.
    pub fn start(
        &self,
        mut mixer: MatrixMixer,
        mut sources: impl FnMut(&mut [Vec<f32>]) + Send + 'static,
    ) -> MixerResult<LiveStream> {
        mixer.configure(self.sample_rate())?;
        let shape = mixer.shape();
        let params = mixer.params();
        let applied = mixer.applied_gains();
        let channels = self.channels();

        let mut inputs: Vec<Vec<f32>> = (0..shape.inputs)
            .map(|_| Vec::with_capacity(LIVE_BLOCK))
            .collect();
        let mut outputs: Vec<Vec<f32>> = (0..shape.outputs)
            .map(|_| Vec::with_capacity(LIVE_BLOCK))
            .collect();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    assert_no_alloc(|| {
                        for block in data.chunks_mut(LIVE_BLOCK * channels) {
                            let frames = block.len() / channels;
                            for buffer in inputs.iter_mut().chain(outputs.iter_mut()) {
                                buffer.resize(frames, 0.0);
                            }
                            sources(&mut inputs);
                            mixer.run(&inputs, &mut outputs);
                            interleave(&outputs, block, channels);
                        }
                    })
                },
                |err| log::error!("Audio stream error: {err}"),
                None,
            )
            .map_err(audio_error)?;

        stream.play().map_err(audio_error)?;
        log::info!(
            "Playing {shape} matrix on {} channels at {} Hz",
            channels,
            self.config.sample_rate.0
        );

        Ok(LiveStream {
            stream,
            params,
            applied,
        })
    }
}

fn interleave(outputs: &[Vec<f32>], block: &mut [f32], channels: usize) {
    for (frame_index, frame) in block.chunks_mut(channels).enumerate() {
        for (channel, sample) in frame.iter_mut().enumerate() {
            *sample = outputs
                .get(channel)
                .map_or(0.0, |output| output[frame_index].clamp(-1., 1.));
        }
    }
}

/// Plays until the process is killed.
pub fn play_live(
    mixer: MatrixMixer,
    sources: impl FnMut(&mut [Vec<f32>]) + Send + 'static,
) -> MixerResult<()> {
    let player = LivePlayer::new()?;
    let _stream = player.start(mixer, sources)?;

    log::info!("Playing live audio... Press Ctrl+C to stop");
    loop {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
}
