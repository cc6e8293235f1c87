use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::{MAX_CHUNK, MatrixMixer, MatrixShape, MixerError, MixerResult};

/// Frames handed to [`MatrixMixer::run`] per call when rendering files.
pub const WAV_BLOCK: usize = 16 * MAX_CHUNK;

/// Reads every sample as `f32` in `-1..1`, still interleaved.
fn read_samples<R: std::io::Read>(reader: WavReader<R>) -> MixerResult<Vec<f32>> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(samples)
}

/// Mixes a WAV file through `mixer` and writes the result as 32-bit float.
///
/// The input must have one channel per matrix input; the output gets one
/// channel per matrix output at the input's sample rate. The mixer is
/// reconfigured to that rate. Returns the number of frames rendered.
pub fn mix_wav(mixer: &mut MatrixMixer, input_path: &Path, output_path: &Path) -> MixerResult<usize> {
    let shape = mixer.shape();
    let reader = WavReader::open(input_path)?;
    let in_spec = reader.spec();
    let channels = in_spec.channels as usize;
    if channels != shape.inputs {
        return Err(MixerError::ShapeMismatch {
            expected: shape,
            found: MatrixShape {
                inputs: channels,
                outputs: shape.outputs,
            },
        });
    }

    let rate = in_spec.sample_rate as f64;
    if rate != mixer.sample_rate() {
        mixer.configure(rate)?;
    }

    let samples = read_samples(reader)?;
    let frames = samples.len() / channels;

    let out_spec = WavSpec {
        channels: shape.outputs as u16,
        sample_rate: in_spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output_path, out_spec)?;

    let mut inputs = vec![vec![0.0f32; WAV_BLOCK]; shape.inputs];
    let mut outputs = vec![vec![0.0f32; WAV_BLOCK]; shape.outputs];

    for block in samples.chunks(WAV_BLOCK * channels) {
        let len = block.len() / channels;
        for (channel, buffer) in inputs.iter_mut().enumerate() {
            buffer.resize(len, 0.0);
            for (frame, sample) in buffer.iter_mut().enumerate() {
                *sample = block[frame * channels + channel];
            }
        }
        for buffer in outputs.iter_mut() {
            buffer.resize(len, 0.0);
        }

        mixer.run(&inputs, &mut outputs);

        for frame in 0..len {
            for output in &outputs {
                writer.write_sample(output[frame])?;
            }
        }
    }

    writer.finalize()?;
    log::info!(
        "Mixed {} frames ({shape}) from {} to {}",
        frames,
        input_path.display(),
        output_path.display()
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("matmix-{}-{name}.wav", std::process::id()))
    }

    fn write_float(path: &Path, channels: u16, samples: &[f32]) {
        let spec = WavSpec {
            channels,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn read_back(path: &Path) -> (WavSpec, Vec<f32>) {
        let reader = WavReader::open(path).unwrap();
        let spec = reader.spec();
        (spec, read_samples(reader).unwrap())
    }

    #[test]
    fn test_mix_stereo_to_mono() {
        let input = temp("stereo-in");
        let output = temp("mono-out");
        let frames = 1000;
        let samples: Vec<f32> = (0..frames).flat_map(|_| [0.25, 0.5]).collect();
        write_float(&input, 2, &samples);

        let mut mixer = MatrixMixer::new(MatrixShape::new(2, 1).unwrap(), 48000.0).unwrap();
        mixer.params().set_all(&[1.0, -0.5]).unwrap();
        mixer.settle();
        assert_eq!(mix_wav(&mut mixer, &input, &output).unwrap(), frames);

        let (spec, mixed) = read_back(&output);
        std::fs::remove_file(&input).unwrap();
        std::fs::remove_file(&output).unwrap();

        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_format, SampleFormat::Float);
        assert_eq!(mixed.len(), frames);
        assert!(mixed.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_int_input_and_rate_follow_file() {
        let input = temp("int-in");
        let output = temp("int-out");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&input, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(i16::MIN / 2).unwrap();
        }
        writer.finalize().unwrap();

        let mut mixer = MatrixMixer::new(MatrixShape::new(1, 2).unwrap(), 48000.0).unwrap();
        mixer.params().set_all(&[1.0, 2.0]).unwrap();
        mixer.settle();
        mix_wav(&mut mixer, &input, &output).unwrap();
        assert_eq!(mixer.sample_rate(), 44100.0);

        let (spec, mixed) = read_back(&output);
        std::fs::remove_file(&input).unwrap();
        std::fs::remove_file(&output).unwrap();

        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.channels, 2);
        assert_eq!(&mixed[..4], &[-0.5, -1.0, -0.5, -1.0]);
    }

    #[test]
    fn test_channel_count_must_match_inputs() {
        let input = temp("mono-in");
        write_float(&input, 1, &[0.0; 8]);
        let mut mixer = MatrixMixer::new(MatrixShape::new(2, 2).unwrap(), 48000.0).unwrap();
        let result = mix_wav(&mut mixer, &input, &temp("unused"));
        std::fs::remove_file(&input).unwrap();
        assert!(matches!(result, Err(MixerError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_input_is_error() {
        let mut mixer = MatrixMixer::new(MatrixShape::new(1, 1).unwrap(), 48000.0).unwrap();
        let result = mix_wav(&mut mixer, &temp("nope"), &temp("nope-out"));
        assert!(result.is_err());
    }
}
