use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::capture_ring::CaptureWriter;
use crate::error::AudioError;

/// Largest callback we fold to mono without allocating (frames)
const MAX_CALLBACK_FRAMES: usize = 8192;

/// Live microphone input wired straight into a [`CaptureWriter`]
///
/// The stream is `!Send`; keep it on the thread that opened it.
pub struct InputCapture {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}

impl InputCapture {
    /// Open the default input device, preferring `preferred_rate` when the
    /// device supports it
    pub fn open(writer: CaptureWriter, preferred_rate: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default input device found".to_string(),
            })?;

        log::info!(
            "[Capture] Input device: {}",
            device.name().unwrap_or_default()
        );

        let config = select_config(&device, preferred_rate)?;
        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels = stream_config.channels;
        let sample_rate = stream_config.sample_rate.0;

        if sample_rate != preferred_rate {
            log::warn!(
                "[Capture] Device runs at {} Hz instead of {} Hz; pitch lanes will be offset",
                sample_rate,
                preferred_rate
            );
        }

        let err_fn = |err| tracing::error!("[Capture] Input stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let mut fold = MonoFold::new(writer, channels as usize);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| fold.push(data, |s| s),
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let mut fold = MonoFold::new(writer, channels as usize);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        fold.push(data, |s| s as f32 / i16::MAX as f32)
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })?;

        Ok(Self {
            stream,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Stop delivering audio; dropping the capture releases the writer
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream.pause().map_err(|e| AudioError::HardwareError {
            details: format!("Input pause failed: {}", e),
        })
    }
}

fn select_config(
    device: &cpal::Device,
    preferred_rate: u32,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to query input configs: {:?}", e),
        })?;

    for range in ranges {
        let supported_format = matches!(
            range.sample_format(),
            cpal::SampleFormat::F32 | cpal::SampleFormat::I16
        );
        if supported_format
            && range.min_sample_rate().0 <= preferred_rate
            && range.max_sample_rate().0 >= preferred_rate
        {
            return Ok(range.with_sample_rate(cpal::SampleRate(preferred_rate)));
        }
    }

    device
        .default_input_config()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to get default input config: {:?}", e),
        })
}

/// Folds interleaved callback data to the first channel using a scratch
/// buffer allocated once, before the stream starts
struct MonoFold {
    writer: CaptureWriter,
    channels: usize,
    scratch: Vec<f32>,
}

impl MonoFold {
    fn new(writer: CaptureWriter, channels: usize) -> Self {
        Self {
            writer,
            channels: channels.max(1),
            scratch: vec![0.0; MAX_CALLBACK_FRAMES],
        }
    }

    fn push<T: Copy>(&mut self, data: &[T], convert: impl Fn(T) -> f32) {
        for block in data.chunks(self.channels * MAX_CALLBACK_FRAMES) {
            let mut frames = 0;
            for (slot, frame) in self.scratch.iter_mut().zip(block.chunks(self.channels)) {
                *slot = convert(frame[0]);
                frames += 1;
            }
            self.writer.append(&self.scratch[..frames]);
        }
    }
}
