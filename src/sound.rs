use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use log::warn;

/// Level-triggered beeper control. Both calls are idempotent: the timer
/// scheduler re-asserts the current level on every tick.
pub trait Audio {
    fn play_loop(&mut self);
    fn stop(&mut self);
}

/// A single persistent cpal output stream generating a 440 Hz sine, paused
/// whenever the sound timer level is low.
pub struct Sound {
    stream: cpal::Stream,
    playing: bool,
}

impl Sound {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no audio output device available")?;
        let supported = device
            .default_output_config()
            .context("error while querying audio configs")?;
        let config = supported.config();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config)?,
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config)?,
            format => bail!("unsupported sample format {format:?}"),
        };
        stream.pause().context("audio stream does not support pause")?;

        Ok(Self {
            stream,
            playing: false,
        })
    }

    fn build_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let sample_rate = config.sample_rate.0 as f32;
        let channels = config.channels as usize;

        let mut sample_clock = 0f32;
        let mut next_value = move || {
            sample_clock = (sample_clock + 1.0) % sample_rate;
            (sample_clock * 440.0 * 2.0 * std::f32::consts::PI / sample_rate).sin()
        };

        let err_fn = |err| warn!("audio stream error: {err}");

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    Self::write_data(data, channels, &mut next_value)
                },
                err_fn,
                None,
            )
            .context("building audio output stream")?;
        Ok(stream)
    }

    fn write_data<T>(output: &mut [T], channels: usize, next_sample: &mut dyn FnMut() -> f32)
    where
        T: Sample + FromSample<f32>,
    {
        for frame in output.chunks_mut(channels) {
            let value: T = T::from_sample(next_sample());
            for sample in frame.iter_mut() {
                *sample = value;
            }
        }
    }
}

impl Audio for Sound {
    fn play_loop(&mut self) {
        if self.playing {
            return;
        }
        match self.stream.play() {
            Ok(()) => self.playing = true,
            Err(e) => warn!("failed to start beep: {e}"),
        }
    }

    fn stop(&mut self) {
        if !self.playing {
            return;
        }
        match self.stream.pause() {
            Ok(()) => self.playing = false,
            Err(e) => warn!("failed to stop beep: {e}"),
        }
    }
}
