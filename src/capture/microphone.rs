use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use hound::{SampleFormat as HoundSampleFormat, WavSpec, WavWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::backend::{CaptureBackend, CaptureConfig, MediaChunk};
use crate::error::{SessionError, SessionResult};

const WAV_MIME: &str = "audio/wav";

/// Microphone capture via the default cpal input device.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread;
/// the backend talks to it through a stop signal and joins it on `stop`.
/// The clip is flushed as a single WAV chunk when capture ends.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    stop_tx: Option<std_mpsc::Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
    capturing: bool,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stop_tx: None,
            worker: None,
            capturing: false,
        }
    }
}

#[async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> SessionResult<mpsc::Receiver<MediaChunk>> {
        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let config = self.config.clone();

        let worker = thread::spawn(move || capture_worker(config, chunk_tx, ready_tx, stop_rx));

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.worker = Some(worker);
                self.capturing = true;
                Ok(chunk_rx)
            }
            Ok(Err(reason)) => {
                let _ = worker.join();
                Err(SessionError::DeviceUnavailable(reason))
            }
            Err(_) => {
                let _ = worker.join();
                Err(SessionError::DeviceUnavailable(
                    "capture thread exited during startup".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) -> SessionResult<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("microphone capture thread panicked"),
                Err(err) => warn!("failed to join capture thread: {}", err),
            }
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn mime_type(&self) -> &str {
        WAV_MIME
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn capture_worker(
    config: CaptureConfig,
    chunk_tx: mpsc::Sender<MediaChunk>,
    ready_tx: oneshot::Sender<Result<(), String>>,
    stop_rx: std_mpsc::Receiver<()>,
) {
    let (sample_tx, sample_rx) = std_mpsc::channel::<Vec<f32>>();

    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err("no default input device".to_string()));
            return;
        }
    };
    let input_config = match device.default_input_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            let _ = ready_tx.send(Err(format!("failed to read input configuration: {err}")));
            return;
        }
    };
    let stream_config: StreamConfig = input_config.clone().into();
    let sample_format = input_config.sample_format();
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;

    let stream = match build_input_stream(&device, &stream_config, sample_format, sample_tx) {
        Ok(stream) => stream,
        Err(reason) => {
            let _ = ready_tx.send(Err(reason));
            return;
        }
    };
    if let Err(err) = stream.play() {
        let _ = ready_tx.send(Err(format!("failed to start input stream: {err}")));
        return;
    }
    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    info!(
        "capturing from default input device ({} Hz, {} ch)",
        sample_rate, channels
    );

    let mut samples: Vec<f32> = Vec::new();
    loop {
        while let Ok(batch) = sample_rx.try_recv() {
            samples.extend(batch);
        }
        match stop_rx.recv_timeout(Duration::from_millis(20)) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
        }
    }

    // Release the device, then drain whatever the callback produced last.
    drop(stream);
    while let Ok(batch) = sample_rx.try_recv() {
        samples.extend(batch);
    }

    if samples.is_empty() {
        // Nothing captured; the recorder reports EmptyCapture.
        return;
    }

    let fold = config.target_channels == 1 && channels == 2;
    let (samples, channels) = if fold {
        (fold_to_mono(samples), 1)
    } else {
        (samples, channels)
    };
    let (samples, sample_rate) = if channels == 1 {
        downsample(samples, sample_rate, config.target_sample_rate)
    } else {
        (samples, sample_rate)
    };

    match encode_wav(&samples, sample_rate, channels) {
        Ok(wav) => {
            let _ = chunk_tx.blocking_send(MediaChunk { data: wav });
        }
        Err(err) => warn!("failed to encode captured audio: {}", err),
    }
}

fn build_input_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    sender: std_mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream, String> {
    let stream = match sample_format {
        SampleFormat::F32 => {
            let err_fn = move |err| warn!("input stream error: {}", err);
            device.build_input_stream(
                config,
                move |data: &[f32], _| forward_f32(data, &sender),
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let err_fn = move |err| warn!("input stream error: {}", err);
            device.build_input_stream(
                config,
                move |data: &[i16], _| forward_i16(data, &sender),
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let err_fn = move |err| warn!("input stream error: {}", err);
            device.build_input_stream(
                config,
                move |data: &[u16], _| forward_u16(data, &sender),
                err_fn,
                None,
            )
        }
        other => return Err(format!("unsupported input sample format {other:?}")),
    };

    stream.map_err(|err| format!("failed to build input stream: {err}"))
}

fn forward_f32(input: &[f32], sender: &std_mpsc::Sender<Vec<f32>>) {
    let _ = sender.send(input.to_vec());
}

fn forward_i16(input: &[i16], sender: &std_mpsc::Sender<Vec<f32>>) {
    let scale = 1.0 / i16::MAX as f32;
    let buffer: Vec<f32> = input.iter().map(|s| *s as f32 * scale).collect();
    let _ = sender.send(buffer);
}

fn forward_u16(input: &[u16], sender: &std_mpsc::Sender<Vec<f32>>) {
    const MIDPOINT: f32 = 32768.0;
    let buffer: Vec<f32> = input
        .iter()
        .map(|s| (*s as f32 - MIDPOINT) / MIDPOINT)
        .collect();
    let _ = sender.send(buffer);
}

/// Fold interleaved stereo to mono by averaging channel pairs.
fn fold_to_mono(samples: Vec<f32>) -> Vec<f32> {
    samples
        .chunks_exact(2)
        .map(|pair| (pair[0] + pair[1]) * 0.5)
        .collect()
}

/// Downsample by decimation. Only integer ratios are reduced; upsampling is
/// never attempted.
fn downsample(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> (Vec<f32>, u32) {
    if target_rate == 0 || source_rate <= target_rate {
        return (samples, source_rate);
    }
    let ratio = source_rate / target_rate;
    if ratio <= 1 {
        return (samples, source_rate);
    }
    let decimated: Vec<f32> = samples.iter().step_by(ratio as usize).copied().collect();
    (decimated, source_rate / ratio)
}

/// Encode f32 samples in [-1.0, 1.0] as a 16-bit WAV clip.
fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: HoundSampleFormat::Int,
    };
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec)?;
        for &sample in samples {
            let clipped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clipped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(buffer.into_inner())
}
