// Streaming sample rate conversion using rubato
// Converts decoded stereo packets to the device rate as they arrive

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{Error, Result};

const CHUNK_FRAMES: usize = 1024;

/// Feeds variable-sized interleaved packets through a fixed-chunk resampler.
pub struct StreamResampler {
    inner: Option<FastFixedIn<f32>>,
    channels: usize,
    /// Planar input not yet consumed by the resampler
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    /// A pass-through resampler is created when the rates already match.
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        let inner = if input_rate == output_rate {
            None
        } else {
            debug!(
                "Resampling from {}Hz to {}Hz ({} channels)",
                input_rate, output_rate, channels
            );
            let resampler = FastFixedIn::<f32>::new(
                output_rate as f64 / input_rate as f64,
                1.0,
                PolynomialDegree::Septic,
                CHUNK_FRAMES,
                channels,
            )
            .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;
            Some(resampler)
        };

        Ok(Self {
            inner,
            channels,
            pending: vec![Vec::new(); channels],
        })
    }

    /// Push interleaved input, returning whatever interleaved output is ready.
    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(interleaved.to_vec());
        };

        for frame in interleaved.chunks_exact(self.channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                self.pending[ch].push(sample);
            }
        }

        let mut out = Vec::new();
        while self.pending[0].len() >= resampler.input_frames_next() {
            let needed = resampler.input_frames_next();
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|plane| plane.drain(..needed).collect())
                .collect();
            let planar = resampler
                .process(&chunk, None)
                .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
            interleave_into(&planar, &mut out);
        }
        Ok(out)
    }

    /// Drain the tail once the source is exhausted.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending[0].is_empty() {
            return Ok(Vec::new());
        }

        let tail: Vec<Vec<f32>> = self.pending.iter_mut().map(std::mem::take).collect();
        let planar = resampler
            .process_partial(Some(tail.as_slice()), None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        let mut out = Vec::new();
        interleave_into(&planar, &mut out);
        Ok(out)
    }
}

fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    let frames = planar.first().map_or(0, Vec::len);
    out.reserve(frames * planar.len());
    for frame in 0..frames {
        for plane in planar {
            out.push(plane[frame]);
        }
    }
}
