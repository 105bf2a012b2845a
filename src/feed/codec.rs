//! Frame decoding and buffer replacement

use super::FeedError;
use crate::buffer::{FeedStores, SampleBuffer, SpectrogramFrame, SpectrogramMatrix};
use crate::protocol::FeedMessage;
use tracing::{debug, trace};

/// Which store a frame replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Waveform,
    Spectrogram,
    /// Decoded fine but carries a type the renderers don't use
    Ignored,
}

/// Decode one text frame
pub fn decode_message(text: &str) -> Result<FeedMessage, FeedError> {
    let message: FeedMessage = serde_json::from_str(text.trim())?;
    Ok(message)
}

/// Decode, validate and publish a text frame.
///
/// The new buffer is built completely before it is swapped in, so on any
/// error the stores keep their previous snapshot.
pub fn apply_text(text: &str, stores: &FeedStores) -> Result<Applied, FeedError> {
    let message = decode_message(text)?;
    trace!(kind = message.kind(), bytes = text.len(), "Feed message");

    match message {
        FeedMessage::WaveformUpdate { waveform, source } => {
            let buffer = SampleBuffer::new(waveform.samples, waveform.values)?.stamped();

            if let Some((min, max, mean)) = buffer.value_stats() {
                debug!(
                    samples = buffer.len(),
                    min,
                    max,
                    mean,
                    file = source.as_ref().map(|s| s.file.as_str()),
                    "Waveform update"
                );
            }

            stores.waveform.publish(buffer);
            Ok(Applied::Waveform)
        }
        FeedMessage::SpectrogramUpdate {
            spectrogram,
            spectrogram_meta,
            ..
        } => {
            let matrix = SpectrogramMatrix::new(spectrogram)?;
            let (frequencies, times) = match spectrogram_meta {
                Some(meta) => (meta.frequencies, meta.times),
                None => previous_axes(&stores.spectrogram.latest(), &matrix),
            };
            let frame = SpectrogramFrame::new(matrix, frequencies, times)?.stamped();

            debug!(
                rows = frame.matrix.rows(),
                cols = frame.matrix.cols(),
                "Spectrogram update"
            );

            stores.spectrogram.publish(frame);
            Ok(Applied::Spectrogram)
        }
        FeedMessage::Unknown => {
            debug!("Ignoring feed message of unknown type");
            Ok(Applied::Ignored)
        }
    }
}

/// Axes of the previous frame, each kept only while it still fits the new shape
fn previous_axes(previous: &SpectrogramFrame, matrix: &SpectrogramMatrix) -> (Vec<f64>, Vec<f64>) {
    let frequencies = if previous.frequencies.len() == matrix.rows() {
        previous.frequencies.clone()
    } else {
        Vec::new()
    };
    let times = if previous.times.len() == matrix.cols() {
        previous.times.clone()
    } else {
        Vec::new()
    };
    (frequencies, times)
}
