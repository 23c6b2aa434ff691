// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use callmix_core::{AudioFrame, OutputSink, Plane, SampleFormat, SinkError};

// Canonical 44-byte PCM header: RIFF chunk, 16-byte fmt chunk, data chunk header.
const WAV_HEADER_SIZE: u32 = 44;
const WAV_RIFF_SIZE_OFFSET: u64 = 4;
const WAV_DATA_SIZE_OFFSET: u64 = 40;
const WAV_FMT_CHUNK_SIZE: u32 = 16;
const WAV_FORMAT_PCM: u16 = 1;
const WAV_BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u64 = 2;

/// Writes combined output to a 16-bit PCM WAV file.
///
/// The file is created on the first frame, which also fixes the rate and channel
/// count; later frames must match. Sizes in the header are placeholders until
/// [`WavFileSink::finish`] patches them.
#[derive(Debug)]
pub struct WavFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    sample_rate: u32,
    channels: u16,
    samples_written: u64,
}

impl WavFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            sample_rate: 0,
            channels: 0,
            samples_written: 0,
        }
    }

    /// Byte rate and block alignment for the header, if they fit its fields.
    fn rates(sample_rate: u32, channels: u16) -> Option<(u32, u16)> {
        let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
        let block_align = channels.checked_mul(bytes_per_sample)?;
        let byte_rate = u32::try_from(u64::from(sample_rate) * u64::from(block_align)).ok()?;
        Some((byte_rate, block_align))
    }

    fn write_header(
        writer: &mut BufWriter<File>,
        sample_rate: u32,
        channels: u16,
        (byte_rate, block_align): (u32, u16),
    ) -> std::io::Result<()> {
        writer.write_all(b"RIFF")?;
        writer.write_all(&(WAV_HEADER_SIZE - 8).to_le_bytes())?;
        writer.write_all(b"WAVE")?;

        writer.write_all(b"fmt ")?;
        writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
        writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
        writer.write_all(&channels.to_le_bytes())?;
        writer.write_all(&sample_rate.to_le_bytes())?;
        writer.write_all(&byte_rate.to_le_bytes())?;
        writer.write_all(&block_align.to_le_bytes())?;
        writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

        writer.write_all(b"data")?;
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(())
    }

    fn open(&mut self, frame: &AudioFrame) -> Result<&mut BufWriter<File>, SinkError> {
        if self.writer.is_none() {
            let Some(rates) = Self::rates(frame.sample_rate(), frame.channels()) else {
                return Err(SinkError::Rejected(format!(
                    "{} Hz/{}ch does not fit a WAV header",
                    frame.sample_rate(),
                    frame.channels()
                )));
            };
            let mut writer = BufWriter::new(File::create(&self.path)?);
            Self::write_header(&mut writer, frame.sample_rate(), frame.channels(), rates)?;
            self.sample_rate = frame.sample_rate();
            self.channels = frame.channels();
            tracing::debug!(
                path = %self.path.display(),
                sample_rate = self.sample_rate,
                channels = self.channels,
                "Opened WAV output"
            );
            self.writer = Some(writer);
        }
        self.writer.as_mut().ok_or(SinkError::Closed)
    }

    /// Patches the header sizes and flushes the file. Returns the interleaved samples
    /// written. A sink that never received a frame creates no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be rewritten or the flush fails.
    pub fn finish(mut self) -> Result<u64, SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(0);
        };
        let data_size = u32::try_from(self.samples_written * BYTES_PER_SAMPLE).unwrap_or(u32::MAX);
        writer.seek(SeekFrom::Start(WAV_RIFF_SIZE_OFFSET))?;
        writer.write_all(&(WAV_HEADER_SIZE - 8).saturating_add(data_size).to_le_bytes())?;
        writer.seek(SeekFrom::Start(WAV_DATA_SIZE_OFFSET))?;
        writer.write_all(&data_size.to_le_bytes())?;
        writer.flush()?;
        tracing::info!(
            path = %self.path.display(),
            samples = self.samples_written,
            "Finalized WAV output"
        );
        Ok(self.samples_written)
    }
}

impl OutputSink for WavFileSink {
    fn accept(&mut self, frame: &AudioFrame) -> Result<(), SinkError> {
        if frame.format() != SampleFormat::S16 {
            return Err(SinkError::Rejected(format!(
                "WAV output takes interleaved s16, got {}",
                frame.format()
            )));
        }
        if self.writer.is_some()
            && (frame.sample_rate() != self.sample_rate || frame.channels() != self.channels)
        {
            return Err(SinkError::Rejected(format!(
                "format changed from {} Hz/{}ch to {} Hz/{}ch",
                self.sample_rate,
                self.channels,
                frame.sample_rate(),
                frame.channels()
            )));
        }
        let Some(Plane::S16(samples)) = frame.planes().first() else {
            return Err(SinkError::Rejected("frame has no sample data".into()));
        };

        let writer = self.open(frame)?;
        for sample in samples {
            writer.write_all(&sample.to_le_bytes())?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }
}
