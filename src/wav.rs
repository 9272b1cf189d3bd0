use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use crate::byteorder::WriteBytesLe;
use crate::join_bytes_le;
use tcsyncd_macros::{ToBytes, riff_chunk};

pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

pub trait RiffChunk {
    fn chunk_id(&self) -> &[u8; 4];
    fn chunk_data(&self) -> Vec<u8>;

    fn write_all<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let data = self.chunk_data();
        writer.write_all(self.chunk_id())?;
        writer.write_all(&(data.len() as u32).to_le_bytes())?;
        writer.write_all(&data)?;
        // chunks are word aligned
        if data.len() % 2 == 1 {
            writer.write_all(&[0])?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ToBytes)]
#[riff_chunk(b"fmt ")]
pub struct FormatChunk {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatChunk {
    pub fn float32_mono(sample_rate: u32) -> Self {
        Self {
            format_tag: WAVE_FORMAT_IEEE_FLOAT,
            channels: 1,
            sample_rate,
            byte_rate: sample_rate * 4,
            block_align: 4,
            bits_per_sample: 32,
        }
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Headerless sample layouts accepted for piped audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEncoding {
    F32le,
    S16le,
}

impl RawEncoding {
    /// Converts raw little-endian samples to `f32`. A trailing partial sample is ignored.
    pub fn decode(self, bytes: &[u8]) -> Vec<f32> {
        match self {
            RawEncoding::F32le => bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            RawEncoding::S16le => bytes
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
                .collect(),
        }
    }
}

/// Averages interleaved channels into one.
pub fn mix_down(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// RIFF WAVE writer for mono 32-bit float audio
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    format: FormatChunk,
    riff_size_position: u64,
    data_size_position: u64,
    data_written: u64,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(writer: W, sample_rate: u32) -> Self {
        Self {
            writer: BufWriter::new(writer),
            format: FormatChunk::float32_mono(sample_rate),
            riff_size_position: 0,
            data_size_position: 0,
            data_written: 0,
        }
    }

    /// Write RIFF, fmt and data chunk headers; sizes are patched by [`finish`](Self::finish)
    pub fn write_header(&mut self) -> io::Result<()> {
        let start = self.writer.stream_position()?;
        self.riff_size_position = start + 4;
        self.writer.write_all(&join_bytes_le!(b"RIFF", 0u32, b"WAVE"))?;

        self.format.write_all(&mut self.writer)?;

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?;

        Ok(())
    }

    pub fn write_samples(&mut self, samples: &[f32]) -> io::Result<()> {
        let mut buf = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            sample.write_le(&mut buf);
        }
        self.writer.write_all(&buf)?;
        self.data_written += buf.len() as u64;
        Ok(())
    }

    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;

        let end = self.writer.stream_position()?;
        let data_size = u32::try_from(self.data_written)
            .map_err(|_| invalid_data("audio data exceeds 4 GiB".to_string()))?;
        let riff_size = u32::try_from(end - self.riff_size_position - 4)
            .map_err(|_| invalid_data("RIFF size exceeds 4 GiB".to_string()))?;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer.write_all(&data_size.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    pub fn stats(&self) -> WavStats {
        WavStats {
            data_written: self.data_written,
            sample_rate: self.format.sample_rate,
            samples: self.data_written / self.format.block_align as u64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WavStats {
    pub data_written: u64,
    pub sample_rate: u32,
    pub samples: u64,
}

/// Decoded WAV contents, mixed down to mono.
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    pub spec: hound::WavSpec,
    pub samples: Vec<f32>,
}

/// Reads a WAV stream of integer PCM (up to 32 bits) or 32-bit float samples.
pub fn read_wav<R: Read>(reader: R) -> hound::Result<WavAudio> {
    let reader = hound::WavReader::new(reader)?;
    let spec = reader.spec();
    log::debug!(
        "WAV input: {} channels, {} Hz, {} bits {:?}",
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => {
            reader.into_samples::<f32>().collect::<hound::Result<Vec<_>>>()?
        }
        (hound::SampleFormat::Int, bits @ 1..=32) => {
            let scale = (1u64 << (bits - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<hound::Result<Vec<_>>>()?
        }
        _ => return Err(hound::Error::Unsupported),
    };

    Ok(WavAudio {
        spec,
        samples: mix_down(samples, spec.channels.max(1) as usize),
    })
}
