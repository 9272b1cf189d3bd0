#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! ### Unit Layout
//!
//! One unit occupies one video frame period. The 24 frame index bits are sent
//! MSB-first, followed by the 8 checksum bits MSB-first. Each bit is a tone
//! segment at 60 % of full scale with a 5 % linear fade at both ends.
//!
//! ### Decode Modes
//!
//! - **Strict**: exact unit grid from sample 0, spectral estimator only. For
//!   digitally generated sources.
//! - **Tolerant**: exact grid with spectral, zero-crossing and autocorrelation
//!   estimators, followed by a budgeted sliding search at 1/8 unit steps.
//!
//! Both modes first locate the timecode phase in the cycle and only decode
//! inside it.
//!
//! ## Quick Start
//!
//! 1. Render a calibration cycle with [`process::cycle::CycleGenerator`]
//! 2. Decode captured audio with [`process::decode::AudioDecoder`] and captured
//!    frames with [`process::video::VideoDecoder`]
//! 3. Estimate the offset with [`process::correlate::correlate`]
//!
//! ```rust,no_run
//! use tcsync::process::correlate::{CorrelatorConfig, correlate};
//! use tcsync::process::cycle::CycleGenerator;
//! use tcsync::process::decode::{AudioDecoder, DecoderConfig};
//! use tcsync::process::video::VideoDecoder;
//! use tcsync::process::visual::{PatternLayout, PatternRenderer};
//! use tcsync::process::DecodeMode;
//! use tcsync::structs::detection::{DetectionTrack, StreamKind};
//! use tcsync::structs::format::TimecodeFormat;
//! use tcsync::structs::frequency::FrequencyPlan;
//! use tcsync::structs::layout::CycleLayout;
//!
//! let format = TimecodeFormat::default();
//! let plan = FrequencyPlan::default();
//! let layout = CycleLayout::default();
//!
//! let generator = CycleGenerator::new(format, plan, layout)?;
//! let audio = generator.render_audio(1)?;
//!
//! let decoder = AudioDecoder::new(format, plan, layout, DecoderConfig::new(DecodeMode::Tolerant))?;
//! let audio_outcome = decoder.decode(&audio);
//!
//! let renderer = PatternRenderer::new(PatternLayout::new(720, 576)?);
//! let mut video = VideoDecoder::new(720, 576, format, layout, DecodeMode::Tolerant)?;
//! for frame in 0..generator.frame_count(1) {
//!     video.push_frame(&generator.render_frame(frame, &renderer)?)?;
//! }
//! let video_outcome = video.finish();
//!
//! let correlation = correlate(
//!     &DetectionTrack::new(StreamKind::Video, format.fps(), video_outcome.detections),
//!     &DetectionTrack::new(StreamKind::Audio, format.sample_rate() as f64, audio_outcome.detections),
//!     &CorrelatorConfig::default(),
//! )?;
//! println!("offset {:.4}s", correlation.result.mean_offset);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Encoding, decoding and correlation.
///
/// 1. **Encoding** ([`process::synth`], [`process::codec`], [`process::visual`],
///    [`process::cycle`]): tone segments, checksummed units, pixel patterns and
///    whole calibration cycles.
///
/// 2. **Decoding** ([`process::analyze`], [`process::window`], [`process::decode`],
///    [`process::video`]): bit estimation, phase location and stream decoding.
///
/// 3. **Correlation** ([`process::correlate`]): offset statistics over matched ids.
pub mod process;

/// Data structures shared by the processing stages.
///
/// - **Format** ([`structs::format`]): frame rate, sample rate and the unit grid
/// - **Frequency Plan** ([`structs::frequency`]): symbol frequencies and guard ranges
/// - **Units** ([`structs::unit`]): encoded frame ids
/// - **Detections** ([`structs::detection`]): decoded ids with positions
/// - **Windows** ([`structs::window`]): phase labels and the located timecode window
/// - **Cycle Layout** ([`structs::layout`]): calibration cycle phase durations
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): unit bit packing
/// - **Checksum** ([`utils::checksum`]): unit checksum tables
/// - **Spectrum** ([`utils::spectrum`]): windowed power spectra
/// - **Blobs** ([`utils::blob`]): colour segmentation and luma sampling
/// - **Budgets** ([`utils::budget`]): search limits and cancellation
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
