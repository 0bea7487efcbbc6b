//! Core types for packetized streaming text-to-speech
//!
//! This crate provides the foundational types shared by every other crate:
//! - Language and model selection
//! - The speech synthesis capability trait
//! - Synthesis requests, results and continuity context
//! - Error types

pub mod error;
pub mod language;
pub mod synthesis;

pub use error::{Error, SynthesisError};
pub use language::{Language, ModelChoice};
pub use synthesis::{ContextWindow, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio};
