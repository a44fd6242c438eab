//! Analysis inputs and the generation work items derived from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One word-aligned transcript span, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSpan {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TranscriptSpan {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Energy curve sample: amplitude at a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnergySample {
    pub time: f64,
    pub amplitude: f64,
}

/// Raw time-aligned analysis produced by the external collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisInput {
    /// Ordered, non-overlapping transcript spans
    #[serde(default)]
    pub transcript: Vec<TranscriptSpan>,
    /// Beat timestamps in seconds
    #[serde(default)]
    pub beats: Vec<f64>,
    /// Energy curve samples
    #[serde(default)]
    pub energy: Vec<EnergySample>,
}

/// Contiguous time window of the track with its lyrics and energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSegment {
    /// Zero-based position in the timeline
    pub index: usize,
    /// Window start in seconds
    pub start: f64,
    /// Window end in seconds
    pub end: f64,
    /// Transcript text accumulated over the window
    pub lyrics_text: String,
    /// Mean energy over the window (unnormalized)
    pub mean_energy: f64,
    /// Number of beats inside the window
    pub beat_count: usize,
}

impl AnalysisSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Coarse three-level classification of normalized energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoodTier {
    Low,
    Mid,
    High,
}

/// Normalized energy above which a segment is `High`.
pub const HIGH_ENERGY_THRESHOLD: f64 = 0.66;
/// Normalized energy above which a segment is `Mid`.
pub const MID_ENERGY_THRESHOLD: f64 = 0.33;

impl MoodTier {
    /// Classify a normalized energy value.
    pub fn classify(normalized_energy: f64) -> Self {
        if normalized_energy > HIGH_ENERGY_THRESHOLD {
            MoodTier::High
        } else if normalized_energy > MID_ENERGY_THRESHOLD {
            MoodTier::Mid
        } else {
            MoodTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodTier::Low => "low",
            MoodTier::Mid => "mid",
            MoodTier::High => "high",
        }
    }
}

impl fmt::Display for MoodTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Prompt for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenePrompt {
    pub index: usize,
    pub mood_tier: MoodTier,
    /// Visual anchor chosen for this scene
    pub anchor: String,
    /// Energy after normalization across the whole sequence
    pub normalized_energy: f64,
    /// Composed prompt text
    pub text: String,
}

/// Work item handed to the generative video model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    pub index: usize,
    pub prompt: String,
    /// Target frame count for the clip
    pub num_frames: u32,
    /// Timeline position the clip covers, in seconds
    pub start: f64,
    pub end: f64,
}

/// Everything the remote job needs to render the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationPlan {
    pub segments: Vec<AnalysisSegment>,
    pub prompts: Vec<ScenePrompt>,
    pub requests: Vec<GenerationRequest>,
}

impl GenerationPlan {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_tier_thresholds() {
        assert_eq!(MoodTier::classify(0.0), MoodTier::Low);
        assert_eq!(MoodTier::classify(0.33), MoodTier::Low);
        assert_eq!(MoodTier::classify(0.34), MoodTier::Mid);
        assert_eq!(MoodTier::classify(0.66), MoodTier::Mid);
        assert_eq!(MoodTier::classify(0.67), MoodTier::High);
        assert_eq!(MoodTier::classify(1.0), MoodTier::High);
    }

    #[test]
    fn test_analysis_input_defaults_missing_fields() {
        let input: AnalysisInput =
            serde_json::from_str(r#"{"transcript":[{"start":0.0,"end":1.5,"text":"hi"}]}"#)
                .unwrap();
        assert_eq!(input.transcript.len(), 1);
        assert!(input.beats.is_empty());
        assert!(input.energy.is_empty());
    }
}
