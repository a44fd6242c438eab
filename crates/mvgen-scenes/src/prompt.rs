//! Prompt chaining across segments.
//!
//! A visual anchor is held for several consecutive prompts before switching
//! to a different one, so neighbouring clips share a setting while the whole
//! timeline still varies. Anchor choice is driven by a seeded RNG and the
//! same segments and seed always produce the same prompt strings.

use mvgen_models::{AnalysisSegment, MoodTier, ScenePrompt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{SceneError, SceneResult};

/// Seed used when the caller does not supply one.
pub const DEFAULT_SEED: u64 = 42;

/// Keeps normalization finite when every energy is equal.
pub const ENERGY_EPSILON: f64 = 1e-6;

/// Characters of lyrics quoted in each prompt.
pub const EXCERPT_CHARS: usize = 80;

/// Minimum number of consecutive prompts sharing one anchor.
pub const MIN_ANCHOR_INTERVAL: usize = 3;

pub const PROMPT_SUFFIX: &str = "cinematic lighting, no text, no watermark, no logo";

pub const DEFAULT_PALETTE: [&str; 8] = [
    "a rain-soaked neon city street at night",
    "a vast desert under a burning sunset",
    "a misty pine forest at dawn",
    "an empty highway stretching to the horizon",
    "a crowded rooftop overlooking the skyline",
    "a quiet beach with rolling waves under moonlight",
    "an abandoned warehouse lit by shafts of light",
    "a snowy mountain ridge above the clouds",
];

/// Phrase describing a mood tier.
pub fn mood_descriptor(tier: MoodTier) -> &'static str {
    match tier {
        MoodTier::Low => "calm, melancholic atmosphere, soft muted colors, slow camera drift",
        MoodTier::Mid => "steady, dreamy atmosphere, warm balanced tones, gentle camera motion",
        MoodTier::High => "intense, euphoric atmosphere, vivid saturated colors, fast dynamic camera",
    }
}

/// Normalize energies across the whole sequence into `[0, 1]`.
///
/// The minimum maps to `0.0`; the maximum maps to `1.0` up to the epsilon
/// term. When every value is equal all of them map to `0.0`.
pub fn normalize_energies(energies: &[f64]) -> Vec<f64> {
    if energies.is_empty() {
        return Vec::new();
    }

    let min = energies.iter().copied().fold(f64::INFINITY, f64::min);
    let max = energies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min + ENERGY_EPSILON;

    energies
        .iter()
        .map(|e| ((e - min) / range).clamp(0.0, 1.0))
        .collect()
}

/// Builds one prompt per segment with chained visual anchors.
#[derive(Debug, Clone)]
pub struct PromptChainer {
    palette: Vec<String>,
    seed: u64,
    style: String,
}

impl PromptChainer {
    /// Chainer with the default palette and seed.
    pub fn new(style: impl Into<String>) -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|s| s.to_string()).collect(),
            seed: DEFAULT_SEED,
            style: style.into(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the anchor palette. The palette must not be empty.
    pub fn with_palette(mut self, palette: Vec<String>) -> SceneResult<Self> {
        if palette.is_empty() {
            return Err(SceneError::EmptyPalette);
        }
        self.palette = palette;
        Ok(self)
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    /// Number of consecutive segments that share an anchor.
    pub fn interval(&self, segment_count: usize) -> usize {
        (segment_count / self.palette.len()).max(MIN_ANCHOR_INTERVAL)
    }

    /// Compose prompts for `segments`, in order.
    pub fn chain(&self, segments: &[AnalysisSegment]) -> Vec<ScenePrompt> {
        if segments.is_empty() {
            return Vec::new();
        }

        let energies: Vec<f64> = segments.iter().map(|s| s.mean_energy).collect();
        let normalized = normalize_energies(&energies);
        let interval = self.interval(segments.len());

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut anchor_idx = rng.random_range(0..self.palette.len());

        segments
            .iter()
            .zip(normalized)
            .enumerate()
            .map(|(i, (segment, normalized_energy))| {
                if i > 0 && i % interval == 0 {
                    anchor_idx = self.next_anchor(&mut rng, anchor_idx);
                }

                let mood_tier = MoodTier::classify(normalized_energy);
                let anchor = &self.palette[anchor_idx];

                ScenePrompt {
                    index: segment.index,
                    mood_tier,
                    anchor: anchor.clone(),
                    normalized_energy,
                    text: self.compose(anchor, mood_tier, &segment.lyrics_text),
                }
            })
            .collect()
    }

    /// Uniform pick among every anchor except the current one.
    fn next_anchor(&self, rng: &mut StdRng, current: usize) -> usize {
        if self.palette.len() < 2 {
            return current;
        }
        let pick = rng.random_range(0..self.palette.len() - 1);
        if pick >= current {
            pick + 1
        } else {
            pick
        }
    }

    fn compose(&self, anchor: &str, tier: MoodTier, lyrics: &str) -> String {
        let excerpt = lyrics_excerpt(lyrics);
        if excerpt.is_empty() {
            format!(
                "{}, {}, {}, {}",
                anchor,
                mood_descriptor(tier),
                self.style,
                PROMPT_SUFFIX
            )
        } else {
            format!(
                "{}, {}, {}, inspired by: \"{}\", {}",
                anchor,
                mood_descriptor(tier),
                self.style,
                excerpt,
                PROMPT_SUFFIX
            )
        }
    }
}

fn lyrics_excerpt(lyrics: &str) -> String {
    lyrics
        .chars()
        .take(EXCERPT_CHARS)
        .collect::<String>()
        .trim()
        .replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(energies: &[f64]) -> Vec<AnalysisSegment> {
        energies
            .iter()
            .enumerate()
            .map(|(i, &e)| AnalysisSegment {
                index: i,
                start: i as f64 * 10.0,
                end: (i + 1) as f64 * 10.0,
                lyrics_text: format!("line number {} of the song", i),
                mean_energy: e,
                beat_count: 4,
            })
            .collect()
    }

    #[test]
    fn test_normalize_bounds() {
        let normalized = normalize_energies(&[0.2, 0.8, 0.5, 0.2]);
        assert_eq!(normalized[0], 0.0);
        assert!((normalized[1] - 1.0).abs() < 1e-5);
        assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_normalize_equal_energies_map_to_zero() {
        let normalized = normalize_energies(&[0.5, 0.5, 0.5]);
        assert!(normalized.iter().all(|&v| v == 0.0));
        assert!(normalize_energies(&[]).is_empty());
    }

    #[test]
    fn test_chain_is_deterministic() {
        let segs = segments(&[0.1, 0.9, 0.4, 0.7, 0.3, 0.6, 0.2, 0.8, 0.5, 0.1]);
        let chainer = PromptChainer::new("grainy 16mm film").with_seed(7);

        let first: Vec<String> = chainer.chain(&segs).into_iter().map(|p| p.text).collect();
        let second: Vec<String> = chainer.chain(&segs).into_iter().map(|p| p.text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_anchor_held_for_interval_then_switches() {
        let segs = segments(&[0.5; 12]);
        let chainer = PromptChainer::new("watercolor");
        let prompts = chainer.chain(&segs);
        let interval = chainer.interval(segs.len());
        assert_eq!(interval, MIN_ANCHOR_INTERVAL);

        for (i, pair) in prompts.windows(2).enumerate() {
            let next = i + 1;
            if next % interval == 0 {
                assert_ne!(pair[0].anchor, pair[1].anchor, "expected switch at {}", next);
            } else {
                assert_eq!(pair[0].anchor, pair[1].anchor);
            }
        }
    }

    #[test]
    fn test_interval_grows_with_segment_count() {
        let chainer = PromptChainer::new("x");
        assert_eq!(chainer.interval(5), 3);
        assert_eq!(chainer.interval(40), 5);
    }

    #[test]
    fn test_mood_tiers_and_prompt_shape() {
        let segs = segments(&[0.0, 0.5, 1.0]);
        let prompts = PromptChainer::new("neon noir").chain(&segs);

        assert_eq!(prompts[0].mood_tier, MoodTier::Low);
        assert_eq!(prompts[1].mood_tier, MoodTier::Mid);
        assert_eq!(prompts[2].mood_tier, MoodTier::High);

        let text = &prompts[2].text;
        assert!(text.starts_with(&prompts[2].anchor));
        assert!(text.contains(mood_descriptor(MoodTier::High)));
        assert!(text.contains("neon noir"));
        assert!(text.contains("inspired by: \"line number 2 of the song\""));
        assert!(text.ends_with(PROMPT_SUFFIX));
    }

    #[test]
    fn test_excerpt_truncated_on_char_boundary() {
        let long = "é".repeat(200);
        let excerpt = lyrics_excerpt(&long);
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
        assert_eq!(lyrics_excerpt("  say \"hey\"  "), "say 'hey'");
    }

    #[test]
    fn test_single_anchor_palette_never_switches() {
        let chainer = PromptChainer::new("x")
            .with_palette(vec!["a lighthouse".to_string()])
            .unwrap();
        let prompts = chainer.chain(&segments(&[0.1; 9]));
        assert!(prompts.iter().all(|p| p.anchor == "a lighthouse"));
        assert!(PromptChainer::new("x").with_palette(Vec::new()).is_err());
    }
}
