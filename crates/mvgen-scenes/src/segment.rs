//! Transcript-driven segmentation.
//!
//! Spans are scanned in order while text accumulates from `current_start`.
//! Once the elapsed time up to the end of the current span reaches the clip
//! duration, the accumulated text is closed into a segment ending where the
//! current span starts, and that span opens the next segment. Anything left
//! after the scan becomes a trailing segment running to the last span's end.
//!
//! Closed segments measure energy and beats over `[start, end)`. The
//! trailing segment uses the closed window `[start, end]` so the final beat
//! or sample sitting exactly on the last span's end is not dropped.

use mvgen_models::{AnalysisSegment, EnergySample, TranscriptSpan};
use tracing::debug;

use crate::error::{SceneError, SceneResult};

/// Energy used when no curve sample falls inside a segment's window.
pub const DEFAULT_ENERGY: f64 = 0.5;

#[derive(Clone, Copy)]
enum Window {
    HalfOpen,
    Closed,
}

impl Window {
    fn contains(self, start: f64, end: f64, t: f64) -> bool {
        match self {
            Window::HalfOpen => t >= start && t < end,
            Window::Closed => t >= start && t <= end,
        }
    }
}

/// Split a transcript into clip-sized segments.
///
/// Zero spans yield zero segments.
pub fn segment(
    transcript: &[TranscriptSpan],
    beats: &[f64],
    energy: &[EnergySample],
    clip_duration: f64,
) -> SceneResult<Vec<AnalysisSegment>> {
    if !clip_duration.is_finite() || clip_duration <= 0.0 {
        return Err(SceneError::InvalidClipDuration(clip_duration));
    }
    validate_transcript(transcript)?;

    let mut segments = Vec::new();
    let mut current_start = 0.0_f64;
    let mut current_text = String::new();

    for span in transcript {
        if span.end - current_start >= clip_duration && !current_text.is_empty() {
            segments.push(build_segment(
                segments.len(),
                current_start,
                span.start,
                &current_text,
                beats,
                energy,
                Window::HalfOpen,
            ));
            current_start = span.start;
            current_text.clear();
        }

        let text = span.text.trim();
        if !text.is_empty() {
            if !current_text.is_empty() {
                current_text.push(' ');
            }
            current_text.push_str(text);
        }
    }

    if !current_text.is_empty() {
        if let Some(last) = transcript.last() {
            segments.push(build_segment(
                segments.len(),
                current_start,
                last.end,
                &current_text,
                beats,
                energy,
                Window::Closed,
            ));
        }
    }

    debug!(
        spans = transcript.len(),
        segments = segments.len(),
        clip_duration,
        "Segmented transcript"
    );

    Ok(segments)
}

fn validate_transcript(transcript: &[TranscriptSpan]) -> SceneResult<()> {
    let mut previous_end = f64::NEG_INFINITY;
    for (index, span) in transcript.iter().enumerate() {
        let well_formed = span.start.is_finite()
            && span.end.is_finite()
            && span.start >= 0.0
            && span.end >= span.start
            && span.start >= previous_end;
        if !well_formed {
            return Err(SceneError::UnorderedTranscript { index });
        }
        previous_end = span.end;
    }
    Ok(())
}

fn build_segment(
    index: usize,
    start: f64,
    end: f64,
    text: &str,
    beats: &[f64],
    energy: &[EnergySample],
    window: Window,
) -> AnalysisSegment {
    let beat_count = beats
        .iter()
        .filter(|&&b| window.contains(start, end, b))
        .count();

    let (sum, count) = energy
        .iter()
        .filter(|s| window.contains(start, end, s.time))
        .fold((0.0, 0usize), |(sum, n), s| (sum + s.amplitude, n + 1));
    let mean_energy = if count == 0 {
        DEFAULT_ENERGY
    } else {
        sum / count as f64
    };

    AnalysisSegment {
        index,
        start,
        end,
        lyrics_text: text.to_string(),
        mean_energy,
        beat_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Evenly spaced two-second spans starting at `lead`.
    fn spans(count: usize, lead: f64, spacing: f64) -> Vec<TranscriptSpan> {
        (0..count)
            .map(|i| {
                let start = lead + i as f64 * spacing;
                TranscriptSpan::new(start, start + 2.0, format!("word{}", i))
            })
            .collect()
    }

    #[test]
    fn test_empty_transcript_yields_no_segments() {
        let segments = segment(&[], &[1.0, 2.0], &[], 15.0).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_rejects_non_positive_clip_duration() {
        let err = segment(&spans(3, 0.0, 3.0), &[], &[], 0.0).unwrap_err();
        assert!(matches!(err, SceneError::InvalidClipDuration(_)));
    }

    #[test]
    fn test_rejects_overlapping_spans() {
        let transcript = vec![
            TranscriptSpan::new(0.0, 3.0, "a"),
            TranscriptSpan::new(2.0, 4.0, "b"),
        ];
        let err = segment(&transcript, &[], &[], 5.0).unwrap_err();
        assert!(matches!(err, SceneError::UnorderedTranscript { index: 1 }));
    }

    #[test]
    fn test_segments_are_contiguous_and_cover_transcript() {
        let transcript = spans(25, 1.0, 3.1);
        let segments = segment(&transcript, &[], &[], 10.0).unwrap();
        assert!(segments.len() > 1);

        assert!(segments[0].start <= transcript[0].start);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
        let last = segments.last().unwrap();
        assert_eq!(last.end, transcript.last().unwrap().end);

        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.index, i);
        }
    }

    #[test]
    fn test_every_span_text_lands_in_exactly_one_segment() {
        let transcript = spans(12, 0.0, 4.0);
        let segments = segment(&transcript, &[], &[], 10.0).unwrap();
        let joined: Vec<&str> = segments
            .iter()
            .flat_map(|s| s.lyrics_text.split(' '))
            .collect();
        let expected: Vec<String> = (0..12).map(|i| format!("word{}", i)).collect();
        assert_eq!(joined, expected);
    }

    #[test]
    fn test_beat_counts_follow_window_rules() {
        // Spans at 0, 4, 8, 12; clip 10 closes [0, 8) when the span at 8 ends at 10.
        let transcript = spans(4, 0.0, 4.0);
        let beats = vec![0.0, 3.9, 7.99, 8.0, 11.0, 14.0];
        let segments = segment(&transcript, &beats, &[], 10.0).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start, segments[0].end), (0.0, 8.0));
        assert_eq!(segments[0].beat_count, 3);
        // Trailing window [8, 14] includes the beat on its end.
        assert_eq!((segments[1].start, segments[1].end), (8.0, 14.0));
        assert_eq!(segments[1].beat_count, 3);

        for seg in &segments {
            let inside = beats
                .iter()
                .filter(|&&b| {
                    b >= seg.start
                        && (b < seg.end || (seg.index == segments.len() - 1 && b <= seg.end))
                })
                .count();
            assert_eq!(seg.beat_count, inside);
        }
    }

    #[test]
    fn test_energy_mean_and_default() {
        let transcript = spans(4, 0.0, 4.0);
        let energy = vec![
            EnergySample { time: 1.0, amplitude: 0.2 },
            EnergySample { time: 5.0, amplitude: 0.4 },
        ];
        let segments = segment(&transcript, &[], &energy, 10.0).unwrap();
        assert!((segments[0].mean_energy - 0.3).abs() < 1e-9);
        assert_eq!(segments[1].mean_energy, DEFAULT_ENERGY);
    }

    #[test]
    fn test_three_minute_track_yields_about_twelve_segments() {
        // 40 two-second spans spread over roughly 180 seconds.
        let transcript = spans(40, 4.0, 4.3);
        assert!(transcript.last().unwrap().end <= 180.0);

        let segments = segment(&transcript, &[], &[], 15.0).unwrap();
        assert!(
            (11..=13).contains(&segments.len()),
            "got {} segments",
            segments.len()
        );
    }

    #[test]
    fn test_short_transcript_is_single_segment() {
        let transcript = spans(2, 0.0, 3.0);
        let segments = segment(&transcript, &[], &[], 30.0).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].lyrics_text, "word0 word1");
        assert_eq!(segments[0].end, 5.0);
    }
}
