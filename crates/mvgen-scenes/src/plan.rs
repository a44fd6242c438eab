//! Full generation plan: segments, chained prompts and sized requests.

use mvgen_models::{AnalysisInput, GenerationPlan, GenerationRequest, JobParameters};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SceneError, SceneResult};
use crate::prompt::PromptChainer;
use crate::segment::segment;

/// Document the remote runner feeds to `mvgen-plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub analysis: AnalysisInput,
    pub parameters: JobParameters,
}

/// Frames needed to cover `duration` seconds, never fewer than one.
pub fn frame_count(duration: f64, frames_per_second: u32) -> u32 {
    let frames = (duration.max(0.0) * frames_per_second as f64).round();
    (frames as u32).max(1)
}

/// Segment the analysis, chain prompts and size one request per segment.
pub fn plan_generation(
    input: &AnalysisInput,
    parameters: &JobParameters,
) -> SceneResult<GenerationPlan> {
    if parameters.frames_per_second == 0 {
        return Err(SceneError::InvalidFrameRate(parameters.frames_per_second));
    }

    let segments = segment(
        &input.transcript,
        &input.beats,
        &input.energy,
        parameters.clip_duration_seconds as f64,
    )?;

    let prompts = PromptChainer::new(parameters.visual_style.clone())
        .with_seed(parameters.prompt_seed)
        .chain(&segments);

    let requests = segments
        .iter()
        .zip(&prompts)
        .map(|(segment, prompt)| GenerationRequest {
            index: segment.index,
            prompt: prompt.text.clone(),
            num_frames: frame_count(segment.duration(), parameters.frames_per_second),
            start: segment.start,
            end: segment.end,
        })
        .collect::<Vec<_>>();

    info!(
        segments = segments.len(),
        requests = requests.len(),
        seed = parameters.prompt_seed,
        "Built generation plan"
    );

    Ok(GenerationPlan {
        segments,
        prompts,
        requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvgen_models::{EnergySample, TranscriptSpan};

    fn parameters() -> JobParameters {
        JobParameters {
            title: "Night Drive".to_string(),
            visual_style: "neon noir".to_string(),
            clip_duration_seconds: 10,
            prompt_seed: 42,
            frames_per_second: 8,
            input_slot: "alice/mvgen-in-1234abcd".to_string(),
            input_file: "song.mp3".to_string(),
            artifact_suffix: "_final.mp4".to_string(),
        }
    }

    fn analysis() -> AnalysisInput {
        AnalysisInput {
            transcript: (0..10)
                .map(|i| {
                    let start = i as f64 * 4.0;
                    TranscriptSpan::new(start, start + 2.5, format!("lyric {}", i))
                })
                .collect(),
            beats: (0..80).map(|i| i as f64 * 0.5).collect(),
            energy: (0..40)
                .map(|i| EnergySample {
                    time: i as f64,
                    amplitude: (i % 7) as f64 / 7.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(10.0, 8), 80);
        assert_eq!(frame_count(1.26, 8), 10);
        assert_eq!(frame_count(0.0, 8), 1);
    }

    #[test]
    fn test_plan_has_one_request_per_segment() {
        let plan = plan_generation(&analysis(), &parameters()).unwrap();
        assert!(!plan.is_empty());
        assert_eq!(plan.segments.len(), plan.prompts.len());
        assert_eq!(plan.segments.len(), plan.len());

        for (segment, request) in plan.segments.iter().zip(&plan.requests) {
            assert_eq!(request.index, segment.index);
            assert_eq!(request.num_frames, frame_count(segment.duration(), 8));
        }
    }

    #[test]
    fn test_plan_is_reproducible() {
        let a = plan_generation(&analysis(), &parameters()).unwrap();
        let b = plan_generation(&analysis(), &parameters()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_analysis_gives_empty_plan() {
        let plan = plan_generation(&AnalysisInput::default(), &parameters()).unwrap();
        assert!(plan.is_empty());
        assert!(plan.prompts.is_empty());
    }

    #[test]
    fn test_zero_frame_rate_rejected() {
        let mut params = parameters();
        params.frames_per_second = 0;
        assert!(matches!(
            plan_generation(&analysis(), &params),
            Err(SceneError::InvalidFrameRate(0))
        ));
    }

    #[test]
    fn test_plan_request_parses() {
        let json = serde_json::json!({
            "analysis": { "transcript": [], "beats": [1.0] },
            "parameters": parameters(),
        });
        let request: PlanRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.analysis.beats, vec![1.0]);
        assert_eq!(request.parameters.prompt_seed, 42);
    }
}
