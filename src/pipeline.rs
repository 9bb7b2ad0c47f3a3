use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::config::PipelineConfig;
use crate::models::{ExtractedPassportData, ExtractionReport, OcrAttempt};
use crate::processing::engines::{
    estimate_confidence, LocalCapability, RecognitionEngine, RemoteOcrEngine,
};
use crate::processing::extract::extract_passport_data;
use crate::processing::image::ImagePreprocessor;
use crate::utils::error::PipelineError;

/// Where a run currently is. Exposed for progress reporting; transitions
/// are driven entirely by [`ExtractionPipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    Preprocessing,
    Recognizing,
    Extracting,
    Done,
    Failed,
}

struct RunState {
    phase: PipelinePhase,
    generation: u64,
}

/// Drives one image through preprocess, recognition and field extraction.
/// A pipeline accepts one run at a time; `reset` abandons the current run
/// and any still-running task discovers that on its next transition.
pub struct ExtractionPipeline {
    engines: Vec<Box<dyn RecognitionEngine>>,
    max_image_bytes: usize,
    state: Mutex<RunState>,
}

impl ExtractionPipeline {
    pub fn new(
        config: &PipelineConfig,
        capability: LocalCapability,
    ) -> Result<Self, PipelineError> {
        let mut engines: Vec<Box<dyn RecognitionEngine>> = Vec::new();

        if config.local.enabled {
            if capability.text_detection {
                #[cfg(feature = "engine-tesseract")]
                engines.push(Box::new(crate::processing::engines::TesseractEngine::new(
                    config.local.language.clone(),
                )));
                #[cfg(not(feature = "engine-tesseract"))]
                warn!("local engine requested but this build has no text detection");
            } else {
                warn!("local engine disabled: no text detection capability on this host");
            }
        }

        if config.remote.enabled {
            let remote = RemoteOcrEngine::new(config.remote.clone())
                .map_err(|e| PipelineError::EngineInit(format!("remote: {}", e)))?;
            engines.push(Box::new(remote));
        }

        Ok(Self::with_engines(engines, config.input.max_image_bytes))
    }

    /// Build a pipeline over an explicit engine list, bypassing config.
    pub fn with_engines(engines: Vec<Box<dyn RecognitionEngine>>, max_image_bytes: usize) -> Self {
        Self {
            engines,
            max_image_bytes,
            state: Mutex::new(RunState {
                phase: PipelinePhase::Idle,
                generation: 0,
            }),
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.state.lock().phase
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Abandon whatever is in flight and return to `Idle`. The in-flight
    /// run keeps executing but its next transition fails with `Superseded`
    /// and leaves the fresh state untouched.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.phase = PipelinePhase::Idle;
        state.generation = state.generation.wrapping_add(1);
    }

    fn begin(&self) -> Result<u64, PipelineError> {
        let mut state = self.state.lock();
        match state.phase {
            PipelinePhase::Idle | PipelinePhase::Done | PipelinePhase::Failed => {
                state.phase = PipelinePhase::Preprocessing;
                Ok(state.generation)
            }
            _ => Err(PipelineError::Busy),
        }
    }

    fn advance(&self, generation: u64, next: PipelinePhase) -> Result<(), PipelineError> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Err(PipelineError::Superseded);
        }
        state.phase = next;
        Ok(())
    }

    /// Mark the current run failed if it still owns the state. Returns
    /// false when a reset has superseded the run in the meantime.
    fn fail_current(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.phase = PipelinePhase::Failed;
        true
    }

    /// Run the full pipeline over one image. Engine failures are logged
    /// and tolerated as long as at least one engine produces text.
    pub async fn run(&self, image: &[u8]) -> Result<ExtractionReport, PipelineError> {
        ImagePreprocessor::validate_input(image, self.max_image_bytes)?;
        let generation = self.begin()?;
        debug!("run {} started ({} bytes)", generation, image.len());

        let processed = match ImagePreprocessor::preprocess(image) {
            Ok(processed) => processed,
            Err(e) => {
                if !self.fail_current(generation) {
                    return Err(PipelineError::Superseded);
                }
                return Err(PipelineError::Preprocessing(e));
            }
        };

        self.advance(generation, PipelinePhase::Recognizing)?;
        let mut attempts = Vec::new();
        for engine in &self.engines {
            let started = Instant::now();
            match engine.recognize(&processed).await {
                Ok(text) => {
                    let confidence = estimate_confidence(&text);
                    info!(
                        "engine {} returned {} characters (confidence {})",
                        engine.name(),
                        text.chars().count(),
                        confidence
                    );
                    attempts.push(OcrAttempt {
                        engine: engine.name().to_string(),
                        text,
                        confidence,
                        elapsed: started.elapsed(),
                    });
                }
                Err(e) => warn!("engine {} failed: {}", engine.name(), e),
            }
        }

        if attempts.is_empty() {
            // A cancelled run reports its supersession, not the outage.
            if !self.fail_current(generation) {
                return Err(PipelineError::Superseded);
            }
            return Err(PipelineError::AllEnginesFailed {
                attempted: self.engines.len(),
            });
        }

        self.advance(generation, PipelinePhase::Extracting)?;
        let best_attempt = select_best(&attempts);
        let data = match best_attempt {
            Some(index) => extract_passport_data(&attempts[index].text),
            None => ExtractedPassportData::default(),
        };

        self.advance(generation, PipelinePhase::Done)?;
        info!(
            "run {} finished: {} of {} fields populated",
            generation,
            data.filled_count(),
            ExtractedPassportData::FIELD_NAMES.len()
        );
        Ok(ExtractionReport {
            data,
            attempts,
            best_attempt,
        })
    }
}

/// Index of the attempt with the highest confidence. Ties keep the
/// earliest attempt, so engine registration order breaks them.
fn select_best(attempts: &[OcrAttempt]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, attempt) in attempts.iter().enumerate() {
        let better = match best {
            Some(current) => attempt.confidence > attempts[current].confidence,
            None => true,
        };
        if better {
            best = Some(index);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::utils::error::EngineError;

    struct StaticEngine {
        name: &'static str,
        text: &'static str,
    }

    #[async_trait]
    impl RecognitionEngine for StaticEngine {
        fn name(&self) -> &str {
            self.name
        }

        async fn recognize(&self, _image: &[u8]) -> Result<String, EngineError> {
            Ok(self.text.to_string())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl RecognitionEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        async fn recognize(&self, _image: &[u8]) -> Result<String, EngineError> {
            Err(EngineError::Service("simulated outage".to_string()))
        }
    }

    // Blocks inside recognize() until the test releases it.
    struct GatedEngine {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        text: &'static str,
    }

    #[async_trait]
    impl RecognitionEngine for GatedEngine {
        fn name(&self) -> &str {
            "gated"
        }

        async fn recognize(&self, _image: &[u8]) -> Result<String, EngineError> {
            let receiver = self.gate.lock().take();
            if let Some(receiver) = receiver {
                let _ = receiver.await;
            }
            Ok(self.text.to_string())
        }
    }

    // Blocks inside recognize() until released, then fails.
    struct GatedFailingEngine {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl RecognitionEngine for GatedFailingEngine {
        fn name(&self) -> &str {
            "gated-failing"
        }

        async fn recognize(&self, _image: &[u8]) -> Result<String, EngineError> {
            let receiver = self.gate.lock().take();
            if let Some(receiver) = receiver {
                let _ = receiver.await;
            }
            Err(EngineError::Service("simulated outage".to_string()))
        }
    }

    const TRANSCRIPT: &str = "Passport No: X4821907\nName: JOHN MICHAEL DOE\nNATIONALITY: USA\nDate of Birth: 12/06/1985";

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([180, 180, 180, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn pipeline_with(engines: Vec<Box<dyn RecognitionEngine>>) -> ExtractionPipeline {
        ExtractionPipeline::with_engines(engines, 1024 * 1024)
    }

    async fn wait_for_phase(pipeline: &ExtractionPipeline, phase: PipelinePhase) {
        for _ in 0..500 {
            if pipeline.phase() == phase {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("pipeline never reached {:?}", phase);
    }

    #[tokio::test]
    async fn test_run_collects_attempts_and_extracts() {
        let pipeline = pipeline_with(vec![
            Box::new(StaticEngine {
                name: "alpha",
                text: TRANSCRIPT,
            }),
            Box::new(StaticEngine {
                name: "beta",
                text: "@@##%%^^&&**!!",
            }),
        ]);

        let report = pipeline.run(&png_bytes()).await.unwrap();
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.best_attempt, Some(0));
        assert_eq!(report.best().unwrap().engine, "alpha");
        assert_eq!(report.data.passport_number.as_deref(), Some("X4821907"));
        assert_eq!(report.data.full_name.as_deref(), Some("JOHN MICHAEL DOE"));
        assert_eq!(report.data.date_of_birth.as_deref(), Some("12/06/1985"));
        assert_eq!(pipeline.phase(), PipelinePhase::Done);
    }

    #[tokio::test]
    async fn test_second_run_rejected_while_first_in_flight() {
        let (release, gate) = oneshot::channel();
        let pipeline = Arc::new(pipeline_with(vec![Box::new(GatedEngine {
            gate: Mutex::new(Some(gate)),
            text: TRANSCRIPT,
        })]));

        let first = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            let image = png_bytes();
            async move { pipeline.run(&image).await }
        });

        wait_for_phase(&pipeline, PipelinePhase::Recognizing).await;
        let image = png_bytes();
        let second = pipeline.run(&image).await;
        assert!(matches!(second, Err(PipelineError::Busy)));

        release.send(()).unwrap();
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(pipeline.phase(), PipelinePhase::Done);
    }

    #[tokio::test]
    async fn test_reset_supersedes_inflight_run() {
        let (release, gate) = oneshot::channel();
        let pipeline = Arc::new(pipeline_with(vec![Box::new(GatedEngine {
            gate: Mutex::new(Some(gate)),
            text: TRANSCRIPT,
        })]));

        let first = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            let image = png_bytes();
            async move { pipeline.run(&image).await }
        });

        wait_for_phase(&pipeline, PipelinePhase::Recognizing).await;
        pipeline.reset();
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);

        release.send(()).unwrap();
        let result = first.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Superseded)));
        // The abandoned run must not disturb the fresh state.
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
    }

    #[tokio::test]
    async fn test_reset_supersedes_run_whose_engines_all_fail() {
        let (release, gate) = oneshot::channel();
        let pipeline = Arc::new(pipeline_with(vec![Box::new(GatedFailingEngine {
            gate: Mutex::new(Some(gate)),
        })]));

        let first = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            let image = png_bytes();
            async move { pipeline.run(&image).await }
        });

        wait_for_phase(&pipeline, PipelinePhase::Recognizing).await;
        pipeline.reset();

        release.send(()).unwrap();
        let result = first.await.unwrap();
        // Even with zero successful attempts the stale run must report its
        // supersession, not an engine outage.
        assert!(matches!(result, Err(PipelineError::Superseded)));
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
    }

    #[tokio::test]
    async fn test_undecodable_payload_fails_the_run() {
        let pipeline = pipeline_with(vec![Box::new(StaticEngine {
            name: "alpha",
            text: TRANSCRIPT,
        })]);

        // PNG magic followed by garbage passes the sniff but not the decoder
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(b"not a real png stream");
        let result = pipeline.run(&bytes).await;
        assert!(matches!(result, Err(PipelineError::Preprocessing(_))));
        assert_eq!(pipeline.phase(), PipelinePhase::Failed);
    }

    #[tokio::test]
    async fn test_all_engines_failed() {
        let pipeline = pipeline_with(vec![Box::new(FailingEngine), Box::new(FailingEngine)]);

        let result = pipeline.run(&png_bytes()).await;
        assert!(matches!(
            result,
            Err(PipelineError::AllEnginesFailed { attempted: 2 })
        ));
        assert_eq!(pipeline.phase(), PipelinePhase::Failed);

        // A failed pipeline accepts the next run.
        let retry = pipeline.run(&png_bytes()).await;
        assert!(matches!(
            retry,
            Err(PipelineError::AllEnginesFailed { attempted: 2 })
        ));
    }

    #[tokio::test]
    async fn test_no_engines_configured_fails() {
        let pipeline = pipeline_with(Vec::new());
        let result = pipeline.run(&png_bytes()).await;
        assert!(matches!(
            result,
            Err(PipelineError::AllEnginesFailed { attempted: 0 })
        ));
        assert_eq!(pipeline.phase(), PipelinePhase::Failed);
    }

    #[tokio::test]
    async fn test_partial_engine_failure_recovers() {
        let pipeline = pipeline_with(vec![
            Box::new(FailingEngine),
            Box::new(StaticEngine {
                name: "beta",
                text: TRANSCRIPT,
            }),
        ]);

        let report = pipeline.run(&png_bytes()).await.unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.best().unwrap().engine, "beta");
        assert_eq!(report.data.passport_number.as_deref(), Some("X4821907"));
        assert_eq!(pipeline.phase(), PipelinePhase::Done);
    }

    #[tokio::test]
    async fn test_equal_confidence_keeps_first_engine() {
        let pipeline = pipeline_with(vec![
            Box::new(StaticEngine {
                name: "alpha",
                text: TRANSCRIPT,
            }),
            Box::new(StaticEngine {
                name: "beta",
                text: TRANSCRIPT,
            }),
        ]);

        let report = pipeline.run(&png_bytes()).await.unwrap();
        assert_eq!(report.attempts[0].confidence, report.attempts[1].confidence);
        assert_eq!(report.best_attempt, Some(0));
        assert_eq!(report.best().unwrap().engine, "alpha");
    }

    #[tokio::test]
    async fn test_higher_confidence_wins_regardless_of_order() {
        let pipeline = pipeline_with(vec![
            Box::new(StaticEngine {
                name: "alpha",
                text: "@@##%%^^&&**!!",
            }),
            Box::new(StaticEngine {
                name: "beta",
                text: TRANSCRIPT,
            }),
        ]);

        let report = pipeline.run(&png_bytes()).await.unwrap();
        assert_eq!(report.best_attempt, Some(1));
        assert_eq!(report.best().unwrap().engine, "beta");
    }

    #[tokio::test]
    async fn test_invalid_input_leaves_pipeline_idle() {
        let pipeline = pipeline_with(vec![Box::new(StaticEngine {
            name: "alpha",
            text: TRANSCRIPT,
        })]);

        let result = pipeline.run(b"definitely not an image").await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
    }

    #[tokio::test]
    async fn test_oversized_input_rejected() {
        let pipeline = ExtractionPipeline::with_engines(
            vec![Box::new(StaticEngine {
                name: "alpha",
                text: TRANSCRIPT,
            })],
            16,
        );

        let result = pipeline.run(&png_bytes()).await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
    }

    #[tokio::test]
    async fn test_run_after_done_accepted() {
        let pipeline = pipeline_with(vec![Box::new(StaticEngine {
            name: "alpha",
            text: TRANSCRIPT,
        })]);

        pipeline.run(&png_bytes()).await.unwrap();
        assert_eq!(pipeline.phase(), PipelinePhase::Done);
        let report = pipeline.run(&png_bytes()).await.unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(pipeline.phase(), PipelinePhase::Done);
    }

    #[test]
    fn test_new_respects_config_toggles() {
        let mut config = PipelineConfig::default();
        config.local.enabled = false;
        config.remote.enabled = false;
        let pipeline = ExtractionPipeline::new(&config, LocalCapability::none()).unwrap();
        assert_eq!(pipeline.engine_count(), 0);

        let config = PipelineConfig::default();
        let pipeline = ExtractionPipeline::new(&config, LocalCapability::none()).unwrap();
        assert_eq!(pipeline.engine_count(), 1);
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
    }

    #[test]
    fn test_select_best_prefers_strictly_higher() {
        fn attempt(confidence: u8) -> OcrAttempt {
            OcrAttempt {
                engine: "x".to_string(),
                text: String::new(),
                confidence,
                elapsed: Duration::from_millis(5),
            }
        }

        assert_eq!(select_best(&[]), None);
        assert_eq!(select_best(&[attempt(40)]), Some(0));
        assert_eq!(select_best(&[attempt(30), attempt(80), attempt(80)]), Some(1));
        assert_eq!(select_best(&[attempt(70), attempt(70)]), Some(0));
        assert_eq!(select_best(&[attempt(10), attempt(20), attempt(90)]), Some(2));
    }
}
