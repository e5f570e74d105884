//! Sentiment fusion — combines per-modality classifier output into one
//! normalized emotion distribution.
//!
//! The accumulation order is fixed: images first, then text, then audio.
//! Labels are lowercased and kept in first-seen order so the argmax is
//! deterministic when two labels tie.
//!
//! The image channel is rescaled with `w / image_weight * total_image_score`.
//! This amplifies image evidence rather than dampening it; the formula is
//! pinned by a characterization test and must not change without product
//! sign-off.

use mindscope_config::FusionConfig;
use mindscope_core::error::FusionError;
use mindscope_core::modality::{AudioSentiment, ImageSentiment, ModalityResult};
use serde::Serialize;
use serde::ser::SerializeMap;
use tracing::debug;

/// Per-modality weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub text: f64,
    pub image: f64,
    pub audio: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            text: 0.3,
            image: 0.2,
            audio: 0.5,
        }
    }
}

impl From<&FusionConfig> for FusionWeights {
    fn from(config: &FusionConfig) -> Self {
        Self {
            text: config.text_weight,
            image: config.image_weight,
            audio: config.audio_weight,
        }
    }
}

/// Emotion label → weight, in first-seen order.
///
/// Serializes as a JSON object preserving that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentimentDistribution {
    entries: Vec<(String, f64)>,
}

impl SentimentDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to `label`, inserting it at the end if unseen.
    fn add(&mut self, label: &str, weight: f64) {
        match self.entries.iter_mut().find(|(l, _)| l == label) {
            Some((_, w)) => *w += weight,
            None => self.entries.push((label.to_string(), weight)),
        }
    }

    fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    fn scale(&mut self, f: impl Fn(f64) -> f64) {
        for (_, w) in &mut self.entries {
            *w = f(*w);
        }
    }

    /// Divide every weight by the sum. No-op when the sum is zero.
    fn normalize(&mut self) {
        let total = self.total();
        if total > 0.0 {
            self.scale(|w| w / total);
        }
    }

    /// The label with the highest weight; the earliest label wins ties.
    pub fn argmax(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, weight) in &self.entries {
            match best {
                Some((_, w)) if *weight <= w => {}
                _ => best = Some((label.as_str(), *weight)),
            }
        }
        best
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(l, w)| (l.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.total()
    }
}

impl Serialize for SentimentDistribution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, weight) in &self.entries {
            map.serialize_entry(label, weight)?;
        }
        map.end()
    }
}

/// The fused verdict for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionOutcome {
    pub final_sentiment: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "SentimentDistribution::is_empty")]
    pub distribution: SentimentDistribution,
}

impl FusionOutcome {
    /// The sentinel used when no modality produced a signal.
    pub fn neutral() -> Self {
        Self {
            final_sentiment: "neutral".into(),
            confidence: 0.0,
            distribution: SentimentDistribution::new(),
        }
    }

    pub fn is_neutral_sentinel(&self) -> bool {
        self.distribution.is_empty() && self.final_sentiment == "neutral" && self.confidence == 0.0
    }
}

/// Stateless fusion engine parameterised by modality weights.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    weights: FusionWeights,
}

impl FusionEngine {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.into())
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Fuse typed modality records.
    ///
    /// Failed image sentinels contribute nothing. If nothing contributes at
    /// all, the neutral sentinel is returned.
    pub fn fuse(
        &self,
        text: Option<&ModalityResult>,
        images: &[ImageSentiment],
        audio: Option<&AudioSentiment>,
    ) -> Result<FusionOutcome, FusionError> {
        let mut scores = SentimentDistribution::new();

        for (index, image) in images.iter().enumerate() {
            let record = match image {
                ImageSentiment::Single(record) => record,
                ImageSentiment::Frames(frames) => frames
                    .first()
                    .ok_or(FusionError::EmptyFrameList { index })?,
                ImageSentiment::Failed { error, .. } => {
                    debug!(index, error = %error, "Skipping failed image result");
                    continue;
                }
            };
            let (label, score) = checked(record, "image")?;
            scores.add(&label, score);
        }

        let image_total = scores.total();
        if image_total > 0.0 {
            let image_weight = self.weights.image;
            scores.scale(|w| w / image_weight * image_total);
        }

        if let Some(record) = text {
            let (label, score) = checked(record, "text")?;
            scores.add(&label, self.weights.text * score);
        }

        match audio {
            Some(AudioSentiment::Single(record)) => {
                let (label, score) = checked(record, "audio")?;
                scores.add(&label, self.weights.audio * score);
            }
            // Sequence verdicts are added unweighted.
            Some(AudioSentiment::Sequence(records)) => {
                for record in records {
                    let (label, score) = checked(record, "audio")?;
                    scores.add(&label, score);
                }
            }
            None => {}
        }

        if scores.is_empty() {
            return Ok(FusionOutcome::neutral());
        }

        scores.normalize();

        let (final_sentiment, confidence) = scores
            .argmax()
            .map(|(label, weight)| (label.to_string(), weight))
            .unwrap_or_else(|| ("neutral".to_string(), 0.0));

        debug!(
            final_sentiment = %final_sentiment,
            confidence,
            labels = scores.len(),
            "Fused sentiment"
        );

        Ok(FusionOutcome {
            final_sentiment,
            confidence,
            distribution: scores,
        })
    }

    /// Fuse raw adapter JSON. Records missing `label` or `score`, or of the
    /// wrong shape, are reported as [`FusionError::Malformed`].
    pub fn fuse_json(
        &self,
        text: Option<&serde_json::Value>,
        images: Option<&serde_json::Value>,
        audio: Option<&serde_json::Value>,
    ) -> Result<FusionOutcome, FusionError> {
        self.fuse_records(&ModalityRecords::from_json(text, images, audio)?)
    }

    pub fn fuse_records(&self, records: &ModalityRecords) -> Result<FusionOutcome, FusionError> {
        self.fuse(
            records.text.as_ref(),
            &records.images,
            records.audio.as_ref(),
        )
    }
}

/// The typed adapter output gathered for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModalityRecords {
    pub text: Option<ModalityResult>,
    pub images: Vec<ImageSentiment>,
    pub audio: Option<AudioSentiment>,
}

impl ModalityRecords {
    /// Parse raw adapter JSON into typed records.
    pub fn from_json(
        text: Option<&serde_json::Value>,
        images: Option<&serde_json::Value>,
        audio: Option<&serde_json::Value>,
    ) -> Result<Self, FusionError> {
        Ok(Self {
            text: text.map(|v| parse(v, "text")).transpose()?,
            images: match images {
                Some(v) => parse(v, "image")?,
                None => Vec::new(),
            },
            audio: audio.map(|v| parse(v, "audio")).transpose()?,
        })
    }

    /// Whether any adapter produced output, including failure sentinels.
    pub fn has_signal(&self) -> bool {
        self.text.is_some() || !self.images.is_empty() || self.audio.is_some()
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    value: &serde_json::Value,
    modality: &str,
) -> Result<T, FusionError> {
    serde_json::from_value(value.clone()).map_err(|e| FusionError::Malformed {
        modality: modality.into(),
        reason: e.to_string(),
    })
}

/// Validate a record and return its lowercased label and score.
fn checked(record: &ModalityResult, modality: &str) -> Result<(String, f64), FusionError> {
    let label = record.label.trim().to_lowercase();
    if label.is_empty() {
        return Err(FusionError::EmptyLabel {
            modality: modality.into(),
        });
    }
    if !record.score.is_finite() || !(0.0..=1.0).contains(&record.score) {
        return Err(FusionError::InvalidScore {
            label,
            score: record.score,
        });
    }
    Ok((label, record.score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EPS: f64 = 1e-9;

    fn r(label: &str, score: f64) -> ModalityResult {
        ModalityResult::new(label, score)
    }

    fn engine() -> FusionEngine {
        FusionEngine::default()
    }

    fn assert_normalized(outcome: &FusionOutcome) {
        assert!((outcome.distribution.sum() - 1.0).abs() < EPS);
        let max = outcome
            .distribution
            .iter()
            .map(|(_, w)| w)
            .fold(f64::MIN, f64::max);
        assert!((outcome.confidence - max).abs() < EPS);
        assert_eq!(
            outcome.distribution.get(&outcome.final_sentiment),
            Some(outcome.confidence)
        );
    }

    #[test]
    fn no_inputs_yield_neutral_sentinel() {
        let outcome = engine().fuse(None, &[], None).unwrap();
        assert_eq!(outcome, FusionOutcome::neutral());
        assert_eq!(outcome.final_sentiment, "neutral");
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.is_neutral_sentinel());
    }

    #[test]
    fn text_only_is_fully_confident() {
        let outcome = engine().fuse(Some(&r("joy", 0.9)), &[], None).unwrap();
        assert_eq!(outcome.final_sentiment, "joy");
        assert!((outcome.confidence - 1.0).abs() < EPS);
        assert_eq!(outcome.distribution.len(), 1);
        assert!((outcome.distribution.get("joy").unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn single_audio_only_normalizes_to_one() {
        let audio = AudioSentiment::Single(r("anger", 0.8));
        let outcome = engine().fuse(None, &[], Some(&audio)).unwrap();
        assert_eq!(outcome.final_sentiment, "anger");
        assert!((outcome.distribution.get("anger").unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn labels_are_lowercased_and_merged() {
        let outcome = engine()
            .fuse(
                Some(&r("POSITIVE", 0.5)),
                &[],
                Some(&AudioSentiment::Single(r("Positive", 0.5))),
            )
            .unwrap();
        assert_eq!(outcome.distribution.len(), 1);
        assert_eq!(outcome.final_sentiment, "positive");
    }

    #[test]
    fn text_and_single_audio_use_their_weights() {
        // text: 0.3 * 1.0 = 0.3, audio: 0.5 * 1.0 = 0.5 → 0.375 / 0.625
        let outcome = engine()
            .fuse(
                Some(&r("sad", 1.0)),
                &[],
                Some(&AudioSentiment::Single(r("calm", 1.0))),
            )
            .unwrap();
        assert_normalized(&outcome);
        assert_eq!(outcome.final_sentiment, "calm");
        assert!((outcome.distribution.get("sad").unwrap() - 0.375).abs() < EPS);
        assert!((outcome.distribution.get("calm").unwrap() - 0.625).abs() < EPS);
    }

    #[test]
    fn audio_sequence_is_added_unweighted() {
        // text: 0.3 * 1.0 = 0.3; sequence: 0.6 + 0.3 = 0.9 (no 0.5 multiplier)
        let audio = AudioSentiment::Sequence(vec![r("fear", 0.6), r("fear", 0.3)]);
        let outcome = engine()
            .fuse(Some(&r("joy", 1.0)), &[], Some(&audio))
            .unwrap();
        assert_normalized(&outcome);
        assert!((outcome.distribution.get("fear").unwrap() - 0.75).abs() < EPS);
        assert!((outcome.distribution.get("joy").unwrap() - 0.25).abs() < EPS);
    }

    #[test]
    fn image_rescale_formula_is_pinned() {
        // images: happy 0.5, sad 0.3 → total 0.8
        // rescale: happy 0.5 / 0.2 * 0.8 = 2.0, sad 0.3 / 0.2 * 0.8 = 1.2
        // text: sad += 0.3 * 1.0 → 1.5
        // total 3.5 → happy 4/7, sad 3/7
        let images = vec![
            ImageSentiment::Single(r("happy", 0.5)),
            ImageSentiment::Single(r("sad", 0.3)),
        ];
        let outcome = engine()
            .fuse(Some(&r("sad", 1.0)), &images, None)
            .unwrap();
        assert_normalized(&outcome);
        assert_eq!(outcome.final_sentiment, "happy");
        assert!((outcome.distribution.get("happy").unwrap() - 4.0 / 7.0).abs() < EPS);
        assert!((outcome.distribution.get("sad").unwrap() - 3.0 / 7.0).abs() < EPS);
    }

    #[test]
    fn only_first_frame_of_a_frame_list_counts() {
        let images = vec![ImageSentiment::Frames(vec![r("surprise", 0.7), r("fear", 0.2)])];
        let outcome = engine().fuse(None, &images, None).unwrap();
        assert_eq!(outcome.distribution.len(), 1);
        assert_eq!(outcome.final_sentiment, "surprise");
    }

    #[test]
    fn empty_frame_list_is_structural_failure() {
        let images = vec![
            ImageSentiment::Single(r("happy", 0.4)),
            ImageSentiment::Frames(vec![]),
        ];
        let err = engine().fuse(None, &images, None).unwrap_err();
        assert_eq!(err, FusionError::EmptyFrameList { index: 1 });
    }

    #[test]
    fn failed_image_sentinels_are_skipped() {
        let images = vec![
            ImageSentiment::failed("cannot decode"),
            ImageSentiment::Single(r("neutral", 0.6)),
        ];
        let outcome = engine().fuse(None, &images, None).unwrap();
        assert_eq!(outcome.final_sentiment, "neutral");
        assert!((outcome.confidence - 1.0).abs() < EPS);
    }

    #[test]
    fn only_failed_images_yield_neutral_sentinel() {
        let images = vec![ImageSentiment::failed("timeout")];
        let outcome = engine().fuse(None, &images, None).unwrap();
        assert!(outcome.is_neutral_sentinel());
    }

    #[test]
    fn ties_resolve_to_first_seen_label() {
        let audio = AudioSentiment::Sequence(vec![r("calm", 0.5), r("joy", 0.5)]);
        let outcome = engine().fuse(None, &[], Some(&audio)).unwrap();
        assert_eq!(outcome.final_sentiment, "calm");
        assert!((outcome.confidence - 0.5).abs() < EPS);
    }

    #[test]
    fn all_zero_scores_keep_weights_unnormalized() {
        let outcome = engine().fuse(Some(&r("joy", 0.0)), &[], None).unwrap();
        assert_eq!(outcome.final_sentiment, "joy");
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn out_of_range_score_rejected() {
        let err = engine().fuse(Some(&r("joy", 1.2)), &[], None).unwrap_err();
        assert!(matches!(err, FusionError::InvalidScore { .. }));

        let err = engine()
            .fuse(Some(&r("joy", f64::NAN)), &[], None)
            .unwrap_err();
        assert!(matches!(err, FusionError::InvalidScore { .. }));
    }

    #[test]
    fn blank_label_rejected() {
        let err = engine().fuse(Some(&r("  ", 0.4)), &[], None).unwrap_err();
        assert!(matches!(err, FusionError::EmptyLabel { .. }));
    }

    #[test]
    fn mixed_modalities_stay_normalized() {
        let images = vec![
            ImageSentiment::Frames(vec![r("sad", 0.9)]),
            ImageSentiment::Single(r("neutral", 0.4)),
        ];
        let audio = AudioSentiment::Single(r("sad", 0.7));
        let outcome = engine()
            .fuse(Some(&r("negative", 0.95)), &images, Some(&audio))
            .unwrap();
        assert_normalized(&outcome);
        assert_eq!(outcome.final_sentiment, "sad");
    }

    #[test]
    fn custom_weights_from_config() {
        let config = FusionConfig {
            text_weight: 1.0,
            image_weight: 0.2,
            audio_weight: 0.0,
        };
        let outcome = FusionEngine::from_config(&config)
            .fuse(
                Some(&r("joy", 0.5)),
                &[],
                Some(&AudioSentiment::Single(r("anger", 1.0))),
            )
            .unwrap();
        assert_eq!(outcome.final_sentiment, "joy");
        assert!((outcome.confidence - 1.0).abs() < EPS);
    }

    #[test]
    fn json_record_missing_score_is_malformed() {
        let text = json!({"label": "joy"});
        let err = engine().fuse_json(Some(&text), None, None).unwrap_err();
        assert!(matches!(err, FusionError::Malformed { ref modality, .. } if modality == "text"));
    }

    #[test]
    fn json_shapes_fuse_like_typed_records() {
        let images = json!([
            [{"label": "Happy", "score": 0.8}, {"label": "sad", "score": 0.1}],
            {"error": "bad file", "emotion": "unknown"}
        ]);
        let audio = json!([{"label": "happy", "score": 0.4}]);
        let outcome = engine()
            .fuse_json(None, Some(&images), Some(&audio))
            .unwrap();
        assert_eq!(outcome.final_sentiment, "happy");
        assert!((outcome.confidence - 1.0).abs() < EPS);
    }

    #[test]
    fn distribution_serializes_in_first_seen_order() {
        let audio = AudioSentiment::Sequence(vec![r("zeal", 0.2), r("anger", 0.2)]);
        let outcome = engine().fuse(None, &[], Some(&audio)).unwrap();
        let json = serde_json::to_string(&outcome.distribution).unwrap();
        let zeal = json.find("zeal").unwrap();
        let anger = json.find("anger").unwrap();
        assert!(zeal < anger);
    }

    #[test]
    fn neutral_sentinel_omits_distribution() {
        let json = serde_json::to_value(FusionOutcome::neutral()).unwrap();
        assert_eq!(json, json!({"final_sentiment": "neutral", "confidence": 0.0}));
    }
}
