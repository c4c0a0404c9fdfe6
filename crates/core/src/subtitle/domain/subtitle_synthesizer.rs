use super::subtitle_document::{DialogueEvent, SubtitleDocument, SubtitleStyle};
use crate::audio::domain::transcript::Transcript;
use crate::shared::constants::PCM_SAMPLE_RATE;
use crate::shared::settings::{Settings, TimingMode};
use crate::shared::video_metadata::VideoMetadata;

/// How transcript entries are placed on the subtitle timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SubtitleTiming {
    /// Events run back to back from zero, each lasting `duration` seconds.
    /// Timing follows ordinal position among non-empty entries.
    FixedDuration { duration: f64 },
    /// Each event covers its own chunk: `index * chunk_seconds` for `chunk_seconds`.
    ChunkOffset { chunk_seconds: f64 },
}

/// Maps an ordered transcript and a video canvas to a subtitle document.
pub struct SubtitleSynthesizer {
    timing: SubtitleTiming,
}

impl SubtitleSynthesizer {
    pub fn new(timing: SubtitleTiming) -> Self {
        Self { timing }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let timing = match settings.timing {
            TimingMode::Fixed => SubtitleTiming::FixedDuration {
                duration: settings.event_duration_secs,
            },
            TimingMode::ChunkOffset => SubtitleTiming::ChunkOffset {
                chunk_seconds: settings.chunk_size as f64 / PCM_SAMPLE_RATE as f64,
            },
        };
        Self::new(timing)
    }

    pub fn timing(&self) -> SubtitleTiming {
        self.timing
    }

    pub fn synthesize(&self, transcript: &Transcript, video: &VideoMetadata) -> SubtitleDocument {
        let mut events = Vec::with_capacity(transcript.len());
        let mut cursor = 0.0;

        for entry in transcript.entries() {
            let (start, end) = match self.timing {
                SubtitleTiming::FixedDuration { duration } => (cursor, cursor + duration),
                SubtitleTiming::ChunkOffset { chunk_seconds } => {
                    let start = entry.index as f64 * chunk_seconds;
                    (start, start + chunk_seconds)
                }
            };
            events.push(DialogueEvent {
                start,
                end,
                text: entry.text.trim().to_string(),
            });
            cursor = end;
        }

        SubtitleDocument::new(
            video.width,
            video.height,
            SubtitleStyle::for_canvas_height(video.height),
            events,
        )
    }
}

impl Default for SubtitleSynthesizer {
    fn default() -> Self {
        Self::new(SubtitleTiming::FixedDuration {
            duration: crate::shared::constants::DEFAULT_EVENT_DURATION_SECS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::domain::transcript::RecognitionResult;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn transcript(entries: &[(usize, &str)]) -> Transcript {
        Transcript::assemble(
            entries
                .iter()
                .map(|&(i, t)| RecognitionResult::new(i, t))
                .collect(),
        )
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    #[case(37)]
    fn test_fixed_timing_one_event_per_entry(#[case] n: usize) {
        let entries: Vec<(usize, String)> = (0..n).map(|i| (i * 3, format!("line {i}"))).collect();
        let refs: Vec<(usize, &str)> = entries.iter().map(|(i, t)| (*i, t.as_str())).collect();
        let doc = SubtitleSynthesizer::default()
            .synthesize(&transcript(&refs), &VideoMetadata::new(1280, 720));

        assert_eq!(doc.events().len(), n);
        for (i, event) in doc.events().iter().enumerate() {
            assert_relative_eq!(event.start, 2.0 * i as f64);
            assert_relative_eq!(event.end, 2.0 * (i + 1) as f64);
            assert_eq!(event.text, format!("line {i}"));
        }
    }

    #[test]
    fn test_empty_entries_leave_no_gap() {
        let doc = SubtitleSynthesizer::default().synthesize(
            &transcript(&[(0, "a"), (1, ""), (2, " "), (3, "b")]),
            &VideoMetadata::new(640, 480),
        );
        assert_eq!(doc.events().len(), 2);
        assert_relative_eq!(doc.events()[1].start, 2.0);
        assert_relative_eq!(doc.events()[1].end, 4.0);
    }

    #[test]
    fn test_chunk_offset_timing_uses_index() {
        let synth = SubtitleSynthesizer::new(SubtitleTiming::ChunkOffset { chunk_seconds: 2.5 });
        let doc = synth.synthesize(
            &transcript(&[(0, "a"), (4, "b")]),
            &VideoMetadata::new(640, 480),
        );
        assert_relative_eq!(doc.events()[0].start, 0.0);
        assert_relative_eq!(doc.events()[0].end, 2.5);
        assert_relative_eq!(doc.events()[1].start, 10.0);
        assert_relative_eq!(doc.events()[1].end, 12.5);
    }

    #[test]
    fn test_header_matches_probed_dimensions() {
        let video = VideoMetadata::new(1366, 768);
        let doc = SubtitleSynthesizer::default().synthesize(&transcript(&[(0, "x")]), &video);
        assert_eq!((doc.width(), doc.height()), (video.width, video.height));
        assert_eq!(doc.style().font_size, 768 / 20);
    }

    #[test]
    fn test_from_settings_maps_timing_mode() {
        let fixed = SubtitleSynthesizer::from_settings(&Settings {
            event_duration_secs: 3.0,
            ..Settings::default()
        });
        assert_eq!(fixed.timing(), SubtitleTiming::FixedDuration { duration: 3.0 });

        let offset = SubtitleSynthesizer::from_settings(&Settings {
            timing: TimingMode::ChunkOffset,
            chunk_size: 40_000,
            ..Settings::default()
        });
        match offset.timing() {
            SubtitleTiming::ChunkOffset { chunk_seconds } => {
                assert_relative_eq!(chunk_seconds, 2.5)
            }
            other => panic!("expected chunk-offset timing, got {other:?}"),
        }
    }
}
