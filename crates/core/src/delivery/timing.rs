use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Pacing knobs, overridable per tenant. Speeds are characters per second;
/// busy/thinking windows are seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    pub reading_speed: f64,
    pub typing_speed: f64,
    pub min_busy_time: f64,
    pub max_busy_time: f64,
    pub min_thinking_time: f64,
    pub max_thinking_time: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reading_speed: 50.0,
            typing_speed: 8.0,
            min_busy_time: 0.5,
            max_busy_time: 2.0,
            min_thinking_time: 1.0,
            max_thinking_time: 2.5,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reading_speed <= 0.0 || self.typing_speed <= 0.0 {
            return Err(ConfigError::Validation(
                "reading and typing speeds must be positive".to_owned(),
            ));
        }
        if self.min_busy_time > self.max_busy_time
            || self.min_thinking_time > self.max_thinking_time
            || self.min_busy_time < 0.0
            || self.min_thinking_time < 0.0
        {
            return Err(ConfigError::Validation(
                "busy/thinking windows must be non-negative with min <= max".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Pure pacing calculation; the caller owns the actual suspension before
/// each send.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeliveryTimingModel {
    config: TimingConfig,
}

impl DeliveryTimingModel {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    /// Time a human would spend reading the inbound message.
    pub fn reading_time_ms(&self, inbound_text: &str) -> u64 {
        chars_to_ms(inbound_text, self.config.reading_speed)
    }

    /// Time a human would spend typing the chunk.
    pub fn typing_time_ms(&self, chunk_text: &str) -> u64 {
        chars_to_ms(chunk_text, self.config.typing_speed)
    }

    /// Delay before emitting one chunk. The first chunk pays for reading the
    /// inbound message plus a randomized "busy" window; later chunks pay a
    /// shorter "thinking" window. Both include typing time for the chunk.
    pub fn chunk_delay_ms<R: Rng>(
        &self,
        inbound_text: &str,
        chunk_text: &str,
        chunk_index: usize,
        rng: &mut R,
    ) -> u64 {
        let typing = self.typing_time_ms(chunk_text);
        if chunk_index == 0 {
            let busy = sample_secs(rng, self.config.min_busy_time, self.config.max_busy_time);
            self.reading_time_ms(inbound_text) + typing + busy
        } else {
            let thinking =
                sample_secs(rng, self.config.min_thinking_time, self.config.max_thinking_time);
            typing + thinking
        }
    }
}

fn chars_to_ms(text: &str, chars_per_sec: f64) -> u64 {
    (text.chars().count() as f64 / chars_per_sec * 1000.0).floor() as u64
}

fn sample_secs<R: Rng>(rng: &mut R, min: f64, max: f64) -> u64 {
    let secs = if max > min { rng.gen_range(min..=max) } else { min };
    (secs * 1000.0).floor() as u64
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::{DeliveryTimingModel, TimingConfig};

    fn fixed_windows(busy: f64, thinking: f64) -> TimingConfig {
        TimingConfig {
            min_busy_time: busy,
            max_busy_time: busy,
            min_thinking_time: thinking,
            max_thinking_time: thinking,
            ..TimingConfig::default()
        }
    }

    #[test]
    fn typing_time_follows_the_documented_formula() {
        let model = DeliveryTimingModel::new(TimingConfig::default());
        let text = "x".repeat(80);
        assert_eq!(model.typing_time_ms(&text), 10_000);
    }

    #[test]
    fn reading_time_uses_inbound_length() {
        let model = DeliveryTimingModel::new(TimingConfig::default());
        assert_eq!(model.reading_time_ms("Hi"), 40);
        assert_eq!(model.reading_time_ms(""), 0);
    }

    #[test]
    fn first_chunk_pays_reading_plus_busy() {
        let model = DeliveryTimingModel::new(fixed_windows(1.0, 2.0));
        let mut rng = StepRng::new(0, 0);

        // 2 chars read at 50cps = 40ms; 8 chars typed at 8cps = 1000ms.
        let delay = model.chunk_delay_ms("Hi", "12345678", 0, &mut rng);
        assert_eq!(delay, 40 + 1000 + 1000);
    }

    #[test]
    fn later_chunks_pay_typing_plus_thinking_only() {
        let model = DeliveryTimingModel::new(fixed_windows(1.0, 2.0));
        let mut rng = StepRng::new(0, 0);

        let delay = model.chunk_delay_ms("Hi", "12345678", 1, &mut rng);
        assert_eq!(delay, 1000 + 2000);
    }

    #[test]
    fn randomized_delay_stays_within_the_window() {
        let model = DeliveryTimingModel::new(TimingConfig::default());
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let delay = model.chunk_delay_ms("Hi", "", 0, &mut rng);
            // reading 40ms + busy in [500, 2000]ms.
            assert!((540..=2040).contains(&delay));
        }
    }

    #[test]
    fn inverted_windows_fail_validation() {
        let config = TimingConfig { min_busy_time: 3.0, max_busy_time: 1.0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
