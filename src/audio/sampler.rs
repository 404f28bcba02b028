use std::time::Duration;

use super::history::HistoryBuffer;

/// Tuning for the boost envelope.
#[derive(Clone, Copy, Debug)]
pub struct EnvelopeParams {
    /// Value the boost jumps to when a peak triggers it.
    pub boost_max: u8,
    /// Amount subtracted per tick while the boost is above this same amount.
    pub decay_step: u8,
    /// Minimum rise between consecutive window peaks that re-triggers the boost.
    pub trigger_delta: f32,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            boost_max: 75,
            decay_step: 3,
            trigger_delta: 0.2,
        }
    }
}

/// Additive brightness envelope.
#[derive(Clone, Copy, Debug)]
pub struct Boost {
    value: u8,
    max: u8,
    decay_step: u8,
}

impl Boost {
    pub fn new(max: u8, decay_step: u8) -> Self {
        Self {
            value: 0,
            max,
            decay_step,
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Linear decay. Values at or below one step are left where they are.
    pub fn decay(&mut self) {
        if self.value > self.decay_step {
            self.value -= self.decay_step;
        }
    }

    pub fn trigger(&mut self) {
        self.value = self.max;
    }
}

/// Result of one sampler tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleTick {
    pub peak: f32,
    pub boost: u8,
    pub triggered: bool,
}

/// Walks PCM one fixed-size window per tick and tracks the boost envelope.
pub struct EnvelopeSampler<'a> {
    pcm: &'a [f32],
    step: usize,
    index: usize,
    /// Peaks are quantized to hundredths, so the trigger compares whole hundredths.
    previous_centi: i32,
    trigger_centi: i32,
    boost: Boost,
}

impl<'a> EnvelopeSampler<'a> {
    pub fn new(pcm: &'a [f32], sample_rate: u32, interval: Duration, params: EnvelopeParams) -> Self {
        Self::with_step(pcm, window_step(sample_rate, interval), params)
    }

    pub fn with_step(pcm: &'a [f32], step: usize, params: EnvelopeParams) -> Self {
        Self {
            pcm,
            step: step.max(1),
            index: 0,
            previous_centi: 0,
            trigger_centi: to_centi(params.trigger_delta),
            boost: Boost::new(params.boost_max, params.decay_step),
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn boost(&self) -> u8 {
        self.boost.value()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.pcm.len()
    }

    /// Number of ticks needed to consume the whole PCM slice.
    pub fn total_ticks(&self) -> usize {
        self.pcm.len().div_ceil(self.step)
    }

    /// Samples the next window and pushes its peak onto `history`.
    ///
    /// Returns `None` once the PCM is exhausted; state is left untouched
    /// from then on.
    pub fn advance(&mut self, history: &mut HistoryBuffer) -> Option<SampleTick> {
        if self.is_finished() {
            return None;
        }

        let end = (self.index + self.step).min(self.pcm.len());
        let peak = window_peak(&self.pcm[self.index..end]);

        let centi = to_centi(peak);

        self.boost.decay();
        let triggered = centi - self.previous_centi >= self.trigger_centi;
        if triggered {
            self.boost.trigger();
        }

        history.push(peak);

        self.previous_centi = centi;
        self.index = end;

        Some(SampleTick {
            peak,
            boost: self.boost.value(),
            triggered,
        })
    }
}

/// Samples per tick for the given rate and interval, never less than one.
pub fn window_step(sample_rate: u32, interval: Duration) -> usize {
    let step = (sample_rate as f64 * interval.as_secs_f64()).round() as usize;
    step.max(1)
}

/// Largest sample magnitude in the window, rounded to two decimals.
pub fn window_peak(window: &[f32]) -> f32 {
    let mut peak = 0.0f32;
    for sample in window {
        let magnitude = sample.abs();
        if magnitude > peak {
            peak = round_centi(magnitude);
        }
    }
    peak
}

/// Value in whole hundredths, rounded half away from zero.
pub fn to_centi(value: f32) -> i32 {
    (value as f64 * 100.0).round() as i32
}

fn round_centi(value: f32) -> f32 {
    (to_centi(value) as f64 / 100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EnvelopeParams {
        EnvelopeParams::default()
    }

    #[test]
    fn step_from_rate_and_interval() {
        assert_eq!(window_step(48_000, Duration::from_millis(15)), 720);
        assert_eq!(window_step(8_000, Duration::from_millis(20)), 160);
        assert_eq!(window_step(10, Duration::from_millis(15)), 1);
    }

    #[test]
    fn peak_uses_magnitude_and_rounds() {
        assert_eq!(window_peak(&[0.1, -0.456, 0.3]), 0.46);
        assert_eq!(window_peak(&[0.123]), 0.12);
        assert_eq!(window_peak(&[]), 0.0);
        assert_eq!(window_peak(&[-0.0, 0.0]), 0.0);
    }

    #[test]
    fn peak_rounds_the_sample_not_the_product() {
        // 0.915f32 is stored as 0.91499996
        assert_eq!(window_peak(&[0.915]), 0.91);
        assert_eq!(window_peak(&[0.925]), 0.93);
        assert_eq!(to_centi(0.915), 91);
    }

    #[test]
    fn peak_resets_each_window() {
        let pcm = [0.9, 0.9, 0.1, 0.1];
        let mut history = HistoryBuffer::new(4);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 2, params());

        assert_eq!(sampler.advance(&mut history).unwrap().peak, 0.9);
        assert_eq!(sampler.advance(&mut history).unwrap().peak, 0.1);
    }

    #[test]
    fn trigger_sets_boost_to_max() {
        let pcm = [0.5];
        let mut history = HistoryBuffer::new(1);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

        let tick = sampler.advance(&mut history).unwrap();
        assert!(tick.triggered);
        assert_eq!(tick.boost, 75);
    }

    #[test]
    fn trigger_overrides_partial_decay() {
        // 0.0 -> 0.5 triggers, then 0.1 lets it decay, then 0.1 -> 0.4 triggers again
        let pcm = [0.5, 0.1, 0.1, 0.4];
        let mut history = HistoryBuffer::new(4);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

        let boosts: Vec<u8> = std::iter::from_fn(|| sampler.advance(&mut history))
            .map(|t| t.boost)
            .collect();
        assert_eq!(boosts, vec![75, 72, 69, 75]);
    }

    #[test]
    fn rise_of_exactly_the_delta_triggers() {
        for (from, to) in [(0.25f32, 0.45f32), (0.3, 0.5), (0.06, 0.26), (0.45, 0.65), (0.0, 0.2)] {
            let pcm = [from, from, to];
            let mut history = HistoryBuffer::new(3);
            let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

            sampler.advance(&mut history);
            sampler.advance(&mut history);
            let tick = sampler.advance(&mut history).unwrap();
            assert!(tick.triggered, "{} -> {} should trigger", from, to);
            assert_eq!(tick.boost, 75);
        }
    }

    #[test]
    fn rise_just_below_the_delta_does_not_trigger() {
        let pcm = [0.26, 0.26, 0.45];
        let mut history = HistoryBuffer::new(3);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

        assert!(sampler.advance(&mut history).unwrap().triggered);
        sampler.advance(&mut history);
        let tick = sampler.advance(&mut history).unwrap();
        assert!(!tick.triggered);
        assert_eq!(tick.boost, 69);
    }

    #[test]
    fn falling_amplitude_never_triggers() {
        let pcm = [0.9, 0.1, 0.05];
        let mut history = HistoryBuffer::new(3);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

        assert!(sampler.advance(&mut history).unwrap().triggered);
        assert!(!sampler.advance(&mut history).unwrap().triggered);
        assert!(!sampler.advance(&mut history).unwrap().triggered);
    }

    #[test]
    fn decay_stops_at_one_step() {
        let mut pcm = vec![0.5f32];
        pcm.extend(std::iter::repeat(0.5).take(40));
        let mut history = HistoryBuffer::new(8);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

        let boosts: Vec<u8> = std::iter::from_fn(|| sampler.advance(&mut history))
            .map(|t| t.boost)
            .collect();

        assert_eq!(boosts[0], 75);
        for pair in boosts.windows(2) {
            if pair[0] > 3 {
                assert_eq!(pair[1], pair[0] - 3);
            } else {
                assert_eq!(pair[1], pair[0]);
            }
        }
        assert_eq!(*boosts.last().unwrap(), 3);
    }

    #[test]
    fn decay_floor_with_uneven_step() {
        let mut boost = Boost::new(10, 4);
        boost.trigger();
        let mut seen = Vec::new();
        for _ in 0..5 {
            boost.decay();
            seen.push(boost.value());
        }
        assert_eq!(seen, vec![6, 2, 2, 2, 2]);
    }

    #[test]
    fn boost_never_exceeds_max() {
        let pcm: Vec<f32> = (0..200).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();
        let mut history = HistoryBuffer::new(16);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

        while let Some(tick) = sampler.advance(&mut history) {
            assert!(tick.boost <= 75);
        }
    }

    #[test]
    fn completes_once_on_exact_multiple() {
        let pcm = vec![0.2f32; 12];
        let mut history = HistoryBuffer::new(4);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 3, params());

        assert_eq!(sampler.total_ticks(), 4);
        let mut ticks = 0;
        while sampler.advance(&mut history).is_some() {
            ticks += 1;
        }
        assert_eq!(ticks, 4);
        assert!(sampler.is_finished());
        assert!(sampler.advance(&mut history).is_none());
    }

    #[test]
    fn final_partial_window_is_sampled() {
        let pcm = [0.0, 0.0, 0.0, 0.0, 0.7];
        let mut history = HistoryBuffer::new(2);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 2, params());

        assert_eq!(sampler.total_ticks(), 3);
        sampler.advance(&mut history);
        sampler.advance(&mut history);
        let last = sampler.advance(&mut history).unwrap();
        assert_eq!(last.peak, 0.7);
        assert!(sampler.advance(&mut history).is_none());
    }

    #[test]
    fn pushes_peaks_newest_first() {
        let pcm = [0.05, 0.05, 0.6, 0.05];
        let mut history = HistoryBuffer::new(4);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 1, params());

        for _ in 0..3 {
            sampler.advance(&mut history);
        }
        let values: Vec<f32> = history.iter().collect();
        assert_eq!(values, vec![0.6, 0.05, 0.05, 0.0]);
        assert_eq!(sampler.boost(), 75);
    }

    #[test]
    fn empty_pcm_is_finished_immediately() {
        let pcm: [f32; 0] = [];
        let mut history = HistoryBuffer::new(2);
        let mut sampler = EnvelopeSampler::with_step(&pcm, 4, params());

        assert!(sampler.is_finished());
        assert_eq!(sampler.total_ticks(), 0);
        assert!(sampler.advance(&mut history).is_none());
    }
}
