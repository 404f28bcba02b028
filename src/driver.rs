use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::audio::history::HistoryBuffer;
use crate::audio::sampler::{to_centi, EnvelopeSampler, SampleTick};
use crate::opc::client::TransportError;
use crate::opc::FrameSink;
use crate::render::frame::{render_frame, RenderParams};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    /// PCM exhausted.
    Finished,
    /// The LED session was lost.
    Aborted,
    /// Stopped from outside before the PCM ran out.
    Cancelled,
}

impl DriverState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DriverState::Finished | DriverState::Aborted | DriverState::Cancelled
        )
    }
}

/// Owns all per-run state and advances sampler → renderer → transport once per tick.
pub struct TickDriver<'a, S: FrameSink> {
    sampler: EnvelopeSampler<'a>,
    history: HistoryBuffer,
    params: RenderParams,
    sink: S,
    channel: u8,
    interval: Duration,
    state: DriverState,
    ticks: u64,
    dropped_frames: u64,
}

impl<'a, S: FrameSink> TickDriver<'a, S> {
    pub fn new(
        sampler: EnvelopeSampler<'a>,
        led_count: usize,
        params: RenderParams,
        sink: S,
        channel: u8,
        interval: Duration,
    ) -> Self {
        Self {
            sampler,
            history: HistoryBuffer::new(led_count),
            params,
            sink,
            channel,
            interval,
            state: DriverState::Idle,
            ticks: 0,
            dropped_frames: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[cfg(test)]
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Sends the frame for the untouched history so the strip starts dark.
    pub fn send_initial_frame(&mut self) -> Result<(), TransportError> {
        let frame = render_frame(&self.history, self.sampler.boost(), &self.params);
        self.sink.send_frame(self.channel, &frame)
    }

    /// Runs one tick without waiting. Terminal states are sticky.
    pub fn tick(&mut self) -> DriverState {
        if self.state.is_terminal() {
            return self.state;
        }
        if self.state == DriverState::Idle {
            log::info!(
                "Sampling started: {} samples per tick, {} ticks",
                self.sampler.step(),
                self.sampler.total_ticks()
            );
            self.state = DriverState::Running;
        }

        let Some(sample) = self.sampler.advance(&mut self.history) else {
            log::info!("Finished sampling sound");
            self.finish(DriverState::Finished);
            return self.state;
        };
        self.ticks += 1;
        log::trace!("{}", peak_bars(&sample));

        let frame = render_frame(&self.history, sample.boost, &self.params);

        if !self.sink.is_open() {
            log::error!("LED controller session is no longer open");
            self.finish(DriverState::Aborted);
            return self.state;
        }

        match self.sink.send_frame(self.channel, &frame) {
            Ok(()) => {}
            Err(err) if err.is_fatal() => {
                log::error!("Stopping after {} ticks: {}", self.ticks, err);
                self.finish(DriverState::Aborted);
            }
            Err(err) => {
                self.dropped_frames += 1;
                log::debug!("Tick {}: {}", self.ticks, err);
            }
        }

        self.state
    }

    /// Stops a run that has not reached a terminal state yet.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            log::info!("Sampling cancelled after {} ticks", self.ticks);
            self.finish(DriverState::Cancelled);
        }
    }

    /// Ticks at a fixed rate until a terminal state or until `stop` is set.
    ///
    /// Each deadline is the previous one plus the interval. A late tick fires
    /// immediately; once more than one interval behind, the schedule restarts
    /// from now instead of bursting.
    pub fn run(&mut self, stop: &AtomicBool) -> DriverState {
        let pb = ProgressBar::new(self.sampler.total_ticks() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ticks ({eta} remaining)")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        let mut deadline = Instant::now();
        loop {
            if stop.load(Ordering::SeqCst) {
                self.cancel();
                break;
            }

            let state = self.tick();
            if state.is_terminal() {
                break;
            }
            pb.set_position(self.ticks);

            deadline += self.interval;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else if now - deadline > self.interval {
                log::debug!("Tick loop fell behind by {:?}, resetting schedule", now - deadline);
                deadline = now;
            }
        }

        match self.state {
            DriverState::Finished => pb.finish_with_message("Sampling complete"),
            _ => pb.abandon(),
        }
        if self.dropped_frames > 0 {
            log::warn!("{} of {} frames were dropped", self.dropped_frames, self.ticks);
        }

        self.state
    }

    fn finish(&mut self, state: DriverState) {
        self.state = state;
        self.sink.close();
    }
}

/// Text bar graph of a window peak, flagged when it triggered the boost.
fn peak_bars(sample: &SampleTick) -> String {
    // ceil(peak * 50) + 2, taken on the two-decimal peak
    let half = (to_centi(sample.peak).max(0) + 1) / 2;
    let count = half as usize + 2;
    let mut bars = "|".repeat(count);
    if sample.triggered {
        bars.push_str(" == peak ==");
    }
    bars
}
