//! Reference parameter provider: a day/night clock plus rotating weather.
//!
//! The pipeline only ever sees the `PipelineParameters` this produces; all
//! animation state lives here.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

use crate::params::PipelineParameters;

/// Supplies the per-frame parameters
pub trait ParameterProvider {
    /// Advance the provider's clock by `dt` seconds
    fn advance(&mut self, dt: f32);

    fn parameters(&self) -> PipelineParameters;
}

/// Snapshot of the day/night clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInfo {
    pub is_day: bool,
    /// 0 to 1 within the current day or night
    pub phase: f32,
    /// Lighting intensity, 0 to 1
    pub transition_factor: f32,
    /// 0 at noon, 0.5 at sunrise and sunset, 1 at midnight
    pub time_of_day: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayNightCycle {
    pub cycle_seconds: f32,
    pub day_seconds: f32,
}

impl Default for DayNightCycle {
    fn default() -> Self {
        // 15 minute cycle, 10 minutes of daylight
        Self { cycle_seconds: 15.0 * 60.0, day_seconds: 10.0 * 60.0 }
    }
}

impl DayNightCycle {
    pub fn night_seconds(&self) -> f32 {
        self.cycle_seconds - self.day_seconds
    }

    /// Sun angle for a point in the cycle: -π/2 at sunrise, 0 at noon,
    /// π/2 at sunset, π at midnight
    fn sun_angle(&self, is_day: bool, phase: f32) -> f32 {
        if is_day { (phase - 0.5) * PI } else { FRAC_PI_2 + phase * PI }
    }

    pub fn sample(&self, elapsed: f32) -> TimeInfo {
        let cycle_time = elapsed.rem_euclid(self.cycle_seconds);
        let is_day = cycle_time < self.day_seconds;
        let phase = if is_day {
            cycle_time / self.day_seconds
        } else {
            (cycle_time - self.day_seconds) / self.night_seconds()
        };

        let transition_factor = if is_day {
            // Dawn to noon ramps up, afternoon fades slightly
            if phase < 0.5 { phase * 2.0 } else { 1.0 - (phase - 0.5) * 0.4 }
        } else {
            0.2 * (1.0 - (phase - 0.5).abs() * 2.0).max(0.0)
        };

        // Continuous over the whole cycle, including the wrap at sunrise
        let time_of_day = (1.0 - self.sun_angle(is_day, phase).cos()) * 0.5;

        TimeInfo { is_day, phase, transition_factor, time_of_day: time_of_day.clamp(0.0, 1.0) }
    }

    /// Seconds into the cycle at which the clock reads `time_of_day` on the
    /// way from noon to midnight
    pub fn seconds_at(&self, time_of_day: f32) -> f32 {
        let angle = (1.0 - 2.0 * time_of_day.clamp(0.0, 1.0)).acos();
        if angle <= FRAC_PI_2 {
            (angle / PI + 0.5) * self.day_seconds
        } else {
            self.day_seconds + (angle - FRAC_PI_2) / PI * self.night_seconds()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    Cloudy,
    Rainy,
    Stormy,
    Snowy,
    Foggy,
    Windy,
}

impl Weather {
    pub const ALL: [Weather; 7] = [
        Weather::Clear,
        Weather::Cloudy,
        Weather::Rainy,
        Weather::Stormy,
        Weather::Snowy,
        Weather::Foggy,
        Weather::Windy,
    ];

    /// Above 0.5 the storm grading kicks in
    pub fn intensity(self) -> f32 {
        match self {
            Weather::Clear => 0.0,
            Weather::Cloudy => 0.3,
            Weather::Rainy => 0.6,
            Weather::Stormy => 1.0,
            Weather::Snowy => 0.4,
            Weather::Foggy => 0.5,
            Weather::Windy => 0.1,
        }
    }

    pub fn fog_scale(self) -> f32 {
        match self {
            Weather::Foggy => 8.0,
            Weather::Stormy => 6.0,
            Weather::Rainy => 4.0,
            _ => 1.0,
        }
    }

    pub fn next(self) -> Weather {
        let i = Weather::ALL.iter().position(|&w| w == self).unwrap_or(0);
        Weather::ALL[(i + 1) % Weather::ALL.len()]
    }
}

/// Seconds between automatic weather changes
pub const WEATHER_INTERVAL: f32 = 300.0;

/// Day/night clock and weather on top of a base parameter set
#[derive(Debug, Clone)]
pub struct Environment {
    cycle: DayNightCycle,
    base: PipelineParameters,
    elapsed: f32,
    weather: Weather,
    weather_timer: f32,
    /// Rotate weather every `WEATHER_INTERVAL` seconds
    pub auto_weather: bool,
}

impl Environment {
    pub fn new(base: PipelineParameters) -> Self {
        Self {
            cycle: DayNightCycle::default(),
            base,
            elapsed: 0.0,
            weather: Weather::Clear,
            weather_timer: 0.0,
            auto_weather: true,
        }
    }

    pub fn with_cycle(mut self, cycle: DayNightCycle) -> Self {
        self.cycle = cycle;
        self
    }

    /// Start the clock at the given time of day
    pub fn at_time_of_day(mut self, time_of_day: f32) -> Self {
        self.set_time_of_day(time_of_day);
        self
    }

    /// Jump to `time_of_day` within the current cycle
    pub fn set_time_of_day(&mut self, time_of_day: f32) {
        let cycle_start = self.elapsed - self.elapsed.rem_euclid(self.cycle.cycle_seconds);
        self.elapsed = cycle_start + self.cycle.seconds_at(time_of_day);
    }

    /// Move the clock by `seconds`, either direction, without ticking the
    /// weather
    pub fn scrub(&mut self, seconds: f32) {
        self.elapsed = (self.elapsed + seconds).max(0.0);
    }

    pub fn cycle(&self) -> &DayNightCycle {
        &self.cycle
    }

    pub fn base_mut(&mut self) -> &mut PipelineParameters {
        &mut self.base
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn set_weather(&mut self, weather: Weather) {
        if weather != self.weather {
            log::info!("weather: {:?} -> {:?}", self.weather, weather);
        }
        self.weather = weather;
        self.weather_timer = 0.0;
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn time_info(&self) -> TimeInfo {
        self.cycle.sample(self.elapsed)
    }
}

impl ParameterProvider for Environment {
    fn advance(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.elapsed += dt;

        if self.auto_weather {
            self.weather_timer += dt;
            while self.weather_timer >= WEATHER_INTERVAL {
                self.weather_timer -= WEATHER_INTERVAL;
                let next = self.weather.next();
                log::info!("weather: {:?} -> {:?}", self.weather, next);
                self.weather = next;
            }
        }
    }

    fn parameters(&self) -> PipelineParameters {
        let time = self.time_info();
        PipelineParameters {
            time_of_day: time.time_of_day,
            weather_intensity: self.weather.intensity(),
            fog_scale: self.weather.fog_scale(),
            elapsed: self.elapsed,
            ..self.base
        }
    }
}
