//! Sensor capability contract and the generic driver wrapper.
//!
//! Concrete sensor types implement [`Sensor`]; [`SensorDriver`] adapts any
//! conforming type into something a node can drive. The wrapper is generic
//! over the sensor type — every capability call resolves statically, there
//! is no trait object between a node and its sensors.
//!
//! The wrapper owns the operating state machine and validates every
//! `control` request before forwarding it:
//!
//! ```text
//! Booting -> Connecting -> { On, Off }
//! On <-> Resetting
//! On | Off -> Idle (terminal)
//! On <-> Off
//! ```

use crate::alog;
use crate::error::{ArgusError, ArgusResult};
use crate::memory::Arena;

/// Sensor operating states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SensorState {
    Booting,
    Connecting,
    On,
    Off,
    Resetting,
    Idle,
}

impl SensorState {
    /// Whether a transition from `self` to `to` is legal.
    pub fn can_transition_to(self, to: SensorState) -> bool {
        use SensorState::*;
        matches!(
            (self, to),
            (Booting, Connecting)
                | (Connecting, On)
                | (Connecting, Off)
                | (On, Off)
                | (On, Resetting)
                | (On, Idle)
                | (Off, On)
                | (Off, Idle)
                | (Resetting, On)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorState::Booting => "Booting",
            SensorState::Connecting => "Connecting",
            SensorState::On => "On",
            SensorState::Off => "Off",
            SensorState::Resetting => "Resetting",
            SensorState::Idle => "Idle",
        }
    }
}

impl std::fmt::Display for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad sensor categories, the type tag of the capability contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SensorKind {
    Lidar,
    Imu,
    Camera,
    Gnss,
    Generic,
}

/// Driver configuration passed to `configure`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SensorParams {
    /// Sample rate hint in Hz.
    pub rate_hz: f64,
    /// Coordinate frame the sensor reports in.
    pub frame: String,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            frame: "base_link".to_string(),
        }
    }
}

/// Capability contract for concrete sensor types.
///
/// Implementations perform the hardware-side work; the state machine and
/// callback bookkeeping live in [`SensorDriver`].
pub trait Sensor: Send {
    /// Sample type this sensor produces.
    type Data: Clone + Send + 'static;

    /// Sensor name.
    fn name(&self) -> &str;

    /// Category tag.
    fn kind(&self) -> SensorKind;

    /// Apply configuration. Called once at wrap time with defaults and
    /// again whenever the host reconfigures.
    fn configure(&mut self, params: &SensorParams) -> ArgusResult<()>;

    /// Establish the hardware connection.
    fn connect(&mut self) -> ArgusResult<()>;

    /// Perform the hardware-side action for an already-validated state
    /// transition.
    fn control(&mut self, desired: SensorState) -> ArgusResult<()>;

    /// Fetch the next sample, if one is ready.
    fn poll(&mut self) -> ArgusResult<Option<Self::Data>>;
}

type DataCallback<D> = Box<dyn Fn(&D) + Send>;

/// Generic adapter that turns any [`Sensor`] into something a node can
/// drive.
///
/// Construction immediately configures the sensor with default parameters
/// and connects it, leaving it in `Connecting`; the host then requests
/// `On` through [`SensorDriver::control`].
pub struct SensorDriver<S: Sensor> {
    sensor: S,
    state: SensorState,
    params: SensorParams,
    callback: Option<DataCallback<S::Data>>,
    arena: Arena,
}

impl<S: Sensor> SensorDriver<S> {
    /// Wrap `sensor`, configure it with `SensorParams::default()`, and
    /// connect. Allocations the driver makes on behalf of the sensor come
    /// from `arena` (the owning node's).
    pub fn new(sensor: S, arena: &Arena) -> ArgusResult<Self> {
        Self::with_params(sensor, arena, SensorParams::default())
    }

    /// Wrap with explicit parameters.
    pub fn with_params(mut sensor: S, arena: &Arena, params: SensorParams) -> ArgusResult<Self> {
        sensor.configure(&params)?;
        sensor.connect()?;
        Ok(Self {
            sensor,
            state: SensorState::Connecting,
            params,
            callback: None,
            arena: arena.clone(),
        })
    }

    /// Sensor name, forwarded.
    pub fn name(&self) -> &str {
        self.sensor.name()
    }

    /// Category tag, forwarded.
    pub fn kind(&self) -> SensorKind {
        self.sensor.kind()
    }

    /// Current operating state.
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Active configuration.
    pub fn params(&self) -> &SensorParams {
        &self.params
    }

    /// Arena this driver charges its allocations to.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Reconfigure the sensor in place.
    pub fn configure(&mut self, params: SensorParams) -> ArgusResult<()> {
        self.sensor.configure(&params)?;
        self.params = params;
        Ok(())
    }

    /// Register the user callback invoked on every new sample. At most one
    /// callback; a second registration replaces the first.
    pub fn register_cb(&mut self, callback: impl Fn(&S::Data) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Request a state transition.
    ///
    /// Invalid requests fail with [`ArgusError::InvalidStateTransition`]
    /// and leave the state unchanged; a hardware-side failure from the
    /// sensor also leaves the recorded state unchanged.
    pub fn control(&mut self, desired: SensorState) -> ArgusResult<()> {
        if !self.state.can_transition_to(desired) {
            return Err(ArgusError::InvalidStateTransition {
                from: self.state.to_string(),
                to: desired.to_string(),
            });
        }
        self.sensor.control(desired)?;
        alog!(debug, "sensor '{}': {} -> {}", self.sensor.name(), self.state, desired);
        self.state = desired;
        Ok(())
    }

    /// Poll the sensor once while `On`, feeding the sample to the
    /// registered callback. Returns the sample.
    ///
    /// Polling in any state other than `On` is not an error — the sensor
    /// simply has nothing to give.
    pub fn service(&mut self) -> ArgusResult<Option<S::Data>> {
        if self.state != SensorState::On {
            return Ok(None);
        }
        let sample = self.sensor.poll()?;
        if let (Some(sample), Some(callback)) = (&sample, &self.callback) {
            callback(sample);
        }
        Ok(sample)
    }

    /// Poll once and publish any sample to `topic`. The loop a
    /// sensor-driven node's `tick` typically calls.
    pub fn pump_into(&mut self, topic: &crate::communication::Topic<S::Data>) -> ArgusResult<bool> {
        match self.service()? {
            Some(sample) => {
                topic.publish(sample)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<S: Sensor> std::fmt::Debug for SensorDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorDriver")
            .field("name", &self.sensor.name())
            .field("kind", &self.sensor.kind())
            .field("state", &self.state)
            .finish()
    }
}
