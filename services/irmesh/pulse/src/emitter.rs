//! Infrared emitter boundary.
//!
//! An [`Emitter`] is a digital output that is amplitude-modulated with a fixed
//! carrier during marks and left unmodulated during spaces.

use crate::error::EmitterError;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Carrier modulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carrier {
    /// Modulation frequency
    pub frequency_hz: u32,
    /// On-time fraction in percent
    pub duty_percent: u8,
}

impl Carrier {
    /// Standard consumer IR carrier: 38 kHz at 50 % duty
    pub const IR_38KHZ: Carrier = Carrier {
        frequency_hz: 38_000,
        duty_percent: 50,
    };

    /// Carrier period in nanoseconds
    pub fn period_ns(&self) -> u64 {
        if self.frequency_hz == 0 {
            return 0;
        }
        1_000_000_000 / u64::from(self.frequency_hz)
    }
}

impl Default for Carrier {
    fn default() -> Self {
        Self::IR_38KHZ
    }
}

/// Physical IR output owned by exactly one playback consumer
pub trait Emitter: Send {
    /// Set up the modulation peripheral; failure is fatal at startup
    fn configure(&mut self, carrier: Carrier) -> Result<(), EmitterError>;

    /// Turn carrier modulation on (mark) or off (space)
    fn set_carrier(&mut self, on: bool) -> Result<(), EmitterError>;

    /// Keep the current state for `micros` microseconds
    fn hold(&mut self, micros: u32);

    /// Give other work a chance to run during long transmissions
    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Host emitter that busy-waits segment timings like a ROM microsecond delay.
///
/// It drives no pin; carrier state and airtime are tracked for inspection.
#[derive(Debug, Default)]
pub struct SpinEmitter {
    carrier: Option<Carrier>,
    on: bool,
    mark_time: Duration,
    space_time: Duration,
}

impl SpinEmitter {
    /// Create an unconfigured emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the carrier is currently modulated
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Accumulated carrier-on time
    pub fn mark_time(&self) -> Duration {
        self.mark_time
    }

    /// Accumulated carrier-off time
    pub fn space_time(&self) -> Duration {
        self.space_time
    }
}

impl Emitter for SpinEmitter {
    fn configure(&mut self, carrier: Carrier) -> Result<(), EmitterError> {
        if carrier.frequency_hz == 0 {
            return Err(EmitterError::Configure("carrier frequency is zero".into()));
        }
        if carrier.duty_percent == 0 || carrier.duty_percent >= 100 {
            return Err(EmitterError::Configure(format!(
                "duty cycle {}% out of range",
                carrier.duty_percent
            )));
        }

        debug!(
            frequency_hz = carrier.frequency_hz,
            duty = carrier.duty_percent,
            "Carrier configured"
        );
        self.carrier = Some(carrier);
        self.on = false;
        Ok(())
    }

    fn set_carrier(&mut self, on: bool) -> Result<(), EmitterError> {
        if self.carrier.is_none() {
            return Err(EmitterError::Carrier("emitter not configured".into()));
        }
        trace!(on, "carrier");
        self.on = on;
        Ok(())
    }

    fn hold(&mut self, micros: u32) {
        let span = Duration::from_micros(u64::from(micros));
        let deadline = Instant::now() + span;
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }

        if self.on {
            self.mark_time += span;
        } else {
            self.space_time += span;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_period() {
        assert_eq!(Carrier::IR_38KHZ.period_ns(), 26_315);
        assert_eq!(Carrier::default(), Carrier::IR_38KHZ);
    }

    #[test]
    fn test_configure_validation() {
        let mut emitter = SpinEmitter::new();
        assert!(emitter
            .configure(Carrier {
                frequency_hz: 0,
                duty_percent: 50
            })
            .is_err());
        assert!(emitter
            .configure(Carrier {
                frequency_hz: 38_000,
                duty_percent: 100
            })
            .is_err());
        assert!(emitter.configure(Carrier::IR_38KHZ).is_ok());
    }

    #[test]
    fn test_unconfigured_carrier_fails() {
        let mut emitter = SpinEmitter::new();
        assert!(emitter.set_carrier(true).is_err());
    }

    #[test]
    fn test_hold_accounts_airtime() {
        let mut emitter = SpinEmitter::new();
        emitter.configure(Carrier::IR_38KHZ).unwrap();

        let start = Instant::now();
        emitter.set_carrier(true).unwrap();
        emitter.hold(500);
        emitter.set_carrier(false).unwrap();
        emitter.hold(300);

        assert!(start.elapsed() >= Duration::from_micros(800));
        assert_eq!(emitter.mark_time(), Duration::from_micros(500));
        assert_eq!(emitter.space_time(), Duration::from_micros(300));
        assert!(!emitter.is_on());
    }
}
