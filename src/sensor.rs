//! Sensor platform boundary.
//!
//! The platform delivers events for every sensor the application registered
//! with. Only accelerometer readings are turned into orientation samples;
//! everything else is dropped here without error.

use std::time::Duration;

/// Kind of platform sensor an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    MagneticField,
    /// Platform-specific sensor type code
    Other(i32),
}

/// Raw event from the sensor platform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub kind: SensorKind,
    pub values: [f32; 3],
    /// Platform timestamp since boot
    pub timestamp: Duration,
}

impl SensorEvent {
    pub fn accelerometer(values: [f32; 3], timestamp: Duration) -> Self {
        Self {
            kind: SensorKind::Accelerometer,
            values,
            timestamp,
        }
    }
}

/// Orientation reading in sensor units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    pub azimuth: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl OrientationSample {
    pub const fn new(azimuth: f64, pitch: f64, roll: f64) -> Self {
        Self { azimuth, pitch, roll }
    }

    /// Extract a sample from an accelerometer event; other kinds yield `None`
    pub fn from_event(event: &SensorEvent) -> Option<Self> {
        match event.kind {
            SensorKind::Accelerometer => {
                let [azimuth, pitch, roll] = event.values;
                Some(Self::new(f64::from(azimuth), f64::from(pitch), f64::from(roll)))
            }
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.azimuth.is_finite() && self.pitch.is_finite() && self.roll.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accelerometer_event_becomes_sample() {
        let event = SensorEvent::accelerometer([10.0, 5.0, -2.0], Duration::ZERO);
        let sample = OrientationSample::from_event(&event).unwrap();
        assert_eq!(sample, OrientationSample::new(10.0, 5.0, -2.0));
    }

    #[test]
    fn test_other_sensors_ignored() {
        for kind in [SensorKind::Gyroscope, SensorKind::MagneticField, SensorKind::Other(42)] {
            let event = SensorEvent {
                kind,
                values: [1.0, 2.0, 3.0],
                timestamp: Duration::from_millis(5),
            };
            assert!(OrientationSample::from_event(&event).is_none());
        }
    }
}
