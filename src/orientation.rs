//! Rotation bookkeeping between sensor, view and output coordinates.

use crate::types::{Facing, Reference};

/// Angles needed to convert between [`Reference`] systems.
///
/// `sensor_offset` comes from the opened camera's info, `display_offset`
/// from the UI's display rotation and `device_orientation` from the device
/// sensor. All values are degrees in `{0, 90, 180, 270}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Orientation {
    pub facing: Facing,
    pub sensor_offset: u32,
    pub display_offset: u32,
    pub device_orientation: u32,
}

impl Orientation {
    /// Clockwise degrees that take an image in `from` coordinates into `to`.
    pub fn offset(&self, from: Reference, to: Reference) -> u32 {
        if from == to {
            return 0;
        }
        if to == Reference::Sensor {
            return (360 - self.offset(to, from)) % 360;
        }
        if from == Reference::Sensor {
            return match to {
                Reference::View => self.sensor_to_view(),
                Reference::Output => self.sensor_to_output(),
                Reference::Sensor => 0,
            };
        }
        (self.offset(Reference::Sensor, to) + 360 - self.offset(Reference::Sensor, from)) % 360
    }

    /// True when the two references have swapped width and height.
    pub fn flip(&self, from: Reference, to: Reference) -> bool {
        self.offset(from, to) % 180 != 0
    }

    fn sensor_to_view(&self) -> u32 {
        match self.facing {
            Facing::Front => (360 - (self.sensor_offset + self.display_offset) % 360) % 360,
            Facing::Back => (self.sensor_offset + 360 - self.display_offset % 360) % 360,
        }
    }

    fn sensor_to_output(&self) -> u32 {
        match self.facing {
            Facing::Front => (self.sensor_offset + 360 - self.device_orientation % 360) % 360,
            Facing::Back => (self.sensor_offset + self.device_orientation) % 360,
        }
    }
}
