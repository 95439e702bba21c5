//! Host-side integration tests for the storybox service.
//!
//! These verify the full chain from inputs (card reader, button line,
//! battery, knob) through the FSM down to audio and LED port calls,
//! without any real hardware.

mod mock_hw;
mod supervisor_tests;
