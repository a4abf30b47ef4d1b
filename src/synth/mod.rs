// Synthesis module - Oscillators and the tone mixer

pub mod oscillator;
pub mod tone;
