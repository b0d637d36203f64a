//! Replay trace of a simulation run

pub mod simulation_step;
pub mod simulation_stepper;
pub mod tracer;
