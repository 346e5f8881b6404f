//! # UI Module
//!
//! This module contains all UI components for the Lineweaver spectrum annotator.

pub mod main_display;
pub mod spectrum_plot;
