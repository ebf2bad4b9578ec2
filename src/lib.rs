//! CrochetFE: a cell-grid editor for crochet patterns.
//!
//! The library holds the whole editing core ([`editor::Editor`] and the
//! modules it drives) plus both front ends, so the binary only routes between
//! the window and the headless CLI.

pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod io;
pub mod ops;
pub mod project;
