#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod cli;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod raster;
pub mod segment;
pub mod selection;
pub mod session;
pub mod template;
