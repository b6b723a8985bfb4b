#![forbid(unsafe_code)]

pub mod admin;
pub mod app;
pub mod cli;
pub mod client;
pub mod commands;
pub mod editor;
pub mod formats;
pub mod html;
pub mod interactive;
pub mod logging;
pub mod overlay_editor;
pub mod overlays;
pub mod pages;
pub mod viewer;
