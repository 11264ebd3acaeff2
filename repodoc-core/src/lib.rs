#![doc = "repodoc-core: core logic library for repodoc."]

//! This crate contains the generation pipeline and its collaborators: fetching
//! eligible files from a hosted repository, requesting documentation for each
//! file from a language model, assembling the ordered document, and exporting
//! or publishing it.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] from a [`contract::RepositoryBrowser`] and a
//! [`contract::DocClient`], then `run` or `spawn` it for a
//! [`locator::RepositoryLocator`].

pub mod client;
pub mod contract;
pub mod document;
pub mod download;
pub mod error;
pub mod export;
pub mod locator;
pub mod pipeline;
pub mod presets;
pub mod publish;
