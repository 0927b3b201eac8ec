#![doc = "repo-harvest-core: discovery and source-extraction pipeline for repo-harvest."]

//! This crate contains the whole harvest pipeline: the upstream API contract,
//! the GitHub client, and the stages that turn a search query into one corpus
//! artifact per repository.
//!
//! # Usage
//! Build a [`config::HarvestConfig`], a [`github::GitHubClient`] (or any other
//! [`contract::SourceHost`]) and call [`harvest::harvest`].

pub mod branch;
pub mod config;
pub mod content;
pub mod contract;
pub mod corpus;
pub mod github;
pub mod harvest;
pub mod ledger;
pub mod search;
pub mod tree;
