//! # Package Index
//!
//! Prepares community package ("project") records for a full-text and
//! faceted search index.
//!
//! Each pass reads the published content tree, joins every live project with
//! its votes, downloads, files and declared compatible versions, flattens it
//! into a string field map, and shapes that map into a multi-valued document
//! with a sortable numeric version field for range queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────┐
//! │ ContentStore │──▶│  IndexFeed   │──▶│ Transformer │──▶│  Shaper  │
//! │ StatsProvider│   │ (live + join)│   │ + Category  │   │          │
//! └──────────────┘   └──────────────┘   └─────────────┘   └────┬─────┘
//!                                                              ▼
//!                                                        ┌──────────┐
//!                                                        │ IndexSink│
//!                                                        │ SQLite   │
//!                                                        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pkgidx init                   # create database
//! pkgidx index --dry-run        # print the rows a pass would write
//! pkgidx index                  # run a full pass
//! pkgidx stats                  # document and version coverage
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`version`] | Version normalization and the sortable integer encoding |
//! | [`popularity`] | Popularity score |
//! | [`models`] | Content nodes, project files, project stats |
//! | [`content`] | Content tree, content store, lazily loaded session |
//! | [`feed`] | Stats boundary and the live-project feed |
//! | [`project_stats`] | SQLite stats provider |
//! | [`transform`] | Project to flat index row |
//! | [`category`] | Category backfill |
//! | [`document`] | Flat rows and shaped documents |
//! | [`shaper`] | Body stripping, version expansion, `num_version` |
//! | [`sink`] | Index sinks |
//! | [`pipeline`] | One full pass |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`stats`] | Index statistics |

pub mod category;
pub mod config;
pub mod content;
pub mod db;
pub mod document;
pub mod error;
pub mod feed;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod popularity;
pub mod project_stats;
pub mod shaper;
pub mod sink;
pub mod stats;
pub mod transform;
pub mod version;
