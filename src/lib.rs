pub mod app;
pub mod citations;
pub mod config;
pub mod dag;
pub mod domain;
pub mod error;
pub mod executor;
pub mod fs_util;
pub mod output;
pub mod rule;
pub mod samples;
pub mod stages;
pub mod template;
pub mod toolcheck;
pub mod tools;
pub mod workflow;
