//! # postmerge Batch
//!
//! Drives the post processor for every setup of a job: invokes it once per
//! operation group, waits for each fragment, merges the fragments and writes one
//! program per setup.

pub mod assembler;
pub mod batch;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod job;
pub mod naming;

pub use assembler::{merge_files, Assembler, BodySpool};
pub use batch::{group_setup, BatchReport, BatchRunner, SkippedSetup};
pub use engine::{CommandEngine, PostEngine, PostRequest};
pub use error::{JobError, JobResult};
pub use fragment::{FragmentGuard, FragmentReader, RetryPolicy};
pub use job::Job;
pub use naming::{program_number, split_setup_name, OutputName, OutputNamer};
