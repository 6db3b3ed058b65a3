pub mod exec;
pub mod monitor;
pub mod poll;
pub mod scan;

mod root;
pub use root::{
    load_initializer, parse, BatmonCommand, Command, GlobalOptions, PollOptions, ScanOptions,
};
