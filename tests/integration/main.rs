//! Integration tests for fgdemux.
//!
//! The command tests run the `fgdemux` binary end to end; the pipeline tests drive the library
//! from a real alignment file through the engine to the per-barcode outputs.

mod helpers;
mod test_demux_command;
mod test_demux_pipeline;
